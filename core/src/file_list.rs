//! Wire codec for the file-list format: UTF-8 paths separated by NUL bytes,
//! terminated by a double NUL.

use std::path::PathBuf;

pub(crate) fn encode(paths: &[PathBuf]) -> Vec<u8> {
    let mut out = Vec::new();
    for path in paths {
        out.extend_from_slice(path.to_string_lossy().as_bytes());
        out.push(0);
    }
    out.push(0);
    out
}

pub(crate) fn decode(bytes: &[u8]) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for segment in bytes.split(|&b| b == 0) {
        if segment.is_empty() {
            // Double NUL terminator.
            break;
        }
        paths.push(PathBuf::from(
            String::from_utf8_lossy(segment).into_owned(),
        ));
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let paths = vec![PathBuf::from("/tmp/a.txt"), PathBuf::from("/tmp/b c.png")];
        assert_eq!(decode(&encode(&paths)), paths);
    }

    #[test]
    fn test_empty_list() {
        let encoded = encode(&[]);
        assert_eq!(encoded, vec![0]);
        assert!(decode(&encoded).is_empty());
    }

    #[test]
    fn test_decode_stops_at_terminator() {
        let mut bytes = encode(&[PathBuf::from("/one")]);
        bytes.extend_from_slice(b"trailing garbage");
        assert_eq!(decode(&bytes), vec![PathBuf::from("/one")]);
    }

    #[test]
    fn test_decode_empty_input() {
        assert!(decode(&[]).is_empty());
    }
}
