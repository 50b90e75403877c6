use std::path::PathBuf;
use std::rc::Rc;

use haul_core::{
    Bitmap, ByteStream, DataError, DataObject, FormatDescriptor, FormatTag, MemoryStream,
    StorageMedium, TransferData, TransportKind,
};

fn utf16le(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

/// Verify text extraction round-trips through the unicode memory transport.
#[test]
fn test_get_text_from_memory() {
    let data = DataObject::new();
    data.set_text("héllo wörld").unwrap();
    assert_eq!(data.get_text().unwrap().as_deref(), Some("héllo wörld"));
}

/// Verify the wide transport is preferred when both text entries exist.
#[test]
fn test_get_text_prefers_unicode() {
    let data = DataObject::new();
    data.set_data(
        FormatDescriptor::stored(FormatTag::Text, TransportKind::Memory),
        StorageMedium::memory(b"narrow".to_vec()),
    )
    .unwrap();
    data.set_text("wide").unwrap();

    assert_eq!(data.get_text().unwrap().as_deref(), Some("wide"));
}

/// Verify the narrow fallback applies when the wide transport is absent.
#[test]
fn test_get_text_narrow_fallback() {
    let data = DataObject::new();
    data.set_data(
        FormatDescriptor::stored(FormatTag::Text, TransportKind::Memory),
        StorageMedium::memory(b"narrow only".to_vec()),
    )
    .unwrap();

    assert_eq!(data.get_text().unwrap().as_deref(), Some("narrow only"));
}

/// Verify the in-place memory block is preferred even when a stream entry
/// for the same tag was stored first, and that the stream is left undrained.
#[test]
fn test_memory_block_preferred_over_earlier_stream() {
    let data = DataObject::new();
    let handle = MemoryStream::new(utf16le("from stream")).into_handle();
    data.set_data(
        FormatDescriptor::stored(FormatTag::UnicodeText, TransportKind::Stream),
        StorageMedium::stream(Rc::clone(&handle)),
    )
    .unwrap();
    data.set_data(
        FormatDescriptor::stored(FormatTag::UnicodeText, TransportKind::Memory),
        StorageMedium::memory(utf16le("from memory")),
    )
    .unwrap();

    assert_eq!(data.get_text().unwrap().as_deref(), Some("from memory"));
    assert_eq!(handle.borrow().len(), utf16le("from stream").len() as u64);
}

/// Verify a stream-backed text entry is materialized by reading to
/// completion before decoding.
#[test]
fn test_get_text_materializes_stream() {
    let data = DataObject::new();
    data.set_data(
        FormatDescriptor::stored(FormatTag::UnicodeText, TransportKind::Stream),
        StorageMedium::stream(MemoryStream::new(utf16le("streamed")).into_handle()),
    )
    .unwrap();

    assert_eq!(data.get_text().unwrap().as_deref(), Some("streamed"));
}

/// Verify an absent text format is `None`, not an error.
#[test]
fn test_get_text_absent_is_none() {
    let data = DataObject::new();
    assert_eq!(data.get_text().unwrap(), None);
}

/// Verify zero-length stream content extracts as empty data rather than an
/// error; emptiness and allocation failure are distinguishable outcomes.
#[test]
fn test_zero_length_stream_is_empty_success() {
    let data = DataObject::new();
    data.set_data(
        FormatDescriptor::stored(FormatTag::FileList, TransportKind::Stream),
        StorageMedium::stream(MemoryStream::new(Vec::new()).into_handle()),
    )
    .unwrap();

    assert_eq!(data.get_file_list().unwrap(), Some(Vec::new()));
}

/// Verify the file list round-trips through the memory transport.
#[test]
fn test_file_list_round_trip() {
    let paths = vec![PathBuf::from("/tmp/report.pdf"), PathBuf::from("/tmp/img.png")];
    let data = DataObject::new();
    data.set_file_list(&paths).unwrap();

    assert_eq!(data.get_file_list().unwrap(), Some(paths));
}

/// Verify a stream-backed file list is materialized before parsing.
#[test]
fn test_file_list_from_stream() {
    let inner = DataObject::new();
    inner
        .set_file_list(&[PathBuf::from("/srv/data.bin")])
        .unwrap();
    let encoded = inner
        .get_data(&FormatDescriptor::stored(FormatTag::FileList, TransportKind::Memory))
        .unwrap();

    let data = DataObject::new();
    data.set_data(
        FormatDescriptor::stored(FormatTag::FileList, TransportKind::Stream),
        StorageMedium::stream(
            MemoryStream::new(encoded.memory_bytes().unwrap().to_vec()).into_handle(),
        ),
    )
    .unwrap();

    assert_eq!(
        data.get_file_list().unwrap(),
        Some(vec![PathBuf::from("/srv/data.bin")])
    );
}

/// Verify bitmap extraction duplicates the stored handle.
#[test]
fn test_get_bitmap_duplicates_handle() {
    let bitmap = Bitmap::new(2, 2, vec![5; 16]);
    let data = DataObject::new();
    data.set_bitmap(bitmap.clone()).unwrap();

    let extracted = data.get_bitmap().unwrap().unwrap();
    assert_eq!(extracted, bitmap);
    // The stored entry remains retrievable afterwards.
    assert_eq!(data.get_bitmap().unwrap(), Some(bitmap));
}

/// Verify a memory-transport bitmap in wire encoding decodes on extraction.
#[test]
fn test_get_bitmap_from_wire_memory() {
    let bitmap = Bitmap::new(1, 2, vec![3; 8]);
    let data = DataObject::new();
    data.set_data(
        FormatDescriptor::stored(FormatTag::Bitmap, TransportKind::Memory),
        StorageMedium::memory(bitmap.to_wire()),
    )
    .unwrap();

    assert_eq!(data.get_bitmap().unwrap(), Some(bitmap));
}

/// Verify a malformed bitmap payload is an error, not silently empty.
#[test]
fn test_get_bitmap_malformed_payload() {
    let data = DataObject::new();
    data.set_data(
        FormatDescriptor::stored(FormatTag::Bitmap, TransportKind::Memory),
        StorageMedium::memory(vec![1, 2, 3]),
    )
    .unwrap();

    assert!(matches!(
        data.get_bitmap(),
        Err(DataError::Malformed(FormatTag::Bitmap))
    ));
}
