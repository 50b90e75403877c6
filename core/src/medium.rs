//! Storage media: the transport-kind-tagged payloads a data object holds.
//!
//! A medium owns its payload. Duplication deep-copies memory and bitmap
//! pixels and shares stream/opaque handles by reference count; release is
//! idempotent and resets the medium to empty.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::io;
use std::rc::Rc;
use thiserror::Error;

use crate::format::TransportKind;

#[derive(Debug, Error)]
pub enum MediumError {
    #[error("out of memory duplicating {0} bytes")]
    OutOfMemory(usize),

    #[error("stream error: {0}")]
    Io(#[from] io::Error),
}

/// Synchronous byte-stream boundary. [`MemoryStream`] is the in-process
/// implementation; hosts may supply their own.
pub trait ByteStream {
    /// Total number of bytes remaining to read.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;
}

/// Shared handle to a byte stream. Duplicating a stream-backed medium shares
/// the handle rather than copying the content.
pub type StreamHandle = Rc<RefCell<dyn ByteStream>>;

/// In-memory [`ByteStream`].
pub struct MemoryStream {
    data: Vec<u8>,
    pos: usize,
}

impl MemoryStream {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }

    pub fn into_handle(self) -> StreamHandle {
        Rc::new(RefCell::new(self))
    }
}

impl ByteStream for MemoryStream {
    fn len(&self) -> u64 {
        (self.data.len() - self.pos) as u64
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.data[self.pos..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.data.truncate(self.pos);
        self.data.extend_from_slice(buf);
        self.pos = self.data.len();
        Ok(buf.len())
    }
}

/// An owned image: dimensions plus a BGRA pixel buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Bitmap {
    const BYTES_PER_PIXEL: usize = 4;
    const WIRE_HEADER: usize = 8;

    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(
            pixels.len(),
            width as usize * height as usize * Self::BYTES_PER_PIXEL,
            "pixel buffer does not match dimensions"
        );
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Independent deep copy of the pixel data. Bitmap handles cannot be
    /// shared by reference across ownership boundaries.
    pub fn duplicate(&self) -> Result<Self, MediumError> {
        Ok(Self {
            width: self.width,
            height: self.height,
            pixels: try_copy(&self.pixels)?,
        })
    }

    /// Serializes to the memory/stream wire encoding: width and height as
    /// little-endian u32, then the pixel rows.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::WIRE_HEADER + self.pixels.len());
        out.extend_from_slice(&self.width.to_le_bytes());
        out.extend_from_slice(&self.height.to_le_bytes());
        out.extend_from_slice(&self.pixels);
        out
    }

    pub fn from_wire(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::WIRE_HEADER {
            return None;
        }
        let width = u32::from_le_bytes(bytes[0..4].try_into().ok()?);
        let height = u32::from_le_bytes(bytes[4..8].try_into().ok()?);
        let pixels = &bytes[Self::WIRE_HEADER..];
        if pixels.len() != width as usize * height as usize * Self::BYTES_PER_PIXEL {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels: pixels.to_vec(),
        })
    }
}

/// Reference-counted opaque payload. The payload's `Drop` is its release
/// callback and runs when the last handle goes away.
#[derive(Clone)]
pub struct OpaqueHandle {
    data: Rc<dyn Any>,
}

impl OpaqueHandle {
    pub fn new<T: Any>(value: T) -> Self {
        Self {
            data: Rc::new(value),
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.data.downcast_ref()
    }
}

impl fmt::Debug for OpaqueHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpaqueHandle").finish_non_exhaustive()
    }
}

/// One transport-kind-tagged payload. Exactly one variant is meaningful;
/// release responsibility sits with this instance alone.
pub enum StorageMedium {
    Empty,
    Memory(Vec<u8>),
    Stream(StreamHandle),
    Bitmap(Bitmap),
    Opaque(OpaqueHandle),
}

impl StorageMedium {
    pub fn memory(bytes: Vec<u8>) -> Self {
        Self::Memory(bytes)
    }

    pub fn stream(handle: StreamHandle) -> Self {
        Self::Stream(handle)
    }

    pub fn bitmap(bitmap: Bitmap) -> Self {
        Self::Bitmap(bitmap)
    }

    pub fn opaque<T: Any>(value: T) -> Self {
        Self::Opaque(OpaqueHandle::new(value))
    }

    pub fn kind(&self) -> Option<TransportKind> {
        match self {
            Self::Empty => None,
            Self::Memory(_) => Some(TransportKind::Memory),
            Self::Stream(_) => Some(TransportKind::Stream),
            Self::Bitmap(_) => Some(TransportKind::Bitmap),
            Self::Opaque(_) => Some(TransportKind::Opaque),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn memory_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Memory(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Independent duplicate. Memory and bitmap payloads are deep-copied;
    /// stream and opaque handles are shared by incrementing the reference
    /// count. The source is never consumed.
    pub fn duplicate(&self) -> Result<Self, MediumError> {
        match self {
            Self::Empty => Ok(Self::Empty),
            Self::Memory(bytes) => Ok(Self::Memory(try_copy(bytes)?)),
            Self::Stream(handle) => Ok(Self::Stream(Rc::clone(handle))),
            Self::Bitmap(bitmap) => Ok(Self::Bitmap(bitmap.duplicate()?)),
            Self::Opaque(handle) => Ok(Self::Opaque(handle.clone())),
        }
    }

    /// Releases the payload and resets to empty. Idempotent; releasing an
    /// empty medium is a no-op.
    pub fn release(&mut self) {
        *self = Self::Empty;
    }

    /// Moves the payload out, leaving this medium empty.
    pub fn take(&mut self) -> Self {
        std::mem::replace(self, Self::Empty)
    }
}

impl fmt::Debug for StorageMedium {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("StorageMedium::Empty"),
            Self::Memory(bytes) => write!(f, "StorageMedium::Memory({} bytes)", bytes.len()),
            Self::Stream(_) => f.write_str("StorageMedium::Stream"),
            Self::Bitmap(bitmap) => write!(
                f,
                "StorageMedium::Bitmap({}x{})",
                bitmap.width, bitmap.height
            ),
            Self::Opaque(_) => f.write_str("StorageMedium::Opaque"),
        }
    }
}

/// Fallible byte-buffer copy. A zero-length source duplicates to an empty
/// buffer, never an error.
pub(crate) fn try_copy(src: &[u8]) -> Result<Vec<u8>, MediumError> {
    if src.is_empty() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    out.try_reserve_exact(src.len())
        .map_err(|_| MediumError::OutOfMemory(src.len()))?;
    out.extend_from_slice(src);
    Ok(out)
}

/// Materializes a stream into a freshly allocated memory block by reading
/// to completion. Zero-length content yields an empty buffer.
pub(crate) fn read_stream_to_end(handle: &StreamHandle) -> Result<Vec<u8>, MediumError> {
    let mut stream = handle.borrow_mut();
    let expected = usize::try_from(stream.len()).unwrap_or(usize::MAX);

    let mut out = Vec::new();
    if expected > 0 {
        out.try_reserve_exact(expected)
            .map_err(|_| MediumError::OutOfMemory(expected))?;
    }

    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        out.try_reserve(n).map_err(|_| MediumError::OutOfMemory(n))?;
        out.extend_from_slice(&chunk[..n]);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_memory_is_independent() {
        let original = StorageMedium::memory(vec![1, 2, 3]);
        let mut copy = original.duplicate().unwrap();

        copy.release();
        assert_eq!(original.memory_bytes(), Some(&[1, 2, 3][..]));
    }

    #[test]
    fn test_duplicate_bitmap_copies_pixels() {
        let bitmap = Bitmap::new(2, 1, vec![0xAA; 8]);
        let original = StorageMedium::bitmap(bitmap);
        let copy = original.duplicate().unwrap();

        let (StorageMedium::Bitmap(a), StorageMedium::Bitmap(b)) = (&original, &copy) else {
            panic!("expected bitmap media");
        };
        assert_eq!(a, b);
        assert_ne!(a.pixels().as_ptr(), b.pixels().as_ptr());
    }

    #[test]
    fn test_duplicate_stream_shares_handle() {
        let handle = MemoryStream::new(vec![9, 9]).into_handle();
        let original = StorageMedium::stream(Rc::clone(&handle));
        let copy = original.duplicate().unwrap();

        // Two media plus the local binding hold the stream.
        assert_eq!(Rc::strong_count(&handle), 3);
        drop(copy);
        assert_eq!(Rc::strong_count(&handle), 2);
        drop(original);
        assert_eq!(Rc::strong_count(&handle), 1);
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut medium = StorageMedium::memory(vec![1]);
        medium.release();
        assert!(medium.is_empty());
        medium.release();
        assert!(medium.is_empty());

        let mut never_set = StorageMedium::Empty;
        never_set.release();
        assert!(never_set.is_empty());
    }

    #[test]
    fn test_take_transfers_ownership() {
        let mut medium = StorageMedium::memory(vec![7]);
        let moved = medium.take();
        assert!(medium.is_empty());
        assert_eq!(moved.memory_bytes(), Some(&[7][..]));
    }

    #[test]
    fn test_zero_length_copy_is_not_an_error() {
        let empty = StorageMedium::memory(Vec::new());
        let copy = empty.duplicate().unwrap();
        assert_eq!(copy.memory_bytes(), Some(&[][..]));
    }

    #[test]
    fn test_read_stream_to_end() {
        let handle = MemoryStream::new((0..200u8).collect()).into_handle();
        let bytes = read_stream_to_end(&handle).unwrap();
        assert_eq!(bytes, (0..200u8).collect::<Vec<_>>());

        // The stream is consumed; a second materialization sees no content.
        assert!(read_stream_to_end(&handle).unwrap().is_empty());
    }

    #[test]
    fn test_zero_length_stream_is_empty_not_error() {
        let handle = MemoryStream::new(Vec::new()).into_handle();
        assert!(read_stream_to_end(&handle).unwrap().is_empty());
    }

    #[test]
    fn test_bitmap_wire_round_trip() {
        let bitmap = Bitmap::new(2, 2, vec![1; 16]);
        let wire = bitmap.to_wire();
        assert_eq!(Bitmap::from_wire(&wire), Some(bitmap));
    }

    #[test]
    fn test_bitmap_wire_rejects_truncated_input() {
        let bitmap = Bitmap::new(2, 2, vec![1; 16]);
        let wire = bitmap.to_wire();
        assert_eq!(Bitmap::from_wire(&wire[..wire.len() - 1]), None);
        assert_eq!(Bitmap::from_wire(&[1, 2, 3]), None);
    }

    #[test]
    fn test_opaque_release_runs_payload_drop() {
        struct Flagged(Rc<std::cell::Cell<bool>>);
        impl Drop for Flagged {
            fn drop(&mut self) {
                self.0.set(true);
            }
        }

        let dropped = Rc::new(std::cell::Cell::new(false));
        let mut medium = StorageMedium::opaque(Flagged(Rc::clone(&dropped)));
        let copy = medium.duplicate().unwrap();

        medium.release();
        assert!(!dropped.get(), "copy still holds the payload");
        drop(copy);
        assert!(dropped.get());
    }
}
