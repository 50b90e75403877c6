//! The reference-counted transfer object shared between drag source,
//! transport and drop targets.
//!
//! Entries are keyed by (format tag, transport kind): storing a second
//! representation of the same tag under a different transport kind is fine,
//! storing the same (tag, kind) replaces the previous entry. Targets must
//! treat the object as read-only; mutation is a source-side operation
//! performed before the drag begins.

use std::cell::RefCell;
use std::path::PathBuf;
use thiserror::Error;

use crate::file_list;
use crate::format::{Aspect, FormatDescriptor, FormatTag, TransportKind};
use crate::medium::{self, Bitmap, MediumError, StorageMedium};

#[derive(Debug, Error)]
pub enum DataError {
    #[error("format not present: {0:?}")]
    FormatNotFound(FormatTag),

    #[error("no stored transport kind matches the request for {0:?}")]
    TransportMismatch(FormatTag),

    #[error("only the content aspect is supported")]
    WrongAspect,

    #[error("a stored descriptor must name exactly one transport kind")]
    AmbiguousTransport,

    #[error("medium payload does not match the descriptor's transport kind")]
    MediumMismatch,

    #[error("malformed {0:?} payload")]
    Malformed(FormatTag),

    #[error("operation not supported")]
    NotSupported,

    #[error(transparent)]
    Medium(#[from] MediumError),
}

struct Entry {
    format: FormatDescriptor,
    medium: StorageMedium,
}

/// Capability surface of a transfer object. Targets receive it by shared
/// reference and never own the object; lifetime is governed by the
/// `Rc<DataObject>` handle count.
pub trait TransferData {
    /// True-shaped query: `Ok(())` iff an entry matches the requested tag
    /// and the stored transport kind intersects the query mask.
    fn query_get_data(&self, format: &FormatDescriptor) -> Result<(), DataError>;

    /// Returns an independent duplicate of the matching entry's medium.
    /// The stored entry is untouched; the caller owns the copy.
    fn get_data(&self, format: &FormatDescriptor) -> Result<StorageMedium, DataError>;

    /// Fills a caller-provided memory medium in place. Only memory-transport
    /// entries and destinations are supported.
    fn get_data_into(
        &self,
        format: &FormatDescriptor,
        dest: &mut StorageMedium,
    ) -> Result<(), DataError>;

    /// Inserts or replaces the (tag, transport kind) entry, taking ownership
    /// of `medium`.
    fn set_data(&self, format: FormatDescriptor, medium: StorageMedium) -> Result<(), DataError>;

    /// Like [`TransferData::set_data`] but stores a duplicate; the caller
    /// keeps `medium`.
    fn set_data_copy(
        &self,
        format: &FormatDescriptor,
        medium: &StorageMedium,
    ) -> Result<(), DataError>;

    /// Restartable cursor over the stored descriptors in insertion order.
    /// Each call yields an independent enumerator.
    fn enumerate_formats(&self) -> FormatEnumerator;

    /// Reports the canonical descriptor for a request. This implementation
    /// has no synthesized formats, so the canonical form is the input.
    fn canonical_format(&self, format: &FormatDescriptor) -> FormatDescriptor {
        *format
    }

    /// Change-notification connections are not supported.
    fn advise(&self) -> Result<u32, DataError> {
        Err(DataError::NotSupported)
    }

    fn unadvise(&self, _connection: u32) -> Result<(), DataError> {
        Err(DataError::NotSupported)
    }

    fn enum_advise(&self) -> Result<(), DataError> {
        Err(DataError::NotSupported)
    }
}

#[derive(Default)]
pub struct DataObject {
    entries: RefCell<Vec<Entry>>,
}

impl DataObject {
    pub fn new() -> Self {
        Self::default()
    }

    fn stored_kind_of(entry: &Entry) -> Option<TransportKind> {
        entry.format.stored_kind()
    }
}

impl TransferData for DataObject {
    fn query_get_data(&self, format: &FormatDescriptor) -> Result<(), DataError> {
        if format.aspect != Aspect::Content {
            return Err(DataError::WrongAspect);
        }

        let entries = self.entries.borrow();
        let mut tag_seen = false;
        for entry in entries.iter().filter(|e| e.format.tag == format.tag) {
            tag_seen = true;
            if let Some(kind) = Self::stored_kind_of(entry)
                && format.transports.intersects(kind.mask())
            {
                return Ok(());
            }
        }

        if tag_seen {
            Err(DataError::TransportMismatch(format.tag))
        } else {
            Err(DataError::FormatNotFound(format.tag))
        }
    }

    fn get_data(&self, format: &FormatDescriptor) -> Result<StorageMedium, DataError> {
        self.query_get_data(format)?;

        let entries = self.entries.borrow();
        let entry = entries
            .iter()
            .find(|e| {
                e.format.tag == format.tag
                    && Self::stored_kind_of(e)
                        .is_some_and(|kind| format.transports.intersects(kind.mask()))
            })
            .ok_or(DataError::FormatNotFound(format.tag))?;

        Ok(entry.medium.duplicate()?)
    }

    fn get_data_into(
        &self,
        format: &FormatDescriptor,
        dest: &mut StorageMedium,
    ) -> Result<(), DataError> {
        self.query_get_data(format)?;

        let entries = self.entries.borrow();
        let entry = entries
            .iter()
            .find(|e| {
                e.format.tag == format.tag
                    && Self::stored_kind_of(e)
                        .is_some_and(|kind| format.transports.intersects(kind.mask()))
            })
            .ok_or(DataError::FormatNotFound(format.tag))?;

        let Some(bytes) = entry.medium.memory_bytes() else {
            return Err(DataError::TransportMismatch(format.tag));
        };
        let StorageMedium::Memory(buf) = dest else {
            return Err(DataError::MediumMismatch);
        };

        buf.clear();
        buf.try_reserve_exact(bytes.len())
            .map_err(|_| MediumError::OutOfMemory(bytes.len()))?;
        buf.extend_from_slice(bytes);
        Ok(())
    }

    fn set_data(&self, format: FormatDescriptor, medium: StorageMedium) -> Result<(), DataError> {
        if format.aspect != Aspect::Content {
            debug_assert!(false, "stored data must use the content aspect");
            return Err(DataError::WrongAspect);
        }
        let Some(kind) = format.stored_kind() else {
            debug_assert!(false, "stored descriptor must name exactly one transport kind");
            return Err(DataError::AmbiguousTransport);
        };
        if medium.kind() != Some(kind) {
            debug_assert!(false, "medium payload does not match descriptor transport");
            return Err(DataError::MediumMismatch);
        }

        let mut entries = self.entries.borrow_mut();
        if let Some(entry) = entries
            .iter_mut()
            .find(|e| e.format.tag == format.tag && Self::stored_kind_of(e) == Some(kind))
        {
            entry.medium.release();
            entry.format = format;
            entry.medium = medium;
        } else {
            entries.push(Entry { format, medium });
        }
        Ok(())
    }

    fn set_data_copy(
        &self,
        format: &FormatDescriptor,
        medium: &StorageMedium,
    ) -> Result<(), DataError> {
        self.set_data(*format, medium.duplicate()?)
    }

    fn enumerate_formats(&self) -> FormatEnumerator {
        let formats = self.entries.borrow().iter().map(|e| e.format).collect();
        FormatEnumerator::new(formats)
    }
}

/// Extraction conveniences for targets. Each prefers the in-place memory
/// block and otherwise materializes a stream-backed entry by reading it to
/// completion; allocation failure propagates, an absent format is `Ok(None)`
/// and zero-length content is an empty success.
impl DataObject {
    pub fn get_text(&self) -> Result<Option<String>, DataError> {
        if let Some(bytes) = self.materialize(FormatTag::UnicodeText)? {
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            return Ok(Some(String::from_utf16_lossy(&units)));
        }

        // Narrow fallback when the wide transport is absent.
        if let Some(bytes) = self.materialize(FormatTag::Text)? {
            return Ok(Some(String::from_utf8_lossy(&bytes).into_owned()));
        }
        Ok(None)
    }

    pub fn get_file_list(&self) -> Result<Option<Vec<PathBuf>>, DataError> {
        let Some(bytes) = self.materialize(FormatTag::FileList)? else {
            return Ok(None);
        };
        Ok(Some(file_list::decode(&bytes)))
    }

    pub fn get_bitmap(&self) -> Result<Option<Bitmap>, DataError> {
        // In-place bitmap handle first.
        let duplicated = self.entries.borrow().iter().find_map(|e| {
            match (&e.format.tag, &e.medium) {
                (FormatTag::Bitmap, StorageMedium::Bitmap(bitmap)) => Some(bitmap.duplicate()),
                _ => None,
            }
        });
        if let Some(bitmap) = duplicated {
            return Ok(Some(bitmap?));
        }

        let Some(bytes) = self.materialize(FormatTag::Bitmap)? else {
            return Ok(None);
        };
        Bitmap::from_wire(&bytes)
            .map(Some)
            .ok_or(DataError::Malformed(FormatTag::Bitmap))
    }

    /// Memory or materialized-stream bytes for `tag`, or `None` when no
    /// memory/stream entry holds it. The in-place memory block wins
    /// regardless of insertion order; a stream is only drained when no
    /// memory entry holds the tag.
    fn materialize(&self, tag: FormatTag) -> Result<Option<Vec<u8>>, DataError> {
        let entries = self.entries.borrow();
        for entry in entries.iter().filter(|e| e.format.tag == tag) {
            if let StorageMedium::Memory(bytes) = &entry.medium {
                return Ok(Some(medium::try_copy(bytes)?));
            }
        }
        for entry in entries.iter().filter(|e| e.format.tag == tag) {
            if let StorageMedium::Stream(handle) = &entry.medium {
                return Ok(Some(medium::read_stream_to_end(handle)?));
            }
        }
        Ok(None)
    }
}

/// Source-side payload conveniences.
impl DataObject {
    /// Stores `text` as a UTF-16LE memory block under the unicode text tag.
    pub fn set_text(&self, text: &str) -> Result<(), DataError> {
        let bytes: Vec<u8> = text.encode_utf16().flat_map(u16::to_le_bytes).collect();
        self.set_data(
            FormatDescriptor::stored(FormatTag::UnicodeText, TransportKind::Memory),
            StorageMedium::memory(bytes),
        )
    }

    pub fn set_file_list(&self, paths: &[PathBuf]) -> Result<(), DataError> {
        self.set_data(
            FormatDescriptor::stored(FormatTag::FileList, TransportKind::Memory),
            StorageMedium::memory(file_list::encode(paths)),
        )
    }

    pub fn set_bitmap(&self, bitmap: Bitmap) -> Result<(), DataError> {
        self.set_data(
            FormatDescriptor::stored(FormatTag::Bitmap, TransportKind::Bitmap),
            StorageMedium::bitmap(bitmap),
        )
    }
}

/// Restartable cursor over a snapshot of stored format descriptors.
///
/// Cloning an enumerator mid-iteration is deliberately not provided; callers
/// needing independent iterations request a fresh enumerator from the object.
pub struct FormatEnumerator {
    formats: Vec<FormatDescriptor>,
    cursor: usize,
}

impl FormatEnumerator {
    fn new(formats: Vec<FormatDescriptor>) -> Self {
        Self { formats, cursor: 0 }
    }

    /// Advances the cursor without materializing elements. Returns false
    /// when fewer than `count` elements remained. Named apart from
    /// `Iterator::skip`, which would otherwise shadow it.
    pub fn advance(&mut self, count: usize) -> bool {
        let requested = self.cursor.saturating_add(count);
        self.cursor = requested.min(self.formats.len());
        requested <= self.formats.len()
    }

    /// Returns the cursor to the first entry.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    pub fn remaining(&self) -> usize {
        self.formats.len() - self.cursor
    }
}

impl Iterator for FormatEnumerator {
    type Item = FormatDescriptor;

    fn next(&mut self) -> Option<FormatDescriptor> {
        let format = self.formats.get(self.cursor).copied()?;
        self.cursor += 1;
        Some(format)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining(), Some(self.remaining()))
    }
}
