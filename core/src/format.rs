//! Format tags, transport kinds and the process-wide custom format registry.

use bitflags::bitflags;
use std::collections::HashMap;
use std::sync::{LazyLock, RwLock};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FormatError {
    #[error("custom format registry is exhausted")]
    RegistryFull,
}

/// First tag value handed out by [`register_format`]. Tags below this are
/// reserved for the built-in formats.
pub const FIRST_CUSTOM_TAG: u16 = 0xC000;

/// Name -> tag mapping for application-registered formats.
/// First registration wins; the mapping is stable for the process lifetime.
static FORMAT_REGISTRY: LazyLock<RwLock<HashMap<String, u16>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Identifies *what* data a representation holds, independent of how it is
/// transported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatTag {
    /// Narrow text in the host's byte encoding (decoded as UTF-8 here).
    Text,
    /// UTF-16LE text.
    UnicodeText,
    /// An image, either as an owned bitmap handle or in wire encoding.
    Bitmap,
    /// A list of file paths (see the file-list codec).
    FileList,
    /// An application-registered format obtained from [`register_format`].
    Custom(u16),
}

impl FormatTag {
    pub const fn raw(self) -> u16 {
        match self {
            Self::Text => 1,
            Self::Bitmap => 2,
            Self::UnicodeText => 13,
            Self::FileList => 15,
            Self::Custom(tag) => tag,
        }
    }

    pub const fn from_raw(raw: u16) -> Self {
        match raw {
            1 => Self::Text,
            2 => Self::Bitmap,
            13 => Self::UnicodeText,
            15 => Self::FileList,
            tag => Self::Custom(tag),
        }
    }
}

/// Returns the tag registered for `name`, allocating one on first use.
///
/// Registering the same name again returns the original tag, so independent
/// components agreeing on a name always agree on the tag. Fails only when
/// the custom tag range is exhausted; issued tags are never reused.
pub fn register_format(name: &str) -> Result<FormatTag, FormatError> {
    debug_assert!(!name.trim().is_empty(), "format name must not be empty");

    let mut registry = FORMAT_REGISTRY.write().unwrap();
    if let Some(&tag) = registry.get(name) {
        return Ok(FormatTag::Custom(tag));
    }

    let tag = next_custom_tag(registry.len())?;
    registry.insert(name.to_owned(), tag);
    Ok(FormatTag::Custom(tag))
}

/// Tag for the `issued`-th custom registration, counting from
/// [`FIRST_CUSTOM_TAG`]. Fails once the u16 range is used up rather than
/// wrapping into already-issued tags.
fn next_custom_tag(issued: usize) -> Result<u16, FormatError> {
    u16::try_from(issued)
        .ok()
        .and_then(|count| FIRST_CUSTOM_TAG.checked_add(count))
        .ok_or(FormatError::RegistryFull)
}

/// Looks up the name a custom tag was registered under.
pub fn registered_format_name(tag: FormatTag) -> Option<String> {
    let FormatTag::Custom(raw) = tag else {
        return None;
    };
    let registry = FORMAT_REGISTRY.read().unwrap();
    registry
        .iter()
        .find(|(_, value)| **value == raw)
        .map(|(name, _)| name.clone())
}

/// The physical mechanism a representation is conveyed by. A stored entry
/// has exactly one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// An in-process memory block.
    Memory,
    /// A byte stream read on demand.
    Stream,
    /// An owned bitmap.
    Bitmap,
    /// An opaque reference-counted payload.
    Opaque,
}

impl TransportKind {
    pub const fn mask(self) -> TransportMask {
        match self {
            Self::Memory => TransportMask::MEMORY,
            Self::Stream => TransportMask::STREAM,
            Self::Bitmap => TransportMask::BITMAP,
            Self::Opaque => TransportMask::OPAQUE,
        }
    }
}

bitflags! {
    /// Combinable transport capability mask used when querying. A descriptor
    /// used to store data carries exactly one bit.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TransportMask: u8 {
        const MEMORY = 1;
        const STREAM = 1 << 1;
        const BITMAP = 1 << 2;
        const OPAQUE = 1 << 3;
    }
}

impl TransportMask {
    /// The single kind named by this mask, if exactly one bit is set.
    pub fn single_kind(self) -> Option<TransportKind> {
        match self {
            Self::MEMORY => Some(TransportKind::Memory),
            Self::STREAM => Some(TransportKind::Stream),
            Self::BITMAP => Some(TransportKind::Bitmap),
            Self::OPAQUE => Some(TransportKind::Opaque),
            _ => None,
        }
    }
}

/// Qualifier on a format request. Only [`Aspect::Content`] is supported;
/// the other views exist so requests for them can be rejected explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Aspect {
    #[default]
    Content,
    Thumbnail,
    Icon,
}

/// Describes one representation of transferable data: a format tag, an
/// aspect, and the transport kinds it may travel by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatDescriptor {
    pub tag: FormatTag,
    pub aspect: Aspect,
    pub transports: TransportMask,
}

impl FormatDescriptor {
    /// Descriptor for storing data: exactly one transport kind.
    pub fn stored(tag: FormatTag, kind: TransportKind) -> Self {
        Self {
            tag,
            aspect: Aspect::Content,
            transports: kind.mask(),
        }
    }

    /// Descriptor for querying data: any combination of transport kinds.
    pub fn query(tag: FormatTag, transports: TransportMask) -> Self {
        Self {
            tag,
            aspect: Aspect::Content,
            transports,
        }
    }

    /// The stored transport kind, if this descriptor names exactly one.
    pub fn stored_kind(&self) -> Option<TransportKind> {
        self.transports.single_kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_format_first_wins() {
        let first = register_format("application/x-haul-test-stable").unwrap();
        let second = register_format("application/x-haul-test-stable").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_register_format_distinct_names() {
        let a = register_format("application/x-haul-test-a").unwrap();
        let b = register_format("application/x-haul-test-b").unwrap();
        assert_ne!(a, b);

        // Issued tags stay in the custom range.
        for tag in [a, b] {
            assert!(tag.raw() >= FIRST_CUSTOM_TAG);
        }
    }

    #[test]
    fn test_registered_name_lookup() {
        let tag = register_format("application/x-haul-test-named").unwrap();
        assert_eq!(
            registered_format_name(tag).as_deref(),
            Some("application/x-haul-test-named")
        );
        assert_eq!(registered_format_name(FormatTag::Text), None);
    }

    #[test]
    fn test_custom_tag_allocation_refuses_to_wrap() {
        assert_eq!(next_custom_tag(0), Ok(FIRST_CUSTOM_TAG));

        let last = (u16::MAX - FIRST_CUSTOM_TAG) as usize;
        assert_eq!(next_custom_tag(last), Ok(u16::MAX));
        assert_eq!(next_custom_tag(last + 1), Err(FormatError::RegistryFull));
        assert_eq!(next_custom_tag(usize::MAX), Err(FormatError::RegistryFull));
    }

    #[test]
    fn test_raw_round_trip() {
        for tag in [
            FormatTag::Text,
            FormatTag::UnicodeText,
            FormatTag::Bitmap,
            FormatTag::FileList,
            FormatTag::Custom(0xC123),
        ] {
            assert_eq!(FormatTag::from_raw(tag.raw()), tag);
        }
    }

    #[test]
    fn test_stored_descriptor_has_single_kind() {
        let stored = FormatDescriptor::stored(FormatTag::Text, TransportKind::Memory);
        assert_eq!(stored.stored_kind(), Some(TransportKind::Memory));

        let query = FormatDescriptor::query(
            FormatTag::Text,
            TransportMask::MEMORY | TransportMask::STREAM,
        );
        assert_eq!(query.stored_kind(), None);
    }
}
