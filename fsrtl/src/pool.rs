//! Pool Types and Tags
//!
//! NT allocates MCB pair arrays from one of two pools:
//!
//! - **NonPagedPool**: Cannot be paged out, for maps touched at raised IRQL
//! - **PagedPool**: Can be paged to disk
//!
//! Paged maps are also eligible for the first-mapping lookaside cache.

/// Pool types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum PoolType {
    /// Non-paged pool (always resident)
    #[default]
    NonPagedPool = 0,
    /// Paged pool (can be paged out)
    PagedPool = 1,
}

impl PoolType {
    /// Whether allocations from this pool go through the lookaside cache
    #[inline]
    pub const fn is_paged(self) -> bool {
        matches!(self, PoolType::PagedPool)
    }
}

/// Pool tag (4 characters)
pub type PoolTag = u32;

/// Create a pool tag from 4 ASCII characters
pub const fn make_tag(a: u8, b: u8, c: u8, d: u8) -> PoolTag {
    ((d as u32) << 24) | ((c as u32) << 16) | ((b as u32) << 8) | (a as u32)
}

/// MCB pool tags
pub mod pool_tags {
    use super::{make_tag, PoolTag};

    /// General pair arrays ('FSrm')
    pub const TAG_MCB_MAPPING: PoolTag = make_tag(b'F', b'S', b'r', b'm');
    /// Initial-size pair arrays served by the lookaside ('FSim')
    pub const TAG_MCB_FIRST_MAPPING: PoolTag = make_tag(b'F', b'S', b'i', b'm');
}

/// Render a tag as its four characters for log output
pub fn tag_chars(tag: PoolTag) -> [char; 4] {
    let bytes = tag.to_le_bytes();
    [
        bytes[0] as char,
        bytes[1] as char,
        bytes[2] as char,
        bytes[3] as char,
    ]
}
