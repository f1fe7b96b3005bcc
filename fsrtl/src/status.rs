//! Status Codes and MCB Errors
//!
//! MCB operations report failures as [`McbError`]. Callers that sit on an
//! NT-style interface can translate any error to the status value the
//! kernel would return with [`McbError::to_ntstatus`].

use core::fmt;

/// NT status value
pub type NtStatus = i32;

pub const STATUS_SUCCESS: NtStatus = 0;
pub const STATUS_UNSUCCESSFUL: NtStatus = 0xC000_0001_u32 as i32;
pub const STATUS_INVALID_PARAMETER: NtStatus = 0xC000_000D_u32 as i32;
pub const STATUS_END_OF_FILE: NtStatus = 0xC000_0011_u32 as i32;
pub const STATUS_INSUFFICIENT_RESOURCES: NtStatus = 0xC000_009A_u32 as i32;

/// Check whether a status value denotes success
#[inline]
pub const fn nt_success(status: NtStatus) -> bool {
    status >= 0
}

/// MCB error codes
///
/// A failed operation never leaves a partially updated map behind: every
/// error is raised before the first pair is rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum McbError {
    /// The pair array could not grow (pool exhausted or quota reached)
    OutOfMemory,
    /// The requested VBNs are already mapped to different LBNs
    ConflictingMapping,
    /// The VBN lies beyond the last run of the map
    OutOfRange,
    /// A VBN, LBN or sector count would overflow the 64-bit block space
    InvalidParameter,
}

impl McbError {
    /// Translate to the NT status the kernel would report
    pub const fn to_ntstatus(self) -> NtStatus {
        match self {
            McbError::OutOfMemory => STATUS_INSUFFICIENT_RESOURCES,
            McbError::ConflictingMapping => STATUS_UNSUCCESSFUL,
            McbError::OutOfRange => STATUS_END_OF_FILE,
            McbError::InvalidParameter => STATUS_INVALID_PARAMETER,
        }
    }
}

impl fmt::Display for McbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            McbError::OutOfMemory => "insufficient resources to grow the mapping pairs",
            McbError::ConflictingMapping => "vbn range is already mapped to different lbns",
            McbError::OutOfRange => "vbn is beyond the last run of the mcb",
            McbError::InvalidParameter => "block range overflows the block address space",
        };
        f.write_str(text)
    }
}

impl core::error::Error for McbError {}

/// Result type for MCB operations
pub type McbResult<T> = Result<T, McbError>;
