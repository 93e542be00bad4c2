//! Error handling and stable error codes for the soft TCAM

use std::fmt;

/// Error type for pool and engine operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A data bit is set where the mask marks the bit as don't-care.
    WildcardDataMismatch { bit: u32 },
    /// Erase target (pattern, or priority/value pair) is not stored.
    NotFound,
    /// Internal consistency violation; unreachable with correct usage.
    InvalidState(&'static str),
    /// The engine handle does not belong to this pool (or was destroyed).
    InvalidHandle,
    /// Loader input is not a valid address or prefix literal.
    InvalidPrefix,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::WildcardDataMismatch { bit } => {
                write!(f, "data bit {bit} is set under a wildcard mask bit")
            }
            Error::NotFound => f.write_str("pattern or entry not found"),
            Error::InvalidState(what) => write!(f, "invalid state: {what}"),
            Error::InvalidHandle => f.write_str("invalid engine handle"),
            Error::InvalidPrefix => f.write_str("invalid address or prefix"),
        }
    }
}

impl std::error::Error for Error {}

#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    Success = 0,
    WildcardDataMismatch = 1,
    NotFound = 2,
    InvalidState = 3,
    InvalidHandle = 4,
    InvalidPrefix = 5,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Success => "Success",
            ErrorCode::WildcardDataMismatch => "Wildcard data mismatch",
            ErrorCode::NotFound => "Not found",
            ErrorCode::InvalidState => "Invalid state",
            ErrorCode::InvalidHandle => "Invalid handle",
            ErrorCode::InvalidPrefix => "Invalid prefix",
        }
    }
}

// Map internal Error to ErrorCode
pub fn map_error(e: &Error) -> ErrorCode {
    match e {
        Error::WildcardDataMismatch { .. } => ErrorCode::WildcardDataMismatch,
        Error::NotFound => ErrorCode::NotFound,
        Error::InvalidState(_) => ErrorCode::InvalidState,
        Error::InvalidHandle => ErrorCode::InvalidHandle,
        Error::InvalidPrefix => ErrorCode::InvalidPrefix,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(map_error(&Error::NotFound) as u8, 2);
        assert_eq!(map_error(&Error::WildcardDataMismatch { bit: 3 }) as u8, 1);
        assert_eq!(map_error(&Error::InvalidHandle).as_str(), "Invalid handle");
        assert_eq!(ErrorCode::Success.as_str(), "Success");
    }

    #[test]
    fn display_names_the_offending_bit() {
        let msg = Error::WildcardDataMismatch { bit: 7 }.to_string();
        assert!(msg.contains("bit 7"), "{msg}");
    }
}
