use thiserror::Error;

/// Result type alias for IMD operations
pub type Result<T> = std::result::Result<T, ImdError>;

/// Errors that can occur when working with IMD files
#[derive(Debug, Error)]
pub enum ImdError {
    /// I/O error occurred while reading
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// I/O error occurred while writing; the output must be abandoned
    #[error("Write error: {0}")]
    Write(std::io::Error),

    /// Invalid or unrecognized IMD structure
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Stream ended in the middle of a structure
    #[error("Truncated at offset {offset}: {message}")]
    Truncated {
        /// Byte offset (relative to the start of the structure) where data ran out
        offset: usize,
        /// Error message
        message: String,
    },

    /// Track not present in the image
    #[error("No track at cylinder {cylinder}, head {head}")]
    InvalidTrack {
        /// Cylinder number
        cylinder: u8,
        /// Head number
        head: u8,
    },

    /// Tracks use more than one data rate, so no single drive fits
    #[error("Mixed data rates ({rates:?} kbps), no single drive type fits")]
    MixedDataRates {
        /// Rates found, ascending
        rates: Vec<u16>,
    },
}

impl ImdError {
    /// Create a truncation error with context
    pub fn truncated<S: Into<String>>(offset: usize, message: S) -> Self {
        ImdError::Truncated {
            offset,
            message: message.into(),
        }
    }

    /// Create an invalid format error
    pub fn invalid_format<S: Into<String>>(message: S) -> Self {
        ImdError::InvalidFormat(message.into())
    }

    /// Check whether this is a format error (never worth retrying)
    pub fn is_format_error(&self) -> bool {
        matches!(self, ImdError::InvalidFormat(_))
    }

    /// Check whether this error came from the output side
    pub fn is_write_error(&self) -> bool {
        matches!(self, ImdError::Write(_))
    }
}
