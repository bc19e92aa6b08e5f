/// IMD header line

use crate::error::{ImdError, Result};
use crate::format::{is_imd_signature, COMMENT_TERMINATOR, MAX_HEADER_LINE};
use chrono::{Local, NaiveDateTime};
use std::borrow::Cow;
use std::fmt;

const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Bytes that would end the line or the comment block early
fn is_line_breaking(byte: u8) -> bool {
    matches!(byte, b'\r' | b'\n' | COMMENT_TERMINATOR)
}

/// The line that opens every IMD file, without its line ending
///
/// Conventionally `IMD <version>: DD/MM/YYYY HH:MM:SS`; only the `IMD `
/// prefix is required. The bytes are kept exactly as read so that an
/// image is written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImdHeader {
    line: Vec<u8>,
}

impl ImdHeader {
    /// Create a header stamped with the current local time
    ///
    /// Line breaks and terminator bytes in the creator are dropped.
    pub fn new(creator: &str) -> Self {
        let creator: String = creator
            .chars()
            .filter(|&c| !(c.is_ascii() && is_line_breaking(c as u8)))
            .collect();
        Self {
            line: stamp(&creator, Local::now().naive_local()),
        }
    }

    /// Create a header with an explicit timestamp
    pub fn with_timestamp(creator: &str, timestamp: NaiveDateTime) -> Result<Self> {
        Self::from_bytes(&stamp(creator, timestamp))
    }

    /// Validate an existing header line
    pub fn parse(line: &str) -> Result<Self> {
        Self::from_bytes(line.as_bytes())
    }

    /// Validate a raw header line
    ///
    /// One trailing LF and one trailing CR are stripped. Any other CR, LF
    /// or 0x1A byte is rejected since it would corrupt the file layout.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let line = bytes.strip_suffix(b"\n").unwrap_or(bytes);
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if !is_imd_signature(line) {
            return Err(ImdError::invalid_format("Missing IMD signature"));
        }
        if line.len() >= MAX_HEADER_LINE {
            return Err(ImdError::invalid_format("Header line too long"));
        }
        if let Some(pos) = line.iter().position(|&b| is_line_breaking(b)) {
            return Err(ImdError::invalid_format(format!(
                "Control byte 0x{:02X} in header line at offset {}",
                line[pos], pos
            )));
        }
        Ok(Self {
            line: line.to_vec(),
        })
    }

    /// The header line as stored
    pub fn as_bytes(&self) -> &[u8] {
        &self.line
    }

    /// The header line for display
    pub fn line(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.line)
    }

    /// Text between the signature and the first colon, e.g. `1.18`
    pub fn version(&self) -> Option<&str> {
        let rest = self.line.strip_prefix(b"IMD ")?;
        let end = rest.iter().position(|&b| b == b':')?;
        std::str::from_utf8(&rest[..end]).ok().map(str::trim)
    }

    /// Creation time, when the header carries one in the usual format
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        let colon = self.line.iter().position(|&b| b == b':')?;
        let rest = std::str::from_utf8(&self.line[colon + 1..]).ok()?;
        NaiveDateTime::parse_from_str(rest.trim(), TIMESTAMP_FORMAT).ok()
    }
}

fn stamp(creator: &str, timestamp: NaiveDateTime) -> Vec<u8> {
    format!("IMD {}: {}", creator, timestamp.format(TIMESTAMP_FORMAT)).into_bytes()
}

impl fmt::Display for ImdHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.line())
    }
}
