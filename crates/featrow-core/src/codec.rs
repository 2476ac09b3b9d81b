//! Strict binary codec for the canonical record
//!
//! Encoding a well-formed in-memory row always succeeds; decoding either
//! yields a complete [`FeatureRow`] or fails with [`CodecError`]. Trailing
//! bytes after a structurally valid record are rejected so a truncated or
//! concatenated frame can never silently produce a partial row.
//!
//! Round-trip law: `decode(encode(r)) == r` for every valid `r`.

use crate::record::FeatureRow;
use thiserror::Error;

/// Maximum accepted size of a single encoded record (4 MiB)
pub const MAX_RECORD_SIZE: usize = 4 * 1024 * 1024;

/// Codec error types
#[derive(Debug, Error)]
pub enum CodecError {
    /// Record bytes do not parse as a complete canonical record
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// Encoded record exceeds the size bound
    #[error("record size {0} exceeds maximum {1}")]
    RecordTooLarge(usize, usize),

    /// In-memory record failed to serialize
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Encode a row to canonical wire bytes
pub fn encode(row: &FeatureRow) -> Result<Vec<u8>, CodecError> {
    postcard::to_allocvec(row).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decode canonical wire bytes into a row
///
/// Strict: the input must contain exactly one complete record. A parse
/// failure, a truncated buffer, or trailing bytes all fail with
/// [`CodecError::MalformedRecord`]; no partially decoded row is ever
/// returned. Oversized input is rejected before any parsing.
pub fn decode(data: &[u8]) -> Result<FeatureRow, CodecError> {
    if data.len() > MAX_RECORD_SIZE {
        return Err(CodecError::RecordTooLarge(data.len(), MAX_RECORD_SIZE));
    }

    let (row, rest) = postcard::take_from_bytes::<FeatureRow>(data)
        .map_err(|e| CodecError::MalformedRecord(e.to_string()))?;

    if !rest.is_empty() {
        return Err(CodecError::MalformedRecord(format!(
            "{} trailing bytes after record",
            rest.len()
        )));
    }

    Ok(row)
}
