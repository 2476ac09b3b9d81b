//! Error types for featrow-connect
//!
//! The ingestion layer has exactly three observable failure classes:
//! configuration problems (always pre-I/O, fatal to the job), malformed
//! records (per-source policy), and transport failures (passed through
//! unchanged from the readers).

use thiserror::Error;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Errors raised by the ingestion layer
#[derive(Debug, Error)]
pub enum IngestError {
    /// Descriptor is structurally invalid or requests an unsupported
    /// combination. Detected before any I/O, never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A single frame's bytes did not decode to a valid canonical record
    #[error("malformed record at position {position}: {reason}")]
    MalformedRecord { position: u64, reason: String },

    /// Transport failure from an external reader, passed through unchanged.
    /// Retry policy belongs to the reader/orchestration layer.
    #[error("transport error: {0}")]
    Transport(String),
}

impl IngestError {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a malformed-record error for one frame
    pub fn malformed(position: u64, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            position,
            reason: reason.into(),
        }
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Check if this is a configuration error
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Check if this is a per-frame malformed-record error
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedRecord { .. })
    }
}

impl From<std::io::Error> for IngestError {
    fn from(e: std::io::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<serde_yaml::Error> for IngestError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Configuration(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = IngestError::malformed(7, "truncated varint");
        assert_eq!(
            err.to_string(),
            "malformed record at position 7: truncated varint"
        );

        let err = IngestError::configuration("unknown source kind: ftp");
        assert_eq!(err.to_string(), "configuration error: unknown source kind: ftp");
    }

    #[test]
    fn test_error_predicates() {
        assert!(IngestError::configuration("x").is_configuration());
        assert!(!IngestError::configuration("x").is_malformed());
        assert!(IngestError::malformed(1, "x").is_malformed());
        assert!(!IngestError::transport("x").is_configuration());
    }

    #[test]
    fn test_io_error_maps_to_transport() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err: IngestError = io.into();
        assert!(matches!(err, IngestError::Transport(_)));
    }
}
