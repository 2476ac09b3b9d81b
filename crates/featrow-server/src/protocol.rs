//! Serving wire protocol
//!
//! Length-prefixed postcard messages between clients and the feature server.
//!
//! # Protocol Stability
//!
//! Variant order is significant for postcard serialization. New variants
//! must only be added at the end of each enum.

use featrow_core::FeatureRow;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum accepted inbound frame size (8 MiB)
pub const MAX_FRAME_SIZE: usize = 8 * 1024 * 1024;

/// Wire protocol error types
#[derive(Debug, Error)]
pub enum WireError {
    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Frame exceeds the size bound
    #[error("frame size {0} exceeds maximum {1}")]
    FrameTooLarge(usize, usize),
}

/// Result type for wire operations
pub type WireResult<T> = std::result::Result<T, WireError>;

/// Requests accepted by the feature server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    /// Liveness check
    Ping,

    /// Fetch the latest ingested row for one entity
    GetRow {
        entity_name: String,
        entity_key: String,
    },
}

/// Responses produced by the feature server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    /// Liveness reply
    Pong,

    /// Row lookup result (None when the entity has no ingested row)
    Row(Option<FeatureRow>),

    /// Request failed
    Error(String),
}

impl Request {
    pub fn to_bytes(&self) -> WireResult<Vec<u8>> {
        postcard::to_allocvec(self).map_err(|e| WireError::Serialization(e.to_string()))
    }

    pub fn from_bytes(data: &[u8]) -> WireResult<Self> {
        if data.len() > MAX_FRAME_SIZE {
            return Err(WireError::FrameTooLarge(data.len(), MAX_FRAME_SIZE));
        }
        postcard::from_bytes(data).map_err(|e| WireError::Deserialization(e.to_string()))
    }
}

impl Response {
    pub fn to_bytes(&self) -> WireResult<Vec<u8>> {
        postcard::to_allocvec(self).map_err(|e| WireError::Serialization(e.to_string()))
    }

    pub fn from_bytes(data: &[u8]) -> WireResult<Self> {
        if data.len() > MAX_FRAME_SIZE {
            return Err(WireError::FrameTooLarge(data.len(), MAX_FRAME_SIZE));
        }
        postcard::from_bytes(data).map_err(|e| WireError::Deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_roundtrip() {
        let requests = vec![
            Request::Ping,
            Request::GetRow {
                entity_name: "driver".to_string(),
                entity_key: "driver-42".to_string(),
            },
        ];

        for request in requests {
            let bytes = request.to_bytes().expect("serialize failed");
            let decoded = Request::from_bytes(&bytes).expect("deserialize failed");
            assert_eq!(request, decoded);
        }
    }

    #[test]
    fn test_response_roundtrip() {
        let row = FeatureRow::new("driver", "driver-42", 1_700_000_000_000)
            .with_field("trips", b"7".to_vec());
        let responses = vec![
            Response::Pong,
            Response::Row(Some(row)),
            Response::Row(None),
            Response::Error("no such entity".to_string()),
        ];

        for response in responses {
            let bytes = response.to_bytes().expect("serialize failed");
            let decoded = Response::from_bytes(&bytes).expect("deserialize failed");
            assert_eq!(response, decoded);
        }
    }

    #[test]
    fn test_garbage_request_rejected() {
        assert!(Request::from_bytes(&[0xff; 32]).is_err());
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let data = vec![0u8; MAX_FRAME_SIZE + 1];
        assert!(matches!(
            Request::from_bytes(&data),
            Err(WireError::FrameTooLarge(_, _))
        ));
    }
}
