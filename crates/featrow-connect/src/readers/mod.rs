//! Reader contract
//!
//! A reader turns one ingestion source into a lazy stream of raw framed
//! records. Readers must not touch their transport before the first pull;
//! all I/O happens inside the returned stream. Decoding frames into
//! canonical records is the router's job, not the reader's.

pub mod file;
pub mod queue;
pub mod warehouse;

use crate::descriptor::SourceDescriptor;
use crate::error::{IngestError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::de::DeserializeOwned;
use validator::Validate;

pub use file::{CsvReaderFactory, CsvReaderOptions, JsonReaderFactory, JsonReaderOptions};
pub use queue::{
    PubsubReaderFactory, QueueTransport, StreamReaderFactory, Subscription, SubscriptionGuard,
};
pub use warehouse::{WarehouseClient, WarehouseReaderFactory, WarehouseReaderOptions};

/// One raw framed record as delivered by a transport
#[derive(Debug, Clone)]
pub struct Frame {
    /// 1-based position within the source's delivery order
    pub position: u64,

    /// Raw record bytes, to be decoded by the canonical codec
    pub payload: Bytes,
}

impl Frame {
    pub fn new(position: u64, payload: impl Into<Bytes>) -> Self {
        Self {
            position,
            payload: payload.into(),
        }
    }
}

/// What the router does with a frame that fails to decode
///
/// File and warehouse transports have no framing recovery mid-read: a bad
/// frame poisons the rest of the read and the stream terminates. Queue
/// transports frame each message independently, so a bad frame is skipped
/// and counted while the stream continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRecovery {
    /// Terminate the stream at the malformed frame
    Fatal,
    /// Skip the malformed frame, count it, continue
    SkipAndCount,
}

/// Lazy stream of raw frames from one source
pub type FrameStream = BoxStream<'static, Result<Frame>>;

/// Transport-specific reader producing raw framed records
#[async_trait]
pub trait FrameReader: Send + Sync {
    /// Open the source described by `descriptor` and return its frame
    /// stream.
    ///
    /// Implementations parse and validate their options here (pure, may
    /// fail with a configuration error) but must defer all transport I/O
    /// into the stream itself: nothing is read until the first pull.
    async fn open(&self, descriptor: &SourceDescriptor) -> Result<FrameStream>;
}

/// Factory for creating reader instances
///
/// One factory is registered per (kind, format) pair; see
/// [`crate::registry::ReaderRegistry`].
pub trait ReaderFactory: Send + Sync {
    /// Malformed-frame policy of the underlying transport
    fn recovery(&self) -> FrameRecovery;

    /// Create a reader instance
    fn create(&self) -> Box<dyn FrameReader>;
}

/// Parse a typed options struct out of a descriptor's string options
pub(crate) fn options_from_descriptor<T>(descriptor: &SourceDescriptor) -> Result<T>
where
    T: DeserializeOwned + Validate,
{
    let value = serde_json::to_value(descriptor.options())
        .map_err(|e| IngestError::configuration(e.to_string()))?;
    let options: T = serde_json::from_value(value).map_err(|e| {
        IngestError::configuration(format!(
            "invalid options for {} source: {}",
            descriptor.kind(),
            e
        ))
    })?;
    options
        .validate()
        .map_err(|e| IngestError::configuration(e.to_string()))?;
    Ok(options)
}
