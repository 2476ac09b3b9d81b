//! Ingestion router
//!
//! The router is the single choke point between a declared source and a
//! stream of canonical records: it validates the descriptor, resolves the
//! reader through the registry, and composes the reader's raw frames with
//! the canonical codec. Configuration errors surface before any I/O occurs,
//! so a rejected job emits no partial output.
//!
//! Malformed frames are handled per transport. File and warehouse reads have
//! no mid-file framing recovery, so the stream terminates at the bad frame
//! and later frames are never observed. Queue transports frame messages
//! independently, so a bad frame is logged, counted on the stream's defect
//! counter, and skipped.

use crate::descriptor::SourceDescriptor;
use crate::error::{IngestError, Result};
use crate::readers::{FrameRecovery, FrameStream};
use crate::registry::{ReaderKey, ReaderRegistry};
use featrow_core::FeatureRow;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::{debug, warn};

/// Counter of malformed frames skipped on a queue-backed stream
///
/// Cloned handles share one counter; the caller keeps one to inspect defects
/// while the stream owns another.
#[derive(Debug, Clone, Default)]
pub struct DefectCounter(Arc<AtomicU64>);

impl DefectCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Pull-based stream of canonical records from one source
///
/// Single-consumer: pulling is not safe for concurrent callers on the same
/// instance. Records arrive in the order the transport delivered their raw
/// frames. Finite for file and warehouse sources, unbounded for queue
/// sources; dropping the stream cancels the underlying read.
pub struct RecordStream {
    records: BoxStream<'static, Result<FeatureRow>>,
    defects: DefectCounter,
}

impl RecordStream {
    /// Handle to this stream's defect counter
    pub fn defects(&self) -> DefectCounter {
        self.defects.clone()
    }
}

impl std::fmt::Debug for RecordStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStream")
            .field("defects", &self.defects)
            .finish_non_exhaustive()
    }
}

impl Stream for RecordStream {
    type Item = Result<FeatureRow>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.records.poll_next_unpin(cx)
    }
}

/// Routes descriptors to readers and decodes their frames
pub struct IngestionRouter {
    registry: ReaderRegistry,
}

impl IngestionRouter {
    /// Create a router over an explicitly constructed registry
    pub fn new(registry: ReaderRegistry) -> Self {
        Self { registry }
    }

    /// Resolve a descriptor into a lazy record stream
    ///
    /// Validation and reader resolution happen here, before any I/O; the
    /// returned stream touches its transport only on the first pull.
    /// Configuration errors propagate untouched. A syntactically valid
    /// kind/format pair with no registered reader is the distinct
    /// "unsupported combination" configuration error.
    pub async fn route(&self, descriptor: SourceDescriptor) -> Result<RecordStream> {
        descriptor.validate()?;

        let key = ReaderKey::for_descriptor(&descriptor)?;
        let factory = self.registry.get(&key).ok_or_else(|| {
            IngestError::configuration(format!("unsupported combination: {}", key))
        })?;

        let recovery = factory.recovery();
        let reader = factory.create();
        let frames = reader.open(&descriptor).await?;

        debug!(key = %key, "routed ingestion source");

        let defects = DefectCounter::new();
        let records = decode_frames(frames, recovery, defects.clone());

        Ok(RecordStream { records, defects })
    }
}

/// Compose a frame stream with the canonical codec
fn decode_frames(
    mut frames: FrameStream,
    recovery: FrameRecovery,
    defects: DefectCounter,
) -> BoxStream<'static, Result<FeatureRow>> {
    let stream = async_stream::stream! {
        while let Some(item) = frames.next().await {
            let error = match item {
                Ok(frame) => match FeatureRow::from_bytes(&frame.payload) {
                    Ok(row) => {
                        yield Ok(row);
                        continue;
                    }
                    Err(e) => IngestError::malformed(frame.position, e.to_string()),
                },
                Err(e) => e,
            };

            // Per-frame defects are recoverable on skip-capable transports;
            // everything else (transport, configuration) ends the stream.
            if error.is_malformed() && recovery == FrameRecovery::SkipAndCount {
                warn!(error = %error, "skipping malformed frame");
                defects.increment();
                continue;
            }

            yield Err(error);
            break;
        }
    };

    Box::pin(stream)
}
