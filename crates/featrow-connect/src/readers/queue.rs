//! Queue readers (pub/sub and partitioned stream)
//!
//! Queue-backed sources are unbounded: the stream terminates only when the
//! transport closes the subscription or the consumer cancels by dropping the
//! stream. Cancellation must release the underlying subscription promptly
//! and exactly once, which [`SubscriptionGuard`] enforces.
//!
//! The queue transport (broker connection, ack handling) is an external
//! collaborator injected behind [`QueueTransport`].

use super::{options_from_descriptor, Frame, FrameReader, FrameRecovery, FrameStream, ReaderFactory};
use crate::descriptor::SourceDescriptor;
use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;
use validator::Validate;

/// An open subscription on a queue transport
#[async_trait]
pub trait Subscription: Send + Sync {
    /// Pull the next raw frame, blocking until one is available.
    /// `None` means the transport closed the subscription.
    async fn next_frame(&self) -> Result<Option<Bytes>>;

    /// Release transport resources held by this subscription
    fn release(&self);
}

/// Queue transport seam: connects a subscription target to a live
/// subscription
#[async_trait]
pub trait QueueTransport: Send + Sync {
    async fn subscribe(&self, target: &str) -> Result<Arc<dyn Subscription>>;
}

/// Releases a subscription exactly once, on explicit release or on drop
///
/// Dropping a queue-backed record stream mid-consumption drops the guard,
/// so early abandonment cannot leak the subscription; the atomic swap
/// guarantees the transport sees a single release even if the stream also
/// ran to completion.
pub struct SubscriptionGuard {
    subscription: Arc<dyn Subscription>,
    released: AtomicBool,
}

impl SubscriptionGuard {
    pub fn new(subscription: Arc<dyn Subscription>) -> Self {
        Self {
            subscription,
            released: AtomicBool::new(false),
        }
    }

    /// Release now instead of waiting for drop
    pub fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.subscription.release();
        }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Pub/sub reader options
#[derive(Debug, Clone, Deserialize, Serialize, Validate, JsonSchema)]
pub struct PubsubReaderOptions {
    /// Subscription to attach to
    #[validate(length(min = 1))]
    pub subscription: String,
}

/// Stream reader options
#[derive(Debug, Clone, Deserialize, Serialize, Validate, JsonSchema)]
pub struct StreamReaderOptions {
    /// Topic to consume
    #[validate(length(min = 1))]
    pub topic: String,
}

/// Which descriptor option names the subscription target
#[derive(Debug, Clone, Copy)]
enum QueueTarget {
    Subscription,
    Topic,
}

/// Reader over a queue subscription
///
/// Shared by the pub/sub and stream kinds; they differ only in which option
/// names the target and in how the external transport interprets it.
pub struct QueueReader {
    transport: Arc<dyn QueueTransport>,
    target: QueueTarget,
}

#[async_trait]
impl FrameReader for QueueReader {
    async fn open(&self, descriptor: &SourceDescriptor) -> Result<FrameStream> {
        let target = match self.target {
            QueueTarget::Subscription => {
                options_from_descriptor::<PubsubReaderOptions>(descriptor)?.subscription
            }
            QueueTarget::Topic => {
                options_from_descriptor::<StreamReaderOptions>(descriptor)?.topic
            }
        };
        let transport = self.transport.clone();

        let stream = async_stream::stream! {
            let subscription = match transport.subscribe(&target).await {
                Ok(s) => s,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            let guard = SubscriptionGuard::new(subscription.clone());

            debug!(target = %target, "queue subscription attached");

            let mut position = 0u64;
            loop {
                match subscription.next_frame().await {
                    Ok(Some(payload)) => {
                        position += 1;
                        yield Ok(Frame::new(position, payload));
                    }
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }

            guard.release();
        };

        Ok(Box::pin(stream))
    }
}

/// Factory for the pub/sub queue registry entry
pub struct PubsubReaderFactory {
    transport: Arc<dyn QueueTransport>,
}

impl PubsubReaderFactory {
    pub fn new(transport: Arc<dyn QueueTransport>) -> Self {
        Self { transport }
    }
}

impl ReaderFactory for PubsubReaderFactory {
    fn recovery(&self) -> FrameRecovery {
        FrameRecovery::SkipAndCount
    }

    fn create(&self) -> Box<dyn FrameReader> {
        Box::new(QueueReader {
            transport: self.transport.clone(),
            target: QueueTarget::Subscription,
        })
    }
}

/// Factory for the partitioned-stream queue registry entry
pub struct StreamReaderFactory {
    transport: Arc<dyn QueueTransport>,
}

impl StreamReaderFactory {
    pub fn new(transport: Arc<dyn QueueTransport>) -> Self {
        Self { transport }
    }
}

impl ReaderFactory for StreamReaderFactory {
    fn recovery(&self) -> FrameRecovery {
        FrameRecovery::SkipAndCount
    }

    fn create(&self) -> Box<dyn FrameReader> {
        Box::new(QueueReader {
            transport: self.transport.clone(),
            target: QueueTarget::Topic,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::SourceKind;
    use futures::StreamExt;
    use parking_lot::Mutex;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::AtomicU64;

    struct StubSubscription {
        frames: Mutex<VecDeque<Bytes>>,
        releases: Arc<AtomicU64>,
    }

    #[async_trait]
    impl Subscription for StubSubscription {
        async fn next_frame(&self) -> Result<Option<Bytes>> {
            Ok(self.frames.lock().pop_front())
        }

        fn release(&self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct StubTransport {
        frames: Vec<Bytes>,
        releases: Arc<AtomicU64>,
    }

    #[async_trait]
    impl QueueTransport for StubTransport {
        async fn subscribe(&self, _target: &str) -> Result<Arc<dyn Subscription>> {
            Ok(Arc::new(StubSubscription {
                frames: Mutex::new(self.frames.iter().cloned().collect()),
                releases: self.releases.clone(),
            }))
        }
    }

    fn pubsub_descriptor() -> SourceDescriptor {
        let mut options = HashMap::new();
        options.insert("subscription".to_string(), "rows-sub".to_string());
        SourceDescriptor::new(SourceKind::QueuePubsub, options)
    }

    #[tokio::test]
    async fn test_exhausted_subscription_released_once() {
        let releases = Arc::new(AtomicU64::new(0));
        let reader = QueueReader {
            transport: Arc::new(StubTransport {
                frames: vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")],
                releases: releases.clone(),
            }),
            target: QueueTarget::Subscription,
        };

        let mut stream = reader.open(&pubsub_descriptor()).await.unwrap();
        let mut seen = 0;
        while let Some(frame) = stream.next().await {
            frame.unwrap();
            seen += 1;
        }
        drop(stream);

        assert_eq!(seen, 2);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dropping_stream_mid_consumption_releases_once() {
        let releases = Arc::new(AtomicU64::new(0));
        let reader = QueueReader {
            transport: Arc::new(StubTransport {
                frames: vec![
                    Bytes::from_static(b"a"),
                    Bytes::from_static(b"b"),
                    Bytes::from_static(b"c"),
                ],
                releases: releases.clone(),
            }),
            target: QueueTarget::Subscription,
        };

        let mut stream = reader.open(&pubsub_descriptor()).await.unwrap();
        stream.next().await.unwrap().unwrap();
        drop(stream);

        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dropping_unpulled_stream_releases_nothing() {
        // No subscription exists until the first pull, so nothing to release.
        let releases = Arc::new(AtomicU64::new(0));
        let reader = QueueReader {
            transport: Arc::new(StubTransport {
                frames: vec![Bytes::from_static(b"a")],
                releases: releases.clone(),
            }),
            target: QueueTarget::Subscription,
        };

        let stream = reader.open(&pubsub_descriptor()).await.unwrap();
        drop(stream);

        assert_eq!(releases.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_guard_release_is_idempotent() {
        let releases = Arc::new(AtomicU64::new(0));
        let subscription: Arc<dyn Subscription> = Arc::new(StubSubscription {
            frames: Mutex::new(VecDeque::new()),
            releases: releases.clone(),
        });

        let guard = SubscriptionGuard::new(subscription);
        guard.release();
        guard.release();
        drop(guard);

        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }
}
