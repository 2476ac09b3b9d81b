//! Feature serving over TCP
//!
//! The server is wired to one shared [`BoundedExecutor`] at construction and
//! dispatches every inbound connection through it; it never spawns unbounded
//! per-request work. Connections beyond the executor's capacity are rejected
//! at accept time, per the pool's backpressure policy.

use crate::executor::{BoundedExecutor, ExecutorError};
use crate::protocol::{Request, Response, MAX_FRAME_SIZE};
use bytes::BytesMut;
use featrow_core::FeatureRow;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServeConfig {
    /// Address to bind
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_bind_addr() -> String {
    "127.0.0.1:7462".to_string()
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

/// Read-only lookup of ingested rows
///
/// Storage itself lives elsewhere; the server only needs latest-row lookup
/// by entity.
pub trait RowStore: Send + Sync + 'static {
    fn get(&self, entity_name: &str, entity_key: &str) -> Option<FeatureRow>;
}

/// In-memory row store, keyed by (entity name, entity key)
#[derive(Default)]
pub struct InMemoryRowStore {
    rows: RwLock<HashMap<(String, String), FeatureRow>>,
}

impl InMemoryRowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the latest row for an entity
    pub fn insert(&self, row: FeatureRow) {
        let key = (row.entity_name.clone(), row.entity_key.clone());
        self.rows.write().insert(key, row);
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

impl RowStore for InMemoryRowStore {
    fn get(&self, entity_name: &str, entity_key: &str) -> Option<FeatureRow> {
        self.rows
            .read()
            .get(&(entity_name.to_string(), entity_key.to_string()))
            .cloned()
    }
}

/// Featrow serving server
pub struct FeatureServer {
    executor: BoundedExecutor,
    store: Arc<dyn RowStore>,
    listener: Option<TcpListener>,
}

impl FeatureServer {
    /// Create a new server bound to the configured address
    ///
    /// The executor is the server's only source of request concurrency; it
    /// is wired here once and held for the server's lifetime.
    pub async fn new(
        config: ServeConfig,
        executor: BoundedExecutor,
        store: Arc<dyn RowStore>,
    ) -> anyhow::Result<Self> {
        // Pre-bind the listener so we can report the actual address
        let listener = TcpListener::bind(&config.bind_addr).await?;

        Ok(Self {
            executor,
            store,
            listener: Some(listener),
        })
    }

    /// Get the local address the server is bound to
    ///
    /// Useful for tests where port 0 is used for random port selection.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener
            .as_ref()
            .ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::NotConnected, "Server not bound")
            })
            .and_then(|l| l.local_addr())
    }

    /// Start serving
    pub async fn start(mut self) -> anyhow::Result<()> {
        let listener = self
            .listener
            .take()
            .ok_or_else(|| anyhow::anyhow!("Server already started"))?;

        let addr = listener.local_addr()?;
        info!(
            "Starting featrow server on {} (pool capacity {})",
            addr,
            self.executor.capacity()
        );

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let store = self.store.clone();

                    match self.executor.try_submit(async move {
                        if let Err(e) = handle_connection(stream, store).await {
                            error!("Error handling connection from {}: {}", peer, e);
                        }
                    }) {
                        Ok(_) => {}
                        Err(ExecutorError::Saturated(capacity)) => {
                            // The stream drops here, closing the connection
                            // instead of queueing unbounded work.
                            warn!(
                                "Executor saturated ({} in flight), rejecting {}",
                                capacity, peer
                            );
                        }
                        Err(e) => {
                            error!("Failed to submit connection handler: {}", e);
                        }
                    }
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }
}

/// Handle a single client connection
async fn handle_connection(mut stream: TcpStream, store: Arc<dyn RowStore>) -> anyhow::Result<()> {
    let mut buffer = BytesMut::with_capacity(8192);

    loop {
        // Read length prefix (4 bytes)
        let mut len_buf = [0u8; 4];
        match stream.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        let msg_len = u32::from_be_bytes(len_buf) as usize;

        if msg_len > MAX_FRAME_SIZE {
            warn!("Frame too large: {} bytes", msg_len);
            return Ok(());
        }

        buffer.clear();
        buffer.resize(msg_len, 0);
        stream.read_exact(&mut buffer).await?;

        let response = match Request::from_bytes(&buffer) {
            Ok(request) => handle_request(request, &store),
            Err(e) => Response::Error(e.to_string()),
        };

        let response_bytes = match response.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to serialize response: {}", e);
                continue;
            }
        };

        let len = response_bytes.len() as u32;
        stream.write_all(&len.to_be_bytes()).await?;
        stream.write_all(&response_bytes).await?;
        stream.flush().await?;
    }
}

fn handle_request(request: Request, store: &Arc<dyn RowStore>) -> Response {
    match request {
        Request::Ping => Response::Pong,
        Request::GetRow {
            entity_name,
            entity_key,
        } => Response::Row(store.get(&entity_name, &entity_key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(key: &str) -> FeatureRow {
        FeatureRow::new("driver", key, 1_700_000_000_000).with_field("trips", b"7".to_vec())
    }

    #[test]
    fn test_in_memory_store_latest_wins() {
        let store = InMemoryRowStore::new();
        store.insert(row("d-1"));
        store.insert(
            FeatureRow::new("driver", "d-1", 1_700_000_001_000).with_field("trips", b"8".to_vec()),
        );

        assert_eq!(store.len(), 1);
        let latest = store.get("driver", "d-1").unwrap();
        assert_eq!(latest.event_timestamp_ms, 1_700_000_001_000);
    }

    #[test]
    fn test_handle_request_lookup() {
        let store = InMemoryRowStore::new();
        store.insert(row("d-1"));
        let store: Arc<dyn RowStore> = Arc::new(store);

        assert_eq!(handle_request(Request::Ping, &store), Response::Pong);

        let found = handle_request(
            Request::GetRow {
                entity_name: "driver".to_string(),
                entity_key: "d-1".to_string(),
            },
            &store,
        );
        assert!(matches!(found, Response::Row(Some(_))));

        let missing = handle_request(
            Request::GetRow {
                entity_name: "driver".to_string(),
                entity_key: "d-404".to_string(),
            },
            &store,
        );
        assert_eq!(missing, Response::Row(None));
    }
}
