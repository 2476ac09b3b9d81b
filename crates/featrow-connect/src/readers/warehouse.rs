//! Warehouse export reader
//!
//! The warehouse client itself (query execution, pagination, auth) is an
//! external collaborator injected behind [`WarehouseClient`]. The reader only
//! frames the exported rows; the export is not started until the first pull.

use super::{options_from_descriptor, Frame, FrameReader, FrameRecovery, FrameStream, ReaderFactory};
use crate::descriptor::SourceDescriptor;
use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use validator::Validate;

/// Client seam for warehouse table exports
#[async_trait]
pub trait WarehouseClient: Send + Sync {
    /// Export every row of `table` as canonical-encoded payloads, in table
    /// scan order
    async fn export(&self, table: &str) -> Result<Vec<Bytes>>;
}

/// Warehouse reader options
#[derive(Debug, Clone, Deserialize, Serialize, Validate, JsonSchema)]
pub struct WarehouseReaderOptions {
    /// Fully qualified table to export
    #[validate(length(min = 1))]
    pub table: String,
}

/// Reader over a warehouse table export
pub struct WarehouseReader {
    client: Arc<dyn WarehouseClient>,
}

#[async_trait]
impl FrameReader for WarehouseReader {
    async fn open(&self, descriptor: &SourceDescriptor) -> Result<FrameStream> {
        let options: WarehouseReaderOptions = options_from_descriptor(descriptor)?;
        let client = self.client.clone();

        let stream = async_stream::stream! {
            debug!(table = %options.table, "starting warehouse export");

            match client.export(&options.table).await {
                Ok(rows) => {
                    for (i, payload) in rows.into_iter().enumerate() {
                        yield Ok(Frame::new(i as u64 + 1, payload));
                    }
                }
                Err(e) => {
                    yield Err(e);
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Factory for the warehouse registry entry
///
/// Constructed with the embedding application's warehouse client.
pub struct WarehouseReaderFactory {
    client: Arc<dyn WarehouseClient>,
}

impl WarehouseReaderFactory {
    pub fn new(client: Arc<dyn WarehouseClient>) -> Self {
        Self { client }
    }
}

impl ReaderFactory for WarehouseReaderFactory {
    fn recovery(&self) -> FrameRecovery {
        FrameRecovery::Fatal
    }

    fn create(&self) -> Box<dyn FrameReader> {
        Box::new(WarehouseReader {
            client: self.client.clone(),
        })
    }
}
