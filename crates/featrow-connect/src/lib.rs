//! Featrow Connect — source routing and record validation
//!
//! This crate decides how a feature row enters the system. Given a
//! declarative [`SourceDescriptor`], the [`IngestionRouter`] validates it,
//! resolves a reader through the immutable [`ReaderRegistry`], and returns a
//! lazy, pull-based stream of canonical records. Configuration errors are
//! caught before any data movement begins; malformed frames surface per the
//! transport's recovery policy.
//!
//! # Architecture
//!
//! ```text
//! SourceDescriptor ──► IngestionRouter ──► FrameReader ──► raw frames
//!                          │ (validate,                       │
//!                          │  dispatch)                       ▼
//!                          │                         canonical codec
//!                          ▼                               decode
//!                     RecordStream  ◄──────────────  FeatureRow / error
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use featrow_connect::{IngestionRouter, ReaderRegistry, SourceDescriptor};
//! use futures::StreamExt;
//!
//! let router = IngestionRouter::new(ReaderRegistry::builtin());
//! let descriptor = SourceDescriptor::from_parts("file", options)?;
//!
//! let mut records = router.route(descriptor).await?;
//! while let Some(row) = records.next().await {
//!     process(row?);
//! }
//! ```

pub mod config;
pub mod descriptor;
pub mod error;
pub mod readers;
pub mod registry;
pub mod router;

pub use config::{IngestConfig, SourceSpec};
pub use descriptor::{FileFormat, SourceDescriptor, SourceKind};
pub use error::{IngestError, Result};
pub use readers::{
    CsvReaderFactory, Frame, FrameReader, FrameRecovery, FrameStream, JsonReaderFactory,
    PubsubReaderFactory, QueueTransport, ReaderFactory, StreamReaderFactory, Subscription,
    WarehouseClient, WarehouseReaderFactory,
};
pub use registry::{ReaderKey, ReaderRegistry, ReaderRegistryBuilder};
pub use router::{DefectCounter, IngestionRouter, RecordStream};
