//! Source descriptors
//!
//! A [`SourceDescriptor`] is the single external input to the ingestion
//! router: it names where data comes from and in what shape. Descriptors are
//! immutable once constructed and validated purely (no I/O) before any reader
//! is touched.

use crate::error::{IngestError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Transport kind of an ingestion source (closed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Flat file on local disk
    File,
    /// Data warehouse export
    Warehouse,
    /// Message queue, pub/sub delivery
    QueuePubsub,
    /// Message queue, partitioned stream delivery
    QueueStream,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::File => "file",
            SourceKind::Warehouse => "warehouse",
            SourceKind::QueuePubsub => "queue_pubsub",
            SourceKind::QueueStream => "queue_stream",
        }
    }

    /// Whether streams from this kind terminate on their own
    pub fn is_finite(&self) -> bool {
        matches!(self, SourceKind::File | SourceKind::Warehouse)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "file" => Ok(SourceKind::File),
            "warehouse" => Ok(SourceKind::Warehouse),
            "queue_pubsub" | "pubsub" => Ok(SourceKind::QueuePubsub),
            "queue_stream" | "stream" => Ok(SourceKind::QueueStream),
            _ => Err(IngestError::configuration(format!(
                "unknown source kind: {}",
                s
            ))),
        }
    }
}

/// File encoding of a `file` source (closed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    /// Comma-separated values with a header row
    Csv,
    /// Newline-delimited JSON objects
    Json,
}

impl FileFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Json => "json",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FileFormat {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(FileFormat::Csv),
            "json" | "jsonl" => Ok(FileFormat::Json),
            _ => Err(IngestError::configuration(format!("unknown format: {}", s))),
        }
    }
}

/// Declarative description of one ingestion source
///
/// Owned by the router for the lifetime of an ingestion job. Fields are
/// private; the descriptor cannot change after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    kind: SourceKind,
    options: HashMap<String, String>,
}

impl SourceDescriptor {
    /// Create a descriptor from an already-typed kind
    pub fn new(kind: SourceKind, options: HashMap<String, String>) -> Self {
        Self { kind, options }
    }

    /// Create a descriptor from configuration text, matching the kind
    /// case-insensitively against the closed set
    pub fn from_parts(kind: &str, options: HashMap<String, String>) -> Result<Self> {
        Ok(Self {
            kind: kind.parse()?,
            options,
        })
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Look up an option value
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    pub fn options(&self) -> &HashMap<String, String> {
        &self.options
    }

    /// Resolve the declared file format of a `file` source
    pub fn file_format(&self) -> Result<FileFormat> {
        let format = self.option("format").ok_or_else(|| {
            IngestError::configuration("format missing from file source descriptor")
        })?;
        format.parse()
    }

    /// Validate the descriptor without touching any I/O
    ///
    /// Rules run in order; the first failure wins. Each source kind has a
    /// required-option set matching its reader contract.
    pub fn validate(&self) -> Result<()> {
        match self.kind {
            SourceKind::File => self.file_format().map(|_| ()),
            SourceKind::Warehouse => self.require_option("table"),
            SourceKind::QueuePubsub => self.require_option("subscription"),
            SourceKind::QueueStream => self.require_option("topic"),
        }
    }

    fn require_option(&self, key: &str) -> Result<()> {
        match self.option(key) {
            Some(value) if !value.is_empty() => Ok(()),
            _ => Err(IngestError::configuration(format!(
                "{} option missing from {} source descriptor",
                key, self.kind
            ))),
        }
    }
}
