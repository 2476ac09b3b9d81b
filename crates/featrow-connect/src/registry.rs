//! Reader registry
//!
//! Maps a (source kind, file format) pair to the factory that constructs its
//! reader. The mapping is a closed set: it is assembled once through the
//! builder at startup and cannot change afterwards. A lookup miss is a
//! configuration error surfaced by the router, never a crash.

use crate::descriptor::{FileFormat, SourceDescriptor, SourceKind};
use crate::error::Result;
use crate::readers::{CsvReaderFactory, JsonReaderFactory, ReaderFactory};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Registry key: source kind plus, for file sources, the declared format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReaderKey {
    pub kind: SourceKind,
    pub format: Option<FileFormat>,
}

impl ReaderKey {
    /// Key for a file source with the given format
    pub fn file(format: FileFormat) -> Self {
        Self {
            kind: SourceKind::File,
            format: Some(format),
        }
    }

    /// Key for a non-file source kind
    pub fn kind(kind: SourceKind) -> Self {
        Self { kind, format: None }
    }

    /// Resolve the key for a validated descriptor
    pub fn for_descriptor(descriptor: &SourceDescriptor) -> Result<Self> {
        match descriptor.kind() {
            SourceKind::File => Ok(Self::file(descriptor.file_format()?)),
            kind => Ok(Self::kind(kind)),
        }
    }
}

impl fmt::Display for ReaderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.format {
            Some(format) => write!(f, "{}/{}", self.kind, format),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// Immutable mapping from reader key to reader factory
///
/// Constructed once via [`ReaderRegistry::builder`] and handed to the router;
/// there is no runtime registration.
pub struct ReaderRegistry {
    entries: HashMap<ReaderKey, Arc<dyn ReaderFactory>>,
}

impl ReaderRegistry {
    /// Start building a registry
    pub fn builder() -> ReaderRegistryBuilder {
        ReaderRegistryBuilder {
            entries: HashMap::new(),
        }
    }

    /// The built-in registry: file readers for every supported format.
    ///
    /// Warehouse and queue readers need externally supplied clients, so the
    /// embedding application registers those factories itself through the
    /// builder.
    pub fn builtin() -> Self {
        Self::builder().with_file_readers().build()
    }

    /// Get the factory for a key
    pub fn get(&self, key: &ReaderKey) -> Option<&Arc<dyn ReaderFactory>> {
        self.entries.get(key)
    }

    /// Check if a key is registered
    pub fn contains(&self, key: &ReaderKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of registered readers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builder for [`ReaderRegistry`]
pub struct ReaderRegistryBuilder {
    entries: HashMap<ReaderKey, Arc<dyn ReaderFactory>>,
}

impl ReaderRegistryBuilder {
    /// Register a factory for a key. A later registration for the same key
    /// replaces the earlier one.
    pub fn register(mut self, key: ReaderKey, factory: Arc<dyn ReaderFactory>) -> Self {
        self.entries.insert(key, factory);
        self
    }

    /// Register the built-in file readers (CSV and JSON lines)
    pub fn with_file_readers(self) -> Self {
        self.register(ReaderKey::file(FileFormat::Csv), Arc::new(CsvReaderFactory))
            .register(
                ReaderKey::file(FileFormat::Json),
                Arc::new(JsonReaderFactory),
            )
    }

    /// Seal the registry
    pub fn build(self) -> ReaderRegistry {
        ReaderRegistry {
            entries: self.entries,
        }
    }
}
