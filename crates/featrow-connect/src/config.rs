//! Ingestion job configuration
//!
//! Job files declare named sources in YAML. Environment variables in the
//! format `${VAR}` or `${VAR:-default}` are expanded before parsing, so
//! credentials and paths can stay out of the file.

use crate::descriptor::SourceDescriptor;
use crate::error::{IngestError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

/// Pre-compiled regex for environment variable expansion
/// Pattern: ${VAR} or ${VAR:-default}
static ENV_VAR_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*)(?::-([^}]*))?\}")
        .expect("env var regex pattern is invalid - this is a bug")
});

/// Root ingestion job configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestConfig {
    /// Configuration version
    #[serde(default = "default_version")]
    pub version: String,

    /// Named ingestion sources
    #[serde(default)]
    pub sources: HashMap<String, SourceSpec>,
}

/// One declared source in a job file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceSpec {
    /// Source kind, matched case-insensitively against the closed set
    pub kind: String,

    /// Source options (format, path, table, subscription, ...)
    #[serde(default)]
    pub options: HashMap<String, String>,
}

fn default_version() -> String {
    "1".to_string()
}

impl SourceSpec {
    /// Convert into a typed, immutable descriptor
    pub fn to_descriptor(&self) -> Result<SourceDescriptor> {
        SourceDescriptor::from_parts(&self.kind, self.options.clone())
    }
}

impl IngestConfig {
    /// Load a job file from disk, expanding environment variables
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            IngestError::configuration(format!(
                "failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse a job file from YAML text, expanding environment variables
    pub fn from_yaml(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);
        let config: Self = serde_yaml::from_str(&expanded)
            .map_err(|e| IngestError::configuration(format!("failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Resolve every declared source into a validated descriptor
    ///
    /// Fails on the first invalid source, before any I/O occurs.
    pub fn descriptors(&self) -> Result<Vec<(String, SourceDescriptor)>> {
        let mut out = Vec::with_capacity(self.sources.len());
        for (name, spec) in &self.sources {
            let descriptor = spec.to_descriptor().map_err(|e| {
                IngestError::configuration(format!("source '{}': {}", name, e))
            })?;
            descriptor
                .validate()
                .map_err(|e| IngestError::configuration(format!("source '{}': {}", name, e)))?;
            out.push((name.clone(), descriptor));
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }
}

/// Expand environment variables in the format ${VAR} or ${VAR:-default}
fn expand_env_vars(content: &str) -> String {
    ENV_VAR_REGEX
        .replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default = caps.get(2).map(|m| m.as_str());

            std::env::var(var_name).unwrap_or_else(|_| default.unwrap_or("").to_string())
        })
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::SourceKind;

    #[test]
    fn test_env_var_expansion() {
        std::env::set_var("FEATROW_TEST_VAR", "hello");
        let expanded = expand_env_vars("value: ${FEATROW_TEST_VAR}");
        assert_eq!(expanded, "value: hello");
    }

    #[test]
    fn test_env_var_with_default() {
        std::env::remove_var("FEATROW_MISSING_VAR");
        let expanded = expand_env_vars("value: ${FEATROW_MISSING_VAR:-fallback}");
        assert_eq!(expanded, "value: fallback");
    }

    #[test]
    fn test_parse_job_config() {
        let yaml = r#"
version: "1"
sources:
  driver-rows:
    kind: file
    options:
      format: csv
      path: /data/driver.csv
  live-events:
    kind: queue_pubsub
    options:
      subscription: projects/demo/subscriptions/rows
"#;
        let config = IngestConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.sources.len(), 2);

        let descriptors = config.descriptors().unwrap();
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0].0, "driver-rows");
        assert_eq!(descriptors[0].1.kind(), SourceKind::File);
        assert_eq!(descriptors[1].1.kind(), SourceKind::QueuePubsub);
    }

    #[test]
    fn test_invalid_source_named_in_error() {
        let yaml = r#"
sources:
  bad:
    kind: file
    options: {}
"#;
        let config = IngestConfig::from_yaml(yaml).unwrap();
        let err = config.descriptors().unwrap_err();
        assert!(err.to_string().contains("source 'bad'"));
        assert!(err.to_string().contains("format missing"));
    }

    #[test]
    fn test_unknown_kind_rejected_at_descriptor_resolution() {
        let yaml = r#"
sources:
  bad:
    kind: gopher
"#;
        let config = IngestConfig::from_yaml(yaml).unwrap();
        let err = config.descriptors().unwrap_err();
        assert!(err.to_string().contains("unknown source kind"));
    }
}
