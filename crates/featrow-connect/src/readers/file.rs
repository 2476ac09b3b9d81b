//! File readers (CSV and JSON lines)
//!
//! Both readers translate each file row into the canonical record encoding
//! and frame it for the router. Streams are finite and lazy: the file is not
//! opened until the first pull.

use super::{options_from_descriptor, Frame, FrameReader, FrameRecovery, FrameStream, ReaderFactory};
use crate::descriptor::SourceDescriptor;
use crate::error::{IngestError, Result};
use async_trait::async_trait;
use chrono::Utc;
use featrow_core::FeatureRow;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;
use validator::Validate;

/// CSV file reader options
#[derive(Debug, Clone, Deserialize, Serialize, Validate, JsonSchema)]
pub struct CsvReaderOptions {
    /// Path to the CSV file
    #[validate(length(min = 1))]
    pub path: String,

    /// Entity name assigned to every row in the file
    #[validate(length(min = 1))]
    pub entity: String,

    /// Header name of the entity-key column (defaults to the first column)
    #[serde(default)]
    pub key_column: Option<String>,

    /// Header name of a millisecond-epoch timestamp column; rows are stamped
    /// with the read time when absent
    #[serde(default)]
    pub timestamp_column: Option<String>,
}

/// Reader for CSV files with a header row
pub struct CsvReader;

#[async_trait]
impl FrameReader for CsvReader {
    async fn open(&self, descriptor: &SourceDescriptor) -> Result<FrameStream> {
        let options: CsvReaderOptions = options_from_descriptor(descriptor)?;

        let stream = async_stream::stream! {
            let file = match tokio::fs::File::open(&options.path).await {
                Ok(f) => f,
                Err(e) => {
                    yield Err(IngestError::transport(format!(
                        "failed to open {}: {}",
                        options.path, e
                    )));
                    return;
                }
            };
            let mut lines = BufReader::new(file).lines();

            let header = match lines.next_line().await {
                Ok(Some(line)) => split_csv_line(&line),
                Ok(None) => {
                    yield Err(IngestError::configuration(format!(
                        "{} is empty, expected a header row",
                        options.path
                    )));
                    return;
                }
                Err(e) => {
                    yield Err(IngestError::from(e));
                    return;
                }
            };

            let key_index = match resolve_column(&header, options.key_column.as_deref(), 0) {
                Ok(i) => i,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            let timestamp_index = match options.timestamp_column.as_deref() {
                Some(name) => match header.iter().position(|h| h == name) {
                    Some(i) => Some(i),
                    None => {
                        yield Err(IngestError::configuration(format!(
                            "timestamp column '{}' not found in header",
                            name
                        )));
                        return;
                    }
                },
                None => None,
            };

            debug!(path = %options.path, columns = header.len(), "reading csv source");

            let mut position = 0u64;
            loop {
                let line = match lines.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(IngestError::from(e));
                        return;
                    }
                };
                if line.is_empty() {
                    continue;
                }
                position += 1;

                let cells = split_csv_line(&line);
                if cells.len() != header.len() {
                    yield Err(IngestError::malformed(
                        position,
                        format!("expected {} fields, got {}", header.len(), cells.len()),
                    ));
                    continue;
                }

                let timestamp = match timestamp_index {
                    Some(i) => match cells[i].parse::<i64>() {
                        Ok(ts) => ts,
                        Err(_) => {
                            yield Err(IngestError::malformed(
                                position,
                                format!("timestamp column value '{}' is not an integer", cells[i]),
                            ));
                            continue;
                        }
                    },
                    None => Utc::now().timestamp_millis(),
                };

                let mut row = FeatureRow::new(&options.entity, &cells[key_index], timestamp);
                for (i, cell) in cells.iter().enumerate() {
                    if i == key_index || Some(i) == timestamp_index {
                        continue;
                    }
                    row = row.with_field(&header[i], cell.as_bytes().to_vec());
                }

                match row.to_bytes() {
                    Ok(payload) => {
                        yield Ok(Frame::new(position, payload));
                    }
                    Err(e) => {
                        yield Err(IngestError::malformed(position, e.to_string()));
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Factory for the (file, csv) registry entry
pub struct CsvReaderFactory;

impl ReaderFactory for CsvReaderFactory {
    fn recovery(&self) -> FrameRecovery {
        FrameRecovery::Fatal
    }

    fn create(&self) -> Box<dyn FrameReader> {
        Box::new(CsvReader)
    }
}

/// JSON-lines file reader options
#[derive(Debug, Clone, Deserialize, Serialize, Validate, JsonSchema)]
pub struct JsonReaderOptions {
    /// Path to the JSON-lines file
    #[validate(length(min = 1))]
    pub path: String,

    /// Entity name to use when a line carries no `entity_name` field
    #[serde(default)]
    pub entity: Option<String>,
}

/// Reader for newline-delimited JSON files
///
/// Each line is one object: `entity_key` is required, `entity_name` and
/// `event_timestamp_ms` are optional, and every member of `features` becomes
/// one opaque feature value (canonical JSON bytes).
pub struct JsonReader;

#[async_trait]
impl FrameReader for JsonReader {
    async fn open(&self, descriptor: &SourceDescriptor) -> Result<FrameStream> {
        let options: JsonReaderOptions = options_from_descriptor(descriptor)?;

        let stream = async_stream::stream! {
            let file = match tokio::fs::File::open(&options.path).await {
                Ok(f) => f,
                Err(e) => {
                    yield Err(IngestError::transport(format!(
                        "failed to open {}: {}",
                        options.path, e
                    )));
                    return;
                }
            };
            let mut lines = BufReader::new(file).lines();

            debug!(path = %options.path, "reading json-lines source");

            let mut position = 0u64;
            loop {
                let line = match lines.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(IngestError::from(e));
                        return;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                position += 1;

                match line_to_row(&line, options.entity.as_deref()) {
                    Ok(row) => match row.to_bytes() {
                        Ok(payload) => {
                            yield Ok(Frame::new(position, payload));
                        }
                        Err(e) => {
                            yield Err(IngestError::malformed(position, e.to_string()));
                        }
                    },
                    Err(reason) => {
                        yield Err(IngestError::malformed(position, reason));
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Factory for the (file, json) registry entry
pub struct JsonReaderFactory;

impl ReaderFactory for JsonReaderFactory {
    fn recovery(&self) -> FrameRecovery {
        FrameRecovery::Fatal
    }

    fn create(&self) -> Box<dyn FrameReader> {
        Box::new(JsonReader)
    }
}

fn resolve_column(header: &[String], name: Option<&str>, fallback: usize) -> Result<usize> {
    match name {
        Some(name) => header.iter().position(|h| h == name).ok_or_else(|| {
            IngestError::configuration(format!("key column '{}' not found in header", name))
        }),
        None => Ok(fallback),
    }
}

/// Split one CSV line, honoring double-quoted fields with `""` escapes
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

fn line_to_row(line: &str, default_entity: Option<&str>) -> std::result::Result<FeatureRow, String> {
    let value: serde_json::Value =
        serde_json::from_str(line).map_err(|e| format!("invalid json: {}", e))?;
    let object = value.as_object().ok_or("line is not a json object")?;

    let entity_key = object
        .get("entity_key")
        .and_then(|v| v.as_str())
        .ok_or("entity_key missing or not a string")?;

    let entity_name = match object.get("entity_name").and_then(|v| v.as_str()) {
        Some(name) => name,
        None => default_entity.ok_or("entity_name missing and no entity option set")?,
    };

    let timestamp = object
        .get("event_timestamp_ms")
        .and_then(|v| v.as_i64())
        .unwrap_or_else(|| Utc::now().timestamp_millis());

    let mut row = FeatureRow::new(entity_name, entity_key, timestamp);
    if let Some(features) = object.get("features") {
        let features = features.as_object().ok_or("features is not a json object")?;
        for (id, value) in features {
            let bytes =
                serde_json::to_vec(value).map_err(|e| format!("feature '{}': {}", id, e))?;
            row = row.with_field(id, bytes);
        }
    }
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_plain_line() {
        assert_eq!(split_csv_line("a,b,c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_split_quoted_fields() {
        assert_eq!(
            split_csv_line(r#"a,"b,with,commas",c"#),
            vec!["a", "b,with,commas", "c"]
        );
        assert_eq!(
            split_csv_line(r#""say ""hi""",x"#),
            vec![r#"say "hi""#, "x"]
        );
    }

    #[test]
    fn test_split_trailing_empty_field() {
        assert_eq!(split_csv_line("a,b,"), vec!["a", "b", ""]);
    }

    #[test]
    fn test_line_to_row() {
        let row = line_to_row(
            r#"{"entity_key":"d-1","event_timestamp_ms":42,"features":{"trips":7}}"#,
            Some("driver"),
        )
        .unwrap();
        assert_eq!(row.entity_name, "driver");
        assert_eq!(row.entity_key, "d-1");
        assert_eq!(row.event_timestamp_ms, 42);
        assert_eq!(row.field("trips").map(|b| b.as_ref()), Some(&b"7"[..]));
    }

    #[test]
    fn test_line_entity_name_overrides_default() {
        let row = line_to_row(
            r#"{"entity_name":"rider","entity_key":"r-1"}"#,
            Some("driver"),
        )
        .unwrap();
        assert_eq!(row.entity_name, "rider");
    }

    #[test]
    fn test_line_missing_key_rejected() {
        let err = line_to_row(r#"{"features":{}}"#, Some("driver")).unwrap_err();
        assert!(err.contains("entity_key"));
    }

    #[test]
    fn test_truncated_line_rejected() {
        let err = line_to_row(r#"{"entity_key":"d-1","featur"#, Some("driver")).unwrap_err();
        assert!(err.contains("invalid json"));
    }
}
