//! JSON envelope for `--format json`

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// `{data, meta}` wrapper around every JSON result
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonOutput<T> {
    pub data: T,
    pub meta: Metadata,
}

/// When and by which build the output was produced
#[derive(Debug, Serialize, Deserialize)]
pub struct Metadata {
    /// RFC 3339, UTC
    pub timestamp: String,
    pub version: String,
}

impl<T> JsonOutput<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            meta: Metadata {
                timestamp: Utc::now().to_rfc3339(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }
}

/// Wrap `data` in the envelope and pretty-print it
pub fn format_json<T: Serialize + ?Sized>(data: &T) -> Result<String, serde_json::Error> {
    let output = JsonOutput::new(data);
    serde_json::to_string_pretty(&output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize, Clone)]
    struct CacheRow {
        name: String,
        entries: usize,
    }

    #[test]
    fn test_json_output_new() {
        let output = JsonOutput::new(vec!["nhka-static-v3", "nhka-data-v3"]);

        assert_eq!(output.data, vec!["nhka-static-v3", "nhka-data-v3"]);
        assert_eq!(output.meta.version, env!("CARGO_PKG_VERSION"));
        assert!(!output.meta.timestamp.is_empty());
    }

    #[test]
    fn test_format_json_envelope() {
        let rows = vec![CacheRow {
            name: "nhka-documents-v3".to_string(),
            entries: 2,
        }];

        let result = format_json(&rows).unwrap();
        let value: serde_json::Value = serde_json::from_str(&result).unwrap();

        assert_eq!(value["data"][0]["name"], "nhka-documents-v3");
        assert_eq!(value["data"][0]["entries"], 2);
        assert!(value["meta"]["timestamp"].is_string());
        assert_eq!(value["meta"]["version"], env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_format_json_empty_map() {
        let status: std::collections::BTreeMap<String, usize> = Default::default();
        let result = format_json(&status).unwrap();

        assert!(result.contains("\"data\": {}"));
    }
}
