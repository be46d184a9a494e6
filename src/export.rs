//! JSON export of fetched payloads

use chrono::{DateTime, Local};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while exporting
#[derive(Debug, Error)]
pub enum ExportError {
    /// Payload had no records
    #[error("No data to export")]
    Empty,

    /// Payload could not be serialized
    #[error("Failed to serialize export: {0}")]
    Serialize(#[from] serde_json::Error),

    /// File could not be written
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Number of records in a payload: array length, 0 for null, otherwise 1
pub fn record_count(payload: &Value) -> usize {
    match payload {
        Value::Array(items) => items.len(),
        Value::Null => 0,
        _ => 1,
    }
}

/// Drops repeated endpoints, keeping first occurrences in order
///
/// Endpoints that differ only in surrounding slashes share an export file
/// name, so they count as repeats.
pub fn unique_endpoints(endpoints: &[String]) -> Vec<&str> {
    let mut seen = HashSet::new();
    endpoints
        .iter()
        .map(String::as_str)
        .filter(|endpoint| seen.insert(endpoint.trim_matches('/')))
        .collect()
}

/// Default export file name, e.g. `f1-laps-20240915-143000.json`
pub fn default_filename(endpoint: &str, now: DateTime<Local>) -> String {
    let endpoint = endpoint.trim_matches('/').replace('/', "_");
    format!("f1-{}-{}.json", endpoint, now.format("%Y%m%d-%H%M%S"))
}

/// Writes a payload as pretty-printed JSON
///
/// # Returns
/// * `Ok(count)` - Number of records written
/// * `Err(ExportError::Empty)` - If the payload has no records; nothing is written
pub fn export_json(payload: &Value, path: &Path) -> Result<usize, ExportError> {
    let count = record_count(payload);
    if count == 0 {
        return Err(ExportError::Empty);
    }

    let json = serde_json::to_string_pretty(payload)?;
    fs::write(path, json).map_err(|source| ExportError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_unique_endpoints_keeps_first_occurrence() {
        let endpoints: Vec<String> = ["laps", "stints", "laps", "/stints/", "pit"]
            .iter()
            .map(|e| e.to_string())
            .collect();

        assert_eq!(unique_endpoints(&endpoints), vec!["laps", "stints", "pit"]);
    }

    #[test]
    fn test_record_count() {
        assert_eq!(record_count(&json!([1, 2, 3])), 3);
        assert_eq!(record_count(&json!([])), 0);
        assert_eq!(record_count(&json!({"session_key": 9636})), 1);
        assert_eq!(record_count(&Value::Null), 0);
    }

    #[test]
    fn test_default_filename() {
        let now = Local.with_ymd_and_hms(2024, 9, 15, 14, 30, 5).unwrap();
        assert_eq!(default_filename("laps", now), "f1-laps-20240915-143005.json");
        assert_eq!(default_filename("/team_radio/", now), "f1-team_radio-20240915-143005.json");
    }

    #[test]
    fn test_export_writes_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.json");
        let payload = json!([{"session_key": 123, "driver_number": 44}]);

        let count = export_json(&payload, &path).unwrap();

        assert_eq!(count, 1);
        let written: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written[0]["driver_number"], 44);
    }

    #[test]
    fn test_export_empty_payload_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.json");

        assert!(matches!(export_json(&json!([]), &path), Err(ExportError::Empty)));
        assert!(!path.exists());
    }
}
