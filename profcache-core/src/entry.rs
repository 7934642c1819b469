//! Cache entry model and its serialized document form.
//!
//! The document form is a flat JSON object: every top-level payload field
//! plus a `timestamp` field holding `fetched_at` as RFC 3339. It is the file
//! format of the flat-file store and the download artifact of every backend.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{StorageError, StorageResult};
use crate::key::CacheKey;

/// Opaque structured document fetched from upstream.
pub type Payload = Map<String, Value>;

/// Reserved document field carrying `fetched_at`.
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Content type of serialized documents.
pub const DOCUMENT_CONTENT_TYPE: &str = "application/json";

/// File extension of serialized documents.
pub const DOCUMENT_EXTENSION: &str = "json";

/// One cached record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub payload: Payload,
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Build an entry stamped at `fetched_at`, truncated to microseconds so
    /// every backend stores it without loss.
    ///
    /// A payload field named [`TIMESTAMP_FIELD`] is dropped: the document
    /// form reserves it, and every backend must return the same payload.
    pub fn new(key: CacheKey, mut payload: Payload, fetched_at: DateTime<Utc>) -> Self {
        payload.remove(TIMESTAMP_FIELD);
        Self {
            key,
            payload,
            fetched_at: fetched_at.trunc_subsecs(6),
        }
    }

    /// Build an entry stamped now.
    pub fn fetched_now(key: CacheKey, payload: Payload) -> Self {
        Self::new(key, payload, Utc::now())
    }

    /// Serialize into the document form.
    pub fn to_document(&self) -> Value {
        let mut doc = self.payload.clone();
        doc.insert(
            TIMESTAMP_FIELD.to_string(),
            Value::String(format_timestamp(self.fetched_at)),
        );
        Value::Object(doc)
    }

    /// Serialize into document bytes.
    pub fn to_document_bytes(&self) -> StorageResult<Vec<u8>> {
        serde_json::to_vec(&self.to_document())
            .map_err(|e| StorageError::corrupt(self.key.as_str(), e.to_string()))
    }

    /// Parse document bytes stored under `key`.
    pub fn from_document_bytes(key: &CacheKey, bytes: &[u8]) -> StorageResult<Self> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| StorageError::corrupt(key.as_str(), format!("invalid JSON: {}", e)))?;
        Self::from_document(key, value)
    }

    /// Split a document into payload and timestamp.
    pub fn from_document(key: &CacheKey, value: Value) -> StorageResult<Self> {
        let Value::Object(mut doc) = value else {
            return Err(StorageError::corrupt(
                key.as_str(),
                "document is not a JSON object",
            ));
        };

        let fetched_at = match doc.remove(TIMESTAMP_FIELD) {
            Some(Value::String(raw)) => parse_timestamp(&raw).ok_or_else(|| {
                StorageError::corrupt(key.as_str(), format!("invalid timestamp {:?}", raw))
            })?,
            Some(_) => {
                return Err(StorageError::corrupt(key.as_str(), "timestamp is not a string"))
            }
            None => return Err(StorageError::corrupt(key.as_str(), "missing timestamp")),
        };

        Ok(Self {
            key: key.clone(),
            payload: doc,
            fetched_at,
        })
    }
}

/// Attachment produced by a backend for the `download` action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadArtifact {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl DownloadArtifact {
    pub fn json(key: &CacheKey, bytes: Vec<u8>) -> Self {
        Self {
            file_name: key.file_name(DOCUMENT_EXTENSION),
            content_type: DOCUMENT_CONTENT_TYPE,
            bytes,
        }
    }
}

/// RFC 3339, UTC, microsecond precision, `Z` suffix.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse RFC 3339, falling back to a naive ISO-8601 timestamp read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    raw.parse::<NaiveDateTime>().ok().map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn key(raw: &str) -> CacheKey {
        CacheKey::parse(raw).unwrap()
    }

    fn payload(value: Value) -> Payload {
        match value {
            Value::Object(map) => map,
            _ => panic!("payload must be an object"),
        }
    }

    #[test]
    fn test_new_truncates_to_micros() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
            + Duration::nanoseconds(123_456_789);
        let entry = CacheEntry::new(key("alice"), Payload::new(), ts);
        assert_eq!(entry.fetched_at.timestamp_subsec_nanos(), 123_456_000);
    }

    #[test]
    fn test_document_embeds_timestamp() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let entry = CacheEntry::new(
            key("alice"),
            payload(json!({"profile": {"firstName": "Alice"}})),
            ts,
        );
        let doc = entry.to_document();
        assert_eq!(doc["profile"]["firstName"], "Alice");
        assert_eq!(doc["timestamp"], "2024-05-01T12:00:00.000000Z");
    }

    #[test]
    fn test_reserved_timestamp_field_is_dropped() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let entry = CacheEntry::new(
            key("alice"),
            payload(json!({"profile": {}, "timestamp": "upstream value"})),
            ts,
        );
        assert!(!entry.payload.contains_key("timestamp"));

        let parsed =
            CacheEntry::from_document_bytes(&entry.key, &entry.to_document_bytes().unwrap())
                .unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn test_document_bytes_round_trip() {
        let entry = CacheEntry::fetched_now(
            key("alice"),
            payload(json!({
                "profile": {"profile_id": "ACoAA", "headline": "Engineer"},
                "skills": [{"name": "Rust"}],
                "connections": []
            })),
        );
        let bytes = entry.to_document_bytes().unwrap();
        let parsed = CacheEntry::from_document_bytes(&entry.key, &bytes).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn test_from_document_rejects_non_object() {
        let err = CacheEntry::from_document(&key("alice"), json!([1, 2, 3])).unwrap_err();
        assert!(err.is_corrupt());
    }

    #[test]
    fn test_from_document_requires_timestamp() {
        let err = CacheEntry::from_document(&key("alice"), json!({"profile": {}})).unwrap_err();
        assert!(err.to_string().contains("missing timestamp"));

        let err = CacheEntry::from_document(&key("alice"), json!({"timestamp": 5})).unwrap_err();
        assert!(err.is_corrupt());

        let err =
            CacheEntry::from_document(&key("alice"), json!({"timestamp": "yesterday"})).unwrap_err();
        assert!(err.is_corrupt());
    }

    #[test]
    fn test_from_document_bytes_rejects_garbage() {
        let err = CacheEntry::from_document_bytes(&key("alice"), b"{not json").unwrap_err();
        assert!(err.is_corrupt());
    }

    #[test]
    fn test_parse_timestamp_accepts_naive_iso() {
        let ts = parse_timestamp("2024-05-01T12:30:15.250000").unwrap();
        assert_eq!(
            ts,
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 15).unwrap() + Duration::milliseconds(250)
        );

        let ts = parse_timestamp("2024-05-01T12:30:15").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 15).unwrap());
    }

    #[test]
    fn test_parse_timestamp_with_offset() {
        let ts = parse_timestamp("2024-05-01T14:00:00+02:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_download_artifact_file_name() {
        let artifact = DownloadArtifact::json(&key("alice"), b"{}".to_vec());
        assert_eq!(artifact.file_name, "alice.json");
        assert_eq!(artifact.content_type, "application/json");
    }
}
