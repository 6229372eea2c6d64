use crate::error::{AppError, Result};
use chrono::{DateTime, Datelike, NaiveDate, SecondsFormat, Timelike, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::HashMap;

const LABELS_FIELD: &str = "labels";
const ANNOTATIONS_FIELD: &str = "annotations";
const STARTS_AT_FIELD: &str = "startsAt";
const ENDS_AT_FIELD: &str = "endsAt";

/// A single alert as sent by Prometheus to the alert receiver.
///
/// Only `labels`, `annotations`, `startsAt` and `endsAt` are modeled. The
/// original JSON object is kept as an ordered document and the modeled
/// fields are overlaid onto it when the alert is written back, so fields
/// such as `generatorURL` pass through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    /// Alert labels
    pub labels: HashMap<String, String>,

    /// Alert annotations
    pub annotations: HashMap<String, String>,

    /// Time the alert started firing
    pub starts_at: DateTime<Utc>,

    /// Time the alert resolved; the zero timestamp while still firing
    pub ends_at: DateTime<Utc>,

    document: Map<String, Value>,
}

impl Alert {
    /// Create a firing alert with the given labels
    pub fn new(labels: HashMap<String, String>, starts_at: DateTime<Utc>) -> Self {
        let ends_at = zero_timestamp();
        let mut document = Map::new();
        document.insert(
            STARTS_AT_FIELD.to_string(),
            Value::String(format_timestamp(&starts_at)),
        );
        document.insert(
            ENDS_AT_FIELD.to_string(),
            Value::String(format_timestamp(&ends_at)),
        );

        Self {
            labels,
            annotations: HashMap::new(),
            starts_at,
            ends_at,
            document,
        }
    }

    /// Build an alert from one element of an inbound batch
    pub fn from_document(document: Map<String, Value>) -> Result<Self> {
        let labels = string_map_field(&document, LABELS_FIELD)?;
        let annotations = string_map_field(&document, ANNOTATIONS_FIELD)?;
        let starts_at = timestamp_field(&document, STARTS_AT_FIELD)?;
        let ends_at = timestamp_field(&document, ENDS_AT_FIELD)?;

        Ok(Self {
            labels,
            annotations,
            starts_at,
            ends_at,
            document,
        })
    }

    /// Render the alert back into its wire document.
    ///
    /// Timestamps keep their original text when the modeled value still
    /// denotes the same instant.
    pub fn to_document(&self) -> Map<String, Value> {
        let mut document = self.document.clone();
        document.insert(LABELS_FIELD.to_string(), string_map_value(&self.labels));
        document.insert(
            ANNOTATIONS_FIELD.to_string(),
            string_map_value(&self.annotations),
        );
        overlay_timestamp(&mut document, STARTS_AT_FIELD, &self.starts_at);
        overlay_timestamp(&mut document, ENDS_AT_FIELD, &self.ends_at);
        document
    }

    /// Get an unmodeled field of the original document
    pub fn field(&self, name: &str) -> Option<&Value> {
        match name {
            LABELS_FIELD | ANNOTATIONS_FIELD | STARTS_AT_FIELD | ENDS_AT_FIELD => None,
            _ => self.document.get(name),
        }
    }

    /// Add a label
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Mark the alert as resolved at the given time
    pub fn resolve(&mut self, ends_at: DateTime<Utc>) {
        self.ends_at = ends_at;
    }

    /// Check if the alert has resolved
    pub fn is_resolved(&self) -> bool {
        !is_zero_timestamp(&self.ends_at)
    }
}

impl Serialize for Alert {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_document().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Alert {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let document = Map::<String, Value>::deserialize(deserializer)?;
        Alert::from_document(document).map_err(|e| match e {
            AppError::Decode(message) => D::Error::custom(message),
            other => D::Error::custom(other),
        })
    }
}

/// Parse an RFC3339 timestamp into UTC
pub fn parse_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|t| t.with_timezone(&Utc))
}

/// Format a timestamp the way Prometheus does
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// `0001-01-01T00:00:00Z`, the value of `endsAt` on a firing alert
pub fn zero_timestamp() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(1, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc())
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn is_zero_timestamp(at: &DateTime<Utc>) -> bool {
    at.year() == 1
        && at.ordinal() == 1
        && at.num_seconds_from_midnight() == 0
        && at.nanosecond() == 0
}

fn string_map_field(document: &Map<String, Value>, field: &str) -> Result<HashMap<String, String>> {
    match document.get(field) {
        None | Some(Value::Null) => Ok(HashMap::new()),
        Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
            AppError::Decode(format!("Bad alert `{}` field data {}: {}", field, value, e))
        }),
    }
}

fn timestamp_field(document: &Map<String, Value>, field: &str) -> Result<DateTime<Utc>> {
    let raw = match document.get(field) {
        Some(Value::String(raw)) => raw.as_str(),
        Some(other) => {
            return Err(AppError::Decode(format!(
                "Bad alert `{}` field data {}: expected an RFC3339 string",
                field, other
            )))
        }
        None => {
            return Err(AppError::Decode(format!(
                "Bad alert `{}` field data \"\": field is missing",
                field
            )))
        }
    };

    parse_timestamp(raw).map_err(|e| {
        AppError::Decode(format!("Bad alert `{}` field data \"{}\": {}", field, raw, e))
    })
}

fn string_map_value(map: &HashMap<String, String>) -> Value {
    Value::Object(
        map.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

fn overlay_timestamp(document: &mut Map<String, Value>, field: &str, at: &DateTime<Utc>) {
    let unchanged = document
        .get(field)
        .and_then(Value::as_str)
        .and_then(|raw| parse_timestamp(raw).ok())
        .map_or(false, |original| original == *at);

    if !unchanged {
        document.insert(field.to_string(), Value::String(format_timestamp(at)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_zero_timestamp() {
        let zero = zero_timestamp();
        assert_eq!(format_timestamp(&zero), "0001-01-01T00:00:00Z");
        assert!(is_zero_timestamp(&zero));
        assert_eq!(parse_timestamp("0001-01-01T00:00:00Z").unwrap(), zero);
    }

    #[test]
    fn test_from_document_firing() {
        let alert = Alert::from_document(document(json!({
            "labels": {"alertname": "HighLatency", "namespace": "shop"},
            "annotations": {"summary": "p99 above 1s"},
            "startsAt": "2024-03-01T10:00:00Z",
            "endsAt": "0001-01-01T00:00:00Z",
            "generatorURL": "http://prometheus/graph"
        })))
        .unwrap();

        assert_eq!(alert.labels["alertname"], "HighLatency");
        assert_eq!(alert.annotations["summary"], "p99 above 1s");
        assert!(!alert.is_resolved());
        assert_eq!(alert.field("generatorURL"), Some(&json!("http://prometheus/graph")));
        assert_eq!(alert.field("labels"), None);
    }

    #[test]
    fn test_resolved_alert() {
        let alert = Alert::from_document(document(json!({
            "labels": {},
            "annotations": {},
            "startsAt": "2024-03-01T10:00:00Z",
            "endsAt": "2024-03-01T10:05:00.123+02:00"
        })))
        .unwrap();

        assert!(alert.is_resolved());
    }

    #[test]
    fn test_bad_timestamp() {
        let err = Alert::from_document(document(json!({
            "labels": {},
            "annotations": {},
            "startsAt": "yesterday",
            "endsAt": "0001-01-01T00:00:00Z"
        })))
        .unwrap_err();

        assert!(matches!(err, AppError::Decode(_)));
        assert!(err.to_string().contains("startsAt"));
        assert!(err.to_string().contains("yesterday"));
    }

    #[test]
    fn test_missing_ends_at() {
        let err = Alert::from_document(document(json!({
            "labels": {},
            "annotations": {},
            "startsAt": "2024-03-01T10:00:00Z"
        })))
        .unwrap_err();

        assert!(err.to_string().contains("endsAt"));
    }

    #[test]
    fn test_non_string_label_is_rejected() {
        let err = Alert::from_document(document(json!({
            "labels": {"replicas": 3},
            "annotations": {},
            "startsAt": "2024-03-01T10:00:00Z",
            "endsAt": "0001-01-01T00:00:00Z"
        })))
        .unwrap_err();

        assert!(err.to_string().contains("labels"));
    }

    #[test]
    fn test_to_document_overlays_modeled_fields() {
        let mut alert = Alert::from_document(document(json!({
            "status": "firing",
            "labels": {"alertname": "DiskFull"},
            "annotations": {},
            "startsAt": "2024-03-01T12:00:00+02:00",
            "endsAt": "0001-01-01T00:00:00Z",
            "fingerprint": "a1b2c3"
        })))
        .unwrap();

        alert.labels.insert("team".to_string(), "storage".to_string());
        let doc = alert.to_document();

        assert_eq!(doc["status"], json!("firing"));
        assert_eq!(doc["fingerprint"], json!("a1b2c3"));
        assert_eq!(doc["labels"], json!({"alertname": "DiskFull", "team": "storage"}));
        // same instant, original text kept
        assert_eq!(doc["startsAt"], json!("2024-03-01T12:00:00+02:00"));

        let keys: Vec<&String> = doc.keys().collect();
        assert_eq!(keys[0], "status");
        assert_eq!(keys[5], "fingerprint");
    }

    #[test]
    fn test_changed_timestamp_is_reformatted() {
        let mut alert = Alert::new(HashMap::new(), parse_timestamp("2024-03-01T10:00:00Z").unwrap());
        alert.resolve(parse_timestamp("2024-03-01T10:30:00.5Z").unwrap());

        let doc = alert.to_document();
        assert_eq!(doc["endsAt"], json!("2024-03-01T10:30:00.500Z"));
        assert!(alert.is_resolved());
    }
}
