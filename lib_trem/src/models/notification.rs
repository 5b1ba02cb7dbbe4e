//! Early-warning notification revisions.

use serde::{Deserialize, Serialize};

use super::serde_helpers::string_or_number;
use crate::earthquake::{regions::TAIWAN_CENTER, Epicenter};

/// Hypocentre and magnitude block of a notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EqInfo {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// Focal depth in km.
    pub depth: f64,
    /// Magnitude.
    pub mag: f64,
    /// Free-text location.
    pub loc: String,
    /// Origin time, epoch ms.
    pub time: i64,
    /// Estimated or observed maximum intensity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<u8>,
}

impl Default for EqInfo {
    fn default() -> Self {
        Self {
            lat: TAIWAN_CENTER.0,
            lon: TAIWAN_CENTER.1,
            depth: 0.0,
            mag: 0.0,
            loc: String::new(),
            time: 0,
            max: None,
        }
    }
}

impl EqInfo {
    /// Parameters for the intensity model.
    pub fn epicenter(&self) -> Epicenter {
        Epicenter {
            lat: self.lat,
            lon: self.lon,
            depth: self.depth,
            mag: self.mag,
        }
    }
}

/// One revision of an early-warning alert.
///
/// `(id, serial)` identifies the revision. Report-derived records carry no
/// serial. The upstream `type` tag is dropped on decode.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NotificationRecord {
    /// Alert identifier.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// Revision counter within `id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<u32>,
    /// Issuing provider.
    #[serde(default)]
    pub author: String,
    /// Upstream status flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,
    /// Set on the last revision of an alert.
    #[serde(rename = "final", default, skip_serializing_if = "Option::is_none")]
    pub is_final: Option<i64>,
    /// Hypocentre block.
    #[serde(default)]
    pub eq: EqInfo,
    /// Revision time, epoch ms. Missing values read as 0.
    #[serde(default)]
    pub time: i64,
    /// Report fingerprint, present once merged with a report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
}

impl NotificationRecord {
    /// Cache identity of this revision.
    pub fn revision_key(&self) -> (&str, Option<u32>) {
        (self.id.as_str(), self.serial)
    }

    /// True when `provider` is empty or equals the author.
    pub fn matches_provider(&self, provider: &str) -> bool {
        provider.is_empty() || self.author == provider
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_stream_payload_with_numeric_id() {
        let record: NotificationRecord = serde_json::from_value(json!({
            "type": "eew",
            "author": "cwa",
            "id": 114081,
            "serial": 2,
            "final": 0,
            "eq": {"lat": 24.1, "lon": 121.53, "depth": 20.7, "mag": 4.3, "loc": "花蓮縣", "time": 1000, "max": 3}
        }))
        .unwrap();

        assert_eq!(record.revision_key(), ("114081", Some(2)));
        assert_eq!(record.time, 0);
        assert_eq!(record.eq.max, Some(3));
        assert!(record.matches_provider(""));
        assert!(record.matches_provider("cwa"));
        assert!(!record.matches_provider("trem"));
    }

    #[test]
    fn missing_position_defaults_to_island_centre() {
        let record: NotificationRecord = serde_json::from_value(json!({"id": "1", "eq": {"mag": 5.0}})).unwrap();
        assert_eq!((record.eq.lat, record.eq.lon), TAIWAN_CENTER);

        let out = serde_json::to_value(&record).unwrap();
        assert!(out.get("serial").is_none());
        assert!(out.get("type").is_none());
    }
}
