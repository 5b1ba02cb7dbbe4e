//! The two persisted documents and the canonical view derived from them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::notification::NotificationRecord;
use super::report::ReportRecord;
use super::serde_helpers::empty_object;
use super::stream::IntensityMessage;

/// Notification cache plus the ephemeral stream state.
///
/// Defaults to `{cache: [], earthquake: {}, intensity: {}, tsunami: {}, simulating: {}}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecentDocument {
    /// Last revisions, newest first.
    #[serde(default)]
    pub cache: Vec<NotificationRecord>,
    /// Current earthquake adopted under the provider filter.
    #[serde(default, with = "empty_object")]
    pub earthquake: Option<NotificationRecord>,
    /// Last streaming intensity message.
    #[serde(default, with = "empty_object")]
    pub intensity: Option<IntensityMessage>,
    /// Last tsunami bulletin.
    #[serde(default, with = "empty_object")]
    pub tsunami: Option<Value>,
    /// Active simulation override.
    #[serde(default, with = "empty_object")]
    pub simulating: Option<NotificationRecord>,
}

/// Report cache and refresh bookkeeping.
///
/// Defaults to `{cache: [], recent: {}, fetch_time: 0}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReportDocument {
    /// Last reports, newest first.
    #[serde(default)]
    pub cache: Vec<ReportRecord>,
    /// Most recently adopted report.
    #[serde(default, with = "empty_object")]
    pub recent: Option<ReportRecord>,
    /// Unix seconds of the last full refresh.
    #[serde(default)]
    pub fetch_time: f64,
}

/// Where a canonical record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EewSource {
    /// Simulation override.
    Simulation,
    /// Real-time notification.
    Notification,
    /// Notification merged with a newer or selected report.
    Report,
    /// Streaming intensity message with no matching notification or report.
    IntensityOnly,
}

/// Notification-shaped record handed to presentation, with its intensity
/// tables attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEew {
    /// The record itself.
    #[serde(flatten)]
    pub record: NotificationRecord,
    /// Origin of the record.
    pub source: EewSource,
    /// Region code to level.
    pub intensity: BTreeMap<String, u8>,
    /// Place name to label.
    pub list: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_round_trip_through_the_stored_shape() {
        let recent = serde_json::to_value(RecentDocument::default()).unwrap();
        assert_eq!(
            recent,
            json!({"cache": [], "earthquake": {}, "intensity": {}, "tsunami": {}, "simulating": {}})
        );

        let report: ReportDocument = serde_json::from_value(json!({"cache": [], "recent": {}, "fetch_time": 0})).unwrap();
        assert_eq!(report, ReportDocument::default());
    }

    #[test]
    fn partial_stored_document_loads() {
        let doc: RecentDocument = serde_json::from_value(json!({
            "cache": [{"id": "1", "serial": 1, "eq": {}}],
            "earthquake": {"id": "1", "serial": 1}
        }))
        .unwrap();
        assert_eq!(doc.cache.len(), 1);
        assert!(doc.earthquake.is_some());
        assert!(doc.simulating.is_none());
    }
}
