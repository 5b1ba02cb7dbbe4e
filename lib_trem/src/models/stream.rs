//! Payloads delivered by either transport.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::notification::NotificationRecord;
use super::report::ReportRecord;
use super::serde_helpers::string_or_number;

/// Intensity flash report: observed level per list of township ZIP3 codes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IntensityMessage {
    /// Message id, correlated with a report's `trem` field.
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    /// Issuing provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Maximum observed level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u8>,
    /// Level (as a string key) to township codes.
    #[serde(default)]
    pub area: BTreeMap<String, Vec<u16>>,
}

impl IntensityMessage {
    /// True when the message belongs to `eew` or to the report whose `trem`
    /// field carries this id. An empty id never correlates.
    pub fn correlates(&self, eew: Option<&NotificationRecord>, report: Option<&ReportRecord>) -> bool {
        !self.id.is_empty()
            && (eew.is_some_and(|e| e.id == self.id)
                || report.and_then(|r| r.trem.as_deref()) == Some(self.id.as_str()))
    }
}

/// A decoded data payload, tagged by the upstream `type`.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamPayload {
    /// Early-warning revision.
    Eew(NotificationRecord),
    /// Report summary.
    Report(ReportRecord),
    /// Intensity flash report.
    Intensity(IntensityMessage),
    /// Tsunami bulletin, kept opaque.
    Tsunami(Value),
    /// Server time sync.
    Ntp(Value),
}

impl StreamPayload {
    /// Decodes `data` according to its `type` tag. Unknown tags yield `None`.
    pub fn from_tagged(kind: &str, data: Value) -> serde_json::Result<Option<Self>> {
        let payload = match kind {
            "eew" => StreamPayload::Eew(serde_json::from_value(data)?),
            "report" => StreamPayload::Report(serde_json::from_value(data)?),
            "intensity" => StreamPayload::Intensity(serde_json::from_value(data)?),
            "tsunami" => StreamPayload::Tsunami(data),
            "ntp" => StreamPayload::Ntp(data),
            _ => return Ok(None),
        };
        Ok(Some(payload))
    }

    /// The upstream tag.
    pub fn kind(&self) -> &'static str {
        match self {
            StreamPayload::Eew(_) => "eew",
            StreamPayload::Report(_) => "report",
            StreamPayload::Intensity(_) => "intensity",
            StreamPayload::Tsunami(_) => "tsunami",
            StreamPayload::Ntp(_) => "ntp",
        }
    }
}
