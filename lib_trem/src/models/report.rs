//! Official earthquake reports.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::serde_helpers::{opt_string_or_number, string_or_number, town_names};
use crate::configs::constants::{FALLBACK_REPORT_AUTHOR, OFFICIAL_REPORT_AUTHOR};

static REPORT_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{6})-?(?:\d{4})-([01]\d[0-3]\d)-(\d{6})").expect("report id pattern compiles")
});

/// Rewrites a provider report id into `NNNNNN-MMDD-NNNNNN`, or `None` when
/// the id is not in an official form.
pub fn normalize_report_id(raw: &str) -> Option<String> {
    let caps = REPORT_ID_PATTERN.captures(raw)?;
    Some(format!("{}-{}-{}", &caps[1], &caps[2], &caps[3]))
}

/// Observed intensity of one county.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionReport {
    /// Maximum observed level in the county.
    #[serde(rename = "int", default)]
    pub intensity: u8,
    /// Townships that observed it.
    #[serde(default, deserialize_with = "town_names")]
    pub town: Vec<String>,
}

/// An authoritative report, summary or detail.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReportRecord {
    /// Report id, normalised when it matches the official form.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// Origin time, epoch ms.
    #[serde(default)]
    pub time: i64,
    /// Issuing authority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Content fingerprint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
    /// Maximum observed intensity.
    #[serde(rename = "int", default, skip_serializing_if = "Option::is_none")]
    pub max_intensity: Option<u8>,
    /// Per-county breakdown keyed by county display name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub list: BTreeMap<String, RegionReport>,
    /// Latitude.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    /// Longitude.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    /// Focal depth in km.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<f64>,
    /// Magnitude.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mag: Option<f64>,
    /// Free-text location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<String>,
    /// Id of the streaming intensity message this report confirms.
    #[serde(default, deserialize_with = "opt_string_or_number", skip_serializing_if = "Option::is_none")]
    pub trem: Option<String>,
}

impl ReportRecord {
    /// Normalises the id and fills a missing author: `cwa` for official ids,
    /// `ExpTechTW` otherwise. An author already present is kept.
    pub fn normalize(&mut self) {
        if let Some(id) = normalize_report_id(&self.id) {
            self.id = id;
            self.author.get_or_insert_with(|| OFFICIAL_REPORT_AUTHOR.to_string());
        }
        self.author.get_or_insert_with(|| FALLBACK_REPORT_AUTHOR.to_string());
    }

    /// Overlays the fields present in a detail response.
    pub fn absorb(&mut self, detail: ReportRecord) {
        if !detail.id.is_empty() {
            self.id = detail.id;
        }
        if detail.time != 0 {
            self.time = detail.time;
        }
        if !detail.list.is_empty() {
            self.list = detail.list;
        }
        macro_rules! overlay {
            ($($field:ident),+) => {
                $(if detail.$field.is_some() {
                    self.$field = detail.$field;
                })+
            };
        }
        overlay!(author, md5, max_intensity, lat, lon, depth, mag, loc, trem);
    }
}
