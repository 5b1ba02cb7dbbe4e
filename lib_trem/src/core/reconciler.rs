//! # Data Reconciler
//!
//! Owns the two persisted documents and derives the canonical record shown to
//! presentation collaborators.
//!
//! ## Documents
//! - `recent_data`: the last ten notification revisions (deduplicated by
//!   `(id, serial)`), the adopted earthquake, the last streaming intensity
//!   and tsunami messages, and the simulation override.
//! - `report`: the last five reports (deduplicated by normalised id), the
//!   adopted report, and the time of the last full refresh.
//!
//! Every mutation builds the next document, saves it, and only then replaces
//! the in-memory copy; a failed save leaves the reconciler untouched.
//!
//! ## Merge rule
//! A simulation wins. An explicitly selected report id equal to the
//! earthquake id returns the earthquake. Otherwise a report that is newer
//! than the earthquake, or a selection that differs from it, is merged into a
//! copy of the earthquake record; the stored earthquake is never modified.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::store::KeyValueStore;
use crate::configs::constants::{
    RECENT_CACHE_LIMIT, REPORT_CACHE_LIMIT, STORE_KEY_RECENT, STORE_KEY_REPORT,
};
use crate::earthquake::{
    county_for_zip, intensity_label, region_by_name, region_levels, town_display, REGIONS,
};
use crate::error::Result;
use crate::ingestors::ReportSource;
use crate::models::{
    CanonicalEew, EewSource, EqInfo, IntensityMessage, NotificationRecord, RecentDocument, ReportDocument,
    ReportRecord,
};

/// Region code to level, and place name to label.
pub type IntensityTables = (BTreeMap<String, u8>, BTreeMap<String, String>);

/// Caches, dedup and merge rules over a [`KeyValueStore`].
pub struct DataReconciler<S> {
    store: S,
    provider: String,
    recent: RecentDocument,
    report: ReportDocument,
}

impl<S: KeyValueStore> DataReconciler<S> {
    /// Empty reconciler; call [`load`](Self::load) to restore the stored documents.
    pub fn new(store: S, provider: impl Into<String>) -> Self {
        Self {
            store,
            provider: provider.into(),
            recent: RecentDocument::default(),
            report: ReportDocument::default(),
        }
    }

    /// Notification document.
    pub fn recent(&self) -> &RecentDocument {
        &self.recent
    }

    /// Report document.
    pub fn report(&self) -> &ReportDocument {
        &self.report
    }

    /// Restores both documents. Missing or unreadable documents start empty.
    pub async fn load(&mut self) {
        self.recent = self.load_document(STORE_KEY_RECENT).await;
        self.report = self.load_document(STORE_KEY_REPORT).await;
        info!(
            "Restored {} notifications and {} reports",
            self.recent.cache.len(),
            self.report.cache.len()
        );
    }

    async fn load_document<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        match self.store.load(key).await {
            Ok(Some(value)) => serde_json::from_value(value).unwrap_or_else(|e| {
                warn!("Stored document '{}' is malformed, starting empty: {}", key, e);
                T::default()
            }),
            Ok(None) => T::default(),
            Err(e) => {
                warn!("Failed to load '{}', starting empty: {}", key, e);
                T::default()
            }
        }
    }

    async fn persist<T: Serialize>(&self, key: &str, doc: &T) -> Result<()> {
        let value = serde_json::to_value(doc)?;
        self.store.save(key, &value).await
    }

    async fn commit_recent(&mut self, next: RecentDocument) -> Result<()> {
        self.persist(STORE_KEY_RECENT, &next).await?;
        self.recent = next;
        Ok(())
    }

    async fn commit_report(&mut self, next: ReportDocument) -> Result<()> {
        self.persist(STORE_KEY_REPORT, &next).await?;
        self.report = next;
        Ok(())
    }

    /// Writes both documents as they are.
    pub async fn flush(&self) -> Result<()> {
        self.persist(STORE_KEY_RECENT, &self.recent).await?;
        self.persist(STORE_KEY_REPORT, &self.report).await
    }

    /// Adds a notification revision. Returns `false` for an already-seen
    /// `(id, serial)` or when there is nothing to add.
    pub async fn load_recent_data(&mut self, update: Option<NotificationRecord>) -> Result<bool> {
        let Some(record) = update else {
            return Ok(false);
        };
        if self.recent.cache.iter().any(|r| r.revision_key() == record.revision_key()) {
            return Ok(false);
        }

        let mut next = self.recent.clone();
        if record.matches_provider(&self.provider) {
            next.earthquake = Some(record.clone());
        }
        debug!("Stored earthquake revision {:?}", record.revision_key());
        next.cache.insert(0, record);
        next.cache.truncate(RECENT_CACHE_LIMIT);
        next.simulating = None;

        self.commit_recent(next).await?;
        Ok(true)
    }

    /// Adds a report, enriched with its detail. Returns `false` for an
    /// already-cached id or when there is nothing to add.
    pub async fn load_report_data(
        &mut self,
        update: Option<ReportRecord>,
        source: &dyn ReportSource,
    ) -> Result<bool> {
        let Some(mut report) = update else {
            return Ok(false);
        };
        let raw_id = report.id.clone();
        report.normalize();
        if self.report.cache.iter().any(|r| r.id == report.id) {
            return Ok(false);
        }

        if let Some(detail) = source.fetch_report_detail(&raw_id).await {
            report.absorb(detail);
            report.normalize();
        }

        let mut next = self.report.clone();
        next.recent = Some(report.clone());
        next.cache.insert(0, report);
        next.cache.truncate(REPORT_CACHE_LIMIT);

        self.commit_report(next).await?;
        Ok(true)
    }

    /// Replaces the report cache with the latest summaries and their details.
    /// Returns `false` when the source had nothing.
    pub async fn fetch_report(&mut self, source: &dyn ReportSource, limit: usize) -> Result<bool> {
        let summaries = source.fetch_report_summaries(limit).await;
        if summaries.is_empty() {
            return Ok(false);
        }

        let mut reports = Vec::with_capacity(summaries.len());
        for mut summary in summaries {
            if let Some(detail) = source.fetch_report_detail(&summary.id).await {
                summary.absorb(detail);
            }
            summary.normalize();
            reports.push(summary);
        }
        reports.truncate(REPORT_CACHE_LIMIT);

        let next = ReportDocument {
            recent: reports.first().cloned(),
            cache: reports,
            fetch_time: now_secs(),
        };
        self.commit_report(next).await?;
        info!("Report cache refreshed with {} reports", self.report.cache.len());
        Ok(true)
    }

    /// True when the last full refresh is at least `window` old.
    pub fn report_refresh_due(&self, window: Duration) -> bool {
        now_secs() - self.report.fetch_time >= window.as_secs_f64()
    }

    /// Keeps the latest streaming intensity message. Returns `false` when it
    /// is already the stored one.
    pub async fn store_intensity(&mut self, message: IntensityMessage) -> Result<bool> {
        if self.recent.intensity.as_ref() == Some(&message) {
            return Ok(false);
        }
        let mut next = self.recent.clone();
        next.intensity = Some(message);
        self.commit_recent(next).await?;
        Ok(true)
    }

    /// Keeps the latest tsunami bulletin. Returns `false` when unchanged.
    pub async fn store_tsunami(&mut self, bulletin: Value) -> Result<bool> {
        if self.recent.tsunami.as_ref() == Some(&bulletin) {
            return Ok(false);
        }
        let mut next = self.recent.clone();
        next.tsunami = Some(bulletin);
        self.commit_recent(next).await?;
        Ok(true)
    }

    /// Sets or clears the simulation override.
    pub async fn set_simulation(&mut self, record: Option<NotificationRecord>) -> Result<()> {
        let mut next = self.recent.clone();
        next.simulating = record;
        self.commit_recent(next).await
    }

    /// Canonical record for display, optionally for a selected report id.
    /// `None` when neither an earthquake nor a report is known.
    pub fn load_eew_data(&self, selector: Option<&str>) -> Option<CanonicalEew> {
        // 1. Simulation override
        if let Some(sim) = &self.recent.simulating {
            let intensity = region_levels(&sim.eq.epicenter());
            let list = physics_list(&intensity);
            return Some(CanonicalEew {
                record: sim.clone(),
                source: EewSource::Simulation,
                intensity,
                list,
            });
        }

        let eew = self.recent.earthquake.as_ref();
        let mut report = self.report.recent.as_ref();

        // 2. Explicit selection
        if let Some(selected) = selector {
            if let Some(found) = self.report.cache.iter().find(|r| r.id == selected) {
                report = Some(found);
            }
            if let Some(eew) = eew.filter(|e| e.id == selected) {
                let (intensity, list) = self.load_intensities(Some(eew), report);
                return Some(CanonicalEew {
                    record: eew.clone(),
                    source: EewSource::Notification,
                    intensity,
                    list,
                });
            }
        }

        // 3. Newer or selected report wins
        if let Some(report) = report {
            let eew_time = eew.map_or(0, |e| e.time);
            let selection_differs = selector.is_some_and(|s| eew.is_none_or(|e| e.id != s));
            if report.time > eew_time || selection_differs {
                let (intensity, list) = self.load_intensities(eew, Some(report));
                return Some(CanonicalEew {
                    record: merge_report(eew, report),
                    source: EewSource::Report,
                    intensity,
                    list,
                });
            }
        }

        // 4. Notification only
        if let Some(eew) = eew {
            let (intensity, list) = self.load_intensities(Some(eew), report);
            return Some(CanonicalEew {
                record: eew.clone(),
                source: EewSource::Notification,
                intensity,
                list,
            });
        }

        // 5. Intensity message on its own
        let message = self
            .recent
            .intensity
            .as_ref()
            .filter(|m| !m.id.is_empty() && !m.correlates(None, report))?;
        let (intensity, list) = zip_tables(message);
        let record = NotificationRecord {
            id: message.id.clone(),
            author: message.author.clone().unwrap_or_default(),
            eq: EqInfo { max: message.max, ..Default::default() },
            ..Default::default()
        };
        Some(CanonicalEew {
            record,
            source: EewSource::IntensityOnly,
            intensity,
            list,
        })
    }

    /// Region table and display list for a record.
    ///
    /// The report's own breakdown is used when it has one and the cached
    /// streaming intensity id is unset or matches the report's `trem` id. The
    /// cached id only counts when the notification and the report share an
    /// id. Otherwise a streaming message that belongs to `eew` or `report` is
    /// aggregated per county. An unrelated message is ignored and the table
    /// is estimated from the record's hypocentre.
    pub fn load_intensities(
        &self,
        eew: Option<&NotificationRecord>,
        report: Option<&ReportRecord>,
    ) -> IntensityTables {
        let message = self.recent.intensity.as_ref();

        if let Some(report) = report.filter(|r| !r.list.is_empty()) {
            let same_event = eew.is_some_and(|e| e.id == report.id);
            let cached_id = message.filter(|_| same_event).map(|m| m.id.as_str());
            if cached_id.is_none() || cached_id == report.trem.as_deref() {
                return report_tables(report);
            }
        }

        if let Some(message) = message.filter(|m| !m.area.is_empty() && m.correlates(eew, report)) {
            return zip_tables(message);
        }

        match eew {
            Some(eew) => {
                let intensity = region_levels(&eew.eq.epicenter());
                let list = physics_list(&intensity);
                (intensity, list)
            }
            None => Default::default(),
        }
    }
}

/// Copy of the earthquake record carrying the report's position, magnitude,
/// time, id and fingerprint.
fn merge_report(eew: Option<&NotificationRecord>, report: &ReportRecord) -> NotificationRecord {
    let mut merged = eew.cloned().unwrap_or_default();

    let eq = &mut merged.eq;
    eq.lat = report.lat.unwrap_or(eq.lat);
    eq.lon = report.lon.unwrap_or(eq.lon);
    eq.depth = report.depth.unwrap_or(eq.depth);
    eq.mag = report.mag.unwrap_or(eq.mag);
    if let Some(loc) = &report.loc {
        eq.loc = loc.clone();
    }
    eq.time = report.time;
    eq.max = report.max_intensity;

    merged.id = report.id.clone();
    merged.author = report.author.clone().unwrap_or_default();
    merged.serial = None;
    merged.time = merged.eq.time;
    merged.md5 = report.md5.clone();
    merged
}

fn report_tables(report: &ReportRecord) -> IntensityTables {
    let mut intensity = BTreeMap::new();
    let mut list = BTreeMap::new();

    for (county, detail) in &report.list {
        match region_by_name(county) {
            Some(region) => {
                intensity.insert(region.code.to_string(), detail.intensity);
            }
            None => warn!("Report lists unknown county {}", county),
        }
        let label = intensity_label(detail.intensity);
        list.insert(county.clone(), label.clone());
        for town in &detail.town {
            list.insert(format!("{county}{town}"), label.clone());
        }
    }
    (intensity, list)
}

fn zip_tables(message: &IntensityMessage) -> IntensityTables {
    let mut intensity: BTreeMap<String, u8> = BTreeMap::new();
    let mut list = BTreeMap::new();

    for (level, zips) in &message.area {
        let Ok(level) = level.parse::<u8>() else {
            warn!("Skipping intensity level '{}'", level);
            continue;
        };
        let label = intensity_label(level);
        for &zip in zips {
            if let Some(region) = county_for_zip(zip) {
                let entry = intensity.entry(region.code.to_string()).or_insert(level);
                *entry = (*entry).max(level);
            }
            if let Some(place) = town_display(zip) {
                list.insert(place, label.clone());
            }
        }
    }
    (intensity, list)
}

fn physics_list(levels: &BTreeMap<String, u8>) -> BTreeMap<String, String> {
    REGIONS
        .iter()
        .filter_map(|region| {
            let level = *levels.get(region.code)?;
            (level > 0).then(|| (region.name.to_string(), intensity_label(level)))
        })
        .collect()
}

fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::core::store::MemoryStore;
    use crate::error::TremError;

    struct FakeReports {
        summaries: Vec<ReportRecord>,
        details: BTreeMap<String, ReportRecord>,
        detail_calls: AtomicUsize,
    }

    impl FakeReports {
        fn empty() -> Self {
            Self { summaries: Vec::new(), details: BTreeMap::new(), detail_calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl ReportSource for FakeReports {
        async fn fetch_report_summaries(&self, limit: usize) -> Vec<ReportRecord> {
            self.summaries.iter().take(limit).cloned().collect()
        }

        async fn fetch_report_detail(&self, report_id: &str) -> Option<ReportRecord> {
            self.detail_calls.fetch_add(1, Ordering::SeqCst);
            self.details.get(report_id).cloned()
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl KeyValueStore for BrokenStore {
        async fn load(&self, _key: &str) -> Result<Option<Value>> {
            Ok(None)
        }

        async fn save(&self, key: &str, _value: &Value) -> Result<()> {
            Err(TremError::Store { key: key.to_string(), reason: "read-only".into() })
        }
    }

    fn eew(id: &str, serial: u32, time: i64) -> NotificationRecord {
        serde_json::from_value(json!({
            "id": id, "serial": serial, "author": "cwa", "time": time,
            "eq": {"lat": 24.1, "lon": 121.53, "depth": 20.7, "mag": 4.3, "loc": "花蓮縣", "time": time}
        }))
        .unwrap()
    }

    fn report(id: &str, time: i64) -> ReportRecord {
        ReportRecord {
            id: id.into(),
            time,
            author: Some("cwa".into()),
            md5: Some("f00d".into()),
            max_intensity: Some(4),
            lat: Some(23.9),
            lon: Some(121.6),
            depth: Some(15.0),
            mag: Some(4.5),
            loc: Some("花蓮縣秀林鄉".into()),
            ..Default::default()
        }
    }

    fn reconciler() -> DataReconciler<Arc<MemoryStore>> {
        DataReconciler::new(Arc::new(MemoryStore::new()), "")
    }

    #[tokio::test]
    async fn duplicate_revisions_are_ignored_and_cache_is_bounded() {
        let mut rec = reconciler();
        assert!(rec.load_recent_data(Some(eew("1", 1, 10))).await.unwrap());
        assert!(!rec.load_recent_data(Some(eew("1", 1, 10))).await.unwrap());
        assert!(rec.load_recent_data(Some(eew("1", 2, 20))).await.unwrap());

        for serial in 3..20 {
            rec.load_recent_data(Some(eew("1", serial, 30))).await.unwrap();
        }
        let cache = &rec.recent().cache;
        assert_eq!(cache.len(), RECENT_CACHE_LIMIT);
        assert_eq!(cache[0].serial, Some(19));
        assert!(!rec.load_recent_data(None).await.unwrap());
    }

    #[tokio::test]
    async fn provider_filter_limits_adoption() {
        let mut rec = DataReconciler::new(MemoryStore::new(), "trem");
        rec.load_recent_data(Some(eew("1", 1, 10))).await.unwrap();
        assert_eq!(rec.recent().cache.len(), 1);
        assert!(rec.recent().earthquake.is_none());
    }

    #[tokio::test]
    async fn new_notification_clears_simulation_and_persists() {
        let store = Arc::new(MemoryStore::new());
        let mut rec = DataReconciler::new(Arc::clone(&store), "");
        rec.set_simulation(Some(eew("sim", 1, 5))).await.unwrap();
        assert!(rec.load_eew_data(None).unwrap().source == EewSource::Simulation);

        rec.load_recent_data(Some(eew("1", 1, 10))).await.unwrap();
        assert!(rec.recent().simulating.is_none());

        let saved = store.load(STORE_KEY_RECENT).await.unwrap().unwrap();
        assert_eq!(saved["simulating"], json!({}));
        assert_eq!(saved["earthquake"]["id"], "1");
    }

    #[tokio::test]
    async fn failed_save_leaves_state_untouched() {
        let mut rec = DataReconciler::new(BrokenStore, "");
        assert!(rec.load_recent_data(Some(eew("1", 1, 10))).await.is_err());
        assert!(rec.recent().cache.is_empty());
        assert!(rec.recent().earthquake.is_none());
    }

    #[tokio::test]
    async fn report_ids_are_normalised_deduplicated_and_enriched() {
        let mut source = FakeReports::empty();
        let mut detail = report("114081-2025-0403-114700", 0);
        detail.list = serde_json::from_value(json!({"花蓮縣": {"int": 4, "town": ["秀林鄉"]}})).unwrap();
        source.details.insert("114081-2025-0403-114700".into(), detail);

        let mut rec = reconciler();
        let summary = ReportRecord { id: "114081-2025-0403-114700".into(), time: 2000, ..Default::default() };
        assert!(rec.load_report_data(Some(summary.clone()), &source).await.unwrap());
        assert!(!rec.load_report_data(Some(summary), &source).await.unwrap());
        assert_eq!(source.detail_calls.load(Ordering::SeqCst), 1);

        let cached = &rec.report().cache[0];
        assert_eq!(cached.id, "114081-0403-114700");
        assert_eq!(cached.author.as_deref(), Some("cwa"));
        assert_eq!(cached.time, 2000);
        assert_eq!(cached.list["花蓮縣"].intensity, 4);
        assert_eq!(rec.report().recent.as_ref().map(|r| r.id.as_str()), Some("114081-0403-114700"));
    }

    #[tokio::test]
    async fn report_cache_is_bounded() {
        let source = FakeReports::empty();
        let mut rec = reconciler();
        for n in 0..8 {
            let id = format!("local-{n}");
            rec.load_report_data(Some(ReportRecord { id, ..Default::default() }), &source).await.unwrap();
        }
        assert_eq!(rec.report().cache.len(), REPORT_CACHE_LIMIT);
        assert_eq!(rec.report().cache[0].id, "local-7");
        assert_eq!(rec.report().cache[0].author.as_deref(), Some("ExpTechTW"));
    }

    #[tokio::test]
    async fn newer_report_is_merged_without_touching_the_earthquake() {
        let mut rec = reconciler();
        rec.load_recent_data(Some(eew("114081", 1, 1000))).await.unwrap();
        rec.load_report_data(Some(report("114081-0403-114700", 2000)), &FakeReports::empty())
            .await
            .unwrap();

        let canonical = rec.load_eew_data(None).unwrap();
        assert_eq!(canonical.source, EewSource::Report);
        assert_eq!(canonical.record.id, "114081-0403-114700");
        assert_eq!(canonical.record.serial, None);
        assert_eq!(canonical.record.eq.time, 2000);
        assert_eq!(canonical.record.time, 2000);
        assert_eq!(canonical.record.eq.max, Some(4));
        assert_eq!(canonical.record.md5.as_deref(), Some("f00d"));

        let serialised = serde_json::to_value(&canonical).unwrap();
        assert!(serialised.get("serial").is_none());

        let stored = rec.recent().earthquake.as_ref().unwrap();
        assert_eq!(stored.id, "114081");
        assert_eq!(stored.serial, Some(1));
    }

    #[tokio::test]
    async fn older_report_leaves_the_notification() {
        let mut rec = reconciler();
        rec.load_recent_data(Some(eew("114081", 1, 1000))).await.unwrap();
        rec.load_report_data(Some(report("older", 500)), &FakeReports::empty()).await.unwrap();

        let canonical = rec.load_eew_data(None).unwrap();
        assert_eq!(canonical.source, EewSource::Notification);
        assert_eq!(&canonical.record, rec.recent().earthquake.as_ref().unwrap());
    }

    #[tokio::test]
    async fn selected_report_wins_unless_it_is_the_earthquake() {
        let mut rec = reconciler();
        let source = FakeReports::empty();
        rec.load_report_data(Some(report("old-report", 100)), &source).await.unwrap();
        rec.load_report_data(Some(report("new-report", 200)), &source).await.unwrap();
        rec.load_recent_data(Some(eew("live", 1, 5000))).await.unwrap();

        let selected = rec.load_eew_data(Some("old-report")).unwrap();
        assert_eq!(selected.source, EewSource::Report);
        assert_eq!(selected.record.id, "old-report");
        assert_eq!(selected.record.time, 100);

        let live = rec.load_eew_data(Some("live")).unwrap();
        assert_eq!(live.source, EewSource::Notification);
        assert_eq!(live.record.serial, Some(1));
    }

    #[test]
    fn nothing_known_yields_nothing() {
        assert!(reconciler().load_eew_data(None).is_none());
    }

    #[tokio::test]
    async fn report_breakdown_is_authoritative_when_ids_correlate() {
        let mut rec = reconciler();
        let mut rpt = report("114081-0403-114700", 2000);
        rpt.trem = Some("42".into());
        rpt.list = serde_json::from_value(json!({
            "花蓮縣": {"int": 4, "town": ["秀林鄉", "新城鄉"]},
            "宜蘭縣": {"int": 2, "town": []}
        }))
        .unwrap();
        let message = IntensityMessage {
            id: "7".into(),
            area: [("3".to_string(), vec![970])].into(),
            ..Default::default()
        };
        rec.store_intensity(message).await.unwrap();

        let eew_other = eew("114081", 1, 1000);
        let (intensity, list) = rec.load_intensities(Some(&eew_other), Some(&rpt));
        assert_eq!(intensity["TWHUA"], 4);
        assert_eq!(intensity["TWILA"], 2);
        assert_eq!(list["花蓮縣秀林鄉"], "4級");
        assert_eq!(list["宜蘭縣"], "2級");

        // Same event but a stale streaming id: neither table applies, so the
        // hypocentre estimate is used.
        let eew_same = NotificationRecord { id: rpt.id.clone(), ..eew_other };
        let (intensity, list) = rec.load_intensities(Some(&eew_same), Some(&rpt));
        assert_eq!(intensity, region_levels(&eew_same.eq.epicenter()));
        assert!(!list.contains_key("花蓮縣花蓮市"));
    }

    #[tokio::test]
    async fn streaming_intensity_only_applies_to_its_own_event() {
        let mut rec = reconciler();
        let quake: NotificationRecord = serde_json::from_value(json!({
            "id": "A", "author": "cwa", "time": 10,
            "eq": {"lat": 22.0, "lon": 120.3, "depth": 10.0, "mag": 4.0}
        }))
        .unwrap();
        rec.load_recent_data(Some(quake.clone())).await.unwrap();
        let area = [("5".to_string(), vec![970])];
        rec.store_intensity(IntensityMessage { id: "99".into(), area: area.clone().into(), ..Default::default() })
            .await
            .unwrap();

        let shown = rec.load_eew_data(None).unwrap();
        assert_eq!(shown.source, EewSource::Notification);
        assert_eq!(shown.intensity, region_levels(&quake.eq.epicenter()));
        assert!(!shown.list.contains_key("花蓮縣花蓮市"));

        rec.store_intensity(IntensityMessage { id: "A".into(), area: area.into(), ..Default::default() })
            .await
            .unwrap();
        let shown = rec.load_eew_data(None).unwrap();
        assert_eq!(shown.intensity.len(), 1);
        assert_eq!(shown.intensity["TWHUA"], 5);
        assert_eq!(shown.list["花蓮縣花蓮市"], "5弱");
    }

    #[tokio::test]
    async fn intensity_message_alone_is_shown() {
        let mut rec = reconciler();
        let message = IntensityMessage {
            id: "99".into(),
            author: Some("trem".into()),
            max: Some(5),
            area: [("5".to_string(), vec![970])].into(),
        };
        rec.store_intensity(message).await.unwrap();

        let shown = rec.load_eew_data(None).unwrap();
        assert_eq!(shown.source, EewSource::IntensityOnly);
        assert_eq!(shown.record.id, "99");
        assert_eq!(shown.record.author, "trem");
        assert_eq!(shown.record.serial, None);
        assert_eq!(shown.record.eq.max, Some(5));
        assert_eq!(shown.intensity["TWHUA"], 5);
        assert_eq!(shown.list["花蓮縣花蓮市"], "5弱");
    }

    #[tokio::test]
    async fn zip_codes_aggregate_to_the_county_maximum() {
        let mut rec = reconciler();
        let area = [
            ("2".to_string(), vec![700, 701]),
            ("4".to_string(), vec![702]),
            ("x".to_string(), vec![100]),
        ];
        rec.store_intensity(IntensityMessage { id: "9".into(), area: area.into(), ..Default::default() })
            .await
            .unwrap();

        let quake = NotificationRecord { id: "9".into(), ..Default::default() };
        let (intensity, _) = rec.load_intensities(Some(&quake), None);
        assert_eq!(intensity.len(), 1);
        assert_eq!(intensity["TWTNN"], 4);
    }

    #[test]
    fn hypocentre_estimate_without_any_table() {
        let rec = reconciler();
        let quake: NotificationRecord = serde_json::from_value(json!({
            "id": "1", "eq": {"lat": 23.21, "lon": 120.4, "depth": 7.3, "mag": 4.9}
        }))
        .unwrap();

        let (intensity, list) = rec.load_intensities(Some(&quake), None);
        assert!(intensity["TWTNN"] > intensity["TWKIN"]);
        assert_eq!(list["臺南市"], "3級");
        assert!(!list.contains_key("金門縣"));
    }

    #[tokio::test]
    async fn fetch_report_replaces_the_cache() {
        let mut source = FakeReports::empty();
        source.summaries = vec![report("114082-2025-0404-000001", 300), report("local-1", 200)];
        source.details.insert(
            "114082-2025-0404-000001".into(),
            ReportRecord { id: "114082-2025-0404-000001".into(), trem: Some("55".into()), ..Default::default() },
        );

        let mut rec = reconciler();
        assert!(rec.report_refresh_due(Duration::from_secs(600)));
        assert!(rec.fetch_report(&source, 5).await.unwrap());

        assert_eq!(rec.report().cache.len(), 2);
        let recent = rec.report().recent.as_ref().unwrap();
        assert_eq!(recent.id, "114082-0404-000001");
        assert_eq!(recent.trem.as_deref(), Some("55"));
        assert!(!rec.report_refresh_due(Duration::from_secs(600)));

        assert!(!rec.fetch_report(&FakeReports::empty(), 5).await.unwrap());
        assert_eq!(rec.report().cache.len(), 2);
    }

    #[tokio::test]
    async fn documents_survive_a_reload() {
        let store = Arc::new(MemoryStore::new());
        let mut first = DataReconciler::new(Arc::clone(&store), "");
        first.load_recent_data(Some(eew("1", 1, 10))).await.unwrap();
        first.store_tsunami(json!({"id": "t1"})).await.unwrap();

        let mut second = DataReconciler::new(store, "");
        second.load().await;
        assert_eq!(second.recent(), first.recent());
    }
}
