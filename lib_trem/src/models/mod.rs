//! # Data Models
//!
//! Typed records for everything that crosses the JSON boundary: notification
//! revisions, reports, intensity flash messages, the two persisted documents
//! and the canonical view handed to presentation. Upstream payloads are
//! loosely typed, so normalisation (string-or-number ids, `{}` for absent
//! records, town lists as arrays or maps) happens here and nowhere else.

/// Notification revisions and their hypocentre block.
pub mod notification;
/// Reports and report id normalisation.
pub mod report;
/// Transport payloads.
pub mod stream;
/// Persisted documents and the canonical view.
pub mod documents;
/// Field adapters.
pub mod serde_helpers;

pub use documents::{CanonicalEew, EewSource, RecentDocument, ReportDocument};
pub use notification::{EqInfo, NotificationRecord};
pub use report::{normalize_report_id, RegionReport, ReportRecord};
pub use stream::{IntensityMessage, StreamPayload};
