//! # Core Engine Module
//!
//! The stateful half of the client: everything that decides what to do with
//! what the ingestors deliver.
//!
//! ## Core Components:
//!
//! - **`dispatcher`**: zero-copy fan-out of `HostEvent`s (reload and
//!   re-authentication requests, status and data-changed notices).
//! - **`store`**: the whole-document `KeyValueStore` contract with a JSON file
//!   store and an in-memory store.
//! - **`reconciler`**: the notification and report caches, their dedup and
//!   merge rules, and the intensity tables of the canonical record.
//! - **`status`**: connection mode and latency labels.
//! - **`backoff`**: the per-transport failure counter.
//! - **`upstream_manager`**: the tick-driven state machine choosing between
//!   streaming and HTTP polling, rotating nodes and escalating to the host.

/// Host event broadcaster.
pub mod dispatcher;
/// Document persistence.
pub mod store;
/// Cache, dedup and merge rules.
pub mod reconciler;
/// Connection mode and latency.
pub mod status;
/// Failure counter.
pub mod backoff;
/// The acquisition state machine.
pub mod upstream_manager;

pub use backoff::RetryCounter;
pub use dispatcher::{Dispatcher, HostEvent};
pub use reconciler::{DataReconciler, IntensityTables};
pub use status::{ConnectionMode, ServerStatus};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
pub use upstream_manager::{AcquisitionCoordinator, OperationMode};
