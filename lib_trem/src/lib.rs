//! # lib_trem
//!
//! Earthquake early-warning acquisition client for the ExpTech network.
//!
//! A session keeps one live connection to a rotating pool of equivalent
//! nodes, prefers the WebSocket stream and falls back to HTTP polling,
//! reconciles real-time notifications with official reports, and estimates
//! per-county shaking intensity from a hypocentre.
//!
//! ```no_run
//! use lib_trem::core::{AcquisitionCoordinator, Dispatcher, JsonFileStore};
//! use lib_trem::ingestors::{ExpTechHttpClient, ExpTechWsClient};
//! use lib_trem::TremConfig;
//!
//! # async fn run() -> lib_trem::Result<()> {
//! let config = TremConfig::default();
//! let dispatcher = Dispatcher::default();
//! let http = ExpTechHttpClient::new(&config)?;
//! let store = JsonFileStore::new(&config.store_dir);
//! let mut session = AcquisitionCoordinator::new(
//!     config,
//!     http,
//!     None::<ExpTechWsClient>,
//!     store,
//!     dispatcher,
//! );
//! session.initialize().await?;
//! loop {
//!     session.tick().await;
//!     tokio::time::sleep(session.update_interval()).await;
//! }
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod configs;
pub mod core;
pub mod earthquake;
pub mod error;
pub mod ingestors;
#[cfg(feature = "loggers")]
pub mod loggers;
pub mod models;
pub mod retrieve;

pub use configs::TremConfig;
pub use error::{Result, TremError};
