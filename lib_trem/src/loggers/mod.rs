/// Subscriber setup with console and file output, and old log cleanup.
pub mod tracing_local;

pub use tracing_local::{init_tracing, rotate_logs, LoggerOptions};
