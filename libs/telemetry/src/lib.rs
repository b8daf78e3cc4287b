//! Logging and metric helpers shared by the link bot crates.
//!
//! Logs go through `tracing`; counters go through the `metrics` facade and stay no-ops until the
//! embedding process installs a recorder.

mod config;
mod counters;
mod tracing_init;

pub use config::TelemetryConfig;
pub use counters::{
    ReplyOutcome, record_delivery, record_event, record_reply, record_upstream_failure,
    start_delivery_span,
};
pub use tracing_init::init_telemetry;
