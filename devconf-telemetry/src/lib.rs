//! # DevConf Telemetry
//!
//! Structured logging for the orchestrator and the remote agents.
//!
//! ```rust
//! use devconf_telemetry::{info, init_telemetry};
//!
//! init_telemetry("devconf-orchestrator").expect("telemetry");
//! info!("ready");
//! ```

pub mod init;

pub use tracing::{Span, debug, error, info, instrument, trace, warn};

pub use init::{LogFormat, TelemetryConfig, init_telemetry, init_with_config};
