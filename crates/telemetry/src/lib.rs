//! Chaincode Telemetry
//!
//! Turns logging settings into a `tracing` subscriber. The subscriber is
//! handed back as a [`tracing::Dispatch`] so a runtime can scope its logs
//! without touching process-wide state; [`init_logging`] installs it
//! globally for binaries that prefer that.

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    build_dispatch, build_dispatch_with_writer, init_logging, LogConfig, LogFormat, RUNTIME_TARGETS,
};
