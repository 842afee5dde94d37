//! Bridge service lifecycle for the relay.
//!
//! The target-platform REST bridge runs as a separate process watched from a
//! dedicated thread, so it keeps serving regardless of the async scheduler's
//! cadence. [`BridgeSupervisor`] owns the start/ready/stop protocol around it.

pub mod config;
pub mod error;
pub mod process;
pub mod service;
pub mod supervisor;

pub use config::BridgeConfig;
pub use error::SupervisorError;
pub use service::{BackgroundService, ProcessService, ServiceFlags};
pub use supervisor::{BridgeServiceHandle, BridgeSupervisor, ScopedBridge, ServiceStatus};
