//! Reachability monitoring engine
//!
//! This module is responsible for:
//! - Probing endpoints (ICMP/TCP/HTTP)
//! - Running one state machine per endpoint over its history store
//! - Ticking every endpoint from one shared timer and clock

pub mod clock;
pub mod events;
pub mod monitor;
pub mod prober;
pub mod scheduler;
pub mod types;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

pub use clock::MonitorClock;
pub use events::{EventBus, MonitorEvent};
pub use monitor::{EndpointMonitor, EndpointSnapshot};
pub use prober::{ProbeKind, Prober, build_prober};
pub use scheduler::Scheduler;
pub use types::{Endpoint, EndpointStatus, Observation};
