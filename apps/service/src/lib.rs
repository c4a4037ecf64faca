//! Statewatch - periodic reachability monitoring with compacted history
//!
//! Every configured endpoint is probed on a shared schedule. Each outcome is
//! folded into a run-length compacted series of segments that is written
//! through to disk after every tick, and every down observation is appended
//! to the endpoint's down-event log.

pub mod config;
pub mod history;
pub mod monitoring;
pub mod registry;

pub use config::{Config, ConfigError};
pub use history::{HistoryStore, Segment, SegmentSeries, StoreError};
pub use monitoring::{
    Endpoint, EndpointMonitor, EndpointSnapshot, EndpointStatus, EventBus, MonitorClock,
    MonitorEvent, Observation, ProbeKind, Prober, Scheduler,
};
pub use registry::{Registry, RegistryError};
