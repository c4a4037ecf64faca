use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Wall-clock format used in down-event lines and display labels
pub const DISPLAY_TIME_FORMAT: &str = "%m/%d/%Y, %H:%M:%S";

/// A configured endpoint to watch
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Unique, stable key; also the stem of the endpoint's files
    pub name: String,

    /// Host name or IP handed to the prober as-is
    pub address: String,
}

impl Endpoint {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self { name: name.into(), address: address.into() }
    }
}

/// Reachability state of an endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointStatus {
    #[default]
    Unknown,
    Reachable,
    Unreachable,
}

impl EndpointStatus {
    pub fn from_reachable(reachable: bool) -> Self {
        if reachable { Self::Reachable } else { Self::Unreachable }
    }

    /// Human readable label shown next to the endpoint
    pub fn label(&self) -> &'static str {
        match self {
            EndpointStatus::Unknown => "Unknown",
            EndpointStatus::Reachable => "Reachable",
            EndpointStatus::Unreachable => "Not Reachable",
        }
    }
}

impl fmt::Display for EndpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of a single probe, folded into the history right after it is taken
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub endpoint_name: String,
    pub address: String,

    /// Wall-clock time the probe finished
    pub timestamp: DateTime<Local>,

    /// Milliseconds since the shared axis origin
    pub elapsed_ms: u64,

    pub reachable: bool,
}

impl Observation {
    pub fn status(&self) -> EndpointStatus {
        EndpointStatus::from_reachable(self.reachable)
    }

    /// Line written to the down-event log for this observation
    pub fn down_line(&self) -> String {
        format!(
            "{} was down at {}",
            self.endpoint_name,
            self.timestamp.format(DISPLAY_TIME_FORMAT)
        )
    }
}
