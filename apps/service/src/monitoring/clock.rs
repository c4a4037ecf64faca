use std::fs;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::types::{Endpoint, Observation};

const ORIGIN_FILE: &str = "origin.json";

#[derive(Debug, Serialize, Deserialize)]
struct OriginFile {
    origin: DateTime<Local>,
}

/// Shared time reference for every endpoint.
///
/// Created once at startup and handed to each monitor; all observations
/// measure `elapsed_ms` from the same origin so their series share one axis.
#[derive(Debug, Clone)]
pub struct MonitorClock {
    started_at: Instant,
    origin: DateTime<Local>,
    origin_offset_ms: u64,
}

impl MonitorClock {
    /// Clock whose origin is now
    pub fn start() -> Self {
        Self::resume_from(Local::now())
    }

    /// Clock continuing the axis of an earlier `origin`
    pub fn resume_from(origin: DateTime<Local>) -> Self {
        let origin_offset_ms = (Local::now() - origin).num_milliseconds().max(0) as u64;
        Self { started_at: Instant::now(), origin, origin_offset_ms }
    }

    /// Resume from the origin persisted in `directory`, or start a new one and persist it
    pub fn load_or_start(directory: &Path) -> Self {
        let path = directory.join(ORIGIN_FILE);

        match read_origin(&path) {
            Ok(Some(origin)) => {
                info!("Resuming time axis from {}", origin.to_rfc3339());
                return Self::resume_from(origin);
            }
            Ok(None) => {}
            Err(e) => warn!("Ignoring unreadable {}: {:#}", path.display(), e),
        }

        let clock = Self::start();
        if let Err(e) = write_origin(&path, clock.origin) {
            warn!("Failed to persist time axis origin: {:#}", e);
        }
        clock
    }

    pub fn origin(&self) -> DateTime<Local> {
        self.origin
    }

    /// Milliseconds since the origin; never decreases within a process
    pub fn elapsed_ms(&self) -> u64 {
        self.origin_offset_ms + self.started_at.elapsed().as_millis() as u64
    }

    /// Stamp a probe outcome for `endpoint`
    pub fn observe(&self, endpoint: &Endpoint, reachable: bool) -> Observation {
        Observation {
            endpoint_name: endpoint.name.clone(),
            address: endpoint.address.clone(),
            timestamp: Local::now(),
            elapsed_ms: self.elapsed_ms(),
            reachable,
        }
    }
}

fn read_origin(path: &Path) -> Result<Option<DateTime<Local>>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).context("Failed to read origin file")?;
    let file: OriginFile = serde_json::from_str(&raw).context("Failed to parse origin file")?;
    Ok(Some(file.origin))
}

fn write_origin(path: &Path, origin: DateTime<Local>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let raw = serde_json::to_string_pretty(&OriginFile { origin })?;
    fs::write(path, raw).context("Failed to write origin file")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_elapsed_is_monotonic() {
        let clock = MonitorClock::start();
        let first = clock.elapsed_ms();
        let second = clock.elapsed_ms();
        assert!(second >= first);
    }

    #[test]
    fn test_resume_offsets_axis() {
        let clock = MonitorClock::resume_from(Local::now() - Duration::minutes(10));
        assert!(clock.elapsed_ms() >= 600_000);
    }

    #[test]
    fn test_future_origin_does_not_underflow() {
        let clock = MonitorClock::resume_from(Local::now() + Duration::hours(1));
        assert!(clock.elapsed_ms() < 60_000);
    }

    #[test]
    fn test_origin_persists_across_starts() {
        let dir = tempdir().unwrap();

        let first = MonitorClock::load_or_start(dir.path());
        let second = MonitorClock::load_or_start(dir.path());

        assert_eq!(first.origin(), second.origin());
        assert!(dir.path().join(ORIGIN_FILE).exists());
    }

    #[test]
    fn test_unreadable_origin_is_replaced() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(ORIGIN_FILE), "not json").unwrap();

        let clock = MonitorClock::load_or_start(dir.path());
        let reloaded = MonitorClock::load_or_start(dir.path());

        assert_eq!(clock.origin(), reloaded.origin());
    }

    #[test]
    fn test_observe_stamps_endpoint() {
        let clock = MonitorClock::start();
        let endpoint = Endpoint::new("dns", "1.1.1.1");

        let observation = clock.observe(&endpoint, true);
        assert_eq!(observation.endpoint_name, "dns");
        assert_eq!(observation.address, "1.1.1.1");
        assert!(observation.reachable);
    }
}
