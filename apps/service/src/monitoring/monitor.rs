use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::clock::MonitorClock;
use super::events::{EventBus, MonitorEvent};
use super::prober::Prober;
use super::types::{Endpoint, EndpointStatus, Observation};
use crate::history::{HistoryStore, Segment, SegmentSeries};

/// What the presentation layer sees of one endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointSnapshot {
    pub name: String,
    pub address: String,
    pub log_file: PathBuf,
    pub status: EndpointStatus,
    pub last_checked: Option<DateTime<Local>>,
    pub segments: Vec<Segment>,

    /// Last failure to persist history, cleared by the next clean tick
    pub last_write_error: Option<String>,
}

/// Per-endpoint state machine driving the prober and the history store
pub struct EndpointMonitor {
    endpoint: Endpoint,
    prober: Arc<dyn Prober>,
    clock: Arc<MonitorClock>,
    store: HistoryStore,
    status: EndpointStatus,
    events: EventBus,
    snapshot_tx: watch::Sender<EndpointSnapshot>,
}

impl EndpointMonitor {
    pub fn new(
        prober: Arc<dyn Prober>,
        clock: Arc<MonitorClock>,
        store: HistoryStore,
        events: EventBus,
    ) -> Self {
        let endpoint = store.endpoint().clone();
        let snapshot = EndpointSnapshot {
            name: endpoint.name.clone(),
            address: endpoint.address.clone(),
            log_file: store.log_path().to_path_buf(),
            status: EndpointStatus::Unknown,
            last_checked: None,
            segments: store.series().as_slice().to_vec(),
            last_write_error: None,
        };
        let (snapshot_tx, _rx) = watch::channel(snapshot);

        Self { endpoint, prober, clock, store, status: EndpointStatus::Unknown, events, snapshot_tx }
    }

    /// Open a monitor per endpoint under `directory`.
    ///
    /// An endpoint whose store cannot be opened is logged and left out; the
    /// others still start.
    pub fn open_all(
        directory: &Path,
        endpoints: impl IntoIterator<Item = Endpoint>,
        prober: Arc<dyn Prober>,
        clock: Arc<MonitorClock>,
        events: EventBus,
    ) -> Vec<Self> {
        endpoints
            .into_iter()
            .filter_map(|endpoint| match HistoryStore::open(directory, &endpoint) {
                Ok(store) => Some(Self::new(prober.clone(), clock.clone(), store, events.clone())),
                Err(e) => {
                    error!(endpoint = %endpoint.name, error = %e, "Failed to open history, endpoint disabled");
                    None
                }
            })
            .collect()
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn status(&self) -> EndpointStatus {
        self.status
    }

    pub fn history(&self) -> &SegmentSeries {
        self.store.series()
    }

    pub fn subscribe(&self) -> watch::Receiver<EndpointSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Probe once, fold the outcome into the history and publish the new state.
    ///
    /// Persistence failures are reported but never abort the tick.
    pub async fn tick(&mut self) -> Observation {
        let reachable = self.prober.probe(&self.endpoint.address).await;
        let observation = self.clock.observe(&self.endpoint, reachable);
        let name = &self.endpoint.name;

        debug!(endpoint = %name, reachable, elapsed_ms = observation.elapsed_ms, "Probe finished");

        let status = observation.status();
        if status != self.status {
            info!(endpoint = %name, from = %self.status, to = %status, "Status changed");
            self.events.publish(MonitorEvent::StatusChanged {
                name: name.clone(),
                from: self.status,
                to: status,
            });
            self.status = status;
        }

        let mut write_errors = Vec::new();

        if !reachable {
            match self.store.record_down_event(&observation) {
                Ok(line) => {
                    warn!(endpoint = %name, "{}", line);
                    self.events.publish(MonitorEvent::DownRecorded { name: name.clone(), line });
                }
                Err(e) => {
                    error!(endpoint = %name, error = %e, "Failed to append down event");
                    write_errors.push(format!("down-event log: {e}"));
                }
            }
        }

        match self.store.merge(&observation) {
            Ok(outcome) => {
                debug!(endpoint = %name, ?outcome, segments = self.store.series().len(), "History updated")
            }
            Err(e) => {
                error!(endpoint = %name, error = %e, "Failed to persist segment table");
                write_errors.push(format!("segment table: {e}"));
            }
        }

        let write_error = (!write_errors.is_empty()).then(|| write_errors.join("; "));
        if let Some(error) = &write_error {
            self.events.publish(MonitorEvent::PersistFailed { name: name.clone(), error: error.clone() });
        }

        let segments = self.store.series().as_slice().to_vec();
        self.snapshot_tx.send_modify(|snapshot| {
            snapshot.status = status;
            snapshot.last_checked = Some(observation.timestamp);
            snapshot.segments = segments;
            snapshot.last_write_error = write_error;
        });

        observation
    }
}
