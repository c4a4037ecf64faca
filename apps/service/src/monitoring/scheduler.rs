use std::future::Future;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use super::events::{EventBus, MonitorEvent};
use super::monitor::{EndpointMonitor, EndpointSnapshot};

/// One tick request for an endpoint worker
struct Tick {
    done: Option<oneshot::Sender<()>>,
}

/// Task owning one endpoint's monitor; ticks for it run strictly one after another
struct EndpointWorker {
    name: String,
    tick_tx: mpsc::Sender<Tick>,
    snapshot_rx: watch::Receiver<EndpointSnapshot>,
    handle: JoinHandle<()>,
}

/// Drives every endpoint monitor from a single periodic timer
pub struct Scheduler {
    period: Duration,
    workers: Vec<EndpointWorker>,
    events: EventBus,
}

impl Scheduler {
    /// Spawn one worker task per monitor
    pub fn spawn(period: Duration, monitors: Vec<EndpointMonitor>, events: EventBus) -> Self {
        let workers = monitors.into_iter().map(spawn_worker).collect();

        Self { period, workers, events }
    }

    pub fn endpoint_names(&self) -> impl Iterator<Item = &str> {
        self.workers.iter().map(|worker| worker.name.as_str())
    }

    /// Latest snapshot receiver for every endpoint, in registry order
    pub fn snapshots(&self) -> Vec<watch::Receiver<EndpointSnapshot>> {
        self.workers.iter().map(|worker| worker.snapshot_rx.clone()).collect()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    /// Tick every endpoint once and wait until all of them are done
    pub async fn run_once(&self) {
        let mut pending = Vec::with_capacity(self.workers.len());

        for worker in &self.workers {
            let (done_tx, done_rx) = oneshot::channel();
            if worker.tick_tx.send(Tick { done: Some(done_tx) }).await.is_err() {
                error!(endpoint = %worker.name, "Endpoint worker is gone");
                continue;
            }
            pending.push(done_rx);
        }

        join_all(pending).await;
    }

    /// Tick all endpoints every period until `shutdown` resolves, then stop the workers
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!(
            endpoints = self.workers.len(),
            period_secs = self.period.as_secs_f64(),
            "Scheduler started"
        );

        let mut timer = interval(self.period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, waiting for in-flight ticks");
                    break;
                }
                _ = timer.tick() => self.dispatch_round(),
            }
        }

        self.shutdown().await;
    }

    /// Queue a tick for every endpoint without waiting on any of them.
    ///
    /// An endpoint that still has a tick queued is skipped for this round.
    fn dispatch_round(&self) {
        for worker in &self.workers {
            match worker.tick_tx.try_send(Tick { done: None }) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(endpoint = %worker.name, "Previous tick still running, skipping");
                    self.events.publish(MonitorEvent::TickSkipped { name: worker.name.clone() });
                }
                Err(TrySendError::Closed(_)) => {
                    error!(endpoint = %worker.name, "Endpoint worker is gone");
                }
            }
        }
    }

    /// Close the tick channels and wait for every worker to finish its current tick
    pub async fn shutdown(self) {
        let mut handles = Vec::with_capacity(self.workers.len());
        for worker in self.workers {
            drop(worker.tick_tx);
            handles.push((worker.name, worker.handle));
        }

        for (name, handle) in handles {
            if let Err(e) = handle.await {
                error!(endpoint = %name, "Endpoint worker panicked: {}", e);
            }
        }
        info!("Scheduler stopped");
    }
}

fn spawn_worker(mut monitor: EndpointMonitor) -> EndpointWorker {
    let name = monitor.endpoint().name.clone();
    let snapshot_rx = monitor.subscribe();
    let (tick_tx, mut tick_rx) = mpsc::channel::<Tick>(1);

    let worker_name = name.clone();
    let handle = tokio::spawn(async move {
        while let Some(tick) = tick_rx.recv().await {
            monitor.tick().await;
            if let Some(done) = tick.done {
                let _ = done.send(());
            }
        }
        debug!(endpoint = %worker_name, "Endpoint worker stopped");
    });

    EndpointWorker { name, tick_tx, snapshot_rx, handle }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryStore;
    use crate::monitoring::clock::MonitorClock;
    use crate::monitoring::prober::Prober;
    use crate::monitoring::testing::ScriptedProber;
    use crate::monitoring::types::{Endpoint, EndpointStatus};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn build(dir: &std::path::Path, prober: Arc<dyn Prober>, events: EventBus) -> Vec<EndpointMonitor> {
        let clock = Arc::new(MonitorClock::start());
        [Endpoint::new("alpha", "10.0.0.1"), Endpoint::new("beta", "10.0.0.2")]
            .iter()
            .map(|endpoint| {
                let store = HistoryStore::open(dir, endpoint).unwrap();
                EndpointMonitor::new(prober.clone(), clock.clone(), store, events.clone())
            })
            .collect()
    }

    #[tokio::test]
    async fn test_run_once_ticks_every_endpoint() {
        let dir = tempdir().unwrap();
        let prober = ScriptedProber::new()
            .with("10.0.0.1", &[true, true, true])
            .with("10.0.0.2", &[false, false, true]);
        let events = EventBus::default();
        let scheduler =
            Scheduler::spawn(Duration::from_secs(60), build(dir.path(), Arc::new(prober), events.clone()), events);

        for _ in 0..3 {
            scheduler.run_once().await;
        }

        let snapshots = scheduler.snapshots();
        let alpha = snapshots[0].borrow().clone();
        let beta = snapshots[1].borrow().clone();

        assert_eq!(alpha.status, EndpointStatus::Reachable);
        assert_eq!(alpha.segments.len(), 2);
        assert!(alpha.segments.iter().all(|s| s.name == "alpha"));

        assert_eq!(beta.status, EndpointStatus::Reachable);
        assert_eq!(beta.segments.len(), 3);
        assert!(beta.segments.iter().all(|s| s.name == "beta"));

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_ticks_on_period() {
        let dir = tempdir().unwrap();
        let prober = ScriptedProber::new()
            .with("10.0.0.1", &[false; 10])
            .with("10.0.0.2", &[true; 10]);
        let events = EventBus::default();
        let scheduler =
            Scheduler::spawn(Duration::from_secs(60), build(dir.path(), Arc::new(prober), events.clone()), events);
        let snapshots = scheduler.snapshots();

        // First tick is immediate, then one per period: ticks at 0, 60 and 120s
        scheduler.run_until(tokio::time::sleep(Duration::from_secs(150))).await;

        let down_lines = std::fs::read_to_string(dir.path().join("alpha-downtimes.txt")).unwrap();
        assert_eq!(down_lines.lines().count(), 3);
        assert_eq!(snapshots[1].borrow().status, EndpointStatus::Reachable);
        assert!(std::fs::read_to_string(dir.path().join("beta-downtimes.txt")).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_endpoint_names_follow_input_order() {
        let dir = tempdir().unwrap();
        let events = EventBus::default();
        let scheduler = Scheduler::spawn(
            Duration::from_secs(1),
            build(dir.path(), Arc::new(ScriptedProber::new()), events.clone()),
            events,
        );

        assert_eq!(scheduler.endpoint_names().collect::<Vec<_>>(), vec!["alpha", "beta"]);
        scheduler.shutdown().await;
    }
}
