use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};

use statewatch::{Endpoint, EndpointMonitor, EventBus, HistoryStore, MonitorClock, Prober};

/// Replays fixed outcomes per address; unreachable once a script runs out
#[derive(Default)]
pub struct ScriptedProber {
    outcomes: Mutex<HashMap<String, VecDeque<bool>>>,
}

impl ScriptedProber {
    pub fn new(scripts: &[(&str, Vec<bool>)]) -> Arc<Self> {
        let outcomes = scripts
            .iter()
            .map(|(address, outcomes)| (address.to_string(), outcomes.iter().copied().collect()))
            .collect();
        Arc::new(Self { outcomes: Mutex::new(outcomes) })
    }
}

#[async_trait::async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, address: &str) -> bool {
        self.outcomes
            .lock()
            .unwrap()
            .get_mut(address)
            .and_then(VecDeque::pop_front)
            .unwrap_or(false)
    }
}

pub fn monitor(
    dir: &Path,
    endpoint: &Endpoint,
    prober: Arc<dyn Prober>,
    clock: Arc<MonitorClock>,
) -> EndpointMonitor {
    let store = HistoryStore::open(dir, endpoint).unwrap();
    EndpointMonitor::new(prober, clock, store, EventBus::default())
}

/// Status of every stored segment, oldest first
pub fn statuses(monitor: &EndpointMonitor) -> Vec<bool> {
    monitor.history().iter().map(|segment| segment.reachable).collect()
}

/// No three consecutive segments share a status and elapsed time never goes back
pub fn assert_compacted(monitor: &EndpointMonitor) {
    let segments = monitor.history().as_slice();
    for window in segments.windows(3) {
        assert!(
            !(window[0].reachable == window[1].reachable && window[1].reachable == window[2].reachable),
            "uncompacted run in {:?}",
            statuses(monitor)
        );
    }
    for pair in segments.windows(2) {
        assert!(pair[0].elapsed_ms <= pair[1].elapsed_ms);
    }
}
