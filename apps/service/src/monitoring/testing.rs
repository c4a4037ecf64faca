use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use super::prober::Prober;

/// Prober replaying scripted outcomes per address, unreachable once exhausted
#[derive(Debug, Default)]
pub struct ScriptedProber {
    outcomes: Mutex<HashMap<String, VecDeque<bool>>>,
}

impl ScriptedProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, address: &str, outcomes: &[bool]) -> Self {
        self.outcomes
            .lock()
            .unwrap()
            .insert(address.to_string(), outcomes.iter().copied().collect());
        self
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
