use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// Receives worker liveness signals after a request is authenticated.
pub trait ActivitySink: Send + Sync {
    fn mark_active(&self, worker_id: &str, at: DateTime<Utc>);
}

/// In-memory last-seen map, one mutex guarding the whole map.
#[derive(Debug, Default)]
pub struct WorkerActivity {
    last_seen: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl WorkerActivity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_seen(&self, worker_id: &str) -> Option<DateTime<Utc>> {
        self.last_seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(worker_id)
            .copied()
    }

    /// All known workers, most recently seen first.
    pub fn snapshot(&self) -> Vec<(String, DateTime<Utc>)> {
        let guard = self
            .last_seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut all: Vec<_> = guard.iter().map(|(k, v)| (k.clone(), *v)).collect();
        all.sort_by(|a, b| b.1.cmp(&a.1));
        all
    }
}

impl ActivitySink for WorkerActivity {
    fn mark_active(&self, worker_id: &str, at: DateTime<Utc>) {
        let mut guard = self
            .last_seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let entry = guard.entry(worker_id.to_string()).or_insert(at);
        if at > *entry {
            *entry = at;
        }
    }
}
