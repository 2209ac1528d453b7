//! Restart tracking.
//!
//! Remembers the last restart count seen for every container and turns each
//! new observation into a delta. The first sighting of a container only sets
//! a baseline, so a controller restart never replays old restarts as alerts.

use crate::keys::{ContainerKey, PodKey};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// How a container last terminated, as reported in `lastState.terminated`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Termination {
    pub reason: Option<String>,
    pub exit_code: i32,
}

/// One container's restart count as seen in a single pod snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartObservation {
    pub key: ContainerKey,
    pub restart_count: u32,
    pub observed_at: DateTime<Utc>,
    pub last_termination: Option<Termination>,
}

/// Result of feeding an observation to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RestartDelta {
    /// The count went up since the previous observation
    pub is_new_restart: bool,
    /// Restarts since the previous observation (0 unless `is_new_restart`)
    pub delta: u32,
}

/// Last-seen restart count per container.
#[derive(Debug, Default)]
pub struct RestartTracker {
    containers: Mutex<HashMap<ContainerKey, u32>>,
}

impl RestartTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<ContainerKey, u32>> {
        self.containers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record an observation and report whether it is a new restart.
    ///
    /// - unseen key: baseline, not a restart
    /// - higher count: restart, delta is the difference
    /// - equal count: no-op
    /// - lower count: counter reset (container recreated), new baseline
    pub fn observe(&self, observation: &RestartObservation) -> RestartDelta {
        let mut table = self.table();
        let observed = observation.restart_count;

        let Some(last_seen) = table.get_mut(&observation.key) else {
            table.insert(observation.key.clone(), observed);
            return RestartDelta::default();
        };

        if observed > *last_seen {
            let delta = observed - *last_seen;
            *last_seen = observed;
            RestartDelta {
                is_new_restart: true,
                delta,
            }
        } else {
            // Equal is a replay; lower means the counter started over.
            *last_seen = observed;
            RestartDelta::default()
        }
    }

    /// Last restart count seen for a container.
    #[cfg(test)]
    pub fn last_seen(&self, key: &ContainerKey) -> Option<u32> {
        self.table().get(key).copied()
    }

    /// Drop a single container's baseline. Returns whether it was tracked.
    pub fn forget(&self, key: &ContainerKey) -> bool {
        self.table().remove(key).is_some()
    }

    /// Drop every container of a pod and return the removed keys.
    pub fn forget_pod(&self, pod: &PodKey) -> Vec<ContainerKey> {
        let mut table = self.table();
        let keys: Vec<ContainerKey> = table.keys().filter(|key| &key.pod == pod).cloned().collect();
        for key in &keys {
            table.remove(key);
        }
        keys
    }

    /// Container keys currently tracked for a pod.
    pub fn containers_of(&self, pod: &PodKey) -> Vec<ContainerKey> {
        self.table().keys().filter(|key| &key.pod == pod).cloned().collect()
    }

    /// Every pod with at least one tracked container.
    #[cfg(test)]
    pub fn tracked_pods(&self) -> std::collections::BTreeSet<PodKey> {
        self.table().keys().map(|key| key.pod.clone()).collect()
    }
}
