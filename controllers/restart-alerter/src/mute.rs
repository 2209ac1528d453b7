//! Per-container alert muting.
//!
//! A container that has been alerted on stays muted for the mute window.
//! Restarts inside the window are still tracked, just not announced.

use crate::keys::ContainerKey;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// When a container was last alerted on, and at which restart count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MuteEntry {
    pub last_notified_at: DateTime<Utc>,
    pub last_notified_restart_count: u32,
}

/// Outcome of [`MuteStore::claim`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuteDecision {
    /// Alerted too recently; nothing recorded.
    Muted { last_notified_at: DateTime<Utc> },
    /// Never alerted before; the attempt has been recorded.
    First,
    /// Alerted before, outside the window; the attempt has been recorded.
    Repeat { previous: MuteEntry },
}

impl MuteDecision {
    pub fn should_notify(&self) -> bool {
        !matches!(self, Self::Muted { .. })
    }
}

/// Last notification time per container.
#[derive(Debug, Default)]
pub struct MuteStore {
    entries: Mutex<HashMap<ContainerKey, MuteEntry>>,
}

fn window_elapsed(entry: &MuteEntry, now: DateTime<Utc>, mute_window: TimeDelta) -> bool {
    now - entry.last_notified_at >= mute_window
}

impl MuteStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<ContainerKey, MuteEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check the gate and, if open, record the attempt, under one lock.
    ///
    /// The gate is open when the container has never been alerted on, or the
    /// last attempt is at least `mute_window` old. Two workers racing on the
    /// same key can never both pass.
    pub fn claim(
        &self,
        key: &ContainerKey,
        now: DateTime<Utc>,
        mute_window: TimeDelta,
        restart_count: u32,
    ) -> MuteDecision {
        let mut table = self.table();
        let entry = MuteEntry {
            last_notified_at: now,
            last_notified_restart_count: restart_count,
        };

        match table.get(key).copied() {
            Some(previous) if !window_elapsed(&previous, now, mute_window) => MuteDecision::Muted {
                last_notified_at: previous.last_notified_at,
            },
            Some(previous) => {
                table.insert(key.clone(), entry);
                MuteDecision::Repeat { previous }
            }
            None => {
                table.insert(key.clone(), entry);
                MuteDecision::First
            }
        }
    }

    #[cfg(test)]
    pub fn get(&self, key: &ContainerKey) -> Option<MuteEntry> {
        self.table().get(key).copied()
    }

    /// Drop a container's entry. Returns whether it existed.
    pub fn forget(&self, key: &ContainerKey) -> bool {
        self.table().remove(key).is_some()
    }
}
