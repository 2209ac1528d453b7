//! Reconciliation logic for pod restarts.
//!
//! A reconciliation reads the current pod from the reflector cache, feeds
//! every container's restart count to the tracker, and sends an alert for
//! each new restart that gets past the mute gate. A pod missing from the
//! cache has been deleted, and its tracked state is dropped.

use crate::alert;
use crate::error::ControllerError;
use crate::keys::{ContainerKey, PodKey};
use crate::mute::{MuteDecision, MuteStore};
use crate::tracker::{RestartDelta, RestartObservation, RestartTracker, Termination};
use chrono::{DateTime, TimeDelta, Utc};
use k8s_openapi::api::core::v1::{ContainerStatus, Pod};
use kube_runtime::reflector::{ObjectRef, Store};
use std::collections::HashSet;
use std::sync::Arc;
use teams_client::TeamsClientTrait;
use tracing::{debug, error, info, warn};

/// Work queue key for a pod.
pub fn pod_key(pod: &Pod) -> Result<PodKey, ControllerError> {
    let name = pod
        .metadata
        .name
        .as_deref()
        .ok_or_else(|| ControllerError::Reconciliation("Pod missing name".to_string()))?;
    let namespace = pod.metadata.namespace.as_deref().unwrap_or("default");
    Ok(PodKey::new(namespace, name))
}

/// Split a pod snapshot into one observation per container.
///
/// Covers regular and init containers; ephemeral containers never restart.
pub fn observations(pod: &Pod, observed_at: DateTime<Utc>) -> Result<Vec<RestartObservation>, ControllerError> {
    let key = pod_key(pod)?;
    let Some(status) = &pod.status else {
        return Ok(Vec::new());
    };

    let statuses = status
        .init_container_statuses
        .iter()
        .chain(status.container_statuses.iter())
        .flatten();

    Ok(statuses
        .map(|container| observation(&key, container, observed_at))
        .collect())
}

fn observation(pod: &PodKey, container: &ContainerStatus, observed_at: DateTime<Utc>) -> RestartObservation {
    let last_termination = container
        .last_state
        .as_ref()
        .and_then(|state| state.terminated.as_ref())
        .map(|terminated| Termination {
            reason: terminated.reason.clone(),
            exit_code: terminated.exit_code,
        });

    RestartObservation {
        key: pod.container(container.name.clone()),
        // The API server never reports a negative count
        restart_count: u32::try_from(container.restart_count).unwrap_or_default(),
        observed_at,
        last_termination,
    }
}

/// Reconciles pod restart state and sends alerts.
pub struct Reconciler {
    pods: Store<Pod>,
    tracker: RestartTracker,
    mute: MuteStore,
    notifier: Arc<dyn TeamsClientTrait>,
    cluster_name: String,
    mute_window: TimeDelta,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("tracker", &self.tracker)
            .field("mute", &self.mute)
            .field("cluster_name", &self.cluster_name)
            .field("mute_window", &self.mute_window)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(
        pods: Store<Pod>,
        notifier: Arc<dyn TeamsClientTrait>,
        cluster_name: String,
        mute_window: TimeDelta,
    ) -> Self {
        Self {
            pods,
            tracker: RestartTracker::new(),
            mute: MuteStore::new(),
            notifier,
            cluster_name,
            mute_window,
        }
    }

    /// Reconciles one pod.
    ///
    /// This method:
    /// 1. Reads the pod from the cache (deleted if absent)
    /// 2. Observes every container's restart count
    /// 3. Sends an alert for each new, unmuted restart
    ///
    /// Delivery failures are logged, never returned: the mute window is
    /// recorded either way so a broken webhook cannot cause retry storms.
    ///
    /// `clock` is read once for the snapshot and again before every mute
    /// claim, since a delivery with retries can take several seconds.
    pub async fn reconcile_pod<C>(&self, key: &PodKey, clock: C) -> Result<(), ControllerError>
    where
        C: Fn() -> DateTime<Utc> + Send + Sync,
    {
        let object_ref = ObjectRef::<Pod>::new(&key.name).within(&key.namespace);
        let Some(pod) = self.pods.get(&object_ref) else {
            self.forget_pod(key);
            return Ok(());
        };

        let observations = observations(&pod, clock())?;
        self.forget_vanished_containers(key, &observations);

        for observation in &observations {
            let delta = self.tracker.observe(observation);
            if delta.is_new_restart {
                self.handle_restart(observation, delta, clock()).await;
            }
        }

        Ok(())
    }

    async fn handle_restart(&self, observation: &RestartObservation, delta: RestartDelta, now: DateTime<Utc>) {
        let key = &observation.key;
        let decision = self
            .mute
            .claim(key, now, self.mute_window, observation.restart_count);

        if let MuteDecision::Muted { last_notified_at } = decision {
            debug!(
                container = %key,
                restart_count = observation.restart_count,
                delta = delta.delta,
                %last_notified_at,
                "Restart muted"
            );
            return;
        }

        let message = alert::restart_alert(&self.cluster_name, observation, &decision, delta.delta);
        match self.notifier.send_message(&message).await {
            Ok(()) => {
                info!(
                    container = %key,
                    restart_count = observation.restart_count,
                    delta = delta.delta,
                    "Restart alert sent"
                );
            }
            Err(e) if e.is_permanent() => {
                error!(
                    container = %key,
                    error = %e,
                    "Teams rejected restart alert, check MICROSOFT_TEAMS_WEBHOOK_URL"
                );
            }
            Err(e) => {
                error!(container = %key, error = %e, "Failed to deliver restart alert");
            }
        }
    }

    /// Drop tracked and mute state for every container of a deleted pod.
    fn forget_pod(&self, key: &PodKey) {
        let forgotten = self.tracker.forget_pod(key);
        for container in &forgotten {
            self.mute.forget(container);
        }
        if !forgotten.is_empty() {
            debug!(pod = %key, containers = forgotten.len(), "Pod deleted, forgot restart state");
        }
    }

    /// A pod reporting a full set of container statuses that no longer
    /// includes a tracked container was replaced under the same name.
    fn forget_vanished_containers(&self, key: &PodKey, observations: &[RestartObservation]) {
        if observations.is_empty() {
            return;
        }
        let current: HashSet<&ContainerKey> = observations.iter().map(|o| &o.key).collect();
        for container in self.tracker.containers_of(key) {
            if !current.contains(&container) {
                warn!(container = %container, "Container no longer reported by pod, forgetting it");
                self.tracker.forget(&container);
                self.mute.forget(&container);
            }
        }
    }
}
