//! Kubernetes pod watcher.
//!
//! Feeds pod events into the reflector cache and enqueues the affected pod
//! keys. Nothing here talks to Teams or touches restart state; workers do
//! that from the queue.

use crate::error::ControllerError;
use crate::keys::PodKey;
use crate::queue::WorkQueue;
use crate::reconciler::pod_key;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::Api;
use kube_runtime::reflector::{self, store::Writer};
use kube_runtime::{WatchStreamExt, watcher};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What happened to a pod, from the controller's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodEventKind {
    Added,
    Modified,
    Deleted,
}

/// A normalised pod event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodEvent {
    pub kind: PodEventKind,
    pub pod: PodKey,
}

/// Turns raw watcher events into [`PodEvent`]s.
///
/// Tracks which pods have been seen so applies can be told apart as adds or
/// updates. Objects of a (re)list only reach the reflector store on
/// `InitDone`, so list entries are held back and released together at that
/// point, along with deletes for pods that vanished while the watch was down
/// (the API server sends no delete event for those).
#[derive(Debug, Default)]
pub struct PodEventNormalizer {
    known: HashSet<PodKey>,
    relist: Option<HashSet<PodKey>>,
}

impl PodEventNormalizer {
    pub fn normalize(&mut self, event: &watcher::Event<Pod>) -> Vec<PodEvent> {
        match event {
            watcher::Event::Init => {
                self.relist = Some(HashSet::new());
                Vec::new()
            }
            watcher::Event::InitApply(pod) => {
                let Some(key) = key_or_warn(pod) else {
                    return Vec::new();
                };
                match self.relist.as_mut() {
                    Some(relist) => {
                        relist.insert(key);
                        Vec::new()
                    }
                    None => vec![self.applied(key)],
                }
            }
            watcher::Event::InitDone => {
                let Some(relist) = self.relist.take() else {
                    return Vec::new();
                };

                let mut listed: Vec<PodKey> = relist.iter().cloned().collect();
                listed.sort();
                let mut gone: Vec<PodKey> = self.known.difference(&relist).cloned().collect();
                gone.sort();

                let mut events: Vec<PodEvent> = listed.into_iter().map(|key| self.applied(key)).collect();
                for pod in gone {
                    self.known.remove(&pod);
                    events.push(PodEvent {
                        kind: PodEventKind::Deleted,
                        pod,
                    });
                }
                events
            }
            watcher::Event::Apply(pod) => key_or_warn(pod).map(|key| self.applied(key)).into_iter().collect(),
            watcher::Event::Delete(pod) => key_or_warn(pod)
                .map(|key| {
                    self.known.remove(&key);
                    PodEvent {
                        kind: PodEventKind::Deleted,
                        pod: key,
                    }
                })
                .into_iter()
                .collect(),
        }
    }

    fn applied(&mut self, key: PodKey) -> PodEvent {
        let kind = if self.known.insert(key.clone()) {
            PodEventKind::Added
        } else {
            PodEventKind::Modified
        };
        PodEvent { kind, pod: key }
    }
}

fn key_or_warn(pod: &Pod) -> Option<PodKey> {
    match pod_key(pod) {
        Ok(key) => Some(key),
        Err(e) => {
            warn!("Ignoring pod event: {}", e);
            None
        }
    }
}

/// Normalise one watcher event and queue every pod it touches.
///
/// The event must already have been applied to the reflector store.
pub fn enqueue_event(queue: &WorkQueue<PodKey>, normalizer: &mut PodEventNormalizer, event: &watcher::Event<Pod>) {
    for pod_event in normalizer.normalize(event) {
        debug!(pod = %pod_event.pod, kind = ?pod_event.kind, "Pod event");
        queue.add(pod_event.pod);
    }
}

/// Watches pods and enqueues them for reconciliation.
#[derive(Debug)]
pub struct Watcher {
    queue: Arc<WorkQueue<PodKey>>,
    pod_api: Api<Pod>,
}

impl Watcher {
    /// Creates a new watcher instance.
    pub fn new(queue: Arc<WorkQueue<PodKey>>, pod_api: Api<Pod>) -> Self {
        Self { queue, pod_api }
    }

    /// Starts watching Pod resources.
    ///
    /// Runs until the watch stream ends, which only happens if the client is
    /// torn down; transient API errors are retried with backoff.
    pub async fn watch_pods(&self, writer: Writer<Pod>) -> Result<(), ControllerError> {
        info!("Starting Pod watcher");

        // The reflector applies each event to the store before yielding it
        let stream = reflector::reflector(
            writer,
            watcher(self.pod_api.clone(), watcher::Config::default()).default_backoff(),
        );
        let mut stream = std::pin::pin!(stream);
        let mut normalizer = PodEventNormalizer::default();

        while let Some(result) = stream.next().await {
            match result {
                Ok(event) => {
                    match &event {
                        watcher::Event::Init => debug!("Pod watcher (re)listing"),
                        watcher::Event::InitDone => info!("Pod watcher initialization complete"),
                        _ => {}
                    }
                    enqueue_event(&self.queue, &mut normalizer, &event);
                }
                Err(e) => {
                    warn!("Pod watcher error, retrying: {}", e);
                }
            }
        }

        Err(ControllerError::Watch("Pod watch stream ended".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::RateLimitConfig;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn pod(name: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn key(name: &str) -> PodKey {
        PodKey::new("default", name)
    }

    fn event(kind: PodEventKind, name: &str) -> PodEvent {
        PodEvent { kind, pod: key(name) }
    }

    #[test]
    fn test_apply_then_update_then_delete() {
        let mut n = PodEventNormalizer::default();

        assert_eq!(
            n.normalize(&watcher::Event::Apply(pod("web-0"))),
            vec![event(PodEventKind::Added, "web-0")]
        );
        assert_eq!(
            n.normalize(&watcher::Event::Apply(pod("web-0"))),
            vec![event(PodEventKind::Modified, "web-0")]
        );
        assert_eq!(
            n.normalize(&watcher::Event::Delete(pod("web-0"))),
            vec![event(PodEventKind::Deleted, "web-0")]
        );
        // Same name again after deletion is a new pod
        assert_eq!(
            n.normalize(&watcher::Event::Apply(pod("web-0"))),
            vec![event(PodEventKind::Added, "web-0")]
        );
    }

    #[test]
    fn test_relist_reports_pods_deleted_during_gap() {
        let mut n = PodEventNormalizer::default();
        n.normalize(&watcher::Event::Apply(pod("a")));
        n.normalize(&watcher::Event::Apply(pod("b")));
        n.normalize(&watcher::Event::Apply(pod("c")));

        // Watch reconnects; only "b" still exists
        assert!(n.normalize(&watcher::Event::Init).is_empty());
        assert!(
            n.normalize(&watcher::Event::InitApply(pod("b"))).is_empty(),
            "List entries wait for InitDone"
        );
        assert_eq!(
            n.normalize(&watcher::Event::InitDone),
            vec![
                event(PodEventKind::Modified, "b"),
                event(PodEventKind::Deleted, "a"),
                event(PodEventKind::Deleted, "c"),
            ]
        );

        assert_eq!(
            n.normalize(&watcher::Event::Apply(pod("a"))),
            vec![event(PodEventKind::Added, "a")]
        );
    }

    #[test]
    fn test_initial_list_adds_everything_on_init_done() {
        let mut n = PodEventNormalizer::default();
        n.normalize(&watcher::Event::Init);
        assert!(n.normalize(&watcher::Event::InitApply(pod("y"))).is_empty());
        assert!(n.normalize(&watcher::Event::InitApply(pod("x"))).is_empty());
        assert_eq!(
            n.normalize(&watcher::Event::InitDone),
            vec![event(PodEventKind::Added, "x"), event(PodEventKind::Added, "y")]
        );
        assert!(n.normalize(&watcher::Event::InitDone).is_empty());
    }

    #[test]
    fn test_enqueue_event_queues_touched_pods() {
        let queue = WorkQueue::new(RateLimitConfig::default());
        let mut n = PodEventNormalizer::default();

        enqueue_event(&queue, &mut n, &watcher::Event::Init);
        enqueue_event(&queue, &mut n, &watcher::Event::InitApply(pod("a")));
        assert_eq!(queue.pending(), 0);

        enqueue_event(&queue, &mut n, &watcher::Event::InitDone);
        enqueue_event(&queue, &mut n, &watcher::Event::Apply(pod("a")));
        assert_eq!(queue.pending(), 1, "Duplicate events coalesce");
    }

    #[test]
    fn test_unnamed_pod_is_ignored() {
        let mut n = PodEventNormalizer::default();
        let mut unnamed = pod("x");
        unnamed.metadata.name = None;
        assert!(n.normalize(&watcher::Event::Apply(unnamed)).is_empty());
    }
}
