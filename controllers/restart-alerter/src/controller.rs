//! Main controller implementation.
//!
//! This module contains the `Controller` struct that wires the pod watcher,
//! the work queue and the worker pool together, and runs them until the
//! stop signal fires.

use crate::alert;
use crate::config::Config;
use crate::error::ControllerError;
use crate::keys::PodKey;
use crate::queue::{RateLimitConfig, WorkQueue};
use crate::reconciler::Reconciler;
use crate::watcher::Watcher;
use chrono::Utc;
use k8s_openapi::api::core::v1::Pod;
use kube::{Api, Client};
use kube_runtime::reflector::{self, Store, store::Writer};
use std::future::Future;
use std::sync::Arc;
use teams_client::{TeamsClient, TeamsClientTrait, TeamsMessage};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Main controller for pod restart alerting.
pub struct Controller {
    watcher: Watcher,
    writer: Writer<Pod>,
    pool: WorkerPool,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("watcher", &self.watcher)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl Controller {
    /// Creates a new controller instance.
    pub async fn new(config: &Config) -> Result<Self, ControllerError> {
        info!("Initializing Pod Restart Alerter");

        // Create Kubernetes client
        let kube_client = Client::try_default().await?;

        // Create Teams client
        let teams_client = TeamsClient::new(&config.webhook_url, config.webhook_timeout)?;
        info!("Alerts will be posted to Teams webhook at {}", teams_client.webhook_host());

        let pod_api: Api<Pod> = match config.namespace.as_deref() {
            Some(ns) => Api::namespaced(kube_client, ns),
            None => Api::all(kube_client),
        };

        let (pods, writer) = reflector::store::<Pod>();
        let queue = Arc::new(WorkQueue::new(RateLimitConfig::default()));
        let watcher = Watcher::new(Arc::clone(&queue), pod_api);
        let pool = WorkerPool::new(pods, queue, Arc::new(teams_client), config);

        Ok(Self { watcher, writer, pool })
    }

    /// Runs the controller until `stop` fires.
    pub async fn run(self, stop: CancellationToken) -> Result<(), ControllerError> {
        let Self { watcher, writer, pool } = self;
        pool.run(async move { watcher.watch_pods(writer).await }, stop)
            .await
    }
}

/// Reconcile workers and everything they share.
pub struct WorkerPool {
    pods: Store<Pod>,
    queue: Arc<WorkQueue<PodKey>>,
    reconciler: Arc<Reconciler>,
    notifier: Arc<dyn TeamsClientTrait>,
    startup_notice: Option<TeamsMessage>,
    workers: usize,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("reconciler", &self.reconciler)
            .field("workers", &self.workers)
            .finish_non_exhaustive()
    }
}

impl WorkerPool {
    /// Build a pool reading `pods` and taking keys from `queue`.
    pub fn new(
        pods: Store<Pod>,
        queue: Arc<WorkQueue<PodKey>>,
        notifier: Arc<dyn TeamsClientTrait>,
        config: &Config,
    ) -> Self {
        let reconciler = Arc::new(Reconciler::new(
            pods.clone(),
            Arc::clone(&notifier),
            config.cluster_name.clone(),
            config.mute_window(),
        ));
        let startup_notice = config
            .send_startup_message
            .then(|| alert::startup_notice(&config.cluster_name, config.mute_seconds));

        Self {
            pods,
            queue,
            reconciler,
            notifier,
            startup_notice,
            workers: config.workers,
        }
    }

    /// Drive `watch` and the workers until `stop` fires or `watch` exits.
    ///
    /// `watch` must fill the pod store and the queue. Workers start once the
    /// store holds a full list, so the first sighting of every existing
    /// container becomes a baseline rather than an alert. On stop the queue
    /// is closed and workers finish the pod they are holding, including any
    /// delivery in flight.
    pub async fn run<W>(self, watch: W, stop: CancellationToken) -> Result<(), ControllerError>
    where
        W: Future<Output = Result<(), ControllerError>> + Send + 'static,
    {
        let Self {
            pods,
            queue,
            reconciler,
            notifier,
            startup_notice,
            workers,
        } = self;

        if let Some(notice) = startup_notice {
            if let Err(e) = notifier.send_message(&notice).await {
                warn!("Failed to send startup notice: {}", e);
            }
        }

        let mut watcher_task = tokio::spawn(watch);

        info!("Waiting for pod cache to sync");
        tokio::select! {
            ready = pods.wait_until_ready() => {
                ready.map_err(|e| ControllerError::Watch(format!("Pod cache never synced: {}", e)))?;
            }
            () = stop.cancelled() => {
                info!("Stopped before pod cache synced");
                watcher_task.abort();
                return Ok(());
            }
        }

        info!("Pod Restart Alerter running with {} worker(s)", workers);
        let mut pool = JoinSet::new();
        for id in 0..workers {
            pool.spawn(run_worker(
                id,
                Arc::clone(&queue),
                Arc::clone(&reconciler),
                stop.clone(),
            ));
        }

        let result = tokio::select! {
            () = stop.cancelled() => {
                info!("Stop signal received, draining workers");
                Ok(())
            }
            joined = &mut watcher_task => {
                let result = joined
                    .map_err(|e| ControllerError::Watch(format!("Pod watcher panicked: {}", e)))
                    .and_then(|r| r);
                error!("Pod watcher exited unexpectedly");
                stop.cancel();
                result
            }
        };

        queue.shut_down();
        watcher_task.abort();
        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                error!("Worker panicked: {}", e);
            }
        }

        info!("Pod Restart Alerter stopped");
        result
    }
}

/// Takes pods off the queue and reconciles them one at a time.
async fn run_worker(
    id: usize,
    queue: Arc<WorkQueue<PodKey>>,
    reconciler: Arc<Reconciler>,
    stop: CancellationToken,
) {
    debug!(worker = id, "Worker started");

    loop {
        let key = tokio::select! {
            biased;
            () = stop.cancelled() => break,
            key = queue.get() => match key {
                Some(key) => key,
                None => break,
            },
        };

        if stop.is_cancelled() {
            queue.done(&key);
            break;
        }

        debug!(worker = id, pod = %key, pending = queue.pending(), "Reconciling pod");
        if let Err(e) = reconciler.reconcile_pod(&key, Utc::now).await {
            error!(worker = id, pod = %key, error = %e, "Failed to reconcile pod");
        }
        queue.done(&key);
    }

    debug!(worker = id, "Worker stopped");
}
