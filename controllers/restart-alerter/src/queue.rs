//! Deduplicating, rate-limited work queue.
//!
//! Producers (the watcher) add keys; workers take them, process them and
//! mark them done. A key that is already waiting is not queued twice, and a
//! key that is being processed is never handed to a second worker: if it is
//! added again meanwhile, it goes back on the queue once `done` is called.
//!
//! Workers are paced by a token bucket so a relist of thousands of pods does
//! not turn into a burst of thousands of reconciliations.

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Token bucket settings for the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitConfig {
    /// Sustained items handed out per second
    pub per_second: f64,
    /// Items that may be handed out back to back after an idle period
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_second: 10.0,
            burst: 100,
        }
    }
}

#[derive(Debug)]
struct TokenBucket {
    config: RateLimitConfig,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(config: RateLimitConfig) -> Self {
        Self {
            tokens: f64::from(config.burst),
            config,
            last_refill: Instant::now(),
        }
    }

    /// Take a token, or return how long until one is available.
    fn try_take(&mut self, now: Instant) -> Result<(), Duration> {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;
        self.tokens = (self.tokens + elapsed * self.config.per_second).min(f64::from(self.config.burst));

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            return Ok(());
        }
        if self.config.per_second <= 0.0 {
            return Err(Duration::from_secs(1));
        }
        Err(Duration::from_secs_f64((1.0 - self.tokens) / self.config.per_second))
    }
}

#[derive(Debug)]
struct State<T> {
    queue: VecDeque<T>,
    /// Keys waiting to be processed (queued, or re-added while processing)
    dirty: HashSet<T>,
    /// Keys currently held by a worker
    processing: HashSet<T>,
    shutting_down: bool,
}

/// Work queue shared by the watcher and the worker pool.
#[derive(Debug)]
pub struct WorkQueue<T> {
    state: Mutex<State<T>>,
    limiter: tokio::sync::Mutex<TokenBucket>,
    notify: Notify,
}

impl<T> WorkQueue<T>
where
    T: Clone + Eq + Hash,
{
    pub fn new(rate_limit: RateLimitConfig) -> Self {
        Self {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                dirty: HashSet::new(),
                processing: HashSet::new(),
                shutting_down: false,
            }),
            limiter: tokio::sync::Mutex::new(TokenBucket::new(rate_limit)),
            notify: Notify::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a key. Never blocks.
    pub fn add(&self, item: T) {
        let mut state = self.state();
        if state.shutting_down || state.dirty.contains(&item) {
            return;
        }
        state.dirty.insert(item.clone());
        if state.processing.contains(&item) {
            // Re-queued by `done`
            return;
        }
        state.queue.push_back(item);
        drop(state);
        self.notify.notify_one();
    }

    /// Wait for the next key. Returns `None` once the queue is shut down.
    ///
    /// The caller must pass the key to [`WorkQueue::done`] when finished.
    pub async fn get(&self) -> Option<T> {
        self.wait_for_token().await;

        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state();
                if state.shutting_down {
                    return None;
                }
                if let Some(item) = state.queue.pop_front() {
                    state.dirty.remove(&item);
                    state.processing.insert(item.clone());
                    let more = !state.queue.is_empty();
                    drop(state);
                    if more {
                        // Pass the wakeup on in case another worker is idle
                        self.notify.notify_one();
                    }
                    return Some(item);
                }
            }

            notified.await;
        }
    }

    async fn wait_for_token(&self) {
        let mut bucket = self.limiter.lock().await;
        while let Err(wait) = bucket.try_take(Instant::now()) {
            tokio::time::sleep(wait).await;
        }
    }

    /// Release a key taken with `get`, re-queuing it if it was added meanwhile.
    pub fn done(&self, item: &T) {
        let mut state = self.state();
        state.processing.remove(item);
        if state.dirty.contains(item) && !state.shutting_down {
            state.queue.push_back(item.clone());
            drop(state);
            self.notify.notify_one();
        }
    }

    /// Stop handing out keys and wake every waiting worker.
    pub fn shut_down(&self) {
        self.state().shutting_down = true;
        self.notify.notify_waiters();
    }

    /// Keys waiting to be handed out.
    pub fn pending(&self) -> usize {
        self.state().queue.len()
    }

    /// Nothing queued and nothing held by a worker.
    #[cfg(test)]
    pub fn is_idle(&self) -> bool {
        let state = self.state();
        state.queue.is_empty() && state.processing.is_empty()
    }
}
