//! Store-call bounding: per-call timeout and supersession of in-flight calls
//! that share an identity (e.g. the same funnel being re-queried as the user
//! changes the window).

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;

use crate::config::Config;
use crate::error::QueryError;
use crate::event::EventRow;
use crate::store::{EventQuery, EventStore};

/// Current and previous-period results issued side by side. Each side keeps
/// its own outcome so one failing never hides the other.
#[derive(Debug)]
pub struct Compared<T> {
    pub current: Result<T, QueryError>,
    /// `None` when the window has no previous period (all-time).
    pub previous: Option<Result<T, QueryError>>,
}

#[derive(Debug, Clone)]
pub struct QueryRunner {
    timeout: Duration,
    generations: Arc<Mutex<HashMap<String, watch::Sender<u64>>>>,
}

impl QueryRunner {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            generations: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.query_timeout())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Bound a single store call by the configured timeout.
    pub async fn run<T, F>(&self, operation: &'static str, call: F) -> Result<T, QueryError>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(QueryError::Store),
            Err(_) => {
                tracing::warn!(
                    operation,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "store query timed out"
                );
                Err(QueryError::Timeout(self.timeout))
            }
        }
    }

    /// Fetch a session-ordered event stream, refusing to compute on more
    /// than `max_rows` rows.
    pub async fn fetch_events(
        &self,
        store: &dyn EventStore,
        query: EventQuery,
        max_rows: usize,
    ) -> Result<Vec<EventRow>, QueryError> {
        let started = std::time::Instant::now();
        let query = query.with_limit(max_rows.saturating_add(1));
        let rows = self.run("query_events", store.query_events(&query)).await?;
        if rows.len() > max_rows {
            return Err(QueryError::Store(anyhow::anyhow!(
                "query matched more than {max_rows} events; narrow the window or filters"
            )));
        }
        tracing::debug!(
            website_id = %query.website_id,
            rows = rows.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "event query completed"
        );
        Ok(rows)
    }

    /// Run `work` as the newest call for `identity`. A later call with the
    /// same identity makes this one resolve to [`QueryError::Superseded`]
    /// without waiting for its store round-trip.
    pub async fn run_tracked<T, F>(&self, identity: &str, work: F) -> Result<T, QueryError>
    where
        F: Future<Output = Result<T, QueryError>>,
    {
        let mut ticket = self.register(identity);
        let generation = ticket.generation;
        tokio::select! {
            biased;
            _ = wait_superseded(&mut ticket.rx, generation) => {
                tracing::warn!(identity, generation, "query superseded by a newer request");
                Err(QueryError::Superseded)
            }
            result = work => result,
        }
    }

    /// Number of identities with an in-flight tracked call.
    pub fn in_flight(&self) -> usize {
        self.lock_generations().len()
    }

    fn lock_generations(&self) -> MutexGuard<'_, HashMap<String, watch::Sender<u64>>> {
        self.generations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn register(&self, identity: &str) -> Ticket<'_> {
        let mut generations = self.lock_generations();
        let sender = generations
            .entry(identity.to_string())
            .or_insert_with(|| watch::channel(0).0);
        sender.send_modify(|generation| *generation += 1);
        let generation = *sender.borrow();
        Ticket {
            runner: self,
            identity: identity.to_string(),
            generation,
            rx: sender.subscribe(),
        }
    }
}

async fn wait_superseded(rx: &mut watch::Receiver<u64>, generation: u64) {
    loop {
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
        if *rx.borrow_and_update() != generation {
            return;
        }
    }
}

struct Ticket<'a> {
    runner: &'a QueryRunner,
    identity: String,
    generation: u64,
    rx: watch::Receiver<u64>,
}

impl Drop for Ticket<'_> {
    fn drop(&mut self) {
        let mut generations = self.runner.lock_generations();
        let is_latest = generations
            .get(&self.identity)
            .is_some_and(|sender| *sender.borrow() == self.generation);
        if is_latest {
            generations.remove(&self.identity);
        }
    }
}
