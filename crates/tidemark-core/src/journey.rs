//! Frequency-ranked session paths.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::QueryError;
use crate::event::{EventRow, EventType};
use crate::filter::EventFilter;
use crate::matcher::normalize_path;
use crate::runner::{Compared, QueryRunner};
use crate::store::{EventQuery, EventStore};
use crate::time_range::ResolvedWindow;

pub const MIN_PATH_LENGTH: usize = 2;
pub const MAX_PATH_LENGTH: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Journey {
    pub path: Vec<String>,
    pub count: u64,
    /// Share of all sessions that produced a path of this length.
    pub percentage: f64,
}

fn validate_bounds(path_length: usize, max_results: usize) -> Result<(), QueryError> {
    if !(MIN_PATH_LENGTH..=MAX_PATH_LENGTH).contains(&path_length) {
        return Err(QueryError::validation(
            "path_length",
            format!("path length must be between {MIN_PATH_LENGTH} and {MAX_PATH_LENGTH}"),
        ));
    }
    if max_results == 0 {
        return Err(QueryError::validation(
            "max_results",
            "max results must be at least 1",
        ));
    }
    Ok(())
}

/// Path step for an event: normalized page path or custom event name.
fn step_key(row: &EventRow) -> Option<String> {
    match row.event_type {
        EventType::Pageview => {
            let path = normalize_path(&row.url);
            (!path.is_empty()).then_some(path)
        }
        EventType::Event => row
            .event_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string),
    }
}

/// Group sessions by their first `path_length` steps and rank the paths.
///
/// Sessions are visited by first event time (then session id), which fixes
/// the first-observed order used to break count ties. Percentages are taken
/// over every qualifying session, including paths cut by `max_results`.
pub fn build_journeys(rows: &[EventRow], path_length: usize, max_results: usize) -> Vec<Journey> {
    let mut sessions: HashMap<&str, Vec<&EventRow>> = HashMap::new();
    for row in rows {
        sessions.entry(row.session_id.as_str()).or_default().push(row);
    }

    let mut ordered: Vec<(DateTime<Utc>, &str, Vec<&EventRow>)> = sessions
        .into_iter()
        .filter_map(|(session_id, mut events)| {
            events.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
            let first = events.first()?.created_at;
            Some((first, session_id, events))
        })
        .collect();
    ordered.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));

    let mut slots: HashMap<Vec<String>, usize> = HashMap::new();
    let mut paths: Vec<(Vec<String>, u64)> = Vec::new();
    for (_, _, events) in &ordered {
        let path: Vec<String> = events.iter().filter_map(|row| step_key(row)).take(path_length).collect();
        if path.len() < path_length {
            continue;
        }
        match slots.get(&path) {
            Some(&slot) => paths[slot].1 += 1,
            None => {
                slots.insert(path.clone(), paths.len());
                paths.push((path, 1));
            }
        }
    }

    let total: u64 = paths.iter().map(|(_, count)| count).sum();
    // Stable: equal counts keep first-observed order.
    paths.sort_by(|a, b| b.1.cmp(&a.1));
    paths.truncate(max_results);

    paths
        .into_iter()
        .map(|(path, count)| Journey {
            path,
            count,
            percentage: if total == 0 {
                0.0
            } else {
                count as f64 * 100.0 / total as f64
            },
        })
        .collect()
}

#[derive(Clone)]
pub struct JourneyAggregator {
    events: Arc<dyn EventStore>,
    runner: QueryRunner,
    max_event_rows: usize,
}

impl JourneyAggregator {
    pub fn new(events: Arc<dyn EventStore>, config: &Config) -> Self {
        Self {
            events,
            runner: QueryRunner::from_config(config),
            max_event_rows: config.max_event_rows,
        }
    }

    pub fn with_runner(mut self, runner: QueryRunner) -> Self {
        self.runner = runner;
        self
    }

    pub async fn aggregate(
        &self,
        website_id: &str,
        window: &ResolvedWindow,
        path_length: usize,
        max_results: usize,
        filter: &EventFilter,
    ) -> Result<Vec<Journey>, QueryError> {
        validate_bounds(path_length, max_results)?;

        let query = EventQuery::for_window(website_id, window, filter);
        let rows = self
            .runner
            .fetch_events(self.events.as_ref(), query, self.max_event_rows)
            .await?;
        let journeys =
            tokio::task::spawn_blocking(move || build_journeys(&rows, path_length, max_results))
                .await
                .map_err(|e| QueryError::Store(anyhow::anyhow!("journey computation task failed: {e}")))?;
        tracing::debug!(
            website_id,
            path_length,
            paths = journeys.len(),
            "journeys aggregated"
        );
        Ok(journeys)
    }

    pub async fn aggregate_with_previous(
        &self,
        website_id: &str,
        window: &ResolvedWindow,
        path_length: usize,
        max_results: usize,
        filter: &EventFilter,
    ) -> Compared<Vec<Journey>> {
        let previous_window = window.previous_period();
        let current = self.aggregate(website_id, window, path_length, max_results, filter);
        let previous = async {
            match &previous_window {
                Some(previous) => Some(
                    self.aggregate(website_id, previous, path_length, max_results, filter)
                        .await,
                ),
                None => None,
            }
        };
        let (current, previous) = tokio::join!(current, previous);
        Compared { current, previous }
    }

    pub async fn aggregate_tracked(
        &self,
        identity: &str,
        website_id: &str,
        window: &ResolvedWindow,
        path_length: usize,
        max_results: usize,
        filter: &EventFilter,
    ) -> Result<Vec<Journey>, QueryError> {
        self.runner
            .run_tracked(
                identity,
                self.aggregate(website_id, window, path_length, max_results, filter),
            )
            .await
    }
}
