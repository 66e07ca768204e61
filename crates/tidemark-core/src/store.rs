use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::{EventRow, EventType};
use crate::filter::EventFilter;
use crate::funnel::{FunnelStep, SavedFunnel};
use crate::time_range::ResolvedWindow;

/// Coarse prefilter a store may push down. A query passes rows matching any
/// criterion; the engines re-check exact step semantics themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchCriteria {
    /// Any pageview; path patterns are evaluated by the engine.
    Page,
    Event { name: String },
}

impl MatchCriteria {
    pub fn admits(&self, row: &EventRow) -> bool {
        match self {
            MatchCriteria::Page => row.event_type == EventType::Pageview,
            MatchCriteria::Event { name } => {
                row.event_type == EventType::Event && row.event_name.as_deref() == Some(name.as_str())
            }
        }
    }
}

/// A session-ordered event fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventQuery {
    pub website_id: String,
    /// Inclusive; `None` means no lower bound.
    pub start: Option<DateTime<Utc>>,
    /// Exclusive.
    pub end: DateTime<Utc>,
    /// Empty means every event in the window.
    pub criteria: Vec<MatchCriteria>,
    pub filter: EventFilter,
    pub limit: Option<usize>,
}

impl EventQuery {
    pub fn for_window(website_id: &str, window: &ResolvedWindow, filter: &EventFilter) -> Self {
        Self {
            website_id: website_id.to_string(),
            start: window.start(),
            end: window.end(),
            criteria: Vec::new(),
            filter: filter.clone(),
            limit: None,
        }
    }

    pub fn with_criteria(mut self, criteria: Vec<MatchCriteria>) -> Self {
        self.criteria = criteria;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Window and criteria check shared by in-process stores.
    pub fn admits(&self, row: &EventRow) -> bool {
        if self.start.is_some_and(|start| row.created_at < start) || row.created_at >= self.end {
            return false;
        }
        self.criteria.is_empty() || self.criteria.iter().any(|c| c.admits(row))
    }
}

/// Name and steps of a funnel being created or replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelDraft {
    pub name: String,
    pub steps: Vec<FunnelStep>,
}

/// `fun_` followed by 21 random base-36 characters.
pub fn generate_funnel_id() -> String {
    let mut rng = rand::thread_rng();
    let chars: String = (0..21)
        .map(|_| {
            let idx = rng.gen_range(0..36u8);
            if idx < 10 {
                (b'0' + idx) as char
            } else {
                (b'a' + idx - 10) as char
            }
        })
        .collect();
    format!("fun_{chars}")
}

/// Persistence conflicts a [`FunnelStore`] reports through `anyhow`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FunnelConflict {
    #[error("a funnel with this name already exists")]
    DuplicateName,
    #[error("funnel limit reached ({limit} per website)")]
    LimitExceeded { limit: usize },
}

/// Query executor consumed by the funnel and journey engines.
#[async_trait]
pub trait EventStore: Send + Sync + 'static {
    /// Rows in the window ordered by `(session_id, created_at, id)`.
    async fn query_events(&self, query: &EventQuery) -> anyhow::Result<Vec<EventRow>>;
}

/// Saved funnel persistence, scoped by website.
#[async_trait]
pub trait FunnelStore: Send + Sync + 'static {
    async fn list_funnels(&self, website_id: &str) -> anyhow::Result<Vec<SavedFunnel>>;

    async fn get_funnel(
        &self,
        website_id: &str,
        funnel_id: &str,
    ) -> anyhow::Result<Option<SavedFunnel>>;

    /// Fails with [`FunnelConflict`] on a duplicate name or when the website
    /// already holds `limit` funnels.
    async fn create_funnel(
        &self,
        website_id: &str,
        draft: &FunnelDraft,
        limit: usize,
    ) -> anyhow::Result<SavedFunnel>;

    /// `Ok(None)` when the funnel does not exist.
    async fn update_funnel(
        &self,
        website_id: &str,
        funnel_id: &str,
        draft: &FunnelDraft,
    ) -> anyhow::Result<Option<SavedFunnel>>;

    /// `Ok(false)` when nothing was deleted.
    async fn delete_funnel(&self, website_id: &str, funnel_id: &str) -> anyhow::Result<bool>;
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::event::Event;

    #[test]
    fn funnel_ids_are_prefixed_base36() {
        let id = generate_funnel_id();
        assert_eq!(id.len(), 25);
        let suffix = id.strip_prefix("fun_").expect("prefix");
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        assert_ne!(id, generate_funnel_id());
    }

    #[test]
    fn query_admits_rows_inside_the_half_open_window() {
        let start = Utc
            .with_ymd_and_hms(2024, 6, 1, 0, 0, 0)
            .single()
            .expect("valid instant");
        let query = EventQuery {
            website_id: "site_1".to_string(),
            start: Some(start),
            end: start + Duration::days(1),
            criteria: vec![MatchCriteria::Event {
                name: "signup".to_string(),
            }],
            filter: EventFilter::default(),
            limit: None,
        };
        let row = |event: Event| EventRow::from(&event);

        assert!(query.admits(&row(Event::custom("site_1", "s1", "v1", "signup", start))));
        assert!(!query.admits(&row(Event::custom(
            "site_1",
            "s1",
            "v1",
            "signup",
            start + Duration::days(1)
        ))));
        assert!(!query.admits(&row(Event::pageview("site_1", "s1", "v1", "/", start))));
        assert!(!query.admits(&row(Event::custom("site_1", "s1", "v1", "login", start))));
    }
}
