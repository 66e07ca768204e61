use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::event::{Event, EventRow};
use crate::funnel::SavedFunnel;
use crate::store::{
    generate_funnel_id, EventQuery, EventStore, FunnelConflict, FunnelDraft, FunnelStore,
};

fn now_string() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// In-process store for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    events: RwLock<Vec<Event>>,
    funnels: RwLock<Vec<SavedFunnel>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_events(&self, events: &[Event]) {
        self.events.write().await.extend_from_slice(events);
    }

    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn query_events(&self, query: &EventQuery) -> anyhow::Result<Vec<EventRow>> {
        let events = self.events.read().await;
        let mut rows: Vec<EventRow> = events
            .iter()
            .filter(|event| event.website_id == query.website_id && query.filter.matches(event))
            .map(EventRow::from)
            .filter(|row| query.admits(row))
            .collect();
        rows.sort_by(|a, b| {
            a.session_id
                .cmp(&b.session_id)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }
}

#[async_trait]
impl FunnelStore for MemoryStore {
    async fn list_funnels(&self, website_id: &str) -> anyhow::Result<Vec<SavedFunnel>> {
        let funnels = self.funnels.read().await;
        Ok(funnels
            .iter()
            .rev()
            .filter(|f| f.website_id == website_id)
            .cloned()
            .collect())
    }

    async fn get_funnel(
        &self,
        website_id: &str,
        funnel_id: &str,
    ) -> anyhow::Result<Option<SavedFunnel>> {
        let funnels = self.funnels.read().await;
        Ok(funnels
            .iter()
            .find(|f| f.website_id == website_id && f.id == funnel_id)
            .cloned())
    }

    async fn create_funnel(
        &self,
        website_id: &str,
        draft: &FunnelDraft,
        limit: usize,
    ) -> anyhow::Result<SavedFunnel> {
        let mut funnels = self.funnels.write().await;
        let owned = funnels.iter().filter(|f| f.website_id == website_id).count();
        if owned >= limit {
            return Err(FunnelConflict::LimitExceeded { limit }.into());
        }
        if funnels
            .iter()
            .any(|f| f.website_id == website_id && f.name == draft.name)
        {
            return Err(FunnelConflict::DuplicateName.into());
        }

        let now = now_string();
        let funnel = SavedFunnel {
            id: generate_funnel_id(),
            website_id: website_id.to_string(),
            name: draft.name.clone(),
            steps: draft.steps.clone(),
            created_at: now.clone(),
            updated_at: now,
        };
        funnels.push(funnel.clone());
        Ok(funnel)
    }

    async fn update_funnel(
        &self,
        website_id: &str,
        funnel_id: &str,
        draft: &FunnelDraft,
    ) -> anyhow::Result<Option<SavedFunnel>> {
        let mut funnels = self.funnels.write().await;
        let Some(idx) = funnels
            .iter()
            .position(|f| f.website_id == website_id && f.id == funnel_id)
        else {
            return Ok(None);
        };
        if funnels
            .iter()
            .any(|f| f.website_id == website_id && f.name == draft.name && f.id != funnel_id)
        {
            return Err(FunnelConflict::DuplicateName.into());
        }
        let funnel = &mut funnels[idx];
        funnel.name = draft.name.clone();
        funnel.steps = draft.steps.clone();
        funnel.updated_at = now_string();
        Ok(Some(funnel.clone()))
    }

    async fn delete_funnel(&self, website_id: &str, funnel_id: &str) -> anyhow::Result<bool> {
        let mut funnels = self.funnels.write().await;
        let before = funnels.len();
        funnels.retain(|f| !(f.website_id == website_id && f.id == funnel_id));
        Ok(funnels.len() != before)
    }
}
