use async_trait::async_trait;

use tidemark_core::event::EventRow;
use tidemark_core::funnel::SavedFunnel;
use tidemark_core::store::{EventQuery, EventStore, FunnelDraft, FunnelStore};

use crate::DuckDbBackend;

#[async_trait]
impl EventStore for DuckDbBackend {
    async fn query_events(&self, query: &EventQuery) -> anyhow::Result<Vec<EventRow>> {
        crate::queries::events::query_events_inner(self, query).await
    }
}

#[async_trait]
impl FunnelStore for DuckDbBackend {
    async fn list_funnels(&self, website_id: &str) -> anyhow::Result<Vec<SavedFunnel>> {
        crate::queries::funnels::list_funnels_inner(self, website_id).await
    }

    async fn get_funnel(
        &self,
        website_id: &str,
        funnel_id: &str,
    ) -> anyhow::Result<Option<SavedFunnel>> {
        crate::queries::funnels::get_funnel_inner(self, website_id, funnel_id).await
    }

    async fn create_funnel(
        &self,
        website_id: &str,
        draft: &FunnelDraft,
        limit: usize,
    ) -> anyhow::Result<SavedFunnel> {
        crate::queries::funnels::create_funnel_inner(self, website_id, draft, limit).await
    }

    async fn update_funnel(
        &self,
        website_id: &str,
        funnel_id: &str,
        draft: &FunnelDraft,
    ) -> anyhow::Result<Option<SavedFunnel>> {
        crate::queries::funnels::update_funnel_inner(self, website_id, funnel_id, draft).await
    }

    async fn delete_funnel(&self, website_id: &str, funnel_id: &str) -> anyhow::Result<bool> {
        crate::queries::funnels::delete_funnel_inner(self, website_id, funnel_id).await
    }
}
