//! Agent listing endpoints.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::client::LettaClient;
use crate::error::LettaResult;
use crate::pagination::{PaginatedStream, PaginationExt};
use crate::types::{AgentState, LettaId, ListAgentsParams, PaginationParams};

/// Hard cap on pages fetched by [`AgentApi::list_all`], bounding the
/// worst case where a misbehaving server never stops returning full pages.
pub const MAX_AGENT_LIST_PAGES: usize = 10;

/// Agent API operations.
#[derive(Debug)]
pub struct AgentApi<'a> {
    client: &'a LettaClient,
}

impl<'a> AgentApi<'a> {
    /// Create a new agent API instance.
    pub fn new(client: &'a LettaClient) -> Self {
        Self { client }
    }

    /// List agents, one page at a time.
    ///
    /// # Errors
    ///
    /// Returns a [`LettaError`](crate::error::LettaError) if the request fails
    /// or the response cannot be parsed.
    pub async fn list(&self, params: Option<ListAgentsParams>) -> LettaResult<Vec<AgentState>> {
        self.client
            .get_with_query("v1/agents", &params.unwrap_or_default())
            .await
    }

    /// Get a specific agent by ID.
    ///
    /// # Errors
    ///
    /// Returns a [`LettaError`](crate::error::LettaError) if the request fails
    /// or the response cannot be parsed.
    pub async fn get(&self, agent_id: &LettaId) -> LettaResult<AgentState> {
        self.client.get(&format!("v1/agents/{}", agent_id)).await
    }

    /// List all agents, fetching subsequent pages as needed.
    ///
    /// The Provisioner (§4.4) drives this on a polling interval to detect
    /// newly created or deleted agents.
    pub fn paginated(&self, params: Option<PaginationParams>) -> PaginatedStream<AgentState> {
        let client = self.client.clone();

        let list_params = params.as_ref().map(|p| ListAgentsParams {
            before: p.before.clone(),
            after: p.after.clone(),
            limit: p.limit,
        });

        PaginatedStream::new_with_id_cursor(
            params,
            move |page_params| {
                let client = client.clone();
                let mut effective_params = list_params.clone().unwrap_or_default();

                if let Some(p) = page_params {
                    effective_params.before = p.before;
                    effective_params.after = p.after;
                    effective_params.limit = p.limit;
                }

                async move { client.agents().list(Some(effective_params)).await }
            },
            |agent| &agent.id,
        )
    }

    /// Fetch every agent, deduplicated by ID across pages, bounded to
    /// [`MAX_AGENT_LIST_PAGES`] pages — the Provisioner's entry point (§4.3,
    /// §4.4 step 1).
    pub async fn list_all(&self) -> LettaResult<Vec<AgentState>> {
        let client = self.client.clone();
        let page_count = Arc::new(AtomicUsize::new(0));
        let truncated = Arc::new(AtomicUsize::new(0));

        let stream = PaginatedStream::new_with_id_cursor(
            None,
            move |page_params| {
                let client = client.clone();
                let page_count = page_count.clone();
                let truncated = truncated.clone();
                async move {
                    if page_count.fetch_add(1, Ordering::SeqCst) >= MAX_AGENT_LIST_PAGES {
                        if truncated.swap(1, Ordering::SeqCst) == 0 {
                            tracing::warn!(
                                max_pages = MAX_AGENT_LIST_PAGES,
                                "agent listing truncated at page cap"
                            );
                        }
                        return Ok(Vec::new());
                    }
                    let list_params = page_params.map(|p| ListAgentsParams {
                        before: p.before,
                        after: p.after,
                        limit: p.limit,
                    });
                    client.agents().list(list_params).await
                }
            },
            |agent| &agent.id,
        );

        let mut agents = stream.collect().await?;
        let mut seen = std::collections::HashSet::new();
        agents.retain(|agent| seen.insert(agent.id.clone()));
        Ok(agents)
    }
}

impl<'a> PaginationExt for AgentApi<'a> {
    type Item = AgentState;

    fn paginated(&self, params: Option<PaginationParams>) -> PaginatedStream<Self::Item> {
        self.paginated(params)
    }
}
