//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use keel_llm::ProviderRegistry;
use keel_storage::RecordStore;

use crate::agent::{AgentDispatcher, AssistantRuntime, ToolCatalog};
use crate::config::AgentConfig;
use crate::error::ApiResult;
use crate::services::{
    FeatureService, InterfaceService, PageService, ProductService, ReleaseService,
    RequirementService, RoadmapService, Services,
};

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Backing store, also used by the readiness probe.
    pub store: Arc<dyn RecordStore>,
    pub services: Services,
    pub assistant: AssistantRuntime,
    pub start_time: Instant,
}

impl AppState {
    /// Wire services, the tool catalog and the assistant over one store.
    pub fn new(
        store: Arc<dyn RecordStore>,
        providers: ProviderRegistry,
        agent_config: AgentConfig,
    ) -> ApiResult<Self> {
        let services = Services::new(store.clone());
        let catalog = Arc::new(ToolCatalog::new()?);
        let dispatcher = AgentDispatcher::new(services.clone(), catalog, agent_config.access);
        tracing::info!(
            tools = dispatcher.catalog().len(),
            access = %agent_config.access,
            chat_provider = providers.has_chat(),
            "Assistant configured"
        );
        let assistant = AssistantRuntime::new(providers, dispatcher, agent_config);

        Ok(Self {
            store,
            services,
            assistant,
            start_time: Instant::now(),
        })
    }
}

crate::impl_from_ref!(Arc<dyn RecordStore>, store);
crate::impl_from_ref!(AssistantRuntime, assistant);
crate::impl_from_ref!(Instant, start_time);
crate::impl_from_ref!(ProductService, services.products);
crate::impl_from_ref!(InterfaceService, services.interfaces);
crate::impl_from_ref!(FeatureService, services.features);
crate::impl_from_ref!(RequirementService, services.requirements);
crate::impl_from_ref!(ReleaseService, services.releases);
crate::impl_from_ref!(RoadmapService, services.roadmaps);
crate::impl_from_ref!(PageService, services.pages);
