use app_state::AppSettings;
use axum::extract::FromRef;
use common_services::context::PipelineContext;
use common_services::database::IdentityStore;
use common_services::messaging::MessagingSession;
use std::sync::Arc;

#[derive(Clone)]
pub struct ApiContext {
    pub pipeline: PipelineContext,
    pub settings: AppSettings,
}

impl ApiContext {
    #[must_use]
    pub fn store(&self) -> &dyn IdentityStore {
        self.pipeline.store.as_ref()
    }

    #[must_use]
    pub fn messaging(&self) -> &Arc<MessagingSession> {
        self.pipeline.fanout.messaging()
    }
}

// Lets handlers extract only the part of the state they need.
impl FromRef<ApiContext> for PipelineContext {
    fn from_ref(state: &ApiContext) -> Self {
        state.pipeline.clone()
    }
}

impl FromRef<ApiContext> for AppSettings {
    fn from_ref(state: &ApiContext) -> Self {
        state.settings.clone()
    }
}
