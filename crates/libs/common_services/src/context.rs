use crate::autotag::AutoTagPropagator;
use crate::database::IdentityStore;
use crate::detection::FaceDetector;
use crate::matching::MatchingEngine;
use crate::notify::NotificationFanout;
use crate::storage::ObjectStorage;
use app_state::MatchingSettings;
use std::sync::Arc;

/// Everything an upload, registration, naming or search request needs.
#[derive(Clone)]
pub struct PipelineContext {
    pub store: Arc<dyn IdentityStore>,
    pub detector: Arc<dyn FaceDetector>,
    pub storage: Arc<dyn ObjectStorage>,
    pub fanout: NotificationFanout,
    pub matching: MatchingSettings,
}

impl PipelineContext {
    #[must_use]
    pub fn engine(&self) -> MatchingEngine {
        MatchingEngine::new(Arc::clone(&self.store), self.matching)
    }

    #[must_use]
    pub fn propagator(&self) -> AutoTagPropagator {
        AutoTagPropagator::new(Arc::clone(&self.store), self.matching.propagation_threshold)
    }

    /// Best-effort removal of stored artifacts. Failures are logged, never returned.
    pub async fn release_artifacts<'a>(&self, keys: impl IntoIterator<Item = &'a str>) {
        for key in keys {
            if let Err(e) = self.storage.delete(key).await {
                tracing::error!("Failed to release stored artifact {key}: {e}");
            }
        }
    }
}
