use crate::api::search::error::SearchError;
use crate::api::search::interfaces::SearchResponse;
use crate::context::PipelineContext;

/// Finds every event photo the person in `selfie` appears in. Persists nothing.
pub async fn search_by_selfie(
    context: &PipelineContext,
    selfie: &[u8],
) -> Result<SearchResponse, SearchError> {
    let detected = context.detector.detect(selfie).await?;
    let items = context.engine().search(detected).await?;
    Ok(SearchResponse { items })
}
