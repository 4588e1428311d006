use axum::{extract::State, Json};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::layout::{optimize, LayoutOutcome};
use crate::models::document::Document;
use crate::models::options::CompositionOptions;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct OptimizeRequest {
    pub document: Document,
    #[serde(default)]
    pub options: CompositionOptions,
}

/// POST /api/v1/layout/optimize
pub async fn handle_optimize(
    State(state): State<AppState>,
    Json(req): Json<OptimizeRequest>,
) -> Result<Json<LayoutOutcome>, AppError> {
    let request_id = Uuid::new_v4();
    info!(
        "Layout request {request_id}: {} blocks, critique {}",
        req.document.blocks.len(),
        req.options.use_critique_service
    );

    let constraints = req.options.layout_constraints(state.config.critique_timeout())?;
    let outcome = optimize(req.document, constraints, state.critic.clone()).await?;

    info!("Layout request {request_id} done with {} warnings", outcome.warnings.len());
    Ok(Json(outcome))
}
