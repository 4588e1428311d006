use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::document::Document;
use crate::models::options::CompositionOptions;
use crate::narrative::emotion::{JourneyStep, JourneyTemplate};
use crate::narrative::story_arc::StoryArcKind;
use crate::narrative::{create_flow, NarrativeOutcome};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct FlowRequest {
    pub document: Document,
    #[serde(default)]
    pub options: CompositionOptions,
}

#[derive(Debug, Serialize)]
pub struct JourneySummary {
    pub name: &'static str,
    pub steps: Vec<JourneyStep>,
}

#[derive(Debug, Serialize)]
pub struct StageSummary {
    pub name: &'static str,
    pub share: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArcSummary {
    pub name: &'static str,
    pub default_journey: &'static str,
    pub stages: Vec<StageSummary>,
}

/// POST /api/v1/narrative/flow
pub async fn handle_flow(
    State(state): State<AppState>,
    Json(req): Json<FlowRequest>,
) -> Result<Json<NarrativeOutcome>, AppError> {
    let request_id = Uuid::new_v4();
    info!(
        "Narrative request {request_id}: {} blocks, critique {}",
        req.document.blocks.len(),
        req.options.use_critique_service
    );

    let options = req.options.narrative_options(state.config.critique_timeout())?;
    let outcome = create_flow(req.document, options, state.critic.clone()).await?;

    info!("Narrative request {request_id} done with {} warnings", outcome.warnings.len());
    Ok(Json(outcome))
}

/// GET /api/v1/narrative/journeys
pub async fn handle_list_journeys() -> Json<Vec<JourneySummary>> {
    Json(
        JourneyTemplate::ALL
            .iter()
            .map(|t| JourneySummary {
                name: t.as_str(),
                steps: t.steps(),
            })
            .collect(),
    )
}

/// GET /api/v1/narrative/arcs
pub async fn handle_list_arcs() -> Json<Vec<ArcSummary>> {
    Json(
        StoryArcKind::ALL
            .iter()
            .map(|arc| ArcSummary {
                name: arc.as_str(),
                default_journey: arc.default_journey().as_str(),
                stages: arc
                    .stages()
                    .into_iter()
                    .map(|s| StageSummary {
                        name: s.name,
                        share: s.share,
                    })
                    .collect(),
            })
            .collect(),
    )
}
