//! Visual narrative orchestrator.
//!
//! `compose_flow` is the deterministic pass: pick an arc, split the blocks
//! across its stages, line the journey up with the stages, run the pacing
//! analysis and classify the transitions. `create_flow` runs that pass on the
//! blocking pool and then, if asked, lets the critique service patch stage
//! treatments. A patch is validated as a whole on a copy and swapped in only
//! when every suggestion is valid.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::critique::{
    prompts::NARRATIVE_RUBRIC, request_critique, CritiqueRequest, CritiqueService, CritiqueSubject,
    Suggestion,
};
use crate::errors::{AppError, EngineError, PipelineWarning};
use crate::layout::placement::MAX_SPACING_TIER;
use crate::models::document::Document;
use crate::narrative::emotion::{resonance, JourneyStep, JourneyTemplate};
use crate::narrative::pacing::{self, PacingPlan, PacingStrategy};
use crate::narrative::story_arc::{
    align_journey, build_arc, select_arc, transitions, Contrast, JourneyEntry, StoryArc, StoryArcKind,
    Transition, VisualTreatment,
};

const MAX_TYPE_SIZE_PT: f64 = 200.0;

#[derive(Debug, Clone)]
pub struct NarrativeOptions {
    /// `None` picks an arc from the document shape.
    pub story_arc: Option<StoryArcKind>,
    /// `None` uses the arc's default journey.
    pub journey: Option<JourneyTemplate>,
    pub pacing: PacingStrategy,
    pub use_critique_service: bool,
    pub critique_timeout: Duration,
}

impl Default for NarrativeOptions {
    fn default() -> Self {
        Self {
            story_arc: None,
            journey: None,
            pacing: PacingStrategy::default(),
            use_critique_service: false,
            critique_timeout: Duration::from_millis(8000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrativeMetrics {
    /// 0–10.
    pub resonance: f64,
    /// 0–1.
    pub engagement_score: f64,
    pub reading_time_minutes: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrativeFlow {
    pub story_arc: StoryArc,
    pub journey_template: JourneyTemplate,
    pub emotional_journey: Vec<JourneyEntry>,
    pub pacing_plan: PacingPlan,
    pub transitions: Vec<Transition>,
    pub metrics: NarrativeMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NarrativeOutcome {
    pub narrative: NarrativeFlow,
    pub warnings: Vec<PipelineWarning>,
}

/// Deterministic narrative pass. Fails only on malformed input.
pub fn compose_flow(doc: &Document, options: &NarrativeOptions) -> Result<NarrativeFlow, EngineError> {
    doc.validate()?;

    let arc_kind = options.story_arc.unwrap_or_else(|| select_arc(doc));
    let journey_template = options.journey.unwrap_or_else(|| arc_kind.default_journey());
    debug!("Narrative: arc {arc_kind}, journey {journey_template}, pacing {}", options.pacing.as_str());

    let story_arc = build_arc(arc_kind, doc.blocks.len());
    let emotional_journey = align_journey(&story_arc, &journey_template.steps());
    let pacing_plan = pacing::analyze(&doc.blocks, doc.estimated_pages(), options.pacing);
    let transitions = transitions(&emotional_journey);

    let steps: Vec<JourneyStep> = emotional_journey.iter().map(|e| e.step).collect();
    let metrics = NarrativeMetrics {
        resonance: resonance(&steps),
        engagement_score: pacing_plan.engagement_score,
        reading_time_minutes: pacing_plan.total_words as f64 / options.pacing.target_wpm(),
    };

    Ok(NarrativeFlow {
        story_arc,
        journey_template,
        emotional_journey,
        pacing_plan,
        transitions,
        metrics,
    })
}

/// Applies every suggestion to a copy of `flow`. Any invalid suggestion
/// rejects the whole list and leaves `flow` untouched.
pub fn apply_suggestions(flow: &NarrativeFlow, suggestions: &[Suggestion]) -> Result<NarrativeFlow, String> {
    let mut patched = flow.clone();
    for suggestion in suggestions {
        let stage = patched
            .story_arc
            .stages
            .iter_mut()
            .find(|s| s.name == suggestion.target_id)
            .ok_or_else(|| format!("unknown stage '{}'", suggestion.target_id))?;
        patch_treatment(&mut stage.visual_treatment, &suggestion.property, &suggestion.new_value)
            .map_err(|e| format!("stage '{}': {e}", suggestion.target_id))?;
    }
    Ok(patched)
}

fn patch_treatment(treatment: &mut VisualTreatment, property: &str, value: &Value) -> Result<(), String> {
    match property {
        "imageryScale" => {
            let scale = number(value, property)?;
            if !(0.0..=1.0).contains(&scale) {
                return Err(format!("imageryScale {scale} outside 0-1"));
            }
            treatment.imagery_scale = scale;
        }
        "headingSize" => treatment.heading_size = type_size(value, property)?,
        "bodySize" => treatment.body_size = type_size(value, property)?,
        "colorMood" => {
            let mood = value
                .as_str()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .ok_or_else(|| "colorMood must be a non-empty string".to_string())?;
            treatment.color_mood = mood.to_string();
        }
        "spacingTier" => {
            let tier = value
                .as_u64()
                .filter(|t| *t <= MAX_SPACING_TIER as u64)
                .ok_or_else(|| format!("spacingTier must be an integer 0-{MAX_SPACING_TIER}"))?;
            treatment.spacing_tier = tier as u8;
        }
        "contrast" => {
            let level = value
                .as_str()
                .ok_or_else(|| "contrast must be a string".to_string())?;
            treatment.contrast = level.parse::<Contrast>().map_err(|e| e.to_string())?;
        }
        other => return Err(format!("unknown property '{other}'")),
    }
    Ok(())
}

fn number(value: &Value, property: &str) -> Result<f64, String> {
    value
        .as_f64()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("{property} must be a number"))
}

fn type_size(value: &Value, property: &str) -> Result<f64, String> {
    let size = number(value, property)?;
    if size <= 0.0 || size > MAX_TYPE_SIZE_PT {
        return Err(format!("{property} {size} outside 0-{MAX_TYPE_SIZE_PT}pt"));
    }
    Ok(size)
}

/// Full narrative pipeline: the deterministic pass on the blocking pool, then
/// the optional critique round.
pub async fn create_flow(
    doc: Document,
    options: NarrativeOptions,
    critic: Option<Arc<dyn CritiqueService>>,
) -> Result<NarrativeOutcome, AppError> {
    let blocks = doc.blocks.len();
    let pass_options = options.clone();
    let narrative = tokio::task::spawn_blocking(move || compose_flow(&doc, &pass_options))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("spawn_blocking failed in create_flow: {e}")))??;

    let mut warnings = Vec::new();
    if !options.use_critique_service {
        info!(
            "Narrative composed: {} over {blocks} blocks, resonance {:.2}",
            narrative.story_arc.kind, narrative.metrics.resonance
        );
        return Ok(NarrativeOutcome { narrative, warnings });
    }

    let request = CritiqueRequest {
        subject: CritiqueSubject::Narrative,
        snapshot: serde_json::to_value(&narrative).context("Failed to serialize narrative snapshot")?,
        rubric: NARRATIVE_RUBRIC.to_string(),
    };

    let narrative = match request_critique(critic.as_deref(), &request, options.critique_timeout).await {
        Ok(suggestions) if suggestions.is_empty() => narrative,
        Ok(suggestions) => match apply_suggestions(&narrative, &suggestions) {
            Ok(patched) => {
                debug!("Applied {} narrative suggestions", suggestions.len());
                patched
            }
            Err(reason) => {
                warn!("Rejected narrative critique: {reason}");
                warnings.push(PipelineWarning::CritiqueRejected { reason });
                narrative
            }
        },
        Err(unavailable) => {
            warn!("Narrative critique skipped: {unavailable}");
            warnings.push(PipelineWarning::CritiqueUnavailable {
                reason: unavailable.to_string(),
            });
            narrative
        }
    };

    info!(
        "Narrative composed: {} over {blocks} blocks, resonance {:.2}, {} warnings",
        narrative.story_arc.kind,
        narrative.metrics.resonance,
        warnings.len()
    );
    Ok(NarrativeOutcome { narrative, warnings })
}
