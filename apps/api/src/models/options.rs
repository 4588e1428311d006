//! Request options as they arrive on the wire, and their resolution into the
//! typed settings each pipeline runs with.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::layout::eye_flow::EyeFlowPattern;
use crate::layout::grid::{GridOptions, GridType};
use crate::layout::LayoutConstraints;
use crate::narrative::emotion::JourneyTemplate;
use crate::narrative::pacing::PacingStrategy;
use crate::narrative::story_arc::StoryArcKind;
use crate::narrative::NarrativeOptions;

pub const DEFAULT_BASE_FONT_SIZE: f64 = 11.0;

const AUTO: &str = "auto";

/// Raw options shared by both endpoints. Enum values stay strings until
/// resolution so unknown names map onto the right `Unknown*` error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompositionOptions {
    pub grid_type: Option<String>,
    pub grid_options: GridOptions,
    pub eye_flow_pattern: Option<String>,
    pub story_arc: Option<String>,
    pub journey_template: Option<String>,
    pub pacing_strategy: Option<String>,
    pub base_font_size: Option<f64>,
    pub use_critique_service: bool,
    pub critique_timeout_ms: Option<u64>,
}

/// `None` and `"auto"` both mean "let the engine choose".
fn parse_or_auto<T>(raw: &Option<String>) -> Result<Option<T>, EngineError>
where
    T: FromStr<Err = EngineError>,
{
    match raw.as_deref().map(str::trim) {
        None => Ok(None),
        Some(value) if value.eq_ignore_ascii_case(AUTO) => Ok(None),
        Some(value) => value.parse().map(Some),
    }
}

impl CompositionOptions {
    /// Requested timeout, never above the server ceiling.
    pub fn critique_timeout(&self, ceiling: Duration) -> Duration {
        match self.critique_timeout_ms {
            Some(ms) => Duration::from_millis(ms).min(ceiling),
            None => ceiling,
        }
    }

    pub fn layout_constraints(&self, timeout_ceiling: Duration) -> Result<LayoutConstraints, EngineError> {
        let base_font_size = self.base_font_size.unwrap_or(DEFAULT_BASE_FONT_SIZE);
        if !(base_font_size.is_finite() && base_font_size > 0.0) {
            return Err(EngineError::InvalidInput(format!(
                "baseFontSize must be positive, got {base_font_size}"
            )));
        }
        Ok(LayoutConstraints {
            grid_type: parse_or_auto::<GridType>(&self.grid_type)?,
            grid_options: self.grid_options.clone(),
            eye_flow_pattern: parse_or_auto::<EyeFlowPattern>(&self.eye_flow_pattern)?
                .unwrap_or(EyeFlowPattern::Auto),
            base_font_size,
            use_critique_service: self.use_critique_service,
            critique_timeout: self.critique_timeout(timeout_ceiling),
        })
    }

    pub fn narrative_options(&self, timeout_ceiling: Duration) -> Result<NarrativeOptions, EngineError> {
        let pacing = match self.pacing_strategy.as_deref() {
            Some(raw) => raw.parse::<PacingStrategy>()?,
            None => PacingStrategy::default(),
        };
        Ok(NarrativeOptions {
            story_arc: parse_or_auto::<StoryArcKind>(&self.story_arc)?,
            journey: parse_or_auto::<JourneyTemplate>(&self.journey_template)?,
            pacing,
            use_critique_service: self.use_critique_service,
            critique_timeout: self.critique_timeout(timeout_ceiling),
        })
    }
}
