//! Emotional Mapping: emotion profiles, journey templates and resonance.
//!
//! Everything here is a fixed lookup table. Journeys are returned verbatim;
//! the narrative orchestrator decides how they line up with story stages.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::EngineError;

const RANGE_WEIGHT: f64 = 0.4;
const SMOOTHNESS_WEIGHT: f64 = 0.3;
const VARIETY_WEIGHT: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Concern,
    Urgency,
    Hope,
    Trust,
    Empowerment,
    Curiosity,
    Excitement,
    Calm,
    Confidence,
    Inspiration,
    Empathy,
    Pride,
    Joy,
}

/// Families of emotions; moving between families is a bigger shift for the
/// reader than moving within one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionCategory {
    Tension,
    Aspiration,
    Assurance,
    Celebration,
    Connection,
}

/// Visual treatment an emotion asks for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionProfile {
    pub default_intensity: f64,
    pub color_mood: &'static str,
    /// CSS-style font weight, 100–900.
    pub typography_weight: u16,
    /// Preferred share of the page left blank.
    pub whitespace_target: f64,
}

impl Emotion {
    pub const ALL: [Emotion; 13] = [
        Emotion::Concern,
        Emotion::Urgency,
        Emotion::Hope,
        Emotion::Trust,
        Emotion::Empowerment,
        Emotion::Curiosity,
        Emotion::Excitement,
        Emotion::Calm,
        Emotion::Confidence,
        Emotion::Inspiration,
        Emotion::Empathy,
        Emotion::Pride,
        Emotion::Joy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Concern => "concern",
            Emotion::Urgency => "urgency",
            Emotion::Hope => "hope",
            Emotion::Trust => "trust",
            Emotion::Empowerment => "empowerment",
            Emotion::Curiosity => "curiosity",
            Emotion::Excitement => "excitement",
            Emotion::Calm => "calm",
            Emotion::Confidence => "confidence",
            Emotion::Inspiration => "inspiration",
            Emotion::Empathy => "empathy",
            Emotion::Pride => "pride",
            Emotion::Joy => "joy",
        }
    }

    pub fn category(&self) -> EmotionCategory {
        match self {
            Emotion::Concern | Emotion::Urgency => EmotionCategory::Tension,
            Emotion::Hope | Emotion::Inspiration | Emotion::Curiosity => EmotionCategory::Aspiration,
            Emotion::Trust | Emotion::Calm | Emotion::Confidence => EmotionCategory::Assurance,
            Emotion::Empowerment | Emotion::Excitement | Emotion::Pride | Emotion::Joy => {
                EmotionCategory::Celebration
            }
            Emotion::Empathy => EmotionCategory::Connection,
        }
    }

    pub fn profile(&self) -> EmotionProfile {
        let (default_intensity, color_mood, typography_weight, whitespace_target) = match self {
            Emotion::Concern => (0.6, "desaturated-blue", 500, 0.35),
            Emotion::Urgency => (0.9, "high-contrast-red", 700, 0.25),
            Emotion::Hope => (0.7, "warm-dawn", 400, 0.45),
            Emotion::Trust => (0.6, "steady-navy", 500, 0.40),
            Emotion::Empowerment => (0.8, "vivid-orange", 700, 0.35),
            Emotion::Curiosity => (0.5, "teal-accent", 400, 0.45),
            Emotion::Excitement => (0.9, "electric-magenta", 800, 0.30),
            Emotion::Calm => (0.3, "soft-sage", 300, 0.55),
            Emotion::Confidence => (0.7, "deep-indigo", 600, 0.40),
            Emotion::Inspiration => (0.8, "golden-light", 500, 0.45),
            Emotion::Empathy => (0.5, "warm-rose", 400, 0.50),
            Emotion::Pride => (0.8, "royal-purple", 700, 0.35),
            Emotion::Joy => (0.9, "sunny-yellow", 600, 0.40),
        };
        EmotionProfile {
            default_intensity,
            color_mood,
            typography_weight,
            whitespace_target,
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Emotion::ALL
            .into_iter()
            .find(|e| e.as_str() == wanted)
            .ok_or_else(|| EngineError::InvalidInput(format!("unknown emotion '{s}'")))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Journey templates
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JourneyTemplate {
    Persuasion,
    Inspiration,
    Education,
    Celebration,
    Partnership,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JourneyStep {
    pub emotion: Emotion,
    pub intensity: f64,
}

fn step(emotion: Emotion, intensity: f64) -> JourneyStep {
    JourneyStep { emotion, intensity }
}

impl JourneyTemplate {
    pub const ALL: [JourneyTemplate; 5] = [
        JourneyTemplate::Persuasion,
        JourneyTemplate::Inspiration,
        JourneyTemplate::Education,
        JourneyTemplate::Celebration,
        JourneyTemplate::Partnership,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JourneyTemplate::Persuasion => "persuasion",
            JourneyTemplate::Inspiration => "inspiration",
            JourneyTemplate::Education => "education",
            JourneyTemplate::Celebration => "celebration",
            JourneyTemplate::Partnership => "partnership",
        }
    }

    /// The template's ordered `(emotion, intensity)` steps.
    pub fn steps(&self) -> Vec<JourneyStep> {
        use Emotion::*;
        match self {
            JourneyTemplate::Persuasion => vec![
                step(Concern, 0.6),
                step(Urgency, 0.9),
                step(Hope, 0.7),
                step(Trust, 0.6),
                step(Empowerment, 0.8),
            ],
            JourneyTemplate::Inspiration => vec![
                step(Curiosity, 0.5),
                step(Empathy, 0.6),
                step(Hope, 0.7),
                step(Inspiration, 0.9),
                step(Empowerment, 0.8),
            ],
            JourneyTemplate::Education => vec![
                step(Curiosity, 0.6),
                step(Calm, 0.4),
                step(Confidence, 0.6),
                step(Trust, 0.7),
                step(Empowerment, 0.8),
            ],
            JourneyTemplate::Celebration => vec![
                step(Pride, 0.7),
                step(Joy, 0.9),
                step(Excitement, 0.8),
                step(Inspiration, 0.7),
                step(Calm, 0.5),
            ],
            JourneyTemplate::Partnership => vec![
                step(Empathy, 0.5),
                step(Trust, 0.6),
                step(Confidence, 0.7),
                step(Hope, 0.8),
                step(Joy, 0.7),
            ],
        }
    }
}

impl fmt::Display for JourneyTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JourneyTemplate {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        JourneyTemplate::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| EngineError::UnknownJourney(s.to_string()))
    }
}

/// Looks a journey up by template name.
pub fn map_journey(template_name: &str) -> Result<Vec<JourneyStep>, EngineError> {
    Ok(template_name.parse::<JourneyTemplate>()?.steps())
}

// ────────────────────────────────────────────────────────────────────────────
// Resonance
// ────────────────────────────────────────────────────────────────────────────

/// `10 · (0.4·range + 0.3·smoothness + 0.3·variety)`.
///
/// - range: spread between the weakest and strongest intensity
/// - smoothness: `1 −` mean absolute step between neighbours
/// - variety: distinct emotions over steps
pub fn resonance(journey: &[JourneyStep]) -> f64 {
    if journey.is_empty() {
        return 0.0;
    }
    let intensities: Vec<f64> = journey.iter().map(|s| s.intensity.clamp(0.0, 1.0)).collect();
    let max = intensities.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let min = intensities.iter().cloned().fold(f64::INFINITY, f64::min);
    let range = max - min;

    let smoothness = if intensities.len() < 2 {
        1.0
    } else {
        let total: f64 = intensities.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
        1.0 - total / (intensities.len() - 1) as f64
    };

    let distinct: BTreeSet<Emotion> = journey.iter().map(|s| s.emotion).collect();
    let variety = distinct.len() as f64 / journey.len() as f64;

    10.0 * (RANGE_WEIGHT * range + SMOOTHNESS_WEIGHT * smoothness + VARIETY_WEIGHT * variety)
}
