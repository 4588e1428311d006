//! Story arcs: stage templates, block partitioning and stage transitions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::models::document::{BlockType, Document};
use crate::narrative::emotion::{JourneyStep, JourneyTemplate};
use crate::narrative::BlockRange;

const SHORT_DOCUMENT_BLOCKS: usize = 5;
const LONG_DOCUMENT_WORDS: u64 = 3000;
const PITCH_DOCUMENT_WORDS: u64 = 1500;
const EDUCATIONAL_MIN_HEADINGS: usize = 4;

/// Intensity deltas below this read as a subtle change within a family.
const SUBTLE_DELTA: f64 = 0.2;
/// Deltas below this read as a shift rather than a jolt across families.
const SHIFT_DELTA: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoryArcKind {
    #[serde(rename = "classic-5-act")]
    Classic5Act,
    #[serde(rename = "problem-solution-benefit")]
    ProblemSolutionBenefit,
    #[serde(rename = "heros-journey")]
    HerosJourney,
    #[serde(rename = "before-after-bridge")]
    BeforeAfterBridge,
    #[serde(rename = "educational")]
    Educational,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Contrast {
    Low,
    Medium,
    High,
}

impl FromStr for Contrast {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Contrast::Low),
            "medium" => Ok(Contrast::Medium),
            "high" => Ok(Contrast::High),
            _ => Err(EngineError::InvalidInput(format!("unknown contrast level '{s}'"))),
        }
    }
}

/// How a stage should look on the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualTreatment {
    /// 0 = text only, 1 = imagery dominates.
    pub imagery_scale: f64,
    pub heading_size: f64,
    pub body_size: f64,
    pub color_mood: String,
    pub spacing_tier: u8,
    pub contrast: Contrast,
}

fn treatment(
    imagery_scale: f64,
    heading_size: f64,
    body_size: f64,
    color_mood: &str,
    spacing_tier: u8,
    contrast: Contrast,
) -> VisualTreatment {
    VisualTreatment {
        imagery_scale,
        heading_size,
        body_size,
        color_mood: color_mood.to_string(),
        spacing_tier,
        contrast,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageTemplate {
    pub name: &'static str,
    /// Fraction of the document this stage covers.
    pub share: f64,
    pub treatment: VisualTreatment,
}

fn stage(name: &'static str, share: f64, treatment: VisualTreatment) -> StageTemplate {
    StageTemplate {
        name,
        share,
        treatment,
    }
}

impl StoryArcKind {
    pub const ALL: [StoryArcKind; 5] = [
        StoryArcKind::Classic5Act,
        StoryArcKind::ProblemSolutionBenefit,
        StoryArcKind::HerosJourney,
        StoryArcKind::BeforeAfterBridge,
        StoryArcKind::Educational,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StoryArcKind::Classic5Act => "classic-5-act",
            StoryArcKind::ProblemSolutionBenefit => "problem-solution-benefit",
            StoryArcKind::HerosJourney => "heros-journey",
            StoryArcKind::BeforeAfterBridge => "before-after-bridge",
            StoryArcKind::Educational => "educational",
        }
    }

    /// Stage templates in reading order. Shares sum to 1.
    pub fn stages(&self) -> Vec<StageTemplate> {
        use Contrast::*;
        match self {
            StoryArcKind::Classic5Act => vec![
                stage("exposition", 0.15, treatment(0.6, 29.0, 11.0, "establishing-neutral", 3, Medium)),
                stage("rising-action", 0.25, treatment(0.4, 18.0, 11.0, "building-warm", 2, Medium)),
                stage("climax", 0.20, treatment(0.9, 46.5, 12.0, "peak-saturated", 3, High)),
                stage("falling-action", 0.25, treatment(0.3, 18.0, 11.0, "cooling", 2, Medium)),
                stage("resolution", 0.15, treatment(0.5, 29.0, 11.0, "resolved-light", 3, Low)),
            ],
            StoryArcKind::ProblemSolutionBenefit => vec![
                stage("problem", 0.30, treatment(0.5, 29.0, 11.0, "tense-muted", 2, High)),
                stage("solution", 0.40, treatment(0.6, 29.0, 11.0, "clear-bright", 2, Medium)),
                stage("benefit", 0.30, treatment(0.8, 46.5, 12.0, "uplifting-warm", 3, High)),
            ],
            StoryArcKind::HerosJourney => vec![
                stage("ordinary-world", 0.10, treatment(0.5, 29.0, 11.0, "familiar-neutral", 3, Low)),
                stage("call-to-adventure", 0.10, treatment(0.7, 29.0, 11.0, "stirring", 2, Medium)),
                stage("trials", 0.30, treatment(0.4, 18.0, 11.0, "struggle-dark", 1, High)),
                stage("transformation", 0.25, treatment(0.9, 46.5, 12.0, "breakthrough", 3, High)),
                stage("return", 0.25, treatment(0.6, 29.0, 11.0, "triumphant-warm", 3, Medium)),
            ],
            StoryArcKind::BeforeAfterBridge => vec![
                stage("before", 0.30, treatment(0.5, 29.0, 11.0, "constrained-grey", 2, Medium)),
                stage("after", 0.30, treatment(0.8, 46.5, 12.0, "open-vivid", 3, High)),
                stage("bridge", 0.40, treatment(0.5, 29.0, 11.0, "confident-blue", 2, Medium)),
            ],
            StoryArcKind::Educational => vec![
                stage("introduction", 0.15, treatment(0.6, 29.0, 11.0, "inviting", 3, Medium)),
                stage("concepts", 0.30, treatment(0.3, 18.0, 11.0, "focused-neutral", 2, Medium)),
                stage("examples", 0.30, treatment(0.6, 18.0, 11.0, "illustrative", 2, Medium)),
                stage("practice", 0.15, treatment(0.4, 18.0, 11.0, "active", 2, High)),
                stage("summary", 0.10, treatment(0.3, 29.0, 11.0, "settled", 3, Low)),
            ],
        }
    }

    /// Journey template used when the caller asks for `auto`.
    pub fn default_journey(&self) -> JourneyTemplate {
        match self {
            StoryArcKind::ProblemSolutionBenefit | StoryArcKind::BeforeAfterBridge => {
                JourneyTemplate::Persuasion
            }
            StoryArcKind::Classic5Act | StoryArcKind::HerosJourney => JourneyTemplate::Inspiration,
            StoryArcKind::Educational => JourneyTemplate::Education,
        }
    }
}

impl fmt::Display for StoryArcKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoryArcKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('\'', "");
        StoryArcKind::ALL
            .into_iter()
            .find(|arc| arc.as_str() == wanted)
            .ok_or_else(|| EngineError::UnknownStoryArc(s.to_string()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Selection and partitioning
// ────────────────────────────────────────────────────────────────────────────

/// Decision table from document shape to arc.
pub fn select_arc(doc: &Document) -> StoryArcKind {
    let words = doc.total_words();
    let headings = doc.count_of(BlockType::Heading);
    let images = doc.count_of(BlockType::Image);
    let has_cta = doc.count_of(BlockType::Cta) > 0;
    let image_share = images as f64 / doc.blocks.len().max(1) as f64;

    if has_cta && words < PITCH_DOCUMENT_WORDS {
        StoryArcKind::ProblemSolutionBenefit
    } else if headings >= EDUCATIONAL_MIN_HEADINGS && image_share < 0.2 {
        StoryArcKind::Educational
    } else if words >= LONG_DOCUMENT_WORDS {
        StoryArcKind::HerosJourney
    } else if doc.blocks.len() < SHORT_DOCUMENT_BLOCKS {
        StoryArcKind::BeforeAfterBridge
    } else {
        StoryArcKind::Classic5Act
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub name: String,
    pub block_range: BlockRange,
    pub visual_treatment: VisualTreatment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryArc {
    pub kind: StoryArcKind,
    pub stages: Vec<Stage>,
}

/// Splits `block_count` blocks across stages by cumulative share. With at
/// least as many blocks as stages, every stage gets one or more blocks.
pub fn partition(block_count: usize, shares: &[f64]) -> Vec<BlockRange> {
    let stages = shares.len();
    let total: f64 = shares.iter().sum();
    let mut ranges = Vec::with_capacity(stages);
    let mut start = 0;
    let mut cumulative = 0.0;

    for (i, share) in shares.iter().enumerate() {
        cumulative += share;
        let end = if i + 1 == stages {
            block_count
        } else {
            let ideal = (cumulative / total * block_count as f64).round() as usize;
            if block_count >= stages {
                // leave at least one block for each later stage
                ideal.clamp(start + 1, block_count - (stages - i - 1))
            } else {
                ideal.clamp(start, block_count)
            }
        };
        ranges.push(BlockRange { start, end });
        start = end;
    }
    ranges
}

pub fn build_arc(kind: StoryArcKind, block_count: usize) -> StoryArc {
    let templates = kind.stages();
    let shares: Vec<f64> = templates.iter().map(|t| t.share).collect();
    let stages = templates
        .into_iter()
        .zip(partition(block_count, &shares))
        .map(|(template, block_range)| Stage {
            name: template.name.to_string(),
            block_range,
            visual_treatment: template.treatment,
        })
        .collect();
    StoryArc { kind, stages }
}

// ────────────────────────────────────────────────────────────────────────────
// Journey alignment and transitions
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyEntry {
    pub stage: String,
    #[serde(flatten)]
    pub step: JourneyStep,
}

/// One journey entry per stage. When lengths differ, stage `i` of `S` takes
/// entry `round(i·(J−1)/(S−1))`.
pub fn align_journey(arc: &StoryArc, journey: &[JourneyStep]) -> Vec<JourneyEntry> {
    let stages = arc.stages.len();
    if journey.is_empty() {
        return Vec::new();
    }
    arc.stages
        .iter()
        .enumerate()
        .map(|(i, stage)| {
            let idx = if stages == journey.len() {
                i
            } else if stages <= 1 {
                0
            } else {
                ((i * (journey.len() - 1)) as f64 / (stages - 1) as f64).round() as usize
            };
            JourneyEntry {
                stage: stage.name.clone(),
                step: journey[idx],
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    Subtle,
    Amplifying,
    Calming,
    Shifting,
    Dramatic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    pub from_stage: String,
    pub to_stage: String,
    pub kind: TransitionKind,
    pub intensity_delta: f64,
}

pub fn classify_transition(from: &JourneyStep, to: &JourneyStep) -> TransitionKind {
    let delta = to.intensity - from.intensity;
    if from.emotion.category() == to.emotion.category() {
        if delta.abs() < SUBTLE_DELTA {
            TransitionKind::Subtle
        } else if delta > 0.0 {
            TransitionKind::Amplifying
        } else {
            TransitionKind::Calming
        }
    } else if delta.abs() < SHIFT_DELTA {
        TransitionKind::Shifting
    } else {
        TransitionKind::Dramatic
    }
}

pub fn transitions(journey: &[JourneyEntry]) -> Vec<Transition> {
    journey
        .windows(2)
        .map(|pair| Transition {
            from_stage: pair[0].stage.clone(),
            to_stage: pair[1].stage.clone(),
            kind: classify_transition(&pair[0].step, &pair[1].step),
            intensity_delta: pair[1].step.intensity - pair[0].step.intensity,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document::{ContentBlock, PageGeometry};
    use crate::narrative::emotion::Emotion;

    fn make_document(types: &[BlockType], words: u32) -> Document {
        Document {
            blocks: types
                .iter()
                .enumerate()
                .map(|(i, t)| ContentBlock {
                    id: format!("b{i}"),
                    block_type: *t,
                    text: String::new(),
                    hierarchy_level: 2,
                    word_count: words,
                    media_size: None,
                })
                .collect(),
            page: PageGeometry::a4(),
        }
    }

    #[test]
    fn test_shares_sum_to_one() {
        for arc in StoryArcKind::ALL {
            let total: f64 = arc.stages().iter().map(|s| s.share).sum();
            assert!((total - 1.0).abs() < 1e-9, "{arc}");
        }
    }

    #[test]
    fn test_arc_names_round_trip() {
        for arc in StoryArcKind::ALL {
            assert_eq!(arc.as_str().parse::<StoryArcKind>().unwrap(), arc);
        }
        assert_eq!("hero's-journey".parse::<StoryArcKind>().unwrap(), StoryArcKind::HerosJourney);
        assert!(matches!(
            "tragedy".parse::<StoryArcKind>(),
            Err(EngineError::UnknownStoryArc(_))
        ));
    }

    #[test]
    fn test_partition_proportional() {
        let ranges = partition(10, &[0.3, 0.4, 0.3]);
        assert_eq!(
            ranges,
            vec![
                BlockRange { start: 0, end: 3 },
                BlockRange { start: 3, end: 7 },
                BlockRange { start: 7, end: 10 },
            ]
        );
    }

    #[test]
    fn test_partition_never_leaves_stage_empty() {
        for blocks in 5..40 {
            let ranges = partition(blocks, &[0.10, 0.10, 0.30, 0.25, 0.25]);
            assert_eq!(ranges.len(), 5);
            assert!(ranges.iter().all(|r| !r.is_empty()), "{blocks} blocks: {ranges:?}");
            assert_eq!(ranges.last().unwrap().end, blocks);
            assert!(ranges.windows(2).all(|w| w[0].end == w[1].start));
        }
    }

    #[test]
    fn test_partition_fewer_blocks_than_stages() {
        let ranges = partition(2, &[0.15, 0.25, 0.20, 0.25, 0.15]);
        assert_eq!(ranges.iter().map(|r| r.len()).sum::<usize>(), 2);
        assert_eq!(ranges.last().unwrap().end, 2);
    }

    #[test]
    fn test_select_arc_decision_table() {
        use BlockType::*;
        let pitch = make_document(&[Heading, Paragraph, Paragraph, Cta], 50);
        assert_eq!(select_arc(&pitch), StoryArcKind::ProblemSolutionBenefit);

        let course = make_document(&[Heading, Paragraph, Heading, Paragraph, Heading, Paragraph, Heading], 80);
        assert_eq!(select_arc(&course), StoryArcKind::Educational);

        let saga = make_document(&[Heading, Paragraph, Image, Paragraph, Paragraph, Paragraph], 700);
        assert_eq!(select_arc(&saga), StoryArcKind::HerosJourney);

        let short = make_document(&[Heading, Paragraph, Image], 100);
        assert_eq!(select_arc(&short), StoryArcKind::BeforeAfterBridge);

        let story = make_document(&[Heading, Paragraph, Image, Paragraph, Quote, Paragraph], 150);
        assert_eq!(select_arc(&story), StoryArcKind::Classic5Act);
    }

    #[test]
    fn test_align_journey_resamples() {
        let arc = build_arc(StoryArcKind::ProblemSolutionBenefit, 9);
        let journey = JourneyTemplate::Persuasion.steps();
        let aligned = align_journey(&arc, &journey);
        let emotions: Vec<Emotion> = aligned.iter().map(|e| e.step.emotion).collect();
        // 3 stages over 5 entries → indices 0, 2, 4
        assert_eq!(emotions, vec![Emotion::Concern, Emotion::Hope, Emotion::Empowerment]);
        assert_eq!(aligned[1].stage, "solution");
    }

    #[test]
    fn test_transition_thresholds() {
        let s = |emotion, intensity| JourneyStep { emotion, intensity };
        assert_eq!(
            classify_transition(&s(Emotion::Concern, 0.6), &s(Emotion::Urgency, 0.9)),
            TransitionKind::Amplifying
        );
        assert_eq!(
            classify_transition(&s(Emotion::Trust, 0.6), &s(Emotion::Calm, 0.5)),
            TransitionKind::Subtle
        );
        assert_eq!(
            classify_transition(&s(Emotion::Joy, 0.9), &s(Emotion::Pride, 0.6)),
            TransitionKind::Calming
        );
        assert_eq!(
            classify_transition(&s(Emotion::Urgency, 0.9), &s(Emotion::Hope, 0.7)),
            TransitionKind::Shifting
        );
        assert_eq!(
            classify_transition(&s(Emotion::Calm, 0.3), &s(Emotion::Excitement, 0.9)),
            TransitionKind::Dramatic
        );
    }

    #[test]
    fn test_transitions_between_adjacent_stages() {
        let arc = build_arc(StoryArcKind::Classic5Act, 10);
        let aligned = align_journey(&arc, &JourneyTemplate::Persuasion.steps());
        let list = transitions(&aligned);
        assert_eq!(list.len(), 4);
        assert_eq!(list[0].from_stage, "exposition");
        assert_eq!(list[0].to_stage, "rising-action");
        assert_eq!(list[0].kind, TransitionKind::Amplifying);
    }
}
