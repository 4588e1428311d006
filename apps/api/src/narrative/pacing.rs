//! Pacing Engine: reading density, breathing points and engagement.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::models::document::ContentBlock;
use crate::narrative::BlockRange;

/// Average adult silent-reading speed.
const BASE_READING_WPM: f64 = 238.0;
/// Minutes a reader spends on each natural break.
const BREAK_PAUSE_MINUTES: f64 = 0.1;
/// Middle of the balanced density band.
const OPTIMAL_DENSITY: f64 = 0.4;

const TEMPO_WEIGHT: f64 = 0.3;
const RHYTHM_WEIGHT: f64 = 0.4;
const DENSITY_WEIGHT: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacingStrategy {
    Fast,
    #[default]
    Moderate,
    Slow,
    Varied,
}

impl PacingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PacingStrategy::Fast => "fast",
            PacingStrategy::Moderate => "moderate",
            PacingStrategy::Slow => "slow",
            PacingStrategy::Varied => "varied",
        }
    }

    /// Words a reader should get through before a breather.
    pub fn interval(&self) -> u32 {
        match self {
            PacingStrategy::Fast => 300,
            PacingStrategy::Moderate => 200,
            PacingStrategy::Slow => 150,
            PacingStrategy::Varied => 250,
        }
    }

    pub fn target_wpm(&self) -> f64 {
        match self {
            PacingStrategy::Fast => 250.0,
            PacingStrategy::Moderate | PacingStrategy::Varied => 200.0,
            PacingStrategy::Slow => 150.0,
        }
    }

    /// Words per page that counts as completely full for this strategy.
    pub fn reference_words_per_page(&self) -> f64 {
        match self {
            PacingStrategy::Fast => 250.0,
            PacingStrategy::Moderate | PacingStrategy::Varied => 400.0,
            PacingStrategy::Slow => 550.0,
        }
    }
}

impl fmt::Display for PacingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PacingStrategy {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(PacingStrategy::Fast),
            "moderate" => Ok(PacingStrategy::Moderate),
            "slow" => Ok(PacingStrategy::Slow),
            "varied" => Ok(PacingStrategy::Varied),
            _ => Err(EngineError::UnknownPacingStrategy(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Density {
    Sparse,
    Balanced,
    Dense,
    VeryDense,
}

/// Words per page as a share of the strategy's reference band.
fn density_ratio(word_count: u64, page_count: u32, strategy: PacingStrategy) -> f64 {
    word_count as f64 / (page_count.max(1) as f64 * strategy.reference_words_per_page())
}

pub fn classify_density(word_count: u64, page_count: u32, strategy: PacingStrategy) -> Density {
    let ratio = density_ratio(word_count, page_count, strategy);
    if ratio < 0.3 {
        Density::Sparse
    } else if ratio <= 0.5 {
        Density::Balanced
    } else if ratio <= 0.7 {
        Density::Dense
    } else {
        Density::VeryDense
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Breathing points
// ────────────────────────────────────────────────────────────────────────────

/// Word offsets where an unbroken run reaches the strategy's interval.
///
/// Natural breaks (images, headings, whitespace markers) reset the run.
pub fn find_breathing_points(blocks: &[ContentBlock], strategy: PacingStrategy) -> Vec<u64> {
    let interval = u64::from(strategy.interval());
    let mut points = Vec::new();
    let mut offset: u64 = 0;
    let mut since_break: u64 = 0;

    for block in blocks {
        let words = u64::from(block.effective_word_count());
        if block.is_natural_break() {
            offset += words;
            since_break = 0;
            continue;
        }
        let mut remaining = words;
        while since_break + remaining >= interval {
            let take = interval - since_break;
            offset += take;
            remaining -= take;
            points.push(offset);
            since_break = 0;
        }
        offset += remaining;
        since_break += remaining;
    }
    points
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NaturalBreak {
    pub block_id: String,
    pub word_offset: u64,
}

fn natural_breaks(blocks: &[ContentBlock]) -> Vec<NaturalBreak> {
    let mut offset: u64 = 0;
    let mut breaks = Vec::new();
    for block in blocks {
        if block.is_natural_break() {
            breaks.push(NaturalBreak {
                block_id: block.id.clone(),
                word_offset: offset,
            });
        }
        offset += u64::from(block.effective_word_count());
    }
    breaks
}

// ────────────────────────────────────────────────────────────────────────────
// Plan
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PacingSegment {
    pub block_range: BlockRange,
    pub word_count: u64,
    pub density: Density,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PacingPlan {
    pub strategy: PacingStrategy,
    pub total_words: u64,
    pub overall_density: Density,
    pub segments: Vec<PacingSegment>,
    pub breathing_points: Vec<u64>,
    pub natural_breaks: Vec<NaturalBreak>,
    pub tempo_score: f64,
    pub rhythm_score: f64,
    pub density_score: f64,
    pub engagement_score: f64,
}

/// Runs of blocks between natural breaks; a break opens a new segment.
fn segments(blocks: &[ContentBlock], strategy: PacingStrategy) -> Vec<PacingSegment> {
    let mut out = Vec::new();
    let mut start = 0;
    for idx in 1..=blocks.len() {
        if idx == blocks.len() || blocks[idx].is_natural_break() {
            let word_count = blocks[start..idx]
                .iter()
                .map(|b| u64::from(b.effective_word_count()))
                .sum();
            out.push(PacingSegment {
                block_range: BlockRange { start, end: idx },
                word_count,
                density: classify_density(word_count, 1, strategy),
            });
            start = idx;
        }
    }
    out
}

/// Share of neighbouring pairs that differ. Fewer than two items is monotone.
fn alternation<T: PartialEq>(items: &[T]) -> f64 {
    if items.len() < 2 {
        return 0.0;
    }
    let changes = items.windows(2).filter(|w| w[0] != w[1]).count();
    changes as f64 / (items.len() - 1) as f64
}

fn closeness(actual: f64, optimal: f64) -> f64 {
    (1.0 - (actual - optimal).abs() / optimal).clamp(0.0, 1.0)
}

/// Builds the full pacing plan for a block sequence spread over `page_count`
/// pages.
pub fn analyze(blocks: &[ContentBlock], page_count: u32, strategy: PacingStrategy) -> PacingPlan {
    let total_words: u64 = blocks.iter().map(|b| u64::from(b.effective_word_count())).sum();
    let segments = segments(blocks, strategy);
    let natural_breaks = natural_breaks(blocks);

    let minutes = total_words as f64 / BASE_READING_WPM + natural_breaks.len() as f64 * BREAK_PAUSE_MINUTES;
    let tempo_score = if total_words == 0 || minutes <= 0.0 {
        0.0
    } else {
        closeness(total_words as f64 / minutes, strategy.target_wpm())
    };

    let densities: Vec<Density> = segments.iter().map(|s| s.density).collect();
    let types: Vec<_> = blocks.iter().map(|b| b.block_type).collect();
    let rhythm_score = 0.5 * alternation(&densities) + 0.5 * alternation(&types);

    let density_score = closeness(density_ratio(total_words, page_count, strategy), OPTIMAL_DENSITY);

    PacingPlan {
        strategy,
        total_words,
        overall_density: classify_density(total_words, page_count, strategy),
        breathing_points: find_breathing_points(blocks, strategy),
        segments,
        natural_breaks,
        tempo_score,
        rhythm_score,
        density_score,
        engagement_score: TEMPO_WEIGHT * tempo_score
            + RHYTHM_WEIGHT * rhythm_score
            + DENSITY_WEIGHT * density_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document::BlockType;

    fn make_block(id: &str, block_type: BlockType, words: u32) -> ContentBlock {
        ContentBlock {
            id: id.to_string(),
            block_type,
            text: String::new(),
            hierarchy_level: 3,
            word_count: words,
            media_size: None,
        }
    }

    #[test]
    fn test_moderate_600_words_three_breathing_points() {
        let blocks = vec![make_block("p", BlockType::Paragraph, 600)];
        assert_eq!(
            find_breathing_points(&blocks, PacingStrategy::Moderate),
            vec![200, 400, 600]
        );
    }

    #[test]
    fn test_breathing_point_count_is_floor_of_words_over_interval() {
        for strategy in [
            PacingStrategy::Fast,
            PacingStrategy::Moderate,
            PacingStrategy::Slow,
            PacingStrategy::Varied,
        ] {
            for words in [0, 1, 149, 150, 299, 300, 601, 1234] {
                let blocks = vec![make_block("p", BlockType::Paragraph, words)];
                let points = find_breathing_points(&blocks, strategy);
                assert_eq!(points.len() as u32, words / strategy.interval(), "{strategy} {words}");
            }
        }
    }

    #[test]
    fn test_runs_span_paragraphs() {
        let blocks = vec![
            make_block("a", BlockType::Paragraph, 120),
            make_block("b", BlockType::Paragraph, 120),
        ];
        assert_eq!(find_breathing_points(&blocks, PacingStrategy::Moderate), vec![200]);
    }

    #[test]
    fn test_natural_break_resets_counter() {
        let blocks = vec![
            make_block("a", BlockType::Paragraph, 150),
            make_block("img", BlockType::Image, 0),
            make_block("b", BlockType::Paragraph, 150),
            make_block("gap", BlockType::Paragraph, 0),
            make_block("c", BlockType::Paragraph, 250),
        ];
        assert_eq!(find_breathing_points(&blocks, PacingStrategy::Moderate), vec![500]);

        let plan = analyze(&blocks, 1, PacingStrategy::Moderate);
        let breaks: Vec<(&str, u64)> = plan
            .natural_breaks
            .iter()
            .map(|b| (b.block_id.as_str(), b.word_offset))
            .collect();
        assert_eq!(breaks, vec![("img", 150), ("gap", 300)]);
    }

    #[test]
    fn test_offsets_past_u32_range() {
        let blocks = vec![
            make_block("h1", BlockType::Heading, u32::MAX),
            make_block("h2", BlockType::Heading, u32::MAX),
            make_block("a", BlockType::Paragraph, 100),
            make_block("b", BlockType::Paragraph, 150),
        ];
        let before_text = 2 * u64::from(u32::MAX);
        assert_eq!(
            find_breathing_points(&blocks, PacingStrategy::Moderate),
            vec![before_text + 200]
        );

        let plan = analyze(&blocks, 1, PacingStrategy::Moderate);
        assert_eq!(plan.total_words, before_text + 250);
        assert_eq!(plan.natural_breaks[1].word_offset, u64::from(u32::MAX));
        assert_eq!(plan.segments[1].word_count, u64::from(u32::MAX) + 250);
        assert_eq!(plan.overall_density, Density::VeryDense);
        assert!((0.0..=1.0).contains(&plan.engagement_score));
    }

    #[test]
    fn test_segments_split_at_breaks() {
        let blocks = vec![
            make_block("h", BlockType::Heading, 4),
            make_block("a", BlockType::Paragraph, 100),
            make_block("img", BlockType::Image, 0),
            make_block("b", BlockType::Paragraph, 350),
        ];
        let plan = analyze(&blocks, 1, PacingStrategy::Moderate);
        let ranges: Vec<(usize, usize)> = plan
            .segments
            .iter()
            .map(|s| (s.block_range.start, s.block_range.end))
            .collect();
        assert_eq!(ranges, vec![(0, 2), (2, 4)]);
        assert_eq!(plan.segments[0].density, Density::Sparse);
        assert_eq!(plan.segments[1].density, Density::VeryDense);
    }

    #[test]
    fn test_classify_density_bands() {
        let s = PacingStrategy::Moderate;
        assert_eq!(classify_density(100, 1, s), Density::Sparse);
        assert_eq!(classify_density(120, 1, s), Density::Balanced);
        assert_eq!(classify_density(200, 1, s), Density::Balanced);
        assert_eq!(classify_density(280, 1, s), Density::Dense);
        assert_eq!(classify_density(281, 1, s), Density::VeryDense);
        assert_eq!(classify_density(560, 2, s), Density::Dense);
    }

    #[test]
    fn test_unknown_strategy() {
        assert_eq!(
            "glacial".parse::<PacingStrategy>().unwrap_err(),
            EngineError::UnknownPacingStrategy("glacial".to_string())
        );
    }

    #[test]
    fn test_engagement_in_unit_range() {
        let blocks = vec![
            make_block("h", BlockType::Heading, 5),
            make_block("a", BlockType::Paragraph, 180),
            make_block("img", BlockType::Image, 0),
            make_block("b", BlockType::Paragraph, 60),
            make_block("q", BlockType::Quote, 20),
        ];
        let plan = analyze(&blocks, 1, PacingStrategy::Moderate);
        for score in [plan.tempo_score, plan.rhythm_score, plan.density_score, plan.engagement_score] {
            assert!((0.0..=1.0).contains(&score));
        }
        let expected = 0.3 * plan.tempo_score + 0.4 * plan.rhythm_score + 0.3 * plan.density_score;
        assert!((plan.engagement_score - expected).abs() < 1e-12);
        assert_eq!(plan, analyze(&blocks, 1, PacingStrategy::Moderate));
    }

    #[test]
    fn test_single_block_has_no_rhythm() {
        let blocks = vec![make_block("p", BlockType::Paragraph, 160)];
        let plan = analyze(&blocks, 1, PacingStrategy::Moderate);
        assert_eq!(plan.rhythm_score, 0.0);
        // 160 words on one page is exactly the balanced midpoint
        assert!((plan.density_score - 1.0).abs() < 1e-12);
    }
}
