//! Layout quality metrics. Scores are on a 0–10 scale; ratios stay in 0–1.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::layout::alignment::{clean_fraction, AlignmentIssue, PositionedElement};
use crate::layout::grid::GridType;
use crate::layout::placement::whitespace_ratio;
use crate::models::document::BlockType;
use crate::models::geometry::Rect;

/// Variance of quadrant shares when all weight sits in one quadrant.
pub const MAX_QUADRANT_VARIANCE: f64 = 0.1875;
const IMAGE_WEIGHT_FACTOR: f64 = 1.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutMetrics {
    pub balance: f64,
    pub harmony: f64,
    pub hierarchy: f64,
    pub whitespace_ratio: f64,
    pub alignment_score: f64,
}

/// Hierarchy weight: level 1 counts 2.25×, each deeper level a quarter less,
/// never below 1.
fn hierarchy_weight(level: u8) -> f64 {
    1.0 + (6.0 - level.min(6) as f64) * 0.25
}

/// Visual weight per page quadrant (TL, TR, BL, BR).
pub fn quadrant_weights(elements: &[PositionedElement], page_width: f64, page_height: f64) -> [f64; 4] {
    let (hw, hh) = (page_width / 2.0, page_height / 2.0);
    let quadrants = [
        Rect::new(0.0, 0.0, hw, hh),
        Rect::new(hw, 0.0, hw, hh),
        Rect::new(0.0, hh, hw, hh),
        Rect::new(hw, hh, hw, hh),
    ];
    let mut weights = [0.0; 4];
    for el in elements {
        let factor = hierarchy_weight(el.hierarchy_level)
            * if el.block_type == BlockType::Image {
                IMAGE_WEIGHT_FACTOR
            } else {
                1.0
            };
        let rect = el.rect();
        for (weight, quadrant) in weights.iter_mut().zip(&quadrants) {
            *weight += rect.intersection_area(quadrant) * factor;
        }
    }
    weights
}

/// Variance of each quadrant's share of the total weight; 0 is perfectly even.
pub fn quadrant_variance(weights: &[f64; 4]) -> f64 {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    weights
        .iter()
        .map(|w| (w / total - 0.25).powi(2))
        .sum::<f64>()
        / 4.0
}

pub fn balance_score(variance: f64) -> f64 {
    (10.0 * (1.0 - variance / MAX_QUADRANT_VARIANCE)).clamp(0.0, 10.0)
}

pub fn harmony_score(grid_type: GridType) -> f64 {
    match grid_type {
        GridType::Golden => 9.5,
        GridType::Swiss12 => 8.0,
        GridType::Modular | GridType::Manuscript => 7.5,
        GridType::Custom => 7.0,
    }
}

/// Three to five distinct levels read best.
pub fn hierarchy_score(distinct_levels: usize) -> f64 {
    match distinct_levels {
        0 => 0.0,
        1 => 4.0,
        2 => 7.0,
        3..=5 => 10.0,
        n => (10.0 - (n - 5) as f64 * 1.5).clamp(0.0, 10.0),
    }
}

pub fn compute(
    elements: &[PositionedElement],
    issues: &[AlignmentIssue],
    grid_type: GridType,
    page_width: f64,
    page_height: f64,
) -> LayoutMetrics {
    let variance = quadrant_variance(&quadrant_weights(elements, page_width, page_height));
    let levels: BTreeSet<u8> = elements.iter().map(|el| el.hierarchy_level).collect();
    LayoutMetrics {
        balance: balance_score(variance),
        harmony: harmony_score(grid_type),
        hierarchy: hierarchy_score(levels.len()),
        whitespace_ratio: whitespace_ratio(elements, page_width, page_height),
        alignment_score: clean_fraction(elements, issues),
    }
}
