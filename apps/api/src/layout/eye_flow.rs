//! Eye-Flow Optimizer: attention heatmap, focal points and element scoring.
//!
//! Coordinates here are page-relative (`0.0..=1.0` on both axes) so one set of
//! focal-point tables serves every page size.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::layout::alignment::PositionedElement;

pub const DEFAULT_RESOLUTION: usize = 20;

/// Gaussian falloff radius in page-relative units.
const SIGMA: f64 = 0.2;

const HOT_THRESHOLD: f64 = 0.8;
const WARM_THRESHOLD: f64 = 0.6;
const COOL_THRESHOLD: f64 = 0.4;

/// Where a balanced page's visual weight should settle.
const GRAVITY_TARGET_X: f64 = 0.45;
const GRAVITY_TARGET_Y: f64 = 0.40;
const GRAVITY_TOLERANCE: f64 = 0.10;

const HEAT_WEIGHT: f64 = 0.4;
const IMPORTANCE_WEIGHT: f64 = 0.4;
const ALIGNMENT_WEIGHT: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EyeFlowPattern {
    Z,
    F,
    Gutenberg,
    Auto,
}

impl EyeFlowPattern {
    /// Replaces `Auto` with a concrete pattern: Z for image-led pages, F for
    /// text-led ones.
    pub fn resolve(self, image_dominant: bool) -> EyeFlowPattern {
        match self {
            EyeFlowPattern::Auto if image_dominant => EyeFlowPattern::Z,
            EyeFlowPattern::Auto => EyeFlowPattern::F,
            concrete => concrete,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EyeFlowPattern::Z => "z",
            EyeFlowPattern::F => "f",
            EyeFlowPattern::Gutenberg => "gutenberg",
            EyeFlowPattern::Auto => "auto",
        }
    }
}

impl fmt::Display for EyeFlowPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EyeFlowPattern {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "z" => Ok(EyeFlowPattern::Z),
            "f" => Ok(EyeFlowPattern::F),
            "gutenberg" => Ok(EyeFlowPattern::Gutenberg),
            "auto" => Ok(EyeFlowPattern::Auto),
            _ => Err(EngineError::UnknownEyeFlowPattern(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocalPoint {
    pub label: String,
    pub x: f64,
    pub y: f64,
    pub weight: f64,
}

fn focal(label: &str, x: f64, y: f64, weight: f64) -> FocalPoint {
    FocalPoint {
        label: label.to_string(),
        x,
        y,
        weight,
    }
}

/// Anchor points for a reading pattern, in reading order.
pub fn select_focal_points(pattern: EyeFlowPattern, image_dominant: bool) -> Vec<FocalPoint> {
    match pattern.resolve(image_dominant) {
        EyeFlowPattern::Z => vec![
            focal("entry", 0.10, 0.10, 1.0),
            focal("top-right", 0.90, 0.10, 0.8),
            focal("diagonal-end", 0.10, 0.90, 0.6),
            focal("terminal", 0.90, 0.90, 0.9),
        ],
        EyeFlowPattern::F => vec![
            focal("first-scan", 0.15, 0.12, 1.0),
            focal("first-scan-end", 0.75, 0.12, 0.7),
            focal("second-scan", 0.45, 0.38, 0.6),
            focal("left-stem", 0.10, 0.70, 0.5),
        ],
        // Auto never survives `resolve`; Gutenberg is the remaining case.
        _ => vec![
            focal("primary-optical", 0.15, 0.15, 1.0),
            focal("strong-fallow", 0.85, 0.15, 0.6),
            focal("weak-fallow", 0.15, 0.85, 0.4),
            focal("terminal-anchor", 0.85, 0.85, 0.9),
        ],
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Heatmap
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeatZone {
    Hot,
    Warm,
    Cool,
    Cold,
}

impl HeatZone {
    pub fn classify(value: f64) -> HeatZone {
        if value >= HOT_THRESHOLD {
            HeatZone::Hot
        } else if value >= WARM_THRESHOLD {
            HeatZone::Warm
        } else if value >= COOL_THRESHOLD {
            HeatZone::Cool
        } else {
            HeatZone::Cold
        }
    }
}

/// Dense row-major grid of normalized attention values.
#[derive(Debug, Clone, PartialEq)]
pub struct Heatmap {
    cols: usize,
    rows: usize,
    page_width: f64,
    page_height: f64,
    cells: Vec<f64>,
}

impl Heatmap {
    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cell(&self, col: usize, row: usize) -> f64 {
        self.cells[row * self.cols + col]
    }

    pub fn max(&self) -> f64 {
        self.cells.iter().cloned().fold(0.0, f64::max)
    }

    /// Value of the cell containing the page-relative point `(rx, ry)`.
    pub fn sample_relative(&self, rx: f64, ry: f64) -> f64 {
        let col = ((rx.clamp(0.0, 1.0) * self.cols as f64) as usize).min(self.cols - 1);
        let row = ((ry.clamp(0.0, 1.0) * self.rows as f64) as usize).min(self.rows - 1);
        self.cell(col, row)
    }

    /// Value of the cell containing the point `(x, y)` in page points.
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        self.sample_relative(x / self.page_width, y / self.page_height)
    }

    pub fn zone_at(&self, x: f64, y: f64) -> HeatZone {
        HeatZone::classify(self.sample(x, y))
    }
}

/// Sums a weighted Gaussian per focal point at every cell centre, then
/// normalizes by the maximum. Without focal points every cell is zero.
pub fn build_heatmap(
    page_width: f64,
    page_height: f64,
    focal_points: &[FocalPoint],
    cols: usize,
    rows: usize,
) -> Result<Heatmap, EngineError> {
    if !(page_width > 0.0 && page_height > 0.0) {
        return Err(EngineError::InvalidConstraint(format!(
            "heatmap page must have positive size, got {page_width}x{page_height}"
        )));
    }
    if cols == 0 || rows == 0 {
        return Err(EngineError::InvalidInput(
            "heatmap resolution must be at least 1x1".to_string(),
        ));
    }

    let two_sigma_sq = 2.0 * SIGMA * SIGMA;
    let mut cells = vec![0.0; cols * rows];
    for row in 0..rows {
        let cy = (row as f64 + 0.5) / rows as f64;
        for col in 0..cols {
            let cx = (col as f64 + 0.5) / cols as f64;
            cells[row * cols + col] = focal_points
                .iter()
                .map(|fp| {
                    let d_sq = (cx - fp.x).powi(2) + (cy - fp.y).powi(2);
                    fp.weight * (-d_sq / two_sigma_sq).exp()
                })
                .sum();
        }
    }

    let max = cells.iter().cloned().fold(0.0, f64::max);
    if max > 0.0 {
        for value in cells.iter_mut() {
            *value = (*value / max).clamp(0.0, 1.0);
        }
    }

    Ok(Heatmap {
        cols,
        rows,
        page_width,
        page_height,
        cells,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Scoring
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EyeFlowScore {
    pub block_id: String,
    pub heat: f64,
    pub importance: f64,
    pub alignment_score: f64,
    pub overall: f64,
    pub zone: HeatZone,
}

/// Level 1 → 1.0, falling by 0.2 per level down to 0.
pub fn importance(hierarchy_level: u8) -> f64 {
    (1.0 - (hierarchy_level as f64 - 1.0) / 5.0).clamp(0.0, 1.0)
}

/// Scores how well an element's attention matches its importance.
pub fn score_element(
    element: &PositionedElement,
    heatmap: &Heatmap,
    hierarchy_level: u8,
) -> EyeFlowScore {
    let center = element.rect().center();
    let heat = heatmap.sample(center.x, center.y);
    let importance = importance(hierarchy_level);
    let alignment_score = 1.0 - (heat - importance).abs();
    EyeFlowScore {
        block_id: element.block_id.clone(),
        heat,
        importance,
        alignment_score,
        overall: HEAT_WEIGHT * heat + IMPORTANCE_WEIGHT * importance + ALIGNMENT_WEIGHT * alignment_score,
        zone: HeatZone::classify(heat),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingGravity {
    pub x: f64,
    pub y: f64,
    pub target_x: f64,
    pub target_y: f64,
    pub deviation_x: f64,
    pub deviation_y: f64,
    pub imbalanced: bool,
}

/// Area × importance weighted centroid, page-relative.
pub fn reading_gravity(
    elements: &[PositionedElement],
    page_width: f64,
    page_height: f64,
) -> ReadingGravity {
    let (mut sum_x, mut sum_y, mut total) = (0.0, 0.0, 0.0);
    for el in elements {
        let weight = el.rect().area() * importance(el.hierarchy_level);
        let center = el.rect().center();
        sum_x += center.x / page_width * weight;
        sum_y += center.y / page_height * weight;
        total += weight;
    }
    let (x, y) = if total > 0.0 {
        (sum_x / total, sum_y / total)
    } else {
        (GRAVITY_TARGET_X, GRAVITY_TARGET_Y)
    };
    let deviation_x = x - GRAVITY_TARGET_X;
    let deviation_y = y - GRAVITY_TARGET_Y;
    ReadingGravity {
        x,
        y,
        target_x: GRAVITY_TARGET_X,
        target_y: GRAVITY_TARGET_Y,
        deviation_x,
        deviation_y,
        imbalanced: deviation_x.abs() > GRAVITY_TOLERANCE || deviation_y.abs() > GRAVITY_TOLERANCE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::alignment::{OpticalOffset, ShapeKind};
    use crate::models::document::BlockType;

    fn make_element(id: &str, x: f64, y: f64, w: f64, h: f64, level: u8) -> PositionedElement {
        PositionedElement {
            block_id: id.to_string(),
            block_type: BlockType::Paragraph,
            x,
            y,
            width: w,
            height: h,
            hierarchy_level: level,
            shape: ShapeKind::Rectangle,
            group: None,
            optical_offset: OpticalOffset::default(),
        }
    }

    fn make_heatmap(pattern: EyeFlowPattern) -> Heatmap {
        let points = select_focal_points(pattern, false);
        build_heatmap(595.0, 842.0, &points, DEFAULT_RESOLUTION, DEFAULT_RESOLUTION).unwrap()
    }

    #[test]
    fn test_heatmap_values_normalized() {
        for pattern in [EyeFlowPattern::Z, EyeFlowPattern::F, EyeFlowPattern::Gutenberg] {
            let heatmap = make_heatmap(pattern);
            assert_eq!(heatmap.cols(), 20);
            assert_eq!(heatmap.rows(), 20);
            assert!((heatmap.max() - 1.0).abs() < 1e-12);
            for row in 0..heatmap.rows() {
                for col in 0..heatmap.cols() {
                    let v = heatmap.cell(col, row);
                    assert!((0.0..=1.0).contains(&v));
                }
            }
        }
    }

    #[test]
    fn test_heatmap_without_focal_points_is_zero() {
        let heatmap = build_heatmap(595.0, 842.0, &[], 10, 10).unwrap();
        assert_eq!(heatmap.max(), 0.0);
    }

    #[test]
    fn test_heatmap_rejects_zero_resolution() {
        assert!(build_heatmap(595.0, 842.0, &[], 0, 10).is_err());
    }

    #[test]
    fn test_z_pattern_hot_at_entry_cold_at_centre() {
        let heatmap = make_heatmap(EyeFlowPattern::Z);
        assert_eq!(heatmap.zone_at(0.1 * 595.0, 0.1 * 842.0), HeatZone::Hot);
        assert!(heatmap.sample_relative(0.5, 0.5) < heatmap.sample_relative(0.1, 0.1));
    }

    #[test]
    fn test_auto_resolves_by_image_dominance() {
        assert_eq!(EyeFlowPattern::Auto.resolve(true), EyeFlowPattern::Z);
        assert_eq!(EyeFlowPattern::Auto.resolve(false), EyeFlowPattern::F);
        assert_eq!(EyeFlowPattern::Gutenberg.resolve(true), EyeFlowPattern::Gutenberg);
        let points = select_focal_points(EyeFlowPattern::Auto, true);
        assert_eq!(points, select_focal_points(EyeFlowPattern::Z, false));
    }

    #[test]
    fn test_focal_points_count() {
        for pattern in [EyeFlowPattern::Z, EyeFlowPattern::F, EyeFlowPattern::Gutenberg] {
            let points = select_focal_points(pattern, false);
            assert!((2..=4).contains(&points.len()));
        }
    }

    #[test]
    fn test_unknown_pattern() {
        assert_eq!(
            "spiral".parse::<EyeFlowPattern>().unwrap_err(),
            EngineError::UnknownEyeFlowPattern("spiral".to_string())
        );
        assert_eq!("Z".parse::<EyeFlowPattern>().unwrap(), EyeFlowPattern::Z);
    }

    #[test]
    fn test_score_element_weights() {
        let heatmap = make_heatmap(EyeFlowPattern::Z);
        let el = make_element("h1", 40.0, 60.0, 40.0, 40.0, 1);
        let score = score_element(&el, &heatmap, 1);
        assert_eq!(score.importance, 1.0);
        let expected = 0.4 * score.heat + 0.4 + 0.2 * (1.0 - (score.heat - 1.0).abs());
        assert!((score.overall - expected).abs() < 1e-12);
        assert!((0.0..=1.0).contains(&score.alignment_score));
    }

    #[test]
    fn test_importance_clamps() {
        assert_eq!(importance(1), 1.0);
        assert!((importance(3) - 0.6).abs() < 1e-12);
        assert_eq!(importance(6), 0.0);
        assert_eq!(importance(9), 0.0);
    }

    #[test]
    fn test_reading_gravity_balanced_and_imbalanced() {
        let centred = vec![make_element("a", 0.35 * 595.0, 0.30 * 842.0, 0.2 * 595.0, 0.2 * 842.0, 1)];
        let gravity = reading_gravity(&centred, 595.0, 842.0);
        assert!((gravity.x - 0.45).abs() < 1e-9);
        assert!((gravity.y - 0.40).abs() < 1e-9);
        assert!(!gravity.imbalanced);

        let corner = vec![make_element("b", 500.0, 740.0, 80.0, 80.0, 1)];
        assert!(reading_gravity(&corner, 595.0, 842.0).imbalanced);
    }
}
