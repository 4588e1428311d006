//! Alignment Engine: grid snapping, optical correction and issue detection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::layout::grid::Grid;
use crate::models::document::BlockType;
use crate::models::geometry::{Axis, Rect};

/// Edges closer than this (but not equal) count as a near miss.
const NEAR_MISS_EPSILON: f64 = 3.0;
/// Below this difference two coordinates are treated as identical.
const EQUALITY_EPSILON: f64 = 1e-6;
/// Gap variance (pt²) above which a set is unevenly distributed.
const DISTRIBUTION_VARIANCE_THRESHOLD: f64 = 4.0;
/// Relative size difference under which two sizes "should" match.
const SIZE_MISMATCH_TOLERANCE: f64 = 0.10;

/// Perceptual shape category of an element's visible content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShapeKind {
    #[default]
    Rectangle,
    Circle,
    Angular,
    RoundedRect,
    Text,
}

impl ShapeKind {
    /// Offset from geometric to perceived centre, as a fraction of the box.
    pub fn optical_offset(&self, width: f64, height: f64) -> OpticalOffset {
        let (dx, dy) = match self {
            ShapeKind::Rectangle => (0.0, 0.0),
            ShapeKind::Circle => (0.0, -0.03 * height),
            ShapeKind::Angular => (0.05 * width, 0.0),
            ShapeKind::RoundedRect => (0.0, -0.02 * height),
            ShapeKind::Text => (0.0, -0.05 * height),
        };
        OpticalOffset { dx, dy }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OpticalOffset {
    pub dx: f64,
    pub dy: f64,
}

/// The mutable working unit of a layout run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionedElement {
    pub block_id: String,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub hierarchy_level: u8,
    pub shape: ShapeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default)]
    pub optical_offset: OpticalOffset,
}

impl PositionedElement {
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    fn start(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Horizontal => self.x,
            Axis::Vertical => self.y,
        }
    }

    fn set_start(&mut self, axis: Axis, value: f64) {
        match axis {
            Axis::Horizontal => self.x = value,
            Axis::Vertical => self.y = value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IssueKind {
    NearMiss,
    UnevenDistribution,
    SizeMismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustedProperty {
    X,
    Y,
    Width,
    Height,
}

/// One concrete change that would resolve an issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Adjustment {
    pub block_id: String,
    pub property: AdjustedProperty,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignmentIssue {
    pub kind: IssueKind,
    pub block_ids: Vec<String>,
    pub message: String,
    pub suggestion: Vec<Adjustment>,
}

// ────────────────────────────────────────────────────────────────────────────
// Snapping
// ────────────────────────────────────────────────────────────────────────────

/// Snaps every element's left/right edges to columns and its top to the
/// baseline grid, then records the shape's optical offset.
pub fn align(elements: &mut [PositionedElement], grid: &Grid) {
    for el in elements.iter_mut() {
        let left = grid.snap_to_column(el.x);
        let right = grid.snap_to_column(el.x + el.width);
        if right > left {
            el.width = right - left;
        }
        el.x = left;
        el.y = grid.snap_to_baseline(el.y);
        el.optical_offset = el.shape.optical_offset(el.width, el.height);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Detection
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
enum Edge {
    Left,
    Right,
    Top,
    Bottom,
}

impl Edge {
    const ALL: [Edge; 4] = [Edge::Left, Edge::Right, Edge::Top, Edge::Bottom];

    fn name(&self) -> &'static str {
        match self {
            Edge::Left => "left",
            Edge::Right => "right",
            Edge::Top => "top",
            Edge::Bottom => "bottom",
        }
    }

    fn value(&self, el: &PositionedElement) -> f64 {
        match self {
            Edge::Left => el.x,
            Edge::Right => el.x + el.width,
            Edge::Top => el.y,
            Edge::Bottom => el.y + el.height,
        }
    }

    /// Moves `el` so this edge lands on `target`, keeping its size.
    fn adjustment(&self, el: &PositionedElement, target: f64) -> Adjustment {
        let (property, value) = match self {
            Edge::Left => (AdjustedProperty::X, target),
            Edge::Right => (AdjustedProperty::X, target - el.width),
            Edge::Top => (AdjustedProperty::Y, target),
            Edge::Bottom => (AdjustedProperty::Y, target - el.height),
        };
        Adjustment {
            block_id: el.block_id.clone(),
            property,
            value,
        }
    }
}

/// Finds near-miss edges, uneven spacing inside groups, and near-equal sizes
/// inside groups. Output order follows element order.
pub fn detect_issues(elements: &[PositionedElement]) -> Vec<AlignmentIssue> {
    let mut issues = near_misses(elements);

    for members in groups(elements).values() {
        if let Some(issue) = uneven_distribution(elements, members) {
            issues.push(issue);
        }
        issues.extend(size_mismatches(elements, members));
    }
    issues
}

fn near_misses(elements: &[PositionedElement]) -> Vec<AlignmentIssue> {
    let mut issues = Vec::new();
    for (i, anchor) in elements.iter().enumerate() {
        for other in &elements[i + 1..] {
            for edge in Edge::ALL {
                let a = edge.value(anchor);
                let b = edge.value(other);
                let diff = (a - b).abs();
                if diff > EQUALITY_EPSILON && diff < NEAR_MISS_EPSILON {
                    issues.push(AlignmentIssue {
                        kind: IssueKind::NearMiss,
                        block_ids: vec![anchor.block_id.clone(), other.block_id.clone()],
                        message: format!(
                            "{} edges of '{}' and '{}' differ by {diff:.2}pt",
                            edge.name(),
                            anchor.block_id,
                            other.block_id
                        ),
                        suggestion: vec![edge.adjustment(other, a)],
                    });
                }
            }
        }
    }
    issues
}

/// Element indices per group tag, in element order.
fn groups(elements: &[PositionedElement]) -> BTreeMap<&str, Vec<usize>> {
    let mut map: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (idx, el) in elements.iter().enumerate() {
        if let Some(group) = el.group.as_deref() {
            map.entry(group).or_default().push(idx);
        }
    }
    map
}

/// The axis along which a set is laid out: the one its centres spread over most.
fn dominant_axis(elements: &[PositionedElement], members: &[usize]) -> Axis {
    let spread = |f: fn(&PositionedElement) -> f64| {
        let values: Vec<f64> = members.iter().map(|&i| f(&elements[i])).collect();
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        max - min
    };
    let dx = spread(|e| e.rect().center().x);
    let dy = spread(|e| e.rect().center().y);
    if dy > dx {
        Axis::Vertical
    } else {
        Axis::Horizontal
    }
}

fn sorted_along(elements: &[PositionedElement], members: &[usize], axis: Axis) -> Vec<usize> {
    let mut order = members.to_vec();
    order.sort_by(|&a, &b| {
        elements[a]
            .start(axis)
            .partial_cmp(&elements[b].start(axis))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });
    order
}

fn uneven_distribution(elements: &[PositionedElement], members: &[usize]) -> Option<AlignmentIssue> {
    if members.len() < 3 {
        return None;
    }
    let axis = dominant_axis(elements, members);
    let order = sorted_along(elements, members, axis);
    let gaps: Vec<f64> = order
        .windows(2)
        .map(|pair| {
            let (start, len) = elements[pair[0]].rect().extent(axis);
            elements[pair[1]].start(axis) - (start + len)
        })
        .collect();
    let mean = gaps.iter().sum::<f64>() / gaps.len() as f64;
    let variance = gaps.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / gaps.len() as f64;
    if variance <= DISTRIBUTION_VARIANCE_THRESHOLD {
        return None;
    }

    let mut proposed: Vec<PositionedElement> = order.iter().map(|&i| elements[i].clone()).collect();
    distribute(&mut proposed, axis);
    let property = match axis {
        Axis::Horizontal => AdjustedProperty::X,
        Axis::Vertical => AdjustedProperty::Y,
    };
    let suggestion = proposed
        .iter()
        .zip(&order)
        .filter(|(el, i)| (el.start(axis) - elements[**i].start(axis)).abs() > EQUALITY_EPSILON)
        .map(|(el, _)| Adjustment {
            block_id: el.block_id.clone(),
            property,
            value: el.start(axis),
        })
        .collect();

    Some(AlignmentIssue {
        kind: IssueKind::UnevenDistribution,
        block_ids: order.iter().map(|&i| elements[i].block_id.clone()).collect(),
        message: format!("gap variance {variance:.2}pt² exceeds {DISTRIBUTION_VARIANCE_THRESHOLD}pt²"),
        suggestion,
    })
}

fn size_mismatches(elements: &[PositionedElement], members: &[usize]) -> Vec<AlignmentIssue> {
    let Some((&first, rest)) = members.split_first() else {
        return Vec::new();
    };
    let reference = &elements[first];
    let mut issues = Vec::new();
    for &idx in rest {
        let el = &elements[idx];
        for (property, want, have) in [
            (AdjustedProperty::Width, reference.width, el.width),
            (AdjustedProperty::Height, reference.height, el.height),
        ] {
            let diff = (want - have).abs();
            let relative = diff / want.max(have).max(EQUALITY_EPSILON);
            if diff > EQUALITY_EPSILON && relative <= SIZE_MISMATCH_TOLERANCE {
                issues.push(AlignmentIssue {
                    kind: IssueKind::SizeMismatch,
                    block_ids: vec![reference.block_id.clone(), el.block_id.clone()],
                    message: format!(
                        "'{}' is {:.1}% off '{}' in a matched set",
                        el.block_id,
                        relative * 100.0,
                        reference.block_id
                    ),
                    suggestion: vec![Adjustment {
                        block_id: el.block_id.clone(),
                        property,
                        value: want,
                    }],
                });
            }
        }
    }
    issues
}

// ────────────────────────────────────────────────────────────────────────────
// Distribution
// ────────────────────────────────────────────────────────────────────────────

/// Equalizes gaps along `axis`, keeping the first and last element in place.
/// Fewer than three elements is a no-op.
pub fn distribute(elements: &mut [PositionedElement], axis: Axis) {
    if elements.len() < 3 {
        return;
    }
    let all: Vec<usize> = (0..elements.len()).collect();
    let order = sorted_along(elements, &all, axis);

    let first = elements[order[0]].start(axis);
    let (last_start, last_len) = elements[order[order.len() - 1]].rect().extent(axis);
    let span = last_start + last_len - first;
    let occupied: f64 = order
        .iter()
        .map(|&i| elements[i].rect().extent(axis).1)
        .sum();
    let gap = (span - occupied) / (order.len() - 1) as f64;

    let mut cursor = first;
    for &idx in &order[..order.len() - 1] {
        elements[idx].set_start(axis, cursor);
        cursor += elements[idx].rect().extent(axis).1 + gap;
    }
}

/// Fraction of elements not named by any issue.
pub fn clean_fraction(elements: &[PositionedElement], issues: &[AlignmentIssue]) -> f64 {
    if elements.is_empty() {
        return 1.0;
    }
    let clean = elements
        .iter()
        .filter(|el| !issues.iter().any(|i| i.block_ids.contains(&el.block_id)))
        .count();
    clean as f64 / elements.len() as f64
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::grid::{generate, GridOptions, GridType};

    fn make_element(id: &str, x: f64, y: f64, w: f64, h: f64) -> PositionedElement {
        PositionedElement {
            block_id: id.to_string(),
            block_type: BlockType::Paragraph,
            x,
            y,
            width: w,
            height: h,
            hierarchy_level: 3,
            shape: ShapeKind::Rectangle,
            group: None,
            optical_offset: OpticalOffset::default(),
        }
    }

    fn grouped(mut el: PositionedElement, group: &str) -> PositionedElement {
        el.group = Some(group.to_string());
        el
    }

    #[test]
    fn test_optical_offsets_per_shape() {
        assert_eq!(
            ShapeKind::Circle.optical_offset(100.0, 100.0),
            OpticalOffset { dx: 0.0, dy: -3.0 }
        );
        assert_eq!(
            ShapeKind::Angular.optical_offset(100.0, 50.0),
            OpticalOffset { dx: 5.0, dy: 0.0 }
        );
        assert_eq!(
            ShapeKind::RoundedRect.optical_offset(100.0, 100.0),
            OpticalOffset { dx: 0.0, dy: -2.0 }
        );
        assert_eq!(
            ShapeKind::Text.optical_offset(100.0, 40.0),
            OpticalOffset { dx: 0.0, dy: -2.0 }
        );
        assert_eq!(
            ShapeKind::Rectangle.optical_offset(100.0, 40.0),
            OpticalOffset::default()
        );
    }

    #[test]
    fn test_align_snaps_edges_and_records_offset() {
        let grid = generate(GridType::Swiss12, 595.0, 842.0, &GridOptions::default()).unwrap();
        let mut elements = vec![make_element("a", 43.0, 55.0, 100.0, 40.0)];
        elements[0].shape = ShapeKind::Text;
        align(&mut elements, &grid);
        assert_eq!(elements[0].x, 40.0);
        assert_eq!(elements[0].y, 52.0);
        assert_eq!(elements[0].optical_offset.dy, -0.05 * elements[0].height);
    }

    #[test]
    fn test_align_empty_is_noop() {
        let grid = generate(GridType::Swiss12, 595.0, 842.0, &GridOptions::default()).unwrap();
        let mut elements: Vec<PositionedElement> = vec![];
        align(&mut elements, &grid);
        assert!(elements.is_empty());
        assert!(detect_issues(&elements).is_empty());
    }

    #[test]
    fn test_near_miss_detected_with_suggestion() {
        let elements = vec![
            make_element("a", 40.0, 40.0, 100.0, 50.0),
            make_element("b", 41.5, 200.0, 100.0, 50.0),
        ];
        let issues = detect_issues(&elements);
        let near: Vec<_> = issues
            .iter()
            .filter(|i| i.kind == IssueKind::NearMiss)
            .collect();
        // left and right edges both miss by 1.5pt
        assert_eq!(near.len(), 2);
        assert_eq!(near[0].suggestion[0].block_id, "b");
        assert_eq!(near[0].suggestion[0].value, 40.0);
    }

    #[test]
    fn test_exactly_aligned_edges_are_not_issues() {
        let elements = vec![
            make_element("a", 40.0, 40.0, 100.0, 50.0),
            make_element("b", 40.0, 200.0, 100.0, 50.0),
        ];
        assert!(detect_issues(&elements).is_empty());
        assert_eq!(clean_fraction(&elements, &[]), 1.0);
    }

    #[test]
    fn test_uneven_distribution_in_group() {
        let elements = vec![
            grouped(make_element("a", 40.0, 100.0, 50.0, 50.0), "row"),
            grouped(make_element("b", 100.0, 100.0, 50.0, 50.0), "row"),
            grouped(make_element("c", 300.0, 100.0, 50.0, 50.0), "row"),
        ];
        let issues = detect_issues(&elements);
        let uneven = issues
            .iter()
            .find(|i| i.kind == IssueKind::UnevenDistribution)
            .expect("uneven distribution issue");
        assert_eq!(uneven.block_ids, vec!["a", "b", "c"]);
        assert_eq!(uneven.suggestion.len(), 1);
        assert_eq!(uneven.suggestion[0].block_id, "b");
        assert_eq!(uneven.suggestion[0].property, AdjustedProperty::X);
        assert_eq!(uneven.suggestion[0].value, 170.0);
    }

    #[test]
    fn test_size_mismatch_in_group() {
        let elements = vec![
            grouped(make_element("a", 40.0, 100.0, 100.0, 60.0), "cards"),
            grouped(make_element("b", 200.0, 100.0, 95.0, 60.0), "cards"),
            grouped(make_element("c", 360.0, 100.0, 50.0, 60.0), "cards"),
        ];
        let issues = detect_issues(&elements);
        let mismatches: Vec<_> = issues
            .iter()
            .filter(|i| i.kind == IssueKind::SizeMismatch)
            .collect();
        // b is 5% narrower; c is far off and clearly intentional
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].suggestion[0].block_id, "b");
        assert_eq!(mismatches[0].suggestion[0].value, 100.0);
    }

    #[test]
    fn test_distribute_equalizes_gaps_and_keeps_ends() {
        let mut elements = vec![
            make_element("a", 0.0, 0.0, 10.0, 10.0),
            make_element("c", 90.0, 0.0, 10.0, 10.0),
            make_element("b", 20.0, 0.0, 10.0, 10.0),
        ];
        distribute(&mut elements, Axis::Horizontal);
        assert_eq!(elements[0].x, 0.0);
        assert_eq!(elements[1].x, 90.0);
        assert_eq!(elements[2].x, 45.0);
    }

    #[test]
    fn test_distribute_fewer_than_three_is_noop() {
        let mut elements = vec![
            make_element("a", 0.0, 0.0, 10.0, 10.0),
            make_element("b", 50.0, 0.0, 10.0, 10.0),
        ];
        let before = elements.clone();
        distribute(&mut elements, Axis::Vertical);
        assert_eq!(elements, before);
    }

    #[test]
    fn test_clean_fraction_counts_flagged_elements() {
        let elements = vec![
            make_element("a", 40.0, 40.0, 100.0, 50.0),
            make_element("b", 41.0, 200.0, 100.0, 50.0),
            make_element("c", 300.0, 400.0, 20.0, 20.0),
        ];
        let issues = detect_issues(&elements);
        assert!((clean_fraction(&elements, &issues) - 1.0 / 3.0).abs() < 1e-9);
    }
}
