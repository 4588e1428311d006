//! Golden Ratio Engine: pure proportion math used by the grid and the architect.
//!
//! Every function is side-effect free. The only failure mode is input
//! validation (`EngineError::InvalidInput`).

use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::models::document::Margins;
use crate::models::geometry::{Axis, Rect};

/// φ = (1 + √5) / 2
pub const PHI: f64 = 1.618_033_988_749_895;

/// Scale values are rounded to the nearest half unit.
const SCALE_STEP: f64 = 0.5;

/// Result of dividing a length into golden proportions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GoldenSplit {
    pub major: f64,
    pub minor: f64,
}

/// Equal spacing for `count` elements laid out along an available length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpacingPlan {
    pub spacing: f64,
    pub total_element_space: f64,
    pub remaining_space: f64,
}

// ────────────────────────────────────────────────────────────────────────────
// Length subdivision
// ────────────────────────────────────────────────────────────────────────────

/// Splits `length` so that `major / minor ≈ φ` and `major + minor == length`.
pub fn split(length: f64) -> Result<GoldenSplit, EngineError> {
    require_positive("length", length)?;
    let major = length / PHI;
    Ok(GoldenSplit {
        major,
        minor: length - major,
    })
}

/// Column widths following nested golden subdivisions.
///
/// - `n = 2`: `[0.618·w, 0.382·w]`
/// - `n = 3`: the minor part is split again, `[0.618·w, 0.236·w, 0.146·w]`
pub fn column_split(total_width: f64, n: usize) -> Result<Vec<f64>, EngineError> {
    let first = split(total_width)?;
    match n {
        2 => Ok(vec![first.major, first.minor]),
        3 => {
            let second = split(first.minor)?;
            Ok(vec![first.major, second.major, second.minor])
        }
        other => Err(EngineError::InvalidInput(format!(
            "golden column split supports 2 or 3 columns, got {other}"
        ))),
    }
}

/// Divides a rectangle along `axis` into its (major, minor) golden parts.
///
/// `Horizontal` splits the width (left major, right minor); `Vertical` splits
/// the height (top major, bottom minor).
pub fn split_rect(rect: &Rect, axis: Axis) -> Result<(Rect, Rect), EngineError> {
    match axis {
        Axis::Horizontal => {
            let parts = split(rect.width)?;
            Ok((
                Rect::new(rect.x, rect.y, parts.major, rect.height),
                Rect::new(rect.x + parts.major, rect.y, parts.minor, rect.height),
            ))
        }
        Axis::Vertical => {
            let parts = split(rect.height)?;
            Ok((
                Rect::new(rect.x, rect.y, rect.width, parts.major),
                Rect::new(rect.x, rect.y + parts.major, rect.width, parts.minor),
            ))
        }
    }
}

/// Height of a golden rectangle with the given width.
pub fn golden_height(width: f64) -> Result<f64, EngineError> {
    require_positive("width", width)?;
    Ok(width / PHI)
}

/// Page margins derived from the page width: the minor part of the width
/// reduced by φ³ for the sides and top, one φ step deeper at the bottom.
pub fn golden_margins(page_width: f64) -> Result<Margins, EngineError> {
    let side = split(page_width)?.minor / PHI.powi(3);
    Ok(Margins {
        top: side,
        right: side,
        bottom: side * PHI,
        left: side,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Scales
// ────────────────────────────────────────────────────────────────────────────

/// Modular type scale: `base·φ^i` for `i ∈ [-2, levels-3]`, rounded to 0.5.
///
/// Index 2 is always `base` itself (when `levels ≥ 3`).
pub fn type_scale(base: f64, levels: usize) -> Result<Vec<f64>, EngineError> {
    phi_sequence(base, levels)
}

/// Spacing scale for section / element / paragraph gaps. Same recurrence as
/// [`type_scale`], so tier 2 is the base gap.
pub fn spacing_scale(base: f64, levels: usize) -> Result<Vec<f64>, EngineError> {
    phi_sequence(base, levels)
}

fn phi_sequence(base: f64, levels: usize) -> Result<Vec<f64>, EngineError> {
    require_positive("base", base)?;
    if levels == 0 {
        return Err(EngineError::InvalidInput(
            "scale needs at least one level".to_string(),
        ));
    }
    Ok((0..levels)
        .map(|i| {
            let exponent = i as i32 - 2;
            round_to_step(base * PHI.powi(exponent))
        })
        .collect())
}

fn round_to_step(value: f64) -> f64 {
    // Values too small to round to a visible step keep their exact size so the
    // scale stays strictly increasing.
    let rounded = (value / SCALE_STEP).round() * SCALE_STEP;
    if rounded <= 0.0 {
        value
    } else {
        rounded
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Spacing helpers
// ────────────────────────────────────────────────────────────────────────────

/// Equal gaps (edges included) for `count` elements of `element_size`.
///
/// Negative `spacing` means the elements do not fit.
pub fn optimal_spacing(
    count: usize,
    available_space: f64,
    element_size: f64,
) -> Result<SpacingPlan, EngineError> {
    if count == 0 {
        return Err(EngineError::InvalidInput(
            "cannot space zero elements".to_string(),
        ));
    }
    require_positive("available space", available_space)?;
    let total_element_space = count as f64 * element_size;
    let remaining_space = available_space - total_element_space;
    Ok(SpacingPlan {
        spacing: remaining_space / (count as f64 + 1.0),
        total_element_space,
        remaining_space,
    })
}

fn require_positive(name: &str, value: f64) -> Result<(), EngineError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(EngineError::InvalidInput(format!(
            "{name} must be a positive finite number, got {value}"
        )))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_1000() {
        let parts = split(1000.0).unwrap();
        assert!((parts.major - 618.03).abs() < 0.01, "major {}", parts.major);
        assert!((parts.minor - 381.97).abs() < 0.01, "minor {}", parts.minor);
    }

    #[test]
    fn test_split_preserves_length_and_ratio() {
        for length in [0.001, 1.0, 7.5, 595.0, 1000.0, 123_456.789] {
            let parts = split(length).unwrap();
            assert!((parts.major + parts.minor - length).abs() <= length * 1e-12);
            assert!(
                (parts.major / parts.minor - PHI).abs() < 1e-6,
                "ratio off for {length}"
            );
        }
    }

    #[test]
    fn test_split_rejects_non_positive() {
        assert!(matches!(split(0.0), Err(EngineError::InvalidInput(_))));
        assert!(matches!(split(-5.0), Err(EngineError::InvalidInput(_))));
        assert!(matches!(split(f64::NAN), Err(EngineError::InvalidInput(_))));
    }

    #[test]
    fn test_type_scale_exact_rounded_values() {
        let scale = type_scale(16.0, 7).unwrap();
        assert_eq!(scale, vec![6.0, 10.0, 16.0, 26.0, 42.0, 68.0, 109.5]);
        for (i, value) in scale.iter().enumerate() {
            let exact = 16.0 * PHI.powi(i as i32 - 2);
            assert!((value - exact).abs() <= SCALE_STEP / 2.0, "{value} vs {exact}");
        }
    }

    #[test]
    fn test_type_scale_rounds_to_half_units() {
        let scale = type_scale(11.0, 6).unwrap();
        assert_eq!(scale, vec![4.0, 7.0, 11.0, 18.0, 29.0, 46.5]);
    }

    #[test]
    fn test_spacing_scale_monotonic() {
        let scale = spacing_scale(12.0, 5).unwrap();
        assert_eq!(scale, vec![4.5, 7.5, 12.0, 19.5, 31.5]);
        assert!(scale.windows(2).all(|p| p[1] > p[0]));
    }

    #[test]
    fn test_scale_rejects_zero_levels() {
        assert!(type_scale(11.0, 0).is_err());
        assert!(spacing_scale(-1.0, 3).is_err());
    }

    #[test]
    fn test_column_split_two() {
        let widths = column_split(1000.0, 2).unwrap();
        assert!((widths[0] - 618.03).abs() < 0.01);
        assert!((widths[1] - 381.97).abs() < 0.01);
    }

    #[test]
    fn test_column_split_three_nests() {
        let widths = column_split(1000.0, 3).unwrap();
        assert_eq!(widths.len(), 3);
        assert!((widths.iter().sum::<f64>() - 1000.0).abs() < 1e-9);
        assert!((widths[1] / widths[2] - PHI).abs() < 1e-6);
    }

    #[test]
    fn test_column_split_rejects_other_counts() {
        assert!(column_split(1000.0, 4).is_err());
        assert!(column_split(1000.0, 1).is_err());
    }

    #[test]
    fn test_split_rect_vertical() {
        let rect = Rect::new(10.0, 20.0, 100.0, 200.0);
        let (top, bottom) = split_rect(&rect, Axis::Vertical).unwrap();
        assert_eq!(top.y, 20.0);
        assert!((bottom.y - (20.0 + top.height)).abs() < 1e-9);
        assert!((top.height + bottom.height - 200.0).abs() < 1e-9);
        assert_eq!(top.width, 100.0);
    }

    #[test]
    fn test_golden_margins_bottom_deeper() {
        let margins = golden_margins(595.0).unwrap();
        assert!(margins.left > 0.0);
        assert_eq!(margins.left, margins.right);
        assert!((margins.bottom / margins.top - PHI).abs() < 1e-9);
    }

    #[test]
    fn test_optimal_spacing_includes_edges() {
        let plan = optimal_spacing(3, 400.0, 100.0).unwrap();
        assert_eq!(plan.total_element_space, 300.0);
        assert_eq!(plan.spacing, 25.0);
    }
}
