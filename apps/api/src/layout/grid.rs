//! Grid System: column, row and baseline structures for a page.
//!
//! A `Grid` is derived once per layout run and never mutated afterwards.
//! Column edges and baseline lines are the snap targets used by the
//! alignment engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::layout::golden_ratio::{column_split, golden_margins};
use crate::models::document::{validate_margins, Margins};
use crate::models::geometry::Rect;

const DEFAULT_GUTTER: f64 = 20.0;
const DEFAULT_MARGIN: f64 = 40.0;
const DEFAULT_BASELINE: f64 = 12.0;
const MANUSCRIPT_BASELINE: f64 = 14.0;
const DEFAULT_SNAP_TOLERANCE: f64 = 6.0;
const DEFAULT_BODY_SIZE: f64 = 11.0;
const MODULAR_COLUMNS: u32 = 6;
const MODULAR_ROWS: u32 = 8;
const GOLDEN_COLUMNS: u32 = 2;

/// Target characters per line for the manuscript measure.
const MANUSCRIPT_CHARS_PER_LINE: f64 = 66.0;
/// Average glyph width as a fraction of the font size.
const AVERAGE_CHAR_EM: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridType {
    Swiss12,
    Modular,
    Manuscript,
    Golden,
    Custom,
}

impl GridType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GridType::Swiss12 => "swiss12",
            GridType::Modular => "modular",
            GridType::Manuscript => "manuscript",
            GridType::Golden => "golden",
            GridType::Custom => "custom",
        }
    }
}

impl fmt::Display for GridType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GridType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "swiss12" => Ok(GridType::Swiss12),
            "modular" => Ok(GridType::Modular),
            "manuscript" => Ok(GridType::Manuscript),
            "golden" => Ok(GridType::Golden),
            "custom" => Ok(GridType::Custom),
            _ => Err(EngineError::UnknownGridType(s.to_string())),
        }
    }
}

/// Caller overrides for grid generation. Unset fields use per-type defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GridOptions {
    pub columns: Option<u32>,
    pub rows: Option<u32>,
    pub gutter: Option<f64>,
    pub margins: Option<Margins>,
    pub baseline_step: Option<f64>,
    pub snap_tolerance: Option<f64>,
    /// Body font size used to size the manuscript measure.
    #[serde(skip)]
    pub body_size: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grid {
    #[serde(rename = "type")]
    pub grid_type: GridType,
    pub columns: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<u32>,
    pub gutter: f64,
    pub margins: Margins,
    pub baseline_step: f64,
    pub column_widths: Vec<f64>,
    pub snap_tolerance: f64,
    pub page_width: f64,
    pub page_height: f64,
}

// ────────────────────────────────────────────────────────────────────────────
// Generation
// ────────────────────────────────────────────────────────────────────────────

/// Builds a grid of `grid_type` for a page of the given size.
pub fn generate(
    grid_type: GridType,
    page_width: f64,
    page_height: f64,
    options: &GridOptions,
) -> Result<Grid, EngineError> {
    if !(page_width.is_finite() && page_width > 0.0 && page_height.is_finite() && page_height > 0.0)
    {
        return Err(EngineError::InvalidConstraint(format!(
            "page must have positive size, got {page_width}x{page_height}"
        )));
    }

    let gutter = options.gutter.unwrap_or(DEFAULT_GUTTER);
    if !(gutter.is_finite() && gutter >= 0.0) {
        return Err(EngineError::InvalidConstraint(format!(
            "gutter must be non-negative, got {gutter}"
        )));
    }
    let snap_tolerance = options.snap_tolerance.unwrap_or(DEFAULT_SNAP_TOLERANCE).max(0.0);
    let body_size = options.body_size.unwrap_or(DEFAULT_BODY_SIZE);

    let (columns, rows, margins, baseline_step) = match grid_type {
        GridType::Swiss12 => (
            12,
            None,
            options.margins.unwrap_or(Margins::uniform(DEFAULT_MARGIN)),
            DEFAULT_BASELINE,
        ),
        GridType::Modular => (
            options.columns.unwrap_or(MODULAR_COLUMNS),
            Some(options.rows.unwrap_or(MODULAR_ROWS)),
            options.margins.unwrap_or(Margins::uniform(DEFAULT_MARGIN)),
            DEFAULT_BASELINE,
        ),
        GridType::Manuscript => (
            1,
            None,
            options
                .margins
                .unwrap_or_else(|| manuscript_margins(page_width, page_height, body_size)),
            MANUSCRIPT_BASELINE,
        ),
        GridType::Golden => {
            let margins = match options.margins {
                Some(m) => m,
                None => golden_margins(page_width)?,
            };
            (
                options.columns.unwrap_or(GOLDEN_COLUMNS),
                None,
                margins,
                DEFAULT_BASELINE,
            )
        }
        GridType::Custom => {
            let columns = options.columns.ok_or_else(|| {
                EngineError::InvalidInput("custom grid requires a column count".to_string())
            })?;
            (
                columns,
                options.rows,
                options.margins.unwrap_or(Margins::uniform(DEFAULT_MARGIN)),
                DEFAULT_BASELINE,
            )
        }
    };
    let baseline_step = options.baseline_step.unwrap_or(baseline_step);

    if columns == 0 {
        return Err(EngineError::InvalidInput(
            "grid needs at least one column".to_string(),
        ));
    }
    if rows == Some(0) {
        return Err(EngineError::InvalidInput(
            "grid rows must be at least one".to_string(),
        ));
    }
    if !(baseline_step.is_finite() && baseline_step > 0.0) {
        return Err(EngineError::InvalidConstraint(format!(
            "baseline step must be positive, got {baseline_step}"
        )));
    }
    validate_margins(&margins, page_width, page_height)?;

    let content_width = page_width - margins.horizontal();
    let content_height = page_height - margins.vertical();
    let gutter_space = gutter * (columns - 1) as f64;
    if content_width - gutter_space <= 0.0 {
        return Err(EngineError::InvalidConstraint(format!(
            "{columns} columns with {gutter}pt gutters do not fit {content_width}pt"
        )));
    }
    if let Some(rows) = rows {
        if content_height - gutter * (rows - 1) as f64 <= 0.0 {
            return Err(EngineError::InvalidConstraint(format!(
                "{rows} rows with {gutter}pt gutters do not fit {content_height}pt"
            )));
        }
    }

    let column_widths = if grid_type == GridType::Golden {
        column_split(content_width - gutter_space, columns as usize)?
    } else {
        vec![(content_width - gutter_space) / columns as f64; columns as usize]
    };

    Ok(Grid {
        grid_type,
        columns,
        rows,
        gutter,
        margins,
        baseline_step,
        column_widths,
        snap_tolerance,
        page_width,
        page_height,
    })
}

/// Single-column margins: the measure holds ~66 characters, top and bottom
/// margins are deliberately generous.
fn manuscript_margins(page_width: f64, page_height: f64, body_size: f64) -> Margins {
    let measure = MANUSCRIPT_CHARS_PER_LINE * AVERAGE_CHAR_EM * body_size;
    let side = ((page_width - measure) / 2.0).max(DEFAULT_MARGIN.min(page_width / 4.0));
    Margins {
        top: page_height * 0.10,
        right: side,
        bottom: page_height * 0.14,
        left: side,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Queries
// ────────────────────────────────────────────────────────────────────────────

impl Grid {
    pub fn content_rect(&self) -> Rect {
        Rect::new(
            self.margins.left,
            self.margins.top,
            self.page_width - self.margins.horizontal(),
            self.page_height - self.margins.vertical(),
        )
    }

    pub fn page_rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.page_width, self.page_height)
    }

    /// Left edge of column `col` (0-based, must be `< columns`).
    fn column_left(&self, col: usize) -> f64 {
        self.margins.left
            + self.column_widths[..col].iter().sum::<f64>()
            + self.gutter * col as f64
    }

    /// Left and right edges of every column, left to right.
    pub fn column_lines(&self) -> Vec<f64> {
        (0..self.columns as usize)
            .flat_map(|col| {
                let left = self.column_left(col);
                [left, left + self.column_widths[col]]
            })
            .collect()
    }

    /// Snaps `x` to the nearest column edge when within tolerance; otherwise
    /// returns `x` unchanged. Idempotent.
    pub fn snap_to_column(&self, x: f64) -> f64 {
        let nearest = self
            .column_lines()
            .into_iter()
            .min_by(|a, b| {
                (a - x)
                    .abs()
                    .partial_cmp(&(b - x).abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        match nearest {
            Some(line) if (line - x).abs() <= self.snap_tolerance => line,
            _ => x,
        }
    }

    /// Snaps `y` to the nearest baseline when within tolerance. Idempotent.
    pub fn snap_to_baseline(&self, y: f64) -> f64 {
        let top = self.margins.top;
        let k = ((y - top) / self.baseline_step).round();
        let line = top + k * self.baseline_step;
        if (line - y).abs() <= self.snap_tolerance {
            line
        } else {
            y
        }
    }

    /// Rectangle covering `count` columns from `start_col`, full content height.
    pub fn column_span(&self, start_col: u32, count: u32) -> Result<Rect, EngineError> {
        if count == 0 || start_col + count > self.columns {
            return Err(EngineError::InvalidInput(format!(
                "column span {start_col}+{count} exceeds {} columns",
                self.columns
            )));
        }
        let start = start_col as usize;
        let end = start + count as usize;
        let x = self.column_left(start);
        let width = self.column_left(end - 1) + self.column_widths[end - 1] - x;
        let content = self.content_rect();
        Ok(Rect::new(x, content.y, width, content.height))
    }

    /// Number of addressable rows; grids without explicit rows have one.
    pub fn row_count(&self) -> u32 {
        self.rows.unwrap_or(1)
    }

    fn row_height(&self) -> f64 {
        let rows = self.row_count();
        (self.content_rect().height - self.gutter * (rows - 1) as f64) / rows as f64
    }

    /// Rectangle covering `count` rows from `start_row`, full content width.
    pub fn row_span(&self, start_row: u32, count: u32) -> Result<Rect, EngineError> {
        let rows = self.row_count();
        if count == 0 || start_row + count > rows {
            return Err(EngineError::InvalidInput(format!(
                "row span {start_row}+{count} exceeds {rows} rows"
            )));
        }
        let row_height = self.row_height();
        let content = self.content_rect();
        let y = content.y + start_row as f64 * (row_height + self.gutter);
        let height = count as f64 * row_height + (count - 1) as f64 * self.gutter;
        Ok(Rect::new(content.x, y, content.width, height))
    }

    /// A block of modules spanning columns and rows, for modular grids.
    pub fn module_rect(
        &self,
        col: u32,
        row: u32,
        col_span: u32,
        row_span: u32,
    ) -> Result<Rect, EngineError> {
        let columns = self.column_span(col, col_span)?;
        let rows = self.row_span(row, row_span)?;
        Ok(Rect::new(columns.x, rows.y, columns.width, rows.height))
    }

    /// Column index containing `x`; gutters belong to the column on their left.
    pub fn column_at(&self, x: f64) -> u32 {
        (1..self.columns as usize)
            .take_while(|&col| x >= self.column_left(col))
            .count() as u32
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::golden_ratio::PHI;

    fn make_grid(grid_type: GridType) -> Grid {
        generate(grid_type, 595.0, 842.0, &GridOptions::default()).unwrap()
    }

    #[test]
    fn test_swiss12_equal_columns() {
        let grid = make_grid(GridType::Swiss12);
        assert_eq!(grid.columns, 12);
        assert_eq!(grid.column_widths.len(), 12);
        let total: f64 = grid.column_widths.iter().sum::<f64>() + 11.0 * grid.gutter;
        assert!((total - grid.content_rect().width).abs() < 1e-9);
        assert!(grid
            .column_widths
            .windows(2)
            .all(|w| (w[0] - w[1]).abs() < 1e-12));
    }

    #[test]
    fn test_unknown_grid_type() {
        let err = "hexagonal".parse::<GridType>().unwrap_err();
        assert_eq!(err, EngineError::UnknownGridType("hexagonal".to_string()));
        assert_eq!("Swiss12".parse::<GridType>().unwrap(), GridType::Swiss12);
    }

    #[test]
    fn test_negative_page_is_invalid_constraint() {
        let err = generate(GridType::Swiss12, -1.0, 842.0, &GridOptions::default()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidConstraint(_)));
    }

    #[test]
    fn test_custom_requires_columns() {
        let err = generate(GridType::Custom, 595.0, 842.0, &GridOptions::default()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));

        let options = GridOptions {
            columns: Some(5),
            rows: Some(3),
            gutter: Some(10.0),
            ..Default::default()
        };
        let grid = generate(GridType::Custom, 595.0, 842.0, &options).unwrap();
        assert_eq!(grid.columns, 5);
        assert_eq!(grid.rows, Some(3));
        assert_eq!(grid.gutter, 10.0);
    }

    #[test]
    fn test_manuscript_measure_near_66_chars() {
        let grid = make_grid(GridType::Manuscript);
        assert_eq!(grid.columns, 1);
        let chars_per_line = grid.column_widths[0] / (AVERAGE_CHAR_EM * DEFAULT_BODY_SIZE);
        assert!(
            (chars_per_line - 66.0).abs() < 1.0,
            "measure holds {chars_per_line} chars"
        );
        assert!(grid.margins.top > DEFAULT_MARGIN);
        assert!(grid.margins.bottom > grid.margins.top);
    }

    #[test]
    fn test_golden_columns_in_phi_ratio() {
        let grid = make_grid(GridType::Golden);
        assert_eq!(grid.columns, 2);
        let ratio = grid.column_widths[0] / grid.column_widths[1];
        assert!((ratio - PHI).abs() < 1e-9);
    }

    #[test]
    fn test_too_many_columns_is_invalid_constraint() {
        let options = GridOptions {
            columns: Some(40),
            gutter: Some(20.0),
            ..Default::default()
        };
        let err = generate(GridType::Custom, 595.0, 842.0, &options).unwrap_err();
        assert!(matches!(err, EngineError::InvalidConstraint(_)));
    }

    #[test]
    fn test_snap_to_column_within_tolerance() {
        let grid = make_grid(GridType::Swiss12);
        let first_right = grid.margins.left + grid.column_widths[0];
        assert_eq!(grid.snap_to_column(first_right + 2.0), first_right);
        assert_eq!(grid.snap_to_column(grid.margins.left - 3.0), grid.margins.left);
    }

    #[test]
    fn test_snap_to_column_outside_tolerance_unchanged() {
        let options = GridOptions {
            snap_tolerance: Some(1.0),
            ..Default::default()
        };
        let grid = generate(GridType::Swiss12, 595.0, 842.0, &options).unwrap();
        let x = grid.margins.left + grid.column_widths[0] / 2.0;
        assert_eq!(grid.snap_to_column(x), x);
    }

    #[test]
    fn test_snapping_is_idempotent() {
        let grid = make_grid(GridType::Swiss12);
        for raw in [0.0, 13.7, 41.2, 100.0, 297.5, 333.3, 590.0] {
            let x = grid.snap_to_column(raw);
            assert_eq!(grid.snap_to_column(x), x, "column snap of {raw}");
            let y = grid.snap_to_baseline(raw);
            assert_eq!(grid.snap_to_baseline(y), y, "baseline snap of {raw}");
        }
    }

    #[test]
    fn test_snap_to_baseline_rounds_to_step() {
        let grid = make_grid(GridType::Swiss12);
        // top margin 40, step 12 → lines at 40, 52, 64, ...
        assert_eq!(grid.snap_to_baseline(55.0), 52.0);
        assert_eq!(grid.snap_to_baseline(59.0), 64.0);
    }

    #[test]
    fn test_column_span_covers_gutters() {
        let grid = make_grid(GridType::Swiss12);
        let rect = grid.column_span(0, 12).unwrap();
        assert!((rect.width - grid.content_rect().width).abs() < 1e-9);
        let two = grid.column_span(3, 2).unwrap();
        assert!((two.width - (2.0 * grid.column_widths[0] + grid.gutter)).abs() < 1e-9);
        assert!(grid.column_span(11, 2).is_err());
        assert!(grid.column_span(0, 0).is_err());
    }

    #[test]
    fn test_modular_row_span_and_module_rect() {
        let grid = make_grid(GridType::Modular);
        assert_eq!(grid.rows, Some(8));
        let all = grid.row_span(0, 8).unwrap();
        assert!((all.height - grid.content_rect().height).abs() < 1e-9);
        let module = grid.module_rect(1, 2, 2, 3).unwrap();
        let cols = grid.column_span(1, 2).unwrap();
        let rows = grid.row_span(2, 3).unwrap();
        assert_eq!(module, Rect::new(cols.x, rows.y, cols.width, rows.height));
        assert!(grid.row_span(7, 2).is_err());
    }

    #[test]
    fn test_column_at() {
        let grid = make_grid(GridType::Swiss12);
        assert_eq!(grid.column_at(0.0), 0);
        assert_eq!(grid.column_at(grid.margins.left + 1.0), 0);
        let third = grid.column_span(2, 1).unwrap();
        assert_eq!(grid.column_at(third.x + 1.0), 2);
        assert_eq!(grid.column_at(594.0), 11);
    }
}
