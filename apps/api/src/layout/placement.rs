//! Slot model: where each block sits on the grid, and how that turns into
//! page rectangles.
//!
//! A `Placement` is the abstract layout: rows of `(block, column, span)` slots
//! stacked top to bottom. `Materializer` turns a placement into concrete
//! `PositionedElement`s for a given type scale and spacing tier. The architect
//! searches over placements and scales; nothing here mutates its inputs.
//!
//! # Sizing rules
//! - Headings use the golden type scale (level 1 → step 5, level 2 → step 4,
//!   deeper → step 3); body text uses the base size.
//! - Text height = wrapped lines × size × 1.4 leading.
//! - Images keep their aspect ratio (golden rectangle when unknown) and shrink
//!   with the scale but never grow past their slot.
//! - Every row starts on the baseline grid.

use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::layout::alignment::{OpticalOffset, PositionedElement, ShapeKind};
use crate::layout::golden_ratio::{spacing_scale, type_scale, PHI};
use crate::layout::grid::{Grid, GridType};
use crate::models::document::{BlockType, ContentBlock, Document, CHARS_PER_WORD};
use crate::models::geometry::Rect;

pub const DEFAULT_SPACING_TIER: usize = 2;
pub const MAX_SPACING_TIER: usize = 3;
pub const MIN_SCALE: f64 = 0.5;
pub const MAX_SCALE: f64 = 1.6;

const SPACING_BASE: f64 = 12.0;
const SPACING_LEVELS: usize = 5;
const TYPE_LEVELS: usize = 6;
const LINE_HEIGHT: f64 = 1.4;
const AVERAGE_CHAR_EM: f64 = 0.5;
const CTA_LINES: f64 = 3.0;
const MARKER_LINES: f64 = 2.0;
/// Share of the grid given to the narrow side of a two-up row.
const NARROW_SHARE: f64 = 1.0 - 1.0 / PHI;
/// Share of the grid given to a stand-alone image.
const WIDE_SHARE: f64 = 1.0 / PHI;
const BISECTION_STEPS: usize = 40;

/// A block's position on the column grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub block: usize,
    pub column: u32,
    pub span: u32,
}

impl Slot {
    /// First column past the slot. Saturates so an oversized slot fails
    /// `is_valid` instead of wrapping.
    fn end(&self) -> u32 {
        self.column.saturating_add(self.span)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub rows: Vec<Vec<Slot>>,
}

impl Placement {
    /// Assigns every block a row and column span from its type and position.
    ///
    /// An image (or, on wide grids, a quote) directly followed by body text
    /// shares a row with it, narrow side first.
    pub fn initial(doc: &Document, grid: &Grid) -> Placement {
        let columns = grid.columns;
        let allow_two_up = columns >= 2 && grid.grid_type != GridType::Manuscript;
        let narrow = ((columns as f64 * NARROW_SHARE).round() as u32).clamp(1, columns);
        let wide = ((columns as f64 * WIDE_SHARE).round() as u32).clamp(1, columns);

        let mut rows = Vec::new();
        let mut idx = 0;
        while idx < doc.blocks.len() {
            let block = &doc.blocks[idx];
            let next_is_body = doc
                .blocks
                .get(idx + 1)
                .map(|next| next.block_type == BlockType::Paragraph && !next.is_whitespace_marker())
                .unwrap_or(false);
            let pairs = match block.block_type {
                BlockType::Image => allow_two_up && next_is_body && narrow < columns,
                BlockType::Quote => allow_two_up && next_is_body && columns >= 6,
                _ => false,
            };

            if pairs {
                rows.push(vec![
                    Slot {
                        block: idx,
                        column: 0,
                        span: narrow,
                    },
                    Slot {
                        block: idx + 1,
                        column: narrow,
                        span: columns - narrow,
                    },
                ]);
                idx += 2;
                continue;
            }

            let (column, span) = match block.block_type {
                BlockType::Image => ((columns - wide) / 2, wide),
                BlockType::Cta => ((columns - narrow) / 2, narrow),
                BlockType::Quote if columns >= 6 => (1, columns - 2),
                _ => (0, columns),
            };
            rows.push(vec![Slot {
                block: idx,
                column,
                span,
            }]);
            idx += 1;
        }
        Placement { rows }
    }

    /// Row and position of the slot holding `block`.
    pub fn locate(&self, block: usize) -> Option<(usize, usize)> {
        self.rows.iter().enumerate().find_map(|(r, row)| {
            row.iter()
                .position(|slot| slot.block == block)
                .map(|pos| (r, pos))
        })
    }

    pub fn with_row(&self, row: usize, slots: Vec<Slot>) -> Placement {
        let mut next = self.clone();
        next.rows[row] = slots;
        next
    }

    /// Alternative arrangements of one row: mirrored for multi-slot rows,
    /// shifted one column either way for a single narrow slot.
    pub fn row_alternatives(&self, row: usize, columns: u32) -> Vec<Vec<Slot>> {
        let slots = &self.rows[row];
        let mut out = Vec::new();
        if slots.len() >= 2 {
            let mirrored: Vec<Slot> = slots
                .iter()
                .map(|s| Slot {
                    column: columns - s.end(),
                    ..*s
                })
                .collect();
            if &mirrored != slots {
                out.push(mirrored);
            }
        } else if let Some(slot) = slots.first() {
            if slot.column > 0 {
                out.push(vec![Slot {
                    column: slot.column - 1,
                    ..*slot
                }]);
            }
            if slot.end() < columns {
                out.push(vec![Slot {
                    column: slot.column + 1,
                    ..*slot
                }]);
            }
        }
        out
    }

    /// Every slot fits the grid and no two slots in a row overlap.
    pub fn is_valid(&self, columns: u32) -> bool {
        self.rows.iter().all(|row| {
            row.iter().all(|s| s.span >= 1 && s.end() <= columns)
                && row.iter().enumerate().all(|(i, a)| {
                    row[i + 1..]
                        .iter()
                        .all(|b| a.end() <= b.column || b.end() <= a.column)
                })
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Materialization
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Materialized {
    pub elements: Vec<PositionedElement>,
    /// Height from the content top to the bottom of the last row.
    pub content_height: f64,
}

/// Outcome of fitting the type scale to the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFit {
    pub scale: f64,
    /// False when the content overflows even at the minimum scale.
    pub fits: bool,
}

pub struct Materializer<'a> {
    doc: &'a Document,
    grid: &'a Grid,
    base_font_size: f64,
    type_sizes: Vec<f64>,
    gaps: Vec<f64>,
}

impl<'a> Materializer<'a> {
    pub fn new(doc: &'a Document, grid: &'a Grid, base_font_size: f64) -> Result<Self, EngineError> {
        Ok(Self {
            doc,
            grid,
            base_font_size,
            type_sizes: type_scale(base_font_size, TYPE_LEVELS)?,
            gaps: spacing_scale(SPACING_BASE, SPACING_LEVELS)?,
        })
    }

    /// Unscaled font size for a text block.
    pub fn font_size(&self, block: &ContentBlock) -> f64 {
        match (block.block_type, block.hierarchy_level) {
            (BlockType::Heading, 1) => self.type_sizes[5],
            (BlockType::Heading, 2) => self.type_sizes[4],
            (BlockType::Heading, _) => self.type_sizes[3],
            _ => self.base_font_size,
        }
    }

    /// Gap above a row: one tier wider before headings.
    fn gap_before(&self, row: &[Slot], tier: usize) -> f64 {
        let starts_section = row
            .first()
            .map(|s| self.doc.blocks[s.block].block_type == BlockType::Heading)
            .unwrap_or(false);
        let tier = if starts_section { tier + 1 } else { tier };
        self.gaps[tier.min(self.gaps.len() - 1)]
    }

    /// Width and height of a block inside a slot `slot_width` wide.
    fn block_size(&self, block: &ContentBlock, slot_width: f64, scale: f64) -> (f64, f64) {
        let body = self.base_font_size * scale;
        match block.block_type {
            BlockType::Image => {
                let aspect = block
                    .media_size
                    .map(|m| m.height / m.width)
                    .unwrap_or(1.0 / PHI);
                let width = slot_width * scale.min(1.0);
                (width, width * aspect)
            }
            BlockType::Cta => (slot_width, CTA_LINES * body * LINE_HEIGHT),
            _ if block.is_whitespace_marker() => (slot_width, MARKER_LINES * body * LINE_HEIGHT),
            _ => {
                let size = self.font_size(block) * scale;
                let chars = block.effective_word_count().max(1) as f64 * CHARS_PER_WORD;
                let chars_per_line = (slot_width / (AVERAGE_CHAR_EM * size)).max(1.0);
                let lines = (chars / chars_per_line).ceil().max(1.0);
                (slot_width, lines * size * LINE_HEIGHT)
            }
        }
    }

    fn shape_of(block: &ContentBlock) -> ShapeKind {
        match block.block_type {
            BlockType::Image => ShapeKind::Rectangle,
            BlockType::Cta => ShapeKind::RoundedRect,
            _ => ShapeKind::Text,
        }
    }

    /// Rounds `y` up to the next baseline.
    fn next_baseline(&self, y: f64) -> f64 {
        let top = self.grid.margins.top;
        let step = self.grid.baseline_step;
        top + ((y - top) / step - 1e-9).ceil().max(0.0) * step
    }

    /// Lays the placement out top to bottom. Elements come back in document
    /// order.
    pub fn materialize(
        &self,
        placement: &Placement,
        scale: f64,
        tier: usize,
    ) -> Result<Materialized, EngineError> {
        let top = self.grid.margins.top;
        let mut cursor = top;
        let mut elements: Vec<(usize, PositionedElement)> = Vec::with_capacity(self.doc.blocks.len());

        for (r, row) in placement.rows.iter().enumerate() {
            if r > 0 {
                cursor += self.gap_before(row, tier);
            }
            cursor = self.next_baseline(cursor);
            let group = (row.len() > 1).then(|| format!("row-{r}"));

            let mut row_height: f64 = 0.0;
            for slot in row {
                let block = &self.doc.blocks[slot.block];
                let area = self.grid.column_span(slot.column, slot.span)?;
                let (width, height) = self.block_size(block, area.width, scale);
                row_height = row_height.max(height);
                elements.push((
                    slot.block,
                    PositionedElement {
                        block_id: block.id.clone(),
                        block_type: block.block_type,
                        x: area.x,
                        y: cursor,
                        width,
                        height,
                        hierarchy_level: block.hierarchy_level,
                        shape: Self::shape_of(block),
                        group: group.clone(),
                        optical_offset: OpticalOffset::default(),
                    },
                ));
            }
            cursor += row_height;
        }

        elements.sort_by_key(|(block, _)| *block);
        Ok(Materialized {
            elements: elements.into_iter().map(|(_, el)| el).collect(),
            content_height: cursor - top,
        })
    }

    /// Largest scale in `[MIN_SCALE, MAX_SCALE]` at which the content both
    /// fits the content area (leaving one baseline of slack) and occupies no
    /// more than `max_occupancy` of the page.
    pub fn fit_scale(
        &self,
        placement: &Placement,
        tier: usize,
        max_occupancy: f64,
    ) -> Result<ScaleFit, EngineError> {
        let available = self.grid.content_rect().height - self.grid.baseline_step;
        let page_area = self.grid.page_rect().area();

        let fits_page = |scale: f64| -> Result<bool, EngineError> {
            let m = self.materialize(placement, scale, tier)?;
            Ok(m.content_height <= available)
        };
        let acceptable = |scale: f64| -> Result<bool, EngineError> {
            let m = self.materialize(placement, scale, tier)?;
            let occupied = occupied_area(&m.elements, self.grid.page_width, self.grid.page_height);
            Ok(m.content_height <= available && occupied <= max_occupancy * page_area)
        };

        if !fits_page(MIN_SCALE)? {
            return Ok(ScaleFit {
                scale: MIN_SCALE,
                fits: false,
            });
        }
        if acceptable(MAX_SCALE)? {
            return Ok(ScaleFit {
                scale: MAX_SCALE,
                fits: true,
            });
        }
        if !acceptable(MIN_SCALE)? {
            // Fits but is crowded even at the smallest scale.
            return Ok(ScaleFit {
                scale: MIN_SCALE,
                fits: true,
            });
        }

        let (mut lo, mut hi) = (MIN_SCALE, MAX_SCALE);
        for _ in 0..BISECTION_STEPS {
            let mid = (lo + hi) / 2.0;
            if acceptable(mid)? {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        Ok(ScaleFit {
            scale: lo,
            fits: true,
        })
    }
}

/// Total element area inside the page. Elements never overlap, so a plain sum
/// of clipped areas is exact.
pub fn occupied_area(elements: &[PositionedElement], page_width: f64, page_height: f64) -> f64 {
    let page = Rect::new(0.0, 0.0, page_width, page_height);
    elements.iter().map(|el| el.rect().intersection_area(&page)).sum()
}

/// `1 − occupied / page`, clamped to `[0, 1]`.
pub fn whitespace_ratio(elements: &[PositionedElement], page_width: f64, page_height: f64) -> f64 {
    let page_area = page_width * page_height;
    if page_area <= 0.0 {
        return 0.0;
    }
    (1.0 - occupied_area(elements, page_width, page_height) / page_area).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::grid::{generate, GridOptions};
    use crate::models::document::{MediaSize, PageGeometry};

    fn make_block(id: &str, block_type: BlockType, level: u8, words: u32) -> ContentBlock {
        ContentBlock {
            id: id.to_string(),
            block_type,
            text: String::new(),
            hierarchy_level: level,
            word_count: words,
            media_size: None,
        }
    }

    fn make_document() -> Document {
        Document {
            blocks: vec![
                make_block("h1", BlockType::Heading, 1, 2),
                make_block("img", BlockType::Image, 2, 0),
                make_block("p1", BlockType::Paragraph, 3, 250),
                make_block("p2", BlockType::Paragraph, 3, 200),
                make_block("cta", BlockType::Cta, 2, 3),
            ],
            page: PageGeometry::a4(),
        }
    }

    fn make_grid(grid_type: GridType) -> Grid {
        generate(grid_type, 595.0, 842.0, &GridOptions::default()).unwrap()
    }

    #[test]
    fn test_initial_pairs_image_with_following_text() {
        let doc = make_document();
        let placement = Placement::initial(&doc, &make_grid(GridType::Swiss12));
        assert_eq!(placement.rows.len(), 4);
        assert_eq!(
            placement.rows[1],
            vec![
                Slot { block: 1, column: 0, span: 5 },
                Slot { block: 2, column: 5, span: 7 },
            ]
        );
        // cta is centred and narrow
        assert_eq!(placement.rows[3], vec![Slot { block: 4, column: 3, span: 5 }]);
        assert!(placement.is_valid(12));
    }

    #[test]
    fn test_manuscript_never_pairs() {
        let doc = make_document();
        let placement = Placement::initial(&doc, &make_grid(GridType::Manuscript));
        assert_eq!(placement.rows.len(), 5);
        assert!(placement.rows.iter().all(|r| r.len() == 1 && r[0].span == 1));
    }

    #[test]
    fn test_row_alternatives() {
        let doc = make_document();
        let placement = Placement::initial(&doc, &make_grid(GridType::Swiss12));
        let mirrored = placement.row_alternatives(1, 12);
        assert_eq!(
            mirrored,
            vec![vec![
                Slot { block: 1, column: 7, span: 5 },
                Slot { block: 2, column: 0, span: 7 },
            ]]
        );
        assert!(placement.with_row(1, mirrored[0].clone()).is_valid(12));
        // full-width rows cannot move
        assert!(placement.row_alternatives(0, 12).is_empty());
        assert_eq!(placement.row_alternatives(3, 12).len(), 2);
    }

    #[test]
    fn test_overlapping_row_is_invalid() {
        let placement = Placement {
            rows: vec![vec![
                Slot { block: 0, column: 0, span: 6 },
                Slot { block: 1, column: 5, span: 7 },
            ]],
        };
        assert!(!placement.is_valid(12));
    }

    #[test]
    fn test_oversized_slot_is_invalid() {
        for slot in [
            Slot { block: 0, column: u32::MAX, span: 1 },
            Slot { block: 0, column: 1, span: u32::MAX },
            Slot { block: 0, column: u32::MAX, span: u32::MAX },
        ] {
            let placement = Placement { rows: vec![vec![slot]] };
            assert!(!placement.is_valid(12));
        }
    }

    #[test]
    fn test_materialize_stacks_rows_on_baselines() {
        let doc = make_document();
        let grid = make_grid(GridType::Swiss12);
        let placement = Placement::initial(&doc, &grid);
        let materializer = Materializer::new(&doc, &grid, 11.0).unwrap();
        let m = materializer.materialize(&placement, 1.0, DEFAULT_SPACING_TIER).unwrap();

        assert_eq!(m.elements.len(), 5);
        let ids: Vec<&str> = m.elements.iter().map(|e| e.block_id.as_str()).collect();
        assert_eq!(ids, vec!["h1", "img", "p1", "p2", "cta"]);
        for el in &m.elements {
            let offset = (el.y - grid.margins.top) / grid.baseline_step;
            assert!((offset - offset.round()).abs() < 1e-9, "{} off baseline", el.block_id);
        }
        // two-up row shares its top and group tag
        assert_eq!(m.elements[1].y, m.elements[2].y);
        assert_eq!(m.elements[1].group.as_deref(), Some("row-1"));
        assert!(m.elements[3].y >= m.elements[2].y + m.elements[2].height);
    }

    #[test]
    fn test_image_keeps_media_aspect() {
        let mut doc = make_document();
        doc.blocks[1].media_size = Some(MediaSize { width: 400.0, height: 200.0 });
        let grid = make_grid(GridType::Swiss12);
        let materializer = Materializer::new(&doc, &grid, 11.0).unwrap();
        let m = materializer
            .materialize(&Placement::initial(&doc, &grid), 0.8, DEFAULT_SPACING_TIER)
            .unwrap();
        let img = &m.elements[1];
        assert!((img.height / img.width - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_heading_sizes_follow_type_scale() {
        let doc = make_document();
        let grid = make_grid(GridType::Swiss12);
        let materializer = Materializer::new(&doc, &grid, 11.0).unwrap();
        assert_eq!(materializer.font_size(&doc.blocks[0]), 46.5);
        assert_eq!(materializer.font_size(&doc.blocks[2]), 11.0);
    }

    #[test]
    fn test_fit_scale_respects_occupancy() {
        let doc = make_document();
        let grid = make_grid(GridType::Swiss12);
        let placement = Placement::initial(&doc, &grid);
        let materializer = Materializer::new(&doc, &grid, 11.0).unwrap();
        let fit = materializer.fit_scale(&placement, DEFAULT_SPACING_TIER, 0.6).unwrap();
        assert!(fit.fits);
        assert!((MIN_SCALE..=MAX_SCALE).contains(&fit.scale));
        let m = materializer.materialize(&placement, fit.scale, DEFAULT_SPACING_TIER).unwrap();
        assert!(whitespace_ratio(&m.elements, 595.0, 842.0) >= 0.4 - 1e-9);
    }

    #[test]
    fn test_fit_scale_reports_overflow() {
        let doc = Document {
            blocks: (0..12)
                .map(|i| make_block(&format!("p{i}"), BlockType::Paragraph, 3, 400))
                .collect(),
            page: PageGeometry::a4(),
        };
        let grid = make_grid(GridType::Swiss12);
        let materializer = Materializer::new(&doc, &grid, 11.0).unwrap();
        let fit = materializer
            .fit_scale(&Placement::initial(&doc, &grid), 0, 0.6)
            .unwrap();
        assert!(!fit.fits);
        assert_eq!(fit.scale, MIN_SCALE);
    }

    #[test]
    fn test_whitespace_ratio_bounds() {
        assert_eq!(whitespace_ratio(&[], 595.0, 842.0), 1.0);
    }
}
