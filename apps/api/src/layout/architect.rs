//! Layout architect: the layout pipeline from document to scored page.
//!
//! # Pipeline
//! 1. Analyze the content (density, image share, complexity).
//! 2. Pick a grid type and eye-flow pattern unless the caller fixed them.
//! 3. Generate the grid.
//! 4. Initial slot placement.
//! 5. Balance quadrant weights by trying row alternatives.
//! 6. Move the most important blocks toward hotter slots.
//! 7. Fit type scale and spacing so whitespace lands in 30–50%.
//! 8. Snap to the grid, clamp anything off-page.
//! 9. Optional critique round: validate the whole patch, apply it, redo 5–8.
//! 10. Metrics, eye-flow scores, reading gravity, issues.
//!
//! Steps 1–8 and 10 are pure and run inside `tokio::task::spawn_blocking`.
//! Step 9 is the only `.await`.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::critique::{
    prompts::LAYOUT_RUBRIC, request_critique, CritiqueRequest, CritiqueService, CritiqueSubject,
    Suggestion,
};
use crate::errors::{AppError, EngineError, PipelineWarning};
use crate::layout::alignment::{align, detect_issues, AlignmentIssue, PositionedElement};
use crate::layout::eye_flow::{
    build_heatmap, reading_gravity, score_element, select_focal_points, EyeFlowPattern, EyeFlowScore,
    FocalPoint, Heatmap, ReadingGravity, DEFAULT_RESOLUTION,
};
use crate::layout::grid::{self, Grid, GridOptions, GridType};
use crate::layout::metrics::{self, quadrant_variance, quadrant_weights, LayoutMetrics};
use crate::layout::placement::{
    whitespace_ratio, Materializer, Placement, DEFAULT_SPACING_TIER, MAX_SPACING_TIER,
};
use crate::models::document::{BlockType, Document};

/// Target document length for a "full" page when measuring density.
const DENSITY_REFERENCE_WORDS: f64 = 500.0;
const IMAGE_DOMINANT_SHARE: f64 = 0.4;
const DENSE_TEXT: f64 = 0.7;
const RICH_BLOCK_TYPES: usize = 4;

/// Balance and hot-zone search run on unscaled content.
const PROBE_SCALE: f64 = 1.0;
const BALANCE_TARGET_VARIANCE: f64 = 0.01;
const MAX_BALANCE_ITERATIONS: usize = 8;
/// Heat gained before a block is worth moving.
const MIN_HEAT_GAIN: f64 = 0.1;

const WHITESPACE_MIN: f64 = 0.30;
const WHITESPACE_MAX: f64 = 0.50;
/// Occupancy cap handed to the scale fit; keeps whitespace at or above 40%.
const MAX_OCCUPANCY: f64 = 0.6;
const MAX_WHITESPACE_PASSES: usize = 3;

/// Target id for layout-wide critique suggestions.
const LAYOUT_TARGET: &str = "layout";

#[derive(Debug, Clone)]
pub struct LayoutConstraints {
    /// `None` picks a grid from the content analysis.
    pub grid_type: Option<GridType>,
    pub grid_options: GridOptions,
    pub eye_flow_pattern: EyeFlowPattern,
    pub base_font_size: f64,
    pub use_critique_service: bool,
    pub critique_timeout: Duration,
}

impl Default for LayoutConstraints {
    fn default() -> Self {
        Self {
            grid_type: None,
            grid_options: GridOptions::default(),
            eye_flow_pattern: EyeFlowPattern::Auto,
            base_font_size: 11.0,
            use_critique_service: false,
            critique_timeout: Duration::from_millis(8000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentAnalysis {
    /// Words relative to one full page, capped at 1.
    pub density: f64,
    /// Share of blocks that are images.
    pub visual_balance: f64,
    /// Distinct block types and hierarchy levels, scaled to 0–1.
    pub complexity: f64,
    pub image_dominant: bool,
    pub block_types: usize,
}

pub fn analyze_content(doc: &Document) -> ContentAnalysis {
    let blocks = doc.blocks.len().max(1) as f64;
    let images = doc.count_of(BlockType::Image) as f64;
    let types: BTreeSet<_> = doc.blocks.iter().map(|b| b.block_type as u8).collect();
    let levels: BTreeSet<u8> = doc.blocks.iter().map(|b| b.hierarchy_level).collect();
    let visual_balance = images / blocks;

    ContentAnalysis {
        density: (doc.total_words() as f64 / DENSITY_REFERENCE_WORDS).min(1.0),
        visual_balance,
        complexity: ((types.len() + levels.len()) as f64 / 10.0).min(1.0),
        image_dominant: visual_balance >= IMAGE_DOMINANT_SHARE,
        block_types: types.len(),
    }
}

/// Decision table from the content analysis to a grid type.
pub fn select_grid(analysis: &ContentAnalysis) -> GridType {
    if analysis.image_dominant {
        GridType::Modular
    } else if analysis.density >= DENSE_TEXT && analysis.visual_balance == 0.0 {
        GridType::Manuscript
    } else if analysis.block_types >= RICH_BLOCK_TYPES {
        GridType::Swiss12
    } else {
        GridType::Golden
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    pub grid: Grid,
    pub eye_flow_pattern: EyeFlowPattern,
    pub analysis: ContentAnalysis,
    pub elements: Vec<PositionedElement>,
    pub focal_points: Vec<FocalPoint>,
    pub metrics: LayoutMetrics,
    pub eye_flow_scores: Vec<EyeFlowScore>,
    pub gravity: ReadingGravity,
    pub issues: Vec<AlignmentIssue>,
    /// Type and media scale chosen by the whitespace fit.
    pub scale: f64,
    pub spacing_tier: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutOutcome {
    pub layout: Layout,
    pub warnings: Vec<PipelineWarning>,
}

/// Decisions made before any block is placed.
#[derive(Debug, Clone)]
pub struct LayoutPlan {
    analysis: ContentAnalysis,
    grid: Grid,
    pattern: EyeFlowPattern,
    focal_points: Vec<FocalPoint>,
    heatmap: Heatmap,
    base_font_size: f64,
}

/// The search state the critique round may patch.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub placement: Placement,
    pub tier: usize,
}

/// Result of the deterministic pass, kept whole so a critique round can
/// resume from it.
#[derive(Debug, Clone)]
pub struct Composition {
    pub plan: LayoutPlan,
    pub draft: Draft,
    pub layout: Layout,
    pub warnings: Vec<PipelineWarning>,
}

// ────────────────────────────────────────────────────────────────────────────
// Steps 1–4
// ────────────────────────────────────────────────────────────────────────────

pub fn plan(doc: &Document, constraints: &LayoutConstraints) -> Result<LayoutPlan, EngineError> {
    doc.validate()?;
    if !(constraints.base_font_size.is_finite() && constraints.base_font_size > 0.0) {
        return Err(EngineError::InvalidInput(format!(
            "baseFontSize must be positive, got {}",
            constraints.base_font_size
        )));
    }

    let analysis = analyze_content(doc);
    let grid_type = constraints.grid_type.unwrap_or_else(|| select_grid(&analysis));
    let pattern = constraints.eye_flow_pattern.resolve(analysis.image_dominant);

    let mut options = constraints.grid_options.clone();
    options.body_size = Some(constraints.base_font_size);
    if options.margins.is_none()
        && matches!(grid_type, GridType::Swiss12 | GridType::Modular | GridType::Custom)
    {
        options.margins = doc.page.margin_defaults;
    }
    let grid = grid::generate(grid_type, doc.page.width, doc.page.height, &options)?;

    let focal_points = select_focal_points(pattern, analysis.image_dominant);
    let heatmap = build_heatmap(
        doc.page.width,
        doc.page.height,
        &focal_points,
        DEFAULT_RESOLUTION,
        DEFAULT_RESOLUTION,
    )?;

    debug!(
        "Layout plan: grid {grid_type} ({} columns), pattern {pattern}, density {:.2}",
        grid.columns, analysis.density
    );
    Ok(LayoutPlan {
        analysis,
        grid,
        pattern,
        focal_points,
        heatmap,
        base_font_size: constraints.base_font_size,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Steps 5–8
// ────────────────────────────────────────────────────────────────────────────

struct Arranged {
    draft: Draft,
    elements: Vec<PositionedElement>,
    scale: f64,
    warnings: Vec<PipelineWarning>,
}

fn variance_of(materializer: &Materializer, placement: &Placement, tier: usize, grid: &Grid) -> Result<f64, EngineError> {
    let m = materializer.materialize(placement, PROBE_SCALE, tier)?;
    Ok(quadrant_variance(&quadrant_weights(&m.elements, grid.page_width, grid.page_height)))
}

/// Step 5: greedy descent over single-row alternatives.
fn balance(materializer: &Materializer, grid: &Grid, draft: &Draft) -> Result<Placement, EngineError> {
    let mut placement = draft.placement.clone();
    let mut variance = variance_of(materializer, &placement, draft.tier, grid)?;

    for _ in 0..MAX_BALANCE_ITERATIONS {
        if variance < BALANCE_TARGET_VARIANCE {
            break;
        }
        let mut best: Option<(f64, Placement)> = None;
        for row in 0..placement.rows.len() {
            for slots in placement.row_alternatives(row, grid.columns) {
                let candidate = placement.with_row(row, slots);
                let v = variance_of(materializer, &candidate, draft.tier, grid)?;
                let best_so_far = best.as_ref().map(|(b, _)| *b).unwrap_or(variance);
                if v < best_so_far - 1e-12 {
                    best = Some((v, candidate));
                }
            }
        }
        match best {
            Some((v, candidate)) => {
                variance = v;
                placement = candidate;
            }
            None => break,
        }
    }
    Ok(placement)
}

fn heat_of(materializer: &Materializer, placement: &Placement, tier: usize, heatmap: &Heatmap, block: usize) -> Result<f64, EngineError> {
    let m = materializer.materialize(placement, PROBE_SCALE, tier)?;
    let center = m.elements[block].rect().center();
    Ok(heatmap.sample(center.x, center.y))
}

/// Step 6: the top two hierarchy levels take a hotter slot when one exists.
fn chase_hot_zones(
    doc: &Document,
    materializer: &Materializer,
    plan: &LayoutPlan,
    placement: Placement,
    tier: usize,
) -> Result<Placement, EngineError> {
    let top_level = doc.blocks.iter().map(|b| b.hierarchy_level).min().unwrap_or(1);
    let mut placement = placement;

    for (idx, block) in doc.blocks.iter().enumerate() {
        if block.hierarchy_level > top_level + 1 {
            continue;
        }
        let Some((row, _)) = placement.locate(idx) else {
            continue;
        };
        let current = heat_of(materializer, &placement, tier, &plan.heatmap, idx)?;
        let mut best: Option<(f64, Placement)> = None;
        for slots in placement.row_alternatives(row, plan.grid.columns) {
            let candidate = placement.with_row(row, slots);
            let heat = heat_of(materializer, &candidate, tier, &plan.heatmap, idx)?;
            let best_so_far = best.as_ref().map(|(h, _)| *h).unwrap_or(current + MIN_HEAT_GAIN - 1e-12);
            if heat > best_so_far {
                best = Some((heat, candidate));
            }
        }
        if let Some((heat, candidate)) = best {
            debug!("Moved '{}' toward a hot zone ({current:.2} → {heat:.2})", block.id);
            placement = candidate;
        }
    }
    Ok(placement)
}

/// Steps 5–8 from a draft to snapped, on-page elements.
fn arrange(doc: &Document, plan: &LayoutPlan, draft: Draft) -> Result<Arranged, EngineError> {
    let grid = &plan.grid;
    let materializer = Materializer::new(doc, grid, plan.base_font_size)?;
    let mut warnings = Vec::new();

    let placement = balance(&materializer, grid, &draft)?;
    let placement = chase_hot_zones(doc, &materializer, plan, placement, draft.tier)?;

    // Step 7: each pass fits the scale for a spacing tier and measures.
    let mut tier = draft.tier.min(MAX_SPACING_TIER);
    let mut pass = 0;
    let (fit, materialized) = loop {
        pass += 1;
        let fit = materializer.fit_scale(&placement, tier, MAX_OCCUPANCY)?;
        let materialized = materializer.materialize(&placement, fit.scale, tier)?;
        let ratio = whitespace_ratio(&materialized.elements, grid.page_width, grid.page_height);
        debug!(
            "Whitespace pass {pass}: tier {tier}, scale {:.3}, ratio {ratio:.3}, fits {}",
            fit.scale, fit.fits
        );

        if fit.fits && (WHITESPACE_MIN..=WHITESPACE_MAX).contains(&ratio) {
            break (fit, materialized);
        }
        if pass >= MAX_WHITESPACE_PASSES {
            break (fit, materialized);
        }
        let next = if !fit.fits || ratio > WHITESPACE_MAX {
            tier.checked_sub(1)
        } else {
            (tier < MAX_SPACING_TIER).then_some(tier + 1)
        };
        match next {
            Some(t) => tier = t,
            None => break (fit, materialized),
        }
    };

    if !fit.fits {
        let available = grid.content_rect().height - grid.baseline_step;
        let overflow_pt = materialized.content_height - available;
        warn!("Content overflows the page by {overflow_pt:.1}pt at minimum scale");
        warnings.push(PipelineWarning::Overflow { overflow_pt });
    }

    // Step 8
    let mut elements = materialized.elements;
    align(&mut elements, grid);
    for el in elements.iter_mut() {
        if clamp_to_page(el, grid.page_width, grid.page_height) {
            warn!("Clamped '{}' back onto the page", el.block_id);
            warnings.push(PipelineWarning::ElementClamped {
                block_id: el.block_id.clone(),
            });
        }
    }

    Ok(Arranged {
        draft: Draft { placement, tier },
        elements,
        scale: fit.scale,
        warnings,
    })
}

/// Moves (and if needed shrinks) an element so it lies inside the page.
/// Returns whether anything changed.
fn clamp_to_page(el: &mut PositionedElement, page_width: f64, page_height: f64) -> bool {
    let before = (el.x, el.y, el.width, el.height);
    el.width = el.width.min(page_width);
    el.height = el.height.min(page_height);
    el.x = el.x.clamp(0.0, page_width - el.width);
    el.y = el.y.clamp(0.0, page_height - el.height);
    before != (el.x, el.y, el.width, el.height)
}

// ────────────────────────────────────────────────────────────────────────────
// Step 10
// ────────────────────────────────────────────────────────────────────────────

fn finalize(plan: &LayoutPlan, arranged: &Arranged) -> Layout {
    let grid = &plan.grid;
    let elements = arranged.elements.clone();
    let issues = detect_issues(&elements);
    let metrics = metrics::compute(&elements, &issues, grid.grid_type, grid.page_width, grid.page_height);
    let eye_flow_scores = elements
        .iter()
        .map(|el| score_element(el, &plan.heatmap, el.hierarchy_level))
        .collect();
    let gravity = reading_gravity(&elements, grid.page_width, grid.page_height);

    Layout {
        grid: grid.clone(),
        eye_flow_pattern: plan.pattern,
        analysis: plan.analysis.clone(),
        elements,
        focal_points: plan.focal_points.clone(),
        metrics,
        eye_flow_scores,
        gravity,
        issues,
        scale: arranged.scale,
        spacing_tier: arranged.draft.tier,
    }
}

/// Deterministic pass: steps 1–8 and 10.
pub fn compose(doc: &Document, constraints: &LayoutConstraints) -> Result<Composition, EngineError> {
    let plan = plan(doc, constraints)?;
    let draft = Draft {
        placement: Placement::initial(doc, &plan.grid),
        tier: DEFAULT_SPACING_TIER,
    };
    let arranged = arrange(doc, &plan, draft)?;
    let layout = finalize(&plan, &arranged);
    Ok(Composition {
        plan,
        draft: arranged.draft,
        layout,
        warnings: arranged.warnings,
    })
}

/// Re-runs steps 5–8 and 10 from a patched draft.
pub fn recompose(doc: &Document, plan: LayoutPlan, draft: Draft) -> Result<Composition, EngineError> {
    let arranged = arrange(doc, &plan, draft)?;
    let layout = finalize(&plan, &arranged);
    Ok(Composition {
        plan,
        draft: arranged.draft,
        layout,
        warnings: arranged.warnings,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Step 9
// ────────────────────────────────────────────────────────────────────────────

/// Applies the whole suggestion list to a copy of `draft`, or nothing.
pub fn apply_suggestions(
    doc: &Document,
    draft: &Draft,
    columns: u32,
    suggestions: &[Suggestion],
) -> Result<Draft, String> {
    let mut patched = draft.clone();

    for s in suggestions {
        if s.target_id == LAYOUT_TARGET {
            match s.property.as_str() {
                "spacingTier" => {
                    let tier = s
                        .new_value
                        .as_u64()
                        .filter(|t| *t <= MAX_SPACING_TIER as u64)
                        .ok_or_else(|| format!("spacingTier must be an integer 0-{MAX_SPACING_TIER}"))?;
                    patched.tier = tier as usize;
                }
                other => return Err(format!("unknown layout property '{other}'")),
            }
            continue;
        }

        let block = doc
            .blocks
            .iter()
            .position(|b| b.id == s.target_id)
            .ok_or_else(|| format!("unknown block '{}'", s.target_id))?;
        let (row, pos) = patched
            .placement
            .locate(block)
            .ok_or_else(|| format!("block '{}' is not placed", s.target_id))?;
        let value = s
            .new_value
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .filter(|v| *v <= columns)
            .ok_or_else(|| {
                format!(
                    "'{}' {} must be an integer 0-{columns}",
                    s.target_id, s.property
                )
            })?;
        let slot = &mut patched.placement.rows[row][pos];
        match s.property.as_str() {
            "column" => slot.column = value,
            "span" => slot.span = value,
            other => return Err(format!("unknown element property '{other}'")),
        }
    }

    if !patched.placement.is_valid(columns) {
        return Err(format!("suggested slots do not fit a {columns}-column grid"));
    }
    Ok(patched)
}

/// Full layout pipeline.
pub async fn optimize(
    doc: Document,
    constraints: LayoutConstraints,
    critic: Option<Arc<dyn CritiqueService>>,
) -> Result<LayoutOutcome, AppError> {
    let blocks = doc.blocks.len();
    let doc = Arc::new(doc);

    // CPU-bound pass: spawn_blocking to avoid blocking the async executor.
    let pass_doc = Arc::clone(&doc);
    let pass_constraints = constraints.clone();
    let composition = tokio::task::spawn_blocking(move || compose(&pass_doc, &pass_constraints))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("spawn_blocking failed in optimize: {e}")))??;

    if !constraints.use_critique_service {
        log_outcome(&composition.layout, blocks, composition.warnings.len());
        return Ok(LayoutOutcome {
            layout: composition.layout,
            warnings: composition.warnings,
        });
    }

    let request = CritiqueRequest {
        subject: CritiqueSubject::Layout,
        snapshot: serde_json::to_value(&composition.layout).context("Failed to serialize layout snapshot")?,
        rubric: LAYOUT_RUBRIC.to_string(),
    };
    let critique = request_critique(critic.as_deref(), &request, constraints.critique_timeout).await;

    let mut warnings = composition.warnings.clone();
    let composition = match critique {
        Ok(suggestions) if suggestions.is_empty() => composition,
        Ok(suggestions) => {
            match apply_suggestions(&doc, &composition.draft, composition.plan.grid.columns, &suggestions) {
                Ok(draft) => {
                    debug!("Applied {} layout suggestions; re-arranging", suggestions.len());
                    let plan = composition.plan.clone();
                    let pass_doc = Arc::clone(&doc);
                    let revised = tokio::task::spawn_blocking(move || recompose(&pass_doc, plan, draft))
                        .await
                        .map_err(|e| {
                            AppError::Internal(anyhow::anyhow!("spawn_blocking failed in optimize: {e}"))
                        })??;
                    warnings = revised.warnings.clone();
                    revised
                }
                Err(reason) => {
                    warn!("Rejected layout critique: {reason}");
                    warnings.push(PipelineWarning::CritiqueRejected { reason });
                    composition
                }
            }
        }
        Err(unavailable) => {
            warn!("Layout critique skipped: {unavailable}");
            warnings.push(PipelineWarning::CritiqueUnavailable {
                reason: unavailable.to_string(),
            });
            composition
        }
    };

    log_outcome(&composition.layout, blocks, warnings.len());
    Ok(LayoutOutcome {
        layout: composition.layout,
        warnings,
    })
}

fn log_outcome(layout: &Layout, blocks: usize, warnings: usize) {
    info!(
        "Layout optimized: {blocks} blocks on {} grid, whitespace {:.2}, balance {:.1}, {warnings} warnings",
        layout.grid.grid_type, layout.metrics.whitespace_ratio, layout.metrics.balance
    );
}
