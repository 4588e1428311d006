// Layout engine: golden-ratio geometry, grids, alignment, eye flow, and the
// architect pipeline that composes them into a scored page.
// CPU-bound passes run inside tokio::task::spawn_blocking.

pub mod alignment;
pub mod architect;
pub mod eye_flow;
pub mod golden_ratio;
pub mod grid;
pub mod handlers;
pub mod metrics;
pub mod placement;

pub use architect::{optimize, LayoutConstraints, LayoutOutcome};
