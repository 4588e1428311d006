// Narrative pacing: story arcs, emotional journeys and reading rhythm.
// Pure computation; the optional critique call is the only async step.

pub mod emotion;
pub mod flow;
pub mod handlers;
pub mod pacing;
pub mod story_arc;

use serde::{Deserialize, Serialize};

/// Half-open range of block indices, `start..end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRange {
    pub start: usize,
    pub end: usize,
}

impl BlockRange {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub use flow::{create_flow, NarrativeOptions, NarrativeOutcome};
