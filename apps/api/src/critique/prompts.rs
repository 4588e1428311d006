// Rubrics and prompt builders for the critique collaborator.

use crate::critique::{CritiqueRequest, CritiqueSubject};
use crate::llm_client::prompts::JSON_ONLY_SYSTEM;

pub const LAYOUT_RUBRIC: &str = "\
    Score the page layout on: (1) quadrant balance of visual weight, \
    (2) whether the most important elements sit in the hottest attention zones, \
    (3) whitespace between 30% and 50% of the page, \
    (4) consistent alignment to the column grid. \
    You may only change these properties: \
    `column` (integer, 0-based start column) and `span` (integer, column count) \
    on an element, using its blockId as targetId; \
    `spacingTier` (integer 0-3) with targetId \"layout\".";

pub const NARRATIVE_RUBRIC: &str = "\
    Score the narrative flow on: (1) emotional resonance across stages, \
    (2) pacing that gives the reader room to breathe, \
    (3) visual treatments that match each stage's emotion. \
    You may only change stage treatments, using the stage name as targetId: \
    `imageryScale` (number 0-1), `headingSize` and `bodySize` (points), \
    `colorMood` (string), `spacingTier` (integer 0-3), \
    `contrast` (one of \"low\", \"medium\", \"high\").";

const CRITIC_ROLE: &str = "You are a senior editorial designer reviewing an automatically \
    composed document. Suggest only changes that clearly improve the result. \
    An empty list is a valid answer.";

pub fn system_prompt() -> String {
    format!("{CRITIC_ROLE} {JSON_ONLY_SYSTEM}")
}

pub fn build_prompt(request: &CritiqueRequest) -> String {
    let subject = match request.subject {
        CritiqueSubject::Layout => "page layout",
        CritiqueSubject::Narrative => "narrative flow",
    };
    format!(
        "Review this {subject}.\n\nRUBRIC:\n{rubric}\n\nCURRENT {upper}:\n{snapshot}\n\n\
         Respond with {{\"suggestions\": [{{\"targetId\": string, \"property\": string, \
         \"newValue\": any, \"rationale\": string}}]}}.",
        rubric = request.rubric,
        upper = subject.to_uppercase(),
        snapshot = request.snapshot,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prompt_carries_rubric_and_snapshot() {
        let request = CritiqueRequest {
            subject: CritiqueSubject::Narrative,
            snapshot: json!({"stages": ["setup"]}),
            rubric: NARRATIVE_RUBRIC.to_string(),
        };
        let prompt = build_prompt(&request);
        assert!(prompt.contains("narrative flow"));
        assert!(prompt.contains("imageryScale"));
        assert!(prompt.contains("\"setup\""));
    }
}
