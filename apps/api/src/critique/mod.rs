//! Critique collaborator: an optional external reviewer that proposes patches.
//!
//! Both pipelines hand a read-only snapshot plus a scoring rubric to a
//! `CritiqueService` and get back an ordered list of suggestions. The call is
//! the only suspension point in a run: it is bounded by a timeout, and any
//! failure turns into `CritiqueUnavailable` so the caller keeps its
//! deterministic result.
//!
//! `AppState` holds an `Option<Arc<dyn CritiqueService>>`; `None` when no API
//! key is configured.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

pub mod llm_critic;
pub mod prompts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CritiqueSubject {
    Layout,
    Narrative,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CritiqueRequest {
    pub subject: CritiqueSubject,
    /// The current layout or narrative, serialized.
    pub snapshot: Value,
    pub rubric: String,
}

/// One proposed change: set `property` of `target_id` to `new_value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub target_id: String,
    pub property: String,
    pub new_value: Value,
    #[serde(default)]
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CritiqueUnavailable {
    #[error("critique service timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("critique service unreachable: {0}")]
    Transport(String),

    #[error("critique service is not configured")]
    Disabled,
}

/// Implement this to plug in a different reviewer without touching the
/// pipelines or handlers.
#[async_trait]
pub trait CritiqueService: Send + Sync {
    async fn critique(&self, request: &CritiqueRequest) -> Result<Vec<Suggestion>, CritiqueUnavailable>;

    /// Backend name for logs.
    fn name(&self) -> &'static str;
}

/// Calls `critic` with a hard deadline. A missing critic is `Disabled`.
pub async fn request_critique(
    critic: Option<&dyn CritiqueService>,
    request: &CritiqueRequest,
    timeout: Duration,
) -> Result<Vec<Suggestion>, CritiqueUnavailable> {
    let Some(critic) = critic else {
        return Err(CritiqueUnavailable::Disabled);
    };

    debug!(
        "Requesting {:?} critique from {} (timeout {}ms)",
        request.subject,
        critic.name(),
        timeout.as_millis()
    );
    match tokio::time::timeout(timeout, critic.critique(request)).await {
        Ok(result) => result,
        Err(_) => {
            warn!("Critique from {} timed out after {}ms", critic.name(), timeout.as_millis());
            Err(CritiqueUnavailable::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    }
}

/// Reads a suggestion list from a free-form response. Accepts a bare array or
/// `{"suggestions": [...]}`; anything malformed yields no suggestions.
pub fn parse_suggestions(value: &Value) -> Vec<Suggestion> {
    let list = match value {
        Value::Array(_) => value,
        Value::Object(map) => match map.get("suggestions") {
            Some(list) => list,
            None => return Vec::new(),
        },
        _ => return Vec::new(),
    };
    match serde_json::from_value::<Vec<Suggestion>>(list.clone()) {
        Ok(suggestions) => suggestions,
        Err(e) => {
            warn!("Discarding malformed critique response: {e}");
            Vec::new()
        }
    }
}
