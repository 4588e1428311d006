use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

/// Errors raised by the layout and narrative engines.
///
/// Only malformed primary input is fatal. Geometry and scoring problems found
/// mid-pipeline are clamped and reported as warnings on the output instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Malformed document or options. Nothing is computed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Impossible geometry, e.g. a zero-sized page or margins wider than the page.
    #[error("Invalid constraint: {0}")]
    InvalidConstraint(String),

    #[error("Unknown grid type: {0}")]
    UnknownGridType(String),

    #[error("Unknown journey template: {0}")]
    UnknownJourney(String),

    #[error("Unknown pacing strategy: {0}")]
    UnknownPacingStrategy(String),

    #[error("Unknown eye-flow pattern: {0}")]
    UnknownEyeFlowPattern(String),

    #[error("Unknown story arc: {0}")]
    UnknownStoryArc(String),
}

/// Non-fatal conditions recorded on a pipeline's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PipelineWarning {
    /// The critique step was skipped; the output is the deterministic result.
    CritiqueUnavailable { reason: String },
    /// The critique returned suggestions that could not be applied as a whole.
    CritiqueRejected { reason: String },
    /// An element ended up outside the page and was moved back in.
    ElementClamped {
        #[serde(rename = "blockId")]
        block_id: String,
    },
    /// Content is taller than the page even at the smallest type scale.
    Overflow {
        #[serde(rename = "overflowPt")]
        overflow_pt: f64,
    },
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Engine(e @ EngineError::InvalidConstraint(_)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "INVALID_CONSTRAINT",
                e.to_string(),
            ),
            AppError::Engine(e) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string()),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_constraint_maps_to_422() {
        let response =
            AppError::from(EngineError::InvalidConstraint("page width".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_unknown_enum_values_map_to_400() {
        let response =
            AppError::from(EngineError::UnknownGridType("hexagonal".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response =
            AppError::from(EngineError::UnknownJourney("tragedy".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_warning_wire_format() {
        let warning = PipelineWarning::ElementClamped {
            block_id: "img".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&warning).unwrap(),
            json!({"kind": "elementClamped", "blockId": "img"})
        );
    }

    #[test]
    fn test_engine_error_messages_carry_value() {
        let err = EngineError::UnknownGridType("hexagonal".to_string());
        assert_eq!(err.to_string(), "Unknown grid type: hexagonal");
    }
}
