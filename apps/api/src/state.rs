use std::sync::Arc;

use crate::config::Config;
use crate::critique::CritiqueService;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Pluggable reviewer for the optional critique round. `None` when no API
    /// key is configured; requests asking for a critique then get a warning.
    pub critic: Option<Arc<dyn CritiqueService>>,
}
