//! Application state for the API server

use crate::Orchestrator;

/// Shared application state accessible to all route handlers
///
/// Cloned per request; the orchestrator itself is Arc-backed, so this is
/// a cheap clone.
#[derive(Clone)]
pub struct AppState {
    /// The orchestrator serving this API
    pub orchestrator: Orchestrator,
}

impl AppState {
    /// Create a new AppState
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }
}
