//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use std::collections::HashMap;
use std::sync::Arc;

use study_aid_core::{ports::DatabaseService, PendingMilestone, StudyService};
use tokio::sync::Mutex;
use uuid::Uuid;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub study: Arc<StudyService>,
    /// Streak milestones waiting to be celebrated, per user. Lost on restart.
    pub milestones: Mutex<HashMap<Uuid, PendingMilestone>>,
}

impl AppState {
    pub fn new(db: Arc<dyn DatabaseService>, study: Arc<StudyService>) -> Self {
        Self {
            db,
            study,
            milestones: Mutex::new(HashMap::new()),
        }
    }
}
