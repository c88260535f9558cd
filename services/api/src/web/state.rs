//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use std::sync::Arc;
use study_tracker_core::StudyTracker;
use tokio::sync::Mutex;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
///
/// The tracker sits behind one async mutex, so commands run one at a time in
/// arrival order.
pub struct AppState {
    pub tracker: Mutex<StudyTracker>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(tracker: StudyTracker, config: Arc<Config>) -> Self {
        Self {
            tracker: Mutex::new(tracker),
            config,
        }
    }
}
