pub mod api;
pub mod config;
pub mod repository;
pub mod service;

use std::sync::Arc;

pub use repository::{InMemoryRepository, SqliteRepository, StudyReviewRepository};
pub use service::{ServiceError, StudyReviewService};

mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

/// Name of the SQLite database file inside the state directory.
pub const DATABASE_FILE: &str = "sysrev-state.db";

pub fn get_version() -> String {
    // Release builds stamp the commit; plain cargo builds fall back to the crate version.
    if let Some(git_hash) = option_env!("SYSREV_GIT_HASH") {
        if git_hash.len() >= 8 {
            git_hash[..8].to_string()
        } else {
            git_hash.to_string()
        }
    } else {
        built_info::PKG_VERSION.to_string()
    }
}

pub struct AppState {
    pub service: StudyReviewService,
    /// Bearer token required on `/api/v1` routes. `None` leaves them open.
    pub api_auth_token: Option<String>,
}

impl AppState {
    pub fn new(repository: Arc<dyn StudyReviewRepository>, api_auth_token: Option<String>) -> Self {
        Self {
            service: StudyReviewService::new(repository),
            api_auth_token,
        }
    }
}
