//! Repository abstraction for study review persistence.
//!
//! This module defines the `StudyReviewRepository` trait that abstracts
//! storage of systematic studies, study reviews and their classification
//! history. Implementations can provide different backends (in-memory,
//! SQLite, etc.).

mod memory;
pub mod sqlite;

#[cfg(test)]
pub(crate) mod test_utils;

pub use memory::InMemoryRepository;
pub use sqlite::SqliteRepository;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use sysrev_core::{
    ClassificationEvent, ResearcherId, StudyClassification, StudyReview, StudyReviewId,
    SystematicStudy, SystematicStudyId, TransitionResult,
};

/// Errors raised by repository backends.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    /// The backend failed to execute an operation.
    #[error("storage error during {operation}: {message}")]
    Storage {
        operation: &'static str,
        message: String,
    },

    /// Stored data could not be decoded.
    #[error("corrupt {what} in storage")]
    Corruption { what: &'static str },
}

impl RepositoryError {
    pub fn storage(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Storage {
            operation,
            message: message.into(),
        }
    }

    pub fn corruption(what: &'static str) -> Self {
        Self::Corruption { what }
    }
}

/// One successful classification transition of one study review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Storage id; 0 until the entry has been saved.
    pub id: i64,
    pub systematic_study_id: SystematicStudyId,
    pub study_review_id: StudyReviewId,
    pub event: ClassificationEvent,
    pub from: StudyClassification,
    pub to: StudyClassification,
    /// Unix timestamp (seconds).
    pub recorded_at: i64,
}

impl HistoryEntry {
    /// Describe a transition that just happened to `review`.
    pub fn new(review: &StudyReview, event: ClassificationEvent, result: &TransitionResult) -> Self {
        Self {
            id: 0,
            systematic_study_id: review.systematic_study_id(),
            study_review_id: review.id(),
            event,
            from: result.from,
            to: result.to,
            recorded_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Repository trait for systematic studies and their study reviews.
///
/// Study reviews are keyed by `(systematic study, study review id)`. All
/// writes are upserts; concurrent writers to the same record are
/// last-write-wins.
#[async_trait]
pub trait StudyReviewRepository: Send + Sync {
    // =========================================================================
    // Systematic studies
    // =========================================================================

    /// Get a systematic study, returning None if not found.
    async fn get_systematic_study(
        &self,
        id: SystematicStudyId,
    ) -> Result<Option<SystematicStudy>, RepositoryError>;

    /// Store a systematic study (upsert semantics).
    async fn put_systematic_study(&self, study: &SystematicStudy) -> Result<(), RepositoryError>;

    /// Systematic studies the researcher collaborates on, ordered by id.
    async fn get_systematic_studies_for(
        &self,
        researcher: ResearcherId,
    ) -> Result<Vec<SystematicStudy>, RepositoryError>;

    // =========================================================================
    // Study reviews
    // =========================================================================

    /// Reserve the next study review id within a systematic study.
    ///
    /// Ids start at 1 and are never handed out twice, even if the record
    /// using an id is never saved.
    async fn next_study_review_id(
        &self,
        systematic_study: SystematicStudyId,
    ) -> Result<StudyReviewId, RepositoryError>;

    /// Get a study review, returning None if not found.
    async fn get(
        &self,
        systematic_study: SystematicStudyId,
        id: StudyReviewId,
    ) -> Result<Option<StudyReview>, RepositoryError>;

    /// Store a study review (upsert semantics).
    async fn put(&self, review: &StudyReview) -> Result<(), RepositoryError>;

    /// Store study reviews and append a history entry in one atomic step.
    async fn put_with_history(
        &self,
        reviews: &[StudyReview],
        entry: &HistoryEntry,
    ) -> Result<(), RepositoryError>;

    /// Delete a study review together with its history.
    async fn delete(
        &self,
        systematic_study: SystematicStudyId,
        id: StudyReviewId,
    ) -> Result<Option<StudyReview>, RepositoryError>;

    /// All study reviews of a systematic study, ordered by id.
    async fn get_all(
        &self,
        systematic_study: SystematicStudyId,
    ) -> Result<Vec<StudyReview>, RepositoryError>;

    /// Study reviews found through a given search source, ordered by id.
    async fn get_by_search_source(
        &self,
        systematic_study: SystematicStudyId,
        search_source: &str,
    ) -> Result<Vec<StudyReview>, RepositoryError>;

    // =========================================================================
    // Classification history
    // =========================================================================

    /// History of one study review, oldest first.
    async fn get_history(
        &self,
        systematic_study: SystematicStudyId,
        id: StudyReviewId,
    ) -> Result<Vec<HistoryEntry>, RepositoryError>;
}
