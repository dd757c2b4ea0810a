//! Study review service.
//!
//! Coordinates the repository and the classification state machine. Every
//! operation:
//! 1. Loads the systematic study (missing: `NotFound`)
//! 2. Checks the researcher is a collaborator (otherwise: `Forbidden`)
//! 3. Parses any status text (malformed: `MalformedInput`)
//! 4. Loads the study review, applies the change and saves it
//!
//! A rejected change is reported before anything is written.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use sysrev_core::{
    Answer, AnswerSheet, ClassificationEvent, ClassificationStatus, ParseStatusError, Phase,
    QuestionId, ReadingPriority, ResearcherId, StudyClassification, StudyError, StudyMetadata,
    StudyReview, StudyReviewId, SystematicStudy, SystematicStudyError, SystematicStudyId,
    TransitionError,
};

use crate::repository::{HistoryEntry, RepositoryError, StudyReviewRepository};

/// Errors returned by the service, one variant per HTTP status class.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The request could not be understood (unknown status name, blank answer, ...).
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// The request was understood but is not allowed in the record's current state.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// Missing or invalid API token.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The researcher may not act on this systematic study.
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<TransitionError> for ServiceError {
    fn from(e: TransitionError) -> Self {
        Self::InvalidTransition(e.to_string())
    }
}

impl From<ParseStatusError> for ServiceError {
    fn from(e: ParseStatusError) -> Self {
        Self::MalformedInput(e.to_string())
    }
}

impl From<SystematicStudyError> for ServiceError {
    fn from(e: SystematicStudyError) -> Self {
        match e {
            SystematicStudyError::BlankField { .. } => Self::MalformedInput(e.to_string()),
            SystematicStudyError::OwnerRemoval | SystematicStudyError::NotCollaborator(_) => {
                Self::InvalidTransition(e.to_string())
            }
        }
    }
}

impl From<StudyError> for ServiceError {
    fn from(e: StudyError) -> Self {
        match e {
            StudyError::BlankAnswer | StudyError::BlankField { .. } => {
                Self::MalformedInput(e.to_string())
            }
            // Only reachable when removing sources from an existing record;
            // creation maps an empty source list itself.
            StudyError::NoSearchSource => Self::InvalidTransition(e.to_string()),
            StudyError::UnknownSearchSource(_) => Self::NotFound(e.to_string()),
        }
    }
}

/// Both records touched by duplicate marking, after the change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateOutcome {
    pub kept: StudyReview,
    pub duplicate: StudyReview,
}

/// Application service for systematic studies and their study reviews.
pub struct StudyReviewService {
    repository: Arc<dyn StudyReviewRepository>,
}

impl StudyReviewService {
    pub fn new(repository: Arc<dyn StudyReviewRepository>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &Arc<dyn StudyReviewRepository> {
        &self.repository
    }

    // =========================================================================
    // Preconditions
    // =========================================================================

    /// Load the systematic study and check the researcher collaborates on it.
    ///
    /// Every operation on an existing systematic study starts here, so HTTP
    /// handlers call it before decoding request bodies.
    pub async fn check_access(
        &self,
        researcher: ResearcherId,
        systematic_study: SystematicStudyId,
    ) -> Result<SystematicStudy, ServiceError> {
        let study = self
            .repository
            .get_systematic_study(systematic_study)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("systematic study {}", systematic_study))
            })?;

        if !study.contains_collaborator(researcher) {
            return Err(ServiceError::Forbidden(format!(
                "researcher {} is not a collaborator of systematic study {}",
                researcher, systematic_study
            )));
        }
        Ok(study)
    }

    async fn load_review(
        &self,
        systematic_study: SystematicStudyId,
        id: StudyReviewId,
    ) -> Result<StudyReview, ServiceError> {
        self.repository
            .get(systematic_study, id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "study review {} in systematic study {}",
                    id, systematic_study
                ))
            })
    }

    // =========================================================================
    // Systematic studies
    // =========================================================================

    /// Create a systematic study owned by `researcher`.
    pub async fn create_systematic_study(
        &self,
        researcher: ResearcherId,
        title: &str,
        description: &str,
    ) -> Result<SystematicStudy, ServiceError> {
        let study =
            SystematicStudy::new(SystematicStudyId::new_random(), title, description, researcher)?;
        self.repository.put_systematic_study(&study).await?;
        info!(
            "Created systematic study {} owned by {}",
            study.id(),
            researcher
        );
        Ok(study)
    }

    pub async fn find_systematic_study(
        &self,
        researcher: ResearcherId,
        systematic_study: SystematicStudyId,
    ) -> Result<SystematicStudy, ServiceError> {
        self.check_access(researcher, systematic_study).await
    }

    /// Add a collaborator. Only the owner may do this.
    pub async fn add_collaborator(
        &self,
        researcher: ResearcherId,
        systematic_study: SystematicStudyId,
        collaborator: ResearcherId,
    ) -> Result<SystematicStudy, ServiceError> {
        let mut study = self.owned_study(researcher, systematic_study).await?;
        if study.add_collaborator(collaborator) {
            self.repository.put_systematic_study(&study).await?;
            info!(
                "Added collaborator {} to systematic study {}",
                collaborator, systematic_study
            );
        }
        Ok(study)
    }

    /// Systematic studies the researcher collaborates on, ordered by id.
    pub async fn find_all_systematic_studies(
        &self,
        researcher: ResearcherId,
    ) -> Result<Vec<SystematicStudy>, ServiceError> {
        Ok(self.repository.get_systematic_studies_for(researcher).await?)
    }

    /// Remove a collaborator. Only the owner may do this, and the owner
    /// cannot be removed.
    pub async fn remove_collaborator(
        &self,
        researcher: ResearcherId,
        systematic_study: SystematicStudyId,
        collaborator: ResearcherId,
    ) -> Result<SystematicStudy, ServiceError> {
        let mut study = self.owned_study(researcher, systematic_study).await?;
        study.remove_collaborator(collaborator)?;
        self.repository.put_systematic_study(&study).await?;
        info!(
            "Removed collaborator {} from systematic study {}",
            collaborator, systematic_study
        );
        Ok(study)
    }

    /// Hand the systematic study over to one of its collaborators.
    pub async fn change_owner(
        &self,
        researcher: ResearcherId,
        systematic_study: SystematicStudyId,
        new_owner: ResearcherId,
    ) -> Result<SystematicStudy, ServiceError> {
        let mut study = self.owned_study(researcher, systematic_study).await?;
        if !study.contains_collaborator(new_owner) {
            return Err(SystematicStudyError::NotCollaborator(new_owner).into());
        }
        study.change_owner(new_owner);
        self.repository.put_systematic_study(&study).await?;
        info!(
            "Systematic study {} is now owned by {}",
            systematic_study, new_owner
        );
        Ok(study)
    }

    async fn owned_study(
        &self,
        researcher: ResearcherId,
        systematic_study: SystematicStudyId,
    ) -> Result<SystematicStudy, ServiceError> {
        let study = self.check_access(researcher, systematic_study).await?;
        if study.owner() != researcher {
            return Err(ServiceError::Forbidden(format!(
                "only the owner can manage collaborators of systematic study {}",
                systematic_study
            )));
        }
        Ok(study)
    }

    // =========================================================================
    // Study reviews
    // =========================================================================

    /// Register a study in a systematic study. It starts unclassified.
    pub async fn create_study_review(
        &self,
        researcher: ResearcherId,
        systematic_study: SystematicStudyId,
        metadata: StudyMetadata,
        search_sources: Vec<String>,
    ) -> Result<StudyReview, ServiceError> {
        self.check_access(researcher, systematic_study).await?;

        if search_sources.iter().all(|source| source.trim().is_empty()) {
            return Err(ServiceError::MalformedInput(
                StudyError::NoSearchSource.to_string(),
            ));
        }
        if metadata.title.trim().is_empty() {
            return Err(StudyError::BlankField { field: "title" }.into());
        }

        let id = self.repository.next_study_review_id(systematic_study).await?;
        let review = StudyReview::new(id, systematic_study, metadata, search_sources)?;
        self.repository.put(&review).await?;
        info!(
            "Created study review {} in systematic study {}",
            id, systematic_study
        );
        Ok(review)
    }

    pub async fn find_study_review(
        &self,
        researcher: ResearcherId,
        systematic_study: SystematicStudyId,
        id: StudyReviewId,
    ) -> Result<StudyReview, ServiceError> {
        self.check_access(researcher, systematic_study).await?;
        self.load_review(systematic_study, id).await
    }

    /// Replace the bibliographic data of a record and, when given, its
    /// comments. Classification, answers and sources are left alone.
    pub async fn update_study_review(
        &self,
        researcher: ResearcherId,
        systematic_study: SystematicStudyId,
        id: StudyReviewId,
        metadata: StudyMetadata,
        comments: Option<String>,
    ) -> Result<StudyReview, ServiceError> {
        self.check_access(researcher, systematic_study).await?;
        if metadata.title.trim().is_empty() {
            return Err(StudyError::BlankField { field: "title" }.into());
        }

        let mut review = self.load_review(systematic_study, id).await?;
        review.metadata = metadata;
        if let Some(comments) = comments {
            review.comments = comments;
        }
        self.repository.put(&review).await?;
        info!(
            "Updated study review {} in systematic study {}",
            id, systematic_study
        );
        Ok(review)
    }

    pub async fn find_all(
        &self,
        researcher: ResearcherId,
        systematic_study: SystematicStudyId,
    ) -> Result<Vec<StudyReview>, ServiceError> {
        self.check_access(researcher, systematic_study).await?;
        Ok(self.repository.get_all(systematic_study).await?)
    }

    pub async fn find_all_by_search_source(
        &self,
        researcher: ResearcherId,
        systematic_study: SystematicStudyId,
        search_source: &str,
    ) -> Result<Vec<StudyReview>, ServiceError> {
        self.check_access(researcher, systematic_study).await?;
        Ok(self
            .repository
            .get_by_search_source(systematic_study, search_source)
            .await?)
    }

    pub async fn delete_study_review(
        &self,
        researcher: ResearcherId,
        systematic_study: SystematicStudyId,
        id: StudyReviewId,
    ) -> Result<StudyReview, ServiceError> {
        self.check_access(researcher, systematic_study).await?;
        let deleted = self
            .repository
            .delete(systematic_study, id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "study review {} in systematic study {}",
                    id, systematic_study
                ))
            })?;
        info!(
            "Deleted study review {} in systematic study {}",
            id, systematic_study
        );
        Ok(deleted)
    }

    // =========================================================================
    // Classification
    // =========================================================================

    /// Change the selection status. Returns the post-transition pair.
    pub async fn change_selection_status(
        &self,
        researcher: ResearcherId,
        systematic_study: SystematicStudyId,
        id: StudyReviewId,
        status: &str,
    ) -> Result<StudyClassification, ServiceError> {
        self.change_status(researcher, systematic_study, id, Phase::Selection, status)
            .await
    }

    /// Change the extraction status. Returns the post-transition pair.
    pub async fn change_extraction_status(
        &self,
        researcher: ResearcherId,
        systematic_study: SystematicStudyId,
        id: StudyReviewId,
        status: &str,
    ) -> Result<StudyClassification, ServiceError> {
        self.change_status(researcher, systematic_study, id, Phase::Extraction, status)
            .await
    }

    async fn change_status(
        &self,
        researcher: ResearcherId,
        systematic_study: SystematicStudyId,
        id: StudyReviewId,
        phase: Phase,
        status: &str,
    ) -> Result<StudyClassification, ServiceError> {
        self.check_access(researcher, systematic_study).await?;

        let status: ClassificationStatus = status.parse()?;
        let event = ClassificationEvent::for_status(phase, status)?;

        let mut review = self.load_review(systematic_study, id).await?;
        self.apply_and_save(&mut review, event).await
    }

    /// Run one event against a loaded record and persist the record with
    /// its history entry.
    pub async fn apply_and_save(
        &self,
        review: &mut StudyReview,
        event: ClassificationEvent,
    ) -> Result<StudyClassification, ServiceError> {
        let result = review.classify(event)?;
        let entry = HistoryEntry::new(review, event, &result);
        self.repository
            .put_with_history(std::slice::from_ref(&*review), &entry)
            .await?;

        if result.is_no_change() {
            info!(
                "Processed {} for study review {} in systematic study {}: unchanged at {}",
                event.log_summary(),
                review.id(),
                review.systematic_study_id(),
                result.to
            );
        } else {
            info!(
                "Processed {} for study review {} in systematic study {}: {} -> {}",
                event.log_summary(),
                review.id(),
                review.systematic_study_id(),
                result.from,
                result.to
            );
        }
        Ok(result.to)
    }

    /// Mark `duplicate` as a duplicate of `keep`.
    ///
    /// The duplicate becomes (DUPLICATED, DUPLICATED) and `keep` absorbs its
    /// search sources.
    pub async fn mark_as_duplicated(
        &self,
        researcher: ResearcherId,
        systematic_study: SystematicStudyId,
        keep: StudyReviewId,
        duplicate: StudyReviewId,
    ) -> Result<DuplicateOutcome, ServiceError> {
        self.check_access(researcher, systematic_study).await?;
        if keep == duplicate {
            return Err(TransitionError::SelfDuplicate.into());
        }

        let mut kept = self.load_review(systematic_study, keep).await?;
        let mut dup = self.load_review(systematic_study, duplicate).await?;

        let result = dup.mark_as_duplicate_of(&mut kept)?;
        let entry = HistoryEntry::new(&dup, ClassificationEvent::MarkAsDuplicated, &result);
        let outcome = DuplicateOutcome {
            kept,
            duplicate: dup,
        };
        self.repository
            .put_with_history(&[outcome.kept.clone(), outcome.duplicate.clone()], &entry)
            .await?;

        info!(
            "Marked study review {} as duplicate of {} in systematic study {}",
            duplicate, keep, systematic_study
        );
        Ok(outcome)
    }

    pub async fn history(
        &self,
        researcher: ResearcherId,
        systematic_study: SystematicStudyId,
        id: StudyReviewId,
    ) -> Result<Vec<HistoryEntry>, ServiceError> {
        self.check_access(researcher, systematic_study).await?;
        // Distinguish "no such record" from "no transitions yet"
        self.load_review(systematic_study, id).await?;
        Ok(self.repository.get_history(systematic_study, id).await?)
    }

    // =========================================================================
    // Other record updates
    // =========================================================================

    pub async fn update_reading_priority(
        &self,
        researcher: ResearcherId,
        systematic_study: SystematicStudyId,
        id: StudyReviewId,
        priority: &str,
    ) -> Result<StudyReview, ServiceError> {
        self.check_access(researcher, systematic_study).await?;
        let priority: ReadingPriority = priority.parse()?;

        let mut review = self.load_review(systematic_study, id).await?;
        review.reading_priority = priority;
        self.repository.put(&review).await?;
        Ok(review)
    }

    /// Record an answer to a form or quality question.
    pub async fn answer_question(
        &self,
        researcher: ResearcherId,
        systematic_study: SystematicStudyId,
        id: StudyReviewId,
        sheet: AnswerSheet,
        question: QuestionId,
        answer: Answer,
    ) -> Result<StudyReview, ServiceError> {
        self.check_access(researcher, systematic_study).await?;
        answer.validate()?;

        let mut review = self.load_review(systematic_study, id).await?;
        review.answer(sheet, question, answer)?;
        self.repository.put(&review).await?;
        Ok(review)
    }

    pub async fn add_criterion(
        &self,
        researcher: ResearcherId,
        systematic_study: SystematicStudyId,
        id: StudyReviewId,
        criterion: &str,
    ) -> Result<StudyReview, ServiceError> {
        self.check_access(researcher, systematic_study).await?;
        if criterion.trim().is_empty() {
            return Err(StudyError::BlankField { field: "criterion" }.into());
        }

        let mut review = self.load_review(systematic_study, id).await?;
        if review.add_criterion(criterion) {
            self.repository.put(&review).await?;
        }
        Ok(review)
    }

    pub async fn remove_criterion(
        &self,
        researcher: ResearcherId,
        systematic_study: SystematicStudyId,
        id: StudyReviewId,
        criterion: &str,
    ) -> Result<StudyReview, ServiceError> {
        self.check_access(researcher, systematic_study).await?;

        let mut review = self.load_review(systematic_study, id).await?;
        if review.remove_criterion(criterion) {
            self.repository.put(&review).await?;
        }
        Ok(review)
    }

    pub async fn add_search_source(
        &self,
        researcher: ResearcherId,
        systematic_study: SystematicStudyId,
        id: StudyReviewId,
        search_source: &str,
    ) -> Result<StudyReview, ServiceError> {
        self.check_access(researcher, systematic_study).await?;
        if search_source.trim().is_empty() {
            return Err(StudyError::BlankField {
                field: "search source",
            }
            .into());
        }

        let mut review = self.load_review(systematic_study, id).await?;
        if review.add_search_source(search_source) {
            self.repository.put(&review).await?;
        }
        Ok(review)
    }

    /// Remove a search source. The last one cannot be removed.
    pub async fn remove_search_source(
        &self,
        researcher: ResearcherId,
        systematic_study: SystematicStudyId,
        id: StudyReviewId,
        search_source: &str,
    ) -> Result<StudyReview, ServiceError> {
        self.check_access(researcher, systematic_study).await?;

        let mut review = self.load_review(systematic_study, id).await?;
        review.remove_search_source(search_source)?;
        self.repository.put(&review).await?;
        Ok(review)
    }
}
