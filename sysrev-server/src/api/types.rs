//! Request and response bodies for the REST API.

use serde::{Deserialize, Serialize};

use crate::repository::HistoryEntry;
use sysrev_core::{
    Answer, AnswerSheet, ClassificationStatus, QuestionId, ResearcherId, StudyClassification,
    StudyMetadata, StudyReview, StudyReviewId, SystematicStudy, SystematicStudyId,
};

// =============================================================================
// Path parameters
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ResearcherPath {
    pub researcher: ResearcherId,
}

#[derive(Debug, Deserialize)]
pub struct SystematicStudyPath {
    pub researcher: ResearcherId,
    pub systematic_study: SystematicStudyId,
}

#[derive(Debug, Deserialize)]
pub struct CollaboratorPath {
    pub researcher: ResearcherId,
    pub systematic_study: SystematicStudyId,
    pub collaborator: ResearcherId,
}

#[derive(Debug, Deserialize)]
pub struct SearchSourcePath {
    pub researcher: ResearcherId,
    pub systematic_study: SystematicStudyId,
    pub search_source: String,
}

#[derive(Debug, Deserialize)]
pub struct StudyReviewPath {
    pub researcher: ResearcherId,
    pub systematic_study: SystematicStudyId,
    pub study_review: StudyReviewId,
}

#[derive(Debug, Deserialize)]
pub struct StudyReviewSourcePath {
    pub researcher: ResearcherId,
    pub systematic_study: SystematicStudyId,
    pub study_review: StudyReviewId,
    pub search_source: String,
}

#[derive(Debug, Deserialize)]
pub struct CriterionPath {
    pub researcher: ResearcherId,
    pub systematic_study: SystematicStudyId,
    pub study_review: StudyReviewId,
    pub criterion: String,
}

#[derive(Debug, Deserialize)]
pub struct OwnerPath {
    pub researcher: ResearcherId,
    pub systematic_study: SystematicStudyId,
    pub owner: ResearcherId,
}

/// `study_review` is the record that is kept.
#[derive(Debug, Deserialize)]
pub struct DuplicatePath {
    pub researcher: ResearcherId,
    pub systematic_study: SystematicStudyId,
    pub study_review: StudyReviewId,
    pub duplicate: StudyReviewId,
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateSystematicStudyRequest {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStudyReviewRequest {
    #[serde(flatten)]
    pub metadata: StudyMetadata,
    pub search_sources: Vec<String>,
}

/// Body of a study review update. Omitting `comments` keeps the current ones.
#[derive(Debug, Deserialize)]
pub struct UpdateStudyReviewRequest {
    #[serde(flatten)]
    pub metadata: StudyMetadata,
    pub comments: Option<String>,
}

/// Body of the selection-status, extraction-status and reading-priority
/// endpoints. The status is kept as text so unknown names can be reported
/// as malformed input rather than a deserialization failure.
#[derive(Debug, Deserialize)]
pub struct StatusChangeRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    pub question_id: QuestionId,
    pub sheet: AnswerSheet,
    pub answer: Answer,
}

// =============================================================================
// Responses
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResponse {
    pub researcher_id: ResearcherId,
    pub systematic_study_id: SystematicStudyId,
    pub study_review_id: StudyReviewId,
    pub selection_status: ClassificationStatus,
    pub extraction_status: ClassificationStatus,
}

impl ClassificationResponse {
    pub fn new(
        researcher: ResearcherId,
        systematic_study: SystematicStudyId,
        study_review: StudyReviewId,
        classification: StudyClassification,
    ) -> Self {
        Self {
            researcher_id: researcher,
            systematic_study_id: systematic_study,
            study_review_id: study_review,
            selection_status: classification.selection(),
            extraction_status: classification.extraction(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyReviewListResponse {
    pub researcher_id: ResearcherId,
    pub systematic_study_id: SystematicStudyId,
    pub size: usize,
    pub study_reviews: Vec<StudyReview>,
}

impl StudyReviewListResponse {
    pub fn new(
        researcher: ResearcherId,
        systematic_study: SystematicStudyId,
        study_reviews: Vec<StudyReview>,
    ) -> Self {
        Self {
            researcher_id: researcher,
            systematic_study_id: systematic_study,
            size: study_reviews.len(),
            study_reviews,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystematicStudyListResponse {
    pub researcher_id: ResearcherId,
    pub size: usize,
    pub systematic_studies: Vec<SystematicStudy>,
}

impl SystematicStudyListResponse {
    pub fn new(researcher: ResearcherId, systematic_studies: Vec<SystematicStudy>) -> Self {
        Self {
            researcher_id: researcher,
            size: systematic_studies.len(),
            systematic_studies,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateResponse {
    pub kept: StudyReview,
    pub duplicate: StudyReview,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub study_review_id: StudyReviewId,
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
