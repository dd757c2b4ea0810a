//! HTTP handlers for the study review API.
//!
//! Handlers only translate between HTTP and `StudyReviewService`; every
//! rule lives in the service. Extractor rejections (bad UUIDs, invalid JSON)
//! are reported as malformed input with the same error body as service errors.
//!
//! Request bodies are decoded only after `check_access` passes, so a missing
//! systematic study or a non-collaborator is reported before a bad body.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::de::DeserializeOwned;

use super::types::*;
use crate::service::ServiceError;
use crate::AppState;
use sysrev_core::{StudyClassification, StudyReview, SystematicStudy};

type ApiResult<T> = Result<Json<T>, ServiceError>;

fn path<T>(extracted: Result<Path<T>, PathRejection>) -> Result<T, ServiceError> {
    extracted
        .map(|Path(value)| value)
        .map_err(|rejection| ServiceError::MalformedInput(rejection.body_text()))
}

fn body<T: DeserializeOwned>(extracted: Result<Json<T>, JsonRejection>) -> Result<T, ServiceError> {
    extracted
        .map(|Json(value)| value)
        .map_err(|rejection| ServiceError::MalformedInput(rejection.body_text()))
}

// =============================================================================
// Systematic studies
// =============================================================================

/// Handler: POST /api/v1/researcher/:researcher/systematic-study
pub async fn create_systematic_study(
    State(state): State<Arc<AppState>>,
    params: Result<Path<ResearcherPath>, PathRejection>,
    request: Result<Json<CreateSystematicStudyRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SystematicStudy>), ServiceError> {
    let ResearcherPath { researcher } = path(params)?;
    let request = body(request)?;

    let study = state
        .service
        .create_systematic_study(researcher, &request.title, &request.description)
        .await?;
    Ok((StatusCode::CREATED, Json(study)))
}

/// Handler: GET /api/v1/researcher/:researcher/systematic-study/:systematic_study
pub async fn find_systematic_study(
    State(state): State<Arc<AppState>>,
    params: Result<Path<SystematicStudyPath>, PathRejection>,
) -> ApiResult<SystematicStudy> {
    let p = path(params)?;
    let study = state
        .service
        .find_systematic_study(p.researcher, p.systematic_study)
        .await?;
    Ok(Json(study))
}

/// Handler: POST .../:systematic_study/collaborator/:collaborator
pub async fn add_collaborator(
    State(state): State<Arc<AppState>>,
    params: Result<Path<CollaboratorPath>, PathRejection>,
) -> ApiResult<SystematicStudy> {
    let p = path(params)?;
    let study = state
        .service
        .add_collaborator(p.researcher, p.systematic_study, p.collaborator)
        .await?;
    Ok(Json(study))
}

/// Handler: GET /api/v1/researcher/:researcher/systematic-study
pub async fn find_all_systematic_studies(
    State(state): State<Arc<AppState>>,
    params: Result<Path<ResearcherPath>, PathRejection>,
) -> ApiResult<SystematicStudyListResponse> {
    let ResearcherPath { researcher } = path(params)?;
    let studies = state.service.find_all_systematic_studies(researcher).await?;
    Ok(Json(SystematicStudyListResponse::new(researcher, studies)))
}

/// Handler: DELETE .../:systematic_study/collaborator/:collaborator
pub async fn remove_collaborator(
    State(state): State<Arc<AppState>>,
    params: Result<Path<CollaboratorPath>, PathRejection>,
) -> ApiResult<SystematicStudy> {
    let p = path(params)?;
    let study = state
        .service
        .remove_collaborator(p.researcher, p.systematic_study, p.collaborator)
        .await?;
    Ok(Json(study))
}

/// Handler: PATCH .../:systematic_study/owner/:owner
pub async fn change_owner(
    State(state): State<Arc<AppState>>,
    params: Result<Path<OwnerPath>, PathRejection>,
) -> ApiResult<SystematicStudy> {
    let p = path(params)?;
    let study = state
        .service
        .change_owner(p.researcher, p.systematic_study, p.owner)
        .await?;
    Ok(Json(study))
}

// =============================================================================
// Study reviews
// =============================================================================

/// Handler: POST .../:systematic_study/study-review
pub async fn create_study_review(
    State(state): State<Arc<AppState>>,
    params: Result<Path<SystematicStudyPath>, PathRejection>,
    request: Result<Json<CreateStudyReviewRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<StudyReview>), ServiceError> {
    let p = path(params)?;
    state.service.check_access(p.researcher, p.systematic_study).await?;
    let request = body(request)?;

    let review = state
        .service
        .create_study_review(
            p.researcher,
            p.systematic_study,
            request.metadata,
            request.search_sources,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(review)))
}

/// Handler: GET .../:systematic_study/study-review
pub async fn find_all_study_reviews(
    State(state): State<Arc<AppState>>,
    params: Result<Path<SystematicStudyPath>, PathRejection>,
) -> ApiResult<StudyReviewListResponse> {
    let p = path(params)?;
    let reviews = state
        .service
        .find_all(p.researcher, p.systematic_study)
        .await?;
    Ok(Json(StudyReviewListResponse::new(
        p.researcher,
        p.systematic_study,
        reviews,
    )))
}

/// Handler: GET .../:systematic_study/search-source/:search_source
pub async fn find_all_by_search_source(
    State(state): State<Arc<AppState>>,
    params: Result<Path<SearchSourcePath>, PathRejection>,
) -> ApiResult<StudyReviewListResponse> {
    let p = path(params)?;
    let reviews = state
        .service
        .find_all_by_search_source(p.researcher, p.systematic_study, &p.search_source)
        .await?;
    Ok(Json(StudyReviewListResponse::new(
        p.researcher,
        p.systematic_study,
        reviews,
    )))
}

/// Handler: GET .../:systematic_study/study-review/:study_review
pub async fn find_study_review(
    State(state): State<Arc<AppState>>,
    params: Result<Path<StudyReviewPath>, PathRejection>,
) -> ApiResult<StudyReview> {
    let p = path(params)?;
    let review = state
        .service
        .find_study_review(p.researcher, p.systematic_study, p.study_review)
        .await?;
    Ok(Json(review))
}

/// Handler: PUT .../:systematic_study/study-review/:study_review
pub async fn update_study_review(
    State(state): State<Arc<AppState>>,
    params: Result<Path<StudyReviewPath>, PathRejection>,
    request: Result<Json<UpdateStudyReviewRequest>, JsonRejection>,
) -> ApiResult<StudyReview> {
    let p = path(params)?;
    state.service.check_access(p.researcher, p.systematic_study).await?;
    let request = body(request)?;
    let review = state
        .service
        .update_study_review(
            p.researcher,
            p.systematic_study,
            p.study_review,
            request.metadata,
            request.comments,
        )
        .await?;
    Ok(Json(review))
}

/// Handler: DELETE .../:systematic_study/study-review/:study_review
pub async fn delete_study_review(
    State(state): State<Arc<AppState>>,
    params: Result<Path<StudyReviewPath>, PathRejection>,
) -> Result<StatusCode, ServiceError> {
    let p = path(params)?;
    state
        .service
        .delete_study_review(p.researcher, p.systematic_study, p.study_review)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Classification
// =============================================================================

fn classification_response(
    p: &StudyReviewPath,
    classification: StudyClassification,
) -> Json<ClassificationResponse> {
    Json(ClassificationResponse::new(
        p.researcher,
        p.systematic_study,
        p.study_review,
        classification,
    ))
}

/// Handler: PATCH .../:study_review/selection-status
pub async fn update_selection_status(
    State(state): State<Arc<AppState>>,
    params: Result<Path<StudyReviewPath>, PathRejection>,
    request: Result<Json<StatusChangeRequest>, JsonRejection>,
) -> ApiResult<ClassificationResponse> {
    let p = path(params)?;
    state.service.check_access(p.researcher, p.systematic_study).await?;
    let request = body(request)?;
    let classification = state
        .service
        .change_selection_status(p.researcher, p.systematic_study, p.study_review, &request.status)
        .await?;
    Ok(classification_response(&p, classification))
}

/// Handler: PATCH .../:study_review/extraction-status
pub async fn update_extraction_status(
    State(state): State<Arc<AppState>>,
    params: Result<Path<StudyReviewPath>, PathRejection>,
    request: Result<Json<StatusChangeRequest>, JsonRejection>,
) -> ApiResult<ClassificationResponse> {
    let p = path(params)?;
    state.service.check_access(p.researcher, p.systematic_study).await?;
    let request = body(request)?;
    let classification = state
        .service
        .change_extraction_status(p.researcher, p.systematic_study, p.study_review, &request.status)
        .await?;
    Ok(classification_response(&p, classification))
}

/// Handler: PATCH .../study-review/:study_review/duplicated/:duplicate
pub async fn mark_as_duplicated(
    State(state): State<Arc<AppState>>,
    params: Result<Path<DuplicatePath>, PathRejection>,
) -> ApiResult<DuplicateResponse> {
    let p = path(params)?;
    let outcome = state
        .service
        .mark_as_duplicated(p.researcher, p.systematic_study, p.study_review, p.duplicate)
        .await?;
    Ok(Json(DuplicateResponse {
        kept: outcome.kept,
        duplicate: outcome.duplicate,
    }))
}

/// Handler: GET .../:study_review/history
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    params: Result<Path<StudyReviewPath>, PathRejection>,
) -> ApiResult<HistoryResponse> {
    let p = path(params)?;
    let history = state
        .service
        .history(p.researcher, p.systematic_study, p.study_review)
        .await?;
    Ok(Json(HistoryResponse {
        study_review_id: p.study_review,
        history,
    }))
}

// =============================================================================
// Other record updates
// =============================================================================

/// Handler: PATCH .../:study_review/reading-priority
pub async fn update_reading_priority(
    State(state): State<Arc<AppState>>,
    params: Result<Path<StudyReviewPath>, PathRejection>,
    request: Result<Json<StatusChangeRequest>, JsonRejection>,
) -> ApiResult<StudyReview> {
    let p = path(params)?;
    state.service.check_access(p.researcher, p.systematic_study).await?;
    let request = body(request)?;
    let review = state
        .service
        .update_reading_priority(p.researcher, p.systematic_study, p.study_review, &request.status)
        .await?;
    Ok(Json(review))
}

/// Handler: PATCH .../:study_review/answer
pub async fn answer_question(
    State(state): State<Arc<AppState>>,
    params: Result<Path<StudyReviewPath>, PathRejection>,
    request: Result<Json<AnswerRequest>, JsonRejection>,
) -> ApiResult<StudyReview> {
    let p = path(params)?;
    state.service.check_access(p.researcher, p.systematic_study).await?;
    let request = body(request)?;
    let review = state
        .service
        .answer_question(
            p.researcher,
            p.systematic_study,
            p.study_review,
            request.sheet,
            request.question_id,
            request.answer,
        )
        .await?;
    Ok(Json(review))
}

/// Handler: POST .../:study_review/criteria/:criterion
pub async fn add_criterion(
    State(state): State<Arc<AppState>>,
    params: Result<Path<CriterionPath>, PathRejection>,
) -> ApiResult<StudyReview> {
    let p = path(params)?;
    let review = state
        .service
        .add_criterion(p.researcher, p.systematic_study, p.study_review, &p.criterion)
        .await?;
    Ok(Json(review))
}

/// Handler: DELETE .../:study_review/criteria/:criterion
pub async fn remove_criterion(
    State(state): State<Arc<AppState>>,
    params: Result<Path<CriterionPath>, PathRejection>,
) -> ApiResult<StudyReview> {
    let p = path(params)?;
    let review = state
        .service
        .remove_criterion(p.researcher, p.systematic_study, p.study_review, &p.criterion)
        .await?;
    Ok(Json(review))
}

/// Handler: POST .../:study_review/search-source/:search_source
pub async fn add_search_source(
    State(state): State<Arc<AppState>>,
    params: Result<Path<StudyReviewSourcePath>, PathRejection>,
) -> ApiResult<StudyReview> {
    let p = path(params)?;
    let review = state
        .service
        .add_search_source(p.researcher, p.systematic_study, p.study_review, &p.search_source)
        .await?;
    Ok(Json(review))
}

/// Handler: DELETE .../:study_review/search-source/:search_source
pub async fn remove_search_source(
    State(state): State<Arc<AppState>>,
    params: Result<Path<StudyReviewSourcePath>, PathRejection>,
) -> ApiResult<StudyReview> {
    let p = path(params)?;
    let review = state
        .service
        .remove_search_source(p.researcher, p.systematic_study, p.study_review, &p.search_source)
        .await?;
    Ok(Json(review))
}
