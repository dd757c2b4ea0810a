//! REST API for systematic studies and their study reviews.

pub mod auth;
mod error;
pub mod handlers;
pub mod types;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use crate::AppState;

const BASE: &str = "/api/v1/researcher/:researcher/systematic-study";

/// Routes under `/api/v1`, guarded by the bearer token check.
pub fn api_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let review = |suffix: &str| format!("{BASE}/:systematic_study/study-review/:study_review{suffix}");

    Router::new()
        .route(
            BASE,
            post(handlers::create_systematic_study).get(handlers::find_all_systematic_studies),
        )
        .route(
            &format!("{BASE}/:systematic_study"),
            get(handlers::find_systematic_study),
        )
        .route(
            &format!("{BASE}/:systematic_study/collaborator/:collaborator"),
            post(handlers::add_collaborator).delete(handlers::remove_collaborator),
        )
        .route(
            &format!("{BASE}/:systematic_study/owner/:owner"),
            patch(handlers::change_owner),
        )
        .route(
            &format!("{BASE}/:systematic_study/study-review"),
            post(handlers::create_study_review).get(handlers::find_all_study_reviews),
        )
        .route(
            &format!("{BASE}/:systematic_study/search-source/:search_source"),
            get(handlers::find_all_by_search_source),
        )
        .route(
            &review(""),
            get(handlers::find_study_review)
                .put(handlers::update_study_review)
                .delete(handlers::delete_study_review),
        )
        .route(
            &review("/selection-status"),
            patch(handlers::update_selection_status),
        )
        .route(
            &review("/extraction-status"),
            patch(handlers::update_extraction_status),
        )
        .route(
            &review("/duplicated/:duplicate"),
            patch(handlers::mark_as_duplicated),
        )
        .route(&review("/history"), get(handlers::get_history))
        .route(
            &review("/reading-priority"),
            patch(handlers::update_reading_priority),
        )
        .route(&review("/answer"), patch(handlers::answer_question))
        .route(
            &review("/criteria/:criterion"),
            post(handlers::add_criterion).delete(handlers::remove_criterion),
        )
        .route(
            &review("/search-source/:search_source"),
            post(handlers::add_search_source).delete(handlers::remove_search_source),
        )
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::require_api_token,
        ))
}

/// The API router with its state attached.
pub fn build_router(state: Arc<AppState>) -> Router {
    api_router(state.clone()).with_state(state)
}
