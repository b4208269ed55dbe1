use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    Extension,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::submission_dto::{
    AutoGradeResponse, GradePayload, GradeResponse, RateResponsePayload, SaveResponsePayload,
    SubmissionFilter, SubmitResponse,
};
use crate::middleware::auth::Claims;
use crate::utils::provenance::Provenance;
use crate::AppState;

#[axum::debug_handler]
pub async fn create_submission(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(assessment_id): Path<Uuid>,
    headers: HeaderMap,
) -> crate::error::Result<Response> {
    let actor = claims.actor()?;
    let provenance = Provenance::from_headers(&headers);
    let submission = state
        .submission_service
        .create_submission(assessment_id, &actor, &provenance)
        .await?;
    tracing::info!(
        submission_id = %submission.id,
        attempt = submission.attempt_number,
        "submission created"
    );
    Ok((StatusCode::CREATED, Json(submission)).into_response())
}

#[axum::debug_handler]
pub async fn list_submissions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(assessment_id): Path<Uuid>,
    Query(filter): Query<SubmissionFilter>,
) -> crate::error::Result<Response> {
    let actor = claims.actor()?;
    let page = state
        .submission_service
        .list(assessment_id, filter, &actor)
        .await?;
    Ok(Json(page).into_response())
}

#[axum::debug_handler]
pub async fn get_submission(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(submission_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let actor = claims.actor()?;
    let submission = state
        .submission_service
        .get_checked(submission_id, &actor)
        .await?;
    Ok(Json(submission).into_response())
}

#[axum::debug_handler]
pub async fn list_responses(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(submission_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let actor = claims.actor()?;
    let responses = state
        .submission_service
        .list_responses(submission_id, &actor)
        .await?;
    Ok(Json(responses).into_response())
}

#[axum::debug_handler]
pub async fn save_response(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(submission_id): Path<Uuid>,
    Json(payload): Json<SaveResponsePayload>,
) -> crate::error::Result<Response> {
    payload.validate()?;
    let actor = claims.actor()?;
    let response = state
        .submission_service
        .save_response(submission_id, payload, &actor)
        .await?;
    Ok(Json(response).into_response())
}

#[axum::debug_handler]
pub async fn submit_submission(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(submission_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let actor = claims.actor()?;
    let submission = state.submission_service.submit(submission_id, &actor).await?;
    tracing::info!(submission_id = %submission_id, status = %submission.status, "submission handed in");
    let submitted_at = submission
        .submitted_at
        .ok_or_else(|| crate::error::Error::Internal("submitted_at not set".to_string()))?;
    Ok(Json(SubmitResponse {
        submission_id: submission.id,
        status: submission.status,
        submitted_at,
    })
    .into_response())
}

#[axum::debug_handler]
pub async fn grade_submission(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(submission_id): Path<Uuid>,
    Json(payload): Json<GradePayload>,
) -> crate::error::Result<Response> {
    let actor = claims.actor()?;
    let submission = state
        .submission_service
        .grade(submission_id, payload, &actor)
        .await?;
    let score = submission
        .score
        .and_then(|d| rust_decimal::prelude::ToPrimitive::to_f64(&d))
        .unwrap_or(0.0);
    Ok(Json(GradeResponse {
        submission_id: submission.id,
        status: submission.status,
        score,
    })
    .into_response())
}

#[axum::debug_handler]
pub async fn auto_grade_submission(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(submission_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let actor = claims.actor()?;
    let (submission, score, is_passed) = state
        .submission_service
        .auto_grade(submission_id, &actor)
        .await?;
    tracing::info!(
        submission_id = %submission_id,
        score,
        is_passed,
        "submission auto-graded"
    );
    Ok(Json(AutoGradeResponse {
        submission_id: submission.id,
        status: submission.status,
        score,
        is_passed,
    })
    .into_response())
}

#[axum::debug_handler]
pub async fn rate_response(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(response_id): Path<Uuid>,
    Json(payload): Json<RateResponsePayload>,
) -> crate::error::Result<Response> {
    payload.validate()?;
    let actor = claims.actor()?;
    let rating = state
        .submission_service
        .rate_response(response_id, payload, &actor)
        .await?;
    Ok(Json(rating).into_response())
}
