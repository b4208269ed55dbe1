use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::dto::assessment_dto::{
    AssessmentFilter, CreateAssessmentPayload, UpdateAssessmentPayload,
};
use crate::middleware::auth::Claims;
use crate::AppState;

#[axum::debug_handler]
pub async fn create_assessment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateAssessmentPayload>,
) -> crate::error::Result<Response> {
    payload.validate()?;
    let actor = claims.actor()?;
    let assessment = state.assessment_service.create(payload, &actor).await?;
    Ok((StatusCode::CREATED, Json(assessment)).into_response())
}

#[axum::debug_handler]
pub async fn list_assessments(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(filter): Query<AssessmentFilter>,
) -> crate::error::Result<Response> {
    let actor = claims.actor()?;
    let page = state.assessment_service.list(filter, &actor).await?;
    Ok(Json(page).into_response())
}

#[axum::debug_handler]
pub async fn get_assessment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(assessment_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let _ = claims.actor()?;
    let assessment = state.assessment_service.get_by_id(assessment_id).await?;
    Ok(Json(assessment).into_response())
}

#[axum::debug_handler]
pub async fn update_assessment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(assessment_id): Path<Uuid>,
    Json(payload): Json<UpdateAssessmentPayload>,
) -> crate::error::Result<Response> {
    payload.validate()?;
    let actor = claims.actor()?;
    let assessment = state
        .assessment_service
        .update(assessment_id, payload, &actor)
        .await?;
    Ok(Json(assessment).into_response())
}

#[axum::debug_handler]
pub async fn delete_assessment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(assessment_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let actor = claims.actor()?;
    state
        .assessment_service
        .delete(assessment_id, &actor)
        .await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[axum::debug_handler]
pub async fn publish_assessment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(assessment_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let actor = claims.actor()?;
    let assessment = state
        .assessment_service
        .publish(assessment_id, &actor)
        .await?;
    tracing::info!(assessment_id = %assessment_id, "assessment published");
    Ok(Json(json!({ "status": assessment.status })).into_response())
}

#[axum::debug_handler]
pub async fn activate_assessment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(assessment_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let actor = claims.actor()?;
    let assessment = state
        .assessment_service
        .activate(assessment_id, &actor)
        .await?;
    tracing::info!(assessment_id = %assessment_id, "assessment activated");
    Ok(Json(json!({ "status": assessment.status })).into_response())
}

#[axum::debug_handler]
pub async fn assessment_statistics(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(assessment_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let actor = claims.actor()?;
    let stats = state
        .assessment_service
        .statistics(assessment_id, &actor)
        .await?;
    Ok(Json(stats).into_response())
}
