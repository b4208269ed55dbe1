use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::dto::assessment_dto::{CreateRubricPayload, UpdateRubricPayload};
use crate::middleware::auth::Claims;
use crate::AppState;

#[axum::debug_handler]
pub async fn list_rubrics(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(assessment_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let _ = claims.actor()?;
    let rubrics = state.question_service.list_rubrics(assessment_id).await?;
    Ok(Json(rubrics).into_response())
}

#[axum::debug_handler]
pub async fn create_rubric(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(assessment_id): Path<Uuid>,
    Json(payload): Json<CreateRubricPayload>,
) -> crate::error::Result<Response> {
    payload.validate()?;
    let actor = claims.actor()?;
    let rubric = state
        .question_service
        .create_rubric(assessment_id, payload, &actor)
        .await?;
    Ok((StatusCode::CREATED, Json(rubric)).into_response())
}

#[axum::debug_handler]
pub async fn delete_all_rubrics(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(assessment_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let actor = claims.actor()?;
    let deleted = state
        .question_service
        .delete_all_rubrics(assessment_id, &actor)
        .await?;
    Ok(Json(json!({ "deleted": deleted })).into_response())
}

#[axum::debug_handler]
pub async fn update_rubric(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(rubric_id): Path<Uuid>,
    Json(payload): Json<UpdateRubricPayload>,
) -> crate::error::Result<Response> {
    payload.validate()?;
    let actor = claims.actor()?;
    let rubric = state
        .question_service
        .update_rubric(rubric_id, payload, &actor)
        .await?;
    Ok(Json(rubric).into_response())
}

#[axum::debug_handler]
pub async fn delete_rubric(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(rubric_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let actor = claims.actor()?;
    state.question_service.delete_rubric(rubric_id, &actor).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
