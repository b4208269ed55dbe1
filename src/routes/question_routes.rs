use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::dto::assessment_dto::{CreateOptionPayload, CreateQuestionPayload, UpdateQuestionPayload};
use crate::middleware::auth::Claims;
use crate::AppState;

#[axum::debug_handler]
pub async fn list_questions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(assessment_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let _ = claims.actor()?;
    let questions = state.question_service.list_questions(assessment_id).await?;
    Ok(Json(questions).into_response())
}

#[axum::debug_handler]
pub async fn create_question(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(assessment_id): Path<Uuid>,
    Json(payload): Json<CreateQuestionPayload>,
) -> crate::error::Result<Response> {
    payload.validate()?;
    let actor = claims.actor()?;
    let question = state
        .question_service
        .create_question(assessment_id, payload, &actor)
        .await?;
    Ok((StatusCode::CREATED, Json(question)).into_response())
}

#[axum::debug_handler]
pub async fn delete_all_questions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(assessment_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let actor = claims.actor()?;
    let deleted = state
        .question_service
        .delete_all_questions(assessment_id, &actor)
        .await?;
    Ok(Json(json!({ "deleted": deleted })).into_response())
}

#[axum::debug_handler]
pub async fn update_question(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(question_id): Path<Uuid>,
    Json(payload): Json<UpdateQuestionPayload>,
) -> crate::error::Result<Response> {
    payload.validate()?;
    let actor = claims.actor()?;
    let question = state
        .question_service
        .update_question(question_id, payload, &actor)
        .await?;
    Ok(Json(question).into_response())
}

#[axum::debug_handler]
pub async fn delete_question(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(question_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let actor = claims.actor()?;
    state
        .question_service
        .delete_question(question_id, &actor)
        .await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[axum::debug_handler]
pub async fn list_options(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(question_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let _ = claims.actor()?;
    let options = state.question_service.list_options(question_id).await?;
    Ok(Json(options).into_response())
}

#[axum::debug_handler]
pub async fn add_option(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(question_id): Path<Uuid>,
    Json(payload): Json<CreateOptionPayload>,
) -> crate::error::Result<Response> {
    payload.validate()?;
    let actor = claims.actor()?;
    let option = state
        .question_service
        .add_option(question_id, payload, &actor)
        .await?;
    Ok((StatusCode::CREATED, Json(option)).into_response())
}

#[axum::debug_handler]
pub async fn delete_option(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(option_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let actor = claims.actor()?;
    state.question_service.delete_option(option_id, &actor).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
