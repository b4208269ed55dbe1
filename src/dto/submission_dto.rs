use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SaveResponsePayload {
    pub question_id: Uuid,
    pub text_response: Option<String>,
    #[serde(default)]
    pub selected_option_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GradePayload {
    /// Accepted as a bare number or a numeric string; anything else is a
    /// validation error. No range is enforced, the caller owns the scale.
    pub score: serde_json::Value,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RateResponsePayload {
    pub rubric_id: Uuid,
    #[validate(range(min = 0.0))]
    pub rating: f64,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionFilter {
    pub user_id: Option<Uuid>,
    pub status: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PaginatedSubmissions {
    pub items: Vec<crate::models::submission::AssessmentSubmission>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub submission_id: Uuid,
    pub status: String,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct GradeResponse {
    pub submission_id: Uuid,
    pub status: String,
    pub score: f64,
}

#[derive(Debug, Serialize)]
pub struct AutoGradeResponse {
    pub submission_id: Uuid,
    pub status: String,
    pub score: f64,
    pub is_passed: bool,
}
