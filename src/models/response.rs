use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One answer within a submission, unique per (submission, question).
/// `score` and `is_correct` are written only by the grading operations.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuestionResponse {
    pub id: Uuid,
    pub submission_id: Uuid,
    pub question_id: Uuid,
    pub text_response: Option<String>,
    pub score: Option<rust_decimal::Decimal>,
    pub feedback: Option<String>,
    pub is_correct: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
