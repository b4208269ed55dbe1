use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateAssessmentPayload {
    pub course_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub description: Option<String>,
    pub instructions: Option<String>,
    #[serde(rename = "type")]
    pub assessment_type: String,
    /// Accepts `draft` (default) or `inactive` for imported content.
    /// Every other lifecycle state is reached via publish/activate.
    pub status: Option<String>,
    pub due_date: chrono::DateTime<chrono::Utc>,
    #[validate(range(min = 1))]
    pub time_limit: Option<i32>,
    #[validate(range(min = 0, max = 100))]
    pub passing_score: Option<i32>,
    /// 0 means unlimited.
    #[validate(range(min = 0))]
    pub max_attempts: Option<i32>,
    pub shuffle_questions: Option<bool>,
    pub show_correct_answers: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateAssessmentPayload {
    #[serde(default, deserialize_with = "trim_optional_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "trim_optional_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "trim_optional_string")]
    pub instructions: Option<String>,
    pub due_date: Option<chrono::DateTime<chrono::Utc>>,
    #[validate(range(min = 1))]
    pub time_limit: Option<i32>,
    #[validate(range(min = 0, max = 100))]
    pub passing_score: Option<i32>,
    #[validate(range(min = 0))]
    pub max_attempts: Option<i32>,
    pub shuffle_questions: Option<bool>,
    pub show_correct_answers: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssessmentFilter {
    pub course_id: Option<Uuid>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub assessment_type: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PaginatedAssessments {
    pub items: Vec<crate::models::assessment::Assessment>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateQuestionPayload {
    #[serde(rename = "type")]
    pub question_type: String,
    #[validate(length(min = 1))]
    pub text: String,
    #[validate(range(min = 1))]
    pub points: Option<i32>,
    pub order: Option<i32>,
    pub explanation: Option<String>,
    #[serde(default)]
    pub options: Vec<CreateOptionPayload>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateQuestionPayload {
    #[serde(default, deserialize_with = "trim_optional_string")]
    pub text: Option<String>,
    #[validate(range(min = 1))]
    pub points: Option<i32>,
    pub order: Option<i32>,
    #[serde(default, deserialize_with = "trim_optional_string")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateOptionPayload {
    #[validate(length(min = 1))]
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
    pub order: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRubricPayload {
    #[validate(length(min = 1, max = 200))]
    pub criterion: String,
    pub description: Option<String>,
    #[validate(range(min = 1, max = 100))]
    pub weight: Option<i32>,
    pub order: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateRubricPayload {
    #[serde(default, deserialize_with = "trim_optional_string")]
    pub criterion: Option<String>,
    #[serde(default, deserialize_with = "trim_optional_string")]
    pub description: Option<String>,
    #[validate(range(min = 1, max = 100))]
    pub weight: Option<i32>,
    pub order: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct QuestionStat {
    pub question_id: Uuid,
    pub question_text: String,
    pub correct_count: i64,
    pub total_responses: i64,
    pub correct_percentage: f64,
}

#[derive(Debug, Serialize)]
pub struct StatisticsResponse {
    pub total_submissions: i64,
    pub graded_submissions: i64,
    pub average_score: Option<f64>,
    pub pass_rate: f64,
    pub question_stats: Vec<QuestionStat>,
}

// Trims strings and turns empty ones into None so PATCH bodies can't blank
// out required columns by accident.
fn trim_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }))
}
