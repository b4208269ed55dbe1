use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A weighted manual-grading criterion. Weights are percentages but are not
/// forced to sum to 100 across an assessment.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Rubric {
    pub id: Uuid,
    pub assessment_id: Uuid,
    pub criterion: String,
    pub description: Option<String>,
    pub weight: i32,
    pub order: i32,
    pub created_by: Option<Uuid>,
    pub edited_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
