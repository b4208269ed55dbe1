use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AssessmentSubmission {
    pub id: Uuid,
    pub assessment_id: Uuid,
    pub user_id: Uuid,
    pub attempt_number: i32,
    pub status: String,
    pub score: Option<Decimal>,
    pub feedback: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub graded_at: Option<DateTime<Utc>>,
    pub graded_by: Option<Uuid>,
    pub ip_address: Option<sqlx::types::ipnetwork::IpNetwork>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AssessmentSubmission {
    pub fn is_late(&self, due_date: DateTime<Utc>) -> bool {
        match self.submitted_at {
            Some(at) => at > due_date,
            None => false,
        }
    }

    pub fn is_passed(&self, passing_score: i32) -> bool {
        match self.score {
            Some(score) => score >= Decimal::from(passing_score),
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Draft,
    Submitted,
    Late,
    Graded,
}

impl SubmissionStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "submitted" => Some(Self::Submitted),
            "late" => Some(Self::Late),
            "graded" => Some(Self::Graded),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Late => "late",
            Self::Graded => "graded",
        }
    }

    /// Grading is legal only once the learner has handed the work in.
    pub fn is_gradable(&self) -> bool {
        matches!(self, Self::Submitted | Self::Late)
    }
}
