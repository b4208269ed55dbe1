use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Question {
    pub id: Uuid,
    pub assessment_id: Uuid,
    pub question_type: String,
    pub text: String,
    pub points: i32,
    pub order: i32,
    pub explanation: Option<String>,
    pub created_by: Option<Uuid>,
    pub edited_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Mcq,
    TrueFalse,
    ShortAnswer,
    Essay,
    Matching,
    FillBlank,
}

impl QuestionType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mcq" => Some(Self::Mcq),
            "true_false" => Some(Self::TrueFalse),
            "short_answer" => Some(Self::ShortAnswer),
            "essay" => Some(Self::Essay),
            "matching" => Some(Self::Matching),
            "fill_blank" => Some(Self::FillBlank),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mcq => "mcq",
            Self::TrueFalse => "true_false",
            Self::ShortAnswer => "short_answer",
            Self::Essay => "essay",
            Self::Matching => "matching",
            Self::FillBlank => "fill_blank",
        }
    }
}
