use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Assessment {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub instructions: Option<String>,
    pub assessment_type: String,
    pub status: String,
    pub due_date: DateTime<Utc>,
    pub time_limit: Option<i32>,
    pub passing_score: i32,
    pub max_attempts: i32,
    pub shuffle_questions: bool,
    pub show_correct_answers: bool,
    pub created_by: Option<Uuid>,
    pub edited_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Assessment {
    /// Active means the lifecycle state is `active` and the due date is
    /// strictly in the future.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status == AssessmentStatus::Active.as_str() && self.due_date > now
    }

    pub fn status(&self) -> Result<AssessmentStatus> {
        AssessmentStatus::parse(&self.status)
            .ok_or_else(|| Error::Internal(format!("Unknown assessment status '{}'", self.status)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentStatus {
    Draft,
    Published,
    Active,
    Inactive,
}

impl AssessmentStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "published" => Some(Self::Published),
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    /// draft -> published. Any other source state is rejected.
    pub fn publish(self) -> Result<Self> {
        match self {
            Self::Draft => Ok(Self::Published),
            _ => Err(Error::InvalidState(
                "Only draft assessments can be published".to_string(),
            )),
        }
    }

    /// published | inactive -> active.
    pub fn activate(self) -> Result<Self> {
        match self {
            Self::Published | Self::Inactive => Ok(Self::Active),
            _ => Err(Error::InvalidState(
                "Only published or inactive assessments can be activated".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentType {
    Quiz,
    Assignment,
    PeerAssessment,
    CertificationExam,
}

impl AssessmentType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "quiz" => Some(Self::Quiz),
            "assignment" => Some(Self::Assignment),
            "peer_assessment" => Some(Self::PeerAssessment),
            "certification_exam" => Some(Self::CertificationExam),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quiz => "quiz",
            Self::Assignment => "assignment",
            Self::PeerAssessment => "peer_assessment",
            Self::CertificationExam => "certification_exam",
        }
    }
}
