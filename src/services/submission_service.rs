use crate::dto::submission_dto::{
    GradePayload, PaginatedSubmissions, RateResponsePayload, SaveResponsePayload, SubmissionFilter,
};
use crate::error::{Error, Result};
use crate::models::assessment::{Assessment, AssessmentType};
use crate::models::question::QuestionType;
use crate::models::response::QuestionResponse;
use crate::models::rubric_rating::RubricRating;
use crate::models::submission::{AssessmentSubmission, SubmissionStatus};
use crate::services::audit_service::AuditService;
use crate::services::grading_service::{GradingService, ResponseInput};
use crate::services::role_service::{Actor, RoleService};
use crate::utils::provenance::Provenance;
use chrono::Utc;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

// Conflict retries for attempt-number allocation. A retry re-reads the
// count the winning transaction just committed.
const ATTEMPT_ALLOC_RETRIES: u32 = 3;

#[derive(Clone)]
pub struct SubmissionService {
    pool: PgPool,
    roles: RoleService,
    audit: AuditService,
}

impl SubmissionService {
    pub fn new(pool: PgPool) -> Self {
        let roles = RoleService::new(pool.clone());
        let audit = AuditService::new(pool.clone());
        Self { pool, roles, audit }
    }

    async fn assessment_of(&self, submission: &AssessmentSubmission) -> Result<Assessment> {
        let assessment =
            sqlx::query_as::<_, Assessment>(r#"SELECT * FROM assessments WHERE id = $1"#)
                .bind(submission.assessment_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(assessment)
    }

    pub async fn get_by_id(&self, submission_id: Uuid) -> Result<AssessmentSubmission> {
        let submission = sqlx::query_as::<_, AssessmentSubmission>(
            r#"SELECT * FROM assessment_submissions WHERE id = $1"#,
        )
        .bind(submission_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(submission)
    }

    /// Owner, staff/admin, or an instructor of the assessment's course.
    async fn can_access(&self, actor: &Actor, submission: &AssessmentSubmission) -> Result<bool> {
        if submission.user_id == actor.id || actor.is_staff() {
            return Ok(true);
        }
        let assessment = self.assessment_of(submission).await?;
        self.roles
            .is_course_instructor(actor.id, assessment.course_id)
            .await
    }

    /// Opens a new draft attempt. Precondition order matters: active state,
    /// deadline, enrollment, then the attempt limit.
    ///
    /// The count and the insert run in one transaction and the
    /// `submissions_attempt_unique` constraint backs them up: of two
    /// concurrent creations one hits the conflict, retries, re-reads the
    /// committed count, and either gets the next number or the limit error.
    pub async fn create_submission(
        &self,
        assessment_id: Uuid,
        actor: &Actor,
        provenance: &Provenance,
    ) -> Result<AssessmentSubmission> {
        let assessment =
            sqlx::query_as::<_, Assessment>(r#"SELECT * FROM assessments WHERE id = $1"#)
                .bind(assessment_id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| Error::NotFound("Assessment not found".to_string()))?;

        let now = Utc::now();
        if assessment.status != crate::models::assessment::AssessmentStatus::Active.as_str() {
            return Err(Error::InvalidState(
                "You can only submit to active assessments".to_string(),
            ));
        }
        if assessment.due_date < now {
            return Err(Error::DeadlineExceeded(
                "The due date for this assessment has passed".to_string(),
            ));
        }
        if !actor.is_staff() && !self.roles.is_enrolled(actor.id, assessment.course_id).await? {
            return Err(Error::PermissionDenied(
                "You are not enrolled in this course".to_string(),
            ));
        }

        let mut tries = 0;
        loop {
            let mut tx = self.pool.begin().await?;

            let prior: i64 = sqlx::query_scalar(
                r#"SELECT COUNT(*) FROM assessment_submissions
                   WHERE assessment_id = $1 AND user_id = $2"#,
            )
            .bind(assessment_id)
            .bind(actor.id)
            .fetch_one(&mut *tx)
            .await?;

            if assessment.max_attempts > 0 && prior >= assessment.max_attempts as i64 {
                return Err(Error::AttemptLimit(format!(
                    "You have reached the maximum number of attempts ({}) for this assessment",
                    assessment.max_attempts
                )));
            }

            let inserted = sqlx::query_as::<_, AssessmentSubmission>(
                r#"
                INSERT INTO assessment_submissions
                    (assessment_id, user_id, attempt_number, status, ip_address, user_agent)
                VALUES ($1, $2, $3, 'draft', $4, $5)
                RETURNING *
                "#,
            )
            .bind(assessment_id)
            .bind(actor.id)
            .bind((prior + 1) as i32)
            .bind(provenance.ip)
            .bind(&provenance.user_agent)
            .fetch_one(&mut *tx)
            .await;

            match inserted {
                Ok(submission) => {
                    tx.commit().await?;
                    return Ok(submission);
                }
                Err(sqlx::Error::Database(db_err))
                    if db_err.constraint() == Some("submissions_attempt_unique") =>
                {
                    tx.rollback().await?;
                    tries += 1;
                    if tries >= ATTEMPT_ALLOC_RETRIES {
                        return Err(Error::Internal(
                            "Could not allocate an attempt number".to_string(),
                        ));
                    }
                    tracing::debug!(
                        assessment_id = %assessment_id,
                        user_id = %actor.id,
                        "attempt number conflict, retrying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub async fn list(
        &self,
        assessment_id: Uuid,
        filter: SubmissionFilter,
        actor: &Actor,
    ) -> Result<PaginatedSubmissions> {
        let assessment =
            sqlx::query_as::<_, Assessment>(r#"SELECT * FROM assessments WHERE id = $1"#)
                .bind(assessment_id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| Error::NotFound("Assessment not found".to_string()))?;

        // Learners only ever see their own submissions.
        let privileged = self.roles.can_manage_course(actor, assessment.course_id).await?;
        let user_scope = if privileged { filter.user_id } else { Some(actor.id) };

        let page = filter.page.unwrap_or(1).max(1);
        let per_page = filter.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * per_page;

        let rows = sqlx::query_as::<_, AssessmentSubmission>(
            r#"
            SELECT * FROM assessment_submissions
            WHERE assessment_id = $1
              AND ($2::uuid IS NULL OR user_id = $2)
              AND ($3::text IS NULL OR status = $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(assessment_id)
        .bind(user_scope)
        .bind(&filter.status)
        .bind(per_page)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM assessment_submissions
            WHERE assessment_id = $1
              AND ($2::uuid IS NULL OR user_id = $2)
              AND ($3::text IS NULL OR status = $3)
            "#,
        )
        .bind(assessment_id)
        .bind(user_scope)
        .bind(&filter.status)
        .fetch_one(&self.pool)
        .await?;

        Ok(PaginatedSubmissions {
            items: rows,
            total,
            page,
            per_page,
            total_pages: (total + per_page - 1) / per_page,
        })
    }

    pub async fn get_checked(&self, submission_id: Uuid, actor: &Actor) -> Result<AssessmentSubmission> {
        let submission = self.get_by_id(submission_id).await?;
        if !self.can_access(actor, &submission).await? {
            return Err(Error::PermissionDenied(
                "You don't have permission to access this submission".to_string(),
            ));
        }
        Ok(submission)
    }

    /// Upserts the (submission, question) response. Only the owner (or
    /// staff) may answer, and only while the submission is still a draft.
    pub async fn save_response(
        &self,
        submission_id: Uuid,
        payload: SaveResponsePayload,
        actor: &Actor,
    ) -> Result<QuestionResponse> {
        let submission = self.get_by_id(submission_id).await?;
        if submission.user_id != actor.id && !actor.is_staff() {
            return Err(Error::PermissionDenied(
                "You don't have permission to answer for this submission".to_string(),
            ));
        }
        if submission.status != SubmissionStatus::Draft.as_str() {
            return Err(Error::InvalidState(
                "Responses can only be changed while the submission is a draft".to_string(),
            ));
        }

        // The question must belong to this submission's assessment.
        let question_assessment: Option<Uuid> =
            sqlx::query_scalar(r#"SELECT assessment_id FROM questions WHERE id = $1"#)
                .bind(payload.question_id)
                .fetch_optional(&self.pool)
                .await?;
        match question_assessment {
            Some(aid) if aid == submission.assessment_id => {}
            Some(_) => {
                return Err(Error::Validation(
                    "Question does not belong to this assessment".to_string(),
                ))
            }
            None => return Err(Error::NotFound("Question not found".to_string())),
        }

        if !payload.selected_option_ids.is_empty() {
            let owned: i64 = sqlx::query_scalar(
                r#"SELECT COUNT(*) FROM question_options
                   WHERE question_id = $1 AND id = ANY($2)"#,
            )
            .bind(payload.question_id)
            .bind(&payload.selected_option_ids)
            .fetch_one(&self.pool)
            .await?;
            if owned != payload.selected_option_ids.len() as i64 {
                return Err(Error::Validation(
                    "Selected options must belong to the question".to_string(),
                ));
            }
        }

        let mut tx = self.pool.begin().await?;

        let response = sqlx::query_as::<_, QuestionResponse>(
            r#"
            INSERT INTO question_responses (submission_id, question_id, text_response)
            VALUES ($1, $2, $3)
            ON CONFLICT (submission_id, question_id)
            DO UPDATE SET text_response = EXCLUDED.text_response, updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(submission_id)
        .bind(payload.question_id)
        .bind(&payload.text_response)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(r#"DELETE FROM response_options WHERE response_id = $1"#)
            .bind(response.id)
            .execute(&mut *tx)
            .await?;
        for option_id in &payload.selected_option_ids {
            sqlx::query(r#"INSERT INTO response_options (response_id, option_id) VALUES ($1, $2)"#)
                .bind(response.id)
                .bind(option_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(response)
    }

    pub async fn list_responses(
        &self,
        submission_id: Uuid,
        actor: &Actor,
    ) -> Result<Vec<QuestionResponse>> {
        let submission = self.get_checked(submission_id, actor).await?;
        let rows = sqlx::query_as::<_, QuestionResponse>(
            r#"SELECT * FROM question_responses WHERE submission_id = $1 ORDER BY created_at"#,
        )
        .bind(submission.id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// draft -> submitted | late. Irreversible; nothing returns a submission
    /// to draft.
    pub async fn submit(&self, submission_id: Uuid, actor: &Actor) -> Result<AssessmentSubmission> {
        let submission = self.get_by_id(submission_id).await?;
        if !self.can_access(actor, &submission).await? {
            return Err(Error::PermissionDenied(
                "You don't have permission to submit this assessment".to_string(),
            ));
        }
        if submission.status != SubmissionStatus::Draft.as_str() {
            return Err(Error::InvalidState(
                "This assessment has already been submitted".to_string(),
            ));
        }

        let responses: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM question_responses WHERE submission_id = $1"#,
        )
        .bind(submission_id)
        .fetch_one(&self.pool)
        .await?;
        if responses == 0 {
            return Err(Error::Validation(
                "Cannot submit an assessment with no responses".to_string(),
            ));
        }

        let assessment = self.assessment_of(&submission).await?;
        let now = Utc::now();
        let next = if now > assessment.due_date {
            SubmissionStatus::Late
        } else {
            SubmissionStatus::Submitted
        };

        // Status guard makes a concurrent double-submit lose its race.
        let updated = sqlx::query_as::<_, AssessmentSubmission>(
            r#"
            UPDATE assessment_submissions
            SET status = $2, submitted_at = $3, updated_at = NOW()
            WHERE id = $1 AND status = 'draft'
            RETURNING *
            "#,
        )
        .bind(submission_id)
        .bind(next.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            Error::InvalidState("This assessment has already been submitted".to_string())
        })?;

        self.audit
            .log(
                Some(actor.id),
                "submit",
                "submission",
                submission_id,
                Some(json!({ "status": next.as_str() })),
                None,
                None,
            )
            .await?;

        Ok(updated)
    }

    /// Manual grading by an instructor or staff. The score is caller-scaled;
    /// only numeric parsing is enforced.
    pub async fn grade(
        &self,
        submission_id: Uuid,
        payload: GradePayload,
        actor: &Actor,
    ) -> Result<AssessmentSubmission> {
        let submission = self.get_by_id(submission_id).await?;
        let assessment = self.assessment_of(&submission).await?;
        self.roles
            .require_course_manager(actor, assessment.course_id, "grade this submission")
            .await?;

        let status = self.gradable_status(&submission)?;
        let score = parse_score(&payload.score)?;
        let score_dec = Decimal::from_f64(score)
            .ok_or_else(|| Error::Validation("Score must be a finite number".to_string()))?;

        let updated = sqlx::query_as::<_, AssessmentSubmission>(
            r#"
            UPDATE assessment_submissions
            SET score = $2, feedback = $3, status = 'graded',
                graded_at = NOW(), graded_by = $4, updated_at = NOW()
            WHERE id = $1 AND status IN ('submitted', 'late')
            RETURNING *
            "#,
        )
        .bind(submission_id)
        .bind(score_dec)
        .bind(&payload.feedback)
        .bind(actor.id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            Error::InvalidState("Only submitted assessments can be graded".to_string())
        })?;

        self.audit
            .log(
                Some(actor.id),
                "grade",
                "submission",
                submission_id,
                Some(json!({ "score": score, "from": status.as_str() })),
                None,
                None,
            )
            .await?;

        Ok(updated)
    }

    /// Deterministic quiz scoring over the stored responses. Writes the
    /// per-response verdicts and the percentage score, then moves the
    /// submission to `graded`. A second call fails the status precondition.
    pub async fn auto_grade(
        &self,
        submission_id: Uuid,
        actor: &Actor,
    ) -> Result<(AssessmentSubmission, f64, bool)> {
        let submission = self.get_by_id(submission_id).await?;
        let assessment = self.assessment_of(&submission).await?;
        self.roles
            .require_course_manager(actor, assessment.course_id, "grade this submission")
            .await?;

        if assessment.assessment_type != AssessmentType::Quiz.as_str() {
            return Err(Error::Validation(
                "Auto-grading is only available for quizzes".to_string(),
            ));
        }
        self.gradable_status(&submission)?;

        let inputs = self.load_grading_inputs(submission_id).await?;
        let outcome = GradingService::score_responses(&inputs);

        let (percentage_dec, is_passed) =
            grade_verdict(outcome.percentage, assessment.passing_score);
        let percentage = percentage_dec.to_f64().unwrap_or(0.0);

        let mut tx = self.pool.begin().await?;

        for graded in &outcome.responses {
            if let (Some(score), Some(is_correct)) = (graded.score, graded.is_correct) {
                sqlx::query(
                    r#"
                    UPDATE question_responses
                    SET score = $2, is_correct = $3, updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(graded.response_id)
                .bind(Decimal::from(score))
                .bind(is_correct)
                .execute(&mut *tx)
                .await?;
            }
        }

        let updated = sqlx::query_as::<_, AssessmentSubmission>(
            r#"
            UPDATE assessment_submissions
            SET score = $2, status = 'graded', graded_at = NOW(), graded_by = $3, updated_at = NOW()
            WHERE id = $1 AND status IN ('submitted', 'late')
            RETURNING *
            "#,
        )
        .bind(submission_id)
        .bind(percentage_dec)
        .bind(actor.id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            Error::InvalidState("Only submitted assessments can be graded".to_string())
        })?;

        tx.commit().await?;

        self.audit
            .log(
                Some(actor.id),
                "auto_grade",
                "submission",
                submission_id,
                Some(json!({
                    "total_score": outcome.total_score,
                    "max_score": outcome.max_score,
                    "percentage": percentage,
                    "is_passed": is_passed,
                })),
                None,
                None,
            )
            .await?;

        Ok((updated, percentage, is_passed))
    }

    /// Rubric-based feedback on a single response; upserted per
    /// (response, rubric). Requires a handed-in submission.
    pub async fn rate_response(
        &self,
        response_id: Uuid,
        payload: RateResponsePayload,
        actor: &Actor,
    ) -> Result<RubricRating> {
        let row = sqlx::query_as::<_, (Uuid, String, Uuid, Uuid)>(
            r#"
            SELECT s.id, s.status, a.id, a.course_id
            FROM question_responses r
            JOIN assessment_submissions s ON s.id = r.submission_id
            JOIN assessments a ON a.id = s.assessment_id
            WHERE r.id = $1
            "#,
        )
        .bind(response_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Response not found".to_string()))?;
        let (_submission_id, status, assessment_id, course_id) = row;

        self.roles
            .require_course_manager(actor, course_id, "grade this submission")
            .await?;

        let status = SubmissionStatus::parse(&status)
            .ok_or_else(|| Error::Internal(format!("Unknown submission status '{}'", status)))?;
        if status == SubmissionStatus::Draft {
            return Err(Error::InvalidState(
                "Responses of a draft submission cannot be rated".to_string(),
            ));
        }

        let rubric_assessment: Option<Uuid> =
            sqlx::query_scalar(r#"SELECT assessment_id FROM rubrics WHERE id = $1"#)
                .bind(payload.rubric_id)
                .fetch_optional(&self.pool)
                .await?;
        match rubric_assessment {
            Some(aid) if aid == assessment_id => {}
            Some(_) => {
                return Err(Error::Validation(
                    "Rubric does not belong to this assessment".to_string(),
                ))
            }
            None => return Err(Error::NotFound("Rubric not found".to_string())),
        }

        let rating_dec = Decimal::from_f64(payload.rating)
            .ok_or_else(|| Error::Validation("Rating must be a finite number".to_string()))?;

        let rating = sqlx::query_as::<_, RubricRating>(
            r#"
            INSERT INTO rubric_ratings (response_id, rubric_id, rating, feedback)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (response_id, rubric_id)
            DO UPDATE SET rating = EXCLUDED.rating, feedback = EXCLUDED.feedback, updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(response_id)
        .bind(payload.rubric_id)
        .bind(rating_dec)
        .bind(&payload.feedback)
        .fetch_one(&self.pool)
        .await?;

        Ok(rating)
    }

    fn gradable_status(&self, submission: &AssessmentSubmission) -> Result<SubmissionStatus> {
        let status = SubmissionStatus::parse(&submission.status).ok_or_else(|| {
            Error::Internal(format!("Unknown submission status '{}'", submission.status))
        })?;
        if !status.is_gradable() {
            return Err(Error::InvalidState(
                "Only submitted assessments can be graded".to_string(),
            ));
        }
        Ok(status)
    }

    async fn load_grading_inputs(&self, submission_id: Uuid) -> Result<Vec<ResponseInput>> {
        let rows = sqlx::query_as::<_, (Uuid, Uuid, String, i32)>(
            r#"
            SELECT r.id, r.question_id, q.question_type, q.points
            FROM question_responses r
            JOIN questions q ON q.id = r.question_id
            WHERE r.submission_id = $1
            "#,
        )
        .bind(submission_id)
        .fetch_all(&self.pool)
        .await?;

        let question_ids: Vec<Uuid> = rows.iter().map(|(_, qid, _, _)| *qid).collect();
        let mut correct_by_question: HashMap<Uuid, HashSet<Uuid>> = HashMap::new();
        if !question_ids.is_empty() {
            let correct = sqlx::query_as::<_, (Uuid, Uuid)>(
                r#"SELECT question_id, id FROM question_options
                   WHERE question_id = ANY($1) AND is_correct = TRUE"#,
            )
            .bind(&question_ids)
            .fetch_all(&self.pool)
            .await?;
            for (qid, oid) in correct {
                correct_by_question.entry(qid).or_default().insert(oid);
            }
        }

        let mut selected_by_response: HashMap<Uuid, HashSet<Uuid>> = HashMap::new();
        let selected = sqlx::query_as::<_, (Uuid, Uuid)>(
            r#"
            SELECT ro.response_id, ro.option_id
            FROM response_options ro
            JOIN question_responses r ON r.id = ro.response_id
            WHERE r.submission_id = $1
            "#,
        )
        .bind(submission_id)
        .fetch_all(&self.pool)
        .await?;
        for (rid, oid) in selected {
            selected_by_response.entry(rid).or_default().insert(oid);
        }

        let mut inputs = Vec::with_capacity(rows.len());
        for (response_id, question_id, question_type, points) in rows {
            let question_type = QuestionType::parse(&question_type).ok_or_else(|| {
                Error::Internal(format!("Unknown question type '{}'", question_type))
            })?;
            inputs.push(ResponseInput {
                response_id,
                question_type,
                points,
                correct_option_ids: correct_by_question
                    .remove(&question_id)
                    .unwrap_or_default(),
                selected_option_ids: selected_by_response
                    .remove(&response_id)
                    .unwrap_or_default(),
            });
        }
        Ok(inputs)
    }
}

/// The stored score is the percentage rounded to two decimal places; the
/// pass verdict compares what is stored, not the raw ratio, so the two can
/// never disagree.
fn grade_verdict(raw_percentage: f64, passing_score: i32) -> (Decimal, bool) {
    let rounded = Decimal::from_f64(raw_percentage)
        .unwrap_or_default()
        .round_dp(2);
    let passed = rounded >= Decimal::from(passing_score);
    (rounded, passed)
}

/// Accepts a bare JSON number or a numeric string.
fn parse_score(raw: &serde_json::Value) -> Result<f64> {
    let parsed = match raw {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(Error::Validation("Score must be a number".to_string())),
    }
}
