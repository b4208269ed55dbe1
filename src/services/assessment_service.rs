use crate::dto::assessment_dto::{
    AssessmentFilter, CreateAssessmentPayload, PaginatedAssessments, QuestionStat,
    StatisticsResponse, UpdateAssessmentPayload,
};
use crate::error::{Error, Result};
use crate::models::assessment::{Assessment, AssessmentStatus, AssessmentType};
use crate::services::audit_service::AuditService;
use crate::services::role_service::{Actor, RoleService};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct AssessmentService {
    pool: PgPool,
    roles: RoleService,
    audit: AuditService,
}

impl AssessmentService {
    pub fn new(pool: PgPool) -> Self {
        let roles = RoleService::new(pool.clone());
        let audit = AuditService::new(pool.clone());
        Self { pool, roles, audit }
    }

    pub async fn create(&self, payload: CreateAssessmentPayload, actor: &Actor) -> Result<Assessment> {
        self.roles
            .require_course_manager(actor, payload.course_id, "create assessments")
            .await?;

        let assessment_type = AssessmentType::parse(&payload.assessment_type).ok_or_else(|| {
            Error::Validation(format!(
                "Unknown assessment type '{}'",
                payload.assessment_type
            ))
        })?;

        // Lifecycle states other than draft are reached through
        // publish/activate; inactive is allowed here for imported content.
        let status = match payload.status.as_deref() {
            None => AssessmentStatus::Draft,
            Some(raw) => match AssessmentStatus::parse(raw) {
                Some(s @ (AssessmentStatus::Draft | AssessmentStatus::Inactive)) => s,
                Some(_) => {
                    return Err(Error::Validation(
                        "New assessments may only start as draft or inactive".to_string(),
                    ))
                }
                None => {
                    return Err(Error::Validation(format!(
                        "Unknown assessment status '{}'",
                        raw
                    )))
                }
            },
        };

        let assessment = sqlx::query_as::<_, Assessment>(
            r#"
            INSERT INTO assessments (
                course_id, title, description, instructions, assessment_type, status,
                due_date, time_limit, passing_score, max_attempts,
                shuffle_questions, show_correct_answers, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(payload.course_id)
        .bind(&payload.title)
        .bind(&payload.description)
        .bind(&payload.instructions)
        .bind(assessment_type.as_str())
        .bind(status.as_str())
        .bind(payload.due_date)
        .bind(payload.time_limit)
        .bind(payload.passing_score.unwrap_or(70))
        .bind(payload.max_attempts.unwrap_or(1))
        .bind(payload.shuffle_questions.unwrap_or(false))
        .bind(payload.show_correct_answers.unwrap_or(false))
        .bind(actor.id)
        .fetch_one(&self.pool)
        .await?;

        Ok(assessment)
    }

    pub async fn get_by_id(&self, assessment_id: Uuid) -> Result<Assessment> {
        let assessment =
            sqlx::query_as::<_, Assessment>(r#"SELECT * FROM assessments WHERE id = $1"#)
                .bind(assessment_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(assessment)
    }

    /// Learners only see assessments of courses they are enrolled in;
    /// instructors additionally see courses they teach. Staff see all.
    pub async fn list(&self, filter: AssessmentFilter, actor: &Actor) -> Result<PaginatedAssessments> {
        let page = filter.page.unwrap_or(1).max(1);
        let per_page = filter.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * per_page;
        let restrict_to_member = !actor.is_staff();

        let rows = sqlx::query_as::<_, Assessment>(
            r#"
            SELECT a.* FROM assessments a
            WHERE ($1::uuid IS NULL OR a.course_id = $1)
              AND ($2::text IS NULL OR a.status = $2)
              AND ($3::text IS NULL OR a.assessment_type = $3)
              AND (
                    $4::boolean = FALSE
                    OR EXISTS (
                        SELECT 1 FROM enrollments e
                        WHERE e.course_id = a.course_id AND e.user_id = $5 AND e.is_active = TRUE
                    )
                    OR EXISTS (
                        SELECT 1 FROM course_instructors ci
                        WHERE ci.course_id = a.course_id AND ci.user_id = $5
                    )
              )
            ORDER BY a.created_at DESC
            LIMIT $6 OFFSET $7
            "#,
        )
        .bind(filter.course_id)
        .bind(&filter.status)
        .bind(&filter.assessment_type)
        .bind(restrict_to_member)
        .bind(actor.id)
        .bind(per_page)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM assessments a
            WHERE ($1::uuid IS NULL OR a.course_id = $1)
              AND ($2::text IS NULL OR a.status = $2)
              AND ($3::text IS NULL OR a.assessment_type = $3)
              AND (
                    $4::boolean = FALSE
                    OR EXISTS (
                        SELECT 1 FROM enrollments e
                        WHERE e.course_id = a.course_id AND e.user_id = $5 AND e.is_active = TRUE
                    )
                    OR EXISTS (
                        SELECT 1 FROM course_instructors ci
                        WHERE ci.course_id = a.course_id AND ci.user_id = $5
                    )
              )
            "#,
        )
        .bind(filter.course_id)
        .bind(&filter.status)
        .bind(&filter.assessment_type)
        .bind(restrict_to_member)
        .bind(actor.id)
        .fetch_one(&self.pool)
        .await?;

        Ok(PaginatedAssessments {
            items: rows,
            total,
            page,
            per_page,
            total_pages: (total + per_page - 1) / per_page,
        })
    }

    /// Status is deliberately not updatable here; publish/activate own it.
    pub async fn update(
        &self,
        assessment_id: Uuid,
        payload: UpdateAssessmentPayload,
        actor: &Actor,
    ) -> Result<Assessment> {
        let existing = self.get_by_id(assessment_id).await?;
        self.roles
            .require_course_manager(actor, existing.course_id, "modify assessments")
            .await?;

        let assessment = sqlx::query_as::<_, Assessment>(
            r#"
            UPDATE assessments
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                instructions = COALESCE($4, instructions),
                due_date = COALESCE($5, due_date),
                time_limit = COALESCE($6, time_limit),
                passing_score = COALESCE($7, passing_score),
                max_attempts = COALESCE($8, max_attempts),
                shuffle_questions = COALESCE($9, shuffle_questions),
                show_correct_answers = COALESCE($10, show_correct_answers),
                edited_by = $11,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(assessment_id)
        .bind(&payload.title)
        .bind(&payload.description)
        .bind(&payload.instructions)
        .bind(payload.due_date)
        .bind(payload.time_limit)
        .bind(payload.passing_score)
        .bind(payload.max_attempts)
        .bind(payload.shuffle_questions)
        .bind(payload.show_correct_answers)
        .bind(actor.id)
        .fetch_one(&self.pool)
        .await?;

        Ok(assessment)
    }

    pub async fn delete(&self, assessment_id: Uuid, actor: &Actor) -> Result<()> {
        let existing = self.get_by_id(assessment_id).await?;
        self.roles
            .require_course_manager(actor, existing.course_id, "delete assessments")
            .await?;

        sqlx::query(r#"DELETE FROM assessments WHERE id = $1"#)
            .bind(assessment_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn publish(&self, assessment_id: Uuid, actor: &Actor) -> Result<Assessment> {
        self.transition(assessment_id, actor, "publish", AssessmentStatus::publish)
            .await
    }

    pub async fn activate(&self, assessment_id: Uuid, actor: &Actor) -> Result<Assessment> {
        self.transition(assessment_id, actor, "activate", AssessmentStatus::activate)
            .await
    }

    async fn transition(
        &self,
        assessment_id: Uuid,
        actor: &Actor,
        action: &str,
        step: fn(AssessmentStatus) -> Result<AssessmentStatus>,
    ) -> Result<Assessment> {
        let assessment = self.get_by_id(assessment_id).await?;
        self.roles
            .require_course_manager(actor, assessment.course_id, &format!("{} this assessment", action))
            .await?;

        let current = assessment.status()?;
        let next = step(current)?;

        // Guarded on the source status so a concurrent transition loses
        // cleanly instead of double-applying.
        let updated = sqlx::query_as::<_, Assessment>(
            r#"
            UPDATE assessments
            SET status = $2, edited_by = $3, updated_at = NOW()
            WHERE id = $1 AND status = $4
            RETURNING *
            "#,
        )
        .bind(assessment_id)
        .bind(next.as_str())
        .bind(actor.id)
        .bind(current.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            Error::InvalidState(format!(
                "Assessment is no longer in state '{}'",
                current.as_str()
            ))
        })?;

        self.audit
            .log(
                Some(actor.id),
                action,
                "assessment",
                assessment_id,
                Some(json!({ "from": current.as_str(), "to": next.as_str() })),
                None,
                None,
            )
            .await?;

        Ok(updated)
    }

    pub async fn statistics(&self, assessment_id: Uuid, actor: &Actor) -> Result<StatisticsResponse> {
        let assessment = self.get_by_id(assessment_id).await?;
        self.roles
            .require_course_manager(actor, assessment.course_id, "view statistics")
            .await?;

        let (total, graded, average, passed) = sqlx::query_as::<_, (i64, i64, Option<Decimal>, i64)>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status IN ('submitted', 'late', 'graded')),
                COUNT(*) FILTER (WHERE status = 'graded'),
                AVG(score) FILTER (WHERE status = 'graded'),
                COUNT(*) FILTER (WHERE status = 'graded' AND score >= $2)
            FROM assessment_submissions
            WHERE assessment_id = $1
            "#,
        )
        .bind(assessment_id)
        .bind(Decimal::from(assessment.passing_score))
        .fetch_one(&self.pool)
        .await?;

        let mut question_stats = Vec::new();
        if assessment.assessment_type == AssessmentType::Quiz.as_str() {
            let rows = sqlx::query_as::<_, (Uuid, String, i64, i64)>(
                r#"
                SELECT q.id, q.text,
                       COUNT(r.id) FILTER (WHERE r.is_correct),
                       COUNT(r.id)
                FROM questions q
                LEFT JOIN question_responses r
                  ON r.question_id = q.id
                 AND r.submission_id IN (
                        SELECT id FROM assessment_submissions WHERE assessment_id = $1
                 )
                WHERE q.assessment_id = $1
                GROUP BY q.id, q.text, q."order"
                ORDER BY q."order"
                "#,
            )
            .bind(assessment_id)
            .fetch_all(&self.pool)
            .await?;

            for (question_id, text, correct_count, total_responses) in rows {
                question_stats.push(QuestionStat {
                    question_id,
                    question_text: text.chars().take(100).collect(),
                    correct_count,
                    total_responses,
                    correct_percentage: rate(correct_count, total_responses),
                });
            }
        }

        Ok(StatisticsResponse {
            total_submissions: total,
            graded_submissions: graded,
            average_score: average.and_then(|d| d.to_f64()),
            pass_rate: rate(passed, graded),
            question_stats,
        })
    }
}

/// numerator / denominator as a percentage, with 0 for an empty denominator
/// rather than a division error.
fn rate(numerator: i64, denominator: i64) -> f64 {
    if denominator > 0 {
        numerator as f64 / denominator as f64 * 100.0
    } else {
        0.0
    }
}
