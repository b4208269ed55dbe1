use crate::dto::assessment_dto::{
    CreateOptionPayload, CreateQuestionPayload, CreateRubricPayload, UpdateQuestionPayload,
    UpdateRubricPayload,
};
use crate::error::{Error, Result};
use crate::models::question::{Question, QuestionType};
use crate::models::question_option::QuestionOption;
use crate::models::rubric::Rubric;
use crate::services::role_service::{Actor, RoleService};
use sqlx::PgPool;
use uuid::Uuid;

/// Authoring of assessment content: questions, their options, and rubrics.
/// All mutations require staff/admin or an instructor of the course.
#[derive(Clone)]
pub struct QuestionService {
    pool: PgPool,
    roles: RoleService,
}

impl QuestionService {
    pub fn new(pool: PgPool) -> Self {
        let roles = RoleService::new(pool.clone());
        Self { pool, roles }
    }

    async fn course_of_assessment(&self, assessment_id: Uuid) -> Result<Uuid> {
        let course_id: Uuid =
            sqlx::query_scalar(r#"SELECT course_id FROM assessments WHERE id = $1"#)
                .bind(assessment_id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| Error::NotFound("Assessment not found".to_string()))?;
        Ok(course_id)
    }

    async fn course_of_question(&self, question_id: Uuid) -> Result<Uuid> {
        let course_id: Uuid = sqlx::query_scalar(
            r#"
            SELECT a.course_id FROM questions q
            JOIN assessments a ON a.id = q.assessment_id
            WHERE q.id = $1
            "#,
        )
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Question not found".to_string()))?;
        Ok(course_id)
    }

    pub async fn create_question(
        &self,
        assessment_id: Uuid,
        payload: CreateQuestionPayload,
        actor: &Actor,
    ) -> Result<Question> {
        let course_id = self.course_of_assessment(assessment_id).await?;
        self.roles
            .require_course_manager(actor, course_id, "modify questions")
            .await?;

        let question_type = QuestionType::parse(&payload.question_type).ok_or_else(|| {
            Error::Validation(format!("Unknown question type '{}'", payload.question_type))
        })?;

        let mut tx = self.pool.begin().await?;

        let question = sqlx::query_as::<_, Question>(
            r#"
            INSERT INTO questions (assessment_id, question_type, text, points, "order", explanation, created_by)
            VALUES (
                $1, $2, $3, $4,
                COALESCE($5, (SELECT COALESCE(MAX("order") + 1, 0) FROM questions WHERE assessment_id = $1)),
                $6, $7
            )
            RETURNING *
            "#,
        )
        .bind(assessment_id)
        .bind(question_type.as_str())
        .bind(&payload.text)
        .bind(payload.points.unwrap_or(1))
        .bind(payload.order)
        .bind(&payload.explanation)
        .bind(actor.id)
        .fetch_one(&mut *tx)
        .await?;

        for (idx, option) in payload.options.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO question_options (question_id, text, is_correct, "order")
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(question.id)
            .bind(&option.text)
            .bind(option.is_correct)
            .bind(option.order.unwrap_or(idx as i32))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(question)
    }

    pub async fn list_questions(&self, assessment_id: Uuid) -> Result<Vec<Question>> {
        let rows = sqlx::query_as::<_, Question>(
            r#"SELECT * FROM questions WHERE assessment_id = $1 ORDER BY "order""#,
        )
        .bind(assessment_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn update_question(
        &self,
        question_id: Uuid,
        payload: UpdateQuestionPayload,
        actor: &Actor,
    ) -> Result<Question> {
        let course_id = self.course_of_question(question_id).await?;
        self.roles
            .require_course_manager(actor, course_id, "modify questions")
            .await?;

        let question = sqlx::query_as::<_, Question>(
            r#"
            UPDATE questions
            SET text = COALESCE($2, text),
                points = COALESCE($3, points),
                "order" = COALESCE($4, "order"),
                explanation = COALESCE($5, explanation),
                edited_by = $6,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(question_id)
        .bind(&payload.text)
        .bind(payload.points)
        .bind(payload.order)
        .bind(&payload.explanation)
        .bind(actor.id)
        .fetch_one(&self.pool)
        .await?;
        Ok(question)
    }

    pub async fn delete_question(&self, question_id: Uuid, actor: &Actor) -> Result<()> {
        let course_id = self.course_of_question(question_id).await?;
        self.roles
            .require_course_manager(actor, course_id, "modify questions")
            .await?;

        sqlx::query(r#"DELETE FROM questions WHERE id = $1"#)
            .bind(question_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_all_questions(&self, assessment_id: Uuid, actor: &Actor) -> Result<u64> {
        let course_id = self.course_of_assessment(assessment_id).await?;
        self.roles
            .require_course_manager(actor, course_id, "delete questions")
            .await?;

        let result = sqlx::query(r#"DELETE FROM questions WHERE assessment_id = $1"#)
            .bind(assessment_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn list_options(&self, question_id: Uuid) -> Result<Vec<QuestionOption>> {
        let rows = sqlx::query_as::<_, QuestionOption>(
            r#"SELECT * FROM question_options WHERE question_id = $1 ORDER BY "order""#,
        )
        .bind(question_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn add_option(
        &self,
        question_id: Uuid,
        payload: CreateOptionPayload,
        actor: &Actor,
    ) -> Result<QuestionOption> {
        let course_id = self.course_of_question(question_id).await?;
        self.roles
            .require_course_manager(actor, course_id, "modify question options")
            .await?;

        let option = sqlx::query_as::<_, QuestionOption>(
            r#"
            INSERT INTO question_options (question_id, text, is_correct, "order")
            VALUES (
                $1, $2, $3,
                COALESCE($4, (SELECT COALESCE(MAX("order") + 1, 0) FROM question_options WHERE question_id = $1))
            )
            RETURNING *
            "#,
        )
        .bind(question_id)
        .bind(&payload.text)
        .bind(payload.is_correct)
        .bind(payload.order)
        .fetch_one(&self.pool)
        .await?;
        Ok(option)
    }

    pub async fn delete_option(&self, option_id: Uuid, actor: &Actor) -> Result<()> {
        let course_id: Uuid = sqlx::query_scalar(
            r#"
            SELECT a.course_id FROM question_options o
            JOIN questions q ON q.id = o.question_id
            JOIN assessments a ON a.id = q.assessment_id
            WHERE o.id = $1
            "#,
        )
        .bind(option_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Question option not found".to_string()))?;

        self.roles
            .require_course_manager(actor, course_id, "modify question options")
            .await?;

        sqlx::query(r#"DELETE FROM question_options WHERE id = $1"#)
            .bind(option_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_rubrics(&self, assessment_id: Uuid) -> Result<Vec<Rubric>> {
        let rows = sqlx::query_as::<_, Rubric>(
            r#"SELECT * FROM rubrics WHERE assessment_id = $1 ORDER BY "order""#,
        )
        .bind(assessment_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn create_rubric(
        &self,
        assessment_id: Uuid,
        payload: CreateRubricPayload,
        actor: &Actor,
    ) -> Result<Rubric> {
        let course_id = self.course_of_assessment(assessment_id).await?;
        self.roles
            .require_course_manager(actor, course_id, "modify rubrics")
            .await?;

        let rubric = sqlx::query_as::<_, Rubric>(
            r#"
            INSERT INTO rubrics (assessment_id, criterion, description, weight, "order", created_by)
            VALUES (
                $1, $2, $3, $4,
                COALESCE($5, (SELECT COALESCE(MAX("order") + 1, 0) FROM rubrics WHERE assessment_id = $1)),
                $6
            )
            RETURNING *
            "#,
        )
        .bind(assessment_id)
        .bind(&payload.criterion)
        .bind(&payload.description)
        .bind(payload.weight.unwrap_or(100))
        .bind(payload.order)
        .bind(actor.id)
        .fetch_one(&self.pool)
        .await?;
        Ok(rubric)
    }

    pub async fn update_rubric(
        &self,
        rubric_id: Uuid,
        payload: UpdateRubricPayload,
        actor: &Actor,
    ) -> Result<Rubric> {
        let course_id: Uuid = sqlx::query_scalar(
            r#"
            SELECT a.course_id FROM rubrics r
            JOIN assessments a ON a.id = r.assessment_id
            WHERE r.id = $1
            "#,
        )
        .bind(rubric_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Rubric not found".to_string()))?;

        self.roles
            .require_course_manager(actor, course_id, "modify rubrics")
            .await?;

        let rubric = sqlx::query_as::<_, Rubric>(
            r#"
            UPDATE rubrics
            SET criterion = COALESCE($2, criterion),
                description = COALESCE($3, description),
                weight = COALESCE($4, weight),
                "order" = COALESCE($5, "order"),
                edited_by = $6,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(rubric_id)
        .bind(&payload.criterion)
        .bind(&payload.description)
        .bind(payload.weight)
        .bind(payload.order)
        .bind(actor.id)
        .fetch_one(&self.pool)
        .await?;
        Ok(rubric)
    }

    pub async fn delete_rubric(&self, rubric_id: Uuid, actor: &Actor) -> Result<()> {
        let course_id: Uuid = sqlx::query_scalar(
            r#"
            SELECT a.course_id FROM rubrics r
            JOIN assessments a ON a.id = r.assessment_id
            WHERE r.id = $1
            "#,
        )
        .bind(rubric_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Rubric not found".to_string()))?;

        self.roles
            .require_course_manager(actor, course_id, "modify rubrics")
            .await?;

        sqlx::query(r#"DELETE FROM rubrics WHERE id = $1"#)
            .bind(rubric_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_all_rubrics(&self, assessment_id: Uuid, actor: &Actor) -> Result<u64> {
        let course_id = self.course_of_assessment(assessment_id).await?;
        self.roles
            .require_course_manager(actor, course_id, "delete rubrics")
            .await?;

        let result = sqlx::query(r#"DELETE FROM rubrics WHERE assessment_id = $1"#)
            .bind(assessment_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
