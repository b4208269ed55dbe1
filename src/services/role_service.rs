use crate::error::{Error, Result};
use sqlx::PgPool;
use uuid::Uuid;

/// The acting principal, resolved from the bearer token by the auth
/// middleware and passed explicitly into every workflow operation.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: Uuid,
    pub role: String,
}

impl Actor {
    /// Staff and admins bypass course-scoped checks everywhere.
    pub fn is_staff(&self) -> bool {
        matches!(self.role.as_str(), "admin" | "staff")
    }
}

/// Course-scoped role lookups backed by the enrollments and
/// course_instructors tables. Workflow code asks questions through this
/// interface only and never inspects how roles are stored.
#[derive(Clone)]
pub struct RoleService {
    pool: PgPool,
}

impl RoleService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn is_course_instructor(&self, user_id: Uuid, course_id: Uuid) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM course_instructors WHERE user_id = $1 AND course_id = $2"#,
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn is_enrolled(&self, user_id: Uuid, course_id: Uuid) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM enrollments
               WHERE user_id = $1 AND course_id = $2 AND is_active = TRUE"#,
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    /// Staff/admin, or an instructor assigned to the course.
    pub async fn can_manage_course(&self, actor: &Actor, course_id: Uuid) -> Result<bool> {
        if actor.is_staff() {
            return Ok(true);
        }
        self.is_course_instructor(actor.id, course_id).await
    }

    pub async fn require_course_manager(
        &self,
        actor: &Actor,
        course_id: Uuid,
        action: &str,
    ) -> Result<()> {
        if self.can_manage_course(actor, course_id).await? {
            Ok(())
        } else {
            Err(Error::PermissionDenied(format!(
                "You don't have permission to {} for this course",
                action
            )))
        }
    }
}
