use std::{collections::HashMap, time::Instant};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde_json::json;
use sqlx::{PgPool, Row};

use super::{auth::insert_user, not_found, ServiceError, ServiceResult};
use crate::{
    middleware::auth::AuthUser,
    models::{
        analytics::{AnalyticsResponse, GraphPoint},
        user::{AdminUserResponse, CreateTeacherRequest, User, UserResponse, UserRole},
    },
    utils::logger::LOGGER,
};

const REVENUE_WINDOW_DAYS: i64 = 7;

/// Daily revenue for the window ending `today`, oldest first, labelled by
/// abbreviated weekday. Days without payments read 0.
pub fn revenue_by_day(payments: &[(DateTime<Utc>, f64)], today: NaiveDate) -> Vec<GraphPoint> {
    let mut totals: HashMap<NaiveDate, f64> = HashMap::new();
    for (created_at, amount) in payments {
        *totals.entry(created_at.date_naive()).or_insert(0.0) += amount;
    }

    (0..REVENUE_WINDOW_DAYS)
        .rev()
        .map(|offset| {
            let day = today - Duration::days(offset);
            GraphPoint::new(
                day.format("%a").to_string(),
                totals.get(&day).copied().unwrap_or(0.0),
            )
        })
        .collect()
}

pub fn course_distribution(paid: i64, total: i64) -> Vec<GraphPoint> {
    vec![
        GraphPoint::new("Paid Courses", paid as f64),
        GraphPoint::new("Free Courses", (total - paid).max(0) as f64),
    ]
}

fn refuse_self(actor: &AuthUser, user_id: i32, action: &str) -> ServiceResult<()> {
    if actor.user_id == user_id {
        return Err(ServiceError::InvalidState(format!(
            "You cannot {} your own account",
            action
        )));
    }
    Ok(())
}

pub struct AdminService {
    db: PgPool,
}

impl AdminService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Teacher accounts start approved and must change their password.
    pub async fn create_teacher(
        &self,
        actor: &AuthUser,
        request: CreateTeacherRequest,
    ) -> ServiceResult<UserResponse> {
        let teacher = insert_user(
            &self.db,
            &request.name,
            &request.email,
            &request.password,
            UserRole::Teacher,
            true,
        )
        .await?;

        LOGGER.log_business_event(
            "teacher_created",
            Some(actor.user_id),
            json!({"teacher_id": teacher.id}),
        );
        Ok(UserResponse::from(teacher))
    }

    pub async fn delete_user(&self, actor: &AuthUser, user_id: i32) -> ServiceResult<()> {
        refuse_self(actor, user_id, "delete")?;

        let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.db)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(ServiceError::NotFound("User not found".to_string()));
        }

        LOGGER.log_business_event("user_deleted", Some(actor.user_id), json!({"user_id": user_id}));
        Ok(())
    }

    pub async fn update_role(
        &self,
        actor: &AuthUser,
        user_id: i32,
        role: UserRole,
    ) -> ServiceResult<UserResponse> {
        refuse_self(actor, user_id, "change the role of")?;

        let user = sqlx::query_as::<_, User>("UPDATE users SET role = $1 WHERE id = $2 RETURNING *")
            .bind(role)
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(not_found("User"))?;

        LOGGER.log_business_event(
            "user_role_changed",
            Some(actor.user_id),
            json!({"user_id": user_id, "role": role.as_str()}),
        );
        Ok(UserResponse::from(user))
    }

    /// Blocks an active account or unblocks a blocked one.
    pub async fn toggle_block(&self, actor: &AuthUser, user_id: i32) -> ServiceResult<UserResponse> {
        refuse_self(actor, user_id, "block")?;

        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET enabled = NOT enabled WHERE id = $1 RETURNING *",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(not_found("User"))?;

        LOGGER.log_business_event(
            "user_block_toggled",
            Some(actor.user_id),
            json!({"user_id": user_id, "enabled": user.enabled}),
        );
        Ok(UserResponse::from(user))
    }

    pub async fn list_users(&self) -> ServiceResult<Vec<AdminUserResponse>> {
        let start = Instant::now();
        let query = r#"
            SELECT u.id, u.name, u.email, u.role, u.created_at, u.enabled,
                   CASE WHEN u.role = 'TEACHER'
                        THEN (SELECT COUNT(*) FROM courses c WHERE c.teacher_id = u.id)
                        ELSE 0 END AS course_count,
                   CASE WHEN u.role = 'TEACHER'
                        THEN (SELECT COALESCE(SUM(p.amount), 0)::DOUBLE PRECISION
                              FROM payments p JOIN courses c ON c.id = p.course_id
                              WHERE c.teacher_id = u.id AND p.status = 'SUCCESS')
                        ELSE 0 END AS revenue
            FROM users u
            ORDER BY u.created_at DESC
        "#;

        let users = sqlx::query_as::<_, AdminUserResponse>(query)
            .fetch_all(&self.db)
            .await?;

        LOGGER.log_database_query(query, start.elapsed().as_millis(), Some(users.len()));
        Ok(users)
    }

    pub async fn analytics(&self) -> ServiceResult<AnalyticsResponse> {
        let start = Instant::now();

        let ((total_revenue, total_students, active_courses, total_enrollments, paid_courses), recent) = tokio::try_join!(
            self.totals(),
            self.recent_payments(),
        )?;

        LOGGER.log_business_event(
            "analytics_generated",
            None,
            json!({"duration_ms": start.elapsed().as_millis() as u64}),
        );

        Ok(AnalyticsResponse {
            total_revenue,
            total_students,
            active_courses,
            total_enrollments,
            revenue_data: revenue_by_day(&recent, Utc::now().date_naive()),
            course_distribution: course_distribution(paid_courses, active_courses),
        })
    }

    async fn totals(&self) -> Result<(f64, i64, i64, i64, i64), sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COALESCE(SUM(amount), 0)::DOUBLE PRECISION FROM payments WHERE status = 'SUCCESS'),
                (SELECT COUNT(*) FROM users WHERE role = 'STUDENT'),
                (SELECT COUNT(*) FROM courses),
                (SELECT COUNT(*) FROM enrollments),
                (SELECT COUNT(*) FROM courses WHERE paid = TRUE)
            "#,
        )
        .fetch_one(&self.db)
        .await?;

        Ok((row.get(0), row.get(1), row.get(2), row.get(3), row.get(4)))
    }

    async fn recent_payments(&self) -> Result<Vec<(DateTime<Utc>, f64)>, sqlx::Error> {
        sqlx::query_as::<_, (DateTime<Utc>, f64)>(
            r#"
            SELECT created_at, amount FROM payments
            WHERE status = 'SUCCESS' AND created_at >= $1
            "#,
        )
        .bind(Utc::now() - Duration::days(REVENUE_WINDOW_DAYS))
        .fetch_all(&self.db)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::user::UserRole, services::test_support::actor};
    use chrono::TimeZone;

    #[test]
    fn test_revenue_window_is_oldest_first() {
        // 2024-05-12 was a Sunday.
        let today = NaiveDate::from_ymd_opt(2024, 5, 12).unwrap();
        let payments = vec![
            (Utc.with_ymd_and_hms(2024, 5, 12, 9, 0, 0).unwrap(), 100.0),
            (Utc.with_ymd_and_hms(2024, 5, 12, 18, 0, 0).unwrap(), 50.0),
            (Utc.with_ymd_and_hms(2024, 5, 6, 10, 0, 0).unwrap(), 20.0),
            (Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(), 999.0),
        ];

        let series = revenue_by_day(&payments, today);
        let labels: Vec<&str> = series.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"]);
        assert_eq!(series[0].value, 20.0);
        assert_eq!(series[6].value, 150.0);
        assert_eq!(series.iter().map(|p| p.value).sum::<f64>(), 170.0);
    }

    #[test]
    fn test_course_distribution() {
        let points = course_distribution(3, 10);
        assert_eq!(points[0], GraphPoint::new("Paid Courses", 3.0));
        assert_eq!(points[1], GraphPoint::new("Free Courses", 7.0));
    }

    #[test]
    fn test_admin_cannot_target_self() {
        let admin = actor(1, UserRole::Admin);
        assert!(refuse_self(&admin, 1, "block").is_err());
        assert!(refuse_self(&admin, 2, "block").is_ok());
    }
}
