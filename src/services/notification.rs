use serde_json::json;
use sqlx::{PgExecutor, PgPool};

use super::{not_found, ServiceError, ServiceResult};
use crate::{
    middleware::auth::AuthUser,
    models::notification::{Notification, NotificationKind},
    utils::logger::LOGGER,
};

pub struct NotificationService {
    db: PgPool,
}

impl NotificationService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list_mine(&self, actor: &AuthUser) -> ServiceResult<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(actor.user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(notifications)
    }

    pub async fn mark_read(&self, actor: &AuthUser, notification_id: i32) -> ServiceResult<Notification> {
        let notification =
            sqlx::query_as::<_, Notification>("SELECT * FROM notifications WHERE id = $1")
                .bind(notification_id)
                .fetch_optional(&self.db)
                .await?
                .ok_or_else(not_found("Notification"))?;

        if notification.user_id != actor.user_id {
            return Err(ServiceError::Forbidden(
                "You can only update your own notifications".to_string(),
            ));
        }

        let updated = sqlx::query_as::<_, Notification>(
            "UPDATE notifications SET is_read = TRUE WHERE id = $1 RETURNING *",
        )
        .bind(notification_id)
        .fetch_one(&self.db)
        .await?;

        Ok(updated)
    }
}

/// Persists an in-app notification. Takes any executor so callers can record
/// it inside the transaction that produced the event.
pub async fn notify<'e, E>(
    executor: E,
    user_id: i32,
    message: &str,
    kind: NotificationKind,
    related_entity_id: Option<i32>,
) -> ServiceResult<()>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO notifications (user_id, message, notification_type, related_entity_id)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(user_id)
    .bind(message)
    .bind(kind.as_str())
    .bind(related_entity_id)
    .execute(executor)
    .await?;

    LOGGER.log_business_event(
        "notification_created",
        Some(user_id),
        json!({"type": kind.as_str(), "related_entity_id": related_entity_id}),
    );

    Ok(())
}
