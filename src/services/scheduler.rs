use serde_json::json;
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler};

use super::auth::purge_expired_tokens;
use crate::utils::logger::LOGGER;

/// Every day at 03:00 UTC.
pub const TOKEN_PURGE_SCHEDULE: &str = "0 0 3 * * *";

/// Starts the background jobs. The returned scheduler must be kept alive for
/// the jobs to keep firing.
pub async fn start(db: PgPool) -> anyhow::Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(TOKEN_PURGE_SCHEDULE, move |_uuid, _lock| {
        let db = db.clone();
        Box::pin(async move {
            match purge_expired_tokens(&db).await {
                Ok(cleared) => {
                    LOGGER.log_business_event("expired_tokens_purged", None, json!({"cleared": cleared}));
                }
                Err(e) => {
                    LOGGER.log_error(&format!("Token purge failed: {}", e), json!({}));
                }
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    tracing::info!("Scheduler started, token purge runs on '{}'", TOKEN_PURGE_SCHEDULE);
    Ok(scheduler)
}
