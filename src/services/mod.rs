pub mod admin;
pub mod auth;
pub mod certificate;
pub mod course;
pub mod enrollment;
pub mod mailer;
pub mod mcq;
pub mod notification;
pub mod payment;
pub mod progress;
pub mod scheduler;
pub mod storage;
pub mod task;
pub mod theory;

use crate::middleware::auth::AuthUser;

/// Flat failure taxonomy shared by every service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Duplicate(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("{0}")]
    UnsupportedMedia(String),
    #[error("{0}")]
    TooLarge(String),
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Storage(#[from] std::io::Error),
    #[error("{0}")]
    Internal(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Admins pass; anyone else must own the resource.
pub fn ensure_owner(actor: &AuthUser, owner_id: i32, message: &str) -> ServiceResult<()> {
    if actor.is_admin() || actor.user_id == owner_id {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(message.to_string()))
    }
}

/// Integer percentage, rounded down; an empty denominator yields 0.
pub fn completion_percentage(completed: i64, total: i64) -> i32 {
    if total <= 0 {
        return 0;
    }
    ((completed.clamp(0, total) * 100) / total) as i32
}

pub(crate) fn not_found(what: &str) -> impl FnOnce() -> ServiceError + '_ {
    move || ServiceError::NotFound(format!("{} not found", what))
}


#[cfg(test)]
mod tests {
    use super::test_support::actor;
    use super::*;
    use crate::models::user::UserRole;

    #[test]
    fn test_completion_percentage_floors() {
        assert_eq!(completion_percentage(1, 2), 50);
        assert_eq!(completion_percentage(2, 2), 100);
        assert_eq!(completion_percentage(1, 3), 33);
        assert_eq!(completion_percentage(2, 3), 66);
    }

    #[test]
    fn test_completion_percentage_zero_total() {
        assert_eq!(completion_percentage(0, 0), 0);
        assert_eq!(completion_percentage(5, 0), 0);
    }

    #[test]
    fn test_ensure_owner() {
        assert!(ensure_owner(&actor(1, UserRole::Teacher), 1, "nope").is_ok());
        assert!(ensure_owner(&actor(9, UserRole::Admin), 1, "nope").is_ok());
        match ensure_owner(&actor(2, UserRole::Teacher), 1, "You do not own this course") {
            Err(ServiceError::Forbidden(msg)) => assert_eq!(msg, "You do not own this course"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
