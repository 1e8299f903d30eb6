use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    mailer::{password_reset_email, verification_email, welcome_email, Mailer},
    not_found, ServiceError, ServiceResult,
};
use crate::{
    middleware::auth::AuthUser,
    models::user::{
        ChangePasswordRequest, LoginRequest, LoginResponse, RegisterRequest, ResetPasswordRequest,
        UpdateProfileRequest, User, UserResponse, UserRole,
    },
    utils::{
        config::Config,
        database::is_unique_violation,
        jwt::create_jwt,
        logger::LOGGER,
        password::{hash_password, verify_password},
    },
};

pub const RESET_TOKEN_TTL_HOURS: i64 = 1;
pub const VERIFICATION_TOKEN_TTL_HOURS: i64 = 24;

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn generate_token() -> String {
    Uuid::new_v4().to_string()
}

/// A one-time token is usable while its expiry lies in the future.
pub fn check_token_expiry(
    expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    expired_message: &str,
) -> ServiceResult<()> {
    match expires_at {
        Some(expiry) if expiry > now => Ok(()),
        _ => Err(ServiceError::InvalidState(expired_message.to_string())),
    }
}

fn hash(password: &str) -> ServiceResult<String> {
    hash_password(password).map_err(|e| ServiceError::Internal(format!("Failed to hash password: {}", e)))
}

/// Inserts an account; a taken email surfaces as `Duplicate`.
pub(crate) async fn insert_user(
    db: &PgPool,
    name: &str,
    email: &str,
    password: &str,
    role: UserRole,
    password_change_required: bool,
) -> ServiceResult<User> {
    let email = normalize_email(email);
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
        .bind(&email)
        .fetch_one(db)
        .await?;
    if exists {
        return Err(ServiceError::Duplicate("Email already exists".to_string()));
    }

    let password_hash = hash(password)?;

    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (name, email, password_hash, role, approved, password_change_required)
        VALUES ($1, $2, $3, $4, TRUE, $5)
        RETURNING *
        "#,
    )
    .bind(name.trim())
    .bind(&email)
    .bind(&password_hash)
    .bind(role)
    .bind(password_change_required)
    .fetch_one(db)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ServiceError::Duplicate("Email already exists".to_string())
        } else {
            ServiceError::Database(e)
        }
    })
}

pub struct AuthService {
    db: PgPool,
    config: Arc<Config>,
    mailer: Mailer,
}

impl AuthService {
    pub fn new(db: PgPool, config: Arc<Config>, mailer: Mailer) -> Self {
        Self { db, config, mailer }
    }

    pub async fn register(&self, request: RegisterRequest) -> ServiceResult<UserResponse> {
        let user = insert_user(
            &self.db,
            &request.name,
            &request.email,
            &request.password,
            UserRole::Student,
            false,
        )
        .await?;

        LOGGER.log_business_event("user_registered", Some(user.id), json!({"role": user.role.as_str()}));
        self.mailer.send(welcome_email(&user.email, &user.name));

        Ok(UserResponse::from(user))
    }

    pub async fn login(&self, request: LoginRequest) -> ServiceResult<LoginResponse> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(normalize_email(&request.email))
            .fetch_optional(&self.db)
            .await?
            .ok_or(ServiceError::InvalidCredentials)?;

        if !verify_password(&request.password, &user.password_hash) {
            LOGGER.log_business_event("login_failed", Some(user.id), json!({}));
            return Err(ServiceError::InvalidCredentials);
        }
        if !user.enabled {
            return Err(ServiceError::Forbidden("Account is blocked".to_string()));
        }

        let token = create_jwt(
            user.id,
            &user.email,
            user.role,
            &self.config.jwt_secret,
            self.config.jwt_ttl_hours,
        )
        .map_err(|e| ServiceError::Internal(format!("Failed to create token: {}", e)))?;

        LOGGER.log_business_event("user_logged_in", Some(user.id), json!({"role": user.role.as_str()}));

        Ok(LoginResponse {
            token,
            user: UserResponse::from(user),
        })
    }

    /// Always succeeds so the endpoint does not reveal which emails exist.
    pub async fn forgot_password(&self, email: &str) -> ServiceResult<()> {
        let token = generate_token();
        let expires_at = Utc::now() + Duration::hours(RESET_TOKEN_TTL_HOURS);

        let updated = sqlx::query_scalar::<_, String>(
            r#"
            UPDATE users SET password_reset_token = $1, password_reset_expires_at = $2
            WHERE email = $3
            RETURNING email
            "#,
        )
        .bind(&token)
        .bind(expires_at)
        .bind(normalize_email(email))
        .fetch_optional(&self.db)
        .await?;

        match updated {
            Some(address) => {
                self.mailer
                    .send(password_reset_email(&address, &self.config.app_base_url, &token));
            }
            None => tracing::debug!("Password reset requested for unknown email"),
        }
        Ok(())
    }

    pub async fn reset_password(&self, request: ResetPasswordRequest) -> ServiceResult<()> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE password_reset_token = $1")
            .bind(&request.token)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ServiceError::InvalidState("Invalid reset token".to_string()))?;
        check_token_expiry(user.password_reset_expires_at, Utc::now(), "Reset token expired")?;

        let password_hash = hash(&request.new_password)?;
        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $1, password_reset_token = NULL, password_reset_expires_at = NULL,
                password_change_required = FALSE
            WHERE id = $2
            "#,
        )
        .bind(&password_hash)
        .bind(user.id)
        .execute(&self.db)
        .await?;

        LOGGER.log_business_event("password_reset", Some(user.id), json!({}));
        Ok(())
    }

    pub async fn verify_email(&self, token: &str) -> ServiceResult<()> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email_verification_token = $1")
            .bind(token)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ServiceError::InvalidState("Invalid verification token".to_string()))?;
        check_token_expiry(
            user.email_verification_expires_at,
            Utc::now(),
            "Verification token expired",
        )?;

        sqlx::query(
            r#"
            UPDATE users
            SET email_verified = TRUE, email_verification_token = NULL, email_verification_expires_at = NULL
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .execute(&self.db)
        .await?;

        LOGGER.log_business_event("email_verified", Some(user.id), json!({}));
        Ok(())
    }

    pub async fn get_profile(&self, actor: &AuthUser) -> ServiceResult<UserResponse> {
        Ok(UserResponse::from(self.user(actor.user_id).await?))
    }

    /// Changing the email resets verification and mails a fresh token.
    pub async fn update_profile(
        &self,
        actor: &AuthUser,
        request: UpdateProfileRequest,
    ) -> ServiceResult<UserResponse> {
        let user = self.user(actor.user_id).await?;
        let email = normalize_email(&request.email);

        if email == user.email {
            let updated = sqlx::query_as::<_, User>("UPDATE users SET name = $1 WHERE id = $2 RETURNING *")
                .bind(request.name.trim())
                .bind(user.id)
                .fetch_one(&self.db)
                .await?;
            return Ok(UserResponse::from(updated));
        }

        let token = generate_token();
        let updated = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = $1, email = $2, email_verified = FALSE,
                email_verification_token = $3, email_verification_expires_at = $4
            WHERE id = $5
            RETURNING *
            "#,
        )
        .bind(request.name.trim())
        .bind(&email)
        .bind(&token)
        .bind(Utc::now() + Duration::hours(VERIFICATION_TOKEN_TTL_HOURS))
        .bind(user.id)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::Duplicate("Email already in use".to_string())
            } else {
                ServiceError::Database(e)
            }
        })?;

        self.mailer
            .send(verification_email(&updated.email, &self.config.app_base_url, &token));
        LOGGER.log_business_event("email_changed", Some(user.id), json!({}));

        Ok(UserResponse::from(updated))
    }

    pub async fn change_password(&self, actor: &AuthUser, request: ChangePasswordRequest) -> ServiceResult<()> {
        let user = self.user(actor.user_id).await?;
        if !verify_password(&request.current_password, &user.password_hash) {
            return Err(ServiceError::InvalidState("Current password is incorrect".to_string()));
        }

        let password_hash = hash(&request.new_password)?;
        sqlx::query("UPDATE users SET password_hash = $1, password_change_required = FALSE WHERE id = $2")
            .bind(&password_hash)
            .bind(user.id)
            .execute(&self.db)
            .await?;

        LOGGER.log_business_event("password_changed", Some(user.id), json!({}));
        Ok(())
    }

    pub async fn resend_verification(&self, actor: &AuthUser) -> ServiceResult<()> {
        let user = self.user(actor.user_id).await?;
        if user.email_verified {
            return Err(ServiceError::InvalidState("Email already verified".to_string()));
        }

        let token = generate_token();
        sqlx::query(
            "UPDATE users SET email_verification_token = $1, email_verification_expires_at = $2 WHERE id = $3",
        )
        .bind(&token)
        .bind(Utc::now() + Duration::hours(VERIFICATION_TOKEN_TTL_HOURS))
        .bind(user.id)
        .execute(&self.db)
        .await?;

        self.mailer
            .send(verification_email(&user.email, &self.config.app_base_url, &token));
        Ok(())
    }

    async fn user(&self, user_id: i32) -> ServiceResult<User> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;

        user.ok_or_else(not_found("User"))
    }
}

/// Clears reset and verification tokens whose expiry has passed.
pub async fn purge_expired_tokens(db: &PgPool) -> ServiceResult<u64> {
    let now = Utc::now();

    let resets = sqlx::query(
        r#"
        UPDATE users SET password_reset_token = NULL, password_reset_expires_at = NULL
        WHERE password_reset_expires_at IS NOT NULL AND password_reset_expires_at <= $1
        "#,
    )
    .bind(now)
    .execute(db)
    .await?
    .rows_affected();

    let verifications = sqlx::query(
        r#"
        UPDATE users SET email_verification_token = NULL, email_verification_expires_at = NULL
        WHERE email_verification_expires_at IS NOT NULL AND email_verification_expires_at <= $1
        "#,
    )
    .bind(now)
    .execute(db)
    .await?
    .rows_affected();

    Ok(resets + verifications)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_normalization() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }

    #[test]
    fn test_tokens_are_random() {
        let token = generate_token();
        assert_eq!(token.len(), 36);
        assert_ne!(token, generate_token());
    }

    #[test]
    fn test_token_expiry() {
        let now = Utc::now();
        assert!(check_token_expiry(Some(now + Duration::minutes(5)), now, "expired").is_ok());
        assert!(check_token_expiry(Some(now), now, "expired").is_err());
        assert!(check_token_expiry(Some(now - Duration::hours(2)), now, "expired").is_err());
        match check_token_expiry(None, now, "Reset token expired") {
            Err(ServiceError::InvalidState(msg)) => assert_eq!(msg, "Reset token expired"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
