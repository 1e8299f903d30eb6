use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    middleware::policy::{required_access, Access},
    models::user::UserRole,
    utils::{errors::AppError, jwt::verify_jwt, logger::LOGGER},
    AppState,
};

/// Identity resolved once per request from the bearer token and handed to
/// handlers and services explicitly.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i32,
    pub email: String,
    pub role: UserRole,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Admin)
    }

    pub fn is_teacher(&self) -> bool {
        matches!(self.role, UserRole::Teacher)
    }

    pub fn is_student(&self) -> bool {
        matches!(self.role, UserRole::Student)
    }
}

pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Resolves the caller and applies the route policy before any handler runs.
/// 401 for missing or invalid tokens, 403 for a valid token whose role the
/// route does not admit.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let access = required_access(request.method(), request.uri().path());
    if access == Access::Public {
        return Ok(next.run(request).await);
    }

    let token = request
        .headers()
        .get("Authorization")
        .and_then(|header| header.to_str().ok())
        .and_then(bearer_token)
        .ok_or_else(|| unauthorized("Missing bearer token"))?;

    let claims = verify_jwt(token, &state.config.jwt_secret)
        .map_err(|_| unauthorized("Invalid or expired token"))?;

    let auth_user = AuthUser {
        user_id: claims.uid,
        email: claims.sub,
        role: claims.role,
    };

    if !access.permits(auth_user.role) {
        LOGGER.log_request(
            request.method().as_str(),
            request.uri().path(),
            Some(auth_user.user_id),
            StatusCode::FORBIDDEN.as_u16(),
        );
        return Err(AppError::Forbidden(format!(
            "Role {} may not access this resource",
            auth_user.role.as_str()
        ))
        .into_response());
    }

    request.extensions_mut().insert(auth_user);
    Ok(next.run(request).await)
}

fn unauthorized(message: &str) -> Response {
    AppError::Unauthorized(message.to_string()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("Bearer   "), None);
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("bearer abc"), None);
    }

    #[test]
    fn test_role_helpers() {
        let user = AuthUser {
            user_id: 1,
            email: "t@example.com".into(),
            role: UserRole::Teacher,
        };
        assert!(user.is_teacher());
        assert!(!user.is_admin());
        assert!(!user.is_student());
    }
}
