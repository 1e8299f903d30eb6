mod handlers;
mod middleware;
mod models;
mod services;
mod utils;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use sqlx::PgPool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    handlers::{
        admin, auth, certificates, courses, enrollments, files, mcq, notifications, payments,
        progress, tasks, theory, users,
    },
    middleware::auth::auth_middleware,
    services::{mailer::Mailer, scheduler, storage::FileStorage},
    utils::{config::Config, database::create_pool},
};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub mailer: Mailer,
    pub storage: FileStorage,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "elearning_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let db = create_pool(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let storage = FileStorage::new(&config.upload_dir);
    if let Err(e) = storage.ensure_layout().await {
        tracing::warn!("Failed to create upload directory {}: {}", config.upload_dir, e);
    }

    let mailer = Mailer::start(config.mail_concurrency, config.mail_queue_capacity);

    // Dropping the handle stops the jobs.
    let _scheduler = scheduler::start(db.clone()).await?;

    let bind_addr = config.bind_addr.clone();
    let state = AppState {
        db,
        config: Arc::new(config),
        mailer,
        storage,
    };

    let app = app(state)?;

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server running on http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn cors_layer(origin: &str) -> anyhow::Result<CorsLayer> {
    let allow_origin = if origin == "*" {
        HeaderValue::from_static("*")
    } else {
        origin.parse::<HeaderValue>()?
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]))
}

/// Every route sits behind the auth middleware; the policy table decides
/// which ones skip the token check.
pub fn app(state: AppState) -> anyhow::Result<Router> {
    let cors = cors_layer(&state.config.cors_allowed_origin)?;
    let body_limit = state.config.max_request_body_bytes();

    let auth_routes = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/forgot-password", post(auth::forgot_password))
        .route("/api/auth/reset-password", post(auth::reset_password))
        .route("/api/auth/verify-email/:token", get(auth::verify_email))
        .route("/api/users/profile", get(users::get_profile).put(users::update_profile))
        .route("/api/users/change-password", put(users::change_password))
        .route("/api/users/resend-verification", get(users::resend_verification));

    let course_routes = Router::new()
        .route("/api/courses", get(courses::list_published).post(courses::create_course))
        .route(
            "/api/courses/:id",
            get(courses::get_course)
                .put(courses::update_course)
                .delete(courses::delete_course),
        )
        .route("/api/courses/:id/preview", get(courses::preview))
        .route("/api/courses/:id/publish", put(courses::toggle_publish))
        .route("/api/courses/:id/students", get(courses::course_students))
        .route(
            "/api/courses/:id/lessons",
            get(courses::list_lessons).post(courses::add_lesson),
        )
        .route(
            "/api/courses/:id/lessons/:lesson_id",
            put(courses::update_lesson).delete(courses::delete_lesson),
        )
        .route(
            "/api/courses/:id/tasks",
            get(tasks::list_tasks).post(tasks::create_task),
        )
        .route("/api/tasks/:id", axum::routing::delete(tasks::delete_task))
        .route("/api/tasks/:id/complete", post(tasks::complete_task))
        .route("/api/teacher/courses", get(courses::my_courses))
        .route("/api/upload/video", post(courses::upload_video))
        .route("/api/videos/:filename", get(files::stream_video));

    let learning_routes = Router::new()
        .route("/api/enrollments/me", get(enrollments::my_enrollments))
        .route("/api/enrollments/:course_id", post(enrollments::enroll))
        .route("/api/enrollments/:course_id/check", get(enrollments::enrollment_status))
        .route(
            "/api/progress/courses/:course_id",
            get(progress::get_progress),
        )
        .route(
            "/api/progress/courses/:course_id/lessons/:lesson_id/complete",
            post(progress::complete_lesson),
        )
        .route("/api/payments/pay/:course_id", post(payments::pay))
        .route("/api/mcq/submit", post(mcq::submit))
        .route("/api/mcq/:task_id/submission", get(mcq::get_submission))
        .route("/api/theory/:task_id/submit", post(theory::submit))
        .route("/api/theory/:task_id/submission", get(theory::my_submission))
        .route("/api/theory/task/:task_id/submissions", get(theory::list_for_task))
        .route("/api/theory/submission/:id/review", put(theory::review))
        .route("/api/theory/submission/:id/download", get(files::download_theory))
        .route("/api/certificates/generate/:course_id", post(certificates::generate))
        .route("/api/certificates/my", get(certificates::my_certificates))
        .route("/api/certificates/verify/:code", get(certificates::verify))
        .route("/api/notifications", get(notifications::list_mine))
        .route("/api/notifications/:id/read", put(notifications::mark_read));

    let admin_routes = Router::new()
        .route("/api/admin/create-teacher", post(admin::create_teacher))
        .route("/api/admin/users", get(admin::list_users))
        .route("/api/admin/users/:id", axum::routing::delete(admin::delete_user))
        .route("/api/admin/users/:id/role", put(admin::update_role))
        .route("/api/admin/users/:id/block", put(admin::toggle_block))
        .route("/api/admin/analytics", get(admin::get_analytics));

    let app = Router::new()
        .route("/health", get(|| async { "OK" }))
        .merge(auth_routes)
        .merge(course_routes)
        .merge(learning_routes)
        .merge(admin_routes)
        .layer(from_fn_with_state(state.clone(), auth_middleware))
        .layer(cors)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::user::UserRole, utils::jwt::create_jwt};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let config = Config::for_tests();
        let db = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();

        AppState {
            db,
            storage: FileStorage::new(&config.upload_dir),
            mailer: Mailer::start(1, 4),
            config: Arc::new(config),
        }
    }

    fn bearer(role: UserRole) -> String {
        let token = create_jwt(7, "someone@example.com", role, "test-secret", 1).unwrap();
        format!("Bearer {}", token)
    }

    async fn status_of(request: Request<Body>) -> StatusCode {
        let app = app(test_state()).unwrap();
        app.oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let request = Request::get("/health").body(Body::empty()).unwrap();
        assert_eq!(status_of(request).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let request = Request::get("/api/enrollments/me").body(Body::empty()).unwrap();
        assert_eq!(status_of(request).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_garbage_token_is_unauthorized() {
        let request = Request::get("/api/users/profile")
            .header("Authorization", "Bearer not-a-jwt")
            .body(Body::empty())
            .unwrap();
        assert_eq!(status_of(request).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_student_cannot_reach_admin_routes() {
        let request = Request::get("/api/admin/users")
            .header("Authorization", bearer(UserRole::Student))
            .body(Body::empty())
            .unwrap();
        assert_eq!(status_of(request).await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_teacher_cannot_enroll() {
        let request = Request::post("/api/enrollments/1")
            .header("Authorization", bearer(UserRole::Teacher))
            .body(Body::empty())
            .unwrap();
        assert_eq!(status_of(request).await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_student_cannot_create_courses() {
        let request = Request::post("/api/courses")
            .header("Authorization", bearer(UserRole::Student))
            .header("Content-Type", "application/json")
            .body(Body::from(r#"{"title":"Rust","description":"Intro","paid":false,"price":0}"#))
            .unwrap();
        assert_eq!(status_of(request).await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_malformed_certificate_code_is_not_found() {
        let request = Request::get("/api/certificates/verify/not-a-code")
            .body(Body::empty())
            .unwrap();
        assert_eq!(status_of(request).await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_registration_is_rejected_before_storage() {
        let request = Request::post("/api/auth/register")
            .header("Content-Type", "application/json")
            .body(Body::from(r#"{"name":"","email":"nope","password":"x"}"#))
            .unwrap();
        assert_eq!(status_of(request).await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_admin_creates_teacher_at_create_teacher_path() {
        let request = Request::post("/api/admin/create-teacher")
            .header("Authorization", bearer(UserRole::Admin))
            .header("Content-Type", "application/json")
            .body(Body::from(r#"{"name":"Grace","email":"not-an-email","password":"secret1"}"#))
            .unwrap();
        assert_eq!(status_of(request).await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_profile_update_lives_under_users_profile() {
        let request = Request::put("/api/users/profile")
            .header("Authorization", bearer(UserRole::Student))
            .header("Content-Type", "application/json")
            .body(Body::from(r#"{"name":"","email":"someone@example.com"}"#))
            .unwrap();
        assert_eq!(status_of(request).await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_change_password_path_validates_body() {
        let request = Request::put("/api/users/change-password")
            .header("Authorization", bearer(UserRole::Teacher))
            .header("Content-Type", "application/json")
            .body(Body::from(r#"{"current_password":"old","new_password":"123"}"#))
            .unwrap();
        assert_eq!(status_of(request).await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_resend_verification_and_enrollment_check_are_get_routes() {
        let request = Request::post("/api/users/resend-verification")
            .header("Authorization", bearer(UserRole::Student))
            .body(Body::empty())
            .unwrap();
        assert_eq!(status_of(request).await, StatusCode::METHOD_NOT_ALLOWED);

        let request = Request::post("/api/enrollments/1/check")
            .header("Authorization", bearer(UserRole::Student))
            .body(Body::empty())
            .unwrap();
        assert_eq!(status_of(request).await, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_unsafe_video_name_is_not_found() {
        let request = Request::get("/api/videos/..%2Fsecret")
            .header("Authorization", bearer(UserRole::Student))
            .body(Body::empty())
            .unwrap();
        assert_eq!(status_of(request).await, StatusCode::NOT_FOUND);
    }
}
