use axum::{
    extract::{Extension, Path, State},
    response::Json,
};

use crate::{
    middleware::auth::AuthUser,
    models::certificate::CertificateResponse,
    services::certificate::CertificateService,
    utils::errors::AppError,
    AppState,
};

pub async fn generate(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(course_id): Path<i32>,
) -> Result<Json<CertificateResponse>, AppError> {
    let certificate_service = CertificateService::new(state.db.clone());
    let certificate = certificate_service.generate(&auth_user, course_id).await?;

    Ok(Json(certificate))
}

pub async fn my_certificates(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<Vec<CertificateResponse>>, AppError> {
    let certificate_service = CertificateService::new(state.db.clone());
    let certificates = certificate_service.my_certificates(&auth_user).await?;

    Ok(Json(certificates))
}

pub async fn verify(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<CertificateResponse>, AppError> {
    let certificate_service = CertificateService::new(state.db.clone());
    let certificate = certificate_service.verify(&code).await?;

    Ok(Json(certificate))
}
