use axum::{
    extract::{Extension, Path, State},
    response::Json,
};

use crate::{
    middleware::auth::AuthUser,
    models::payment::PaymentResponse,
    services::payment::PaymentService,
    utils::errors::AppError,
    AppState,
};

pub async fn pay(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(course_id): Path<i32>,
) -> Result<Json<PaymentResponse>, AppError> {
    let payment_service = PaymentService::new(state.db.clone(), state.mailer.clone());
    let payment = payment_service.pay(&auth_user, course_id).await?;

    Ok(Json(payment))
}
