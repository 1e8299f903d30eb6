pub mod admin;
pub mod auth;
pub mod certificates;
pub mod courses;
pub mod enrollments;
pub mod files;
pub mod mcq;
pub mod notifications;
pub mod payments;
pub mod progress;
pub mod tasks;
pub mod theory;
pub mod users;

use axum::{body::Bytes, extract::Multipart};

use crate::utils::errors::AppError;

/// Pulls the `file` part out of a multipart body, returning the client file
/// name and the raw bytes. Other parts are ignored.
pub(crate) async fn read_file_field(multipart: &mut Multipart) -> Result<(String, Bytes), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| "upload".to_string());
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {}", e)))?;

        return Ok((file_name, data));
    }

    Err(AppError::BadRequest("Missing 'file' field".to_string()))
}
