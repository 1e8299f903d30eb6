use std::path::Path as FsPath;

use axum::{
    extract::{Extension, Path, Request, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::{
    middleware::auth::AuthUser,
    services::{storage::content_type_for, theory::TheoryService},
    utils::errors::AppError,
    AppState,
};

/// Streams a lesson video. Range requests are honoured so players can seek.
pub async fn stream_video(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    request: Request,
) -> Result<Response, AppError> {
    let path = state.storage.video_path(&filename)?;
    serve(&path, request).await
}

/// Sends a theory answer back under the name it was uploaded with.
pub async fn download_theory(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(submission_id): Path<i32>,
    request: Request,
) -> Result<Response, AppError> {
    let theory_service = TheoryService::new(state.db.clone(), state.storage.clone());
    let (path, original_name) = theory_service.download(&auth_user, submission_id).await?;

    let mut response = serve(&path, request).await?;
    if response.status().is_success() {
        response
            .headers_mut()
            .insert(header::CONTENT_DISPOSITION, attachment_header(&original_name));
    }
    Ok(response)
}

async fn serve(path: &FsPath, request: Request) -> Result<Response, AppError> {
    if tokio::fs::metadata(path).await.is_err() {
        return Err(AppError::NotFound("File not found".to_string()));
    }

    let content_type = content_type_for(path);
    let response = match ServeFile::new_with_mime(path, &content_type).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    Ok(response.into_response())
}

pub fn attachment_header(file_name: &str) -> HeaderValue {
    let cleaned: String = file_name
        .chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '_' })
        .filter(|c| *c != '"' && *c != '\\')
        .collect();

    HeaderValue::from_str(&format!("attachment; filename=\"{}\"", cleaned))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_header_strips_quotes() {
        let value = attachment_header("my \"essay\".pdf");
        assert_eq!(value.to_str().unwrap(), "attachment; filename=\"my essay.pdf\"");
    }

    #[test]
    fn test_attachment_header_replaces_non_ascii() {
        let value = attachment_header("résumé.docx");
        assert_eq!(value.to_str().unwrap(), "attachment; filename=\"r_sum_.docx\"");
    }
}
