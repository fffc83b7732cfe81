use axum::extract::{Multipart, Path, State};
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use base64::prelude::*;
use chrono::Utc;
use tracing::{info, warn};

use crate::policy::{check_upload, UploadRejection};

use super::auth::require_active_user;
use super::error::ApiError;
use super::responses::{ImageUrlResponse, UploadResponse};
use super::state::AppState;

/// The declared content type, or one guessed from the file name.
fn resolve_content_type(declared: Option<&str>, filename: &str) -> String {
    match declared.map(str::trim).filter(|ct| !ct.is_empty() && *ct != "application/octet-stream") {
        Some(content_type) => content_type.to_ascii_lowercase(),
        None => mime_guess::from_path(filename)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string(),
    }
}

fn rejection_message(rejection: &UploadRejection) -> String {
    match rejection {
        UploadRejection::TooLarge { size, max } => format!(
            "Arquivo muito grande ({:.2}MB). Máximo permitido: {}MB.",
            *size as f64 / (1024.0 * 1024.0),
            max / (1024 * 1024)
        ),
        UploadRejection::UnsupportedType(content_type) => format!(
            "Tipo de arquivo não suportado: {content_type}. Use JPG, PNG, WEBP ou GIF."
        ),
    }
}

/// Stores the multipart `file` field as a base64 data URL.
pub async fn upload(
    State(state): State<AppState>,
    jar: CookieJar,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let user = require_active_user(&state, &jar).await?;

    let mut file = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = resolve_content_type(field.content_type(), &filename);
        let bytes = field.bytes().await?;
        file = Some((filename, content_type, bytes));
        break;
    }
    let (filename, content_type, bytes) = file.ok_or_else(|| {
        ApiError::bad_request("No file provided. Please select an image file to upload.")
    })?;

    if let Err(rejection) = check_upload(&content_type, bytes.len(), state.settings.max_upload_bytes) {
        warn!(user_id = %user.id, error = %rejection, "upload rejected");
        return Err(ApiError::BadRequest(rejection_message(&rejection)));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let data_url = format!("data:{content_type};base64,{}", BASE64_STANDARD.encode(&bytes));
    let size = bytes.len();
    let file_size = i64::try_from(size).map_err(|_| ApiError::bad_request("file too large"))?;
    state
        .store
        .save_uploaded_image(&id, &user.id, &filename, &content_type, &data_url, file_size, Utc::now())
        .await?;

    info!(image_id = %id, user_id = %user.id, size, content_type = %content_type, "image uploaded");
    Ok(Json(UploadResponse {
        url: data_url,
        id,
        filename,
        size,
        message: "Imagem enviada com sucesso!",
    }))
}

pub async fn image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ImageUrlResponse>, ApiError> {
    let image = state
        .store
        .uploaded_image(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Image not found"))?;
    Ok(Json(ImageUrlResponse { url: image.data_url }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::{rejection_message, resolve_content_type};
    use crate::policy::UploadRejection;

    #[test]
    fn content_type_falls_back_to_filename() {
        assert_eq!(resolve_content_type(Some("IMAGE/PNG"), "a.jpg"), "image/png");
        assert_eq!(resolve_content_type(None, "foto.webp"), "image/webp");
        assert_eq!(
            resolve_content_type(Some("application/octet-stream"), "foto.jpg"),
            "image/jpeg"
        );
    }

    #[test]
    fn too_large_message_reports_megabytes() {
        let message = rejection_message(&UploadRejection::TooLarge {
            size: 6 * 1024 * 1024,
            max: 5 * 1024 * 1024,
        });
        assert!(message.contains("6.00MB"));
        assert!(message.contains("5MB"));
    }
}
