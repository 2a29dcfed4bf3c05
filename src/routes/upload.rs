use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::error::ApiError;
use crate::media::{ImageInfo, StoredImage};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageListResponse {
    pub images: Vec<ImageInfo>,
    pub total: usize,
}

/// POST /api/admin/uploads/{bucket}
///
/// Takes the first multipart field as the file.
pub async fn upload_image(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<StoredImage>), ApiError> {
    let field = match multipart.next_field().await {
        Ok(Some(field)) => field,
        Ok(None) => return Err(ApiError::bad_request("No file provided")),
        Err(e) => {
            tracing::error!("Multipart error: {}", e);
            return Err(ApiError::bad_request("Invalid multipart data"));
        }
    };

    let original_name = field.file_name().unwrap_or("unknown").to_string();
    let bytes = field.bytes().await.map_err(|e| {
        tracing::error!("Failed to read upload bytes: {}", e);
        ApiError::bad_request("Failed to read file data")
    })?;

    let stored = state.images.save(&bucket, &original_name, &bytes).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// GET /api/admin/uploads/{bucket}
pub async fn list_images(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
) -> Result<Json<ImageListResponse>, ApiError> {
    let images = state.images.list(&bucket).await?;
    let total = images.len();
    Ok(Json(ImageListResponse { images, total }))
}

/// DELETE /api/admin/uploads/{bucket}/{filename}
pub async fn delete_image(
    State(state): State<AppState>,
    Path((bucket, filename)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state.images.delete(&bucket, &filename).await?;
    Ok(StatusCode::NO_CONTENT)
}
