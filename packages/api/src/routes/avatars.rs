use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::{not_found, AppError, AppResult};
use crate::state::AppState;
use crate::storage::{avatar_key, is_allowed_avatar_type};

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub path: String,
    pub signed_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignedUrlResponse {
    pub signed_url: String,
}

struct ImageUpload {
    file_name: Option<String>,
    content_type: String,
    data: Vec<u8>,
}

/// Pull the `image` part out of the form.
async fn read_image(mut multipart: Multipart) -> AppResult<ImageUpload> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(e.body_text()))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::bad_request(e.body_text()))?;
        return Ok(ImageUpload {
            file_name,
            content_type,
            data: data.to_vec(),
        });
    }
    Err(AppError::bad_request("Missing image file"))
}

/// Store a new avatar for a person and drop the one it replaces.
pub async fn upload(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    state
        .store
        .get_person(user.id, id)
        .await
        .map_err(not_found("Birthday"))?;

    let image = read_image(multipart).await?;
    if !is_allowed_avatar_type(&image.content_type) {
        return Err(AppError::bad_request("Unsupported image format"));
    }
    if image.data.is_empty() {
        return Err(AppError::bad_request("Missing image file"));
    }

    let key = avatar_key(image.file_name.as_deref());
    state
        .avatars
        .upload(&key, image.data, &image.content_type)
        .await?;

    let previous = match state.store.set_avatar(user.id, id, &key).await {
        Ok(previous) => previous,
        Err(e) => {
            // nothing references the new object
            if let Err(e) = state.avatars.remove(&key).await {
                tracing::warn!("Failed to delete orphaned avatar {}: {}", key, e);
            }
            return Err(not_found("Birthday")(e));
        }
    };
    if let Some(old) = previous.filter(|old| *old != key) {
        if let Err(e) = state.avatars.remove(&old).await {
            tracing::warn!("Failed to delete old avatar {}: {}", old, e);
        }
    }

    let signed_url = state.avatars.signed_url(&key, state.avatar_ttl()).await?;
    tracing::info!("Uploaded avatar {} for {}", key, id);

    Ok(Json(UploadResponse {
        message: "Uploaded successfully".to_string(),
        path: key,
        signed_url,
    }))
}

/// A time-limited URL for the person's current avatar.
pub async fn signed_url(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SignedUrlResponse>> {
    let person = state
        .store
        .get_person(user.id, id)
        .await
        .map_err(not_found("Birthday"))?;
    let key = person.avatar.ok_or(AppError::NotFound("Avatar"))?;
    let signed_url = state.avatars.signed_url(&key, state.avatar_ttl()).await?;
    Ok(Json(SignedUrlResponse { signed_url }))
}
