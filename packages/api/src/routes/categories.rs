use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use store::{Category, CategoryInput};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::{not_found, AppError, AppResult};
use crate::state::AppState;

fn validate(input: &mut CategoryInput) -> AppResult<()> {
    input.name = input.name.trim().to_string();
    if input.name.is_empty() {
        return Err(AppError::bad_request("Category name is required"));
    }
    input.color = input.color.trim().to_string();
    Ok(())
}

pub async fn list(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<Vec<Category>>> {
    Ok(Json(state.store.list_categories(user.id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(mut input): Json<CategoryInput>,
) -> AppResult<(StatusCode, Json<Category>)> {
    validate(&mut input)?;
    let category = state.store.insert_category(user.id, input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(mut input): Json<CategoryInput>,
) -> AppResult<Json<Category>> {
    validate(&mut input)?;
    let category = state
        .store
        .update_category(user.id, id, input)
        .await
        .map_err(not_found("Category"))?;
    Ok(Json(category))
}

/// Delete a category; people tagged with it simply lose the tag.
pub async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state
        .store
        .delete_category(user.id, id)
        .await
        .map_err(not_found("Category"))?;
    Ok(StatusCode::NO_CONTENT)
}
