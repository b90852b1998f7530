use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use store::{group_by_month, upcoming, MonthGroup, Person, PersonInput, UpcomingQuery};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::{not_found, AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PinRequest {
    pub pinned: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpcomingParams {
    pub category: Option<String>,
    pub limit: Option<usize>,
    /// Reference day; the server's local date when absent.
    pub today: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpcomingResponse {
    pub today: NaiveDate,
    pub groups: Vec<MonthGroup>,
}

fn validate(input: &mut PersonInput) -> AppResult<()> {
    input.name = input.name.trim().to_string();
    if input.name.is_empty() {
        return Err(AppError::bad_request("Name is required"));
    }
    Ok(())
}

pub async fn list(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<Vec<Person>>> {
    Ok(Json(state.store.list_people(user.id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(mut input): Json<PersonInput>,
) -> AppResult<(StatusCode, Json<Person>)> {
    validate(&mut input)?;
    let person = state.store.insert_person(user.id, input).await?;
    Ok((StatusCode::CREATED, Json(person)))
}

pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(mut input): Json<PersonInput>,
) -> AppResult<Json<Person>> {
    validate(&mut input)?;
    let person = state
        .store
        .update_person(user.id, id, input)
        .await
        .map_err(not_found("Birthday"))?;
    Ok(Json(person))
}

pub async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    let person = state
        .store
        .delete_person(user.id, id)
        .await
        .map_err(not_found("Birthday"))?;

    if let Some(key) = person.avatar {
        if let Err(e) = state.avatars.remove(&key).await {
            tracing::warn!("Failed to delete avatar {}: {}", key, e);
        }
    }

    Ok(Json(serde_json::json!({ "message": "Birthday deleted successfully" })))
}

pub async fn pin(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<PinRequest>,
) -> AppResult<Json<Person>> {
    let person = state
        .store
        .set_pinned(user.id, id, req.pinned)
        .await
        .map_err(not_found("Birthday"))?;
    Ok(Json(person))
}

/// Upcoming birthdays, pinned first, grouped by month.
pub async fn list_upcoming(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<UpcomingParams>,
) -> AppResult<Json<UpcomingResponse>> {
    // one reference day for the whole pass
    let today = params.today.unwrap_or_else(|| Local::now().date_naive());
    let people = state.store.list_people(user.id).await?;

    let query = UpcomingQuery {
        today,
        category: params.category,
        limit: params.limit,
    };
    let groups = group_by_month(upcoming(&people, &query));

    Ok(Json(UpcomingResponse { today, groups }))
}
