use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use store::{seed_default_categories, NewUser, UserInfo};
use tower_sessions::Session;

use crate::auth::{self, CurrentUser};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Register a new account, seed its categories and sign it in.
pub async fn signup(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<SignupRequest>,
) -> AppResult<(StatusCode, Json<UserInfo>)> {
    let email = normalize_email(&req.email);
    let username = req.username.trim().to_string();

    if email.is_empty() || !email.contains('@') {
        return Err(AppError::bad_request("Invalid email address"));
    }
    if username.is_empty() {
        return Err(AppError::bad_request("Username is required"));
    }
    auth::check_password_policy(&req.password)?;

    let password_hash = auth::hash_password(&req.password)?;
    let user = state
        .store
        .insert_user(NewUser {
            email,
            username,
            password_hash,
        })
        .await?;

    let seeded = seed_default_categories(state.store.as_ref(), user.id).await?;
    tracing::info!("Created user {} with {} categories", user.id, seeded.len());

    auth::start_session(&session, &user).await?;
    Ok((StatusCode::CREATED, Json(user.to_info())))
}

/// Log in with email and password.
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<UserInfo>> {
    let email = normalize_email(&req.email);

    let Some(user) = state.store.find_user_by_email(&email).await? else {
        return Err(AppError::InvalidCredentials);
    };

    if !auth::verify_password(&req.password, &user.password_hash)? {
        tracing::debug!("Rejected password for {}", user.id);
        return Err(AppError::InvalidCredentials);
    }

    auth::start_session(&session, &user).await?;
    Ok(Json(user.to_info()))
}

/// Log out the current user by clearing the session.
pub async fn logout(session: Session) -> AppResult<StatusCode> {
    session.flush().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The signed-in account, or `null`.
pub async fn me(State(state): State<AppState>, session: Session) -> AppResult<Json<Option<UserInfo>>> {
    let Some(current) = CurrentUser::from_session(&session).await? else {
        return Ok(Json(None));
    };
    let user = state.store.find_user(current.id).await?;
    Ok(Json(user.map(|u| u.to_info())))
}
