//! Session keys and the [`CurrentUser`] extractor.

use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use store::User;
use tower_sessions::Session;
use uuid::Uuid;

use crate::error::AppError;

/// Key for storing user ID in session.
pub const SESSION_USER_ID_KEY: &str = "user_id";
/// Key for storing the username in session.
pub const SESSION_USERNAME_KEY: &str = "username";

/// The signed-in user, taken from the session. Rejects with 401 when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: Uuid,
    pub username: String,
}

impl CurrentUser {
    pub async fn from_session(session: &Session) -> Result<Option<Self>, AppError> {
        let Some(id) = session.get::<Uuid>(SESSION_USER_ID_KEY).await? else {
            return Ok(None);
        };
        let username = session
            .get::<String>(SESSION_USERNAME_KEY)
            .await?
            .unwrap_or_default();
        Ok(Some(Self { id, username }))
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, message)| AppError::Internal(message.to_string()))?;
        CurrentUser::from_session(&session)
            .await?
            .ok_or(AppError::Unauthorized)
    }
}

/// Bind `user` to the session, rotating the session id first.
pub async fn start_session(session: &Session, user: &User) -> Result<(), AppError> {
    session.cycle_id().await?;
    session.insert(SESSION_USER_ID_KEY, user.id).await?;
    session
        .insert(SESSION_USERNAME_KEY, user.username.clone())
        .await?;
    Ok(())
}
