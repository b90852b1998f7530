//! # API crate — the HTTP server side of Birthdays
//!
//! Everything the server binary needs to answer requests: configuration, the
//! PostgreSQL-backed [`store::BirthdayStore`], password and session handling, the avatar
//! object-storage client and the axum router.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`settings`] | Layered configuration (`config` crate): defaults, `config.toml`, `BIRTHDAYS_*` env |
//! | [`db`] | PostgreSQL pool (lazy `OnceCell` singleton), migrations, [`db::PgStore`] |
//! | [`auth`] | Argon2id password hashing, session keys, the [`auth::CurrentUser`] extractor |
//! | [`storage`] | [`storage::AvatarStorage`] with a Supabase-compatible client and an in-memory double |
//! | [`routes`] | axum handlers and [`router`] |
//! | [`error`] | [`AppError`], mapped onto HTTP status codes |
//!
//! ## Routes
//!
//! - **Authentication**: `POST /api/auth/signup`, `POST /api/auth/login`,
//!   `POST /api/auth/logout`, `GET /api/auth/me`
//! - **Birthdays**: `GET|POST /api/birthdays`, `PUT|DELETE /api/birthdays/{id}`,
//!   `PATCH /api/birthdays/{id}/pin`, `GET /api/birthdays/upcoming`
//! - **Avatars**: `POST|GET /api/birthdays/{id}/avatar`
//! - **Categories**: `GET|POST /api/categories`, `PUT|DELETE /api/categories/{id}`
//!
//! The router does not install a session layer; the binary picks the session store.

pub mod auth;
pub mod db;
pub mod error;
pub mod routes;
pub mod settings;
mod state;
pub mod storage;

pub use error::{AppError, AppResult};
pub use routes::router;
pub use settings::Settings;
pub use state::AppState;
