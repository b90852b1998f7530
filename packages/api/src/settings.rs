//! # Server settings
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! `config.toml` in the working directory, then `BIRTHDAYS_*` environment
//! variables where `__` separates nesting levels (`BIRTHDAYS_STORAGE__SERVICE_KEY`
//! sets `storage.service_key`). A `.env` file is loaded first when present.

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[allow(unused)]
pub struct ServerSettings {
    pub address: String,
    /// Keep people, accounts, sessions and avatars in memory instead of
    /// PostgreSQL and object storage. Everything is lost on restart.
    pub in_memory: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8080".into(),
            in_memory: false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[allow(unused)]
pub struct DatabaseSettings {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: String,
    pub database: String,
    pub max_connections: u32,
}

impl DatabaseSettings {
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            user: "birthdays".into(),
            password: "password".into(),
            host: "localhost".into(),
            port: "5432".into(),
            database: "birthdays".into(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Deserialize)]
#[allow(unused)]
pub struct SessionSettings {
    /// Only send the session cookie over HTTPS.
    pub secure: bool,
    /// Inactivity expiry of a session.
    pub expiry_days: i64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            secure: false,
            expiry_days: 7,
        }
    }
}

#[derive(Debug, Deserialize)]
#[allow(unused)]
pub struct StorageSettings {
    /// Base URL of the object storage project, e.g. `https://xyz.supabase.co`.
    pub url: String,
    pub service_key: String,
    pub bucket: String,
    pub signed_url_ttl_secs: u64,
    pub max_upload_bytes: usize,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:54321".into(),
            service_key: String::new(),
            bucket: "images".into(),
            signed_url_ttl_secs: 60 * 60,
            max_upload_bytes: 5 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[allow(unused)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub session: SessionSettings,
    pub storage: StorageSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .set_default("server.address", "127.0.0.1:8080")?
            .set_default("server.in_memory", false)?
            .set_default("database.user", "birthdays")?
            .set_default("database.password", "password")?
            .set_default("database.host", "localhost")?
            .set_default("database.port", "5432")?
            .set_default("database.database", "birthdays")?
            .set_default("database.max_connections", 5)?
            .set_default("session.secure", false)?
            .set_default("session.expiry_days", 7)?
            .set_default("storage.url", "http://localhost:54321")?
            .set_default("storage.service_key", "")?
            .set_default("storage.bucket", "images")?
            .set_default("storage.signed_url_ttl_secs", 3600)?
            .set_default("storage.max_upload_bytes", 5 * 1024 * 1024)?
            .add_source(
                File::with_name("config.toml")
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix("BIRTHDAYS")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        config.try_deserialize()
    }
}
