use anyhow::Context as _;
use api::db::{self, PgStore};
use api::settings::SessionSettings;
use api::storage::{MemoryAvatarStorage, SupabaseStorage};
use api::{AppState, Settings};
use tower_sessions::cookie::{time::Duration, SameSite};
use tower_sessions::{Expiry, SessionManagerLayer, SessionStore};
use tower_sessions_sqlx_store::PostgresStore;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")),
        )
        .init();

    let settings = Settings::new().context("Failed to load settings")?;
    let address = settings.server.address.clone();

    let router = if settings.server.in_memory {
        tracing::warn!("Running with in-memory storage; data is lost on restart");
        let sessions = session_layer(tower_sessions::MemoryStore::default(), &settings.session);
        let avatars = MemoryAvatarStorage::new(settings.storage.bucket.clone());
        let state = AppState::new(store::MemoryStore::new(), avatars, settings);
        api::router(state).layer(sessions)
    } else {
        let pool = db::get_pool(&settings.database)
            .await
            .context("Failed to connect to database")?;
        db::migrate(pool).await.context("Failed to run migrations")?;

        let session_store = PostgresStore::new(pool.clone());
        session_store
            .migrate()
            .await
            .context("Failed to create session table")?;
        let sessions = session_layer(session_store, &settings.session);

        let avatars = SupabaseStorage::new(&settings.storage);
        let state = AppState::new(PgStore::new(pool.clone()), avatars, settings);
        api::router(state).layer(sessions)
    };

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    tracing::info!("Server listening on {}", address);

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

fn session_layer<S>(store: S, settings: &SessionSettings) -> SessionManagerLayer<S>
where
    S: SessionStore + Clone,
{
    SessionManagerLayer::new(store)
        .with_secure(settings.secure)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(Duration::days(settings.expiry_days)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
