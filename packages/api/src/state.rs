use std::sync::Arc;
use std::time::Duration;

use store::BirthdayStore;

use crate::settings::Settings;
use crate::storage::AvatarStorage;

/// Shared handles every handler can reach.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BirthdayStore>,
    pub avatars: Arc<dyn AvatarStorage>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(
        store: impl BirthdayStore + 'static,
        avatars: impl AvatarStorage + 'static,
        settings: Settings,
    ) -> Self {
        Self {
            store: Arc::new(store),
            avatars: Arc::new(avatars),
            settings: Arc::new(settings),
        }
    }

    /// Lifetime of signed avatar URLs.
    pub fn avatar_ttl(&self) -> Duration {
        Duration::from_secs(self.settings.storage.signed_url_ttl_secs)
    }
}
