//! Categories every new account starts with.

use uuid::Uuid;

use crate::models::{Category, CategoryInput};
use crate::repo::{BirthdayStore, StoreResult};

pub const DEFAULT_CATEGORY_COLOR: &str = "#000000";

pub const DEFAULT_CATEGORY_NAMES: [&str; 4] = ["Family", "Friends", "Coworkers", "Pets"];

pub fn default_categories() -> Vec<CategoryInput> {
    DEFAULT_CATEGORY_NAMES
        .iter()
        .map(|name| CategoryInput::new(*name, DEFAULT_CATEGORY_COLOR))
        .collect()
}

/// Seed the default categories for `owner` unless they already have any.
/// Returns the categories that were created.
pub async fn seed_default_categories(
    store: &dyn BirthdayStore,
    owner: Uuid,
) -> StoreResult<Vec<Category>> {
    if !store.list_categories(owner).await?.is_empty() {
        return Ok(Vec::new());
    }
    store.insert_categories(owner, default_categories()).await
}
