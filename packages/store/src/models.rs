//! # Domain models for people, categories and accounts
//!
//! These are the records the [`crate::BirthdayStore`] hands out and the HTTP layer
//! serialises. Everything is `Serialize + Deserialize` so the same types cross the
//! server/client boundary unchanged.
//!
//! ## Types
//!
//! | Struct | Represents |
//! |--------|-----------|
//! | [`Person`] | Someone whose birthday is tracked. Carries the recurring `birthday`, optional contact fields, an opaque `avatar` storage key, the resolved [`Category`] list and the `pinned` flag. |
//! | [`PersonInput`] | The writable subset of a person, used for both create and update. Categories are referenced by id. |
//! | [`Category`] / [`CategoryInput`] | A named, coloured label owned by one user. |
//! | [`User`] | A registered account, including the Argon2 password hash. |
//! | [`UserInfo`] | The client-safe projection of a [`User`]. |
//!
//! Every record is owned by exactly one user; ownership is enforced by the store, so
//! the owner id is not part of the serialised form.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tracked person and their birthday.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: Uuid,
    pub name: String,
    /// The recurring date. Only month and day matter for recurrence; the year
    /// is used to compute the age being reached.
    pub birthday: NaiveDate,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    /// Object storage key of the avatar image, e.g. `"3f2c....png"`.
    pub avatar: Option<String>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub pinned: bool,
}

impl Person {
    /// Build a person from its writable fields, resolving category ids against
    /// the owner's categories. Unknown ids are dropped.
    pub fn from_input(id: Uuid, input: PersonInput, owned: &[Category]) -> Self {
        let categories = resolve_categories(&input.category_ids, owned);
        Self {
            id,
            name: input.name,
            birthday: input.birthday,
            phone: input.phone,
            email: input.email,
            address: input.address,
            notes: input.notes,
            avatar: input.avatar,
            categories,
            pinned: input.pinned.unwrap_or(false),
        }
    }

    /// Whether any of this person's categories is named `name`, ignoring case.
    pub fn has_category(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.categories
            .iter()
            .any(|c| c.name.to_lowercase() == name)
    }
}

/// Writable fields of a [`Person`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersonInput {
    pub name: String,
    pub birthday: NaiveDate,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub category_ids: Vec<Uuid>,
    /// Left untouched on update when absent.
    #[serde(default)]
    pub pinned: Option<bool>,
}

impl PersonInput {
    pub fn new(name: impl Into<String>, birthday: NaiveDate) -> Self {
        Self {
            name: name.into(),
            birthday,
            phone: None,
            email: None,
            address: None,
            notes: None,
            avatar: None,
            category_ids: Vec::new(),
            pinned: None,
        }
    }

    /// Builder method to attach categories.
    pub fn with_categories(mut self, ids: impl IntoIterator<Item = Uuid>) -> Self {
        self.category_ids = ids.into_iter().collect();
        self
    }

    /// Builder method to set the pinned flag.
    pub fn pinned(mut self, pinned: bool) -> Self {
        self.pinned = Some(pinned);
        self
    }
}

/// A user-defined label.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    /// CSS colour, e.g. `"#000000"`.
    pub color: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    pub color: String,
}

impl CategoryInput {
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
        }
    }
}

/// A registered account.
#[derive(Clone, Debug, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Convert to UserInfo for client consumption.
    pub fn to_info(&self) -> UserInfo {
        UserInfo {
            id: self.id,
            email: self.email.clone(),
            username: self.username.clone(),
        }
    }
}

/// Fields needed to create a [`User`].
#[derive(Clone, Debug)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
}

/// User information safe to send to the client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: Uuid,
    pub email: String,
    pub username: String,
}

/// Keep the categories in `owned` whose ids appear in `ids`, in the order of `ids`.
pub fn resolve_categories(ids: &[Uuid], owned: &[Category]) -> Vec<Category> {
    let mut resolved: Vec<Category> = Vec::with_capacity(ids.len());
    for id in ids {
        if resolved.iter().any(|c| c.id == *id) {
            continue;
        }
        if let Some(category) = owned.iter().find(|c| c.id == *id) {
            resolved.push(category.clone());
        }
    }
    resolved
}
