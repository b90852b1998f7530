//! # BirthdayStore — the persistence seam
//!
//! Every read and write the HTTP layer performs goes through [`BirthdayStore`], so
//! the same handlers run against PostgreSQL in production and [`crate::MemoryStore`]
//! in tests. All person and category operations are scoped by the owning user's id:
//! a record that exists but belongs to someone else is reported as
//! [`StoreError::NotFound`], exactly like a missing one.
//!
//! ## Categories on people
//!
//! Writes reference categories by id; reads return them resolved. Ids that do not
//! name one of the owner's categories are ignored on write, and deleting a category
//! removes it from every person, so a [`Person`] never carries a dangling reference.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Category, CategoryInput, NewUser, Person, PersonInput, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("{0}")]
    Conflict(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait BirthdayStore: Send + Sync {
    /// Create an account. Fails with [`StoreError::Conflict`] if the e-mail is taken.
    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    async fn list_people(&self, owner: Uuid) -> StoreResult<Vec<Person>>;

    async fn get_person(&self, owner: Uuid, id: Uuid) -> StoreResult<Person>;

    async fn insert_person(&self, owner: Uuid, input: PersonInput) -> StoreResult<Person>;

    /// Replace the writable fields of a person. `pinned` and `avatar` are kept when
    /// the input leaves them unset.
    async fn update_person(&self, owner: Uuid, id: Uuid, input: PersonInput)
        -> StoreResult<Person>;

    async fn set_pinned(&self, owner: Uuid, id: Uuid, pinned: bool) -> StoreResult<Person>;

    /// Record a new avatar key and return the one it replaced.
    async fn set_avatar(&self, owner: Uuid, id: Uuid, key: &str) -> StoreResult<Option<String>>;

    /// Delete a person, returning the removed record.
    async fn delete_person(&self, owner: Uuid, id: Uuid) -> StoreResult<Person>;

    async fn list_categories(&self, owner: Uuid) -> StoreResult<Vec<Category>>;

    async fn insert_category(&self, owner: Uuid, input: CategoryInput) -> StoreResult<Category>;

    async fn insert_categories(
        &self,
        owner: Uuid,
        inputs: Vec<CategoryInput>,
    ) -> StoreResult<Vec<Category>>;

    async fn update_category(
        &self,
        owner: Uuid,
        id: Uuid,
        input: CategoryInput,
    ) -> StoreResult<Category>;

    /// Delete a category and detach it from every person that referenced it.
    async fn delete_category(&self, owner: Uuid, id: Uuid) -> StoreResult<()>;
}
