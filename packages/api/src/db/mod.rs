//! # Database module — PostgreSQL pool and the `BirthdayStore` implementation
//!
//! The pool is a **lazy, process-wide singleton** backed by a [`tokio::sync::OnceCell`].
//! The first call to [`get_pool`] connects with the configured
//! [`DatabaseSettings`](crate::settings::DatabaseSettings) and caches the pool for all
//! subsequent callers. [`migrate`] applies the embedded migrations.
//!
//! [`PgStore`] implements [`store::BirthdayStore`] on top of that pool. Category links
//! live in the `person_categories` join table, whose foreign keys cascade on delete.

mod pg_store;
mod pool;

pub use pg_store::PgStore;
pub use pool::{get_pool, migrate};
