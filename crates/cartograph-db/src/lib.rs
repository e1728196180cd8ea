//! `PostgreSQL` record store for the Cartograph workspace.
//!
//! The workspace persists features through the
//! [`RemoteFeatureStore`](cartograph_core::RemoteFeatureStore) trait. This
//! crate implements it over a single `features` table, scoped by owner and
//! geometry kind, with version-conditional updates and deletes.
//!
//! # Modules
//!
//! - [`postgres`] -- Opening, migrating and closing the database
//! - [`feature_store`] -- The `features` table ([`PgFeatureStore`])
//! - [`error`] -- Shared error types

pub mod error;
pub mod feature_store;
pub mod postgres;

pub use error::DbError;
pub use feature_store::{FeatureRow, PgFeatureStore};
pub use postgres::{FeatureDatabase, PoolSettings};
