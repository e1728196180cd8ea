//! Error types for the data layer.
//!
//! All errors are propagated via [`DbError`], which wraps the underlying
//! [`sqlx`] errors. At the workspace seam they are folded into
//! [`RemoteError`]: connectivity problems become
//! [`RemoteError::Unavailable`], everything else [`RemoteError::Backend`].

use cartograph_core::RemoteError;

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored row does not describe a valid feature record.
    #[error("Invalid feature row {id}: {reason}")]
    InvalidRow {
        /// Row id.
        id: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<DbError> for RemoteError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Postgres(
                sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed
                | sqlx::Error::Io(_)
                | sqlx::Error::Tls(_),
            ) => Self::Unavailable(err.to_string()),
            other => Self::Backend(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_exhaustion_is_unavailable() {
        let err = RemoteError::from(DbError::Postgres(sqlx::Error::PoolTimedOut));
        assert!(matches!(err, RemoteError::Unavailable(_)));
    }

    #[test]
    fn bad_rows_are_backend_failures() {
        let err = RemoteError::from(DbError::InvalidRow {
            id: String::from("r1"),
            reason: String::from("unknown kind"),
        });
        assert!(matches!(err, RemoteError::Backend(message) if message.contains("unknown kind")));
    }
}
