//! The `features` table as a remote feature store.
//!
//! Every write carries the local version it was produced from. Updates and
//! deletes are conditional on that version in the SQL itself, so two writes
//! for the same record racing on different connections still resolve to
//! the newer one:
//!
//! | Call | Condition |
//! |------|-----------|
//! | update | `version < $new` |
//! | delete | `version <= $deleted_at` |

use cartograph_core::{RemoteError, RemoteFeatureStore};
use cartograph_types::{FeatureRecord, GeometryKind, RecordDraft, RemoteId, UserId};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbError;

/// One row of the `features` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FeatureRow {
    /// Record id.
    pub id: Uuid,
    /// Owning user.
    pub owner_id: String,
    /// Geometry kind name.
    pub kind: String,
    /// Feature label.
    pub name: String,
    /// Rounded area in square meters.
    pub size: f64,
    /// Serialized coordinates.
    pub coordinates: String,
    /// Version of the last applied write.
    pub version: i64,
    /// Insert time.
    pub created_at: DateTime<Utc>,
    /// Last write time.
    pub updated_at: DateTime<Utc>,
}

impl FeatureRow {
    /// Convert to the workspace record type.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidRow`] for an unknown kind or a negative
    /// version.
    pub fn into_record(self) -> Result<FeatureRecord, DbError> {
        let invalid = |reason: String| DbError::InvalidRow {
            id: self.id.to_string(),
            reason,
        };
        let kind = GeometryKind::parse(&self.kind)
            .ok_or_else(|| invalid(format!("unknown kind {:?}", self.kind)))?;
        let version = u64::try_from(self.version)
            .map_err(|err| invalid(format!("version {}: {err}", self.version)))?;
        Ok(FeatureRecord {
            id: RemoteId::new(self.id.to_string()),
            owner_id: UserId::new(self.owner_id),
            kind,
            name: self.name,
            size: self.size,
            coordinates: self.coordinates,
            version,
        })
    }
}

/// Feature records in `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct PgFeatureStore {
    pool: PgPool,
}

impl PgFeatureStore {
    /// Create a store over a connection pool.
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetch every record of one owner and kind, oldest first.
    ///
    /// Rows that cannot be converted are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn load_for_owner(
        &self,
        owner: &UserId,
        kind: GeometryKind,
    ) -> Result<Vec<FeatureRecord>, DbError> {
        let rows = sqlx::query_as::<_, FeatureRow>(
            r"SELECT id, owner_id, kind, name, size, coordinates, version, created_at, updated_at
              FROM features
              WHERE owner_id = $1 AND kind = $2
              ORDER BY created_at, id",
        )
        .bind(owner.as_str())
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        let records: Vec<FeatureRecord> = rows
            .into_iter()
            .filter_map(|row| match row.into_record() {
                Ok(record) => Some(record),
                Err(err) => {
                    tracing::warn!(error = %err, "Skipping unreadable feature row");
                    None
                }
            })
            .collect();
        tracing::debug!(owner = %owner, %kind, count = records.len(), "Loaded feature records");
        Ok(records)
    }

    /// Insert a new record and return its id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn insert(&self, draft: &RecordDraft) -> Result<RemoteId, DbError> {
        let id = Uuid::now_v7();
        sqlx::query(
            r"INSERT INTO features (id, owner_id, kind, name, size, coordinates, version)
              VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(id)
        .bind(draft.owner_id.as_str())
        .bind(draft.kind.as_str())
        .bind(&draft.name)
        .bind(draft.size)
        .bind(&draft.coordinates)
        .bind(version_param(draft.version))
        .execute(&self.pool)
        .await?;

        tracing::debug!(record = %id, version = draft.version, "Inserted feature record");
        Ok(RemoteId::new(id.to_string()))
    }

    /// Overwrite a record of `draft.owner_id` when the draft is newer than
    /// the stored version.
    ///
    /// Returns `Ok(None)` if the owner has no such record, `Ok(Some(false))`
    /// for a stale draft, and `Ok(Some(true))` when applied.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the statement fails.
    pub async fn update_if_newer(
        &self,
        id: Uuid,
        draft: &RecordDraft,
    ) -> Result<Option<bool>, DbError> {
        let result = sqlx::query(
            r"UPDATE features
              SET name = $2, size = $3, coordinates = $4, version = $5, updated_at = now()
              WHERE id = $1 AND owner_id = $6 AND version < $5",
        )
        .bind(id)
        .bind(&draft.name)
        .bind(draft.size)
        .bind(&draft.coordinates)
        .bind(version_param(draft.version))
        .bind(draft.owner_id.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(Some(true));
        }
        let exists: bool = sqlx::query_scalar(
            r"SELECT EXISTS(SELECT 1 FROM features WHERE id = $1 AND owner_id = $2)",
        )
        .bind(id)
        .bind(draft.owner_id.as_str())
        .fetch_one(&self.pool)
        .await?;
        if exists {
            tracing::debug!(record = %id, version = draft.version, "Stale update ignored");
            Ok(Some(false))
        } else {
            Ok(None)
        }
    }

    /// Delete a record of `owner` unless it was written with a newer
    /// version.
    ///
    /// Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the statement fails.
    pub async fn delete_if_not_newer(
        &self,
        id: Uuid,
        owner: &UserId,
        version: u64,
    ) -> Result<bool, DbError> {
        let result = sqlx::query(
            r"DELETE FROM features WHERE id = $1 AND owner_id = $2 AND version <= $3",
        )
        .bind(id)
        .bind(owner.as_str())
        .bind(version_param(version))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Fetch one record.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails or the row is invalid.
    pub async fn get(&self, id: Uuid) -> Result<Option<FeatureRecord>, DbError> {
        let row = sqlx::query_as::<_, FeatureRow>(
            r"SELECT id, owner_id, kind, name, size, coordinates, version, created_at, updated_at
              FROM features
              WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(FeatureRow::into_record).transpose()
    }
}

impl RemoteFeatureStore for PgFeatureStore {
    async fn load(
        &self,
        owner: &UserId,
        kind: GeometryKind,
    ) -> Result<Vec<FeatureRecord>, RemoteError> {
        Ok(self.load_for_owner(owner, kind).await?)
    }

    async fn create(&self, draft: RecordDraft) -> Result<RemoteId, RemoteError> {
        Ok(self.insert(&draft).await?)
    }

    async fn update(&self, id: &RemoteId, draft: RecordDraft) -> Result<(), RemoteError> {
        let not_found = || RemoteError::NotFound(id.clone());
        let uuid = parse_id(id).ok_or_else(not_found)?;
        match self.update_if_newer(uuid, &draft).await? {
            Some(_) => Ok(()),
            None => Err(not_found()),
        }
    }

    async fn delete(&self, id: &RemoteId, owner: &UserId, version: u64) -> Result<(), RemoteError> {
        // An id that is not a UUID names no row, which counts as deleted.
        if let Some(uuid) = parse_id(id) {
            self.delete_if_not_newer(uuid, owner, version).await?;
        }
        Ok(())
    }
}

fn parse_id(id: &RemoteId) -> Option<Uuid> {
    Uuid::parse_str(id.as_str()).ok()
}

fn version_param(version: u64) -> i64 {
    i64::try_from(version).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(kind: &str, version: i64) -> FeatureRow {
        FeatureRow {
            id: Uuid::nil(),
            owner_id: String::from("alice"),
            kind: kind.to_owned(),
            name: String::from("Home"),
            size: 12.5,
            coordinates: String::from("[1.0,2.0]"),
            version,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn row_converts_to_record() {
        let record = row("point", 3).into_record();
        assert!(record.is_ok_and(|r| {
            r.kind == GeometryKind::Point
                && r.version == 3
                && r.owner_id == UserId::from("alice")
                && r.id.as_str() == Uuid::nil().to_string()
        }));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!(matches!(
            row("circle", 1).into_record(),
            Err(DbError::InvalidRow { .. })
        ));
    }

    #[test]
    fn negative_version_is_rejected() {
        assert!(row("polygon", -1).into_record().is_err());
    }

    #[test]
    fn non_uuid_ids_name_no_row() {
        assert_eq!(parse_id(&RemoteId::from("not-a-uuid")), None);
        assert_eq!(version_param(u64::MAX), i64::MAX);
    }
}
