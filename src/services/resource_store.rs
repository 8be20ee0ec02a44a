//! Resource store adapter.
//!
//! A thin interface over the remote `recursos` collection: create, list,
//! delete, and the two point lookups the validation engine needs. No
//! business logic lives here beyond submission validation; the adapter does
//! not cache and does not notify; after a write, callers re-list to refresh
//! whatever they are displaying.
//!
//! The adapter is a trait so the validation engine and the scan session
//! controller can be driven against an in-memory double in tests.

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::resource::{NewResource, Resource},
};

/// Contract for the remote resource collection.
///
/// # Failure Model
///
/// Every method can fail with `StoreUnavailable` when the remote call
/// errors. On a failed `list`, callers must leave whatever they previously
/// fetched untouched, no partial overwrite. Lookup misses are `Ok(None)`,
/// not errors.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// All resources, ordered by `created_at` descending (newest first).
    async fn list(&self) -> Result<Vec<Resource>, AppError>;

    /// Persist one new resource and return it as the store recorded it
    /// (id and timestamp assigned by the store).
    ///
    /// # Errors
    ///
    /// - `ValidationRejected`: empty name, or a malformed non-empty URL.
    ///   Rejected before any remote call is made.
    /// - `StoreUnavailable`: remote error.
    async fn create(&self, new: NewResource) -> Result<Resource, AppError>;

    /// Delete a resource by id.
    ///
    /// # Errors
    ///
    /// - `NotFound`: the store reported zero rows deleted.
    /// - `StoreUnavailable`: remote error.
    async fn delete_by_id(&self, id: Uuid) -> Result<(), AppError>;

    /// Point lookup by id. `None` on miss.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Resource>, AppError>;

    /// Point lookup by URL, exact string match only: no trimming, case
    /// folding, or trailing-slash reconciliation. `None` on miss. If several
    /// resources share a URL, the first store-returned match wins.
    async fn find_by_url(&self, url: &str) -> Result<Option<Resource>, AppError>;
}

/// PostgreSQL-backed implementation of [`ResourceStore`].
///
/// Columns on the remote side keep their original names
/// (`nombre`, `descripcion`); the `Resource` model maps them back to English
/// field names.
#[derive(Clone)]
pub struct PgResourceStore {
    pool: DbPool,
}

impl PgResourceStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResourceStore for PgResourceStore {
    async fn list(&self) -> Result<Vec<Resource>, AppError> {
        let resources = sqlx::query_as::<_, Resource>(
            r#"
            SELECT id, nombre, descripcion, url, created_at
            FROM recursos
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(resources)
    }

    async fn create(&self, new: NewResource) -> Result<Resource, AppError> {
        // Reject bad submissions before they reach the store
        new.validate()?;

        let resource = sqlx::query_as::<_, Resource>(
            r#"
            INSERT INTO recursos (nombre, descripcion, url)
            VALUES ($1, $2, $3)
            RETURNING id, nombre, descripcion, url, created_at
            "#,
        )
        .bind(&new.name)
        .bind(new.description_or_none())
        .bind(new.url_or_none())
        .fetch_one(&self.pool)
        .await?;

        Ok(resource)
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM recursos WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        // Postgres reports affected rows, so a miss is observable
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Resource>, AppError> {
        let resource = sqlx::query_as::<_, Resource>(
            r#"
            SELECT id, nombre, descripcion, url, created_at
            FROM recursos
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(resource)
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<Resource>, AppError> {
        // Exact match only; ties broken by insertion order
        let resource = sqlx::query_as::<_, Resource>(
            r#"
            SELECT id, nombre, descripcion, url, created_at
            FROM recursos
            WHERE url = $1
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(resource)
    }
}
