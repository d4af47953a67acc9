//! Availability repository
//!
//! Database operations for availability windows.
//!
//! Windows are insert-only. The `(professor_id, start_time, end_time)` unique
//! index is what rejects a duplicate declaration; `create` reports that case
//! as `Ok(None)` instead of an error.

use super::is_unique_violation;
use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{AvailabilityWindow, TimeWindow};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Availability repository trait
#[async_trait]
pub trait AvailabilityRepository: Send + Sync {
    /// Insert a window for a professor.
    ///
    /// Returns `None` if the professor already declared exactly this window.
    async fn create(
        &self,
        professor_id: i64,
        window: &TimeWindow,
    ) -> Result<Option<AvailabilityWindow>>;

    /// Get an available window by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<AvailabilityWindow>>;

    /// List a professor's available windows in insertion (id) order
    async fn list_by_professor(&self, professor_id: i64) -> Result<Vec<AvailabilityWindow>>;
}

/// SQLx-based availability repository implementation
pub struct SqlxAvailabilityRepository {
    pool: DynDatabasePool,
}

impl SqlxAvailabilityRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AvailabilityRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl AvailabilityRepository for SqlxAvailabilityRepository {
    async fn create(
        &self,
        professor_id: i64,
        window: &TimeWindow,
    ) -> Result<Option<AvailabilityWindow>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_window_sqlite(self.pool.sqlite()?, professor_id, window).await
            }
            DatabaseDriver::Mysql => {
                create_window_mysql(self.pool.mysql()?, professor_id, window).await
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<AvailabilityWindow>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_window_by_id_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_window_by_id_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn list_by_professor(&self, professor_id: i64) -> Result<Vec<AvailabilityWindow>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_windows_by_professor_sqlite(self.pool.sqlite()?, professor_id).await
            }
            DatabaseDriver::Mysql => {
                list_windows_by_professor_mysql(self.pool.mysql()?, professor_id).await
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_window_sqlite(
    pool: &SqlitePool,
    professor_id: i64,
    window: &TimeWindow,
) -> Result<Option<AvailabilityWindow>> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO availability (professor_id, start_time, end_time, is_available, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(professor_id)
    .bind(window.start_time)
    .bind(window.end_time)
    .bind(true)
    .bind(now)
    .execute(pool)
    .await;

    let result = match result {
        Ok(result) => result,
        Err(err) if is_unique_violation(&err) => return Ok(None),
        Err(err) => return Err(err).context("Failed to create availability window"),
    };

    Ok(Some(AvailabilityWindow {
        id: result.last_insert_rowid(),
        professor_id,
        start_time: window.start_time,
        end_time: window.end_time,
        is_available: true,
        created_at: now,
    }))
}

async fn get_window_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<AvailabilityWindow>> {
    let row = sqlx::query(
        r#"
        SELECT id, professor_id, start_time, end_time, is_available, created_at
        FROM availability
        WHERE id = ? AND is_available = ?
        "#,
    )
    .bind(id)
    .bind(true)
    .fetch_optional(pool)
    .await
    .context("Failed to get availability window by ID")?;

    Ok(row.as_ref().map(row_to_window_sqlite))
}

async fn list_windows_by_professor_sqlite(
    pool: &SqlitePool,
    professor_id: i64,
) -> Result<Vec<AvailabilityWindow>> {
    let rows = sqlx::query(
        r#"
        SELECT id, professor_id, start_time, end_time, is_available, created_at
        FROM availability
        WHERE professor_id = ? AND is_available = ?
        ORDER BY id
        "#,
    )
    .bind(professor_id)
    .bind(true)
    .fetch_all(pool)
    .await
    .context("Failed to list availability windows")?;

    Ok(rows.iter().map(row_to_window_sqlite).collect())
}

fn row_to_window_sqlite(row: &sqlx::sqlite::SqliteRow) -> AvailabilityWindow {
    AvailabilityWindow {
        id: row.get("id"),
        professor_id: row.get("professor_id"),
        start_time: row.get("start_time"),
        end_time: row.get("end_time"),
        is_available: row.get("is_available"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_window_mysql(
    pool: &MySqlPool,
    professor_id: i64,
    window: &TimeWindow,
) -> Result<Option<AvailabilityWindow>> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO availability (professor_id, start_time, end_time, is_available, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(professor_id)
    .bind(window.start_time)
    .bind(window.end_time)
    .bind(true)
    .bind(now)
    .execute(pool)
    .await;

    let result = match result {
        Ok(result) => result,
        Err(err) if is_unique_violation(&err) => return Ok(None),
        Err(err) => return Err(err).context("Failed to create availability window"),
    };

    Ok(Some(AvailabilityWindow {
        id: result.last_insert_id() as i64,
        professor_id,
        start_time: window.start_time,
        end_time: window.end_time,
        is_available: true,
        created_at: now,
    }))
}

async fn get_window_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<AvailabilityWindow>> {
    let row = sqlx::query(
        r#"
        SELECT id, professor_id, start_time, end_time, is_available, created_at
        FROM availability
        WHERE id = ? AND is_available = ?
        "#,
    )
    .bind(id)
    .bind(true)
    .fetch_optional(pool)
    .await
    .context("Failed to get availability window by ID")?;

    Ok(row.as_ref().map(row_to_window_mysql))
}

async fn list_windows_by_professor_mysql(
    pool: &MySqlPool,
    professor_id: i64,
) -> Result<Vec<AvailabilityWindow>> {
    let rows = sqlx::query(
        r#"
        SELECT id, professor_id, start_time, end_time, is_available, created_at
        FROM availability
        WHERE professor_id = ? AND is_available = ?
        ORDER BY id
        "#,
    )
    .bind(professor_id)
    .bind(true)
    .fetch_all(pool)
    .await
    .context("Failed to list availability windows")?;

    Ok(rows.iter().map(row_to_window_mysql).collect())
}

fn row_to_window_mysql(row: &sqlx::mysql::MySqlRow) -> AvailabilityWindow {
    AvailabilityWindow {
        id: row.get("id"),
        professor_id: row.get("professor_id"),
        start_time: row.get("start_time"),
        end_time: row.get("end_time"),
        is_available: row.get("is_available"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{seed_user, setup_pool, window_at};
    use crate::models::UserRole;

    #[tokio::test]
    async fn test_create_window() {
        let pool = setup_pool().await;
        let prof = seed_user(&pool, "turing", UserRole::Professor).await;
        let repo = SqlxAvailabilityRepository::new(pool);

        let window = window_at(10, 11);
        let created = repo
            .create(prof, &window)
            .await
            .expect("Failed to create window")
            .expect("Window should be new");

        assert!(created.id > 0);
        assert_eq!(created.professor_id, prof);
        assert_eq!(created.start_time, window.start_time);
        assert!(created.is_available);

        let found = repo.get_by_id(created.id).await.unwrap().expect("Window not found");
        assert_eq!(found, AvailabilityWindow { created_at: found.created_at, ..created });
    }

    #[tokio::test]
    async fn test_duplicate_window_returns_none() {
        let pool = setup_pool().await;
        let prof = seed_user(&pool, "turing", UserRole::Professor).await;
        let repo = SqlxAvailabilityRepository::new(pool);

        let window = window_at(10, 11);
        assert!(repo.create(prof, &window).await.unwrap().is_some());
        assert!(repo.create(prof, &window).await.unwrap().is_none());

        assert_eq!(repo.list_by_professor(prof).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_same_times_for_different_professors() {
        let pool = setup_pool().await;
        let first = seed_user(&pool, "turing", UserRole::Professor).await;
        let second = seed_user(&pool, "hopper", UserRole::Professor).await;
        let repo = SqlxAvailabilityRepository::new(pool);

        let window = window_at(10, 11);
        assert!(repo.create(first, &window).await.unwrap().is_some());
        assert!(repo.create(second, &window).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_list_by_professor_in_insertion_order() {
        let pool = setup_pool().await;
        let prof = seed_user(&pool, "turing", UserRole::Professor).await;
        let other = seed_user(&pool, "hopper", UserRole::Professor).await;
        let repo = SqlxAvailabilityRepository::new(pool);

        let late = repo.create(prof, &window_at(14, 15)).await.unwrap().unwrap();
        let early = repo.create(prof, &window_at(9, 10)).await.unwrap().unwrap();
        repo.create(other, &window_at(9, 10)).await.unwrap();

        let ids: Vec<i64> = repo
            .list_by_professor(prof)
            .await
            .unwrap()
            .iter()
            .map(|w| w.id)
            .collect();
        assert_eq!(ids, vec![late.id, early.id]);

        assert!(repo.list_by_professor(9999).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let pool = setup_pool().await;
        let repo = SqlxAvailabilityRepository::new(pool);

        assert!(repo.get_by_id(42).await.unwrap().is_none());
    }
}
