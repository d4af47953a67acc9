//! Appointment repository
//!
//! Database operations for appointments.
//!
//! The two writes here are single statements guarded by the store:
//! - `create_if_unclaimed` relies on the active-claim unique index, so of
//!   several concurrent inserts for one window exactly one lands and the
//!   others come back as `Ok(None)`.
//! - `cancel` is a conditional `UPDATE` that only matches a scheduled
//!   appointment owned by the given professor.

use super::is_unique_violation;
use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Appointment, AppointmentStatus, StudentAppointment};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

/// Appointment repository trait
#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    /// Insert a scheduled appointment for a window.
    ///
    /// Returns `None` if the window already has a scheduled appointment.
    async fn create_if_unclaimed(
        &self,
        student_id: i64,
        professor_id: i64,
        availability_id: i64,
    ) -> Result<Option<Appointment>>;

    /// Get appointment by ID, whatever its status
    async fn get_by_id(&self, id: i64) -> Result<Option<Appointment>>;

    /// Get the scheduled appointment on a window, if any
    async fn find_scheduled_by_availability(
        &self,
        availability_id: i64,
    ) -> Result<Option<Appointment>>;

    /// Cancel a scheduled appointment owned by `professor_id`.
    ///
    /// Returns `false` when nothing matched: unknown id, another professor's
    /// appointment, or one that is already cancelled.
    async fn cancel(&self, id: i64, professor_id: i64) -> Result<bool>;

    /// Window ids of the professor's scheduled appointments
    async fn booked_window_ids(&self, professor_id: i64) -> Result<HashSet<i64>>;

    /// A student's scheduled appointments joined with window times and
    /// professor name, ascending by start time
    async fn list_scheduled_by_student(&self, student_id: i64)
        -> Result<Vec<StudentAppointment>>;
}

/// SQLx-based appointment repository implementation
pub struct SqlxAppointmentRepository {
    pool: DynDatabasePool,
}

impl SqlxAppointmentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AppointmentRepository> {
        Arc::new(Self::new(pool))
    }
}

const SELECT_APPOINTMENT: &str = r#"
    SELECT id, student_id, professor_id, availability_id, status, created_at, cancelled_at
    FROM appointments
"#;

const SELECT_STUDENT_SCHEDULE: &str = r#"
    SELECT a.id, a.status, a.created_at, w.start_time, w.end_time, u.username AS professor_name
    FROM appointments a
    JOIN availability w ON w.id = a.availability_id
    JOIN users u ON u.id = a.professor_id
    WHERE a.student_id = ? AND a.status = 'scheduled'
    ORDER BY w.start_time, a.id
"#;

#[async_trait]
impl AppointmentRepository for SqlxAppointmentRepository {
    async fn create_if_unclaimed(
        &self,
        student_id: i64,
        professor_id: i64,
        availability_id: i64,
    ) -> Result<Option<Appointment>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_appointment_sqlite(
                    self.pool.sqlite()?,
                    student_id,
                    professor_id,
                    availability_id,
                )
                .await
            }
            DatabaseDriver::Mysql => {
                create_appointment_mysql(
                    self.pool.mysql()?,
                    student_id,
                    professor_id,
                    availability_id,
                )
                .await
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Appointment>> {
        let sql = format!("{SELECT_APPOINTMENT} WHERE id = ?");
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get appointment by ID")?;
                row.as_ref().map(row_to_appointment_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get appointment by ID")?;
                row.as_ref().map(row_to_appointment_mysql).transpose()
            }
        }
    }

    async fn find_scheduled_by_availability(
        &self,
        availability_id: i64,
    ) -> Result<Option<Appointment>> {
        let sql = format!("{SELECT_APPOINTMENT} WHERE availability_id = ? AND status = 'scheduled'");
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(availability_id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to look up scheduled appointment")?;
                row.as_ref().map(row_to_appointment_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(availability_id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to look up scheduled appointment")?;
                row.as_ref().map(row_to_appointment_mysql).transpose()
            }
        }
    }

    async fn cancel(&self, id: i64, professor_id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                cancel_appointment_sqlite(self.pool.sqlite()?, id, professor_id).await
            }
            DatabaseDriver::Mysql => {
                cancel_appointment_mysql(self.pool.mysql()?, id, professor_id).await
            }
        }
    }

    async fn booked_window_ids(&self, professor_id: i64) -> Result<HashSet<i64>> {
        let sql = "SELECT availability_id FROM appointments WHERE professor_id = ? AND status = 'scheduled'";
        let ids: HashSet<i64> = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(professor_id)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to list booked windows")?
                .iter()
                .map(|row| row.get::<i64, _>("availability_id"))
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(professor_id)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to list booked windows")?
                .iter()
                .map(|row| row.get::<i64, _>("availability_id"))
                .collect(),
        };

        Ok(ids)
    }

    async fn list_scheduled_by_student(
        &self,
        student_id: i64,
    ) -> Result<Vec<StudentAppointment>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(SELECT_STUDENT_SCHEDULE)
                    .bind(student_id)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list student appointments")?;
                rows.iter().map(row_to_student_appointment_sqlite).collect()
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(SELECT_STUDENT_SCHEDULE)
                    .bind(student_id)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list student appointments")?;
                rows.iter().map(row_to_student_appointment_mysql).collect()
            }
        }
    }
}

fn parse_status(raw: &str) -> Result<AppointmentStatus> {
    AppointmentStatus::from_str(raw)
        .with_context(|| format!("Invalid appointment status in database: {}", raw))
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_appointment_sqlite(
    pool: &SqlitePool,
    student_id: i64,
    professor_id: i64,
    availability_id: i64,
) -> Result<Option<Appointment>> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO appointments (student_id, professor_id, availability_id, status, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(student_id)
    .bind(professor_id)
    .bind(availability_id)
    .bind(AppointmentStatus::Scheduled.to_string())
    .bind(now)
    .execute(pool)
    .await;

    let result = match result {
        Ok(result) => result,
        Err(err) if is_unique_violation(&err) => return Ok(None),
        Err(err) => return Err(err).context("Failed to create appointment"),
    };

    Ok(Some(Appointment {
        id: result.last_insert_rowid(),
        student_id,
        professor_id,
        availability_id,
        status: AppointmentStatus::Scheduled,
        created_at: now,
        cancelled_at: None,
    }))
}

async fn cancel_appointment_sqlite(pool: &SqlitePool, id: i64, professor_id: i64) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE appointments
        SET status = 'cancelled', cancelled_at = ?
        WHERE id = ? AND professor_id = ? AND status = 'scheduled'
        "#,
    )
    .bind(Utc::now())
    .bind(id)
    .bind(professor_id)
    .execute(pool)
    .await
    .context("Failed to cancel appointment")?;

    Ok(result.rows_affected() == 1)
}

fn row_to_appointment_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Appointment> {
    Ok(Appointment {
        id: row.get("id"),
        student_id: row.get("student_id"),
        professor_id: row.get("professor_id"),
        availability_id: row.get("availability_id"),
        status: parse_status(&row.get::<String, _>("status"))?,
        created_at: row.get("created_at"),
        cancelled_at: row.get("cancelled_at"),
    })
}

fn row_to_student_appointment_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<StudentAppointment> {
    Ok(StudentAppointment {
        id: row.get("id"),
        status: parse_status(&row.get::<String, _>("status"))?,
        start_time: row.get("start_time"),
        end_time: row.get("end_time"),
        professor_name: row.get("professor_name"),
        created_at: row.get("created_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_appointment_mysql(
    pool: &MySqlPool,
    student_id: i64,
    professor_id: i64,
    availability_id: i64,
) -> Result<Option<Appointment>> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO appointments (student_id, professor_id, availability_id, status, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(student_id)
    .bind(professor_id)
    .bind(availability_id)
    .bind(AppointmentStatus::Scheduled.to_string())
    .bind(now)
    .execute(pool)
    .await;

    let result = match result {
        Ok(result) => result,
        Err(err) if is_unique_violation(&err) => return Ok(None),
        Err(err) => return Err(err).context("Failed to create appointment"),
    };

    Ok(Some(Appointment {
        id: result.last_insert_id() as i64,
        student_id,
        professor_id,
        availability_id,
        status: AppointmentStatus::Scheduled,
        created_at: now,
        cancelled_at: None,
    }))
}

async fn cancel_appointment_mysql(pool: &MySqlPool, id: i64, professor_id: i64) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE appointments
        SET status = 'cancelled', cancelled_at = ?
        WHERE id = ? AND professor_id = ? AND status = 'scheduled'
        "#,
    )
    .bind(Utc::now())
    .bind(id)
    .bind(professor_id)
    .execute(pool)
    .await
    .context("Failed to cancel appointment")?;

    Ok(result.rows_affected() == 1)
}

fn row_to_appointment_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Appointment> {
    Ok(Appointment {
        id: row.get("id"),
        student_id: row.get("student_id"),
        professor_id: row.get("professor_id"),
        availability_id: row.get("availability_id"),
        status: parse_status(&row.get::<String, _>("status"))?,
        created_at: row.get("created_at"),
        cancelled_at: row.get("cancelled_at"),
    })
}

fn row_to_student_appointment_mysql(row: &sqlx::mysql::MySqlRow) -> Result<StudentAppointment> {
    Ok(StudentAppointment {
        id: row.get("id"),
        status: parse_status(&row.get::<String, _>("status"))?,
        start_time: row.get("start_time"),
        end_time: row.get("end_time"),
        professor_name: row.get("professor_name"),
        created_at: row.get("created_at"),
    })
}
