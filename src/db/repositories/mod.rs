//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the operations for a specific table.

pub mod appointment;
pub mod availability;
pub mod session;
pub mod user;

pub use appointment::{AppointmentRepository, SqlxAppointmentRepository};
pub use availability::{AvailabilityRepository, SqlxAvailabilityRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};

/// Whether a sqlx error is the store rejecting a row for a UNIQUE constraint.
///
/// Repositories turn this into `Ok(None)` so services can tell a lost race or
/// a duplicate apart from a real failure.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{TimeWindow, User, UserRole};
    use chrono::{TimeZone, Utc};

    pub async fn setup_pool() -> DynDatabasePool {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool
    }

    pub async fn seed_user(pool: &DynDatabasePool, username: &str, role: UserRole) -> i64 {
        SqlxUserRepository::new(pool.clone())
            .create(&User::new(username.to_string(), "hash".to_string(), role))
            .await
            .expect("Failed to create user")
            .expect("Username already taken")
            .id
    }

    /// Window on 2030-01-01 between the given UTC hours
    pub fn window_at(start_hour: u32, end_hour: u32) -> TimeWindow {
        let day = |hour| Utc.with_ymd_and_hms(2030, 1, 1, hour, 0, 0).unwrap();
        TimeWindow::new(day(start_hour), day(end_hour))
    }

    pub async fn seed_window(
        pool: &DynDatabasePool,
        professor_id: i64,
        start_hour: u32,
        end_hour: u32,
    ) -> i64 {
        SqlxAvailabilityRepository::new(pool.clone())
            .create(professor_id, &window_at(start_hour, end_hour))
            .await
            .expect("Failed to create window")
            .expect("Window already declared")
            .id
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{seed_user, setup_pool};
    use super::*;
    use crate::models::UserRole;

    #[tokio::test]
    async fn test_is_unique_violation() {
        let pool = setup_pool().await;
        seed_user(&pool, "alice", UserRole::Student).await;
        let sqlite = pool.as_sqlite().unwrap();

        let err = sqlx::query("INSERT INTO users (username, password_hash, role) VALUES ('alice', 'h', 'student')")
            .execute(sqlite)
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));

        let err = sqlx::query("SELECT * FROM no_such_table")
            .execute(sqlite)
            .await
            .unwrap_err();
        assert!(!is_unique_violation(&err));
    }
}
