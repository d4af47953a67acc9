//! Database layer
//!
//! Storage for users, sessions, availability windows and appointments.
//! Two backends are supported:
//! - SQLite (default, single-file deployment; `:memory:` for tests)
//! - MySQL
//!
//! The driver is selected from configuration and hidden behind the
//! `DatabasePool` trait. Repositories reach the concrete pool through
//! `as_sqlite()` / `as_mysql()`.
//!
//! # Usage
//!
//! ```ignore
//! use officehours::config::DatabaseConfig;
//! use officehours::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
