//! Office Hours - appointment scheduling backend
//!
//! Professors publish availability windows, students book them, professors
//! cancel them. A window carries at most one scheduled appointment at a time;
//! the database enforces that, not the request handlers.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
