//! # devconnect-store
//!
//! Persistence for DevConnect, backed by SQLite.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides the identity store (users with their
//! embedded connections and connection requests) and the message log.

pub mod database;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod requests;
pub mod users;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
