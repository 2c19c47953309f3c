//! `SQLite` persistence for the on-device key-value store

mod connection;
mod kv_repository;
mod migrations;

pub use connection::Database;
pub use kv_repository::SqliteKeyValueStore;
