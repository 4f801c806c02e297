//! SQLite-backed progress storage.
//!
//! ## Database setup
//!
//! [`Database`] wraps a `sqlx::SqlitePool` configured with:
//! - **WAL mode**: one writer and multiple concurrent readers.
//! - **Foreign keys enabled** at the connection level.
//! - **Embedded migrations**: `sqlx::migrate!` runs `migrations/*.sql` when
//!   [`Database::open`] is called.
//!
//! ## Tables
//!
//! | Table | Role |
//! |-------|------|
//! | `user_progress` | cached aggregate, guarded by a `revision` counter |
//! | `game_sessions` | append-only log keyed by `session_id` |
//!
//! ## JSON import
//!
//! [`migrate_json_to_sqlite`] copies an existing JSON data directory into an
//! empty database once, at startup. The JSON files are not deleted.

mod database;
pub(crate) mod helpers;
mod migrate_json;
mod progress_repo;

pub use database::Database;
pub use migrate_json::{migrate_json_to_sqlite, MigrationReport};
pub use progress_repo::SqliteProgressStore;
