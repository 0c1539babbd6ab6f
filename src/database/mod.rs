//! Tabs Aside database layer.
//!
//! Provides SQLite connection management and schema migrations for the
//! bookmark store.
//!
//! # Usage
//!
//! ```no_run
//! use tabs_aside::database::Database;
//!
//! let db = Database::open("tabs-aside.db").expect("failed to open database");
//! let db = Database::open_in_memory().expect("failed to open in-memory database");
//! let conn = db.connection();
//! ```

pub mod connection;
pub mod migrations;

pub use connection::Database;
