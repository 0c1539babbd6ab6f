//! Tabs Aside: store sets of open tabs as bookmark-folder sessions and
//! restore them later.
//!
//! This library crate exposes all modules for use by the binary and integration tests.

pub mod app;
pub mod database;
pub mod host;
pub mod managers;
pub mod platform;
pub mod services;
pub mod types;
