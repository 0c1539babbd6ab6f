// Tabs Aside shared type definitions
// Each submodule defines types used across the crate.

pub mod bookmark;
pub mod errors;
pub mod events;
pub mod options;
pub mod session;
pub mod tab;
