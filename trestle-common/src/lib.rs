//! # Trestle Common Library
//!
//! Shared code for the Trestle bridge-inspection field application:
//! - Structural element tree model and read-only queries
//! - Inspection, maintenance-action, and snapshot records
//! - Event types (TrestleEvent enum) and EventBus
//! - Durable local store (SQLite) for snapshots and images
//! - Configuration loading
//! - Error types and utilities

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod model;
pub mod time;

pub use error::{Error, Result};
