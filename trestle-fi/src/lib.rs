//! # Trestle Field Inspection Core
//!
//! The structural element hierarchy and condition-rating engine of the
//! Trestle bridge-inspection field application:
//!
//! - Drill-down navigation over the element tree with consistent history
//! - Four-view rating propagation (tree, history, display, rated set)
//! - Offline-first durable snapshots with debounced writes
//! - Submission assembly with resumable image upload

pub mod client;
pub mod error;
pub mod nav;
pub mod rating;
pub mod state;
pub mod submit;
pub mod sync;
pub mod viewer;

pub use error::{Error, Result};
pub use state::{InspectionState, SharedState};
