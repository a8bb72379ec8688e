//! Inspection, maintenance-action, and session-snapshot models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::element::{ElementId, ElementNode};

/// Reference to a photo attached to a maintenance action.
///
/// Photos start life as local blobs in the image store and are swapped for
/// remote asset references during submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PhotoRef {
    /// Row id in the local image store, not yet uploaded
    Local { image_id: Uuid },
    /// Uploaded asset in remote storage
    Remote { id: String, name: String },
}

impl PhotoRef {
    pub fn is_local(&self) -> bool {
        matches!(self, PhotoRef::Local { .. })
    }
}

/// A maintenance action recorded against an element during inspection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceAction {
    pub id: Uuid,
    /// Element this action is linked to, if any
    pub element_id: Option<ElementId>,
    pub description: String,
    pub category: String,
    pub photos: Vec<PhotoRef>,
}

impl MaintenanceAction {
    pub fn new(element_id: Option<ElementId>, description: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            element_id,
            description: description.into(),
            category: category.into(),
            photos: Vec::new(),
        }
    }
}

/// Inspection details gathered in the wizard's first step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionMeta {
    /// Assigned on submission; None while the inspection is local-only
    pub inspection_id: Option<Uuid>,
    pub structure_id: String,
    pub inspector: String,
    pub inspection_type: String,
    pub inspection_date: DateTime<Utc>,
    pub notes: String,
}

impl InspectionMeta {
    pub fn new(structure_id: impl Into<String>, inspector: impl Into<String>) -> Self {
        Self {
            inspection_id: None,
            structure_id: structure_id.into(),
            inspector: inspector.into(),
            inspection_type: String::new(),
            inspection_date: crate::time::now(),
            notes: String::new(),
        }
    }
}

/// The full application-relevant state persisted across sessions.
///
/// One of these round-trips through the durable store verbatim, so a field
/// user can kill the app mid-inspection and resume where they left off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub inspection: InspectionMeta,
    /// Canonical element tree (top-level children of the structure)
    pub tree: Vec<ElementNode>,
    /// Rated-element set, one entry per rated leaf identity
    pub rated_elements: Vec<ElementNode>,
    pub maintenance_actions: Vec<MaintenanceAction>,
    /// Sibling set currently displayed in the drill-down browser
    pub displayed: Vec<ElementNode>,
    /// Drill-in history, oldest first
    pub history: Vec<Vec<ElementNode>>,
    pub timestamp: DateTime<Utc>,
}
