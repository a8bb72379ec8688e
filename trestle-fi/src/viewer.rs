//! 3D-viewer port
//!
//! The viewer is strictly an external event source and sink: it hands the
//! core element identities, the core hands back highlight/visibility
//! instructions keyed by identity. No viewer internals cross this boundary.

use std::time::Duration;

use tracing::debug;
use trestle_common::model::ElementId;

use crate::state::SharedState;

/// Instructions the core emits to the 3D viewer
pub trait ViewerPort: Send + Sync {
    /// Highlight the visual for one element
    fn highlight(&self, identity: &ElementId);

    /// Show only the given elements, hiding everything else
    fn isolate(&self, identities: &[ElementId]);

    /// Restore full-model visibility and clear highlights
    fn reset(&self);
}

/// Handle an element pick coming from the viewer: drill down to the
/// element and highlight it. A pick that no longer resolves (stale viewer
/// state) is dropped without touching navigation.
pub async fn handle_viewer_pick(
    shared: &SharedState,
    viewer: &dyn ViewerPort,
    identity: &ElementId,
    settle: Duration,
) -> bool {
    if !shared.auto_navigate(identity, settle).await {
        debug!(%identity, "Viewer pick did not resolve to a tree element");
        return false;
    }
    viewer.highlight(identity);
    true
}
