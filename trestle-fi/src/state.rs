//! Shared inspection state container
//!
//! One logical owner for the canonical element tree, the navigation state,
//! the rated-element set, and the recorded maintenance actions. All writes
//! funnel through the navigation and rating transition functions, applied
//! under the write lock, so no component ever observes a half-updated
//! state. Async collaborators (uploads, submission, snapshot writes) read a
//! clone and never hold the lock across remote I/O.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use trestle_common::events::{EventBus, TrestleEvent};
use trestle_common::model::{
    build_quantities, find_path_to_identity, flatten_leaves, from_raw, merge_prior_ratings,
    ConditionSpread, ElementId, ElementNode, InspectionMeta, MaintenanceAction, PhotoRef,
    PriorRating, RawElement, SessionSnapshot,
};

use crate::nav::{self, NavState};
use crate::rating;

/// The full in-memory state of one inspection session
#[derive(Debug, Clone)]
pub struct InspectionState {
    pub meta: InspectionMeta,
    /// Canonical element tree (single source of truth)
    pub tree: Vec<ElementNode>,
    pub nav: NavState,
    /// Rated-element set, one entry per rated leaf identity
    pub rated: Vec<ElementNode>,
    pub actions: Vec<MaintenanceAction>,
}

impl InspectionState {
    pub fn new(meta: InspectionMeta) -> Self {
        Self {
            meta,
            tree: Vec::new(),
            nav: NavState::default(),
            rated: Vec::new(),
            actions: Vec::new(),
        }
    }

    /// Serialize into the durable snapshot record
    pub fn to_snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            inspection: self.meta.clone(),
            tree: self.tree.clone(),
            rated_elements: self.rated.clone(),
            maintenance_actions: self.actions.clone(),
            displayed: self.nav.displayed.clone(),
            history: self.nav.history.clone(),
            timestamp: trestle_common::time::now(),
        }
    }

    /// Rebuild in-memory state from a restored snapshot
    pub fn from_snapshot(snapshot: SessionSnapshot) -> Self {
        Self {
            meta: snapshot.inspection,
            tree: snapshot.tree,
            nav: NavState {
                displayed: snapshot.displayed,
                history: snapshot.history,
                selected: None,
            },
            rated: snapshot.rated_elements,
            actions: snapshot.maintenance_actions,
        }
    }
}

/// Shared state accessible by all components.
///
/// Uses RwLock for concurrent read access with rare writes. The navigation
/// epoch increments on every navigation transition, letting long-running
/// walks (auto-navigate) detect that the user navigated underneath them.
pub struct SharedState {
    inner: RwLock<InspectionState>,
    events: EventBus,
    nav_epoch: AtomicU64,
    submitting: AtomicBool,
}

impl SharedState {
    pub fn new(meta: InspectionMeta) -> Self {
        Self {
            inner: RwLock::new(InspectionState::new(meta)),
            events: EventBus::default(),
            nav_epoch: AtomicU64::new(0),
            submitting: AtomicBool::new(false),
        }
    }

    /// Event bus carrying state-change notifications
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Build the canonical tree from structure metadata, overlaying prior
    /// ratings when the inspection has a previous-inspection baseline.
    ///
    /// Discards any existing navigation and rating state.
    pub async fn load_structure(&self, raw: &[RawElement], prior: &[PriorRating]) {
        let tree = build_quantities(&merge_prior_ratings(&from_raw(raw), prior));
        let leaf_count = flatten_leaves(&tree).len();

        let mut inner = self.inner.write().await;
        let structure_id = inner.meta.structure_id.clone();
        inner.nav = NavState::new(tree.clone());
        inner.tree = tree;
        inner.rated.clear();
        drop(inner);

        self.bump_epoch();
        info!(structure_id, leaf_count, "Structure loaded");
        self.events.emit_lossy(TrestleEvent::StructureLoaded {
            structure_id,
            element_count: leaf_count,
            timestamp: trestle_common::time::now(),
        });
    }

    /// Clone of the full current state (for snapshotting and submission)
    pub async fn state(&self) -> InspectionState {
        self.inner.read().await.clone()
    }

    /// Sibling set currently displayed
    pub async fn displayed(&self) -> Vec<ElementNode> {
        self.inner.read().await.nav.displayed.clone()
    }

    /// Current drill depth (0 = root)
    pub async fn depth(&self) -> usize {
        self.inner.read().await.nav.depth()
    }

    pub async fn selected(&self) -> Option<ElementNode> {
        self.inner.read().await.nav.selected.clone()
    }

    pub async fn rated(&self) -> Vec<ElementNode> {
        self.inner.read().await.rated.clone()
    }

    pub async fn actions(&self) -> Vec<MaintenanceAction> {
        self.inner.read().await.actions.clone()
    }

    /// Rated leaves vs total ratable leaves, for wizard progress
    pub async fn progress(&self) -> (usize, usize) {
        let inner = self.inner.read().await;
        (inner.rated.len(), flatten_leaves(&inner.tree).len())
    }

    /// Drill into the displayed node with the given identity.
    ///
    /// Returns false (state untouched) for unknown identities and leaves.
    pub async fn drill_in(&self, identity: &ElementId) -> bool {
        let mut inner = self.inner.write().await;
        let Some(node) = inner.nav.displayed.iter().find(|n| &n.identity == identity) else {
            debug!(%identity, "Drill-in target not on display");
            return false;
        };
        if node.is_leaf() {
            debug!(%identity, "Ignoring drill-in on leaf");
            return false;
        }
        let node = node.clone();
        inner.nav = nav::drill_in(&inner.nav, &node);
        let depth = inner.nav.depth();
        drop(inner);

        self.bump_epoch();
        self.events.emit_lossy(TrestleEvent::NavigationChanged {
            depth,
            timestamp: trestle_common::time::now(),
        });
        true
    }

    /// Return to the previously displayed sibling set; false at the root
    pub async fn go_back(&self) -> bool {
        let mut inner = self.inner.write().await;
        if inner.nav.depth() == 0 {
            return false;
        }
        inner.nav = nav::go_back(&inner.nav);
        let depth = inner.nav.depth();
        drop(inner);

        self.bump_epoch();
        self.events.emit_lossy(TrestleEvent::NavigationChanged {
            depth,
            timestamp: trestle_common::time::now(),
        });
        true
    }

    /// Discard drill state when re-entering the rating screen
    pub async fn reset_to_root(&self) {
        let mut inner = self.inner.write().await;
        inner.nav = nav::reset_to_root(&inner.nav);
        drop(inner);

        self.bump_epoch();
        self.events.emit_lossy(TrestleEvent::NavigationChanged {
            depth: 0,
            timestamp: trestle_common::time::now(),
        });
    }

    /// Focus an element for the assessment panel and viewer highlight
    pub async fn select(&self, identity: &ElementId) -> bool {
        let mut inner = self.inner.write().await;
        let Some(node) = rating::find_by_identity(&inner.tree, identity).cloned() else {
            debug!(%identity, "Selection target not in tree");
            return false;
        };
        inner.nav.selected = Some(node);
        drop(inner);

        self.events.emit_lossy(TrestleEvent::ElementSelected {
            identity: identity.clone(),
            timestamp: trestle_common::time::now(),
        });
        true
    }

    /// Pre-commit edit of one condition bucket on the displayed list
    pub async fn set_condition_bucket(
        &self,
        identity: &ElementId,
        bucket: usize,
        value: u32,
    ) -> bool {
        let mut inner = self.inner.write().await;
        match rating::set_condition_bucket(&inner.nav.displayed, identity, bucket, value) {
            Some(displayed) => {
                inner.nav.displayed = displayed;
                true
            }
            None => false,
        }
    }

    /// Commit a rating through the mutation engine (see [`crate::rating`])
    pub async fn apply_rating(&self, identity: &ElementId, condition: ConditionSpread) -> bool {
        let mut inner = self.inner.write().await;
        let Some((next, _)) = rating::apply_rating(&inner, identity, condition) else {
            warn!(%identity, "Rating target not found, state unchanged");
            return false;
        };
        let rated_count = next.rated.len();
        *inner = next;
        drop(inner);

        self.events.emit_lossy(TrestleEvent::RatingApplied {
            identity: identity.clone(),
            rated_count,
            timestamp: trestle_common::time::now(),
        });
        true
    }

    /// Record a maintenance action
    pub async fn add_maintenance_action(&self, action: MaintenanceAction) {
        let action_id = action.id;
        self.inner.write().await.actions.push(action);
        self.events.emit_lossy(TrestleEvent::MaintenanceActionRecorded {
            action_id,
            timestamp: trestle_common::time::now(),
        });
    }

    /// Attach a photo reference to an existing maintenance action
    pub async fn attach_photo(&self, action_id: Uuid, photo: PhotoRef) -> bool {
        let mut inner = self.inner.write().await;
        match inner.actions.iter_mut().find(|a| a.id == action_id) {
            Some(action) => {
                action.photos.push(photo);
                true
            }
            None => false,
        }
    }

    /// Replace the maintenance actions wholesale (submission writes back
    /// remote photo references)
    pub async fn set_actions(&self, actions: Vec<MaintenanceAction>) {
        self.inner.write().await.actions = actions;
    }

    /// Record the remote id assigned on successful submission
    pub async fn set_inspection_id(&self, inspection_id: Uuid) {
        self.inner.write().await.meta.inspection_id = Some(inspection_id);
    }

    /// Serialize the current state for the durable store
    pub async fn snapshot(&self) -> SessionSnapshot {
        self.inner.read().await.to_snapshot()
    }

    /// Replace in-memory state with a restored session
    pub async fn restore(&self, snapshot: SessionSnapshot) {
        let structure_id = snapshot.inspection.structure_id.clone();
        let rated_count = snapshot.rated_elements.len();
        *self.inner.write().await = InspectionState::from_snapshot(snapshot);
        self.bump_epoch();

        info!(structure_id, rated_count, "Session restored from durable store");
        self.events.emit_lossy(TrestleEvent::SessionRestored {
            structure_id,
            rated_count,
            timestamp: trestle_common::time::now(),
        });
    }

    /// Walk the drill-down path to an externally discovered element (for
    /// example a 3D-viewer pick), settling between steps so the UI can
    /// follow along, then select it.
    ///
    /// The walk is abandoned without touching navigation state when the
    /// target is not in the tree, and abandoned mid-way when the navigation
    /// epoch moves underneath it (the user navigated manually).
    pub async fn auto_navigate(&self, target: &ElementId, settle: Duration) -> bool {
        let path = {
            let inner = self.inner.read().await;
            find_path_to_identity(&inner.tree, target)
        };
        if path.is_empty() {
            debug!(%target, "Auto-navigate target not found");
            return false;
        }

        self.reset_to_root().await;
        let mut expected = self.nav_epoch();

        for ancestor in path.iter().filter(|n| !n.is_leaf()) {
            if self.nav_epoch() != expected {
                warn!(%target, "Auto-navigate abandoned, navigation changed underneath");
                return false;
            }
            if !self.drill_in(&ancestor.identity).await {
                warn!(%target, ancestor = %ancestor.identity, "Auto-navigate step failed");
                return false;
            }
            expected += 1;
            tokio::time::sleep(settle).await;
        }

        self.select(target).await
    }

    /// Current navigation epoch (increments on every navigation transition)
    pub fn nav_epoch(&self) -> u64 {
        self.nav_epoch.load(Ordering::Acquire)
    }

    fn bump_epoch(&self) {
        self.nav_epoch.fetch_add(1, Ordering::AcqRel);
    }

    /// Claim the submission guard; false if a submission is already in flight
    pub fn try_begin_submission(&self) -> bool {
        self.submitting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Release the submission guard
    pub fn end_submission(&self) {
        self.submitting.store(false, Ordering::Release);
    }

    /// Idempotent "currently submitting" signal for the caller's busy guard
    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_leaf(id: i64, name: &str) -> RawElement {
        RawElement {
            express_id: Some(id),
            tag: None,
            name: Some(name.to_string()),
            type_name: Some("IfcBeam".to_string()),
            element_code: None,
            children: Vec::new(),
        }
    }

    fn raw_branch(id: i64, name: &str, children: Vec<RawElement>) -> RawElement {
        RawElement {
            express_id: Some(id),
            tag: None,
            name: Some(name.to_string()),
            type_name: Some("IfcElementAssembly".to_string()),
            element_code: None,
            children,
        }
    }

    async fn loaded_state() -> SharedState {
        let state = SharedState::new(InspectionMeta::new("BRG-042", "j.doe"));
        state
            .load_structure(
                &[raw_branch(
                    1,
                    "Superstructure",
                    vec![
                        raw_branch(2, "Girders", vec![raw_leaf(3, "G1"), raw_leaf(4, "G2")]),
                        raw_leaf(5, "Deck"),
                    ],
                )],
                &[],
            )
            .await;
        state
    }

    #[tokio::test]
    async fn test_drill_and_back_round_trip() {
        let state = loaded_state().await;

        assert!(state.drill_in(&ElementId::from(1)).await);
        assert_eq!(state.depth().await, 1);
        assert!(state.drill_in(&ElementId::from(2)).await);
        assert_eq!(state.depth().await, 2);

        assert!(state.go_back().await);
        assert!(state.go_back().await);
        assert!(!state.go_back().await, "go-back at root must be a no-op");
        assert_eq!(state.displayed().await.len(), 1);
    }

    #[tokio::test]
    async fn test_drill_in_on_leaf_refused() {
        let state = loaded_state().await;
        state.drill_in(&ElementId::from(1)).await;

        let epoch = state.nav_epoch();
        assert!(!state.drill_in(&ElementId::from(5)).await);
        assert_eq!(state.nav_epoch(), epoch);
    }

    #[tokio::test]
    async fn test_auto_navigate_walks_to_leaf() {
        let state = loaded_state().await;
        let target = ElementId::from(3);

        let ok = state.auto_navigate(&target, Duration::ZERO).await;

        assert!(ok);
        assert_eq!(state.depth().await, 2);
        assert_eq!(state.selected().await.unwrap().identity, target);
        assert!(state.displayed().await.iter().any(|n| n.identity == target));
    }

    #[tokio::test]
    async fn test_auto_navigate_unknown_target_keeps_state() {
        let state = loaded_state().await;
        state.drill_in(&ElementId::from(1)).await;
        let before = state.displayed().await;

        let ok = state.auto_navigate(&ElementId::from(999), Duration::ZERO).await;

        assert!(!ok);
        assert_eq!(state.displayed().await, before);
    }

    #[tokio::test]
    async fn test_progress_counts_rated_leaves() {
        let state = loaded_state().await;
        assert_eq!(state.progress().await, (0, 3));

        state
            .apply_rating(&ElementId::from(3), ConditionSpread([1, 0, 0, 0]))
            .await;
        state
            .apply_rating(&ElementId::from(5), ConditionSpread([0, 0, 0, 1]))
            .await;

        assert_eq!(state.progress().await, (2, 3));
    }

    #[tokio::test]
    async fn test_snapshot_restore_round_trip() {
        let state = loaded_state().await;
        state.drill_in(&ElementId::from(1)).await;
        state
            .apply_rating(&ElementId::from(5), ConditionSpread([0, 1, 0, 0]))
            .await;

        let snapshot = state.snapshot().await;

        let restored = SharedState::new(InspectionMeta::new("other", "other"));
        restored.restore(snapshot).await;

        assert_eq!(restored.depth().await, 1);
        assert_eq!(restored.rated().await.len(), 1);
        assert_eq!(
            restored.state().await.meta.structure_id,
            "BRG-042".to_string()
        );
    }

    #[tokio::test]
    async fn test_submission_guard_is_exclusive() {
        let state = loaded_state().await;

        assert!(state.try_begin_submission());
        assert!(state.is_submitting());
        assert!(!state.try_begin_submission());

        state.end_submission();
        assert!(state.try_begin_submission());
    }
}
