//! Drill-down navigation state machine
//!
//! Tracks the sibling set currently displayed, the stack of sibling sets
//! displayed before each drill-in, and the element the user is focused on.
//! Transitions are pure: they take the current state and return a new one,
//! so the container can apply them atomically under its write lock.
//!
//! Preconditions that don't hold (drilling into a leaf, going back at the
//! root) are silent no-ops, not errors. They happen in normal operation,
//! e.g. a double-tap landing after the first tap already navigated.

use tracing::debug;
use trestle_common::model::ElementNode;

/// Navigation state: displayed siblings, drill history, selection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavState {
    /// Sibling set currently shown in the drill-down table
    pub displayed: Vec<ElementNode>,
    /// Sibling sets displayed before each drill-in, oldest first
    pub history: Vec<Vec<ElementNode>>,
    /// Element currently focused for assessment / viewer highlight
    pub selected: Option<ElementNode>,
}

impl NavState {
    /// Fresh state displaying the structure's top-level children
    pub fn new(root: Vec<ElementNode>) -> Self {
        Self {
            displayed: root,
            history: Vec::new(),
            selected: None,
        }
    }

    /// Current drill depth (0 = root view)
    pub fn depth(&self) -> usize {
        self.history.len()
    }
}

/// Drill into a node: push the current sibling set, display its children.
///
/// No-op for leaves.
pub fn drill_in(state: &NavState, node: &ElementNode) -> NavState {
    if node.is_leaf() {
        debug!(identity = %node.identity, "Ignoring drill-in on leaf");
        return state.clone();
    }

    let mut history = state.history.clone();
    history.push(state.displayed.clone());
    NavState {
        displayed: node.children.clone(),
        history,
        selected: state.selected.clone(),
    }
}

/// Return to the sibling set displayed before the last drill-in.
///
/// No-op when already at the root.
pub fn go_back(state: &NavState) -> NavState {
    let mut history = state.history.clone();
    match history.pop() {
        Some(previous) => NavState {
            displayed: previous,
            history,
            selected: state.selected.clone(),
        },
        None => state.clone(),
    }
}

/// Discard all drill state, returning the display to the root sibling set.
///
/// Used when re-entering the rating screen. Idempotent: with an empty
/// history the displayed set is already the root and stays unchanged.
pub fn reset_to_root(state: &NavState) -> NavState {
    let displayed = match state.history.first() {
        Some(root) => root.clone(),
        None => state.displayed.clone(),
    };
    NavState {
        displayed,
        history: Vec::new(),
        selected: state.selected.clone(),
    }
}
