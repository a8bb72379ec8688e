//! Condition-rating mutation engine
//!
//! A committed rating has to show up everywhere the logical node is
//! referenced: the canonical tree, every sibling-set snapshot on the drill
//! history, the displayed list, the rated-element set, and the current
//! selection. One shared recursive replace-by-identity function drives the
//! tree and every history snapshot, so the views cannot drift from each
//! other's update logic. Matching is always by identity, never by position.

use tracing::{debug, warn};
use trestle_common::model::{ConditionSpread, ElementId, ElementNode, CONDITION_STATES};

use crate::state::InspectionState;

/// Deep search for a node by identity
pub fn find_by_identity<'a>(
    nodes: &'a [ElementNode],
    identity: &ElementId,
) -> Option<&'a ElementNode> {
    for node in nodes {
        if &node.identity == identity {
            return Some(node);
        }
        if let Some(found) = find_by_identity(&node.children, identity) {
            return Some(found);
        }
    }
    None
}

/// Rebuild a tree with the node matching `updated.identity` replaced.
///
/// Ancestor chains are rebuilt immutably; untouched branches are cloned
/// as-is. Used identically for the canonical tree and for every history
/// snapshot.
pub fn replace_by_identity(nodes: &[ElementNode], updated: &ElementNode) -> Vec<ElementNode> {
    nodes
        .iter()
        .map(|node| {
            if node.identity == updated.identity {
                updated.clone()
            } else {
                ElementNode {
                    children: replace_by_identity(&node.children, updated),
                    ..node.clone()
                }
            }
        })
        .collect()
}

/// Replace at the top level of a displayed list only.
///
/// Ratable leaves are never displayed below their own sibling level, so the
/// displayed list needs no recursion.
pub fn replace_shallow(nodes: &[ElementNode], updated: &ElementNode) -> Vec<ElementNode> {
    nodes
        .iter()
        .map(|node| {
            if node.identity == updated.identity {
                updated.clone()
            } else {
                node.clone()
            }
        })
        .collect()
}

/// Insert-or-replace into the rated-element set, keyed by identity
pub fn upsert_rated(set: &[ElementNode], updated: &ElementNode) -> Vec<ElementNode> {
    let mut result = set.to_vec();
    match result.iter_mut().find(|n| n.identity == updated.identity) {
        Some(existing) => *existing = updated.clone(),
        None => result.push(updated.clone()),
    }
    result
}

/// Commit a rating: update the canonical tree, every history snapshot, the
/// displayed list, the rated set, and the selection as one logical unit.
///
/// Returns the updated node, or `None` (state untouched) when no element
/// with that identity exists.
pub fn apply_rating(
    state: &InspectionState,
    identity: &ElementId,
    condition: ConditionSpread,
) -> Option<(InspectionState, ElementNode)> {
    let base = find_by_identity(&state.tree, identity)?;

    let updated = ElementNode {
        condition,
        is_saved: true,
        ..base.clone()
    };

    let mut next = state.clone();
    next.tree = replace_by_identity(&state.tree, &updated);
    next.nav.history = state
        .nav
        .history
        .iter()
        .map(|siblings| replace_by_identity(siblings, &updated))
        .collect();
    next.nav.displayed = replace_shallow(&state.nav.displayed, &updated);
    next.rated = upsert_rated(&state.rated, &updated);
    if let Some(selected) = &state.nav.selected {
        if &selected.identity == identity {
            next.nav.selected = Some(updated.clone());
        }
    }

    debug!(%identity, rated = next.rated.len(), "Committed condition rating");
    Some((next, updated))
}

/// Pre-commit edit of one condition bucket on the displayed list.
///
/// Nothing else is touched until an explicit save commits through
/// [`apply_rating`]. Returns `None` (no mutation) for an out-of-range
/// bucket or an identity not on display.
pub fn set_condition_bucket(
    displayed: &[ElementNode],
    identity: &ElementId,
    bucket: usize,
    value: u32,
) -> Option<Vec<ElementNode>> {
    if bucket >= CONDITION_STATES {
        warn!(bucket, "Rejecting out-of-range condition bucket");
        return None;
    }
    displayed.iter().find(|n| &n.identity == identity)?;

    Some(
        displayed
            .iter()
            .map(|node| {
                if &node.identity == identity {
                    let mut edited = node.clone();
                    edited.condition.0[bucket] = value;
                    edited
                } else {
                    node.clone()
                }
            })
            .collect(),
    )
}
