//! Read-only queries over element trees
//!
//! Pure, side-effect-free operations used by the drill-down browser, the
//! search box, viewer-driven navigation, and the code-level distribution
//! table. None of these touch the canonical tree.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::element::{ConditionSpread, ElementId, ElementNode};

/// Per-code condition distribution, rolled up from rated leaves.
///
/// Deliberately a distinct type from [`ElementNode`]: a leaf's condition is a
/// single-choice rating, while this holds summed quantities per bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeDistribution {
    /// Element classification code
    pub code: String,
    /// Total quantity counted across all buckets
    pub total_qty: u32,
    /// Summed per-bucket quantities
    pub condition: ConditionSpread,
}

/// Filter a tree by case-insensitive substring match on label or type name.
///
/// A node survives if it matches the query or any of its (recursively
/// filtered) children survive, so the ancestor path to every match stays
/// visible. Surviving branches carry only their surviving children. An empty
/// query returns the input unchanged.
pub fn filter_by_text(nodes: &[ElementNode], query: &str) -> Vec<ElementNode> {
    if query.is_empty() {
        return nodes.to_vec();
    }
    let needle = query.to_lowercase();
    filter_lowercase(nodes, &needle)
}

fn filter_lowercase(nodes: &[ElementNode], needle: &str) -> Vec<ElementNode> {
    nodes
        .iter()
        .filter_map(|node| {
            let children = filter_lowercase(&node.children, needle);
            let matches = node.label.to_lowercase().contains(needle)
                || node.type_name.to_lowercase().contains(needle);
            if matches || !children.is_empty() {
                Some(ElementNode {
                    children,
                    ..node.clone()
                })
            } else {
                None
            }
        })
        .collect()
}

/// Root-first ancestor chain to the first node whose label equals `target`,
/// inclusive of the node itself. Empty if no node matches.
pub fn find_path_to_label(nodes: &[ElementNode], target: &str) -> Vec<ElementNode> {
    find_path_by(nodes, &|node| node.label == target)
}

/// Root-first ancestor chain to the node with the given identity.
///
/// Viewer picks arrive as identities, so navigation uses this variant.
pub fn find_path_to_identity(nodes: &[ElementNode], target: &ElementId) -> Vec<ElementNode> {
    find_path_by(nodes, &|node| &node.identity == target)
}

fn find_path_by(nodes: &[ElementNode], matches: &dyn Fn(&ElementNode) -> bool) -> Vec<ElementNode> {
    for node in nodes {
        if matches(node) {
            return vec![node.clone()];
        }
        let sub_path = find_path_by(&node.children, matches);
        if !sub_path.is_empty() {
            let mut path = Vec::with_capacity(sub_path.len() + 1);
            path.push(node.clone());
            path.extend(sub_path);
            return path;
        }
    }
    Vec::new()
}

/// Depth-first flattening of leaves only
pub fn flatten_leaves(nodes: &[ElementNode]) -> Vec<ElementNode> {
    let mut leaves = Vec::new();
    collect_leaves(nodes, &mut leaves);
    leaves
}

fn collect_leaves(nodes: &[ElementNode], out: &mut Vec<ElementNode>) {
    for node in nodes {
        if node.is_leaf() {
            out.push(node.clone());
        } else {
            collect_leaves(&node.children, out);
        }
    }
}

/// Roll up rated leaves into per-code condition distributions.
///
/// Leaves are deduplicated by identity before aggregating, so a leaf that
/// reached the input twice contributes once. Leaves without an element code
/// cannot be grouped and are skipped.
pub fn aggregate_distribution(rated: &[ElementNode]) -> Vec<CodeDistribution> {
    let mut seen: HashSet<&ElementId> = HashSet::new();
    let mut groups: Vec<CodeDistribution> = Vec::new();

    for leaf in rated {
        if !seen.insert(&leaf.identity) {
            continue;
        }
        let Some(code) = leaf.element_code.as_deref() else {
            debug!(identity = %leaf.identity, "Rated leaf has no element code, skipping");
            continue;
        };

        match groups.iter_mut().find(|g| g.code == code) {
            Some(group) => group.condition.accumulate(&leaf.condition),
            None => groups.push(CodeDistribution {
                code: code.to_string(),
                total_qty: 0,
                condition: leaf.condition,
            }),
        }
    }

    for group in &mut groups {
        group.total_qty = group.condition.total();
    }
    groups
}
