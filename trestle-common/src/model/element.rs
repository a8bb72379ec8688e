//! Structural element tree model
//!
//! The canonical hierarchical representation of a structure's decomposed
//! elements. Each node carries a stable identity (numeric express ID in
//! decimal form, or the entity tag when the source model has no express ID),
//! display strings, an optional classification code, and a four-bucket
//! condition spread. Only leaves (nodes without children) are ratable.
//!
//! All tree operations here are pure rebuilds: they take a slice of nodes
//! and return a structurally new tree, never mutating their input.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Number of condition-state buckets (CS1..CS4)
pub const CONDITION_STATES: usize = 4;

/// Stable element identifier, unique within a single structure's tree.
///
/// Not globally unique across structures.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(String);

impl ElementId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<i64> for ElementId {
    fn from(express_id: i64) -> Self {
        ElementId(express_id.to_string())
    }
}

impl From<&str> for ElementId {
    fn from(tag: &str) -> Self {
        ElementId(tag.to_string())
    }
}

impl From<String> for ElementId {
    fn from(tag: String) -> Self {
        ElementId(tag)
    }
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-element quantity counts across the four condition states.
///
/// A leaf rated by single choice holds exactly one positive bucket.
/// All zeros means unrated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionSpread(pub [u32; CONDITION_STATES]);

impl ConditionSpread {
    /// Unrated spread (all buckets zero)
    pub fn zero() -> Self {
        Self([0; CONDITION_STATES])
    }

    /// Single-choice rating: quantity 1 in the given bucket.
    ///
    /// Returns `None` if the bucket index is out of range.
    pub fn single(bucket: usize) -> Option<Self> {
        if bucket >= CONDITION_STATES {
            return None;
        }
        let mut buckets = [0; CONDITION_STATES];
        buckets[bucket] = 1;
        Some(Self(buckets))
    }

    /// True if any bucket holds a positive quantity
    pub fn is_rated(&self) -> bool {
        self.0.iter().any(|&q| q > 0)
    }

    /// Sum of all bucket quantities
    pub fn total(&self) -> u32 {
        self.0.iter().sum()
    }

    /// Add another spread bucket-by-bucket (aggregation)
    pub fn accumulate(&mut self, other: &ConditionSpread) {
        for (acc, q) in self.0.iter_mut().zip(other.0.iter()) {
            *acc += q;
        }
    }
}

/// One node of the structural element hierarchy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    /// Stable identifier within this structure's tree
    pub identity: ElementId,
    /// Display name
    pub label: String,
    /// Element type display string
    pub type_name: String,
    /// Classification code for aggregate reporting (distinct from identity)
    pub element_code: Option<String>,
    /// Condition-state quantities; meaningful only on leaves
    pub condition: ConditionSpread,
    /// Child elements; empty means this node is a ratable leaf
    pub children: Vec<ElementNode>,
    /// Immediate child count for branches; recomputed on (re)construction
    pub quantity: u32,
    /// True once the current rating has been committed to the canonical tree
    pub is_saved: bool,
}

impl ElementNode {
    /// Create an unrated node with the given children
    pub fn new(
        identity: ElementId,
        label: impl Into<String>,
        type_name: impl Into<String>,
        children: Vec<ElementNode>,
    ) -> Self {
        let quantity = children.len() as u32;
        Self {
            identity,
            label: label.into(),
            type_name: type_name.into(),
            element_code: None,
            condition: ConditionSpread::zero(),
            children,
            quantity,
            is_saved: false,
        }
    }

    /// A node is a leaf (and ratable) iff it has no children
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Element metadata as delivered by the structure API, before validation.
///
/// The express ID takes precedence as identity; the entity tag is the
/// fallback for models without express IDs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawElement {
    #[serde(default)]
    pub express_id: Option<i64>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub type_name: Option<String>,
    #[serde(default)]
    pub element_code: Option<String>,
    #[serde(default)]
    pub children: Vec<RawElement>,
}

/// Condition ratings carried over from a previous inspection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorRating {
    pub element_id: ElementId,
    pub ratings: ConditionSpread,
}

/// Build the element tree from raw structure metadata.
///
/// Records without any identity (no express ID and no tag) are skipped with
/// a warning; one malformed record never aborts the whole build.
pub fn from_raw(raw: &[RawElement]) -> Vec<ElementNode> {
    let mut nodes = Vec::with_capacity(raw.len());
    for record in raw {
        let identity = match (record.express_id, record.tag.as_deref()) {
            (Some(id), _) => ElementId::from(id),
            (None, Some(tag)) => ElementId::from(tag),
            (None, None) => {
                warn!(
                    name = record.name.as_deref().unwrap_or("<unnamed>"),
                    "Skipping element without identity"
                );
                continue;
            }
        };

        let children = from_raw(&record.children);
        let quantity = children.len() as u32;
        nodes.push(ElementNode {
            label: record
                .name
                .clone()
                .unwrap_or_else(|| identity.to_string()),
            type_name: record.type_name.clone().unwrap_or_default(),
            element_code: record.element_code.clone(),
            condition: ConditionSpread::zero(),
            identity,
            children,
            quantity,
            is_saved: false,
        });
    }
    nodes
}

/// Recompute `quantity` for every node as its immediate child count.
///
/// Pure post-order rebuild; the input is left untouched.
pub fn build_quantities(nodes: &[ElementNode]) -> Vec<ElementNode> {
    nodes
        .iter()
        .map(|node| {
            let children = build_quantities(&node.children);
            ElementNode {
                quantity: children.len() as u32,
                children,
                ..node.clone()
            }
        })
        .collect()
}

/// Overlay prior-inspection ratings onto a fresh structural skeleton.
///
/// Children are merged first; a leaf whose identity matches a prior rating
/// takes that rating's condition spread. Leaves without a match keep their
/// zero condition.
pub fn merge_prior_ratings(nodes: &[ElementNode], prior: &[PriorRating]) -> Vec<ElementNode> {
    nodes
        .iter()
        .map(|node| {
            let children = merge_prior_ratings(&node.children, prior);
            let mut merged = ElementNode {
                children,
                ..node.clone()
            };
            if merged.is_leaf() {
                if let Some(p) = prior.iter().find(|p| p.element_id == merged.identity) {
                    merged.condition = p.ratings;
                }
            }
            merged
        })
        .collect()
}
