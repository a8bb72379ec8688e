//! Domain models: element hierarchy, queries, inspection records

pub mod element;
pub mod inspection;
pub mod query;

pub use element::{
    build_quantities, from_raw, merge_prior_ratings, ConditionSpread, ElementId, ElementNode,
    PriorRating, RawElement, CONDITION_STATES,
};
pub use inspection::{InspectionMeta, MaintenanceAction, PhotoRef, SessionSnapshot};
pub use query::{
    aggregate_distribution, filter_by_text, find_path_to_identity, find_path_to_label,
    flatten_leaves, CodeDistribution,
};
