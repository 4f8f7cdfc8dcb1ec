//! The Filtering Overlay (§4.6): identifier-path matching against produced
//! node keys, narrowing of generic/instance definitions for the next
//! level, `hasFilterTargetAncestor` propagation and auto-expand policy.

pub mod compat;
pub mod cte;
pub mod overlay;

pub use compat::ClassCompatCache;
pub use cte::build_filtering_cte;
pub use overlay::{
    generic_definition_matches, identifier_matches_key, match_node, next_level_identifiers,
    root_paths, should_hide_filtered_target, MatchOutcome,
};
