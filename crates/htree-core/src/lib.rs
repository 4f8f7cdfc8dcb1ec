//! Data model for the hierarchy engine: node keys, nodes, processing and
//! filtering parameters, identifier paths, natural sort, and config.

pub mod config;
pub mod identifier;
pub mod key;
pub mod node;
pub mod sort;

pub use config::HierConfig;
pub use identifier::{HierarchyNodeIdentifier, IdentifierPath, PathAutoExpand, PathOptions};
pub use key::{GroupedProperty, InstanceKey, NodeKey, PropertyValueRange};
pub use node::{
    ByBaseClassesParams, ByPropertiesParams, Children, FilteringProps, GroupAutoExpand,
    GroupHidingPolicy, GroupHidingPolicyWithExpand, GroupingParams, Node, ProcessingParams,
    PropertyGroupSpec, PropertyRangeSpec,
};
