//! Declarative hierarchy-level definitions: the contract between a parent
//! node and the definitions of its children, predicate-based matching, and
//! the default row parser (§4.1).

pub mod definition;
pub mod parent;
pub mod predicate;
pub mod row;

pub use definition::{
    DefinitionError, GenericNodeTemplate, HierarchyDefinition, HierarchyNodesDefinition,
};
pub use parent::HierarchyLevelParent;
pub use predicate::{select_matching, GenericPredicate, InstancesPredicate, LevelRule};
pub use row::{parse_row, RowParseError};
