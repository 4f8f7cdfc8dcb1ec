//! The streaming pipeline operators, grouping subsystem, and recursive
//! orchestrator that turns a [`htree_definition::HierarchyDefinition`] plus
//! a [`htree_query::QueryExecutor`] into finished hierarchy levels (§4.4,
//! §4.5, §4.6).

pub mod engine;
pub mod grouping;
pub mod info;
pub mod stages;

pub use engine::{HierarchyEngine, LevelContext, PipelineError};
pub use info::is_info_node;
