//! The `HierarchyDefinition` contract: parent → list of child definitions,
//! plus optional per-definition hooks (§4.1).

use crate::parent::HierarchyLevelParent;
use async_trait::async_trait;
use htree_core::{GroupingParams, Node, ProcessingParams};
use htree_query::GenericInstanceFilter;
use serde_json::{Map, Value};
use thiserror::Error;

/// A template for a generic (synthetic) node; `parentKeys` is filled in by
/// the pipeline once the parent is known (§3 invariant 1).
#[derive(Debug, Clone)]
pub struct GenericNodeTemplate {
    pub id: String,
    pub source: Option<String>,
    pub label: String,
    pub processing_params: ProcessingParams,
    pub extended_data: Map<String, Value>,
    pub auto_expand: Option<bool>,
}

impl GenericNodeTemplate {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: None,
            label: label.into(),
            processing_params: ProcessingParams::default(),
            extended_data: Map::new(),
            auto_expand: None,
        }
    }
}

/// One element of a hierarchy level: either a declared generic node, or a
/// query over instances of a class (§4.1).
#[derive(Debug, Clone)]
pub enum HierarchyNodesDefinition {
    GenericNode(GenericNodeTemplate),
    InstanceNodesQuery {
        full_class_name: String,
        /// An additional static ECSQL predicate this definition wants
        /// ANDed onto the Node Select Query Factory's `WHERE` clause (e.g.
        /// `[q].[Category].[Id] = 0x1d`), composed by the engine alongside
        /// the caller's `instanceFilter` and the filtering-overlay CTE join
        /// (§4.1, §4.2).
        custom_where: Option<String>,
        grouping: Option<GroupingParams>,
        processing_params: ProcessingParams,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("metadata lookup failed while matching definitions: {0}")]
    Metadata(String),
}

/// The declarative mapping from a parent node to the definitions of its
/// children (§4.1).
///
/// Defensive by contract: implementations should return an empty level for
/// parent shapes they don't recognize rather than erroring (§4.1 "Errors").
#[async_trait]
pub trait HierarchyDefinition: Send + Sync {
    async fn define_hierarchy_level(
        &self,
        parent: &HierarchyLevelParent,
        instance_filter: Option<&GenericInstanceFilter>,
    ) -> Result<Vec<HierarchyNodesDefinition>, DefinitionError>;

    /// Overrides the default row→node conversion for this definition's
    /// rows. Returning `None` means "use the default parser" (the
    /// crate-level [`crate::row::parse_row`]).
    fn parse_node(&self, _row: &htree_query::Row) -> Option<Node> {
        None
    }

    /// Per-definition pre-processing. Returning `None` drops the node
    /// silently (§4.9).
    fn pre_process_node(&self, node: Node) -> Option<Node> {
        Some(node)
    }

    /// Per-definition post-processing. Returning `None` drops the node
    /// silently (§4.9).
    fn post_process_node(&self, node: Node) -> Option<Node> {
        Some(node)
    }
}

#[async_trait]
impl HierarchyDefinition for std::sync::Arc<dyn HierarchyDefinition> {
    async fn define_hierarchy_level(
        &self,
        parent: &HierarchyLevelParent,
        instance_filter: Option<&GenericInstanceFilter>,
    ) -> Result<Vec<HierarchyNodesDefinition>, DefinitionError> {
        self.as_ref()
            .define_hierarchy_level(parent, instance_filter)
            .await
    }

    fn parse_node(&self, row: &htree_query::Row) -> Option<Node> {
        self.as_ref().parse_node(row)
    }

    fn pre_process_node(&self, node: Node) -> Option<Node> {
        self.as_ref().pre_process_node(node)
    }

    fn post_process_node(&self, node: Node) -> Option<Node> {
        self.as_ref().post_process_node(node)
    }
}
