//! The public node shape (§3) plus processing/filtering params (§3, §4.6).

use crate::key::{GroupedProperty, InstanceKey, NodeKey};
use serde::{Deserialize, Serialize};

/// Tri-state children indicator: unknown until probed, then a concrete bool,
/// or (grouping nodes only) already-known materialized children.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Children {
    Unknown,
    Known(bool),
    Nodes(Vec<Node>),
}

impl Children {
    pub fn has_children(&self) -> bool {
        match self {
            Children::Unknown => false,
            Children::Known(b) => *b,
            Children::Nodes(nodes) => !nodes.is_empty(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Children::Unknown)
    }
}

/// Per-definition processing hints carried by instance/generic node rows
/// (§3 "Processing params", produced by the Node Select Query Factory, §4.2).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingParams {
    #[serde(default)]
    pub hide_if_no_children: bool,
    #[serde(default)]
    pub hide_in_hierarchy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_by_label_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grouping: Option<GroupingParams>,
}

/// `autoExpand` policy for a grouping handler (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupAutoExpand {
    #[default]
    Never,
    Always,
    SingleChild,
}

/// `hideIfNoSiblings`/`hideIfOneGroupedNode` policy bundle shared by every
/// grouping handler (§4.5).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupHidingPolicy {
    #[serde(default)]
    pub hide_if_no_siblings: bool,
    #[serde(default)]
    pub hide_if_one_grouped_node: bool,
}

/// A property-group spec: a formatted-value bucket plus optional ranges
/// (§4.2, §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyGroupSpec {
    pub property_name: String,
    #[serde(default)]
    pub ranges: Vec<PropertyRangeSpec>,
    #[serde(default)]
    pub hiding: GroupHidingPolicy,
    #[serde(default)]
    pub auto_expand: GroupAutoExpand,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRangeSpec {
    pub from_value: serde_json::Value,
    pub to_value: serde_json::Value,
    pub range_label: String,
}

/// The `Grouping` selector serialized by the Node Select Query Factory (§4.2).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupingParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_label: Option<GroupHidingPolicyWithExpand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_class: Option<GroupHidingPolicyWithExpand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_base_classes: Option<ByBaseClassesParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_properties: Option<ByPropertiesParams>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupHidingPolicyWithExpand {
    #[serde(default)]
    pub hiding: GroupHidingPolicy,
    #[serde(default)]
    pub auto_expand: GroupAutoExpand,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByBaseClassesParams {
    pub full_class_names: Vec<String>,
    #[serde(default)]
    pub hiding: GroupHidingPolicy,
    #[serde(default)]
    pub auto_expand: GroupAutoExpand,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByPropertiesParams {
    pub full_class_name: String,
    pub property_groups: Vec<PropertyGroupSpec>,
    /// Properties that, when none of `property_groups` groups them, fall
    /// into the `PropertyOtherGrouping` catch-all bucket together.
    #[serde(default)]
    pub other_properties: Vec<GroupedProperty>,
    #[serde(default)]
    pub hiding: GroupHidingPolicy,
    #[serde(default)]
    pub auto_expand: GroupAutoExpand,
}

/// Filtering annotations produced by the overlay (§3, §4.6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilteringProps {
    #[serde(default)]
    pub is_filter_target: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_target_options: Option<serde_json::Value>,
    #[serde(default)]
    pub has_filter_target_ancestor: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filtered_children_identifier_paths: Option<Vec<crate::identifier::IdentifierPath>>,
    /// Set when a matched path's `reveal`/auto-expand option selects this
    /// node (§4.6 "Auto-expand policy"). Merged into `Node::auto_expand` by
    /// the engine rather than overwriting a `true` set by another source.
    #[serde(default)]
    pub auto_expand: bool,
}

/// The finalized public node shape (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub key: NodeKey,
    pub label: String,
    /// Ordered, root-first ancestor keys (§3 invariant 1).
    pub parent_keys: Vec<NodeKey>,
    pub children: Children,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_expand: Option<bool>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extended_data: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub processing_params: ProcessingParams,
    #[serde(default)]
    pub filtering: FilteringProps,
    /// For grouping nodes: the union of instance keys of all descendant
    /// instance nodes represented (§3 invariant 2). Empty for non-grouping
    /// nodes.
    #[serde(default)]
    pub grouped_instance_keys: Vec<InstanceKey>,
    /// The nearest non-grouping ancestor key, recorded by the grouping
    /// pipeline for every created grouping node (§4.5 "Ancestry link").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_grouping_ancestor: Option<Box<NodeKey>>,
}

impl Node {
    pub fn new_instance(
        key: NodeKey,
        label: impl Into<String>,
        parent_keys: Vec<NodeKey>,
    ) -> Self {
        Self {
            key,
            label: label.into(),
            parent_keys,
            children: Children::Unknown,
            auto_expand: None,
            extended_data: serde_json::Map::new(),
            processing_params: ProcessingParams::default(),
            filtering: FilteringProps::default(),
            grouped_instance_keys: Vec::new(),
            non_grouping_ancestor: None,
        }
    }

    /// The child `parentKeys` this node's children must carry (§3 invariant 1).
    pub fn child_parent_keys(&self) -> Vec<NodeKey> {
        let mut path = self.parent_keys.clone();
        path.push(self.key.clone());
        path
    }

    pub fn is_filter_target(&self) -> bool {
        self.filtering.is_filter_target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_parent_keys_appends_own_key() {
        let root = Node::new_instance(NodeKey::generic("root"), "Root", vec![]);
        let child_path = root.child_parent_keys();
        assert_eq!(child_path, vec![NodeKey::generic("root")]);
    }

    #[test]
    fn children_has_children_reflects_tri_state() {
        assert!(!Children::Unknown.has_children());
        assert!(Children::Known(true).has_children());
        assert!(!Children::Known(false).has_children());
        assert!(!Children::Nodes(vec![]).has_children());
    }
}
