//! The parent a hierarchy level is defined against: the root, or an
//! already-produced [`Node`] (§4.1).

use htree_core::{InstanceKey, Node, NodeKey};
use std::collections::BTreeSet;

/// The parent passed to [`crate::definition::HierarchyDefinition::define_hierarchy_level`].
#[derive(Debug, Clone)]
pub enum HierarchyLevelParent {
    Root,
    Node(Node),
}

impl HierarchyLevelParent {
    pub fn key(&self) -> Option<&NodeKey> {
        match self {
            HierarchyLevelParent::Root => None,
            HierarchyLevelParent::Node(node) => Some(&node.key),
        }
    }

    /// The parent's generic id, if its key is a generic key.
    pub fn generic_id(&self) -> Option<&str> {
        match self.key() {
            Some(NodeKey::Generic { id, .. }) => Some(id.as_str()),
            _ => None,
        }
    }

    /// The parent's instance keys, if its key is an instances key, or the
    /// union of grouped instance keys for a grouping-node parent.
    pub fn instance_keys(&self) -> Option<BTreeSet<InstanceKey>> {
        match self {
            HierarchyLevelParent::Root => None,
            HierarchyLevelParent::Node(node) => match &node.key {
                NodeKey::Instances { instance_keys } => Some(instance_keys.clone()),
                _ if node.key.is_grouping() => {
                    Some(node.grouped_instance_keys.iter().cloned().collect())
                }
                _ => None,
            },
        }
    }

    /// Instance keys grouped by class name, preserving first-seen class
    /// order, as required when requesting definitions once per
    /// `(className, instanceIds)` group for a multi-class parent (§4.1).
    pub fn instance_keys_by_class(&self) -> Vec<(String, Vec<String>)> {
        let Some(keys) = self.instance_keys() else {
            return Vec::new();
        };
        let mut order: Vec<String> = Vec::new();
        let mut grouped: std::collections::BTreeMap<String, Vec<String>> =
            std::collections::BTreeMap::new();
        for key in keys {
            if !grouped.contains_key(&key.class_name) {
                order.push(key.class_name.clone());
            }
            grouped.entry(key.class_name.clone()).or_default().push(key.id.clone());
        }
        order
            .into_iter()
            .map(|class_name| {
                let ids = grouped.remove(&class_name).unwrap_or_default();
                (class_name, ids)
            })
            .collect()
    }
}
