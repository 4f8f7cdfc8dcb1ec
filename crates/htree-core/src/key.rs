//! Node identity (§3: "Node identity and shape").

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A single instance's identity in the data source.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceKey {
    pub class_name: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imodel_key: Option<String>,
}

impl InstanceKey {
    pub fn new(class_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            id: id.into(),
            imodel_key: None,
        }
    }

    pub fn with_source(mut self, imodel_key: impl Into<String>) -> Self {
        self.imodel_key = Some(imodel_key.into());
        self
    }
}

/// A bucket an instance falls into when grouping by a property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyValueRange {
    pub from_value: serde_json::Value,
    pub to_value: serde_json::Value,
}

/// One property named in a "grouped by several properties at once" node
/// (the `byProperties` "other properties" bucket, §3's `PropertyOtherGrouping`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedProperty {
    pub property_class_name: String,
    pub property_name: String,
}

/// Tagged node-key variants (§3).
///
/// Two keys are equal iff their variant and fields are equal; `Instances`
/// compares by the full set of instance keys (order-independent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NodeKey {
    /// A synthetic node declared by a definition.
    Generic {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
    /// A node backed by one or more rows from the data source.
    Instances {
        instance_keys: BTreeSet<InstanceKey>,
    },
    /// A base-class or class grouping node.
    ClassGrouping { class_name: String },
    /// A same-label grouping node.
    LabelGrouping {
        label: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        group_id: Option<String>,
    },
    /// A property-value-bucket grouping node.
    PropertyValueGrouping {
        property_class_name: String,
        property_name: String,
        formatted_property_value: String,
    },
    /// A property-range-bucket grouping node.
    PropertyRangeGrouping {
        property_class_name: String,
        property_name: String,
        from_value: serde_json::Value,
        to_value: serde_json::Value,
    },
    /// The "grouped by several properties at once" catch-all node.
    PropertyOtherGrouping { properties: Vec<GroupedProperty> },
}

impl NodeKey {
    pub fn generic(id: impl Into<String>) -> Self {
        NodeKey::Generic {
            id: id.into(),
            source: None,
        }
    }

    pub fn generic_with_source(id: impl Into<String>, source: impl Into<String>) -> Self {
        NodeKey::Generic {
            id: id.into(),
            source: Some(source.into()),
        }
    }

    pub fn instances(keys: impl IntoIterator<Item = InstanceKey>) -> Self {
        NodeKey::Instances {
            instance_keys: keys.into_iter().collect(),
        }
    }

    /// Whether this key identifies a grouping node (never a filter target, §3).
    pub fn is_grouping(&self) -> bool {
        matches!(
            self,
            NodeKey::ClassGrouping { .. }
                | NodeKey::LabelGrouping { .. }
                | NodeKey::PropertyValueGrouping { .. }
                | NodeKey::PropertyRangeGrouping { .. }
                | NodeKey::PropertyOtherGrouping { .. }
        )
    }

    pub fn is_instances(&self) -> bool {
        matches!(self, NodeKey::Instances { .. })
    }

    pub fn is_generic(&self) -> bool {
        matches!(self, NodeKey::Generic { .. })
    }

    /// Iterate the instance keys carried by an `Instances` key; empty for anything else.
    pub fn instance_keys_iter(&self) -> Box<dyn Iterator<Item = &InstanceKey> + '_> {
        match self {
            NodeKey::Instances { instance_keys } => Box::new(instance_keys.iter()),
            _ => Box::new(std::iter::empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_keys_equal_iff_id_and_source_equal() {
        let a = NodeKey::generic("root");
        let b = NodeKey::generic("root");
        let c = NodeKey::generic_with_source("root", "plugin-a");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn instances_key_is_order_independent() {
        let a = NodeKey::instances([InstanceKey::new("S.A", "0x1"), InstanceKey::new("S.A", "0x2")]);
        let b = NodeKey::instances([InstanceKey::new("S.A", "0x2"), InstanceKey::new("S.A", "0x1")]);
        assert_eq!(a, b);
    }

    #[test]
    fn grouping_keys_are_never_filter_targets_by_construction() {
        let key = NodeKey::ClassGrouping {
            class_name: "S.Base".into(),
        };
        assert!(key.is_grouping());
    }
}
