//! A small in-memory `QueryExecutor`/`MetadataInspector`/`HierarchyDefinition`
//! trio over a toy "Warehouse" schema, used to drive the engine end to end
//! without a real ECSQL backend (§9 "A demo CLI").

use async_trait::async_trait;
use futures::stream::BoxStream;
use htree_core::{GroupAutoExpand, GroupHidingPolicyWithExpand, GroupingParams, ProcessingParams};
use htree_definition::{
    DefinitionError, GenericNodeTemplate, HierarchyDefinition, HierarchyLevelParent,
    HierarchyNodesDefinition,
};
use htree_metadata::{Class, MetadataError, MetadataInspector, Property, PropertyType, Schema};
use htree_query::{ExecutorError, GenericInstanceFilter, Query, QueryExecutor, QueryOptions, Row};
use serde_json::json;
use std::collections::BTreeMap;

/// One fixture row: enough of the select-clause columns (§4.2) to drive
/// parsing, hide-if-no-children, merge-by-label and class grouping.
struct FixtureItem {
    class_name: &'static str,
    id: &'static str,
    label: &'static str,
    merge_by_label_id: Option<&'static str>,
    hide_if_no_children: bool,
}

const ITEMS: &[FixtureItem] = &[
    FixtureItem {
        class_name: "Warehouse.Widget",
        id: "0x1",
        label: "Bolt",
        merge_by_label_id: Some("fasteners"),
        hide_if_no_children: false,
    },
    FixtureItem {
        class_name: "Warehouse.Widget",
        id: "0x2",
        label: "Bolt",
        merge_by_label_id: Some("fasteners"),
        hide_if_no_children: false,
    },
    FixtureItem {
        class_name: "Warehouse.Widget",
        id: "0x3",
        label: "Gear",
        merge_by_label_id: None,
        hide_if_no_children: false,
    },
    FixtureItem {
        class_name: "Warehouse.Gadget",
        id: "0x4",
        label: "Sensor",
        merge_by_label_id: None,
        hide_if_no_children: false,
    },
    FixtureItem {
        class_name: "Warehouse.Gadget",
        id: "0x5",
        label: "Empty Crate",
        merge_by_label_id: None,
        hide_if_no_children: true,
    },
];

/// Extracts the class name a built query selects `FROM` (the only part of
/// the rendered ECSQL this fixture cares about; the executor doesn't run a
/// real query planner).
fn class_name_from_query(query: &Query) -> Option<String> {
    let from_idx = query.ecsql.find(" FROM ")?;
    let rest = &query.ecsql[from_idx + 6..];
    let end = rest.find(" [q]")?;
    Some(rest[..end].to_string())
}

pub struct FixtureExecutor;

#[async_trait]
impl QueryExecutor for FixtureExecutor {
    async fn create_query_reader(
        &self,
        query: Query,
        _opts: QueryOptions,
    ) -> Result<BoxStream<'static, Result<Row, ExecutorError>>, ExecutorError> {
        let class_name = class_name_from_query(&query);
        let polymorphic_base = class_name.as_deref() == Some("Warehouse.Item");

        let rows: Vec<Row> = ITEMS
            .iter()
            .filter(|item| {
                polymorphic_base || class_name.as_deref() == Some(item.class_name)
            })
            .map(|item| {
                let mut map = BTreeMap::new();
                map.insert("FullClassName".to_string(), json!(item.class_name));
                map.insert("ECInstanceId".to_string(), json!(item.id));
                map.insert("DisplayLabel".to_string(), json!(item.label));
                map.insert("HasChildren".to_string(), json!(null));
                map.insert(
                    "HideIfNoChildren".to_string(),
                    json!(item.hide_if_no_children),
                );
                map.insert("HideNodeInHierarchy".to_string(), json!(false));
                map.insert("Grouping".to_string(), json!(null));
                if let Some(merge_id) = item.merge_by_label_id {
                    map.insert("MergeByLabelId".to_string(), json!(merge_id));
                }
                Row(map)
            })
            .collect();

        Ok(Box::pin(futures::stream::iter(rows.into_iter().map(Ok))))
    }
}

pub struct FixtureInspector;

fn warehouse_schema() -> Schema {
    Schema {
        name: "Warehouse".to_string(),
        classes: vec![
            Class {
                full_name: "Warehouse.Item".to_string(),
                label: "Item".to_string(),
                is_entity_class: true,
                is_relationship_class: false,
                base_classes: Vec::new(),
                derived_classes: vec![
                    "Warehouse.Widget".to_string(),
                    "Warehouse.Gadget".to_string(),
                ],
                properties: vec![Property {
                    name: "Weight".to_string(),
                    property_type: PropertyType::Double,
                }],
            },
            Class {
                full_name: "Warehouse.Widget".to_string(),
                label: "Widget".to_string(),
                is_entity_class: true,
                is_relationship_class: false,
                base_classes: vec!["Warehouse.Item".to_string()],
                derived_classes: Vec::new(),
                properties: Vec::new(),
            },
            Class {
                full_name: "Warehouse.Gadget".to_string(),
                label: "Gadget".to_string(),
                is_entity_class: true,
                is_relationship_class: false,
                base_classes: vec!["Warehouse.Item".to_string()],
                derived_classes: Vec::new(),
                properties: Vec::new(),
            },
        ],
    }
}

#[async_trait]
impl MetadataInspector for FixtureInspector {
    async fn class_derives_from(&self, derived: &str, base: &str) -> Result<bool, MetadataError> {
        if derived == base {
            return Ok(true);
        }
        let schema = warehouse_schema();
        match schema.get_class(derived) {
            Some(class) => Ok(class.is(base)),
            None => Ok(false),
        }
    }

    async fn get_schema(&self, name: &str) -> Result<Schema, MetadataError> {
        if name != "Warehouse" {
            return Err(MetadataError::UnknownSchema(name.to_string()));
        }
        Ok(warehouse_schema())
    }
}

/// Root produces a generic "inventory" wrapper (`hideInHierarchy`, §4.4
/// stage 3) over a polymorphic query for `Warehouse.Item`, grouped by class
/// (§4.5) so widgets and gadgets land under separate siblings.
pub struct FixtureDefinitions;

#[async_trait]
impl HierarchyDefinition for FixtureDefinitions {
    async fn define_hierarchy_level(
        &self,
        parent: &HierarchyLevelParent,
        _instance_filter: Option<&GenericInstanceFilter>,
    ) -> Result<Vec<HierarchyNodesDefinition>, DefinitionError> {
        match parent {
            HierarchyLevelParent::Root => {
                let mut inventory = GenericNodeTemplate::new("inventory", "Inventory");
                inventory.processing_params.hide_in_hierarchy = true;
                Ok(vec![HierarchyNodesDefinition::GenericNode(inventory)])
            }
            HierarchyLevelParent::Node(_) if parent.generic_id() == Some("inventory") => {
                Ok(vec![HierarchyNodesDefinition::InstanceNodesQuery {
                    full_class_name: "Warehouse.Item".to_string(),
                    custom_where: None,
                    grouping: Some(GroupingParams {
                        by_class: Some(GroupHidingPolicyWithExpand {
                            hiding: Default::default(),
                            auto_expand: GroupAutoExpand::Never,
                        }),
                        ..Default::default()
                    }),
                    processing_params: ProcessingParams::default(),
                }])
            }
            _ => Ok(Vec::new()),
        }
    }
}
