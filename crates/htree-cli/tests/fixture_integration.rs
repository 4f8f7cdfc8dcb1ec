//! Exercises the "Warehouse" fixture through `HierarchyProvider` directly,
//! calling library functions instead of spawning the compiled binary.

use htree_cli::fixture::{FixtureDefinitions, FixtureExecutor, FixtureInspector};
use htree_core::{Children, HierConfig, NodeKey};
use htree_provider::{EngineHierarchyProvider, GetNodesRequest, HierarchyProvider};
use std::sync::Arc;

fn provider() -> EngineHierarchyProvider {
    EngineHierarchyProvider::new(
        Arc::new(FixtureExecutor),
        Arc::new(FixtureInspector),
        Arc::new(FixtureDefinitions),
        HierConfig::default(),
    )
}

#[tokio::test]
async fn root_level_splices_away_the_inventory_wrapper() {
    let provider = provider();
    let nodes = provider.get_nodes(GetNodesRequest::root()).await.unwrap();

    // The generic "inventory" node is `hideInHierarchy`, so its own
    // class-grouping children take its place at the root.
    assert_eq!(nodes.len(), 2);
    for node in &nodes {
        assert!(matches!(node.key, NodeKey::ClassGrouping { .. }));
        assert!(node.parent_keys.is_empty());
    }
}

#[tokio::test]
async fn widgets_and_gadgets_land_in_separate_class_groups() {
    let provider = provider();
    let nodes = provider.get_nodes(GetNodesRequest::root()).await.unwrap();

    let mut class_names: Vec<&str> = nodes
        .iter()
        .map(|n| match &n.key {
            NodeKey::ClassGrouping { class_name } => class_name.as_str(),
            other => panic!("expected class grouping node, got {other:?}"),
        })
        .collect();
    class_names.sort();
    assert_eq!(class_names, vec!["Warehouse.Gadget", "Warehouse.Widget"]);
}

#[tokio::test]
async fn bolts_merge_into_one_node_and_empty_crate_is_dropped() {
    let provider = provider();
    let groups = provider.get_nodes(GetNodesRequest::root()).await.unwrap();

    let widgets = groups
        .iter()
        .find(|n| matches!(&n.key, NodeKey::ClassGrouping { class_name } if class_name == "Warehouse.Widget"))
        .expect("widget group present");
    let widget_children = match &widgets.children {
        Children::Nodes(children) => children.clone(),
        other => panic!("expected materialized grouping children, got {other:?}"),
    };

    // 0x1 and 0x2 both carry `mergeByLabelId: "fasteners"` and the same
    // label, so they collapse into a single "Bolt" node; 0x3 ("Gear")
    // stays separate.
    let labels: Vec<&str> = widget_children.iter().map(|n| n.label.as_str()).collect();
    assert_eq!(labels.len(), 2);
    assert!(labels.contains(&"Bolt"));
    assert!(labels.contains(&"Gear"));

    let bolt = widget_children.iter().find(|n| n.label == "Bolt").unwrap();
    match &bolt.key {
        NodeKey::Instances { instance_keys } => assert_eq!(instance_keys.len(), 2),
        other => panic!("expected merged instances key, got {other:?}"),
    }

    let gadgets = groups
        .iter()
        .find(|n| matches!(&n.key, NodeKey::ClassGrouping { class_name } if class_name == "Warehouse.Gadget"))
        .expect("gadget group present");
    let gadget_children = match &gadgets.children {
        Children::Nodes(children) => children.clone(),
        other => panic!("expected materialized grouping children, got {other:?}"),
    };

    // "Empty Crate" (0x5) is `hideIfNoChildren` and has none, so only
    // "Sensor" (0x4) survives.
    let gadget_labels: Vec<&str> = gadget_children.iter().map(|n| n.label.as_str()).collect();
    assert_eq!(gadget_labels, vec!["Sensor"]);
}

#[tokio::test]
async fn instance_keys_cover_all_four_surviving_items() {
    let provider = provider();
    let keys = provider
        .get_node_instance_keys(GetNodesRequest::root())
        .await
        .unwrap();

    let mut ids: Vec<&str> = keys.iter().map(|k| k.id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["0x1", "0x2", "0x3", "0x4"]);
}
