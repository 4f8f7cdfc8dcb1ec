//! The Grouping Pipeline (§4.5): base-class → class → property → label,
//! each with `hideIfNoSiblings` / `hideIfOneGroupedNode` / `autoExpand`
//! policies, run as a fixed-point chain over the instance nodes of one
//! hierarchy level.

use htree_core::{
    ByBaseClassesParams, ByPropertiesParams, Children, GroupAutoExpand, GroupHidingPolicy,
    GroupHidingPolicyWithExpand, GroupedProperty, InstanceKey, Node, NodeKey, PropertyGroupSpec,
};
use htree_definition::HierarchyLevelParent;
use htree_metadata::{MetadataInspector, PrimitiveValueFormatter, TypedPrimitiveValue};
use std::collections::BTreeSet;

pub struct GroupingContext<'a> {
    pub inspector: &'a dyn MetadataInspector,
    pub formatter: &'a dyn PrimitiveValueFormatter,
}

/// Which grouping levels the current parent already disables because it is
/// itself a grouping node at or above that level (§4.5 "skipping levels
/// above the parent's own grouping level").
struct Disabled {
    class: bool,
    property: bool,
    label: bool,
}

fn disabled_for(parent: &HierarchyLevelParent) -> Disabled {
    match parent.key() {
        Some(NodeKey::ClassGrouping { .. }) => Disabled {
            class: true,
            property: false,
            label: false,
        },
        Some(NodeKey::PropertyValueGrouping { .. })
        | Some(NodeKey::PropertyRangeGrouping { .. })
        | Some(NodeKey::PropertyOtherGrouping { .. }) => Disabled {
            class: false,
            property: true,
            label: false,
        },
        Some(NodeKey::LabelGrouping { .. }) => Disabled {
            class: false,
            property: false,
            label: true,
        },
        _ => Disabled {
            class: false,
            property: false,
            label: false,
        },
    }
}

/// The nearest non-grouping ancestor recorded on every created grouping
/// node (§4.5 "Ancestry link").
fn non_grouping_ancestor(parent: &HierarchyLevelParent) -> Option<NodeKey> {
    match parent {
        HierarchyLevelParent::Root => None,
        HierarchyLevelParent::Node(node) if node.key.is_grouping() => {
            node.non_grouping_ancestor.as_deref().cloned()
        }
        HierarchyLevelParent::Node(node) => Some(node.key.clone()),
    }
}

/// The class name a class-grouping parent already groups at, used by
/// base-class grouping to only emit strictly more-derived ancestors
/// (§4.5 "strictly more derived than its class").
fn parent_class_grouping_name(parent: &HierarchyLevelParent) -> Option<&str> {
    match parent.key() {
        Some(NodeKey::ClassGrouping { class_name }) => Some(class_name.as_str()),
        _ => None,
    }
}

fn grouped_instance_keys_of(node: &Node) -> Vec<InstanceKey> {
    if node.key.is_grouping() {
        node.grouped_instance_keys.clone()
    } else {
        node.key.instance_keys_iter().cloned().collect()
    }
}

fn union_instance_keys(nodes: &[Node]) -> Vec<InstanceKey> {
    let mut set: BTreeSet<InstanceKey> = BTreeSet::new();
    for node in nodes {
        set.extend(grouped_instance_keys_of(node));
    }
    set.into_iter().collect()
}

fn apply_hiding_and_expand(
    mut group: Node,
    hiding: GroupHidingPolicy,
    auto_expand: GroupAutoExpand,
) -> Option<Node> {
    let Children::Nodes(children) = &group.children else {
        return Some(group);
    };

    if hiding.hide_if_one_grouped_node && children.len() == 1 {
        return Some(children[0].clone());
    }

    group.auto_expand = Some(match auto_expand {
        GroupAutoExpand::Never => false,
        GroupAutoExpand::Always => true,
        GroupAutoExpand::SingleChild => children.len() == 1,
    });

    Some(group)
}

/// If exactly one group was produced from a candidate scope, it has no
/// grouping siblings and (when `hideIfNoSiblings`) is unwrapped in favor of
/// its own children (§4.5 "apply hideIfNoSiblings").
fn unwrap_if_no_siblings(mut groups: Vec<Node>, hiding: GroupHidingPolicy) -> Vec<Node> {
    if hiding.hide_if_no_siblings && groups.len() == 1 {
        if let Children::Nodes(children) = groups.remove(0).children {
            return children;
        }
    }
    groups
}

fn new_class_grouping(
    class_name: String,
    children: Vec<Node>,
    ancestor: Option<NodeKey>,
) -> Node {
    let grouped_instance_keys = union_instance_keys(&children);
    let mut node = Node::new_instance(NodeKey::ClassGrouping { class_name }, String::new(), Vec::new());
    node.label = class_label(&node.key);
    node.grouped_instance_keys = grouped_instance_keys;
    node.children = Children::Nodes(children);
    node.non_grouping_ancestor = ancestor.map(Box::new);
    node
}

fn class_label(key: &NodeKey) -> String {
    match key {
        NodeKey::ClassGrouping { class_name } => class_name
            .rsplit_once('.')
            .map_or_else(|| class_name.clone(), |(_, name)| name.to_string()),
        _ => String::new(),
    }
}

/// Base-class grouping: for each declared `fullClassNames[i]` that is a
/// strict base of a node's instance class (and, below a class-grouping
/// parent, strictly more derived than it), emit a chain of nested
/// class-grouping nodes, most-base outermost (§4.5 "Base-class grouping").
pub async fn apply_base_class(
    nodes: Vec<Node>,
    parent: &HierarchyLevelParent,
    ctx: &GroupingContext<'_>,
) -> Vec<Node> {
    let ancestor = non_grouping_ancestor(parent);
    let parent_class = parent_class_grouping_name(parent);

    let mut with_spec: Vec<(Node, ByBaseClassesParams)> = Vec::new();
    let mut without_spec: Vec<Node> = Vec::new();
    for node in nodes {
        match node
            .processing_params
            .grouping
            .as_ref()
            .and_then(|g| g.by_base_classes.clone())
        {
            Some(spec) => with_spec.push((node, spec)),
            None => without_spec.push(node),
        }
    }

    if with_spec.is_empty() {
        return without_spec;
    }

    // Nodes with identical declared specs run through the same chain so
    // hideIfNoSiblings can see the true sibling set.
    let mut by_spec: Vec<(String, ByBaseClassesParams, Vec<Node>)> = Vec::new();
    for (node, spec) in with_spec {
        let spec_key = serde_json::to_string(&spec).unwrap_or_default();
        match by_spec.iter_mut().find(|(k, _, _)| *k == spec_key) {
            Some((_, _, nodes)) => nodes.push(node),
            None => by_spec.push((spec_key, spec, vec![node])),
        }
    }

    let mut out = without_spec;
    for (_, spec, nodes) in by_spec {
        let chain = Box::pin(build_base_class_chain(
            &spec.full_class_names,
            nodes,
            parent_class.map(str::to_string),
            spec.hiding,
            spec.auto_expand,
            ancestor.clone(),
            ctx,
        ))
        .await;
        out.extend(unwrap_if_no_siblings(chain, spec.hiding));
    }
    out
}

async fn build_base_class_chain(
    class_names: &[String],
    nodes: Vec<Node>,
    parent_class: Option<String>,
    hiding: GroupHidingPolicy,
    auto_expand: GroupAutoExpand,
    ancestor: Option<NodeKey>,
    ctx: &GroupingContext<'_>,
) -> Vec<Node> {
    let Some((base, rest)) = class_names.split_first() else {
        return nodes;
    };

    let mut qualifies: Vec<Node> = Vec::new();
    let mut remainder: Vec<Node> = Vec::new();

    for node in nodes {
        let class_name = instance_class_name(&node);
        let Some(class_name) = class_name else {
            remainder.push(node);
            continue;
        };

        let is_strict_base = base != &class_name
            && ctx
                .inspector
                .class_derives_from(&class_name, base)
                .await
                .unwrap_or(false);
        let more_derived_than_parent = match &parent_class {
            None => true,
            Some(p) => {
                base != p
                    && ctx
                        .inspector
                        .class_derives_from(base, p)
                        .await
                        .unwrap_or(false)
            }
        };

        if is_strict_base && more_derived_than_parent {
            qualifies.push(node);
        } else {
            remainder.push(node);
        }
    }

    let mut out = Vec::new();
    if !qualifies.is_empty() {
        let children = Box::pin(build_base_class_chain(
            rest,
            qualifies,
            Some(base.clone()),
            hiding,
            auto_expand,
            ancestor.clone(),
            ctx,
        ))
        .await;
        let group = new_class_grouping(base.clone(), children, ancestor.clone());
        if let Some(group) = apply_hiding_and_expand(group, hiding, auto_expand) {
            out.push(group);
        }
    }

    let rest_out = Box::pin(build_base_class_chain(
        rest,
        remainder,
        parent_class,
        hiding,
        auto_expand,
        ancestor,
        ctx,
    ))
    .await;
    out.extend(rest_out);
    out
}

fn instance_class_name(node: &Node) -> Option<String> {
    match &node.key {
        NodeKey::Instances { instance_keys } => {
            instance_keys.iter().next().map(|k| k.class_name.clone())
        }
        _ if node.key.is_grouping() => node
            .grouped_instance_keys
            .first()
            .map(|k| k.class_name.clone()),
        _ => None,
    }
}

/// Class grouping: one node per distinct instance class (§4.5 "Class
/// grouping", §8 scenario S3).
pub async fn apply_class(nodes: Vec<Node>, parent: &HierarchyLevelParent) -> Vec<Node> {
    let ancestor = non_grouping_ancestor(parent);

    let mut with_spec: Vec<(Node, GroupHidingPolicyWithExpand)> = Vec::new();
    let mut without_spec: Vec<Node> = Vec::new();
    for node in nodes {
        match node.processing_params.grouping.as_ref().and_then(|g| g.by_class.clone()) {
            Some(spec) => with_spec.push((node, spec)),
            None => without_spec.push(node),
        }
    }
    if with_spec.is_empty() {
        return without_spec;
    }

    let mut by_class: Vec<(String, Vec<Node>)> = Vec::new();
    let mut policy = GroupHidingPolicyWithExpand::default();
    for (node, spec) in with_spec {
        policy = spec;
        let Some(class_name) = instance_class_name(&node) else {
            without_spec.push(node);
            continue;
        };
        match by_class.iter_mut().find(|(c, _)| *c == class_name) {
            Some((_, nodes)) => nodes.push(node),
            None => by_class.push((class_name, vec![node])),
        }
    }

    let mut groups: Vec<Node> = Vec::new();
    for (class_name, children) in by_class {
        let group = new_class_grouping(class_name, children, ancestor.clone());
        if let Some(group) = apply_hiding_and_expand(group, policy.hiding, policy.auto_expand) {
            groups.push(group);
        }
    }

    let groups = unwrap_if_no_siblings(groups, policy.hiding);
    without_spec.extend(groups);
    without_spec
}

fn typed_value_from_json(value: &serde_json::Value) -> Option<TypedPrimitiveValue> {
    match value {
        serde_json::Value::Bool(b) => Some(TypedPrimitiveValue::Boolean(*b)),
        serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => {
            Some(TypedPrimitiveValue::Integer(n.as_i64().unwrap_or_default()))
        }
        serde_json::Value::Number(n) => Some(TypedPrimitiveValue::Double(n.as_f64().unwrap_or_default())),
        serde_json::Value::String(s) => Some(TypedPrimitiveValue::String(s.clone())),
        _ => None,
    }
}

/// Reads a node's raw property value for grouping purposes out of the
/// reserved `__groupingProperties` bag in `extendedData` (populated by the
/// Node Select Query Factory alongside the `Grouping` column).
fn raw_property_value(node: &Node, property_name: &str) -> Option<serde_json::Value> {
    node.extended_data
        .get("__groupingProperties")
        .and_then(|v| v.as_object())
        .and_then(|m| m.get(property_name))
        .cloned()
}

fn range_label_for(spec: &PropertyGroupSpec, value: f64) -> Option<(serde_json::Value, serde_json::Value, String)> {
    for range in &spec.ranges {
        let from = range.from_value.as_f64()?;
        let to = range.to_value.as_f64()?;
        if value >= from && value <= to {
            return Some((range.from_value.clone(), range.to_value.clone(), range.range_label.clone()));
        }
    }
    None
}

async fn bucket_one_property(
    nodes: Vec<Node>,
    class_name: &str,
    spec: &PropertyGroupSpec,
    ancestor: Option<NodeKey>,
    ctx: &GroupingContext<'_>,
) -> Vec<Node> {
    // Preserve first-seen order of bucket keys for deterministic output
    // ahead of the sort stage.
    let mut buckets: Vec<(NodeKey, String, Vec<Node>)> = Vec::new();

    for node in nodes {
        let raw = raw_property_value(&node, &spec.property_name);
        let (key, label) = match &raw {
            None => (
                NodeKey::PropertyValueGrouping {
                    property_class_name: class_name.to_string(),
                    property_name: spec.property_name.clone(),
                    formatted_property_value: "Unspecified".to_string(),
                },
                "Unspecified".to_string(),
            ),
            Some(value) => {
                if !spec.ranges.is_empty() {
                    match value.as_f64().and_then(|n| range_label_for(spec, n)) {
                        Some((from, to, label)) => (
                            NodeKey::PropertyRangeGrouping {
                                property_class_name: class_name.to_string(),
                                property_name: spec.property_name.clone(),
                                from_value: from,
                                to_value: to,
                            },
                            label,
                        ),
                        None => (
                            NodeKey::PropertyValueGrouping {
                                property_class_name: class_name.to_string(),
                                property_name: spec.property_name.clone(),
                                formatted_property_value: "Other".to_string(),
                            },
                            "Other".to_string(),
                        ),
                    }
                } else {
                    let formatted = match typed_value_from_json(value) {
                        Some(typed) => ctx.formatter.format(&typed).await,
                        None => "Other".to_string(),
                    };
                    (
                        NodeKey::PropertyValueGrouping {
                            property_class_name: class_name.to_string(),
                            property_name: spec.property_name.clone(),
                            formatted_property_value: formatted.clone(),
                        },
                        formatted,
                    )
                }
            }
        };

        match buckets.iter_mut().find(|(k, _, _)| *k == key) {
            Some((_, _, members)) => members.push(node),
            None => buckets.push((key, label, vec![node])),
        }
    }

    let mut groups = Vec::new();
    for (key, label, children) in buckets {
        let grouped_instance_keys = union_instance_keys(&children);
        let mut group = Node::new_instance(key, label, Vec::new());
        group.grouped_instance_keys = grouped_instance_keys;
        group.children = Children::Nodes(children);
        group.non_grouping_ancestor = ancestor.clone().map(Box::new);
        if let Some(group) = apply_hiding_and_expand(group, spec.hiding, spec.auto_expand) {
            groups.push(group);
        }
    }
    unwrap_if_no_siblings(groups, spec.hiding)
}

/// Property grouping: one nesting level per declared property-group spec,
/// in declaration order, each bucketing by formatted value, declared
/// range, or the `Unspecified`/`Other` fallbacks (§4.5 "Property grouping").
pub async fn apply_properties(
    nodes: Vec<Node>,
    parent: &HierarchyLevelParent,
    ctx: &GroupingContext<'_>,
) -> Vec<Node> {
    let ancestor = non_grouping_ancestor(parent);

    let mut with_spec: Vec<(Node, ByPropertiesParams)> = Vec::new();
    let mut without_spec: Vec<Node> = Vec::new();
    for node in nodes {
        match node.processing_params.grouping.as_ref().and_then(|g| g.by_properties.clone()) {
            Some(spec) => with_spec.push((node, spec)),
            None => without_spec.push(node),
        }
    }
    if with_spec.is_empty() {
        return without_spec;
    }

    let mut by_spec: Vec<(String, ByPropertiesParams, Vec<Node>)> = Vec::new();
    for (node, spec) in with_spec {
        let spec_key = serde_json::to_string(&spec).unwrap_or_default();
        match by_spec.iter_mut().find(|(k, _, _)| *k == spec_key) {
            Some((_, _, nodes)) => nodes.push(node),
            None => by_spec.push((spec_key, spec, vec![node])),
        }
    }

    for (_, spec, nodes) in by_spec {
        let mut current = nodes;
        for group_spec in &spec.property_groups {
            let mut next = Vec::new();
            // Nodes are bucketed together only within the same class name
            // scope so the key's `propertyClassName` stays meaningful.
            let mut by_class: Vec<(String, Vec<Node>)> = Vec::new();
            for node in current {
                let class_name = instance_class_name(&node).unwrap_or_else(|| spec.full_class_name.clone());
                match by_class.iter_mut().find(|(c, _)| *c == class_name) {
                    Some((_, members)) => members.push(node),
                    None => by_class.push((class_name, vec![node])),
                }
            }
            for (class_name, members) in by_class {
                let bucketed =
                    bucket_one_property(members, &class_name, group_spec, ancestor.clone(), ctx).await;
                next.extend(bucketed);
            }
            current = next;
        }

        if !spec.other_properties.is_empty() && !current.is_empty() {
            current = vec![wrap_other_properties(current, &spec.other_properties, ancestor.clone())];
        }

        without_spec.extend(current);
    }

    without_spec
}

fn wrap_other_properties(
    children: Vec<Node>,
    properties: &[GroupedProperty],
    ancestor: Option<NodeKey>,
) -> Node {
    let grouped_instance_keys = union_instance_keys(&children);
    let mut node = Node::new_instance(
        NodeKey::PropertyOtherGrouping {
            properties: properties.to_vec(),
        },
        "Other".to_string(),
        Vec::new(),
    );
    node.grouped_instance_keys = grouped_instance_keys;
    node.children = Children::Nodes(children);
    node.non_grouping_ancestor = ancestor.map(Box::new);
    node
}

/// Label grouping: collapse same-label siblings still ungrouped after
/// base-class/class/property grouping (§4.5 "Label grouping").
pub async fn apply_label(nodes: Vec<Node>, parent: &HierarchyLevelParent) -> Vec<Node> {
    let ancestor = non_grouping_ancestor(parent);

    let mut with_spec: Vec<(Node, GroupHidingPolicyWithExpand)> = Vec::new();
    let mut without_spec: Vec<Node> = Vec::new();
    for node in nodes {
        match node.processing_params.grouping.as_ref().and_then(|g| g.by_label.clone()) {
            Some(spec) => with_spec.push((node, spec)),
            None => without_spec.push(node),
        }
    }
    if with_spec.is_empty() {
        return without_spec;
    }

    let mut by_label: Vec<(String, Vec<Node>)> = Vec::new();
    let mut policy = GroupHidingPolicyWithExpand::default();
    for (node, spec) in with_spec {
        policy = spec;
        match by_label.iter_mut().find(|(l, _)| *l == node.label) {
            Some((_, nodes)) => nodes.push(node),
            None => by_label.push((node.label.clone(), vec![node])),
        }
    }

    let mut groups = Vec::new();
    for (label, children) in by_label {
        let grouped_instance_keys = union_instance_keys(&children);
        let mut group = Node::new_instance(
            NodeKey::LabelGrouping { label: label.clone(), group_id: None },
            label,
            Vec::new(),
        );
        group.grouped_instance_keys = grouped_instance_keys;
        group.children = Children::Nodes(children);
        group.non_grouping_ancestor = ancestor.clone().map(Box::new);
        if let Some(group) = apply_hiding_and_expand(group, policy.hiding, policy.auto_expand) {
            groups.push(group);
        }
    }

    let groups = unwrap_if_no_siblings(groups, policy.hiding);
    without_spec.extend(groups);
    without_spec
}

/// Run the full chain (§4.5), honoring which levels the parent disables.
pub async fn group_level(
    nodes: Vec<Node>,
    parent: &HierarchyLevelParent,
    ctx: &GroupingContext<'_>,
) -> Vec<Node> {
    let disabled = disabled_for(parent);

    let mut passthrough = Vec::new();
    let mut candidates = Vec::new();
    for node in nodes {
        if node.key.is_instances() && node.processing_params.grouping.is_some() {
            candidates.push(node);
        } else {
            passthrough.push(node);
        }
    }

    let mut current = candidates;
    if !disabled.class {
        current = apply_base_class(current, parent, ctx).await;
        current = apply_class(current, parent).await;
    }
    if !disabled.property {
        current = apply_properties(current, parent, ctx).await;
    }
    if !disabled.label {
        current = apply_label(current, parent).await;
    }

    passthrough.extend(current);
    passthrough
}

#[cfg(test)]
mod tests {
    use super::*;
    use htree_core::{ByBaseClassesParams, GroupingParams, ProcessingParams};
    use htree_metadata::{Class, MetadataError, Property, PropertyType, Schema};
    use async_trait::async_trait;

    struct FixedInspector;

    #[async_trait]
    impl MetadataInspector for FixedInspector {
        async fn class_derives_from(&self, derived: &str, base: &str) -> Result<bool, MetadataError> {
            Ok(match (derived, base) {
                ("S.A", "S.Base") | ("S.B", "S.Base") => true,
                _ => derived == base,
            })
        }

        async fn get_schema(&self, _name: &str) -> Result<Schema, MetadataError> {
            Ok(Schema { name: "S".into(), classes: Vec::<Class>::new() })
        }
    }

    struct UppercaseFormatter;

    #[async_trait]
    impl PrimitiveValueFormatter for UppercaseFormatter {
        async fn format(&self, value: &TypedPrimitiveValue) -> String {
            match value {
                TypedPrimitiveValue::String(s) => s.to_uppercase(),
                other => format!("{other:?}"),
            }
        }
    }

    fn instance_node(class_name: &str, id: &str, grouping: GroupingParams) -> Node {
        let mut keys = BTreeSet::new();
        keys.insert(InstanceKey::new(class_name, id));
        let mut node = Node::new_instance(
            NodeKey::Instances { instance_keys: keys },
            format!("{class_name}:{id}"),
            Vec::new(),
        );
        node.processing_params = ProcessingParams {
            grouping: Some(grouping),
            ..Default::default()
        };
        node
    }

    fn by_class_grouping() -> GroupingParams {
        GroupingParams {
            by_class: Some(htree_core::GroupHidingPolicyWithExpand::default()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn s3_class_grouping_produces_one_node_per_class() {
        let nodes = vec![
            instance_node("S.A", "0x1", by_class_grouping()),
            instance_node("S.A", "0x2", by_class_grouping()),
            instance_node("S.A", "0x3", by_class_grouping()),
            instance_node("S.B", "0x4", by_class_grouping()),
            instance_node("S.B", "0x5", by_class_grouping()),
        ];
        let ctx = GroupingContext { inspector: &FixedInspector, formatter: &UppercaseFormatter };
        let grouped = group_level(nodes, &HierarchyLevelParent::Root, &ctx).await;

        assert_eq!(grouped.len(), 2);
        let a = grouped.iter().find(|n| matches!(&n.key, NodeKey::ClassGrouping{class_name} if class_name == "S.A")).unwrap();
        assert_eq!(a.grouped_instance_keys.len(), 3);
        let b = grouped.iter().find(|n| matches!(&n.key, NodeKey::ClassGrouping{class_name} if class_name == "S.B")).unwrap();
        assert_eq!(b.grouped_instance_keys.len(), 2);
    }

    #[tokio::test]
    async fn class_grouping_parent_disables_further_class_grouping() {
        let nodes = vec![instance_node("S.A", "0x1", by_class_grouping())];
        let parent_node = Node::new_instance(
            NodeKey::ClassGrouping { class_name: "S.Base".to_string() },
            "Base",
            Vec::new(),
        );
        let parent = HierarchyLevelParent::Node(parent_node);
        let ctx = GroupingContext { inspector: &FixedInspector, formatter: &UppercaseFormatter };
        let grouped = group_level(nodes, &parent, &ctx).await;

        // class grouping disabled: the instance node passes through ungrouped.
        assert_eq!(grouped.len(), 1);
        assert!(grouped[0].key.is_instances());
    }

    #[tokio::test]
    async fn base_class_chain_emits_strictly_more_derived_classes() {
        let grouping = GroupingParams {
            by_base_classes: Some(ByBaseClassesParams {
                full_class_names: vec!["S.Base".to_string()],
                hiding: GroupHidingPolicy::default(),
                auto_expand: GroupAutoExpand::default(),
            }),
            ..Default::default()
        };
        let nodes = vec![instance_node("S.A", "0x1", grouping.clone()), instance_node("S.B", "0x2", grouping)];
        let ctx = GroupingContext { inspector: &FixedInspector, formatter: &UppercaseFormatter };
        let grouped = group_level(nodes, &HierarchyLevelParent::Root, &ctx).await;

        assert_eq!(grouped.len(), 1);
        assert!(matches!(&grouped[0].key, NodeKey::ClassGrouping { class_name } if class_name == "S.Base"));
        assert_eq!(grouped[0].grouped_instance_keys.len(), 2);
    }

    #[tokio::test]
    async fn hide_if_one_grouped_node_promotes_the_lone_child() {
        let grouping = GroupingParams {
            by_class: Some(htree_core::GroupHidingPolicyWithExpand {
                hiding: GroupHidingPolicy { hide_if_one_grouped_node: true, ..Default::default() },
                auto_expand: GroupAutoExpand::default(),
            }),
            ..Default::default()
        };
        let nodes = vec![instance_node("S.A", "0x1", grouping)];
        let ctx = GroupingContext { inspector: &FixedInspector, formatter: &UppercaseFormatter };
        let grouped = group_level(nodes, &HierarchyLevelParent::Root, &ctx).await;

        assert_eq!(grouped.len(), 1);
        assert!(grouped[0].key.is_instances());
    }
}
