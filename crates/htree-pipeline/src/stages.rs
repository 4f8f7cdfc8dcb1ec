//! The non-recursive pipeline stages (§4.4): merge-by-label and
//! hide-if-no-children. Parse, pre-process, hide-in-hierarchy and
//! determine-children need to recurse into the engine and live in
//! [`crate::engine`]; sort reuses [`htree_core::sort`] directly; grouping
//! lives in [`crate::grouping`].

use htree_core::{Children, Node, NodeKey};
use std::collections::BTreeSet;

/// Cooperative yield point: call after every `threshold` items processed by
/// any stage (§4.4 "Main-thread yielding", §5).
pub async fn maybe_yield(processed: usize, threshold: usize) {
    if threshold > 0 && processed % threshold == 0 {
        tokio::task::yield_now().await;
    }
}

/// Collapse instance nodes sharing `(label, mergeByLabelId)` into one node
/// carrying the union of their instance keys (§4.4 stage 4, §8 scenario S6).
///
/// Nodes with no `mergeByLabelId` are passed through unmodified; insertion
/// order of the first-seen node in each merge group is preserved.
pub async fn merge_by_label(nodes: Vec<Node>, yield_every: usize) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::with_capacity(nodes.len());
    let mut group_index: std::collections::HashMap<(String, String), usize> =
        std::collections::HashMap::new();

    for (processed, node) in nodes.into_iter().enumerate() {
        let merge_id = node
            .key
            .is_instances()
            .then(|| node.processing_params.merge_by_label_id.clone())
            .flatten();

        match merge_id {
            None => out.push(node),
            Some(id) => {
                let group_key = (node.label.clone(), id);
                match group_index.get(&group_key) {
                    Some(&index) => merge_into(&mut out[index], node),
                    None => {
                        group_index.insert(group_key, out.len());
                        out.push(node);
                    }
                }
            }
        }
        maybe_yield(processed + 1, yield_every).await;
    }

    out
}

fn merge_into(target: &mut Node, incoming: Node) {
    let NodeKey::Instances { instance_keys: target_keys } = &mut target.key else {
        return;
    };
    if let NodeKey::Instances { instance_keys: incoming_keys } = incoming.key {
        target_keys.extend(incoming_keys);
    }
    let mut merged: BTreeSet<_> = target.grouped_instance_keys.drain(..).collect();
    merged.extend(incoming.grouped_instance_keys);
    target.grouped_instance_keys = merged.into_iter().collect();
}

/// Drop nodes flagged `hideIfNoChildren` whose resolved children are empty
/// (§4.4 stage 6, §8 invariant 5).
///
/// Must run after determine-children has resolved `Children::Unknown` to a
/// concrete value for any node this rule could apply to.
pub async fn hide_if_no_children(nodes: Vec<Node>, yield_every: usize) -> Vec<Node> {
    let mut out = Vec::with_capacity(nodes.len());
    for (processed, node) in nodes.into_iter().enumerate() {
        let drop = node.processing_params.hide_if_no_children && !node.children.has_children();
        if !drop {
            out.push(node);
        }
        maybe_yield(processed + 1, yield_every).await;
    }
    out
}

/// Whether `children` is still unresolved and needs a determine-children
/// probe (§4.4 stage 5).
pub fn needs_children_probe(children: &Children) -> bool {
    children.is_unknown()
}

#[cfg(test)]
mod tests {
    use super::*;
    use htree_core::InstanceKey;

    fn instance_node(label: &str, id: &str, merge_id: Option<&str>) -> Node {
        let mut keys = BTreeSet::new();
        keys.insert(InstanceKey::new("S.C", id));
        let mut node = Node::new_instance(
            NodeKey::Instances { instance_keys: keys },
            label,
            Vec::new(),
        );
        node.processing_params.merge_by_label_id = merge_id.map(str::to_string);
        node
    }

    #[tokio::test]
    async fn s6_merges_same_label_same_merge_id() {
        let nodes = vec![
            instance_node("x", "0x1", Some("m")),
            instance_node("x", "0x2", Some("m")),
        ];
        let merged = merge_by_label(nodes, 100).await;
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].key.instance_keys_iter().count(), 2);
    }

    #[tokio::test]
    async fn nodes_without_merge_id_pass_through() {
        let nodes = vec![instance_node("x", "0x1", None), instance_node("x", "0x2", None)];
        let merged = merge_by_label(nodes, 100).await;
        assert_eq!(merged.len(), 2);
    }

    #[tokio::test]
    async fn hide_if_no_children_drops_flagged_empty_nodes() {
        let mut empty = instance_node("a", "0x1", None);
        empty.processing_params.hide_if_no_children = true;
        empty.children = Children::Known(false);

        let mut kept = instance_node("b", "0x2", None);
        kept.processing_params.hide_if_no_children = true;
        kept.children = Children::Known(true);

        let out = hide_if_no_children(vec![empty, kept], 100).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].label, "b");
    }
}
