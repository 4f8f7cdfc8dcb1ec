//! In-hierarchy info nodes (§4.9, §7): recoverable failures surface as a
//! regular [`Node`] with a generic key rather than propagating as an error,
//! so a consumer can keep rendering the rest of the level.

use htree_core::{Node, NodeKey};
use serde_json::json;

/// Source tag distinguishing info nodes from real generic definitions
/// declared by a hierarchy definition.
pub const INFO_NODE_SOURCE: &str = "htree-pipeline:info";

/// A query exceeded its per-level row limit (§4.3, §7 "RowLimitExceeded").
/// The UI flow is: re-request the level with `hierarchyLevelSizeLimit:
/// "unbounded"` (a different cache variation) to see everything.
pub fn result_set_too_large(parent_id: &str, limit: usize) -> Node {
    let key = NodeKey::generic_with_source(
        format!("result-set-too-large:{parent_id}"),
        INFO_NODE_SOURCE,
    );
    let mut node = Node::new_instance(key, format!("More than {limit} items"), Vec::new());
    node.extended_data.insert("infoType".into(), json!("ResultSetTooLarge"));
    node.extended_data.insert(
        "message".into(),
        json!(format!("The result set exceeds the limit of {limit} items")),
    );
    node.extended_data.insert("limit".into(), json!(limit));
    node
}

/// A referenced schema/class could not be resolved (§7 "InvalidSchemaOrClass").
pub fn unknown_error(parent_id: &str, message: &str) -> Node {
    let key = NodeKey::generic_with_source(format!("unknown-error:{parent_id}"), INFO_NODE_SOURCE);
    let mut node = Node::new_instance(key, "Error".to_string(), Vec::new());
    node.extended_data.insert("infoType".into(), json!("Unknown"));
    node.extended_data.insert("message".into(), json!(message));
    node
}

pub fn is_info_node(node: &Node) -> bool {
    matches!(&node.key, NodeKey::Generic { source: Some(s), .. } if s == INFO_NODE_SOURCE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_set_too_large_carries_the_limit_in_the_message() {
        let node = result_set_too_large("root", 2);
        assert!(is_info_node(&node));
        assert_eq!(
            node.extended_data.get("message").unwrap().as_str().unwrap(),
            "The result set exceeds the limit of 2 items"
        );
    }
}
