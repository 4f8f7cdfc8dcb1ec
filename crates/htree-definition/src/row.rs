//! Row Parser — converts one result row into an unprocessed instance node
//! (§4.1 "Row Parser", following the fixed column order from §4.2).

use htree_core::{Children, GroupingParams, InstanceKey, Node, NodeKey, ProcessingParams};
use htree_query::Row;
use serde_json::Value;
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RowParseError {
    #[error("row is missing required column {0}")]
    MissingColumn(&'static str),
    #[error("column {column} could not be parsed as {expected}")]
    InvalidColumn {
        column: &'static str,
        expected: &'static str,
    },
}

fn required_str<'a>(row: &'a Row, column: &'static str) -> Result<&'a str, RowParseError> {
    row.get_str(column)
        .ok_or(RowParseError::MissingColumn(column))
}

/// `HasChildren` is a nullable boolean: `NULL` means "unknown, determine
/// later" (§3 "children: tri-state").
fn children_from_column(row: &Row) -> Children {
    match row.get("HasChildren") {
        None | Some(Value::Null) => Children::Unknown,
        Some(Value::Bool(b)) => Children::Known(*b),
        Some(_) => Children::Unknown,
    }
}

fn grouping_from_column(row: &Row) -> Option<GroupingParams> {
    let raw = row.get_str("Grouping")?;
    serde_json::from_str(raw).ok()
}

fn extended_data_from_column(row: &Row) -> serde_json::Map<String, Value> {
    row.get_str("ExtendedData")
        .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
        .and_then(|v| v.as_object().cloned())
        .unwrap_or_default()
}

/// The default row→node conversion used when a definition doesn't supply
/// its own `parseNode` hook (§4.1).
pub fn parse_row(row: &Row) -> Result<Node, RowParseError> {
    let class_name = required_str(row, "FullClassName")?.to_string();
    let id = required_str(row, "ECInstanceId")?.to_string();
    let label = required_str(row, "DisplayLabel")?.to_string();

    let mut instance_keys = BTreeSet::new();
    instance_keys.insert(InstanceKey::new(class_name, id));
    let key = NodeKey::Instances { instance_keys };

    let mut node = Node::new_instance(key, label, Vec::new());
    node.children = children_from_column(row);
    node.processing_params = ProcessingParams {
        hide_if_no_children: row.get_bool("HideIfNoChildren").unwrap_or(false),
        hide_in_hierarchy: row.get_bool("HideNodeInHierarchy").unwrap_or(false),
        merge_by_label_id: row.get_str("MergeByLabelId").map(str::to_string),
        grouping: grouping_from_column(row),
    };
    node.extended_data = extended_data_from_column(row);
    node.auto_expand = row.get_bool("AutoExpand");

    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn row(pairs: &[(&str, Value)]) -> Row {
        let mut map = BTreeMap::new();
        for (k, v) in pairs {
            map.insert((*k).to_string(), v.clone());
        }
        Row(map)
    }

    #[test]
    fn parses_minimal_row_into_instance_node() {
        let r = row(&[
            ("FullClassName", json!("Test.Widget")),
            ("ECInstanceId", json!("0x1")),
            ("DisplayLabel", json!("Widget 1")),
            ("HasChildren", Value::Null),
        ]);
        let node = parse_row(&r).unwrap();
        assert_eq!(node.label, "Widget 1");
        assert!(matches!(node.children, Children::Unknown));
        assert!(node.key.is_instances());
    }

    #[test]
    fn parses_tri_state_children() {
        let r = row(&[
            ("FullClassName", json!("Test.Widget")),
            ("ECInstanceId", json!("0x1")),
            ("DisplayLabel", json!("Widget 1")),
            ("HasChildren", json!(true)),
        ]);
        let node = parse_row(&r).unwrap();
        assert!(matches!(node.children, Children::Known(true)));
    }

    #[test]
    fn missing_required_column_is_an_error() {
        let r = row(&[("ECInstanceId", json!("0x1"))]);
        let err = parse_row(&r).unwrap_err();
        assert_eq!(err, RowParseError::MissingColumn("FullClassName"));
    }

    #[test]
    fn parses_extended_data_object() {
        let r = row(&[
            ("FullClassName", json!("Test.Widget")),
            ("ECInstanceId", json!("0x1")),
            ("DisplayLabel", json!("Widget 1")),
            ("ExtendedData", json!("{\"color\":\"red\"}")),
        ]);
        let node = parse_row(&r).unwrap();
        assert_eq!(node.extended_data.get("color").unwrap(), "red");
    }
}
