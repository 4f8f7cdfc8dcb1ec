//! Building the `FilteringInfo` CTE body for the wire surface named in §6,
//! so a real ECSQL executor can be handed the same join shape this crate's
//! in-process matching already computes.

use htree_core::{HierarchyNodeIdentifier, IdentifierPath};
use htree_query::select::FilteringCte;

/// Render a `VALUES`-backed `FilteringInfo` CTE body carrying the columns
/// named in §6: `ECInstanceId, IsFilterTarget, FilterTargetOptions,
/// FilterClassName, FilterValidPathIndex, FilterIdentifiersCountAfter`.
///
/// This is the SQL-facing counterpart of [`crate::overlay::match_node`]:
/// an executor that understands ECSQL can use it directly instead of the
/// in-process matcher, for backends where pushing the filter into the
/// query is cheaper than fetching unfiltered rows.
pub fn build_filtering_cte(
    paths: &[IdentifierPath],
    has_filter_target_ancestor: bool,
) -> FilteringCte {
    let rows: Vec<String> = paths
        .iter()
        .enumerate()
        .filter_map(|(index, path)| {
            let HierarchyNodeIdentifier::Instance {
                class_name, id, ..
            } = path.path.first()?
            else {
                return None;
            };
            let is_target = path.path.len() == 1;
            let options = serde_json::to_string(&path.options).unwrap_or_else(|_| "null".to_string());
            Some(format!(
                "SELECT {id} AS ECInstanceId, {target} AS IsFilterTarget, '{opts}' AS FilterTargetOptions, '{class}' AS FilterClassName, {index} AS FilterValidPathIndex, {remaining} AS FilterIdentifiersCountAfter",
                id = id,
                target = i32::from(is_target),
                opts = options.replace('\'', "''"),
                class = class_name,
                index = index,
                remaining = path.path.len() - 1,
            ))
        })
        .collect();

    let select_body = if rows.is_empty() {
        "SELECT NULL AS ECInstanceId, NULL AS IsFilterTarget, NULL AS FilterTargetOptions, NULL AS FilterClassName, NULL AS FilterValidPathIndex, NULL AS FilterIdentifiersCountAfter WHERE FALSE".to_string()
    } else {
        rows.join(" UNION ALL ")
    };

    FilteringCte {
        select_body,
        has_filter_target_ancestor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_paths_yield_an_always_false_cte() {
        let cte = build_filtering_cte(&[], false);
        assert!(cte.select_body.contains("WHERE FALSE"));
    }

    #[test]
    fn one_path_yields_one_union_branch() {
        let paths = vec![IdentifierPath::new(vec![HierarchyNodeIdentifier::instance(
            "S.Child", "0x2",
        )])];
        let cte = build_filtering_cte(&paths, false);
        assert!(cte.select_body.contains("0x2"));
        assert!(cte.select_body.contains("AS IsFilterTarget"));
    }
}
