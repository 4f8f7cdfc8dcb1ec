//! Node Select Query Factory — builds the fixed-column-order ECSQL SELECT
//! clause that is the parser's contract with the query layer (§4.2).

use crate::filter::CompiledFilter;
use crate::query::{Cte, Query};
use htree_core::GroupingParams;

/// The instance-node SELECT clause columns, in the fixed order the row
/// parser relies on (§4.2, §6 "Wire surface").
pub const SELECT_COLUMNS: &[&str] = &[
    "FullClassName",
    "ECInstanceId",
    "DisplayLabel",
    "HasChildren",
    "HideIfNoChildren",
    "HideNodeInHierarchy",
    "Grouping",
    "MergeByLabelId",
    "ExtendedData",
    "AutoExpand",
    "SupportsFiltering",
];

/// Columns added by the filtering CTE join, appended after the base
/// instance columns when a filter overlay is active (§6 "Wire surface").
pub const FILTERING_COLUMNS: &[&str] = &[
    "FilterECInstanceId",
    "FilterClassName",
    "FilterValidPathIndex",
    "FilterIdentifiersCountAfter",
    "IsFilterTarget",
    "HasFilterTargetAncestor",
    "FilterTargetOptions",
];

/// Builds the instance-node SELECT for one `InstanceNodesQueryDefinition`.
pub struct NodeSelectQueryFactory;

impl NodeSelectQueryFactory {
    /// Compose the full ECSQL for a class, with an optional compiled
    /// instance filter and an optional filtering-overlay CTE join.
    pub fn build(
        full_class_name: &str,
        grouping: Option<&GroupingParams>,
        instance_filter: Option<&CompiledFilter>,
        filtering_cte: Option<FilteringCte>,
    ) -> Query {
        Self::build_with_where(full_class_name, grouping, instance_filter, filtering_cte, None)
    }

    /// As [`Self::build`], additionally ANDing `custom_where` (a
    /// definition's own static predicate, §4.1) onto the final `WHERE`
    /// clause.
    pub fn build_with_where(
        full_class_name: &str,
        grouping: Option<&GroupingParams>,
        instance_filter: Option<&CompiledFilter>,
        filtering_cte: Option<FilteringCte>,
        custom_where: Option<&str>,
    ) -> Query {
        let grouping_json = grouping
            .map(|g| serde_json::to_string(g).unwrap_or_else(|_| "null".to_string()))
            .unwrap_or_else(|| "null".to_string());

        let mut columns: Vec<String> = SELECT_COLUMNS
            .iter()
            .map(|c| match *c {
                "FullClassName" => "[q].[ECClassId]".to_string(),
                "Grouping" => format!("'{}'", grouping_json.replace('\'', "''")),
                other => format!("[q].[{other}]"),
            })
            .collect();

        let mut from_clause = format!("{full_class_name} [q]");
        let mut where_clauses: Vec<String> = Vec::new();
        let mut ctes: Vec<Cte> = Vec::new();

        if let Some(compiled) = instance_filter {
            match &compiled.from {
                None => where_clauses.push("FALSE".to_string()),
                Some(narrowed_class) => {
                    from_clause = format!("{narrowed_class} [q]");
                    for join in &compiled.joins {
                        from_clause.push(' ');
                        from_clause.push_str(join);
                    }
                    where_clauses.push(compiled.where_clause.clone());
                }
            }
        }

        if let Some(custom) = custom_where {
            where_clauses.push(format!("({custom})"));
        }

        if let Some(cte) = filtering_cte {
            columns.extend(FILTERING_COLUMNS.iter().map(|c| format!("[fi].[{c}]")));
            ctes.push(Cte {
                name: "FilteringInfo".to_string(),
                body: cte.select_body,
            });
            let join_kind = if cte.has_filter_target_ancestor {
                "LEFT JOIN"
            } else {
                "INNER JOIN"
            };
            from_clause = format!(
                "{from_clause} {join_kind} FilteringInfo [fi] ON [fi].[ECInstanceId] = [q].[ECInstanceId]"
            );
        }

        let where_sql = if where_clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", where_clauses.join(" AND "))
        };

        let ecsql = format!(
            "SELECT {} FROM {from_clause}{where_sql}",
            columns.join(", ")
        );

        Query::new(ecsql).with_ctes(ctes)
    }
}

/// Parameters for joining the filtering-overlay CTE onto a base query
/// (§4.6, §6).
pub struct FilteringCte {
    pub select_body: String,
    pub has_filter_target_ancestor: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_columns_are_in_spec_fixed_order() {
        assert_eq!(
            SELECT_COLUMNS,
            &[
                "FullClassName",
                "ECInstanceId",
                "DisplayLabel",
                "HasChildren",
                "HideIfNoChildren",
                "HideNodeInHierarchy",
                "Grouping",
                "MergeByLabelId",
                "ExtendedData",
                "AutoExpand",
                "SupportsFiltering",
            ]
        );
    }

    #[test]
    fn build_without_filter_selects_plain_class() {
        let query = NodeSelectQueryFactory::build("Test.Widget", None, None, None);
        assert!(query.ecsql.contains("FROM Test.Widget [q]"));
        assert!(query.ctes.is_empty());
    }

    #[test]
    fn build_with_empty_intersection_filter_yields_false() {
        let compiled = CompiledFilter {
            from: None,
            joins: Vec::new(),
            where_clause: String::new(),
        };
        let query = NodeSelectQueryFactory::build("Test.Widget", None, Some(&compiled), None);
        assert!(query.ecsql.contains("WHERE FALSE"));
    }

    #[test]
    fn build_with_filtering_cte_joins_filtering_info() {
        let cte = FilteringCte {
            select_body: "SELECT ECInstanceId, 1 AS IsFilterTarget FROM Test.Widget".to_string(),
            has_filter_target_ancestor: false,
        };
        let query = NodeSelectQueryFactory::build("Test.Widget", None, None, Some(cte));
        assert!(query.ecsql.contains("INNER JOIN FilteringInfo [fi]"));
        assert_eq!(query.ctes[0].name, "FilteringInfo");
    }
}
