//! The instance-filter compiler: turns a platform-neutral
//! [`GenericInstanceFilter`] into ECSQL `{from, joins, where}` fragments
//! (§4.2).

use htree_metadata::{MetadataError, MetadataInspector, PropertyType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Float equality is compared with a `BETWEEN value-ε AND value+ε` window
/// rather than `=` (§4.2).
pub const FLOAT_EPSILON: f64 = 1.0e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOperator {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Like,
    IsNull,
    IsNotNull,
}

/// A single step of a related-instance join path (§4.2 "joins compose per
/// relationship step").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedInstanceStep {
    pub relationship_class_name: String,
    pub target_class_name: String,
    /// `true` when traversing the relationship in its forward direction.
    pub is_forward: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedInstanceDescription {
    pub alias: String,
    pub path: Vec<RelatedInstanceStep>,
    pub class_name: String,
}

/// A leaf comparison: `<alias?>.<propertyName> <operator> <value>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyFilterRule {
    pub source_alias: Option<String>,
    pub property_class_name: String,
    pub property_name: String,
    pub operator: FilterOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// A boolean combination of rules, or a single leaf rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum FilterRuleGroup {
    And(Vec<FilterRuleGroup>),
    Or(Vec<FilterRuleGroup>),
    Not(Box<FilterRuleGroup>),
    Leaf(PropertyFilterRule),
}

/// The platform-neutral filter shape (§4.2, §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericInstanceFilter {
    pub property_class_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filtered_class_names: Option<Vec<String>>,
    #[serde(default)]
    pub related_instances: Vec<RelatedInstanceDescription>,
    pub rules: FilterRuleGroup,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FilterCompileError {
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error("property {property} on class {class_name} is a struct, array, or does not exist and cannot be filtered")]
    UnsupportedFilterProperty { class_name: String, property: String },
}

/// The ECSQL fragments produced by compiling a filter against a content
/// class name (§4.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledFilter {
    /// The most-derived class to select `FROM`, or `None` when the
    /// intersection of content and property classes is empty — callers
    /// must then use `where = FALSE` (§4.2).
    pub from: Option<String>,
    pub joins: Vec<String>,
    pub where_clause: String,
}

fn empty_result() -> CompiledFilter {
    CompiledFilter {
        from: None,
        joins: Vec::new(),
        where_clause: "FALSE".to_string(),
    }
}

/// Quote an ECSQL string literal, escaping `'` and treating `\` as the
/// `LIKE` escape character (§4.2 "`String` `like` treats `%` as wildcard
/// with `\` escape").
fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn render_value(value: &Value, property_type: PropertyType) -> Result<String, ()> {
    match (property_type, value) {
        (PropertyType::Boolean, Value::Bool(b)) => Ok(b.to_string().to_uppercase()),
        (PropertyType::Integer | PropertyType::Long, Value::Number(n)) => Ok(n.to_string()),
        (PropertyType::Double, Value::Number(n)) => Ok(n.to_string()),
        (PropertyType::String | PropertyType::Navigation, Value::String(s)) => {
            Ok(quote_literal(s))
        }
        (PropertyType::DateTime, Value::String(s)) => Ok(quote_literal(s)),
        _ => Err(()),
    }
}

/// Render a single leaf rule's `WHERE` fragment, type-aware per §4.2's
/// operator semantics table.
fn render_leaf(
    rule: &PropertyFilterRule,
    property_type: PropertyType,
) -> Result<String, FilterCompileError> {
    let column = match &rule.source_alias {
        Some(alias) => format!("[{alias}].[{}]", rule.property_name),
        None => format!("[{}]", rule.property_name),
    };

    if matches!(rule.operator, FilterOperator::IsNull) {
        return Ok(format!("{column} IS NULL"));
    }
    if matches!(rule.operator, FilterOperator::IsNotNull) {
        return Ok(format!("{column} IS NOT NULL"));
    }

    let value = rule.value.as_ref().ok_or_else(|| {
        FilterCompileError::UnsupportedFilterProperty {
            class_name: rule.property_class_name.clone(),
            property: rule.property_name.clone(),
        }
    })?;

    match property_type {
        PropertyType::Double => {
            let n = value.as_f64().ok_or_else(|| {
                FilterCompileError::UnsupportedFilterProperty {
                    class_name: rule.property_class_name.clone(),
                    property: rule.property_name.clone(),
                }
            })?;
            match rule.operator {
                FilterOperator::Equal => Ok(format!(
                    "{column} BETWEEN {} AND {}",
                    n - FLOAT_EPSILON,
                    n + FLOAT_EPSILON
                )),
                FilterOperator::NotEqual => Ok(format!(
                    "NOT ({column} BETWEEN {} AND {})",
                    n - FLOAT_EPSILON,
                    n + FLOAT_EPSILON
                )),
                FilterOperator::Less => Ok(format!("{column} < {n}")),
                FilterOperator::LessOrEqual => Ok(format!("{column} <= {n}")),
                FilterOperator::Greater => Ok(format!("{column} > {n}")),
                FilterOperator::GreaterOrEqual => Ok(format!("{column} >= {n}")),
                _ => Err(FilterCompileError::UnsupportedFilterProperty {
                    class_name: rule.property_class_name.clone(),
                    property: rule.property_name.clone(),
                }),
            }
        }
        PropertyType::Point2d | PropertyType::Point3d => {
            // Component-wise BETWEEN: only equality is meaningful for a
            // point-typed property (§4.2).
            let obj = value.as_object().ok_or_else(|| {
                FilterCompileError::UnsupportedFilterProperty {
                    class_name: rule.property_class_name.clone(),
                    property: rule.property_name.clone(),
                }
            })?;
            let mut components = vec![("X", obj.get("x")), ("Y", obj.get("y"))];
            if property_type == PropertyType::Point3d {
                components.push(("Z", obj.get("z")));
            }
            let mut parts = Vec::new();
            for (suffix, component) in components {
                let n = component.and_then(Value::as_f64).ok_or_else(|| {
                    FilterCompileError::UnsupportedFilterProperty {
                        class_name: rule.property_class_name.clone(),
                        property: rule.property_name.clone(),
                    }
                })?;
                parts.push(format!(
                    "{column}_{suffix} BETWEEN {} AND {}",
                    n - FLOAT_EPSILON,
                    n + FLOAT_EPSILON
                ));
            }
            Ok(format!("({})", parts.join(" AND ")))
        }
        PropertyType::DateTime => {
            let iso = value.as_str().ok_or_else(|| {
                FilterCompileError::UnsupportedFilterProperty {
                    class_name: rule.property_class_name.clone(),
                    property: rule.property_name.clone(),
                }
            })?;
            let rendered = quote_literal(iso);
            let julian = format!("julianday({column})");
            let julian_target = format!("julianday({rendered})");
            match rule.operator {
                FilterOperator::Equal => Ok(format!("{julian} = {julian_target}")),
                FilterOperator::NotEqual => Ok(format!("{julian} <> {julian_target}")),
                FilterOperator::Less => Ok(format!("{julian} < {julian_target}")),
                FilterOperator::LessOrEqual => Ok(format!("{julian} <= {julian_target}")),
                FilterOperator::Greater => Ok(format!("{julian} > {julian_target}")),
                FilterOperator::GreaterOrEqual => Ok(format!("{julian} >= {julian_target}")),
                _ => Err(FilterCompileError::UnsupportedFilterProperty {
                    class_name: rule.property_class_name.clone(),
                    property: rule.property_name.clone(),
                }),
            }
        }
        PropertyType::String => {
            let rendered = render_value(value, property_type).map_err(|()| {
                FilterCompileError::UnsupportedFilterProperty {
                    class_name: rule.property_class_name.clone(),
                    property: rule.property_name.clone(),
                }
            })?;
            match rule.operator {
                FilterOperator::Equal => Ok(format!("{column} = {rendered}")),
                FilterOperator::NotEqual => Ok(format!("{column} <> {rendered}")),
                FilterOperator::Like => Ok(format!("{column} LIKE {rendered} ESCAPE '\\'")),
                _ => Err(FilterCompileError::UnsupportedFilterProperty {
                    class_name: rule.property_class_name.clone(),
                    property: rule.property_name.clone(),
                }),
            }
        }
        PropertyType::Boolean | PropertyType::Integer | PropertyType::Long => {
            let rendered = render_value(value, property_type).map_err(|()| {
                FilterCompileError::UnsupportedFilterProperty {
                    class_name: rule.property_class_name.clone(),
                    property: rule.property_name.clone(),
                }
            })?;
            match rule.operator {
                FilterOperator::Equal => Ok(format!("{column} = {rendered}")),
                FilterOperator::NotEqual => Ok(format!("{column} <> {rendered}")),
                FilterOperator::Less => Ok(format!("{column} < {rendered}")),
                FilterOperator::LessOrEqual => Ok(format!("{column} <= {rendered}")),
                FilterOperator::Greater => Ok(format!("{column} > {rendered}")),
                FilterOperator::GreaterOrEqual => Ok(format!("{column} >= {rendered}")),
                _ => Err(FilterCompileError::UnsupportedFilterProperty {
                    class_name: rule.property_class_name.clone(),
                    property: rule.property_name.clone(),
                }),
            }
        }
        PropertyType::Navigation => {
            let rendered = render_value(value, property_type).map_err(|()| {
                FilterCompileError::UnsupportedFilterProperty {
                    class_name: rule.property_class_name.clone(),
                    property: rule.property_name.clone(),
                }
            })?;
            Ok(format!("{column}.Id = {rendered}"))
        }
        PropertyType::Unsupported => Err(FilterCompileError::UnsupportedFilterProperty {
            class_name: rule.property_class_name.clone(),
            property: rule.property_name.clone(),
        }),
    }
}

async fn render_group(
    group: &FilterRuleGroup,
    inspector: &dyn MetadataInspector,
) -> Result<String, FilterCompileError> {
    match group {
        FilterRuleGroup::Leaf(rule) => {
            let class = inspector.get_class(&rule.property_class_name).await?;
            let property = class.get_property(&rule.property_name).ok_or_else(|| {
                FilterCompileError::UnsupportedFilterProperty {
                    class_name: rule.property_class_name.clone(),
                    property: rule.property_name.clone(),
                }
            })?;
            if property.property_type == PropertyType::Unsupported {
                return Err(FilterCompileError::UnsupportedFilterProperty {
                    class_name: rule.property_class_name.clone(),
                    property: rule.property_name.clone(),
                });
            }
            render_leaf(rule, property.property_type)
        }
        FilterRuleGroup::And(children) => {
            let mut parts = Vec::with_capacity(children.len());
            for child in children {
                parts.push(Box::pin(render_group(child, inspector)).await?);
            }
            Ok(format!("({})", parts.join(" AND ")))
        }
        FilterRuleGroup::Or(children) => {
            let mut parts = Vec::with_capacity(children.len());
            for child in children {
                parts.push(Box::pin(render_group(child, inspector)).await?);
            }
            Ok(format!("({})", parts.join(" OR ")))
        }
        FilterRuleGroup::Not(inner) => {
            let rendered = Box::pin(render_group(inner, inspector)).await?;
            Ok(format!("NOT ({rendered})"))
        }
    }
}

/// Emits a relationship join clause for one step of a related-instance
/// path, named `rel_<i>_<rel>_<step>` (§4.2).
fn render_join(index: usize, step: &RelatedInstanceStep) -> String {
    let alias = format!("rel_{index}_{}", step.relationship_class_name.replace('.', "_"));
    let direction = if step.is_forward {
        "FORWARD"
    } else {
        "BACKWARD"
    };
    format!(
        "INNER JOIN {} {direction} [{alias}]",
        step.relationship_class_name
    )
}

/// Compiles a [`GenericInstanceFilter`] against the content class currently
/// being queried (§4.2).
pub async fn compile_filter(
    filter: &GenericInstanceFilter,
    content_class_name: &str,
    inspector: &dyn MetadataInspector,
) -> Result<CompiledFilter, FilterCompileError> {
    let mut candidate_classes = vec![content_class_name.to_string()];
    candidate_classes.extend(filter.property_class_names.iter().cloned());
    let from = inspector
        .most_derived_common_base(&candidate_classes)
        .await?;

    let Some(from) = from else {
        return Ok(empty_result());
    };

    let mut joins: Vec<String> = Vec::new();
    for related in &filter.related_instances {
        for (i, step) in related.path.iter().enumerate() {
            joins.push(render_join(i, step));
        }
    }

    let mut where_clause = render_group(&filter.rules, inspector).await?;

    if let Some(filtered_class_names) = &filter.filtered_class_names {
        let class_list = filtered_class_names.join(", ");
        where_clause = format!("({where_clause}) AND [q].ECClassId IS ({class_list})");
    }

    Ok(CompiledFilter {
        from: Some(from),
        joins,
        where_clause,
    })
}
