//! Primitive value formatting (§6 "Primitive value formatter").

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A typed primitive value as read off an ECSQL row, tagged so a formatter
/// can pick the right display convention without re-inspecting schema
/// metadata (§4.2's operator-semantics table relies on the same tagging to
/// choose a comparison).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TypedPrimitiveValue {
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
    /// ISO-8601 string plus the Julian-day value used for range comparisons
    /// (§4.2 "DateTime comparisons use Julian day").
    DateTime { iso8601: String, julian_day: f64 },
    Point2d { x: f64, y: f64 },
    Point3d { x: f64, y: f64, z: f64 },
    Id(String),
}

/// Formats a typed primitive value into the string shown in a node's label
/// or filter description (§6).
#[async_trait]
pub trait PrimitiveValueFormatter: Send + Sync {
    async fn format(&self, value: &TypedPrimitiveValue) -> String;
}

/// A formatter with sensible defaults, used by the demo CLI and in tests
/// where no host-supplied formatter is available.
pub struct DefaultPrimitiveValueFormatter;

#[async_trait]
impl PrimitiveValueFormatter for DefaultPrimitiveValueFormatter {
    async fn format(&self, value: &TypedPrimitiveValue) -> String {
        match value {
            TypedPrimitiveValue::Boolean(b) => b.to_string(),
            TypedPrimitiveValue::Integer(i) => i.to_string(),
            TypedPrimitiveValue::Double(d) => format!("{d}"),
            TypedPrimitiveValue::String(s) => s.clone(),
            TypedPrimitiveValue::DateTime { iso8601, .. } => iso8601.clone(),
            TypedPrimitiveValue::Point2d { x, y } => format!("({x}, {y})"),
            TypedPrimitiveValue::Point3d { x, y, z } => format!("({x}, {y}, {z})"),
            TypedPrimitiveValue::Id(id) => id.clone(),
        }
    }
}

#[async_trait]
impl PrimitiveValueFormatter for std::sync::Arc<dyn PrimitiveValueFormatter> {
    async fn format(&self, value: &TypedPrimitiveValue) -> String {
        self.as_ref().format(value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_formatter_renders_points_with_components() {
        let formatter = DefaultPrimitiveValueFormatter;
        let out = formatter
            .format(&TypedPrimitiveValue::Point3d { x: 1.0, y: 2.0, z: 3.0 })
            .await;
        assert_eq!(out, "(1, 2, 3)");
    }

    #[tokio::test]
    async fn default_formatter_renders_datetime_as_iso8601() {
        let formatter = DefaultPrimitiveValueFormatter;
        let out = formatter
            .format(&TypedPrimitiveValue::DateTime {
                iso8601: "2024-01-01T00:00:00Z".to_string(),
                julian_day: 2_460_311.5,
            })
            .await;
        assert_eq!(out, "2024-01-01T00:00:00Z");
    }
}
