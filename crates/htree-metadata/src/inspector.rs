//! `MetadataInspector` — polymorphic class lookups (§6).

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MetadataError {
    #[error("unknown schema: {0}")]
    UnknownSchema(String),
    #[error("unknown class: {0}")]
    UnknownClass(String),
    #[error("unknown property {property} on class {class_name}")]
    UnknownProperty { class_name: String, property: String },
}

/// The primitive type of a property, used by the instance-filter compiler
/// to select the right ECSQL comparison (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    Boolean,
    Integer,
    Long,
    Double,
    String,
    DateTime,
    Point2d,
    Point3d,
    Navigation,
    /// Struct, array or any other non-scalar property — filtering on these
    /// is unsupported (§4.2 "Struct/array/non-existent properties raise
    /// errors").
    Unsupported,
}

#[derive(Debug, Clone)]
pub struct Property {
    pub name: String,
    pub property_type: PropertyType,
}

/// A class in the schema graph.
#[derive(Debug, Clone)]
pub struct Class {
    pub full_name: String,
    pub label: String,
    pub is_entity_class: bool,
    pub is_relationship_class: bool,
    /// Direct and transitive base classes, most-derived excluded (this
    /// class itself is not listed).
    pub base_classes: Vec<String>,
    /// Direct and transitive derived classes.
    pub derived_classes: Vec<String>,
    pub properties: Vec<Property>,
}

impl Class {
    /// The polymorphic "derives from or equals" check (§4.1, §4.2 Glossary).
    pub fn is(&self, other: &str) -> bool {
        self.full_name == other || self.base_classes.iter().any(|b| b == other)
    }

    pub fn get_property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn get_properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn get_derived_classes(&self) -> &[String] {
        &self.derived_classes
    }
}

#[derive(Debug, Clone)]
pub struct Schema {
    pub name: String,
    pub classes: Vec<Class>,
}

impl Schema {
    pub fn get_class(&self, class_name: &str) -> Option<&Class> {
        self.classes.iter().find(|c| c.full_name == class_name)
    }
}

/// Polymorphic class-derivation queries and schema/class lookups (§6).
///
/// Implementations are expected to memoize class-derivation results
/// internally; the filtering overlay relies on this being cheap to call
/// repeatedly (§4.6 "Class-derivation tests are cached").
#[async_trait]
pub trait MetadataInspector: Send + Sync {
    async fn class_derives_from(&self, derived: &str, base: &str) -> Result<bool, MetadataError>;

    async fn get_schema(&self, name: &str) -> Result<Schema, MetadataError>;

    async fn get_class(&self, full_class_name: &str) -> Result<Class, MetadataError> {
        let (schema_name, class_name) = full_class_name
            .split_once('.')
            .ok_or_else(|| MetadataError::UnknownClass(full_class_name.to_string()))?;
        let schema = self.get_schema(schema_name).await?;
        schema
            .get_class(class_name)
            .cloned()
            .or_else(|| schema.get_class(full_class_name).cloned())
            .ok_or_else(|| MetadataError::UnknownClass(full_class_name.to_string()))
    }

    /// Find the most-derived class that is a common ancestor of all given
    /// classes, used when computing a class-grouping key's `className`
    /// (§3 invariant).
    async fn most_derived_common_base(
        &self,
        class_names: &[String],
    ) -> Result<Option<String>, MetadataError> {
        if class_names.is_empty() {
            return Ok(None);
        }
        let mut candidates: Option<Vec<String>> = None;
        for name in class_names {
            let class = self.get_class(name).await?;
            let mut ancestry: Vec<String> = class.base_classes.clone();
            ancestry.push(class.full_name.clone());
            candidates = Some(match candidates {
                None => ancestry,
                Some(prev) => prev.into_iter().filter(|a| ancestry.contains(a)).collect(),
            });
        }
        let candidates = candidates.unwrap_or_default();
        // Prefer the most-derived of the shared ancestors: the one that is
        // not itself a base of any other candidate.
        let mut best: Option<&str> = None;
        for candidate in &candidates {
            let candidate_class = self.get_class(candidate).await?;
            let is_most_derived = candidates
                .iter()
                .all(|other| other == candidate || !candidate_class.base_classes.contains(other));
            if is_most_derived {
                best = Some(candidate.as_str());
                break;
            }
        }
        Ok(best.map(str::to_string))
    }
}

#[async_trait]
impl MetadataInspector for std::sync::Arc<dyn MetadataInspector> {
    async fn class_derives_from(&self, derived: &str, base: &str) -> Result<bool, MetadataError> {
        self.as_ref().class_derives_from(derived, base).await
    }

    async fn get_schema(&self, name: &str) -> Result<Schema, MetadataError> {
        self.as_ref().get_schema(name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(full_name: &str, bases: &[&str]) -> Class {
        Class {
            full_name: full_name.to_string(),
            label: full_name.to_string(),
            is_entity_class: true,
            is_relationship_class: false,
            base_classes: bases.iter().map(|s| s.to_string()).collect(),
            derived_classes: Vec::new(),
            properties: Vec::new(),
        }
    }

    #[test]
    fn is_matches_self_and_bases() {
        let c = class("S.Child", &["S.Base"]);
        assert!(c.is("S.Child"));
        assert!(c.is("S.Base"));
        assert!(!c.is("S.Other"));
    }
}
