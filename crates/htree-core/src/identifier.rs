//! Hierarchy node identifiers and filter paths (§3 "Identifier paths").

use serde::{Deserialize, Serialize};

/// A single step of an identifier path: either a generic node identity or
/// an instance identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HierarchyNodeIdentifier {
    Generic {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
    Instance {
        class_name: String,
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        imodel_key: Option<String>,
    },
}

impl HierarchyNodeIdentifier {
    pub fn generic(id: impl Into<String>) -> Self {
        Self::Generic {
            id: id.into(),
            source: None,
        }
    }

    pub fn instance(class_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Instance {
            class_name: class_name.into(),
            id: id.into(),
            imodel_key: None,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            HierarchyNodeIdentifier::Generic { id, .. } => id,
            HierarchyNodeIdentifier::Instance { id, .. } => id,
        }
    }

    pub fn source(&self) -> Option<&str> {
        match self {
            HierarchyNodeIdentifier::Generic { source, .. } => source.as_deref(),
            HierarchyNodeIdentifier::Instance { imodel_key, .. } => imodel_key.as_deref(),
        }
    }
}

/// The `reveal` sub-option of `PathOptions`: which node along a matched path
/// should be auto-expanded by distance (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PathAutoExpand {
    /// Auto-expand every node on the matched path.
    All,
    /// Auto-expand the node at this distance from the tree root.
    Depth { depth: usize },
    /// Auto-expand the node at this distance along the matched path
    /// (grouping nodes inserted along the way use `depthInPath + 1`, §4.6).
    DepthInPath { depth_in_path: usize },
}

/// Per-path options carried alongside an `IdentifierPath` (§3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_expand: Option<PathAutoExpand>,
}

/// A root-to-leaf sequence of identifiers configured for filtering (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifierPath {
    pub path: Vec<HierarchyNodeIdentifier>,
    #[serde(default)]
    pub options: PathOptions,
}

impl IdentifierPath {
    pub fn new(path: Vec<HierarchyNodeIdentifier>) -> Self {
        Self {
            path,
            options: PathOptions::default(),
        }
    }

    pub fn with_auto_expand(mut self, auto_expand: PathAutoExpand) -> Self {
        self.options.auto_expand = Some(auto_expand);
        self
    }

    pub fn len(&self) -> usize {
        self.path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_path_exposes_length() {
        let path = IdentifierPath::new(vec![
            HierarchyNodeIdentifier::instance("S.Root", "0x1"),
            HierarchyNodeIdentifier::instance("S.Child", "0x2"),
        ]);
        assert_eq!(path.len(), 2);
        assert!(!path.is_empty());
    }
}
