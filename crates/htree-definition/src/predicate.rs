//! Predicate-based matching of definitions to a parent (§4.1).

use crate::parent::HierarchyLevelParent;
use htree_metadata::{MetadataError, MetadataInspector};
use std::sync::Arc;

/// Matches a parent with a generic key.
pub type GenericPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Matches a parent with instance keys of a given class, either by exact
/// polymorphic class name or by an arbitrary predicate over the class
/// names present (§4.1 "`parentInstancesNodePredicate`").
#[derive(Clone)]
pub enum InstancesPredicate {
    /// Polymorphic: matches if the parent's class derives from or equals
    /// the named class.
    ClassName(String),
    Predicate(Arc<dyn Fn(&[String]) -> bool + Send + Sync>),
}

/// One declarative rule mapping a parent shape to a set of definitions.
#[derive(Clone)]
pub struct LevelRule<D> {
    pub parent_generic_node_predicate: Option<GenericPredicate>,
    pub parent_instances_node_predicate: Option<InstancesPredicate>,
    /// Suppresses this rule when an earlier rule already matched
    /// (§4.1 "`onlyIfNotHandled: true`").
    pub only_if_not_handled: bool,
    pub definitions: D,
}

impl<D> LevelRule<D> {
    pub fn for_generic(predicate: GenericPredicate, definitions: D) -> Self {
        Self {
            parent_generic_node_predicate: Some(predicate),
            parent_instances_node_predicate: None,
            only_if_not_handled: false,
            definitions,
        }
    }

    pub fn for_class(class_name: impl Into<String>, definitions: D) -> Self {
        Self {
            parent_generic_node_predicate: None,
            parent_instances_node_predicate: Some(InstancesPredicate::ClassName(class_name.into())),
            only_if_not_handled: false,
            definitions,
        }
    }

    pub fn only_if_not_handled(mut self) -> Self {
        self.only_if_not_handled = true;
        self
    }
}

/// Evaluate whether `rule` matches `parent`, resolving polymorphic class
/// names through `inspector` (§4.1).
pub async fn matches<D>(
    rule: &LevelRule<D>,
    parent: &HierarchyLevelParent,
    inspector: &dyn MetadataInspector,
) -> Result<bool, MetadataError> {
    if let Some(predicate) = &rule.parent_generic_node_predicate {
        return Ok(parent.generic_id().is_some_and(|id| predicate(id)));
    }

    if let Some(predicate) = &rule.parent_instances_node_predicate {
        let classes: Vec<String> = parent
            .instance_keys()
            .map(|keys| keys.into_iter().map(|k| k.class_name).collect())
            .unwrap_or_default();
        if classes.is_empty() {
            return Ok(false);
        }
        return match predicate {
            InstancesPredicate::ClassName(base) => {
                for class in &classes {
                    if inspector.class_derives_from(class, base).await? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            InstancesPredicate::Predicate(f) => Ok(f(&classes)),
        };
    }

    // Neither predicate set matches the root, and only the root, so a
    // hierarchy level for the tree's top is reachable without specifying
    // either predicate.
    Ok(matches!(parent, HierarchyLevelParent::Root))
}

/// Select the rules that apply to `parent`, honoring `onlyIfNotHandled`:
/// once an earlier rule (in declaration order) matches, subsequent rules
/// marked `onlyIfNotHandled` are skipped (§4.1).
pub async fn select_matching<'a, D>(
    rules: &'a [LevelRule<D>],
    parent: &HierarchyLevelParent,
    inspector: &dyn MetadataInspector,
) -> Result<Vec<&'a LevelRule<D>>, MetadataError> {
    let mut handled = false;
    let mut matched = Vec::new();
    for rule in rules {
        if rule.only_if_not_handled && handled {
            continue;
        }
        if matches(rule, parent, inspector).await? {
            matched.push(rule);
            handled = true;
        }
    }
    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use htree_core::{InstanceKey, Node, NodeKey};
    use htree_metadata::{Class, Schema};
    use std::collections::BTreeSet;

    struct FixedInspector;

    #[async_trait]
    impl MetadataInspector for FixedInspector {
        async fn class_derives_from(
            &self,
            derived: &str,
            base: &str,
        ) -> Result<bool, MetadataError> {
            Ok(derived == base || (derived == "Test.Sub" && base == "Test.Base"))
        }

        async fn get_schema(&self, _name: &str) -> Result<Schema, MetadataError> {
            Ok(Schema {
                name: "Test".to_string(),
                classes: Vec::<Class>::new(),
            })
        }
    }

    fn instances_parent(class_name: &str) -> HierarchyLevelParent {
        let mut keys = BTreeSet::new();
        keys.insert(InstanceKey::new(class_name, "0x1"));
        HierarchyLevelParent::Node(Node::new_instance(
            NodeKey::Instances { instance_keys: keys },
            "parent",
            Vec::new(),
        ))
    }

    #[tokio::test]
    async fn class_name_predicate_is_polymorphic() {
        let rule = LevelRule::for_class("Test.Base", "defs");
        let parent = instances_parent("Test.Sub");
        assert!(matches(&rule, &parent, &FixedInspector).await.unwrap());
    }

    #[tokio::test]
    async fn only_if_not_handled_suppresses_later_rule() {
        let rules = vec![
            LevelRule::for_class("Test.Base", "first"),
            LevelRule::for_class("Test.Base", "second").only_if_not_handled(),
        ];
        let parent = instances_parent("Test.Sub");
        let matched = select_matching(&rules, &parent, &FixedInspector)
            .await
            .unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].definitions, "first");
    }

    #[tokio::test]
    async fn root_matches_rule_with_no_predicates() {
        let rule: LevelRule<&str> = LevelRule {
            parent_generic_node_predicate: None,
            parent_instances_node_predicate: None,
            only_if_not_handled: false,
            definitions: "root-defs",
        };
        assert!(matches(&rule, &HierarchyLevelParent::Root, &FixedInspector)
            .await
            .unwrap());
    }
}
