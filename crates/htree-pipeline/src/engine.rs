//! The recursive pipeline orchestrator (§4.4): ties parse, the per-node
//! definition hooks, hide-in-hierarchy recursion, merge-by-label,
//! determine-children, hide-if-no-children, grouping, sort and the
//! `ResultSetTooLarge`/`Unknown` info-node fallbacks into one hierarchy
//! level at a time.

use crate::grouping::{group_level, GroupingContext};
use crate::info;
use crate::stages::{hide_if_no_children, merge_by_label, needs_children_probe};
use futures::StreamExt;
use htree_core::{
    sort::natural_case_insensitive_cmp, Children, HierConfig, IdentifierPath, Node, NodeKey,
    ProcessingParams,
};
use htree_definition::{
    DefinitionError, GenericNodeTemplate, HierarchyDefinition, HierarchyLevelParent,
    HierarchyNodesDefinition,
};
use htree_filter::ClassCompatCache;
use htree_metadata::{MetadataError, MetadataInspector, PrimitiveValueFormatter};
use htree_query::{
    compile_filter, ExecutorError, FilterCompileError, GenericInstanceFilter, QueryExecutor,
    QueryRunner, Row, RowLimit, RunnerError,
};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),
    #[error(transparent)]
    FilterCompile(#[from] FilterCompileError),
    #[error(transparent)]
    Executor(#[from] ExecutorError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error("row could not be parsed: {0}")]
    RowParse(#[from] htree_definition::RowParseError),
}

/// Everything needed to produce one hierarchy level, threaded through the
/// recursive calls hide-in-hierarchy and determine-children make (§4.4, §4.6).
#[derive(Clone)]
pub struct LevelContext {
    pub row_limit: RowLimit,
    /// `false` once the provider was never configured with identifier
    /// paths at all — distinguishes "no filter configured" from "this
    /// path set narrowed to nothing" (§4.6).
    pub filtering_active: bool,
    pub filter_paths: Vec<IdentifierPath>,
    pub has_filter_target_ancestor: bool,
    pub depth: usize,
    /// Set while probing "does this parent have any child at all"
    /// (determine-children, stage 5): stage 3's hide-in-hierarchy splice
    /// stops issuing further recursive queries as soon as one hidden
    /// sibling (or batch) is found to have children (§4.4 stage 3
    /// "stopOnFirstChild").
    pub stop_on_first_child: bool,
}

impl LevelContext {
    pub fn root(row_limit: RowLimit, filter_paths: Vec<IdentifierPath>) -> Self {
        Self {
            row_limit,
            filtering_active: !filter_paths.is_empty(),
            filter_paths,
            has_filter_target_ancestor: false,
            depth: 0,
            stop_on_first_child: false,
        }
    }

    fn for_children(&self, node: &Node) -> Self {
        Self {
            row_limit: self.row_limit,
            filtering_active: self.filtering_active,
            filter_paths: node
                .filtering
                .filtered_children_identifier_paths
                .clone()
                .unwrap_or_default(),
            has_filter_target_ancestor: node.filtering.has_filter_target_ancestor
                || node.filtering.is_filter_target,
            depth: self.depth + 1,
            stop_on_first_child: self.stop_on_first_child,
        }
    }

    fn probe(&self, node: &Node) -> Self {
        let mut ctx = self.for_children(node);
        ctx.row_limit = RowLimit::Bounded(1);
        ctx.stop_on_first_child = true;
        ctx
    }
}

pub struct HierarchyEngine {
    executor: Arc<dyn QueryExecutor>,
    inspector: Arc<dyn MetadataInspector>,
    formatter: Arc<dyn PrimitiveValueFormatter>,
    definitions: Arc<dyn HierarchyDefinition>,
    compat: ClassCompatCache,
    config: HierConfig,
}

impl HierarchyEngine {
    pub fn new(
        executor: Arc<dyn QueryExecutor>,
        inspector: Arc<dyn MetadataInspector>,
        formatter: Arc<dyn PrimitiveValueFormatter>,
        definitions: Arc<dyn HierarchyDefinition>,
        config: HierConfig,
    ) -> Self {
        Self {
            executor,
            inspector,
            formatter,
            definitions,
            compat: ClassCompatCache::new(),
            config,
        }
    }

    /// The public entry point: produce one fully processed hierarchy level
    /// for `parent` (§4.4).
    pub async fn get_nodes(
        &self,
        parent: HierarchyLevelParent,
        instance_filter: Option<GenericInstanceFilter>,
        row_limit: RowLimit,
        filter_paths: Vec<IdentifierPath>,
    ) -> Result<Vec<Node>, PipelineError> {
        let ctx = LevelContext::root(row_limit, filter_paths);
        self.build_level(parent, instance_filter, ctx).await
    }

    fn build_level<'a>(
        &'a self,
        parent: HierarchyLevelParent,
        instance_filter: Option<GenericInstanceFilter>,
        ctx: LevelContext,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Vec<Node>, PipelineError>> + Send + 'a>,
    > {
        Box::pin(async move {
            let parent_id = parent_id_string(&parent);

            // Stage 1: parse — build the raw node list from every
            // generic-node template and instance-row query this level's
            // definitions declare.
            let defs = match self.definitions.define_hierarchy_level(&parent, instance_filter.as_ref()).await {
                Ok(defs) => defs,
                Err(err) => return Ok(vec![info::unknown_error(&parent_id, &err.to_string())]),
            };

            let mut nodes = Vec::new();
            let mut overflowed: Option<usize> = None;

            for def in defs {
                match def {
                    HierarchyNodesDefinition::GenericNode(template) => {
                        if let Some(node) = self.parse_generic(&parent, &ctx, template).await? {
                            nodes.push(node);
                        }
                    }
                    HierarchyNodesDefinition::InstanceNodesQuery {
                        full_class_name,
                        custom_where,
                        grouping,
                        processing_params,
                    } => {
                        let produced = self
                            .run_instance_query(
                                &parent,
                                &ctx,
                                &full_class_name,
                                custom_where.as_deref(),
                                grouping.as_ref(),
                                &processing_params,
                                instance_filter.as_ref(),
                            )
                            .await?;
                        match produced {
                            Ok(mut rows) => nodes.append(&mut rows),
                            Err(limit) => overflowed = Some(limit),
                        }
                    }
                }
            }

            // Stage 2: pre-process — per definition, run over every freshly
            // parsed node before it can be hidden, merged or grouped
            // (§4.4 stage 2).
            let nodes = apply_pre_process(nodes, self.definitions.as_ref());

            // Stage 3: hide-in-hierarchy recursion and splice. Consecutive
            // hidden siblings sharing the same instance class are batched
            // into one recursive call instead of one query per sibling, and
            // (while probing) the splice stops at the first batch found to
            // have children (§4.4 stage 3).
            let own_parent_keys = parent_child_keys(&parent);
            let mut spliced = Vec::with_capacity(nodes.len());
            let mut remaining = nodes.into_iter().peekable();
            while let Some(node) = remaining.next() {
                if !self.effective_hide_in_hierarchy(&node) {
                    spliced.push(node);
                    continue;
                }

                let mut batch = vec![node];
                while let Some(next) = remaining.peek() {
                    if self.effective_hide_in_hierarchy(next)
                        && same_batch_class(batch.last().expect("batch never empty"), next)
                    {
                        batch.push(remaining.next().expect("just peeked"));
                    } else {
                        break;
                    }
                }

                let merged_parent = merge_hidden_batch(batch);
                let child_ctx = ctx.for_children(&merged_parent);
                let mut children = self
                    .build_level(HierarchyLevelParent::Node(merged_parent), None, child_ctx)
                    .await?;
                strip_spliced_prefix(&mut children, own_parent_keys.len());

                let batch_has_children = !children.is_empty();
                spliced.append(&mut children);

                if ctx.stop_on_first_child && batch_has_children {
                    break;
                }
            }

            // Stage 4: merge-by-label.
            let mut nodes = merge_by_label(spliced, self.config.pipeline.yield_every_n_items).await;

            // Stage 5: determine-children, only where a hide-if-no-children
            // decision actually needs it (§4.4 stage 5).
            for node in &mut nodes {
                if needs_children_probe(&node.children) && node.processing_params.hide_if_no_children {
                    let probe_ctx = ctx.probe(node);
                    let probe_parent = HierarchyLevelParent::Node(node.clone());
                    let children = self.build_level(probe_parent, None, probe_ctx).await?;
                    node.children = Children::Known(!children.is_empty());
                }
            }

            // Stage 6: hide-if-no-children.
            let nodes = hide_if_no_children(nodes, self.config.pipeline.yield_every_n_items).await;

            // Stage 7: grouping.
            let grouping_ctx = GroupingContext {
                inspector: self.inspector.as_ref(),
                formatter: self.formatter.as_ref(),
            };
            let nodes = group_level(nodes, &parent, &grouping_ctx).await;

            // Stage 8: post-process — per definition, run over every node
            // produced for this level, including synthesized grouping nodes
            // (§4.4 stage 8).
            let mut nodes = apply_post_process(nodes, self.definitions.as_ref());

            // Stage 9: sort.
            sort_recursive(&mut nodes);

            // Stage 10: finalize — append the overflow info node, if any.
            if let Some(limit) = overflowed {
                nodes.push(info::result_set_too_large(&parent_id, limit));
            }

            Ok(nodes)
        })
    }

    async fn parse_generic(
        &self,
        parent: &HierarchyLevelParent,
        ctx: &LevelContext,
        template: GenericNodeTemplate,
    ) -> Result<Option<Node>, PipelineError> {
        if ctx.filtering_active
            && !htree_filter::generic_definition_matches(
                &ctx.filter_paths,
                &template.id,
                template.source.as_deref(),
            )
        {
            return Ok(None);
        }

        let key = match &template.source {
            Some(source) => NodeKey::generic_with_source(template.id.clone(), source.clone()),
            None => NodeKey::generic(template.id.clone()),
        };

        let mut node = Node::new_instance(key.clone(), template.label, parent_child_keys(parent));
        node.processing_params = template.processing_params;
        node.extended_data = template.extended_data;
        node.auto_expand = template.auto_expand;

        if ctx.filtering_active {
            let outcome = htree_filter::match_node(
                &ctx.filter_paths,
                ctx.has_filter_target_ancestor,
                &key,
                None,
                ctx.depth,
                &self.compat,
                self.inspector.as_ref(),
            )
            .await?;
            match outcome.filtering {
                None => return Ok(None),
                Some(filtering) => {
                    if filtering.auto_expand {
                        node.auto_expand = Some(true);
                    }
                    node.filtering = filtering;
                }
            }
        }

        Ok(Some(node))
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_instance_query(
        &self,
        parent: &HierarchyLevelParent,
        ctx: &LevelContext,
        full_class_name: &str,
        custom_where: Option<&str>,
        grouping: Option<&htree_core::GroupingParams>,
        definition_processing: &ProcessingParams,
        instance_filter: Option<&GenericInstanceFilter>,
    ) -> Result<Result<Vec<Node>, usize>, PipelineError> {
        let compiled = match instance_filter {
            Some(filter) => Some(compile_filter(filter, full_class_name, self.inspector.as_ref()).await?),
            None => None,
        };

        let filtering_cte = ctx
            .filtering_active
            .then(|| htree_filter::build_filtering_cte(&ctx.filter_paths, ctx.has_filter_target_ancestor));

        let query = htree_query::select::NodeSelectQueryFactory::build_with_where(
            full_class_name,
            grouping,
            compiled.as_ref(),
            filtering_cte,
            custom_where,
        );

        let runner = QueryRunner::new(self.executor.clone());
        let mut stream = match runner.run(query, ctx.row_limit).await {
            Ok(stream) => stream,
            Err(RunnerError::RowsLimitExceeded { limit }) => return Ok(Err(limit)),
            Err(RunnerError::Executor(e)) => return Err(e.into()),
        };

        let mut nodes = Vec::new();
        while let Some(row) = stream.next().await {
            match row {
                Ok(row) => {
                    if let Some(node) = self
                        .parse_and_match_row(parent, ctx, &row, definition_processing)
                        .await?
                    {
                        nodes.push(node);
                    }
                }
                Err(RunnerError::RowsLimitExceeded { limit }) => return Ok(Err(limit)),
                Err(RunnerError::Executor(e)) => return Err(e.into()),
            }
        }
        Ok(Ok(nodes))
    }

    async fn parse_and_match_row(
        &self,
        parent: &HierarchyLevelParent,
        ctx: &LevelContext,
        row: &Row,
        definition_processing: &ProcessingParams,
    ) -> Result<Option<Node>, PipelineError> {
        let mut node = match self.definitions.parse_node(row) {
            Some(node) => node,
            None => htree_definition::parse_row(row)?,
        };
        node.parent_keys = parent_child_keys(parent);
        merge_definition_processing(&mut node.processing_params, definition_processing);

        if ctx.filtering_active {
            let outcome = htree_filter::match_node(
                &ctx.filter_paths,
                ctx.has_filter_target_ancestor,
                &node.key,
                None,
                ctx.depth,
                &self.compat,
                self.inspector.as_ref(),
            )
            .await?;
            match outcome.filtering {
                None => return Ok(None),
                Some(filtering) => {
                    if filtering.auto_expand {
                        node.auto_expand = Some(true);
                    }
                    node.filtering = filtering;
                }
            }
        }

        Ok(Some(node))
    }

    /// A filter target whose definition also says `hideInHierarchy` is only
    /// spliced away while nothing above it has already been revealed;
    /// once an ancestor is a filter target, the leaf itself must still
    /// appear (§4.6 "Hidden targets").
    fn effective_hide_in_hierarchy(&self, node: &Node) -> bool {
        if !node.processing_params.hide_in_hierarchy {
            return false;
        }
        if node.filtering.is_filter_target {
            return htree_filter::should_hide_filtered_target(true, &node.filtering);
        }
        true
    }
}

fn merge_definition_processing(row_params: &mut ProcessingParams, def_params: &ProcessingParams) {
    row_params.hide_if_no_children |= def_params.hide_if_no_children;
    row_params.hide_in_hierarchy |= def_params.hide_in_hierarchy;
    if row_params.merge_by_label_id.is_none() {
        row_params.merge_by_label_id = def_params.merge_by_label_id.clone();
    }
    if row_params.grouping.is_none() {
        row_params.grouping = def_params.grouping.clone();
    }
}

fn parent_child_keys(parent: &HierarchyLevelParent) -> Vec<NodeKey> {
    match parent {
        HierarchyLevelParent::Root => Vec::new(),
        HierarchyLevelParent::Node(node) => node.child_parent_keys(),
    }
}

fn parent_id_string(parent: &HierarchyLevelParent) -> String {
    match parent.key() {
        None => "root".to_string(),
        Some(key) => serde_json::to_string(key).unwrap_or_else(|_| "unknown".to_string()),
    }
}

fn apply_pre_process(nodes: Vec<Node>, definitions: &dyn HierarchyDefinition) -> Vec<Node> {
    nodes
        .into_iter()
        .filter_map(|node| definitions.pre_process_node(node))
        .collect()
}

/// Runs over every node this level produced, including grouping nodes
/// synthesized at stage 7 and their nested sub-grouping children, since
/// those never pass through a hierarchy level of their own (§4.4 stage 8).
fn apply_post_process(nodes: Vec<Node>, definitions: &dyn HierarchyDefinition) -> Vec<Node> {
    let mut out = Vec::with_capacity(nodes.len());
    for mut node in nodes {
        if let Children::Nodes(children) = node.children {
            node.children = Children::Nodes(apply_post_process(children, definitions));
        }
        if let Some(node) = definitions.post_process_node(node) {
            out.push(node);
        }
    }
    out
}

/// Whether two hidden siblings may be batched into one recursive
/// hide-in-hierarchy query (§4.4 stage 3): both must be instance nodes of
/// the same class. Generic nodes, and instance nodes of differing
/// classes, never batch.
fn same_batch_class(a: &Node, b: &Node) -> bool {
    let a_class = a.key.instance_keys_iter().next().map(|k| &k.class_name);
    let b_class = b.key.instance_keys_iter().next().map(|k| &k.class_name);
    match (a_class, b_class) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Collapses a batch of consecutive same-class hidden siblings into the
/// single synthetic parent the recursive hide-in-hierarchy query runs
/// against; a batch of one is returned unchanged.
fn merge_hidden_batch(batch: Vec<Node>) -> Node {
    if batch.len() == 1 {
        return batch.into_iter().next().expect("batch has exactly one element");
    }
    let parent_keys = batch[0].parent_keys.clone();
    let mut merged_instance_keys = std::collections::BTreeSet::new();
    for node in &batch {
        merged_instance_keys.extend(node.key.instance_keys_iter().cloned());
    }
    let mut merged = Node::new_instance(
        NodeKey::Instances { instance_keys: merged_instance_keys },
        String::new(),
        parent_keys,
    );
    merged.processing_params.hide_in_hierarchy = true;
    merged
}

/// Removes the synthetic hidden batch's own key from each spliced
/// descendant's `parentKeys`, so the splice is invisible to callers (§3
/// invariant 1): the batch parent isn't a real ancestor, its children are.
fn strip_spliced_prefix(nodes: &mut [Node], own_len: usize) {
    for node in nodes.iter_mut() {
        if node.parent_keys.len() > own_len {
            node.parent_keys.remove(own_len);
        }
        if let Children::Nodes(children) = &mut node.children {
            strip_spliced_prefix(children, own_len);
        }
    }
}

fn sort_recursive(nodes: &mut [Node]) {
    nodes.sort_by(|a, b| natural_case_insensitive_cmp(&a.label, &b.label));
    for node in nodes.iter_mut() {
        if let Children::Nodes(children) = &mut node.children {
            sort_recursive(children);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use htree_core::InstanceKey;
    use htree_metadata::{Class, DefaultPrimitiveValueFormatter, Schema};
    use htree_query::{QueryOptions, Row as QRow};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedInspector;

    #[async_trait]
    impl MetadataInspector for FixedInspector {
        async fn class_derives_from(&self, derived: &str, base: &str) -> Result<bool, MetadataError> {
            Ok(derived == base)
        }

        async fn get_schema(&self, name: &str) -> Result<Schema, MetadataError> {
            Ok(Schema { name: name.to_string(), classes: Vec::<Class>::new() })
        }
    }

    fn widget_row(id: &str, label: &str) -> QRow {
        let mut map = BTreeMap::new();
        map.insert("FullClassName".to_string(), json!("S.Widget"));
        map.insert("ECInstanceId".to_string(), json!(id));
        map.insert("DisplayLabel".to_string(), json!(label));
        QRow(map)
    }

    struct RowsExecutor {
        rows: Vec<QRow>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl QueryExecutor for RowsExecutor {
        async fn create_query_reader(
            &self,
            _query: htree_query::Query,
            _opts: QueryOptions,
        ) -> Result<futures::stream::BoxStream<'static, Result<QRow, ExecutorError>>, ExecutorError>
        {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let rows = self.rows.clone();
            Ok(Box::pin(futures::stream::iter(rows.into_iter().map(Ok))))
        }
    }

    struct RootOnlyDefinitions;

    #[async_trait]
    impl HierarchyDefinition for RootOnlyDefinitions {
        async fn define_hierarchy_level(
            &self,
            parent: &HierarchyLevelParent,
            _instance_filter: Option<&GenericInstanceFilter>,
        ) -> Result<Vec<HierarchyNodesDefinition>, DefinitionError> {
            match parent {
                HierarchyLevelParent::Root => Ok(vec![HierarchyNodesDefinition::InstanceNodesQuery {
                    full_class_name: "S.Widget".to_string(),
                    custom_where: None,
                    grouping: None,
                    processing_params: ProcessingParams::default(),
                }]),
                HierarchyLevelParent::Node(_) => Ok(Vec::new()),
            }
        }
    }

    fn engine(rows: Vec<QRow>) -> HierarchyEngine {
        let executor: Arc<dyn QueryExecutor> =
            Arc::new(RowsExecutor { rows, calls: AtomicUsize::new(0) });
        HierarchyEngine::new(
            executor,
            Arc::new(FixedInspector),
            Arc::new(DefaultPrimitiveValueFormatter),
            Arc::new(RootOnlyDefinitions),
            HierConfig::default(),
        )
    }

    #[tokio::test]
    async fn s1_basic_level_is_naturally_sorted() {
        let e = engine(vec![widget_row("0x1", "beta"), widget_row("0x2", "alpha")]);
        let nodes = e
            .get_nodes(HierarchyLevelParent::Root, None, RowLimit::Unbounded, Vec::new())
            .await
            .unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].label, "alpha");
        assert_eq!(nodes[1].label, "beta");
    }

    #[tokio::test]
    async fn s5_row_limit_surfaces_as_info_node() {
        let e = engine(vec![
            widget_row("0x1", "a"),
            widget_row("0x2", "b"),
            widget_row("0x3", "c"),
        ]);
        let nodes = e
            .get_nodes(HierarchyLevelParent::Root, None, RowLimit::Bounded(2), Vec::new())
            .await
            .unwrap();
        assert!(nodes.iter().any(info::is_info_node));
    }

    struct WrapDefinitions;

    #[async_trait]
    impl HierarchyDefinition for WrapDefinitions {
        async fn define_hierarchy_level(
            &self,
            parent: &HierarchyLevelParent,
            _instance_filter: Option<&GenericInstanceFilter>,
        ) -> Result<Vec<HierarchyNodesDefinition>, DefinitionError> {
            match parent {
                HierarchyLevelParent::Root => {
                    let mut wrap = GenericNodeTemplate::new("wrap", "wrap");
                    wrap.processing_params.hide_in_hierarchy = true;
                    Ok(vec![HierarchyNodesDefinition::GenericNode(wrap)])
                }
                HierarchyLevelParent::Node(node) => match &node.key {
                    NodeKey::Generic { id, .. } if id == "wrap" => Ok(vec![
                        HierarchyNodesDefinition::GenericNode(GenericNodeTemplate::new("a", "a")),
                        HierarchyNodesDefinition::GenericNode(GenericNodeTemplate::new("b", "b")),
                    ]),
                    _ => Ok(Vec::new()),
                },
            }
        }
    }

    #[tokio::test]
    async fn s2_hide_in_hierarchy_splices_children_in_wraps_place() {
        let executor: Arc<dyn QueryExecutor> =
            Arc::new(RowsExecutor { rows: Vec::new(), calls: AtomicUsize::new(0) });
        let e = HierarchyEngine::new(
            executor,
            Arc::new(FixedInspector),
            Arc::new(DefaultPrimitiveValueFormatter),
            Arc::new(WrapDefinitions),
            HierConfig::default(),
        );
        let nodes = e
            .get_nodes(HierarchyLevelParent::Root, None, RowLimit::Unbounded, Vec::new())
            .await
            .unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].label, "a");
        assert_eq!(nodes[1].label, "b");
        assert!(nodes.iter().all(|n| n.parent_keys.is_empty()));
    }

    #[tokio::test]
    async fn instance_keys_round_trip_through_parsing() {
        let e = engine(vec![widget_row("0x1", "a")]);
        let nodes = e
            .get_nodes(HierarchyLevelParent::Root, None, RowLimit::Unbounded, Vec::new())
            .await
            .unwrap();
        let NodeKey::Instances { instance_keys } = &nodes[0].key else {
            panic!("expected instances key");
        };
        assert!(instance_keys.contains(&InstanceKey::new("S.Widget", "0x1")));
    }
}
