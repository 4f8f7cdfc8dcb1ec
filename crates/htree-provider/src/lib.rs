//! The Hierarchy Provider (§4.8): the public surface that orchestrates the
//! pipeline, the child-nodes cache and the `hierarchyChanged` notification,
//! plus a Provider Merger that combines several providers into one.

use async_trait::async_trait;
use futures::future::BoxFuture;
use htree_cache::HierarchyCache;
use htree_core::{sort::natural_case_insensitive_cmp, HierConfig, IdentifierPath, InstanceKey, Node};
use htree_definition::{HierarchyDefinition, HierarchyLevelParent};
use htree_metadata::{DefaultPrimitiveValueFormatter, MetadataInspector, PrimitiveValueFormatter};
use htree_pipeline::{HierarchyEngine, PipelineError};
use htree_query::{GenericInstanceFilter, QueryExecutor, RowLimit};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::sync::broadcast;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// One `getNodes`/`getNodeInstanceKeys` request (§4.8).
#[derive(Debug, Clone)]
pub struct GetNodesRequest {
    pub parent_node: HierarchyLevelParent,
    pub instance_filter: Option<GenericInstanceFilter>,
    pub hierarchy_level_size_limit: RowLimit,
    pub ignore_cache: bool,
}

impl GetNodesRequest {
    pub fn root() -> Self {
        Self {
            parent_node: HierarchyLevelParent::Root,
            instance_filter: None,
            hierarchy_level_size_limit: RowLimit::Unbounded,
            ignore_cache: false,
        }
    }

    pub fn for_parent(parent: Node) -> Self {
        Self {
            parent_node: HierarchyLevelParent::Node(parent),
            ..Self::root()
        }
    }

    fn for_child(&self, node: Node) -> Self {
        Self {
            parent_node: HierarchyLevelParent::Node(node),
            instance_filter: self.instance_filter.clone(),
            hierarchy_level_size_limit: self.hierarchy_level_size_limit,
            ignore_cache: self.ignore_cache,
        }
    }
}

/// What changed, carried on the `hierarchyChanged` notification (§4.8).
/// There is no debounce contract; every call to `set_formatter`/
/// `set_hierarchy_search` raises exactly one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HierarchyChange {
    Formatter,
    HierarchySearch,
}

/// Public surface consumers drive: fetch one level at a time, or walk the
/// whole subtree for instance keys (§4.8).
#[async_trait]
pub trait HierarchyProvider: Send + Sync {
    async fn get_nodes(&self, request: GetNodesRequest) -> Result<Vec<Node>, ProviderError>;

    /// Equivalent to walking [`Self::get_nodes`] recursively and, for
    /// instance and grouping nodes, yielding each instance key they
    /// represent. Grouping nodes already carry the union of their
    /// descendants' keys (§3 invariant 2), so their subtrees are never
    /// fetched just to answer this call.
    async fn get_node_instance_keys(
        &self,
        request: GetNodesRequest,
    ) -> Result<Vec<InstanceKey>, ProviderError>;

    /// `None` resets to the default formatter. Always clears the cache and
    /// raises exactly one [`HierarchyChange::Formatter`] notification.
    fn set_formatter(&self, formatter: Option<Arc<dyn PrimitiveValueFormatter>>);

    /// `None` clears any active filter overlay. Always clears the cache and
    /// raises exactly one [`HierarchyChange::HierarchySearch`] notification.
    fn set_hierarchy_search(&self, paths: Option<Vec<IdentifierPath>>);

    fn subscribe(&self) -> broadcast::Receiver<HierarchyChange>;

    fn dispose(&self) {}
}

/// The concrete provider: one pipeline plus its own cache, formatter and
/// filter-overlay state.
pub struct EngineHierarchyProvider {
    executor: Arc<dyn QueryExecutor>,
    inspector: Arc<dyn MetadataInspector>,
    definitions: Arc<dyn HierarchyDefinition>,
    config: HierConfig,
    cache: HierarchyCache,
    formatter: RwLock<Arc<dyn PrimitiveValueFormatter>>,
    search_paths: RwLock<Vec<IdentifierPath>>,
    changes: broadcast::Sender<HierarchyChange>,
}

impl EngineHierarchyProvider {
    pub fn new(
        executor: Arc<dyn QueryExecutor>,
        inspector: Arc<dyn MetadataInspector>,
        definitions: Arc<dyn HierarchyDefinition>,
        config: HierConfig,
    ) -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            cache: HierarchyCache::new(&config),
            executor,
            inspector,
            definitions,
            config,
            formatter: RwLock::new(Arc::new(DefaultPrimitiveValueFormatter)),
            search_paths: RwLock::new(Vec::new()),
            changes,
        }
    }

    fn current_formatter(&self) -> Arc<dyn PrimitiveValueFormatter> {
        self.formatter.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn current_search_paths(&self) -> Vec<IdentifierPath> {
        self.search_paths.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn collect_instance_keys<'a>(
        &'a self,
        nodes: Vec<Node>,
        request: &'a GetNodesRequest,
        out: &'a mut Vec<InstanceKey>,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            for node in nodes {
                if node.key.is_grouping() {
                    out.extend(node.grouped_instance_keys.iter().cloned());
                    continue;
                }
                out.extend(node.key.instance_keys_iter().cloned());

                if !node.children.has_children() && !node.children.is_unknown() {
                    continue;
                }
                let child_request = request.for_child(node);
                let children = self.get_nodes(child_request.clone()).await?;
                self.collect_instance_keys(children, &child_request, out).await?;
            }
            Ok(())
        })
    }
}

#[async_trait]
impl HierarchyProvider for EngineHierarchyProvider {
    async fn get_nodes(&self, request: GetNodesRequest) -> Result<Vec<Node>, ProviderError> {
        if let Some(cached) = self.cache.get(
            &request.parent_node,
            request.instance_filter.as_ref(),
            request.hierarchy_level_size_limit,
            request.ignore_cache,
        ) {
            return Ok(cached);
        }

        let engine = HierarchyEngine::new(
            self.executor.clone(),
            self.inspector.clone(),
            self.current_formatter(),
            self.definitions.clone(),
            self.config.clone(),
        );
        let nodes = engine
            .get_nodes(
                request.parent_node.clone(),
                request.instance_filter.clone(),
                request.hierarchy_level_size_limit,
                self.current_search_paths(),
            )
            .await?;

        self.cache.put(
            &request.parent_node,
            request.instance_filter.as_ref(),
            request.hierarchy_level_size_limit,
            nodes.clone(),
        );
        Ok(nodes)
    }

    async fn get_node_instance_keys(
        &self,
        request: GetNodesRequest,
    ) -> Result<Vec<InstanceKey>, ProviderError> {
        let nodes = self.get_nodes(request.clone()).await?;
        let mut keys = Vec::new();
        self.collect_instance_keys(nodes, &request, &mut keys).await?;
        Ok(keys)
    }

    fn set_formatter(&self, formatter: Option<Arc<dyn PrimitiveValueFormatter>>) {
        let formatter = formatter.unwrap_or_else(|| Arc::new(DefaultPrimitiveValueFormatter));
        *self.formatter.write().unwrap_or_else(|e| e.into_inner()) = formatter;
        self.cache.clear();
        let _ = self.changes.send(HierarchyChange::Formatter);
    }

    fn set_hierarchy_search(&self, paths: Option<Vec<IdentifierPath>>) {
        *self.search_paths.write().unwrap_or_else(|e| e.into_inner()) = paths.unwrap_or_default();
        self.cache.clear();
        let _ = self.changes.send(HierarchyChange::HierarchySearch);
    }

    fn subscribe(&self) -> broadcast::Receiver<HierarchyChange> {
        self.changes.subscribe()
    }
}

/// Combines several providers into one: `get_nodes` concatenates their
/// outputs and sorts by label, and `set_formatter`/`set_hierarchy_search`/
/// `dispose` propagate to every wrapped provider (§4.8).
///
/// Must be constructed from within a Tokio runtime — it spawns one
/// forwarding task per wrapped provider to relay `hierarchyChanged` onto
/// its own channel.
pub struct ProviderMerger {
    providers: Vec<Arc<dyn HierarchyProvider>>,
    changes: broadcast::Sender<HierarchyChange>,
}

impl ProviderMerger {
    pub fn new(providers: Vec<Arc<dyn HierarchyProvider>>) -> Self {
        let (changes, _) = broadcast::channel(16);
        for provider in &providers {
            let mut child_rx = provider.subscribe();
            let forward = changes.clone();
            tokio::spawn(async move {
                loop {
                    match child_rx.recv().await {
                        Ok(change) => {
                            let _ = forward.send(change);
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            });
        }
        Self { providers, changes }
    }
}

#[async_trait]
impl HierarchyProvider for ProviderMerger {
    async fn get_nodes(&self, request: GetNodesRequest) -> Result<Vec<Node>, ProviderError> {
        let mut merged = Vec::new();
        for provider in &self.providers {
            merged.extend(provider.get_nodes(request.clone()).await?);
        }
        merged.sort_by(|a, b| natural_case_insensitive_cmp(&a.label, &b.label));
        Ok(merged)
    }

    async fn get_node_instance_keys(
        &self,
        request: GetNodesRequest,
    ) -> Result<Vec<InstanceKey>, ProviderError> {
        let mut merged = Vec::new();
        for provider in &self.providers {
            merged.extend(provider.get_node_instance_keys(request.clone()).await?);
        }
        Ok(merged)
    }

    fn set_formatter(&self, formatter: Option<Arc<dyn PrimitiveValueFormatter>>) {
        for provider in &self.providers {
            provider.set_formatter(formatter.clone());
        }
    }

    fn set_hierarchy_search(&self, paths: Option<Vec<IdentifierPath>>) {
        for provider in &self.providers {
            provider.set_hierarchy_search(paths.clone());
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<HierarchyChange> {
        self.changes.subscribe()
    }

    fn dispose(&self) {
        for provider in &self.providers {
            provider.dispose();
        }
    }
}
