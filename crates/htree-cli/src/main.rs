//! CLI binary for the hierarchy engine: drives `getNodes`/`getNodeInstanceKeys`
//! against the in-memory "Warehouse" fixture from the terminal, a way to
//! exercise the engine without a UI.

use anyhow::Result;
use clap::{Parser, Subcommand};
use htree_cli::fixture::{FixtureDefinitions, FixtureExecutor, FixtureInspector};
use htree_core::{Children, HierConfig, Node, NodeKey};
use htree_provider::{EngineHierarchyProvider, GetNodesRequest, HierarchyProvider};
use htree_query::RowLimit;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "htree", about = "Hierarchy engine demo CLI")]
struct Cli {
    /// Per-hierarchy-level row limit (defaults to unbounded)
    #[arg(long, global = true)]
    limit: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the full tree rooted at the top level
    Tree,
    /// Print every instance key reachable from the top level
    Keys,
}

fn provider(config: HierConfig) -> EngineHierarchyProvider {
    EngineHierarchyProvider::new(
        Arc::new(FixtureExecutor),
        Arc::new(FixtureInspector),
        Arc::new(FixtureDefinitions),
        config,
    )
}

fn row_limit(limit: Option<usize>) -> RowLimit {
    match limit {
        Some(n) => RowLimit::Bounded(n),
        None => RowLimit::Unbounded,
    }
}

/// Prints one hierarchy level and recurses: grouping nodes already carry
/// their materialized `Children::Nodes` (§4.5), while instance/generic
/// nodes only know whether they *have* children and must be asked again
/// (§4.8 "walking `getNodes` recursively").
fn print_tree<'a>(
    provider: &'a EngineHierarchyProvider,
    nodes: &'a [Node],
    depth: usize,
    limit: RowLimit,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + 'a>> {
    Box::pin(async move {
        for node in nodes {
            println!("{}{} [{}]", "  ".repeat(depth), node.label, describe_key(&node.key));
            match &node.children {
                Children::Nodes(children) => {
                    print_tree(provider, children, depth + 1, limit).await?;
                }
                Children::Unknown | Children::Known(true) => {
                    let mut request = GetNodesRequest::for_parent(node.clone());
                    request.hierarchy_level_size_limit = limit;
                    let children = provider.get_nodes(request).await?;
                    if !children.is_empty() {
                        print_tree(provider, &children, depth + 1, limit).await?;
                    }
                }
                Children::Known(false) => {}
            }
        }
        Ok(())
    })
}

fn describe_key(key: &NodeKey) -> String {
    match key {
        NodeKey::Generic { id, .. } => format!("generic:{id}"),
        NodeKey::Instances { instance_keys } => format!(
            "instances:{}",
            instance_keys
                .iter()
                .map(|k| format!("{}:{}", k.class_name, k.id))
                .collect::<Vec<_>>()
                .join(",")
        ),
        NodeKey::ClassGrouping { class_name } => format!("class-group:{class_name}"),
        NodeKey::LabelGrouping { label, .. } => format!("label-group:{label}"),
        NodeKey::PropertyValueGrouping { formatted_property_value, .. } => {
            format!("property-group:{formatted_property_value}")
        }
        NodeKey::PropertyRangeGrouping { from_value, to_value, .. } => {
            format!("property-range:{from_value}-{to_value}")
        }
        NodeKey::PropertyOtherGrouping { .. } => "property-other".to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = HierConfig::default();
    let provider = provider(config);

    let limit = row_limit(cli.limit);
    let mut request = GetNodesRequest::root();
    request.hierarchy_level_size_limit = limit;

    match cli.command {
        Commands::Tree => {
            let nodes = provider.get_nodes(request).await?;
            print_tree(&provider, &nodes, 0, limit).await?;
        }
        Commands::Keys => {
            let keys = provider.get_node_instance_keys(request).await?;
            for key in keys {
                println!("{}:{}", key.class_name, key.id);
            }
        }
    }

    Ok(())
}
