// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph validation.
//!
//! Validation runs before any code is emitted. Cyclic sub-graph references
//! and cyclic connections are fatal and reject the whole graph. Broken
//! wrapper nodes are only flagged: they are marked `has_error`, reported,
//! and generated as zero-valued stand-ins so the rest of the graph still
//! compiles.

use crate::asset::AssetResolver;
use crate::node::NodeId;
use crate::shader_graph::ShaderGraph;
use std::collections::HashSet;
use uuid::Uuid;

/// Fatal validation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// A sub-graph references itself, directly or through other sub-graphs
    #[error("Cyclic sub-graph reference: {}", chain.join(" -> "))]
    CyclicSubGraph {
        /// Graph names along the cycle, first and last being the same graph
        chain: Vec<String>,
    },

    /// The connections of a graph form a cycle
    #[error("Graph '{graph}' contains a cycle")]
    GraphCycle {
        /// Name of the cyclic graph
        graph: String,
    },
}

/// Non-fatal findings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    /// Nodes flagged with an error
    pub flagged: Vec<NodeId>,
    /// Human-readable warnings
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// Whether nothing was flagged or warned about
    pub fn is_clean(&self) -> bool {
        self.flagged.is_empty() && self.warnings.is_empty()
    }
}

/// Validate `graph` and everything it references, flagging broken wrapper nodes
pub fn validate_graph(graph: &mut ShaderGraph, assets: &dyn AssetResolver) -> Result<ValidationReport, ValidationError> {
    let mut stack = Vec::new();
    let mut checked = HashSet::new();
    check_cycles(graph, assets, &mut stack, &mut checked)?;

    let mut report = ValidationReport::default();
    let mut warned = HashSet::new();
    for node in graph.nodes_mut() {
        let Some(sub_graph) = node.as_sub_graph() else {
            continue;
        };
        let Some(handle) = sub_graph.reference.handle() else {
            node.has_error = false;
            continue;
        };

        let error = match sub_graph.reference.resolve(assets) {
            None => {
                report.warnings.push(format!("Node '{}' references a missing sub-graph {:?}", node.name, handle));
                true
            }
            Some(asset) => {
                if asset.graph.output_node().is_none() && warned.insert(asset.handle) {
                    report.warnings.push(format!("Sub-graph '{}' has no output node", asset.name));
                }
                contains_error(&asset.graph, assets)
            }
        };

        node.has_error = error;
        if error {
            tracing::warn!("Sub-graph node '{}' ({}) has errors", node.name, node.id);
            report.flagged.push(node.id);
        }
    }

    Ok(report)
}

/// Depth-first walk over sub-graph references, keyed by graph guid
fn check_cycles(
    graph: &ShaderGraph,
    assets: &dyn AssetResolver,
    stack: &mut Vec<(Uuid, String)>,
    checked: &mut HashSet<Uuid>,
) -> Result<(), ValidationError> {
    if let Some(start) = stack.iter().position(|(guid, _)| *guid == graph.guid) {
        let mut chain: Vec<String> = stack[start..].iter().map(|(_, name)| name.clone()).collect();
        chain.push(graph.name.clone());
        tracing::error!("Cyclic sub-graph reference: {}", chain.join(" -> "));
        return Err(ValidationError::CyclicSubGraph { chain });
    }
    if checked.contains(&graph.guid) {
        return Ok(());
    }
    if graph.graph().topological_order().is_err() {
        return Err(ValidationError::GraphCycle {
            graph: graph.name.clone(),
        });
    }

    stack.push((graph.guid, graph.name.clone()));
    for (_, handle) in graph.referenced_sub_graphs() {
        let Some(asset) = assets.resolve(handle) else {
            continue;
        };
        check_cycles(&asset.graph, assets, stack, checked)?;
    }
    stack.pop();
    checked.insert(graph.guid);
    Ok(())
}

/// Whether an active node of `graph`, or of a sub-graph it expands, is broken
fn contains_error(graph: &ShaderGraph, assets: &dyn AssetResolver) -> bool {
    graph.active_nodes().into_iter().any(|node| {
        if node.has_error {
            return true;
        }
        let Some(sub_graph) = node.as_sub_graph() else {
            return false;
        };
        match (sub_graph.reference.handle(), sub_graph.reference.resolve(assets)) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(_), Some(asset)) => contains_error(&asset.graph, assets),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{AssetHandle, AssetStore, SubGraphAsset};
    use crate::node::Node;

    #[test]
    fn test_self_reference_is_rejected() {
        let handle = AssetHandle::new();
        let mut graph = ShaderGraph::new_sub_graph("Loop");
        let mut store = AssetStore::new();
        graph.add_node(Node::sub_graph(Some(handle), &store).unwrap());
        store.insert(SubGraphAsset::new("Loop", graph.clone()).with_handle(handle));

        let err = validate_graph(&mut graph, &store).unwrap_err();
        assert_eq!(
            err,
            ValidationError::CyclicSubGraph {
                chain: vec!["Loop".to_string(), "Loop".to_string()]
            }
        );
    }

    #[test]
    fn test_missing_sub_graph_is_flagged() {
        let store = AssetStore::new();
        let mut graph = ShaderGraph::new("Root");
        let broken = graph.add_node(Node::sub_graph(Some(AssetHandle::new()), &store).unwrap());
        let unbound = graph.add_node(Node::sub_graph(None, &store).unwrap());

        let report = validate_graph(&mut graph, &store).unwrap();
        assert_eq!(report.flagged, vec![broken]);
        assert_eq!(report.warnings.len(), 1);
        assert!(graph.node(broken).unwrap().has_error);
        assert!(!graph.node(unbound).unwrap().has_error);
    }

    #[test]
    fn test_nested_error_propagates() {
        let mut store = AssetStore::new();
        let mut inner = ShaderGraph::new_sub_graph("Inner");
        inner.add_node(Node::sub_graph(Some(AssetHandle::new()), &store).unwrap());
        let inner = store.insert(SubGraphAsset::new("Inner", inner));

        let mut root = ShaderGraph::new("Root");
        let wrapper = root.add_node(Node::sub_graph(Some(inner.handle), &store).unwrap());

        let report = validate_graph(&mut root, &store).unwrap();
        assert_eq!(report.flagged, vec![wrapper]);
    }

    #[test]
    fn test_missing_output_node_warns_once() {
        let mut store = AssetStore::new();
        let bare = store.insert(SubGraphAsset::new("Bare", ShaderGraph::new("Bare")));

        let mut root = ShaderGraph::new("Root");
        root.add_node(Node::sub_graph(Some(bare.handle), &store).unwrap());
        root.add_node(Node::sub_graph(Some(bare.handle), &store).unwrap());

        let report = validate_graph(&mut root, &store).unwrap();
        assert!(report.flagged.is_empty());
        assert_eq!(report.warnings, vec!["Sub-graph 'Bare' has no output node".to_string()]);
    }
}
