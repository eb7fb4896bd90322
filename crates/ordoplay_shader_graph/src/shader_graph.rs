// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shader graphs and sub-graph definitions.
//!
//! A [`ShaderGraph`] is a [`Graph`] plus the properties it exposes. A
//! sub-graph additionally owns exactly one output node whose input ports
//! define the values the sub-graph exports.

use crate::asset::{AssetHandle, AssetResolver};
use crate::connection::ConnectionId;
use crate::graph::{ConnectionError, Graph};
use crate::node::{Node, NodeId};
use crate::nodes::SubGraphOutputNode;
use crate::property::{Property, PropertyError};
use crate::slot::{Slot, SlotError, SlotId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A shader graph or sub-graph definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShaderGraph {
    /// Globally unique graph id
    pub guid: Uuid,
    /// Graph name
    pub name: String,
    graph: Graph,
    properties: Vec<Property>,
    output_node: Option<NodeId>,
}

impl ShaderGraph {
    /// Create a root graph without an output node
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            guid: Uuid::new_v4(),
            name: name.into(),
            graph: Graph::new(),
            properties: Vec::new(),
            output_node: None,
        }
    }

    /// Create a sub-graph with an empty output node
    pub fn new_sub_graph(name: impl Into<String>) -> Self {
        let mut graph = Self::new(name);
        let output = graph.graph.add_node(Node::sub_graph_output());
        graph.output_node = Some(output);
        graph
    }

    /// Underlying node graph
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Add a node
    pub fn add_node(&mut self, node: Node) -> NodeId {
        self.graph.add_node(node)
    }

    /// Remove a node and its connections; the output node cannot be removed
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        if self.output_node == Some(node_id) {
            return None;
        }
        self.graph.remove_node(node_id)
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.graph.node(node_id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.graph.node_mut(node_id)
    }

    /// All nodes, in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.nodes()
    }

    /// All nodes, mutably
    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.graph.nodes_mut()
    }

    /// Connect an output slot to an input slot
    pub fn connect(
        &mut self,
        from_node: NodeId,
        from_slot: SlotId,
        to_node: NodeId,
        to_slot: SlotId,
    ) -> Result<ConnectionId, ConnectionError> {
        self.graph.connect(from_node, from_slot, to_node, to_slot)
    }

    /// Enabled nodes, sources first
    ///
    /// Cyclic graphs are rejected by validation; should one get here anyway
    /// the nodes are returned in insertion order.
    pub fn active_nodes(&self) -> Vec<&Node> {
        match self.graph.topological_order() {
            Ok(order) => order
                .into_iter()
                .filter_map(|id| self.graph.node(id))
                .filter(|n| n.enabled)
                .collect(),
            Err(err) => {
                tracing::warn!("{} in '{}', using insertion order", err, self.name);
                self.graph.nodes().filter(|n| n.enabled).collect()
            }
        }
    }

    /// Exposed properties, in declaration order
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// Get a property by guid
    pub fn property(&self, guid: Uuid) -> Option<&Property> {
        self.properties.iter().find(|p| p.guid == guid)
    }

    /// Expose a property; its kind must be representable as a slot
    pub fn add_property(&mut self, property: Property) -> Result<Uuid, PropertyError> {
        property.slot_type()?;
        let guid = property.guid;
        self.properties.push(property);
        Ok(guid)
    }

    /// Remove a property and every node reading it
    pub fn remove_property(&mut self, guid: Uuid) -> Option<Property> {
        let index = self.properties.iter().position(|p| p.guid == guid)?;
        let readers: Vec<NodeId> = self
            .graph
            .nodes()
            .filter(|n| matches!(&n.kind, crate::node::NodeKind::Property(p) if p.property == guid))
            .map(|n| n.id)
            .collect();
        for reader in readers {
            self.graph.remove_node(reader);
        }
        Some(self.properties.remove(index))
    }

    /// The output node, if this is a sub-graph
    pub fn output_node(&self) -> Option<&Node> {
        self.graph.node(self.output_node?)
    }

    /// The output node, mutably
    pub fn output_node_mut(&mut self) -> Option<&mut Node> {
        self.graph.node_mut(self.output_node?)
    }

    /// ID of the output node
    pub fn output_node_id(&self) -> Option<NodeId> {
        self.output_node
    }

    /// Declared outputs, ascending by identity; empty without an output node
    pub fn graph_outputs(&self) -> impl Iterator<Item = &Slot> {
        self.output_node()
            .into_iter()
            .flat_map(|node| SubGraphOutputNode::graph_outputs(&node.slots))
    }

    /// Append an output port to the output node
    pub fn add_output(&mut self) -> Option<u32> {
        self.output_node_mut()?.add_output_port()
    }

    /// Remove the highest output port and the connections into it
    pub fn remove_output(&mut self) -> Option<Slot> {
        let removed = self.output_node_mut()?.remove_output_port()?;
        self.graph.prune_connections();
        Some(removed)
    }

    /// Sub-graphs referenced by wrapper nodes of this graph, enabled or not
    pub fn referenced_sub_graphs(&self) -> impl Iterator<Item = (NodeId, AssetHandle)> + '_ {
        self.graph
            .nodes()
            .filter_map(|n| Some((n.id, n.as_sub_graph()?.reference.handle()?)))
    }

    /// Bind a wrapper node to a sub-graph and drop connections to vanished slots
    pub fn set_sub_graph(
        &mut self,
        node_id: NodeId,
        handle: Option<AssetHandle>,
        assets: &dyn AssetResolver,
    ) -> Result<bool, SlotError> {
        let Some(node) = self.graph.node_mut(node_id) else {
            return Ok(false);
        };
        let changed = node.set_sub_graph(handle, assets)?;
        if changed {
            self.graph.prune_connections();
        }
        Ok(changed)
    }

    /// Refresh every wrapper node, then drop connections to vanished slots
    ///
    /// Returns the number of nodes whose slot set changed.
    pub fn refresh_sub_graph_nodes(&mut self, assets: &dyn AssetResolver) -> Result<usize, SlotError> {
        let mut changed = 0;
        for node in self.graph.nodes_mut() {
            if node.refresh(assets)? {
                changed += 1;
            }
        }
        if changed > 0 {
            self.graph.prune_connections();
            tracing::debug!("Refreshed {} sub-graph node(s) in '{}'", changed, self.name);
        }
        Ok(changed)
    }
}
