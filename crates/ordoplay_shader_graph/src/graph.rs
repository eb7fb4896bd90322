// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes and connections.

use crate::connection::{Connection, ConnectionId};
use crate::node::{Node, NodeId};
use crate::slot::{SlotDirection, SlotId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Nodes and the connections between their slots
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Graph {
    /// Nodes in the graph
    nodes: IndexMap<NodeId, Node>,
    /// Connections between nodes
    connections: IndexMap<ConnectionId, Connection>,
}

impl Graph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node to the graph
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id;
        self.nodes.insert(id, node);
        id
    }

    /// Remove a node and its connections
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        self.connections.retain(|_, c| !c.involves_node(node_id));
        self.nodes.shift_remove(&node_id)
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// All nodes, in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// All nodes, mutably
    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.values_mut()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Connect an output slot to an input slot
    pub fn connect(
        &mut self,
        from_node: NodeId,
        from_slot: SlotId,
        to_node: NodeId,
        to_slot: SlotId,
    ) -> Result<ConnectionId, ConnectionError> {
        let source_node = self.nodes.get(&from_node).ok_or(ConnectionError::NodeNotFound(from_node))?;
        let target_node = self.nodes.get(&to_node).ok_or(ConnectionError::NodeNotFound(to_node))?;

        let source = source_node
            .slot(from_slot)
            .ok_or(ConnectionError::SlotNotFound(from_node, from_slot))?;
        let target = target_node
            .slot(to_slot)
            .ok_or(ConnectionError::SlotNotFound(to_node, to_slot))?;

        if source.direction != SlotDirection::Output || target.direction != SlotDirection::Input {
            return Err(ConnectionError::WrongDirection);
        }
        if !source.value_type.can_connect_to(&target.value_type) {
            return Err(ConnectionError::IncompatibleSlots);
        }
        if from_node == to_node {
            return Err(ConnectionError::SelfLoop);
        }
        if self.connections.values().any(|c| c.targets(to_node, to_slot)) {
            return Err(ConnectionError::SlotAlreadyConnected(to_node, to_slot));
        }
        // The new edge closes a cycle if the source already depends on the target
        if self.depends_on(from_node, to_node) {
            return Err(ConnectionError::WouldCreateCycle);
        }

        let connection = Connection::new(from_node, from_slot, to_node, to_slot);
        let id = connection.id;
        self.connections.insert(id, connection);
        Ok(id)
    }

    /// Get all connections
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// The connection feeding an input slot, if any
    pub fn connection_to(&self, node_id: NodeId, slot: SlotId) -> Option<&Connection> {
        self.connections.values().find(|c| c.targets(node_id, slot))
    }

    /// Get connections involving a node
    pub fn connections_for_node(&self, node_id: NodeId) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(move |c| c.involves_node(node_id))
    }

    /// Get the number of connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Remove connections whose endpoint node or slot no longer exists
    ///
    /// Returns the number of removed connections.
    pub fn prune_connections(&mut self) -> usize {
        let nodes = &self.nodes;
        let before = self.connections.len();
        self.connections.retain(|_, c| {
            let from = nodes.get(&c.from_node).and_then(|n| n.slot(c.from_slot));
            let to = nodes.get(&c.to_node).and_then(|n| n.slot(c.to_slot));
            from.is_some_and(|s| s.is_output()) && to.is_some_and(|s| s.is_input())
        });
        let removed = before - self.connections.len();
        if removed > 0 {
            tracing::debug!("Pruned {} dangling connection(s)", removed);
        }
        removed
    }

    /// Whether `node_id` reads, directly or transitively, from `dependency`
    pub fn depends_on(&self, node_id: NodeId, dependency: NodeId) -> bool {
        let mut stack = vec![node_id];
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            if current == dependency {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            stack.extend(
                self.connections
                    .values()
                    .filter(|c| c.to_node == current)
                    .map(|c| c.from_node),
            );
        }
        false
    }

    /// Get nodes in dependency order, sources first
    pub fn topological_order(&self) -> Result<Vec<NodeId>, CycleError> {
        let mut visited = HashSet::new();
        let mut temp_mark = HashSet::new();
        let mut order = Vec::new();

        for node_id in self.nodes.keys() {
            if !visited.contains(node_id) {
                self.visit(*node_id, &mut visited, &mut temp_mark, &mut order)?;
            }
        }

        Ok(order)
    }

    fn visit(
        &self,
        node_id: NodeId,
        visited: &mut HashSet<NodeId>,
        temp_mark: &mut HashSet<NodeId>,
        order: &mut Vec<NodeId>,
    ) -> Result<(), CycleError> {
        if temp_mark.contains(&node_id) {
            return Err(CycleError);
        }
        if visited.contains(&node_id) {
            return Ok(());
        }

        temp_mark.insert(node_id);

        // Visit all nodes that this node depends on
        for connection in self.connections_for_node(node_id) {
            if connection.to_node == node_id {
                self.visit(connection.from_node, visited, temp_mark, order)?;
            }
        }

        temp_mark.remove(&node_id);
        visited.insert(node_id);
        order.push(node_id);

        Ok(())
    }
}

/// Error when creating a connection
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConnectionError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Slot not found
    #[error("Slot {1} not found on node {0}")]
    SlotNotFound(NodeId, SlotId),

    /// Connections run from an output to an input
    #[error("Connections must run from an output slot to an input slot")]
    WrongDirection,

    /// Incompatible slot types
    #[error("Incompatible slot types")]
    IncompatibleSlots,

    /// Input slot is already connected
    #[error("Slot {1} on node {0} is already connected")]
    SlotAlreadyConnected(NodeId, SlotId),

    /// Self-loop not allowed
    #[error("Self-loop not allowed")]
    SelfLoop,

    /// The connection would make the graph cyclic
    #[error("Connection would create a cycle")]
    WouldCreateCycle,
}

/// Error when graph contains a cycle
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Graph contains a cycle")]
pub struct CycleError;
