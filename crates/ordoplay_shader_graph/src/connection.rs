// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection (edge) definitions for the graph.

use crate::node::NodeId;
use crate::slot::SlotId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

/// A connection from an output slot to an input slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// Unique connection ID
    pub id: ConnectionId,
    /// Source node ID
    pub from_node: NodeId,
    /// Source slot
    pub from_slot: SlotId,
    /// Target node ID
    pub to_node: NodeId,
    /// Target slot
    pub to_slot: SlotId,
}

impl Connection {
    /// Create a new connection
    pub fn new(from_node: NodeId, from_slot: SlotId, to_node: NodeId, to_slot: SlotId) -> Self {
        Self {
            id: ConnectionId::new(),
            from_node,
            from_slot,
            to_node,
            to_slot,
        }
    }

    /// Check if this connection involves a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.from_node == node_id || self.to_node == node_id
    }

    /// Check if this connection ends at a specific input slot
    pub fn targets(&self, node_id: NodeId, slot: SlotId) -> bool {
        self.to_node == node_id && self.to_slot == slot
    }
}
