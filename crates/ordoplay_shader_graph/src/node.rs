// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the shader graph.

use crate::asset::{AssetHandle, AssetResolver};
use crate::nodes::{FunctionNode, PropertyNode, SubGraphNode, SubGraphOutputNode};
use crate::property::{Property, PropertyError};
use crate::requirements::{Capability, MayRequire, Requirement};
use crate::slot::{Slot, SlotError, SlotId, SlotRegistry};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Short hex form used in generated variable names
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a node does
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NodeKind {
    /// Calls a precompiled function
    Function(FunctionNode),
    /// Reads an exposed property
    Property(PropertyNode),
    /// Expands to a referenced sub-graph's function
    SubGraph(SubGraphNode),
    /// Declares the outputs of a sub-graph
    SubGraphOutput(SubGraphOutputNode),
}

/// A node instance in a shader graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Display name
    pub name: String,
    /// Whether the node takes part in code generation
    pub enabled: bool,
    /// Set by validation when the node cannot be generated
    #[serde(default)]
    pub has_error: bool,
    /// Set when the slot set changed since the last time the flag was cleared
    #[serde(skip)]
    pub dirty: bool,
    /// Position in the graph UI
    #[serde(default)]
    pub position: [f32; 2],
    /// Slots, ordered by identity
    pub slots: SlotRegistry,
    /// Node behaviour
    pub kind: NodeKind,
}

impl Node {
    /// Create a node with no slots
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: NodeId::new(),
            name: name.into(),
            enabled: true,
            has_error: false,
            dirty: false,
            position: [0.0, 0.0],
            slots: SlotRegistry::new(),
            kind,
        }
    }

    /// Create an empty sub-graph output node
    pub fn sub_graph_output() -> Self {
        Self::new("SubGraphOutputs", NodeKind::SubGraphOutput(SubGraphOutputNode))
    }

    /// Create a wrapper node and synchronise its slots with the referenced sub-graph
    pub fn sub_graph(handle: Option<AssetHandle>, assets: &dyn AssetResolver) -> Result<Self, SlotError> {
        let mut node = Self::new("Sub-graph", NodeKind::SubGraph(SubGraphNode::new(handle)));
        node.refresh(assets)?;
        node.dirty = false;
        Ok(node)
    }

    /// Create a node that reads `property`
    pub fn property(property: &Property) -> Result<Self, PropertyError> {
        let mut node = Self::new(property.display_name.clone(), NodeKind::Property(PropertyNode::new(property.guid)));
        node.slots.add_slot(PropertyNode::output_slot(property)?);
        Ok(node)
    }

    /// Set the position
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = [x, y];
        self
    }

    /// Add a slot, marking the node dirty
    pub fn add_slot(&mut self, slot: Slot) {
        self.slots.add_slot(slot);
        self.dirty = true;
    }

    /// Get a slot by identity
    pub fn slot(&self, id: SlotId) -> Option<&Slot> {
        self.slots.slot(id)
    }

    /// Input slots, ascending by identity
    pub fn input_slots(&self) -> impl Iterator<Item = &Slot> {
        self.slots.input_slots()
    }

    /// Output slots, ascending by identity
    pub fn output_slots(&self) -> impl Iterator<Item = &Slot> {
        self.slots.output_slots()
    }

    /// Wrapper state, if this is a sub-graph node
    pub fn as_sub_graph(&self) -> Option<&SubGraphNode> {
        match &self.kind {
            NodeKind::SubGraph(sub_graph) => Some(sub_graph),
            _ => None,
        }
    }

    /// Whether this node declares sub-graph outputs
    pub fn is_sub_graph_output(&self) -> bool {
        matches!(self.kind, NodeKind::SubGraphOutput(_))
    }

    /// Bind a wrapper node to another sub-graph
    ///
    /// Returns whether the slot set changed. Rebinding to the current handle
    /// is a no-op. Non-wrapper nodes are left untouched.
    pub fn set_sub_graph(&mut self, handle: Option<AssetHandle>, assets: &dyn AssetResolver) -> Result<bool, SlotError> {
        let NodeKind::SubGraph(sub_graph) = &mut self.kind else {
            return Ok(false);
        };
        if sub_graph.reference.handle() == handle {
            return Ok(false);
        }
        sub_graph.reference.set_handle(handle);
        let changed = sub_graph.sync_slots(&mut self.slots, assets)?;
        // Rebinding is a topological change even when the slots match
        self.dirty = true;
        Ok(changed)
    }

    /// Re-derive dynamic slots, the on-load / on-enable signal
    ///
    /// Returns whether the slot set changed.
    pub fn refresh(&mut self, assets: &dyn AssetResolver) -> Result<bool, SlotError> {
        let changed = match &mut self.kind {
            NodeKind::SubGraph(sub_graph) => sub_graph.sync_slots(&mut self.slots, assets)?,
            NodeKind::Function(_) | NodeKind::Property(_) | NodeKind::SubGraphOutput(_) => false,
        };
        if changed {
            self.dirty = true;
        }
        Ok(changed)
    }

    /// Append an output port; `None` unless this is a sub-graph output node
    pub fn add_output_port(&mut self) -> Option<u32> {
        if !self.is_sub_graph_output() {
            return None;
        }
        let index = SubGraphOutputNode::add_port(&mut self.slots);
        self.dirty = true;
        Some(index)
    }

    /// Remove the highest output port; `None` when there was nothing to remove
    pub fn remove_output_port(&mut self) -> Option<Slot> {
        if !self.is_sub_graph_output() {
            return None;
        }
        let removed = SubGraphOutputNode::remove_port(&mut self.slots)?;
        self.dirty = true;
        Some(removed)
    }

    /// Name of the local variable holding the value of `slot`
    pub fn variable_name_for_slot(&self, slot: SlotId) -> String {
        let slot_name = self
            .slots
            .slot(slot)
            .map_or_else(|| format!("Slot{}", slot.value()), |s| s.shader_output_name.clone());
        format!(
            "_{}_{}_{}",
            crate::codegen::hlsl_safe_name(&self.name),
            self.id.short(),
            slot_name
        )
    }
}

impl MayRequire for Node {
    fn requirement_within(
        &self,
        capability: Capability,
        assets: &dyn AssetResolver,
        expanding: &mut Vec<AssetHandle>,
    ) -> Requirement {
        match &self.kind {
            NodeKind::Function(function) => function.requirements.query(capability),
            NodeKind::SubGraph(sub_graph) => sub_graph.requirement_within(capability, assets, expanding),
            NodeKind::Property(_) | NodeKind::SubGraphOutput(_) => capability.neutral(),
        }
    }
}
