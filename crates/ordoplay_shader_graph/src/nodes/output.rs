// SPDX-License-Identifier: MIT OR Apache-2.0
//! Sub-graph output node.
//!
//! The output node has a variable number of `Vector4` input ports labelled
//! `Output N`. A port's identity is its 1-based position, so ports live in
//! the positional identity space and never collide with property slots.

use crate::codegen::{slot_value, GenerationContext};
use crate::node::Node;
use crate::slot::{Slot, SlotDirection, SlotId, SlotRegistry, SlotValueType};
use crate::writer::ShaderWriter;
use serde::{Deserialize, Serialize};

/// Marker for the node that declares a sub-graph's outputs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubGraphOutputNode;

impl SubGraphOutputNode {
    /// Append a port at position count + 1 and return that position
    pub fn add_port(slots: &mut SlotRegistry) -> u32 {
        let index = Self::port_count(slots) + 1;
        slots.add_slot(Slot::new(
            SlotId::positional(index),
            format!("Output {index}"),
            format!("Output{index}"),
            SlotDirection::Input,
            SlotValueType::Vector4,
        ));
        index
    }

    /// Remove the port at the highest position; no-op without ports
    pub fn remove_port(slots: &mut SlotRegistry) -> Option<Slot> {
        let index = Self::port_count(slots);
        if index == 0 {
            return None;
        }
        slots.remove_slot(SlotId::positional(index))
    }

    /// Number of ports
    pub fn port_count(slots: &SlotRegistry) -> u32 {
        u32::try_from(slots.input_slots().count()).unwrap_or(u32::MAX)
    }

    /// Ports, ascending by identity
    pub fn graph_outputs(slots: &SlotRegistry) -> impl Iterator<Item = &Slot> {
        slots.input_slots()
    }

    /// Copy each port's resolved input into the output variable of the same name
    pub fn emit_assignments(node: &Node, ctx: &GenerationContext<'_>, writer: &mut ShaderWriter) {
        for slot in Self::graph_outputs(&node.slots) {
            writer.add_line(format!(
                "{} = {};",
                slot.shader_output_name,
                slot_value(ctx, node, slot.id)
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_then_remove() {
        let mut slots = SlotRegistry::new();
        assert_eq!(SubGraphOutputNode::add_port(&mut slots), 1);
        assert_eq!(SubGraphOutputNode::add_port(&mut slots), 2);

        let removed = SubGraphOutputNode::remove_port(&mut slots).unwrap();
        assert_eq!(removed.display_name, "Output 2");

        let remaining: Vec<_> = SubGraphOutputNode::graph_outputs(&slots).map(|s| s.id).collect();
        assert_eq!(remaining, vec![SlotId::positional(1)]);
    }

    #[test]
    fn test_remove_without_ports() {
        let mut slots = SlotRegistry::new();
        assert!(SubGraphOutputNode::remove_port(&mut slots).is_none());
        assert!(slots.is_empty());
    }

    #[test]
    fn test_ports_are_vector4() {
        let mut slots = SlotRegistry::new();
        for _ in 0..3 {
            SubGraphOutputNode::add_port(&mut slots);
        }
        let ports: Vec<_> = SubGraphOutputNode::graph_outputs(&slots).collect();
        assert_eq!(ports.len(), 3);
        assert!(ports.iter().all(|s| s.value_type == SlotValueType::Vector4 && s.is_input()));
        assert_eq!(ports[2].shader_output_name, "Output3");
    }
}
