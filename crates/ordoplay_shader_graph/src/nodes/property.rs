// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property node.

use crate::property::{Property, PropertyError};
use crate::slot::{Slot, SlotDirection, SlotId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reads an exposed property of the enclosing graph
///
/// The node emits no code. Its output resolves to the property's reference
/// name, which is a function parameter inside a sub-graph and a uniform in
/// a root graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyNode {
    /// Guid of the property being read
    pub property: Uuid,
}

impl PropertyNode {
    /// Identity of the single output slot
    pub const OUTPUT: SlotId = SlotId(0);

    /// Create a node reading the property with `guid`
    pub fn new(property: Uuid) -> Self {
        Self { property }
    }

    /// Output slot carrying `property`
    pub fn output_slot(property: &Property) -> Result<Slot, PropertyError> {
        Ok(Slot::new(
            Self::OUTPUT,
            property.display_name.clone(),
            "Out",
            SlotDirection::Output,
            property.slot_type()?,
        ))
    }
}
