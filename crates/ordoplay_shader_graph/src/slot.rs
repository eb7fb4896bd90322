// SPDX-License-Identifier: MIT OR Apache-2.0
//! Slot definitions for node inputs/outputs.
//!
//! A slot's identity is a [`SlotId`]. Two identity spaces share the type:
//! positional ids (output ports, fixed node templates) keep the top bit
//! clear, ids derived from a property guid always have it set. A node can
//! therefore mix both kinds of slot without the two spaces colliding.

use crate::property::PropertyError;
use crate::settings::Precision;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use uuid::Uuid;

const GUID_SPACE: u64 = 1 << 63;

/// Identity of a slot, unique within its node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotId(pub u64);

impl SlotId {
    /// Identity for a slot addressed by position (1-based output ports, template slots)
    pub fn positional(index: u32) -> Self {
        Self(u64::from(index))
    }

    /// Identity derived from a property guid
    ///
    /// The fold is deterministic, so the same guid always yields the same
    /// slot and existing connections survive a slot refresh.
    pub fn from_guid(guid: Uuid) -> Self {
        let (high, low) = guid.as_u64_pair();
        Self((high ^ low.rotate_left(29)) | GUID_SPACE)
    }

    /// Whether this identity belongs to the positional space
    pub fn is_positional(&self) -> bool {
        self.0 & GUID_SPACE == 0
    }

    /// Raw identity value
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_positional() {
            write!(f, "#{}", self.0)
        } else {
            write!(f, "#{:016x}", self.0)
        }
    }
}

/// Slot direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotDirection {
    /// Input slot
    Input,
    /// Output slot
    Output,
}

/// Reference to a texture or cubemap resource bound as a default
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextureRef(pub String);

/// Value type carried by a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotValueType {
    /// Scalar
    Vector1,
    /// 2D vector
    Vector2,
    /// 3D vector
    Vector3,
    /// 4D vector / color
    Vector4,
    /// 2x2 matrix
    Matrix2,
    /// 3x3 matrix
    Matrix3,
    /// 4x4 matrix
    Matrix4,
    /// 2D texture with its sampler
    Texture2D,
    /// Cubemap texture with its sampler
    Cubemap,
}

impl SlotValueType {
    /// Shader type keyword for this value type
    pub fn shader_type(&self, precision: Precision) -> String {
        let p = precision.as_str();
        match self {
            Self::Vector1 => p.to_string(),
            Self::Vector2 => format!("{p}2"),
            Self::Vector3 => format!("{p}3"),
            Self::Vector4 => format!("{p}4"),
            Self::Matrix2 => format!("{p}2x2"),
            Self::Matrix3 => format!("{p}3x3"),
            Self::Matrix4 => format!("{p}4x4"),
            Self::Texture2D => "Texture2D".to_string(),
            Self::Cubemap => "TextureCube".to_string(),
        }
    }

    /// Whether values of this type are bound as a texture + sampler pair
    pub fn is_texture(&self) -> bool {
        matches!(self, Self::Texture2D | Self::Cubemap)
    }

    /// Number of vector components, `None` for matrices and textures
    pub fn vector_components(&self) -> Option<usize> {
        match self {
            Self::Vector1 => Some(1),
            Self::Vector2 => Some(2),
            Self::Vector3 => Some(3),
            Self::Vector4 => Some(4),
            _ => None,
        }
    }

    /// Zero value for this type
    pub fn zero(&self) -> SlotValue {
        match self {
            Self::Vector1 => SlotValue::Vector1(0.0),
            Self::Vector2 => SlotValue::Vector2([0.0; 2]),
            Self::Vector3 => SlotValue::Vector3([0.0; 3]),
            Self::Vector4 => SlotValue::Vector4([0.0; 4]),
            Self::Matrix2 => SlotValue::Matrix2([[0.0; 2]; 2]),
            Self::Matrix3 => SlotValue::Matrix3([[0.0; 3]; 3]),
            Self::Matrix4 => SlotValue::Matrix4([[0.0; 4]; 4]),
            Self::Texture2D => SlotValue::Texture2D(None),
            Self::Cubemap => SlotValue::Cubemap(None),
        }
    }

    /// Check if an output of this type can feed an input of `other`
    pub fn can_connect_to(&self, other: &SlotValueType) -> bool {
        if self == other {
            return true;
        }

        // Scalars splat, narrower vectors are padded, wider ones truncated
        self.vector_components().is_some() && other.vector_components().is_some()
    }

    /// Wrap `expression` so a value of this type reads as `target`
    pub fn convert_expression(&self, expression: &str, target: SlotValueType, precision: Precision) -> String {
        match (self.vector_components(), target.vector_components()) {
            (Some(from), Some(to)) if from > 1 && from < to => {
                let padding = ", 0".repeat(to - from);
                format!("{}({expression}{padding})", target.shader_type(precision))
            }
            (Some(from), Some(to)) if from > to => format!("{expression}.{}", &"xyzw"[..to]),
            _ => expression.to_string(),
        }
    }
}

/// Value stored in a slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SlotValue {
    /// Scalar
    Vector1(f32),
    /// 2D vector
    Vector2([f32; 2]),
    /// 3D vector
    Vector3([f32; 3]),
    /// 4D vector
    Vector4([f32; 4]),
    /// 2x2 matrix, row major
    Matrix2([[f32; 2]; 2]),
    /// 3x3 matrix, row major
    Matrix3([[f32; 3]; 3]),
    /// 4x4 matrix, row major
    Matrix4([[f32; 4]; 4]),
    /// Default 2D texture
    Texture2D(Option<TextureRef>),
    /// Default cubemap
    Cubemap(Option<TextureRef>),
}

impl SlotValue {
    /// Value type of this value
    pub fn value_type(&self) -> SlotValueType {
        match self {
            Self::Vector1(_) => SlotValueType::Vector1,
            Self::Vector2(_) => SlotValueType::Vector2,
            Self::Vector3(_) => SlotValueType::Vector3,
            Self::Vector4(_) => SlotValueType::Vector4,
            Self::Matrix2(_) => SlotValueType::Matrix2,
            Self::Matrix3(_) => SlotValueType::Matrix3,
            Self::Matrix4(_) => SlotValueType::Matrix4,
            Self::Texture2D(_) => SlotValueType::Texture2D,
            Self::Cubemap(_) => SlotValueType::Cubemap,
        }
    }

    /// Bound texture resource, if this is a texture value
    pub fn texture(&self) -> Option<&TextureRef> {
        match self {
            Self::Texture2D(texture) | Self::Cubemap(texture) => texture.as_ref(),
            _ => None,
        }
    }

    /// Shader literal for this value; textures have no literal form
    pub fn to_shader_literal(&self, precision: Precision) -> Option<String> {
        let ty = self.value_type().shader_type(precision);
        let literal = match self {
            Self::Vector1(v) => number(*v),
            Self::Vector2(v) => format!("{ty}({})", join(v.iter().copied())),
            Self::Vector3(v) => format!("{ty}({})", join(v.iter().copied())),
            Self::Vector4(v) => format!("{ty}({})", join(v.iter().copied())),
            Self::Matrix2(m) => format!("{ty}({})", join(m.iter().flatten().copied())),
            Self::Matrix3(m) => format!("{ty}({})", join(m.iter().flatten().copied())),
            Self::Matrix4(m) => format!("{ty}({})", join(m.iter().flatten().copied())),
            Self::Texture2D(_) | Self::Cubemap(_) => return None,
        };
        Some(literal)
    }
}

fn number(value: f32) -> String {
    format!("{value}")
}

fn join(values: impl Iterator<Item = f32>) -> String {
    values.map(number).collect::<Vec<_>>().join(", ")
}

/// A typed port on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    /// Slot identity
    pub id: SlotId,
    /// Name shown to the user
    pub display_name: String,
    /// Name used in generated code
    pub shader_output_name: String,
    /// Slot direction
    pub direction: SlotDirection,
    /// Value type
    pub value_type: SlotValueType,
    /// Value used when the slot is not connected
    pub default_value: SlotValue,
}

impl Slot {
    /// Create a new slot with a zero default
    pub fn new(
        id: SlotId,
        display_name: impl Into<String>,
        shader_output_name: impl Into<String>,
        direction: SlotDirection,
        value_type: SlotValueType,
    ) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            shader_output_name: shader_output_name.into(),
            direction,
            value_type,
            default_value: value_type.zero(),
        }
    }

    /// Create a new input slot
    pub fn input(id: SlotId, display_name: impl Into<String>, value_type: SlotValueType) -> Self {
        let display_name = display_name.into();
        let shader_output_name = display_name.replace(' ', "");
        Self::new(id, display_name, shader_output_name, SlotDirection::Input, value_type)
    }

    /// Create a new output slot
    pub fn output(id: SlotId, display_name: impl Into<String>, value_type: SlotValueType) -> Self {
        let display_name = display_name.into();
        let shader_output_name = display_name.replace(' ', "");
        Self::new(id, display_name, shader_output_name, SlotDirection::Output, value_type)
    }

    /// Set the default value
    pub fn with_default(mut self, value: SlotValue) -> Self {
        self.default_value = value;
        self
    }

    /// Whether this is an input slot
    pub fn is_input(&self) -> bool {
        self.direction == SlotDirection::Input
    }

    /// Whether this is an output slot
    pub fn is_output(&self) -> bool {
        self.direction == SlotDirection::Output
    }
}

/// Slot errors
#[derive(Debug, thiserror::Error)]
pub enum SlotError {
    /// Two distinct sources produced the same slot identity
    #[error("Slot identity {id} is shared by '{first}' and '{second}'")]
    IdentityCollision {
        /// The colliding identity
        id: SlotId,
        /// Display name of the slot that claimed the identity first
        first: String,
        /// Display name of the slot that collided with it
        second: String,
    },

    /// A property could not be turned into a slot
    #[error(transparent)]
    Property(#[from] PropertyError),
}

/// The slot set owned by a node, ordered by identity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotRegistry {
    slots: BTreeMap<SlotId, Slot>,
}

impl SlotRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a slot, replacing any slot with the same identity
    ///
    /// When the replaced slot had the same value type its default value is
    /// carried over, so values authored on a connection-less input survive a
    /// refresh.
    pub fn add_slot(&mut self, mut slot: Slot) -> Option<Slot> {
        let previous = self.slots.remove(&slot.id);
        if let Some(previous) = &previous {
            if previous.value_type == slot.value_type && previous.direction == slot.direction {
                slot.default_value = previous.default_value.clone();
            }
        }
        self.slots.insert(slot.id, slot);
        previous
    }

    /// Remove a slot by identity
    pub fn remove_slot(&mut self, id: SlotId) -> Option<Slot> {
        self.slots.remove(&id)
    }

    /// Remove every slot whose identity is not in `valid`, returning the removed ids
    pub fn remove_slots_not_in(&mut self, valid: &HashSet<SlotId>) -> Vec<SlotId> {
        let stale: Vec<SlotId> = self.slots.keys().filter(|id| !valid.contains(id)).copied().collect();
        for id in &stale {
            self.slots.remove(id);
        }
        stale
    }

    /// Get a slot by identity
    pub fn slot(&self, id: SlotId) -> Option<&Slot> {
        self.slots.get(&id)
    }

    /// Get a mutable slot by identity
    pub fn slot_mut(&mut self, id: SlotId) -> Option<&mut Slot> {
        self.slots.get_mut(&id)
    }

    /// All slots, ascending by identity
    pub fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.slots.values()
    }

    /// All slot identities, ascending
    pub fn ids(&self) -> impl Iterator<Item = SlotId> + '_ {
        self.slots.keys().copied()
    }

    /// Input slots, ascending by identity
    pub fn input_slots(&self) -> impl Iterator<Item = &Slot> {
        self.slots.values().filter(|s| s.is_input())
    }

    /// Output slots, ascending by identity
    pub fn output_slots(&self) -> impl Iterator<Item = &Slot> {
        self.slots.values().filter(|s| s.is_output())
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether there are no slots
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_spaces_are_disjoint() {
        for _ in 0..64 {
            assert!(!SlotId::from_guid(Uuid::new_v4()).is_positional());
        }
        assert!(SlotId::positional(3).is_positional());
    }

    #[test]
    fn test_guid_identity_is_stable() {
        let guid = Uuid::new_v4();
        assert_eq!(SlotId::from_guid(guid), SlotId::from_guid(guid));
    }

    #[test]
    fn test_ordering_by_identity() {
        let mut slots = SlotRegistry::new();
        slots.add_slot(Slot::output(SlotId::positional(3), "C", SlotValueType::Vector4));
        slots.add_slot(Slot::input(SlotId::positional(1), "A", SlotValueType::Vector1));
        slots.add_slot(Slot::output(SlotId::positional(2), "B", SlotValueType::Vector4));

        let outputs: Vec<_> = slots.output_slots().map(|s| s.id.value()).collect();
        assert_eq!(outputs, vec![2, 3]);
        assert_eq!(slots.input_slots().count(), 1);
    }

    #[test]
    fn test_add_slot_replaces_and_keeps_default() {
        let mut slots = SlotRegistry::new();
        let id = SlotId::positional(0);
        slots.add_slot(Slot::input(id, "A", SlotValueType::Vector1).with_default(SlotValue::Vector1(2.5)));

        let replaced = slots.add_slot(Slot::input(id, "Renamed", SlotValueType::Vector1));
        assert!(replaced.is_some());
        assert_eq!(slots.len(), 1);
        let slot = slots.slot(id).unwrap();
        assert_eq!(slot.display_name, "Renamed");
        assert_eq!(slot.default_value, SlotValue::Vector1(2.5));

        // A type change resets the default
        slots.add_slot(Slot::input(id, "A", SlotValueType::Vector2));
        assert_eq!(slots.slot(id).unwrap().default_value, SlotValue::Vector2([0.0; 2]));
    }

    #[test]
    fn test_remove_slots_not_in() {
        let mut slots = SlotRegistry::new();
        for i in 0..4 {
            slots.add_slot(Slot::input(SlotId::positional(i), format!("S{i}"), SlotValueType::Vector1));
        }

        let valid: HashSet<_> = [SlotId::positional(1), SlotId::positional(3)].into_iter().collect();
        let removed = slots.remove_slots_not_in(&valid);

        assert_eq!(removed, vec![SlotId::positional(0), SlotId::positional(2)]);
        assert_eq!(slots.ids().collect::<Vec<_>>(), vec![SlotId::positional(1), SlotId::positional(3)]);
    }

    #[test]
    fn test_literals() {
        let p = Precision::Float;
        assert_eq!(SlotValue::Vector1(0.5).to_shader_literal(p).unwrap(), "0.5");
        assert_eq!(
            SlotValue::Vector4([0.0, 0.25, 1.0, 1.0]).to_shader_literal(p).unwrap(),
            "float4(0, 0.25, 1, 1)"
        );
        assert_eq!(
            SlotValue::Matrix2([[1.0, 0.0], [0.0, 1.0]]).to_shader_literal(Precision::Half).unwrap(),
            "half2x2(1, 0, 0, 1)"
        );
        assert!(SlotValue::Texture2D(None).to_shader_literal(p).is_none());
    }

    #[test]
    fn test_connection_rules() {
        assert!(SlotValueType::Vector1.can_connect_to(&SlotValueType::Vector3));
        assert!(SlotValueType::Vector2.can_connect_to(&SlotValueType::Vector4));
        assert!(SlotValueType::Vector4.can_connect_to(&SlotValueType::Vector2));
        assert!(!SlotValueType::Vector4.can_connect_to(&SlotValueType::Matrix2));
        assert!(!SlotValueType::Texture2D.can_connect_to(&SlotValueType::Cubemap));
        assert!(SlotValueType::Matrix3.can_connect_to(&SlotValueType::Matrix3));
    }

    #[test]
    fn test_convert_expression() {
        let p = Precision::Float;
        assert_eq!(SlotValueType::Vector2.convert_expression("uv", SlotValueType::Vector4, p), "float4(uv, 0, 0)");
        assert_eq!(SlotValueType::Vector1.convert_expression("x", SlotValueType::Vector3, p), "x");
        assert_eq!(SlotValueType::Vector3.convert_expression("n", SlotValueType::Vector3, p), "n");
        assert_eq!(SlotValueType::Vector4.convert_expression("c", SlotValueType::Vector2, p), "c.xy");
    }
}
