// SPDX-License-Identifier: MIT OR Apache-2.0
//! Exposed graph properties and their mapping onto slots.

use crate::settings::Precision;
use crate::slot::{Slot, SlotDirection, SlotId, SlotValue, SlotValueType, TextureRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Kind of an exposed property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyKind {
    /// RGBA color
    Color,
    /// 2D texture
    Texture,
    /// Cubemap texture
    Cubemap,
    /// Scalar
    Float,
    /// 2D vector
    Vector2,
    /// 3D vector
    Vector3,
    /// 4D vector
    Vector4,
    /// 2x2 matrix
    Matrix2,
    /// 3x3 matrix
    Matrix3,
    /// 4x4 matrix
    Matrix4,
    /// Boolean toggle, material-level only
    Boolean,
}

impl PropertyKind {
    /// Every property kind
    pub const ALL: [PropertyKind; 11] = [
        Self::Color,
        Self::Texture,
        Self::Cubemap,
        Self::Float,
        Self::Vector2,
        Self::Vector3,
        Self::Vector4,
        Self::Matrix2,
        Self::Matrix3,
        Self::Matrix4,
        Self::Boolean,
    ];

    /// Name of this kind
    pub fn name(&self) -> &'static str {
        match self {
            Self::Color => "Color",
            Self::Texture => "Texture",
            Self::Cubemap => "Cubemap",
            Self::Float => "Float",
            Self::Vector2 => "Vector2",
            Self::Vector3 => "Vector3",
            Self::Vector4 => "Vector4",
            Self::Matrix2 => "Matrix2",
            Self::Matrix3 => "Matrix3",
            Self::Matrix4 => "Matrix4",
            Self::Boolean => "Boolean",
        }
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PropertyKind {
    type Err = PropertyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| PropertyError::UnknownKind(s.to_string()))
    }
}

/// Property errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PropertyError {
    /// The kind has no slot representation
    #[error("Property kind {0} cannot be exposed as a slot")]
    UnsupportedKind(PropertyKind),

    /// The kind name is not recognised
    #[error("Unknown property kind: {0}")]
    UnknownKind(String),
}

/// Map a property kind onto the slot value type that carries it
pub fn slot_type_for(kind: PropertyKind) -> Result<SlotValueType, PropertyError> {
    Ok(match kind {
        PropertyKind::Color => SlotValueType::Vector4,
        PropertyKind::Texture => SlotValueType::Texture2D,
        PropertyKind::Cubemap => SlotValueType::Cubemap,
        PropertyKind::Float => SlotValueType::Vector1,
        PropertyKind::Vector2 => SlotValueType::Vector2,
        PropertyKind::Vector3 => SlotValueType::Vector3,
        PropertyKind::Vector4 => SlotValueType::Vector4,
        PropertyKind::Matrix2 => SlotValueType::Matrix2,
        PropertyKind::Matrix3 => SlotValueType::Matrix3,
        PropertyKind::Matrix4 => SlotValueType::Matrix4,
        other @ PropertyKind::Boolean => return Err(PropertyError::UnsupportedKind(other)),
    })
}

/// Default value of a property, typed per kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    /// RGBA color
    Color([f32; 4]),
    /// Bound default texture
    Texture(Option<TextureRef>),
    /// Bound default cubemap
    Cubemap(Option<TextureRef>),
    /// Scalar
    Float(f32),
    /// 2D vector
    Vector2([f32; 2]),
    /// 3D vector
    Vector3([f32; 3]),
    /// 4D vector
    Vector4([f32; 4]),
    /// 2x2 matrix
    Matrix2([[f32; 2]; 2]),
    /// 3x3 matrix
    Matrix3([[f32; 3]; 3]),
    /// 4x4 matrix
    Matrix4([[f32; 4]; 4]),
    /// Boolean
    Boolean(bool),
}

impl PropertyValue {
    /// Kind of this value
    pub fn kind(&self) -> PropertyKind {
        match self {
            Self::Color(_) => PropertyKind::Color,
            Self::Texture(_) => PropertyKind::Texture,
            Self::Cubemap(_) => PropertyKind::Cubemap,
            Self::Float(_) => PropertyKind::Float,
            Self::Vector2(_) => PropertyKind::Vector2,
            Self::Vector3(_) => PropertyKind::Vector3,
            Self::Vector4(_) => PropertyKind::Vector4,
            Self::Matrix2(_) => PropertyKind::Matrix2,
            Self::Matrix3(_) => PropertyKind::Matrix3,
            Self::Matrix4(_) => PropertyKind::Matrix4,
            Self::Boolean(_) => PropertyKind::Boolean,
        }
    }

    /// Slot value equivalent of this property value
    pub fn to_slot_value(&self) -> Result<SlotValue, PropertyError> {
        Ok(match self {
            Self::Color(v) | Self::Vector4(v) => SlotValue::Vector4(*v),
            Self::Texture(t) => SlotValue::Texture2D(t.clone()),
            Self::Cubemap(t) => SlotValue::Cubemap(t.clone()),
            Self::Float(v) => SlotValue::Vector1(*v),
            Self::Vector2(v) => SlotValue::Vector2(*v),
            Self::Vector3(v) => SlotValue::Vector3(*v),
            Self::Matrix2(m) => SlotValue::Matrix2(*m),
            Self::Matrix3(m) => SlotValue::Matrix3(*m),
            Self::Matrix4(m) => SlotValue::Matrix4(*m),
            Self::Boolean(_) => return Err(PropertyError::UnsupportedKind(self.kind())),
        })
    }
}

/// A property exposed by a graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    /// Globally unique property id
    pub guid: Uuid,
    /// Name shown to the user
    pub display_name: String,
    /// Name used in generated code
    pub reference_name: String,
    /// Default value, which also determines the kind
    pub value: PropertyValue,
}

impl Property {
    /// Create a property with a generated reference name
    pub fn new(display_name: impl Into<String>, value: PropertyValue) -> Self {
        let guid = Uuid::new_v4();
        let reference_name = format!("{}_{}", value.kind().name(), &guid.simple().to_string()[..8]);
        Self {
            guid,
            display_name: display_name.into(),
            reference_name,
            value,
        }
    }

    /// Set the reference name
    pub fn with_reference_name(mut self, reference_name: impl Into<String>) -> Self {
        self.reference_name = reference_name.into();
        self
    }

    /// Property kind
    pub fn kind(&self) -> PropertyKind {
        self.value.kind()
    }

    /// Identity of the slot that carries this property on a wrapper node
    pub fn slot_id(&self) -> SlotId {
        SlotId::from_guid(self.guid)
    }

    /// Slot value type for this property
    pub fn slot_type(&self) -> Result<SlotValueType, PropertyError> {
        slot_type_for(self.kind())
    }

    /// Build the input slot that carries this property
    ///
    /// Texture and cubemap slots receive the property's bound resource as
    /// their default.
    pub fn to_input_slot(&self) -> Result<Slot, PropertyError> {
        let value_type = self.slot_type()?;
        let slot = Slot::new(
            self.slot_id(),
            self.display_name.clone(),
            self.reference_name.clone(),
            SlotDirection::Input,
            value_type,
        );
        Ok(slot.with_default(self.value.to_slot_value()?))
    }

    /// Literal for the default value, `None` for textures
    pub fn default_literal(&self, precision: Precision) -> Option<String> {
        self.value.to_slot_value().ok()?.to_shader_literal(precision)
    }

    /// Parameter declaration for a function signature
    pub fn argument_declaration(&self, precision: Precision) -> Result<String, PropertyError> {
        let name = &self.reference_name;
        Ok(match self.slot_type()? {
            SlotValueType::Texture2D => format!("TEXTURE2D_ARGS({name}, sampler{name})"),
            SlotValueType::Cubemap => format!("TEXTURECUBE_ARGS({name}, sampler{name})"),
            other => format!("{} {name}", other.shader_type(precision)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_table() {
        let expected = [
            (PropertyKind::Color, SlotValueType::Vector4),
            (PropertyKind::Texture, SlotValueType::Texture2D),
            (PropertyKind::Cubemap, SlotValueType::Cubemap),
            (PropertyKind::Float, SlotValueType::Vector1),
            (PropertyKind::Vector2, SlotValueType::Vector2),
            (PropertyKind::Vector3, SlotValueType::Vector3),
            (PropertyKind::Vector4, SlotValueType::Vector4),
            (PropertyKind::Matrix2, SlotValueType::Matrix2),
            (PropertyKind::Matrix3, SlotValueType::Matrix3),
            (PropertyKind::Matrix4, SlotValueType::Matrix4),
        ];
        for (kind, slot_type) in expected {
            assert_eq!(slot_type_for(kind), Ok(slot_type), "{kind}");
        }
    }

    #[test]
    fn test_unsupported_kind() {
        assert_eq!(
            slot_type_for(PropertyKind::Boolean),
            Err(PropertyError::UnsupportedKind(PropertyKind::Boolean))
        );
        let toggle = Property::new("Toggle", PropertyValue::Boolean(true));
        assert!(toggle.to_input_slot().is_err());
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("vector3".parse::<PropertyKind>(), Ok(PropertyKind::Vector3));
        assert_eq!(
            "Gradient".parse::<PropertyKind>(),
            Err(PropertyError::UnknownKind("Gradient".to_string()))
        );
    }

    #[test]
    fn test_texture_default_is_carried() {
        let texture = TextureRef("Textures/Noise.png".to_string());
        let property = Property::new("Noise", PropertyValue::Texture(Some(texture.clone())));
        let slot = property.to_input_slot().unwrap();

        assert_eq!(slot.id, property.slot_id());
        assert_eq!(slot.value_type, SlotValueType::Texture2D);
        assert_eq!(slot.default_value.texture(), Some(&texture));
        assert_eq!(slot.shader_output_name, property.reference_name);
    }

    #[test]
    fn test_argument_declarations() {
        let p = Precision::Float;
        let tint = Property::new("Tint", PropertyValue::Color([1.0; 4])).with_reference_name("Tint");
        let sky = Property::new("Sky", PropertyValue::Cubemap(None)).with_reference_name("Sky");
        assert_eq!(tint.argument_declaration(p).unwrap(), "float4 Tint");
        assert_eq!(sky.argument_declaration(p).unwrap(), "TEXTURECUBE_ARGS(Sky, samplerSky)");
        assert_eq!(tint.default_literal(p).unwrap(), "float4(1, 1, 1, 1)");
    }
}
