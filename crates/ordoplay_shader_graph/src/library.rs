// SPDX-License-Identifier: MIT OR Apache-2.0
//! Library of function node templates.
//!
//! Each template names a precompiled function and declares the slots and
//! capability requirements of the nodes created from it. Slot identities
//! are positional: inputs first, then outputs, in declaration order.

use crate::node::{Node, NodeKind};
use crate::nodes::FunctionNode;
use crate::requirements::{NeededCoordinateSpace, ShaderGraphRequirements, UvChannel};
use crate::slot::{Slot, SlotId, SlotValue, SlotValueType};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Node template category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeCategory {
    /// Geometry and global inputs
    Input,
    /// Math operations
    Math,
    /// Texture operations
    Texture,
    /// Utility nodes
    Utility,
}

/// Template for a function node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeTemplate {
    /// Unique type identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Category
    pub category: NodeCategory,
    /// Description
    pub description: String,
    /// Function name template
    pub function: String,
    /// Function body template
    pub body: Option<String>,
    /// Whether the surface context is passed to the function
    pub takes_context: bool,
    /// Input slots
    pub inputs: Vec<Slot>,
    /// Output slots
    pub outputs: Vec<Slot>,
    /// Capabilities the function reads
    pub requirements: ShaderGraphRequirements,
}

impl NodeTemplate {
    /// Create a node from this template
    pub fn instantiate(&self) -> Node {
        let mut node = Node::new(
            self.name.clone(),
            NodeKind::Function(FunctionNode {
                node_type: self.id.clone(),
                function: self.function.clone(),
                body: self.body.clone(),
                takes_context: self.takes_context,
                requirements: self.requirements.clone(),
            }),
        );
        for (index, slot) in (0u32..).zip(self.inputs.iter().chain(&self.outputs)) {
            let mut slot = slot.clone();
            slot.id = SlotId::positional(index);
            node.slots.add_slot(slot);
        }
        node
    }
}

/// Registry of available node templates
#[derive(Debug, Clone, Default)]
pub struct NodeLibrary {
    templates: IndexMap<String, NodeTemplate>,
}

impl NodeLibrary {
    /// Create a new empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template
    pub fn register(&mut self, template: NodeTemplate) {
        self.templates.insert(template.id.clone(), template);
    }

    /// Get a template by ID
    pub fn get(&self, id: &str) -> Option<&NodeTemplate> {
        self.templates.get(id)
    }

    /// Get all registered templates
    pub fn templates(&self) -> impl Iterator<Item = &NodeTemplate> {
        self.templates.values()
    }

    /// Get templates by category
    pub fn templates_in_category(&self, category: NodeCategory) -> impl Iterator<Item = &NodeTemplate> {
        self.templates.values().filter(move |t| t.category == category)
    }

    /// Create a node from a template ID
    pub fn create_node(&self, id: &str) -> Option<Node> {
        self.get(id).map(NodeTemplate::instantiate)
    }
}

fn input(name: &str, value_type: SlotValueType) -> Slot {
    Slot::input(SlotId::positional(0), name, value_type)
}

fn output(name: &str, value_type: SlotValueType) -> Slot {
    Slot::output(SlotId::positional(0), name, value_type)
}

/// Template for a node that copies one field of the surface context
fn context_input(
    id: &str,
    name: &str,
    function: &str,
    field: &str,
    value_type: SlotValueType,
    requirements: ShaderGraphRequirements,
) -> NodeTemplate {
    let ty = match value_type {
        SlotValueType::Vector3 => "$precision3",
        _ => "$precision4",
    };
    NodeTemplate {
        id: id.to_string(),
        name: name.to_string(),
        category: NodeCategory::Input,
        description: format!("Surface {}", name.to_lowercase()),
        function: function.to_string(),
        body: Some(format!(
            "void {function}($context $in, out {ty} Out)\n{{\n    Out = $in.{field};\n}}"
        )),
        takes_context: true,
        inputs: vec![],
        outputs: vec![output("Out", value_type)],
        requirements,
    }
}

/// Template for a component-wise binary operation
fn binary(id: &str, name: &str, function: &str, operator: &str) -> NodeTemplate {
    NodeTemplate {
        id: id.to_string(),
        name: name.to_string(),
        category: NodeCategory::Math,
        description: format!("A {operator} B"),
        function: function.to_string(),
        body: Some(format!(
            "void {function}($precision4 A, $precision4 B, out $precision4 Out)\n{{\n    Out = A {operator} B;\n}}"
        )),
        takes_context: false,
        inputs: vec![
            input("A", SlotValueType::Vector4),
            input("B", SlotValueType::Vector4),
        ],
        outputs: vec![output("Out", SlotValueType::Vector4)],
        requirements: ShaderGraphRequirements::none(),
    }
}

/// Create the function node library with all available templates
pub fn create_function_library() -> NodeLibrary {
    let mut library = NodeLibrary::new();
    let world = NeededCoordinateSpace::WORLD;

    // ========================================================================
    // Math
    // ========================================================================

    library.register(binary("add", "Add", "Unity_Add_$precision4", "+"));
    library.register(binary("multiply", "Multiply", "Unity_Multiply_$precision4", "*"));

    library.register(NodeTemplate {
        id: "lerp".to_string(),
        name: "Lerp".to_string(),
        category: NodeCategory::Math,
        description: "Linear interpolation between A and B".to_string(),
        function: "Unity_Lerp_$precision4".to_string(),
        body: Some(
            "void Unity_Lerp_$precision4($precision4 A, $precision4 B, $precision4 T, out $precision4 Out)\n{\n    Out = lerp(A, B, T);\n}"
                .to_string(),
        ),
        takes_context: false,
        inputs: vec![
            input("A", SlotValueType::Vector4),
            input("B", SlotValueType::Vector4).with_default(SlotValue::Vector4([1.0; 4])),
            input("T", SlotValueType::Vector4).with_default(SlotValue::Vector4([0.5; 4])),
        ],
        outputs: vec![output("Out", SlotValueType::Vector4)],
        requirements: ShaderGraphRequirements::none(),
    });

    library.register(NodeTemplate {
        id: "fresnel".to_string(),
        name: "Fresnel Effect".to_string(),
        category: NodeCategory::Math,
        description: "Rim term from the surface normal and view direction".to_string(),
        function: "Unity_FresnelEffect_$precision".to_string(),
        body: Some(
            "void Unity_FresnelEffect_$precision($precision3 Normal, $precision3 ViewDir, $precision Power, out $precision Out)\n{\n    Out = pow((1.0 - saturate(dot(normalize(Normal), normalize(ViewDir)))), Power);\n}"
                .to_string(),
        ),
        takes_context: false,
        inputs: vec![
            input("Normal", SlotValueType::Vector3),
            input("View Dir", SlotValueType::Vector3),
            input("Power", SlotValueType::Vector1).with_default(SlotValue::Vector1(1.0)),
        ],
        outputs: vec![output("Out", SlotValueType::Vector1)],
        requirements: ShaderGraphRequirements::none(),
    });

    // ========================================================================
    // Texture
    // ========================================================================

    library.register(NodeTemplate {
        id: "sample_texture_2d".to_string(),
        name: "Sample Texture 2D".to_string(),
        category: NodeCategory::Texture,
        description: "Sample a 2D texture".to_string(),
        function: "Unity_SampleTexture2D_$precision".to_string(),
        body: Some(
            "void Unity_SampleTexture2D_$precision(TEXTURE2D_ARGS(Texture, samplerTexture), $precision2 UV, out $precision4 RGBA)\n{\n    RGBA = SAMPLE_TEXTURE2D(Texture, samplerTexture, UV);\n}"
                .to_string(),
        ),
        takes_context: false,
        inputs: vec![
            input("Texture", SlotValueType::Texture2D),
            input("UV", SlotValueType::Vector2),
        ],
        outputs: vec![output("RGBA", SlotValueType::Vector4)],
        requirements: ShaderGraphRequirements::none(),
    });

    library.register(NodeTemplate {
        id: "sample_cubemap".to_string(),
        name: "Sample Cubemap".to_string(),
        category: NodeCategory::Texture,
        description: "Sample a cubemap along a direction".to_string(),
        function: "Unity_SampleCubemap_$precision".to_string(),
        body: Some(
            "void Unity_SampleCubemap_$precision(TEXTURECUBE_ARGS(Cube, samplerCube), $precision3 Dir, out $precision4 Out)\n{\n    Out = SAMPLE_TEXTURECUBE(Cube, samplerCube, Dir);\n}"
                .to_string(),
        ),
        takes_context: false,
        inputs: vec![
            input("Cube", SlotValueType::Cubemap),
            input("Dir", SlotValueType::Vector3),
        ],
        outputs: vec![output("Out", SlotValueType::Vector4)],
        requirements: ShaderGraphRequirements::none(),
    });

    // ========================================================================
    // Input - Geometry
    // ========================================================================

    library.register(context_input(
        "normal_vector",
        "Normal Vector",
        "Unity_NormalVector_World_$precision",
        "WorldSpaceNormal",
        SlotValueType::Vector3,
        ShaderGraphRequirements::none().with_normal(world),
    ));
    library.register(context_input(
        "tangent_vector",
        "Tangent Vector",
        "Unity_TangentVector_World_$precision",
        "WorldSpaceTangent",
        SlotValueType::Vector3,
        ShaderGraphRequirements::none().with_tangent(world),
    ));
    library.register(context_input(
        "bitangent_vector",
        "Bitangent Vector",
        "Unity_BitangentVector_World_$precision",
        "WorldSpaceBiTangent",
        SlotValueType::Vector3,
        ShaderGraphRequirements::none().with_bitangent(world),
    ));
    library.register(context_input(
        "position",
        "Position",
        "Unity_Position_World_$precision",
        "WorldSpacePosition",
        SlotValueType::Vector3,
        ShaderGraphRequirements::none().with_position(world),
    ));
    library.register(context_input(
        "object_position",
        "Object Position",
        "Unity_Position_Object_$precision",
        "ObjectSpacePosition",
        SlotValueType::Vector3,
        ShaderGraphRequirements::none().with_position(NeededCoordinateSpace::OBJECT),
    ));
    library.register(context_input(
        "view_direction",
        "View Direction",
        "Unity_ViewDirection_World_$precision",
        "WorldSpaceViewDirection",
        SlotValueType::Vector3,
        ShaderGraphRequirements::none().with_view_direction(world),
    ));

    // ========================================================================
    // Input - Interpolants & Globals
    // ========================================================================

    library.register(context_input(
        "uv",
        "UV",
        "Unity_UV0_$precision",
        "uv0",
        SlotValueType::Vector4,
        ShaderGraphRequirements::none().with_uv(UvChannel::Uv0),
    ));
    library.register(context_input(
        "uv1",
        "UV1",
        "Unity_UV1_$precision",
        "uv1",
        SlotValueType::Vector4,
        ShaderGraphRequirements::none().with_uv(UvChannel::Uv1),
    ));
    library.register(context_input(
        "screen_position",
        "Screen Position",
        "Unity_ScreenPosition_$precision",
        "ScreenPosition",
        SlotValueType::Vector4,
        ShaderGraphRequirements::none().with_screen_position(),
    ));
    library.register(context_input(
        "vertex_color",
        "Vertex Color",
        "Unity_VertexColor_$precision",
        "VertexColor",
        SlotValueType::Vector4,
        ShaderGraphRequirements::none().with_vertex_color(),
    ));

    library.register(NodeTemplate {
        id: "time".to_string(),
        name: "Time".to_string(),
        category: NodeCategory::Input,
        description: "Shader time in seconds".to_string(),
        function: "Unity_Time_$precision".to_string(),
        body: Some("void Unity_Time_$precision(out $precision Out)\n{\n    Out = _Time.y;\n}".to_string()),
        takes_context: false,
        inputs: vec![],
        outputs: vec![output("Out", SlotValueType::Vector1)],
        requirements: ShaderGraphRequirements::none().with_time(),
    });

    library
}
