// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shader code generation.
//!
//! Generation runs in two phases over a validated graph:
//! 1. [`generate_functions`] registers every function the graph calls,
//!    depth first, so nested sub-graph functions precede the functions
//!    that call them.
//! 2. [`generate_node_code`] writes each active node's statements into the
//!    body of the enclosing function.

use crate::asset::{AssetHandle, AssetResolver, SubGraphAsset};
use crate::connection::Connection;
use crate::node::{Node, NodeKind};
use crate::nodes::SubGraphOutputNode;
use crate::registry::FunctionSink;
use crate::settings::{CompilerSettings, Precision};
use crate::shader_graph::ShaderGraph;
use crate::slot::{SlotId, SlotValue, SlotValueType};
use crate::writer::{ChunkMode, ShaderWriter};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Function name used when a wrapper's sub-graph cannot be resolved
pub const ERROR_FUNCTION_NAME: &str = "ERROR";

/// Everything code generation for one graph needs
#[derive(Clone, Copy)]
pub struct GenerationContext<'a> {
    /// The graph whose code is being generated
    pub graph: &'a ShaderGraph,
    /// Resolver for referenced sub-graphs
    pub assets: &'a dyn AssetResolver,
    /// Compiler settings
    pub settings: &'a CompilerSettings,
}

impl<'a> GenerationContext<'a> {
    /// Create a context for `graph`
    pub fn new(graph: &'a ShaderGraph, assets: &'a dyn AssetResolver, settings: &'a CompilerSettings) -> Self {
        Self { graph, assets, settings }
    }

    /// Context for a nested graph, sharing resolver and settings
    pub fn for_graph<'b>(&self, graph: &'b ShaderGraph) -> GenerationContext<'b>
    where
        'a: 'b,
    {
        GenerationContext {
            graph,
            assets: self.assets,
            settings: self.settings,
        }
    }

    /// Precision of emitted types
    pub fn precision(&self) -> Precision {
        self.settings.precision
    }
}

/// Make `name` usable as a shader identifier
///
/// Characters outside `[A-Za-z0-9_]` become `_`, and a leading digit gets a
/// `_` prefix.
pub fn hlsl_safe_name(name: &str) -> String {
    let mut safe: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if safe.is_empty() || safe.starts_with(|c: char| c.is_ascii_digit()) {
        safe.insert(0, '_');
    }
    safe
}

/// Name of the function generated for a sub-graph asset
///
/// The asset name keeps the output readable; the graph guid keeps distinct
/// assets apart. Every wrapper of the same asset gets the same name.
pub fn sub_graph_function_name(asset: Option<&SubGraphAsset>) -> String {
    match asset {
        Some(asset) => format!("{}_{}", hlsl_safe_name(&asset.name), asset.graph.guid.simple()),
        None => ERROR_FUNCTION_NAME.to_string(),
    }
}

/// Wrap a texture or cubemap expression in its texture + sampler argument form
pub fn texture_argument(value_type: SlotValueType, value: String) -> String {
    match value_type {
        SlotValueType::Texture2D => format!("TEXTURE2D_PARAM({value}, sampler{value})"),
        SlotValueType::Cubemap => format!("TEXTURECUBE_PARAM({value}, sampler{value})"),
        _ => value,
    }
}

/// The enabled node and connection feeding an input slot
fn source_of<'a>(ctx: &GenerationContext<'a>, node: &Node, slot: SlotId) -> Option<(&'a Node, &'a Connection)> {
    let connection = ctx.graph.graph().connection_to(node.id, slot)?;
    let source = ctx.graph.node(connection.from_node)?;
    source.enabled.then_some((source, connection))
}

/// Whether an input slot reads its own default value
pub fn uses_default(ctx: &GenerationContext<'_>, node: &Node, slot: SlotId) -> bool {
    source_of(ctx, node, slot).is_none()
}

/// Expression for the value an input slot reads
///
/// A connected slot reads the source's variable (or the property, for
/// property nodes), converted to the slot's type. An unconnected slot reads
/// its default literal; textures have no literal and read a uniform named
/// after the slot instead.
pub fn slot_value(ctx: &GenerationContext<'_>, node: &Node, slot_id: SlotId) -> String {
    let Some(slot) = node.slot(slot_id) else {
        tracing::warn!("Node '{}' has no slot {}", node.name, slot_id);
        return "0".to_string();
    };

    if let Some((source, connection)) = source_of(ctx, node, slot_id) {
        let expression = match &source.kind {
            NodeKind::Property(reader) => ctx.graph.property(reader.property).map(|p| p.reference_name.clone()),
            _ => Some(source.variable_name_for_slot(connection.from_slot)),
        };
        if let (Some(expression), Some(from)) = (expression, source.slot(connection.from_slot)) {
            return from
                .value_type
                .convert_expression(&expression, slot.value_type, ctx.precision());
        }
    }

    if slot.value_type.is_texture() {
        return node.variable_name_for_slot(slot_id);
    }
    slot.default_value
        .to_shader_literal(ctx.precision())
        .unwrap_or_else(|| "0".to_string())
}

/// Write the statements for one node
///
/// Nodes flagged with an error only declare their outputs, zero-initialised,
/// so downstream nodes still compile.
pub fn generate_node_code(ctx: &GenerationContext<'_>, node: &Node, writer: &mut ShaderWriter) {
    if node.has_error {
        writer.add_line(format!("// {} has errors", node.name));
        for slot in node.output_slots() {
            let zero = slot
                .value_type
                .zero()
                .to_shader_literal(ctx.precision())
                .unwrap_or_else(|| "0".to_string());
            writer.add_line(format!(
                "{} {} = {};",
                slot.value_type.shader_type(ctx.precision()),
                node.variable_name_for_slot(slot.id),
                zero
            ));
        }
        return;
    }

    match &node.kind {
        NodeKind::Function(function) => function.generate_code(node, ctx, writer),
        NodeKind::SubGraph(sub_graph) => sub_graph.generate_code(node, ctx, writer),
        NodeKind::SubGraphOutput(_) => SubGraphOutputNode::emit_assignments(node, ctx, writer),
        NodeKind::Property(_) => {}
    }
}

/// Register every function the active nodes of `ctx.graph` call
pub fn generate_functions<S: FunctionSink>(ctx: &GenerationContext<'_>, sink: &mut S) {
    generate_functions_within(ctx, sink, &mut Vec::new());
}

pub(crate) fn generate_functions_within<S: FunctionSink>(
    ctx: &GenerationContext<'_>,
    sink: &mut S,
    expanding: &mut Vec<AssetHandle>,
) {
    for node in ctx.graph.active_nodes() {
        if node.has_error {
            continue;
        }
        match &node.kind {
            NodeKind::Function(function) => function.generate_function(ctx.settings, sink),
            NodeKind::SubGraph(sub_graph) => sub_graph.generate_function(ctx, sink, expanding),
            NodeKind::Property(_) | NodeKind::SubGraphOutput(_) => {}
        }
    }
}

/// Write a function whose body is the code of every active node of `ctx.graph`
///
/// Parameters are the graph's properties (when `with_properties`), the
/// surface context, then one `out` parameter per declared output.
pub fn write_graph_function(ctx: &GenerationContext<'_>, name: &str, with_properties: bool, writer: &mut ShaderWriter) {
    let precision = ctx.precision();
    let mut parameters = Vec::new();
    if with_properties {
        parameters.extend(
            ctx.graph
                .properties()
                .iter()
                .filter_map(|p| p.argument_declaration(precision).ok()),
        );
    }
    parameters.push(format!("{} {}", ctx.settings.context_type, ctx.settings.context_argument));
    parameters.extend(
        ctx.graph
            .graph_outputs()
            .map(|port| format!("out {} {}", port.value_type.shader_type(precision), port.shader_output_name)),
    );

    writer.add_chunk(format!("void {name}({})", parameters.join(", ")), ChunkMode::Statement);
    writer.open_brace();
    for node in ctx.graph.active_nodes() {
        generate_node_code(ctx, node, writer);
    }
    writer.close_brace();
}

/// A uniform the generated code expects the material to bind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectedProperty {
    /// Uniform name
    pub reference_name: String,
    /// Value type
    pub value_type: SlotValueType,
    /// Default value, including any bound texture
    pub default_value: SlotValue,
}

impl CollectedProperty {
    /// Declaration of the uniform
    pub fn declaration(&self, precision: Precision) -> String {
        let name = &self.reference_name;
        match self.value_type {
            SlotValueType::Texture2D => format!("TEXTURE2D({name});\nSAMPLER(sampler{name});"),
            SlotValueType::Cubemap => format!("TEXTURECUBE({name});\nSAMPLER(sampler{name});"),
            other => format!("{} {name};", other.shader_type(precision)),
        }
    }
}

/// Uniforms collected from a graph and the sub-graphs it expands
#[derive(Debug, Clone, Default)]
pub struct PropertyCollector {
    properties: IndexMap<String, CollectedProperty>,
}

impl PropertyCollector {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a uniform; the first one registered under a name wins
    pub fn add(&mut self, property: CollectedProperty) {
        self.properties
            .entry(property.reference_name.clone())
            .or_insert(property);
    }

    /// Get a uniform by name
    pub fn get(&self, reference_name: &str) -> Option<&CollectedProperty> {
        self.properties.get(reference_name)
    }

    /// Collected uniforms, in collection order
    pub fn iter(&self) -> impl Iterator<Item = &CollectedProperty> {
        self.properties.values()
    }

    /// Number of uniforms
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Whether nothing was collected
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Declarations of every uniform
    pub fn declarations(&self, precision: Precision) -> String {
        let mut source = String::new();
        for property in self.properties.values() {
            source.push_str(&property.declaration(precision));
            source.push('\n');
        }
        source
    }

    /// Consume the collector
    pub fn into_vec(self) -> Vec<CollectedProperty> {
        self.properties.into_values().collect()
    }
}

/// Collect the root graph's properties and the uniforms of unconnected texture inputs
pub fn collect_properties(ctx: &GenerationContext<'_>, collector: &mut PropertyCollector) {
    for property in ctx.graph.properties() {
        let (Ok(value_type), Ok(default_value)) = (property.slot_type(), property.value.to_slot_value()) else {
            continue;
        };
        collector.add(CollectedProperty {
            reference_name: property.reference_name.clone(),
            value_type,
            default_value,
        });
    }
    collect_slot_uniforms(ctx, collector, &mut Vec::new());
}

fn collect_slot_uniforms(ctx: &GenerationContext<'_>, collector: &mut PropertyCollector, expanding: &mut Vec<AssetHandle>) {
    for node in ctx.graph.active_nodes() {
        if node.has_error {
            continue;
        }
        for slot in node.input_slots() {
            if slot.value_type.is_texture() && !node.is_sub_graph_output() && uses_default(ctx, node, slot.id) {
                collector.add(CollectedProperty {
                    reference_name: node.variable_name_for_slot(slot.id),
                    value_type: slot.value_type,
                    default_value: slot.default_value.clone(),
                });
            }
        }

        let Some(asset) = node.as_sub_graph().and_then(|s| s.reference.resolve(ctx.assets)) else {
            continue;
        };
        if expanding.contains(&asset.handle) {
            continue;
        }
        expanding.push(asset.handle);
        collect_slot_uniforms(&ctx.for_graph(&asset.graph), collector, expanding);
        expanding.pop();
    }
}
