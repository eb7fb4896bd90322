// SPDX-License-Identifier: MIT OR Apache-2.0
//! Compiler entry point.

use crate::asset::AssetResolver;
use crate::codegen::{self, CollectedProperty, GenerationContext, PropertyCollector};
use crate::error::Result;
use crate::registry::{FunctionRegistry, FunctionSink};
use crate::requirements::ShaderGraphRequirements;
use crate::settings::CompilerSettings;
use crate::shader_graph::ShaderGraph;
use crate::validation::{validate_graph, ValidationReport};
use crate::writer::ShaderWriter;

/// Output of one compilation pass
#[derive(Debug, Clone)]
pub struct CompiledShader {
    /// Function bodies by name, dependencies first
    pub functions: Vec<(String, String)>,
    /// Uniform declarations
    pub uniforms: String,
    /// The entry function
    pub entry: String,
    /// Capabilities the graph needs from the pipeline
    pub requirements: ShaderGraphRequirements,
    /// Uniforms the material has to bind
    pub properties: Vec<CollectedProperty>,
    /// Non-fatal validation findings
    pub report: ValidationReport,
}

impl CompiledShader {
    /// Uniforms, then functions, then the entry function
    pub fn to_source(&self) -> String {
        let mut source = self.uniforms.clone();
        if !source.is_empty() {
            source.push('\n');
        }
        for (_, body) in &self.functions {
            source.push_str(body);
            source.push('\n');
        }
        source.push_str(&self.entry);
        source
    }
}

/// Turns shader graphs into shader source
#[derive(Debug, Clone, Default)]
pub struct ShaderCompiler {
    settings: CompilerSettings,
}

impl ShaderCompiler {
    /// Create a compiler
    pub fn new(settings: CompilerSettings) -> Self {
        Self { settings }
    }

    /// Compiler settings
    pub fn settings(&self) -> &CompilerSettings {
        &self.settings
    }

    /// Compile `graph` with a registry scoped to this pass
    pub fn compile(&self, graph: &mut ShaderGraph, assets: &dyn AssetResolver) -> Result<CompiledShader> {
        let mut registry = FunctionRegistry::new();
        let mut compiled = self.compile_with(graph, assets, &mut registry)?;
        compiled.functions = registry
            .iter()
            .map(|(name, body)| (name.to_string(), body.to_string()))
            .collect();
        Ok(compiled)
    }

    /// Compile `graph`, registering functions in `sink`
    ///
    /// The returned shader has no `functions`; they live in `sink`, which may
    /// be shared with other passes.
    pub fn compile_with<S: FunctionSink>(
        &self,
        graph: &mut ShaderGraph,
        assets: &dyn AssetResolver,
        sink: &mut S,
    ) -> Result<CompiledShader> {
        let report = validate_graph(graph, assets)?;
        for warning in &report.warnings {
            tracing::warn!("{}", warning);
        }

        let graph: &ShaderGraph = graph;
        let ctx = GenerationContext::new(graph, assets, &self.settings);

        codegen::generate_functions(&ctx, sink);

        let mut writer = ShaderWriter::new();
        codegen::write_graph_function(&ctx, &self.settings.entry_point, false, &mut writer);

        let mut collector = PropertyCollector::new();
        codegen::collect_properties(&ctx, &mut collector);

        let active = graph.active_nodes();
        // Flagged nodes emit zeroed stand-ins and need nothing from the pipeline
        let requirements =
            ShaderGraphRequirements::from_nodes(active.iter().copied().filter(|n| !n.has_error), assets);

        tracing::info!(
            "Compiled '{}': {} node(s), {} uniform(s), {} flagged",
            graph.name,
            active.len(),
            collector.len(),
            report.flagged.len()
        );

        Ok(CompiledShader {
            functions: Vec::new(),
            uniforms: collector.declarations(self.settings.precision),
            entry: writer.finish(),
            requirements,
            properties: collector.into_vec(),
            report,
        })
    }
}
