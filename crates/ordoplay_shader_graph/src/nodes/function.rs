// SPDX-License-Identifier: MIT OR Apache-2.0
//! Function node.
//!
//! A function node calls a precompiled function. Function names and bodies
//! are templates: `$precision` expands to the scalar type keyword, `$context`
//! to the surface context type and `$in` to the context argument name.

use crate::codegen::{slot_value, texture_argument, GenerationContext};
use crate::node::Node;
use crate::registry::FunctionSink;
use crate::requirements::ShaderGraphRequirements;
use crate::settings::CompilerSettings;
use crate::writer::ShaderWriter;
use serde::{Deserialize, Serialize};

/// Calls a precompiled function with its inputs, then its outputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionNode {
    /// Library type the node was created from
    pub node_type: String,
    /// Function name template
    pub function: String,
    /// Function body template; `None` when the function is provided elsewhere
    pub body: Option<String>,
    /// Whether the surface context is passed between inputs and outputs
    pub takes_context: bool,
    /// Capabilities the function reads
    pub requirements: ShaderGraphRequirements,
}

impl FunctionNode {
    /// Function name for `settings`
    pub fn function_name(&self, settings: &CompilerSettings) -> String {
        expand(&self.function, settings)
    }

    /// Register the function body, once per name
    pub fn generate_function<S: FunctionSink>(&self, settings: &CompilerSettings, sink: &mut S) {
        let Some(body) = &self.body else {
            return;
        };
        let name = self.function_name(settings);
        sink.provide_function(&name, |writer| writer.append_block(&expand(body, settings)));
    }

    /// Declare one local per output, then call the function
    pub fn generate_code(&self, node: &Node, ctx: &GenerationContext<'_>, writer: &mut ShaderWriter) {
        let precision = ctx.settings.precision;
        for slot in node.output_slots() {
            writer.add_line(format!(
                "{} {};",
                slot.value_type.shader_type(precision),
                node.variable_name_for_slot(slot.id)
            ));
        }

        let mut arguments: Vec<String> = node
            .input_slots()
            .map(|slot| texture_argument(slot.value_type, slot_value(ctx, node, slot.id)))
            .collect();
        if self.takes_context {
            arguments.push(ctx.settings.context_argument.clone());
        }
        arguments.extend(node.output_slots().map(|slot| node.variable_name_for_slot(slot.id)));

        writer.add_line(format!("{}({});", self.function_name(ctx.settings), arguments.join(", ")));
    }
}

fn expand(template: &str, settings: &CompilerSettings) -> String {
    template
        .replace("$precision", settings.precision.as_str())
        .replace("$context", &settings.context_type)
        .replace("$in", &settings.context_argument)
}
