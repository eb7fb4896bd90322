// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shader graph compiler for `OrdoPlay`.
//!
//! Turns a graph of typed nodes into shader source plus the metadata needed
//! to bind its parameters:
//! - Function nodes call precompiled functions
//! - Sub-graph nodes expand to one generated function per referenced
//!   sub-graph, with slots derived from the sub-graph's properties and
//!   output ports
//! - Capability requirements (normals, UVs, time, ...) are aggregated
//!   through nested sub-graphs
//!
//! ## Architecture
//!
//! A compilation pass validates the graph (rejecting cyclic sub-graph
//! references), registers every called function once in a
//! [`FunctionRegistry`], then writes the entry function with a
//! [`ShaderWriter`]. See [`ShaderCompiler`].

pub mod asset;
pub mod codegen;
pub mod compiler;
pub mod connection;
pub mod error;
pub mod graph;
pub mod library;
pub mod node;
pub mod nodes;
pub mod property;
pub mod registry;
pub mod requirements;
pub mod settings;
pub mod shader_graph;
pub mod slot;
pub mod validation;
pub mod writer;

pub use asset::{AssetHandle, AssetResolver, AssetStore, SubGraphAsset};
pub use compiler::{CompiledShader, ShaderCompiler};
pub use connection::{Connection, ConnectionId};
pub use error::{CompileError, Result};
pub use graph::Graph;
pub use node::{Node, NodeId, NodeKind};
pub use property::{Property, PropertyKind, PropertyValue};
pub use registry::{FunctionRegistry, FunctionSink, SharedFunctionRegistry};
pub use requirements::{Capability, MayRequire, NeededCoordinateSpace, ShaderGraphRequirements, UvChannel};
pub use settings::{CompilerSettings, Precision};
pub use shader_graph::ShaderGraph;
pub use slot::{Slot, SlotDirection, SlotId, SlotValue, SlotValueType};
pub use writer::{ChunkMode, ShaderWriter};
