// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node kinds.

pub mod function;
pub mod output;
pub mod property;
pub mod subgraph;

pub use function::FunctionNode;
pub use output::SubGraphOutputNode;
pub use property::PropertyNode;
pub use subgraph::{SubGraphNode, SubGraphReference};
