// SPDX-License-Identifier: MIT OR Apache-2.0
//! Append-only sink for generated shader text.

use std::fmt;

const INDENT: &str = "    ";

/// How a chunk is placed in the output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkMode {
    /// Grouped inside the current scope, indented to its depth
    Body,
    /// Top-level line, written at column zero
    Statement,
}

/// Accumulates generated lines in emission order
#[derive(Debug, Clone, Default)]
pub struct ShaderWriter {
    lines: Vec<String>,
    depth: usize,
}

impl ShaderWriter {
    /// Create an empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk; multi-line chunks are split and placed line by line
    pub fn add_chunk(&mut self, chunk: impl AsRef<str>, mode: ChunkMode) {
        for line in chunk.as_ref().lines() {
            let line = line.trim_end();
            match mode {
                ChunkMode::Body if !line.is_empty() => {
                    self.lines.push(format!("{}{line}", INDENT.repeat(self.depth)));
                }
                ChunkMode::Body | ChunkMode::Statement => self.lines.push(line.to_string()),
            }
        }
    }

    /// Append a body line
    pub fn add_line(&mut self, line: impl AsRef<str>) {
        self.add_chunk(line, ChunkMode::Body);
    }

    /// Append a precompiled block verbatim, keeping its own indentation
    pub fn append_block(&mut self, block: &str) {
        self.add_chunk(block, ChunkMode::Body);
    }

    /// Open a brace scope
    pub fn open_brace(&mut self) {
        self.add_line("{");
        self.indent();
    }

    /// Close the innermost brace scope
    pub fn close_brace(&mut self) {
        self.deindent();
        self.add_line("}");
    }

    /// Increase the scope depth
    pub fn indent(&mut self) {
        self.depth += 1;
    }

    /// Decrease the scope depth
    pub fn deindent(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Current scope depth
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Lines written so far
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Whether nothing has been written
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Consume the writer and return the text
    pub fn finish(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ShaderWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}
