// SPDX-License-Identifier: MIT OR Apache-2.0
//! Command-line shader graph compiler.
//!
//! ```text
//! ordoplay_shadergraph compile <project.ron> [--settings <file>] [--output <file>]
//! ordoplay_shadergraph demo <project.ron>
//! ```

use clap::{Parser, Subcommand};
use ordoplay_shader_graph::graph::ConnectionError;
use ordoplay_shader_graph::library::create_function_library;
use ordoplay_shader_graph::nodes::PropertyNode;
use ordoplay_shader_graph::property::PropertyError;
use ordoplay_shader_graph::settings::SettingsError;
use ordoplay_shader_graph::slot::SlotError;
use ordoplay_shader_graph::{
    AssetStore, CompileError, CompilerSettings, Node, Property, PropertyValue, ShaderCompiler, ShaderGraph, SlotId,
    SubGraphAsset,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "ordoplay_shadergraph")]
#[command(version)]
#[command(about = "Compile OrdoPlay shader graphs with nested sub-graphs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a project file to shader source
    Compile {
        /// Project file (.ron)
        project: PathBuf,
        /// Compiler settings overriding the ones stored in the project
        #[arg(long)]
        settings: Option<PathBuf>,
        /// Write the source here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a small example project
    Demo {
        /// Destination project file
        path: PathBuf,
    },
}

/// A root graph together with the sub-graphs it may reference
#[derive(Debug, Serialize, Deserialize)]
struct ShaderProject {
    #[serde(default)]
    settings: CompilerSettings,
    root: ShaderGraph,
    #[serde(default)]
    sub_graphs: Vec<SubGraphAsset>,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse project: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("Failed to serialize project: {0}")]
    Serialize(#[from] ron::Error),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("Unknown node template '{0}'")]
    MissingTemplate(String),
    #[error(transparent)]
    Slot(#[from] SlotError),
    #[error(transparent)]
    Property(#[from] PropertyError),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    Compile(#[from] CompileError),
}

fn main() {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(err) = run(cli.command) {
        tracing::error!("{}", err);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Compile {
            project,
            settings,
            output,
        } => compile(&project, settings.as_deref(), output.as_deref()),
        Commands::Demo { path } => write_demo(&path),
    }
}

fn read(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write(path: &Path, contents: &str) -> Result<(), CliError> {
    std::fs::write(path, contents).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn compile(project_path: &Path, settings_path: Option<&Path>, output: Option<&Path>) -> Result<(), CliError> {
    let ShaderProject {
        settings,
        mut root,
        sub_graphs,
    } = ron::from_str(&read(project_path)?)?;
    let settings = match settings_path {
        Some(path) => CompilerSettings::load(path)?,
        None => settings,
    };

    let mut assets = AssetStore::new();
    for asset in sub_graphs {
        assets.insert(asset);
    }
    tracing::info!("Loaded '{}' with {} sub-graph(s)", root.name, assets.len());

    // Definitions may have changed since the project was saved
    let refreshed = root.refresh_sub_graph_nodes(&assets)?;
    if refreshed > 0 {
        tracing::info!("Updated {} sub-graph node(s)", refreshed);
    }

    let compiled = ShaderCompiler::new(settings).compile(&mut root, &assets)?;
    for warning in &compiled.report.warnings {
        eprintln!("warning: {warning}");
    }

    let source = compiled.to_source();
    match output {
        Some(path) => {
            write(path, &source)?;
            tracing::info!("Wrote {:?}", path);
        }
        None => print!("{source}"),
    }
    Ok(())
}

/// Write a small project: a "Tinted" sub-graph used twice by the root graph
fn write_demo(path: &Path) -> Result<(), CliError> {
    let project = demo_project()?;
    let config = ron::ser::PrettyConfig::default().struct_names(true);
    let contents = ron::ser::to_string_pretty(&project, config)?;
    write(path, &contents)?;
    tracing::info!("Wrote demo project to {:?}", path);
    Ok(())
}

fn demo_project() -> Result<ShaderProject, CliError> {
    let library = create_function_library();
    let node = |id: &str| {
        library
            .create_node(id)
            .ok_or_else(|| CliError::MissingTemplate(id.to_string()))
    };

    let mut tinted = ShaderGraph::new_sub_graph("Tinted");
    let tint = Property::new("Tint", PropertyValue::Color([1.0, 0.5, 0.25, 1.0])).with_reference_name("Tint");
    tinted.add_property(tint.clone())?;
    tinted.add_output();
    let Some(output) = tinted.output_node_id() else {
        return Err(CliError::MissingTemplate("SubGraphOutputs".to_string()));
    };
    let read_tint = tinted.add_node(Node::property(&tint)?);
    let color = tinted.add_node(node("vertex_color")?);
    let multiply = tinted.add_node(node("multiply")?);
    tinted.connect(read_tint, PropertyNode::OUTPUT, multiply, SlotId::positional(0))?;
    tinted.connect(color, SlotId::positional(0), multiply, SlotId::positional(1))?;
    tinted.connect(multiply, SlotId::positional(2), output, SlotId::positional(1))?;

    let mut assets = AssetStore::new();
    let tinted = assets.insert(SubGraphAsset::new("Tinted", tinted));

    let mut root = ShaderGraph::new("Demo");
    let first = root.add_node(Node::sub_graph(Some(tinted.handle), &assets)?.with_position(0.0, 0.0));
    let second = root.add_node(Node::sub_graph(Some(tinted.handle), &assets)?.with_position(0.0, 120.0));
    let add = root.add_node(node("add")?.with_position(240.0, 60.0));
    root.connect(first, SlotId::positional(1), add, SlotId::positional(0))?;
    root.connect(second, SlotId::positional(1), add, SlotId::positional(1))?;

    Ok(ShaderProject {
        settings: CompilerSettings::default(),
        root,
        sub_graphs: vec![(*tinted).clone()],
    })
}
