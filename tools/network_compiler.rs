//! Network Compiler: turns RON conversation networks into an AIML file.
//!
//! Usage: network_compiler <networks>... [--config <file>] [-o <file>]

#[path = "loading.rs"]
mod loading;
#[path = "logging.rs"]
mod logging;

use clap::Parser;
use dialogue_net::core::pipeline::NetworkCompiler;
use dialogue_net::core::render::{AimlRenderer, RenderOptions};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "network_compiler")]
#[command(about = "Compile conversation networks into AIML topics and categories")]
struct Cli {
    /// Network files or directories of .ron files
    #[arg(required = true)]
    networks: Vec<PathBuf>,

    /// Compiler configuration (RON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output file; stdout when absent
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Largest arc priority of random nodes (P)
    #[arg(long, allow_negative_numbers = true)]
    max_priority: Option<i64>,

    /// Largest fan-out of random nodes (B)
    #[arg(long, allow_negative_numbers = true)]
    max_fanout: Option<i64>,

    /// Prefix put on every AIML element
    #[arg(long)]
    prefix: Option<String>,

    /// Namespace declaration, `prefix=uri` (repeatable; empty prefix for the default)
    #[arg(long = "namespace", value_parser = parse_namespace)]
    namespaces: Vec<(String, String)>,

    /// Log compiler progress
    #[arg(short, long)]
    verbose: bool,
}

fn parse_namespace(value: &str) -> Result<(String, String), String> {
    value
        .split_once('=')
        .map(|(prefix, uri)| (prefix.to_string(), uri.to_string()))
        .ok_or_else(|| format!("expected prefix=uri, got '{}'", value))
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let system = match loading::load_networks(&cli.networks) {
        Ok(system) => system,
        Err(e) => {
            error!("failed to load networks: {}", e);
            process::exit(1);
        }
    };
    info!(networks = system.networks.len(), "networks loaded");

    let mut builder = NetworkCompiler::builder();
    if let Some(path) = &cli.config {
        builder = builder.config_file(&path.to_string_lossy());
    }
    if let Some(p) = cli.max_priority {
        builder = builder.max_priority(p);
    }
    if let Some(b) = cli.max_fanout {
        builder = builder.max_fanout(b);
    }

    let compiled = match builder.build().and_then(|c| c.compile(&system)) {
        Ok(compiled) => compiled,
        Err(e) => {
            error!("compilation failed: {}", e);
            process::exit(1);
        }
    };

    let renderer = AimlRenderer::new(RenderOptions {
        prefix: cli.prefix,
        namespaces: cli.namespaces.into_iter().collect::<BTreeMap<_, _>>(),
        ..RenderOptions::default()
    });
    let aiml = renderer.render(&compiled);

    match &cli.output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, aiml) {
                error!("failed to write {}: {}", path.display(), e);
                process::exit(1);
            }
            info!(
                path = %path.display(),
                topics = compiled.topics.len(),
                categories = compiled.category_count(),
                "AIML written"
            );
        }
        None => print!("{}", aiml),
    }
}
