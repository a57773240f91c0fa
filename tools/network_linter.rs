//! Network Linter: compiles networks without emitting output and reports
//! structural problems the compiler accepts but a designer probably did not mean.
//!
//! Usage: network_linter <networks>... [--config <file>]

#[path = "loading.rs"]
mod loading;
#[path = "logging.rs"]
mod logging;

use clap::Parser;
use dialogue_net::core::pipeline::{main_entry, NetworkCompiler};
use dialogue_net::schema::network::{ArcKind, Dispatch, Interaction, NetworkSystem, Position};
use rustc_hash::FxHashSet;
use std::path::PathBuf;
use std::process;

#[derive(Parser, Debug)]
#[command(name = "network_linter")]
#[command(about = "Validate conversation networks and report warnings")]
struct Cli {
    /// Network files or directories of .ron files
    #[arg(required = true)]
    networks: Vec<PathBuf>,

    /// Compiler configuration (RON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Treat warnings as errors
    #[arg(long)]
    strict: bool,
}

fn main() {
    let cli = Cli::parse();
    logging::init(false);

    let system = match loading::load_networks(&cli.networks) {
        Ok(system) => system,
        Err(e) => {
            eprintln!("ERROR: Failed to load networks: {}", e);
            process::exit(1);
        }
    };

    let arc_count: usize = system.networks.iter().map(|n| n.arcs.len()).sum();
    println!(
        "Loaded {} networks, {} arcs",
        system.networks.len(),
        arc_count
    );

    let mut errors = Vec::new();
    let mut builder = NetworkCompiler::builder();
    if let Some(path) = &cli.config {
        builder = builder.config_file(&path.to_string_lossy());
    }
    match builder.build().and_then(|c| c.compile(&system)) {
        Ok(compiled) => println!(
            "Compiled to {} topics, {} categories",
            compiled.topics.len(),
            compiled.category_count()
        ),
        Err(e) => errors.push(e.to_string()),
    }

    let warnings = lint_network(&system);

    println!("\n=== Network Lint Report ===\n");

    if errors.is_empty() && warnings.is_empty() {
        println!("All checks passed!");
    }

    for warning in &warnings {
        println!("WARNING: {}", warning);
    }

    for error in &errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} errors, {} warnings",
        errors.len(),
        warnings.len()
    );

    if !errors.is_empty() || (cli.strict && !warnings.is_empty()) {
        process::exit(1);
    }
}

fn lint_network(system: &NetworkSystem) -> Vec<String> {
    let mut warnings = Vec::new();

    // Networks nobody calls are dead weight.
    let mut called: FxHashSet<&str> = system
        .arcs()
        .filter_map(|(_, arc)| match &arc.kind {
            ArcKind::Recurent { entry, .. } => Some(entry.network.as_str()),
            _ => None,
        })
        .collect();
    if let Ok(main) = main_entry(system) {
        if let Some(network) = system.network(&main.network) {
            called.insert(network.name.as_str());
        }
    }

    for network in &system.networks {
        if !called.contains(network.name.as_str()) {
            warnings.push(format!(
                "network '{}' is neither the main network nor called by any arc",
                network.name
            ));
        }
        if network.entry_nodes().len() > 1 {
            warnings.push(format!(
                "network '{}' has several Enter nodes; calls must name one explicitly",
                network.name
            ));
        }

        for node in &network.nodes {
            let position = network.position(&node.name);
            if position == Position::Isolated {
                warnings.push(format!(
                    "node '{}.{}' has no arcs and is never reached",
                    network.name, node.name
                ));
                continue;
            }
            if position == Position::Exit && node.interaction == Interaction::Input {
                warnings.push(format!(
                    "exit node '{}.{}' is marked Input but exits never wait for input",
                    network.name, node.name
                ));
            }

            if node.dispatch == Dispatch::Random {
                for arc in network.out_arcs(&node.name).iter().filter(|a| a.priority == 0) {
                    warnings.push(format!(
                        "arc '{}' has priority 0 on random node '{}.{}' and is never drawn",
                        arc.name, network.name, node.name
                    ));
                }
            }
        }
    }

    warnings
}
