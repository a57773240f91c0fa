//! Preview: interactive conversation shell over a compiled network.
//!
//! Usage: preview <networks>... [--config <file>] [--seed <n>]
//!
//! Anything typed is sent as an utterance. Lines starting with `:` are
//! commands:
//!   :register   show the register
//!   :trace      show register writes of the last turn
//!   :reset      start a new conversation
//!   :seed <n>   reseed and start a new conversation
//!   :set <name> <value> assign a predicate
//!   :help       list commands
//!   :quit       exit

#[path = "loading.rs"]
mod loading;
#[path = "logging.rs"]
mod logging;

use clap::Parser;
use dialogue_net::core::pipeline::NetworkCompiler;
use dialogue_net::core::simulate::{Conversation, Machine};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

#[derive(Parser, Debug)]
#[command(name = "preview")]
#[command(about = "Talk to a compiled conversation network")]
struct Cli {
    /// Network files or directories of .ron files
    #[arg(required = true)]
    networks: Vec<PathBuf>,

    /// Compiler configuration (RON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed for random dispatch
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Log every matched category
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let system = match loading::load_networks(&cli.networks) {
        Ok(system) => system,
        Err(e) => {
            eprintln!("ERROR: Failed to load networks: {}", e);
            process::exit(1);
        }
    };

    let mut builder = NetworkCompiler::builder();
    if let Some(path) = &cli.config {
        builder = builder.config_file(&path.to_string_lossy());
    }
    let compiler = match builder.build() {
        Ok(compiler) => compiler,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            process::exit(1);
        }
    };
    let compiled = match compiler.compile(&system) {
        Ok(compiled) => compiled,
        Err(e) => {
            eprintln!("ERROR: Compilation failed: {}", e);
            process::exit(1);
        }
    };

    println!(
        "Compiled {} networks into {} topics, {} categories",
        system.networks.len(),
        compiled.topics.len(),
        compiled.category_count()
    );
    println!("Seed: {}", cli.seed);
    println!("Type ':help' for commands.\n");

    let machine = Machine::new(&compiled);
    let mut seed = cli.seed;
    let mut conversation = Conversation::new(compiler.config(), seed);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("you> ");
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix(':') {
            let parts: Vec<&str> = command.split_whitespace().collect();
            match parts.first().copied().unwrap_or("") {
                "quit" | "exit" | "q" => {
                    println!("Goodbye.");
                    break;
                }
                "help" | "h" | "?" => print_help(),
                "register" | "r" => println!("register: '{}'", conversation.register()),
                "trace" | "t" => {
                    for (i, value) in conversation.trace().iter().enumerate() {
                        println!("  {:>3}  '{}'", i + 1, value);
                    }
                }
                "reset" => {
                    conversation = Conversation::new(compiler.config(), seed);
                    println!("Conversation reset.");
                }
                "seed" => match parts.get(1).map(|s| s.parse::<u64>()) {
                    Some(Ok(n)) => {
                        seed = n;
                        conversation = Conversation::new(compiler.config(), seed);
                        println!("Seed set to {}, conversation reset.", seed);
                    }
                    Some(Err(_)) => println!("Invalid seed: {}", parts[1]),
                    None => println!("Current seed: {}", seed),
                },
                "set" if parts.len() >= 2 => {
                    let value = parts[2..].join(" ");
                    conversation.set_predicate(parts[1], &value);
                    println!("{} = '{}'", parts[1], value);
                }
                other => println!("Unknown command ':{}'. Type ':help'.", other),
            }
            continue;
        }

        conversation.clear_trace();
        match machine.respond(&mut conversation, line) {
            Ok(reply) if reply.is_empty() => println!("bot> (no reply)"),
            Ok(reply) => println!("bot> {}", reply),
            Err(e) => println!("ERROR: {}", e),
        }
    }
}

fn print_help() {
    println!("Commands:");
    println!("  :register           show the register");
    println!("  :trace              show register writes of the last turn");
    println!("  :reset              start a new conversation");
    println!("  :seed <n>           reseed and start a new conversation");
    println!("  :set <name> <value> assign a predicate");
    println!("  :help               list commands");
    println!("  :quit               exit");
    println!("Anything else is sent as an utterance.");
}
