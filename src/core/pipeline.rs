//! The compiler pipeline: Network → CompiledSystem orchestration.
//!
//! Validates the network system, then wires together the stack, dispatch
//! and arc processors and the two libraries. Compilation either produces a
//! complete system or fails; there is no partial output.

use rustc_hash::{FxHashMap, FxHashSet};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::arcs::{self, ArcContext};
use crate::core::config::{CompilerConfig, ConfigError, Limits, MAX_CAPACITY};
use crate::core::instruction::{fall_through, lower_all, set_register};
use crate::core::{dispatch, randomize, recursion, stack};
use crate::schema::naming::{validate_token, NamingAuthority, SystemNames};
use crate::schema::network::{
    ArcKind, Dispatch, EntryRef, Interaction, Network, NetworkError, NetworkSystem, Node,
    Position,
};
use crate::schema::template::{Category, CompiledSystem, Element, Pattern, PatternError, Topic};

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("network error: {0}")]
    Network(#[from] NetworkError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid pattern on arc '{arc}': {source}")]
    Pattern { arc: String, source: PatternError },
    #[error("limit '{name}' must not be negative, got {value}")]
    NegativeLimit { name: &'static str, value: i64 },
    #[error("{marker} marker '{name}' collides with a name used by the network")]
    MarkerCollision { marker: &'static str, name: String },
    #[error("markers '{first}' and '{second}' must be distinct, both are '{value}'")]
    DuplicateMarker {
        first: &'static str,
        second: &'static str,
        value: String,
    },
    #[error("{marker} marker is not a valid token: {source}")]
    InvalidMarker {
        marker: &'static str,
        source: NetworkError,
    },
    #[error("limits {max_priority} x {max_fanout} exceed the library ceiling of {ceiling} slots")]
    LimitTooLarge {
        max_priority: u32,
        max_fanout: u32,
        ceiling: usize,
    },
    #[error("random node '{node}' needs {required} slots, library capacity is {capacity}")]
    CapacityExceeded {
        node: String,
        required: usize,
        capacity: usize,
    },
    #[error("arc '{arc}' calls '{network}.{node}', which is not an Enter node")]
    NotAnEntry {
        arc: String,
        network: String,
        node: String,
    },
    #[error("arc '{arc}' calls unknown network '{network}'")]
    UnknownNetwork { arc: String, network: String },
    #[error("no entry point: network '{0}' has no Enter node")]
    NoEntry(String),
    #[error("network system is empty")]
    EmptySystem,
    #[error("ambiguous entry point: network '{network}' has Enter nodes {nodes:?}")]
    AmbiguousEntry { network: String, nodes: Vec<String> },
    #[error("cycle of processing nodes never waits for input: {}", .path.join(" -> "))]
    UnguardedCycle { path: Vec<String> },
}

/// Compiles network systems. Built via `NetworkCompiler::builder()`.
#[derive(Debug, Clone)]
pub struct NetworkCompiler {
    config: CompilerConfig,
}

/// Builder for constructing a `NetworkCompiler`.
pub struct NetworkCompilerBuilder {
    config_path: Option<String>,
    /// Directly provided configuration (for testing without files).
    config: Option<CompilerConfig>,
    max_priority: Option<i64>,
    max_fanout: Option<i64>,
    register: Option<String>,
}

impl NetworkCompiler {
    pub fn builder() -> NetworkCompilerBuilder {
        NetworkCompilerBuilder {
            config_path: None,
            config: None,
            max_priority: None,
            max_fanout: None,
            register: None,
        }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile with the default naming authority.
    pub fn compile(&self, system: &NetworkSystem) -> Result<CompiledSystem, CompileError> {
        let names = SystemNames::build(system, &self.config.continuation_suffix)?;
        self.compile_with(system, &names)
    }

    /// Compile with a caller-supplied naming authority.
    ///
    /// The authority is trusted to have checked name uniqueness and arc
    /// endpoints; everything else is validated here.
    pub fn compile_with(
        &self,
        system: &NetworkSystem,
        names: &dyn NamingAuthority,
    ) -> Result<CompiledSystem, CompileError> {
        let config = &self.config;
        let limits = self.limits(system)?;
        check_markers(config, system, names)?;
        let main = main_entry(system)?;
        check_calls(system)?;
        check_capacity(system, limits)?;
        check_cycles(system)?;

        let mut topics = Vec::new();
        for network in &system.networks {
            debug!(
                network = %network.name,
                nodes = network.nodes.len(),
                arcs = network.arcs.len(),
                "compiling network"
            );

            for node in &network.nodes {
                let position = network.position(&node.name);
                if position == Position::Isolated {
                    warn!(
                        network = %network.name,
                        node = %node.name,
                        "isolated node compiles to nothing"
                    );
                }

                let mut instructions = stack::process(network, node, &config.markers);
                instructions.extend(dispatch::process(network, node));

                let mut template = lower_all(&instructions, config);
                if continues_at_once(network, node) {
                    template.push(fall_through());
                }
                topics.push(Topic {
                    name: Pattern::register_front(&names.node_token(&network.name, &node.name)),
                    categories: vec![Category::new(Pattern::any(), template)],
                });
            }

            let ctx = ArcContext {
                config,
                names,
                network,
            };
            for arc in &network.arcs {
                topics.extend(arcs::process(arc, &ctx)?);
            }
        }

        topics.extend(recursion::generate(config));
        topics.push(randomize::generate(config, limits, names)?);

        // An empty register starts the conversation at the main entry.
        let entry_token = names.node_token(&main.network, &main.node);
        topics.push(Topic {
            name: Pattern::default_scope(),
            categories: vec![Category::new(
                Pattern::any(),
                vec![
                    set_register(&config.register, vec![Element::Text(entry_token)]),
                    fall_through(),
                ],
            )],
        });

        let compiled = CompiledSystem { topics };
        info!(
            networks = system.networks.len(),
            topics = compiled.topics.len(),
            categories = compiled.category_count(),
            max_priority = limits.max_priority,
            max_fanout = limits.max_fanout,
            "compiled network system"
        );
        Ok(compiled)
    }

    /// Configured limits, or the ones the system needs.
    fn limits(&self, system: &NetworkSystem) -> Result<Limits, CompileError> {
        let derived = Limits::derive(system);
        let limits = Limits {
            max_priority: limit("max_priority", self.config.max_priority, derived.max_priority)?,
            max_fanout: limit("max_fanout", self.config.max_fanout, derived.max_fanout)?,
        };
        if limits.capacity() > MAX_CAPACITY {
            return Err(CompileError::LimitTooLarge {
                max_priority: limits.max_priority,
                max_fanout: limits.max_fanout,
                ceiling: MAX_CAPACITY,
            });
        }
        Ok(limits)
    }
}

/// Processing nodes and exits re-dispatch the utterance that reached them.
/// An exit has nothing left to ask, so it never waits for input.
fn continues_at_once(network: &Network, node: &Node) -> bool {
    match network.position(&node.name) {
        Position::Isolated => false,
        Position::Exit => true,
        Position::Enter | Position::Inner => node.interaction == Interaction::Processing,
    }
}

fn limit(name: &'static str, configured: Option<i64>, derived: u32) -> Result<u32, CompileError> {
    match configured {
        None => Ok(derived),
        Some(value) if value < 0 => Err(CompileError::NegativeLimit { name, value }),
        Some(value) => Ok(u32::try_from(value).unwrap_or(u32::MAX)),
    }
}

/// Markers must be valid tokens, distinct from each other and from the
/// register, and unused by the network.
fn check_markers(
    config: &CompilerConfig,
    system: &NetworkSystem,
    names: &dyn NamingAuthority,
) -> Result<(), CompileError> {
    let mut reserved: Vec<(&'static str, &str)> = config.markers.all().to_vec();
    reserved.push(("register", config.register.as_str()));

    let mut seen: FxHashMap<String, &'static str> = FxHashMap::default();
    for &(label, value) in &reserved {
        validate_token(value).map_err(|source| CompileError::InvalidMarker {
            marker: label,
            source,
        })?;
        if let Some(first) = seen.insert(value.to_uppercase(), label) {
            return Err(CompileError::DuplicateMarker {
                first,
                second: label,
                value: value.to_string(),
            });
        }
    }

    // The register and scratch predicate only clash with predicate names.
    for (label, value) in config.markers.all() {
        if label != "testing" && names.is_taken(value) {
            return Err(CompileError::MarkerCollision {
                marker: label,
                name: value.to_string(),
            });
        }
    }
    for (_, arc) in system.arcs() {
        if let ArcKind::PredicateTest { predicate, .. } = &arc.kind {
            let predicates = [
                ("register", &config.register),
                ("testing", &config.markers.testing),
            ];
            for (label, value) in predicates {
                if predicate.eq_ignore_ascii_case(value) {
                    return Err(CompileError::MarkerCollision {
                        marker: label,
                        name: predicate.clone(),
                    });
                }
            }
        }
    }
    Ok(())
}

/// Where the conversation starts: the configured main entry, or the single
/// Enter node of the first network.
pub fn main_entry(system: &NetworkSystem) -> Result<EntryRef, CompileError> {
    if let Some(main) = &system.main {
        let network = system
            .network(&main.network)
            .ok_or_else(|| NetworkError::UnknownNetwork(main.network.clone()))?;
        if network.node(&main.node).is_none() || network.position(&main.node) != Position::Enter {
            return Err(CompileError::NotAnEntry {
                arc: "main".to_string(),
                network: main.network.clone(),
                node: main.node.clone(),
            });
        }
        return Ok(main.clone());
    }

    let network = system
        .networks
        .first()
        .ok_or(CompileError::EmptySystem)?;
    match network.entry_nodes().as_slice() {
        [] => Err(CompileError::NoEntry(network.name.clone())),
        [node] => Ok(EntryRef {
            network: network.name.clone(),
            node: node.to_string(),
        }),
        nodes => Err(CompileError::AmbiguousEntry {
            network: network.name.clone(),
            nodes: nodes.iter().map(|n| n.to_string()).collect(),
        }),
    }
}

/// Every sub-graph call must land on an Enter node.
fn check_calls(system: &NetworkSystem) -> Result<(), CompileError> {
    for (_, arc) in system.arcs() {
        let ArcKind::Recurent { entry, .. } = &arc.kind else {
            continue;
        };
        let callee = system
            .network(&entry.network)
            .ok_or_else(|| CompileError::UnknownNetwork {
                arc: arc.name.clone(),
                network: entry.network.clone(),
            })?;
        if callee.node(&entry.node).is_none() || callee.position(&entry.node) != Position::Enter {
            return Err(CompileError::NotAnEntry {
                arc: arc.name.clone(),
                network: entry.network.clone(),
                node: entry.node.clone(),
            });
        }
    }
    Ok(())
}

/// A random node's weighted list must fit the randomize library.
fn check_capacity(system: &NetworkSystem, limits: Limits) -> Result<(), CompileError> {
    let capacity = limits.capacity();
    for (network, node) in system.nodes() {
        if node.dispatch != Dispatch::Random {
            continue;
        }
        let required: usize = network
            .out_arcs(&node.name)
            .iter()
            .map(|a| a.priority as usize)
            .sum();
        if required > capacity {
            return Err(CompileError::CapacityExceeded {
                node: format!("{}.{}", network.name, node.name),
                required,
                capacity,
            });
        }
    }
    Ok(())
}

/// Reject cycles of nodes that never wait for input: they would re-dispatch
/// the same utterance forever.
fn check_cycles(system: &NetworkSystem) -> Result<(), CompileError> {
    let processing: FxHashSet<(&str, &str)> = system
        .nodes()
        .filter(|(network, node)| continues_at_once(network, node))
        .map(|(net, node)| (net.name.as_str(), node.name.as_str()))
        .collect();

    let mut pairs = Vec::new();
    for (network, arc) in system.arcs() {
        let source = (network.name.as_str(), arc.source.as_str());
        let target = (network.name.as_str(), arc.target.as_str());
        match &arc.kind {
            ArcKind::Recurent { entry, .. } => {
                pairs.push((source, (entry.network.as_str(), entry.node.as_str())));
                // A sub-graph that finishes without input continues at the target.
                if let Some(callee) = system.network(&entry.network) {
                    for node in &callee.nodes {
                        if callee.position(&node.name) == Position::Exit {
                            pairs.push(((callee.name.as_str(), node.name.as_str()), target));
                        }
                    }
                }
            }
            _ => pairs.push((source, target)),
        }
    }

    let mut edges: FxHashMap<(&str, &str), Vec<(&str, &str)>> = FxHashMap::default();
    for (from, to) in pairs {
        if processing.contains(&from) && processing.contains(&to) {
            edges.entry(from).or_default().push(to);
        }
    }

    // Iterate in declaration order so the reported path is deterministic.
    let order: Vec<(&str, &str)> = system
        .nodes()
        .map(|(net, node)| (net.name.as_str(), node.name.as_str()))
        .filter(|key| processing.contains(key))
        .collect();

    let mut done: FxHashSet<(&str, &str)> = FxHashSet::default();
    for start in order {
        let mut path = Vec::new();
        if let Some(cycle) = visit(start, &edges, &mut done, &mut path) {
            return Err(CompileError::UnguardedCycle {
                path: cycle
                    .iter()
                    .map(|(net, node)| format!("{}.{}", net, node))
                    .collect(),
            });
        }
    }
    Ok(())
}

fn visit<'a>(
    node: (&'a str, &'a str),
    edges: &FxHashMap<(&'a str, &'a str), Vec<(&'a str, &'a str)>>,
    done: &mut FxHashSet<(&'a str, &'a str)>,
    path: &mut Vec<(&'a str, &'a str)>,
) -> Option<Vec<(&'a str, &'a str)>> {
    if let Some(at) = path.iter().position(|n| *n == node) {
        let mut cycle = path[at..].to_vec();
        cycle.push(node);
        return Some(cycle);
    }
    if done.contains(&node) {
        return None;
    }

    path.push(node);
    for next in edges.get(&node).into_iter().flatten() {
        if let Some(cycle) = visit(*next, edges, done, path) {
            return Some(cycle);
        }
    }
    path.pop();
    done.insert(node);
    None
}

impl NetworkCompilerBuilder {
    pub fn config_file(mut self, path: &str) -> Self {
        self.config_path = Some(path.to_string());
        self
    }

    /// Provide the configuration directly (for testing without files).
    pub fn with_config(mut self, config: CompilerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn max_priority(mut self, value: i64) -> Self {
        self.max_priority = Some(value);
        self
    }

    pub fn max_fanout(mut self, value: i64) -> Self {
        self.max_fanout = Some(value);
        self
    }

    pub fn register(mut self, name: &str) -> Self {
        self.register = Some(name.to_string());
        self
    }

    pub fn build(self) -> Result<NetworkCompiler, CompileError> {
        let mut config = match (&self.config_path, self.config) {
            (Some(path), _) => CompilerConfig::load_from_ron(Path::new(path))?,
            (None, Some(config)) => config,
            (None, None) => CompilerConfig::default(),
        };

        // Explicit settings override the file.
        if self.max_priority.is_some() {
            config.max_priority = self.max_priority;
        }
        if self.max_fanout.is_some() {
            config.max_fanout = self.max_fanout;
        }
        if let Some(register) = self.register {
            config.register = register;
        }

        Ok(NetworkCompiler { config })
    }
}
