//! Conversation network model: nodes, arcs, networks.
//!
//! The compiler only reads this model. Position roles are derived from the
//! arcs of a network, so they can never disagree with the node degrees.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("duplicate network name '{0}'")]
    DuplicateNetwork(String),
    #[error("duplicate node '{node}' in network '{network}'")]
    DuplicateNode { network: String, node: String },
    #[error("duplicate arc name '{0}'")]
    DuplicateArc(String),
    #[error("register token '{0}' is produced by more than one node or arc")]
    DuplicateToken(String),
    #[error("arc '{arc}' references unknown node '{node}' in network '{network}'")]
    UnknownNode {
        network: String,
        arc: String,
        node: String,
    },
    #[error("unknown network '{0}'")]
    UnknownNetwork(String),
    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },
}

/// Structural role of a node, derived from its degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    /// No incoming arcs, at least one outgoing arc.
    Enter,
    Inner,
    /// No outgoing arcs, at least one incoming arc.
    Exit,
    /// No arcs at all.
    Isolated,
}

impl Position {
    pub fn from_degrees(in_degree: usize, out_degree: usize) -> Self {
        match (in_degree, out_degree) {
            (0, 0) => Self::Isolated,
            (0, _) => Self::Enter,
            (_, 0) => Self::Exit,
            _ => Self::Inner,
        }
    }
}

/// Whether reaching a node waits for the next utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Interaction {
    /// Suspend until the next external input.
    #[default]
    Input,
    /// Continue with the current input.
    Processing,
}

/// How a node's outgoing arcs are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Dispatch {
    /// Highest priority first.
    #[default]
    Ordered,
    /// Weighted by priority, without replacement.
    Random,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    #[serde(default)]
    pub interaction: Interaction,
    #[serde(default)]
    pub dispatch: Dispatch,
}

impl Node {
    pub fn new(name: &str, interaction: Interaction, dispatch: Dispatch) -> Self {
        Self {
            name: name.to_string(),
            interaction,
            dispatch,
        }
    }
}

/// Reference to an Enter node of some network, the target of a sub-graph call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryRef {
    pub network: String,
    pub node: String,
}

/// The guard and effect of an arc.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArcKind {
    /// Matches the utterance (and optionally the previous reply).
    Pattern {
        #[serde(default)]
        code: String,
        pattern: String,
        #[serde(default)]
        that: Option<String>,
    },
    /// Compares a named predicate with an expected pattern.
    PredicateTest {
        #[serde(default)]
        code: String,
        predicate: String,
        expected: String,
    },
    /// Compares the result of running `tested_code` with an expected pattern.
    CodeTest {
        #[serde(default)]
        code: String,
        tested_code: String,
        expected: String,
    },
    /// Calls another network and continues to the target when it succeeds.
    Recurent {
        #[serde(default)]
        code: String,
        #[serde(default)]
        return_code: String,
        entry: EntryRef,
    },
    /// Always taken.
    Transition {
        #[serde(default)]
        code: String,
    },
}

impl ArcKind {
    /// Code run when the arc is taken.
    pub fn code(&self) -> &str {
        match self {
            Self::Pattern { code, .. }
            | Self::PredicateTest { code, .. }
            | Self::CodeTest { code, .. }
            | Self::Recurent { code, .. }
            | Self::Transition { code } => code,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pattern { .. } => "pattern",
            Self::PredicateTest { .. } => "predicate-test",
            Self::CodeTest { .. } => "code-test",
            Self::Recurent { .. } => "recurent",
            Self::Transition { .. } => "transition",
        }
    }
}

fn default_priority() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arc {
    pub name: String,
    #[serde(default = "default_priority")]
    pub priority: u32,
    pub source: String,
    pub target: String,
    pub kind: ArcKind,
}

impl Arc {
    pub fn new(name: &str, priority: u32, source: &str, target: &str, kind: ArcKind) -> Self {
        Self {
            name: name.to_string(),
            priority,
            source: source.to_string(),
            target: target.to_string(),
            kind,
        }
    }
}

/// A named graph of nodes and arcs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Network {
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub arcs: Vec<Arc>,
}

impl Network {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            nodes: Vec::new(),
            arcs: Vec::new(),
        }
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn in_degree(&self, node: &str) -> usize {
        self.arcs.iter().filter(|a| a.target == node).count()
    }

    pub fn out_degree(&self, node: &str) -> usize {
        self.arcs.iter().filter(|a| a.source == node).count()
    }

    /// Position role of `node` given the current arcs.
    pub fn position(&self, node: &str) -> Position {
        Position::from_degrees(self.in_degree(node), self.out_degree(node))
    }

    /// Outgoing arcs of `node`, in declaration order.
    pub fn out_arcs(&self, node: &str) -> Vec<&Arc> {
        self.arcs.iter().filter(|a| a.source == node).collect()
    }

    /// Names of all Enter nodes, in declaration order.
    pub fn entry_nodes(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|n| self.position(&n.name) == Position::Enter)
            .map(|n| n.name.as_str())
            .collect()
    }
}

/// Every network of a project, plus the entry point of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NetworkSystem {
    #[serde(default)]
    pub networks: Vec<Network>,
    /// Where a conversation starts. Defaults to the single Enter node of the
    /// first network.
    #[serde(default)]
    pub main: Option<EntryRef>,
}

impl NetworkSystem {
    /// Load a network system from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<NetworkSystem, NetworkError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse a network system from a RON string.
    pub fn parse_ron(input: &str) -> Result<NetworkSystem, NetworkError> {
        Ok(ron::from_str(input)?)
    }

    pub fn network(&self, name: &str) -> Option<&Network> {
        self.networks.iter().find(|n| n.name == name)
    }

    /// All arcs of all networks, with the network they belong to.
    pub fn arcs(&self) -> impl Iterator<Item = (&Network, &Arc)> {
        self.networks
            .iter()
            .flat_map(|net| net.arcs.iter().map(move |arc| (net, arc)))
    }

    /// All nodes of all networks, with the network they belong to.
    pub fn nodes(&self) -> impl Iterator<Item = (&Network, &Node)> {
        self.networks
            .iter()
            .flat_map(|net| net.nodes.iter().map(move |node| (net, node)))
    }

    /// Merge another system into this one. Networks from `other` replace
    /// networks of the same name.
    pub fn merge(&mut self, other: NetworkSystem) {
        for network in other.networks {
            if let Some(existing) = self.networks.iter_mut().find(|n| n.name == network.name) {
                *existing = network;
            } else {
                self.networks.push(network);
            }
        }
        if other.main.is_some() {
            self.main = other.main;
        }
    }
}
