//! Compiler configuration: reserved marker names and library limits.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::schema::network::{Dispatch, NetworkSystem};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// Reserved register tokens and predicate names used for control flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Markers {
    /// Input word selecting the randomize library.
    pub randomize: String,
    /// Pushed by Exit nodes: unwind to the nearest pull-stop.
    pub pull: String,
    /// Pushed by Enter nodes: boundary of a network's alternatives.
    pub pull_stop: String,
    /// Sits under a sub-graph call, above the caller's continuation.
    #[serde(rename = "return")]
    pub ret: String,
    pub success: String,
    pub fail: String,
    /// Scratch predicate caching the result of a code test.
    pub testing: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            randomize: "RANDOMIZE".to_string(),
            pull: "PULL".to_string(),
            pull_stop: "PULLSTOP".to_string(),
            ret: "RETURN".to_string(),
            success: "SUCCESS".to_string(),
            fail: "FAIL".to_string(),
            testing: "TESTING".to_string(),
        }
    }
}

impl Markers {
    /// Every marker, labelled by its configuration key.
    pub fn all(&self) -> [(&'static str, &str); 7] {
        [
            ("randomize", self.randomize.as_str()),
            ("pull", self.pull.as_str()),
            ("pull_stop", self.pull_stop.as_str()),
            ("return", self.ret.as_str()),
            ("success", self.success.as_str()),
            ("fail", self.fail.as_str()),
            ("testing", self.testing.as_str()),
        ]
    }
}

fn default_register() -> String {
    "topic".to_string()
}

fn default_continuation_suffix() -> String {
    "_RETURNED".to_string()
}

/// Everything the compiler needs besides the network itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerConfig {
    #[serde(default)]
    pub markers: Markers,
    /// Predicate holding the virtual stack. It must be the one the target
    /// runtime matches topics against.
    #[serde(default = "default_register")]
    pub register: String,
    /// Appended to an arc name to form its sub-graph continuation marker.
    #[serde(default = "default_continuation_suffix")]
    pub continuation_suffix: String,
    /// Largest arc priority the randomize library must handle (P).
    /// Derived from the network when absent.
    #[serde(default)]
    pub max_priority: Option<i64>,
    /// Largest fan-out of a random node (B). Derived when absent.
    #[serde(default)]
    pub max_fanout: Option<i64>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            markers: Markers::default(),
            register: default_register(),
            continuation_suffix: default_continuation_suffix(),
            max_priority: None,
            max_fanout: None,
        }
    }
}

impl CompilerConfig {
    /// Load a configuration from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<CompilerConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse a configuration from a RON string.
    pub fn parse_ron(input: &str) -> Result<CompilerConfig, ConfigError> {
        Ok(ron::from_str(input)?)
    }
}

/// Largest P × B the randomize library is generated for. The library grows
/// with the cube of its capacity.
pub const MAX_CAPACITY: usize = 128;

/// Bounds of the randomize library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Limits {
    pub max_priority: u32,
    pub max_fanout: u32,
}

impl Limits {
    /// Longest candidate list the library handles: P × B.
    pub fn capacity(&self) -> usize {
        (self.max_priority as usize).saturating_mul(self.max_fanout as usize)
    }

    /// The smallest limits covering every random node of `system`.
    pub fn derive(system: &NetworkSystem) -> Limits {
        let mut limits = Limits::default();
        for (network, node) in system.nodes() {
            if node.dispatch != Dispatch::Random {
                continue;
            }
            let arcs = network.out_arcs(&node.name);
            limits.max_fanout = limits.max_fanout.max(arcs.len() as u32);
            for arc in arcs {
                limits.max_priority = limits.max_priority.max(arc.priority);
            }
        }
        limits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::network::{Arc, ArcKind, Interaction, Network, Node};

    #[test]
    fn defaults_are_distinct() {
        let markers = Markers::default();
        let names: Vec<&str> = markers.all().iter().map(|(_, v)| *v).collect();
        for (i, a) in names.iter().enumerate() {
            for b in &names[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn parse_partial_config() {
        let config = CompilerConfig::parse_ron(
            r#"(
                markers: (pull: "UNWIND", return: "BACK"),
                max_priority: Some(4),
            )"#,
        )
        .unwrap();
        assert_eq!(config.markers.pull, "UNWIND");
        assert_eq!(config.markers.ret, "BACK");
        assert_eq!(config.markers.fail, "FAIL");
        assert_eq!(config.register, "topic");
        assert_eq!(config.max_priority, Some(4));
        assert_eq!(config.max_fanout, None);
    }

    #[test]
    fn parse_negative_limit_is_accepted_for_later_validation() {
        let config = CompilerConfig::parse_ron("(max_fanout: Some(-2))").unwrap();
        assert_eq!(config.max_fanout, Some(-2));
    }

    #[test]
    fn derive_limits_from_random_nodes() {
        let mut net = Network::new("main");
        net.nodes
            .push(Node::new("pick", Interaction::Input, Dispatch::Random));
        net.nodes
            .push(Node::new("ordered", Interaction::Input, Dispatch::Ordered));
        net.nodes
            .push(Node::new("end", Interaction::Input, Dispatch::Ordered));
        let t = || ArcKind::Transition {
            code: String::new(),
        };
        net.arcs.push(Arc::new("r1", 3, "pick", "end", t()));
        net.arcs.push(Arc::new("r2", 1, "pick", "ordered", t()));
        // Ordered nodes do not count.
        net.arcs.push(Arc::new("o1", 9, "ordered", "end", t()));

        let system = NetworkSystem {
            networks: vec![net],
            main: None,
        };
        let limits = Limits::derive(&system);
        assert_eq!(limits.max_priority, 3);
        assert_eq!(limits.max_fanout, 2);
        assert_eq!(limits.capacity(), 6);
    }
}
