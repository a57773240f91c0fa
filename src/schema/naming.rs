//! Name bookkeeping for register tokens.
//!
//! Every node and arc ends up as a word in the register, so the names a
//! compiled system uses must be unique across the whole project, not just
//! inside one network.

use rustc_hash::{FxHashMap, FxHashSet};

use super::network::{ArcKind, NetworkError, NetworkSystem};
use super::template::WILDCARD_TOKENS;

/// Source of register tokens and arbiter of name uniqueness.
pub trait NamingAuthority {
    /// Register token of a node.
    fn node_token(&self, network: &str, node: &str) -> String;

    /// Private marker pushed under a sub-graph call made by `arc`.
    fn continuation_token(&self, arc: &str) -> String;

    /// True if `name` is already used by the project (case-insensitive).
    fn is_taken(&self, name: &str) -> bool;
}

/// Check that `name` can live in the register as a single word.
pub fn validate_token(name: &str) -> Result<(), NetworkError> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if name.chars().any(char::is_whitespace) {
        Some("name contains whitespace")
    } else if WILDCARD_TOKENS.contains(&name) {
        Some("name is a wildcard token")
    } else if name.contains(['*', '^', '#', '<', '>', '&']) {
        Some("name contains a reserved character")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(NetworkError::InvalidName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Default naming authority: node tokens are `<network>_<node>`, continuation
/// markers are `<arc><suffix>`.
#[derive(Debug, Clone, Default)]
pub struct SystemNames {
    suffix: String,
    taken: FxHashSet<String>,
    node_tokens: FxHashMap<(String, String), String>,
}

impl SystemNames {
    /// Collect every name of `system` and check it for uniqueness.
    pub fn build(system: &NetworkSystem, continuation_suffix: &str) -> Result<Self, NetworkError> {
        let mut names = SystemNames {
            suffix: continuation_suffix.to_string(),
            ..Default::default()
        };
        let mut networks = FxHashSet::default();
        let mut arcs = FxHashSet::default();
        // Tokens that end up in the register.
        let mut tokens = FxHashSet::default();

        for network in &system.networks {
            validate_token(&network.name)?;
            if !networks.insert(network.name.clone()) {
                return Err(NetworkError::DuplicateNetwork(network.name.clone()));
            }
            names.taken.insert(network.name.to_uppercase());

            let mut local = FxHashSet::default();
            for node in &network.nodes {
                validate_token(&node.name)?;
                if !local.insert(node.name.as_str()) {
                    return Err(NetworkError::DuplicateNode {
                        network: network.name.clone(),
                        node: node.name.clone(),
                    });
                }
                let token = format!("{}_{}", network.name, node.name);
                if !tokens.insert(token.to_uppercase()) {
                    return Err(NetworkError::DuplicateToken(token));
                }
                names.taken.insert(node.name.to_uppercase());
                names.taken.insert(token.to_uppercase());
                names
                    .node_tokens
                    .insert((network.name.clone(), node.name.clone()), token);
            }

            for arc in &network.arcs {
                validate_token(&arc.name)?;
                if !arcs.insert(arc.name.clone()) {
                    return Err(NetworkError::DuplicateArc(arc.name.clone()));
                }
                for endpoint in [&arc.source, &arc.target] {
                    if !local.contains(endpoint.as_str()) {
                        return Err(NetworkError::UnknownNode {
                            network: network.name.clone(),
                            arc: arc.name.clone(),
                            node: endpoint.clone(),
                        });
                    }
                }
                if !tokens.insert(arc.name.to_uppercase()) {
                    return Err(NetworkError::DuplicateToken(arc.name.clone()));
                }
                let continuation = format!("{}{}", arc.name, continuation_suffix);
                if !tokens.insert(continuation.to_uppercase()) {
                    return Err(NetworkError::DuplicateToken(continuation));
                }
                names.taken.insert(arc.name.to_uppercase());
                names.taken.insert(continuation.to_uppercase());
            }
        }

        // Predicates share the namespace of the register and scratch predicate.
        for (_, arc) in system.arcs() {
            if let ArcKind::PredicateTest { predicate, .. } = &arc.kind {
                names.taken.insert(predicate.to_uppercase());
            }
        }

        Ok(names)
    }

    /// Number of distinct names held.
    pub fn len(&self) -> usize {
        self.taken.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taken.is_empty()
    }
}

impl NamingAuthority for SystemNames {
    fn node_token(&self, network: &str, node: &str) -> String {
        self.node_tokens
            .get(&(network.to_string(), node.to_string()))
            .cloned()
            .unwrap_or_else(|| format!("{}_{}", network, node))
    }

    fn continuation_token(&self, arc: &str) -> String {
        format!("{}{}", arc, self.suffix)
    }

    fn is_taken(&self, name: &str) -> bool {
        self.taken.contains(&name.to_uppercase())
    }
}
