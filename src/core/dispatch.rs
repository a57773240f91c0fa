//! Dispatch processor: which outgoing arc of a node is tried next.
//!
//! Ordered nodes push all arc names at once, best first, so a failing arc
//! only has to pop itself to hand over to the next one. Random nodes hand a
//! weighted multiset to the randomize library.

use crate::core::instruction::Instruction;
use crate::schema::network::{Arc, Dispatch, Network, Node, Position};

/// Dispatch instructions for `node`, run after its stack instructions.
pub fn process(network: &Network, node: &Node) -> Vec<Instruction> {
    match network.position(&node.name) {
        Position::Exit | Position::Isolated => return Vec::new(),
        Position::Enter | Position::Inner => {}
    }

    let arcs = network.out_arcs(&node.name);
    if arcs.is_empty() {
        return Vec::new();
    }

    match node.dispatch {
        Dispatch::Ordered => vec![Instruction::Push(ordered(&arcs))],
        Dispatch::Random => vec![Instruction::Randomize(weighted(&arcs))],
    }
}

/// Arc names by priority, highest first; equal priorities by name.
pub fn ordered(arcs: &[&Arc]) -> Vec<String> {
    let mut sorted: Vec<&Arc> = arcs.to_vec();
    sorted.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name)));
    sorted.into_iter().map(|a| a.name.clone()).collect()
}

/// Each arc name repeated `priority` times, arcs in name order.
pub fn weighted(arcs: &[&Arc]) -> Vec<String> {
    let mut sorted: Vec<&Arc> = arcs.to_vec();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));
    sorted
        .into_iter()
        .flat_map(|a| std::iter::repeat(a.name.clone()).take(a.priority as usize))
        .collect()
}
