//! Stack processor: what a node does to the register when control reaches it.

use crate::core::config::Markers;
use crate::core::instruction::Instruction;
use crate::schema::network::{Network, Node, Position};

/// Register instructions for `node`, run before its dispatch instructions.
///
/// | Position | Instructions                 |
/// |----------|------------------------------|
/// | Inner    | pop                          |
/// | Enter    | pop, push pull-stop          |
/// | Exit     | pop, push pull               |
/// | Isolated | nothing                      |
pub fn process(network: &Network, node: &Node, markers: &Markers) -> Vec<Instruction> {
    for_position(network.position(&node.name), markers)
}

pub fn for_position(position: Position, markers: &Markers) -> Vec<Instruction> {
    match position {
        Position::Inner => vec![Instruction::Pop],
        Position::Enter => vec![Instruction::Pop, Instruction::push(&markers.pull_stop)],
        Position::Exit => vec![Instruction::Pop, Instruction::push(&markers.pull)],
        Position::Isolated => Vec::new(),
    }
}
