pub mod arcs;
pub mod config;
pub mod dispatch;
pub mod instruction;
pub mod pipeline;
pub mod randomize;
pub mod recursion;
pub mod render;
pub mod simulate;
pub mod stack;
