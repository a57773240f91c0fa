//! Dialogue Net: compiles conversation networks into AIML topic machines.
//!
//! A designer draws a graph of nodes and guarded arcs; the compiler turns it
//! into topics and categories for a loop-free pattern-matching runtime,
//! encoding control flow as rewrites of a single register predicate.

pub mod core;
pub mod schema;

pub use crate::core::config::CompilerConfig;
pub use crate::core::pipeline::{CompileError, NetworkCompiler};
pub use crate::core::render::{AimlRenderer, RenderOptions};
pub use crate::core::simulate::{Conversation, Machine};
pub use crate::schema::network::NetworkSystem;
