pub mod naming;
pub mod network;
pub mod template;
