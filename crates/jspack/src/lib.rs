pub mod analyzer;
pub mod bundle_emitter;
pub mod config;
pub mod dirs;
pub mod error;
pub mod graph_builder;
pub mod module_graph;
pub mod orchestrator;
pub mod resolver;
