//! Web API for pycoupling
//!
//! Serves a finished analysis as JSON (graph, full analysis, per-module
//! detail) and as Graphviz DOT, for browsing in a local frontend.

pub mod graph;
pub mod routes;
pub mod server;

pub use graph::{GraphData, ModuleDetail, analysis_to_graph, module_detail};
pub use server::{ServerConfig, router, start_server};
