//! HTTP routes for the web visualization
//!
//! JSON API endpoints over a finished analysis.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;

use super::graph::{self, GraphData};
use super::server::AppState;

/// Query parameters for module detail request
#[derive(Deserialize)]
struct ModuleQuery {
    name: String,
}

/// Create API routes
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/graph", get(get_graph))
        .route("/api/analysis", get(get_analysis))
        .route("/api/module", get(get_module))
        .route("/api/dot", get(get_dot))
}

/// GET /api/health - Health check endpoint
async fn health_check() -> &'static str {
    "ok"
}

/// GET /api/graph - Returns the module dependency graph
async fn get_graph(State(state): State<Arc<AppState>>) -> Json<GraphData> {
    Json(graph::analysis_to_graph(&state.analysis))
}

/// GET /api/analysis - Returns the complete analysis
async fn get_analysis(State(state): State<Arc<AppState>>) -> Response {
    Json(&state.analysis).into_response()
}

/// GET /api/module - Returns metrics and neighbours of one module
async fn get_module(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ModuleQuery>,
) -> Response {
    match graph::module_detail(&state.analysis, &query.name) {
        Some(detail) => Json(detail).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": format!("Module '{}' not found", query.name)})),
        )
            .into_response(),
    }
}

/// GET /api/dot - Returns the graph in Graphviz format
async fn get_dot(State(state): State<Arc<AppState>>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/vnd.graphviz")],
        state.analysis.graph.to_dot(),
    )
        .into_response()
}
