//! Graph data structures for web visualization
//!
//! Converts a SystemAnalysis to a JSON-serializable graph format
//! suitable for Cytoscape.js visualization.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::analyzer::SystemAnalysis;
use crate::metrics::{ModuleMetrics, package_coupling};

/// Complete graph data for visualization
#[derive(Debug, Clone, Serialize)]
pub struct GraphData {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub summary: Summary,
    pub circular_dependencies: Vec<Vec<String>>,
    /// package -> package -> edge count, across package boundaries only
    pub package_coupling: BTreeMap<String, BTreeMap<String, usize>>,
}

/// A node in the dependency graph (one Python module)
#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub id: String,
    pub label: String,
    pub package: String,
    pub layer: Option<String>,
    pub metrics: NodeMetrics,
    pub in_cycle: bool,
    pub file_paths: Vec<String>,
}

/// Metrics for a single node
#[derive(Debug, Clone, Serialize)]
pub struct NodeMetrics {
    pub fan_in: usize,
    pub fan_out: usize,
    pub instability: f64,
    pub abstractness: f64,
    pub distance: f64,
}

/// An import edge between two modules
#[derive(Debug, Clone, Serialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub in_cycle: bool,
    /// Rule broken by this edge, if any
    pub violation: Option<String>,
}

/// Summary statistics for the graph
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub total_modules: usize,
    pub total_dependencies: usize,
    pub total_cycles: usize,
    pub total_violations: usize,
    pub compliance: Option<f64>,
    pub average_instability: f64,
    pub modularity_index: f64,
}

/// Module detail served by `/api/module`
#[derive(Debug, Clone, Serialize)]
pub struct ModuleDetail {
    pub metrics: ModuleMetrics,
    pub layer: Option<String>,
    pub dependencies: Vec<String>,
    pub dependents: Vec<String>,
    pub file_paths: Vec<String>,
}

/// Convert a SystemAnalysis to GraphData for visualization
pub fn analysis_to_graph(analysis: &SystemAnalysis) -> GraphData {
    let layers = analysis.architecture.as_ref().map(|r| &r.layer_assignments);

    // Members of the same cyclic component share an id
    let mut component_of: HashMap<&str, usize> = HashMap::new();
    let components = analysis.graph.cyclic_components();
    for (id, component) in components.iter().enumerate() {
        for module in component {
            component_of.insert(module.as_str(), id);
        }
    }

    let violations: HashMap<(&str, &str), &str> = analysis
        .architecture
        .iter()
        .flat_map(|r| &r.violations)
        .map(|v| ((v.from_module.as_str(), v.to_module.as_str()), v.rule.as_str()))
        .collect();

    let nodes = analysis
        .metrics
        .modules
        .iter()
        .map(|m| Node {
            id: m.name.clone(),
            label: m
                .name
                .rsplit('.')
                .next()
                .unwrap_or(&m.name)
                .to_string(),
            package: m.package.clone(),
            layer: layers.and_then(|l| l.get(&m.name)).cloned(),
            metrics: NodeMetrics {
                fan_in: m.fan_in,
                fan_out: m.fan_out,
                instability: m.instability,
                abstractness: m.abstractness,
                distance: m.distance,
            },
            in_cycle: m.in_cycle,
            file_paths: file_paths(analysis, &m.name),
        })
        .collect();

    let edges = analysis
        .dependencies
        .edges
        .iter()
        .map(|e| {
            let in_cycle = matches!(
                (component_of.get(e.from.as_str()), component_of.get(e.to.as_str())),
                (Some(a), Some(b)) if a == b
            );
            Edge {
                id: format!("{}->{}", e.from, e.to),
                source: e.from.clone(),
                target: e.to.clone(),
                in_cycle,
                violation: violations
                    .get(&(e.from.as_str(), e.to.as_str()))
                    .map(|rule| rule.to_string()),
            }
        })
        .collect();

    let system = &analysis.metrics.system;
    GraphData {
        nodes,
        edges,
        summary: Summary {
            total_modules: system.total_modules,
            total_dependencies: system.total_dependencies,
            total_cycles: analysis.cycles.total_cycles,
            total_violations: violations.len(),
            compliance: analysis.architecture.as_ref().map(|r| r.compliance),
            average_instability: system.average_instability,
            modularity_index: system.modularity_index,
        },
        circular_dependencies: analysis
            .cycles
            .cycles
            .iter()
            .map(|c| c.modules.clone())
            .collect(),
        package_coupling: package_coupling(&analysis.graph),
    }
}

/// Detail for one module, or `None` if it is not part of the graph
pub fn module_detail(analysis: &SystemAnalysis, name: &str) -> Option<ModuleDetail> {
    let metrics = analysis.metrics.module(name)?.clone();
    let mut dependents: Vec<String> = analysis
        .graph
        .dependents(name)
        .filter(|m| *m != name)
        .map(String::from)
        .collect();
    dependents.sort();

    Some(ModuleDetail {
        layer: analysis
            .architecture
            .as_ref()
            .and_then(|r| r.layer_assignments.get(name))
            .cloned(),
        dependencies: analysis
            .graph
            .dependencies(name)
            .filter(|m| *m != name)
            .map(String::from)
            .collect(),
        dependents,
        file_paths: file_paths(analysis, name),
        metrics,
    })
}

fn file_paths(analysis: &SystemAnalysis, module: &str) -> Vec<String> {
    analysis
        .dependencies
        .modules
        .get(module)
        .map(|paths| paths.iter().map(|p| p.display().to_string()).collect())
        .unwrap_or_default()
}
