//! Circular dependency detection
//!
//! Cycles are found with a single three-colour depth-first traversal. Each
//! back edge yields one closed walk `[m0, m1, ..., m0]`; rotations of the
//! same walk are reported once. Overlapping cycles that share a back edge
//! may therefore be under-reported.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use crate::graph::DependencyGraph;

/// In-degree above which a module is treated as core infrastructure
const CORE_FAN_IN: usize = 10;

/// Number of cycles that get an individual breaking suggestion
const DETAILED_SUGGESTIONS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Find cycles in the graph
///
/// Nodes are visited in sorted order, so the result is deterministic for
/// a given graph. Self-loops are not cycles.
pub fn find_cycles(graph: &DependencyGraph) -> Vec<Vec<String>> {
    let mut color: HashMap<&str, Color> = HashMap::new();
    let mut position: HashMap<&str, usize> = HashMap::new();
    let mut path: Vec<&str> = Vec::new();
    let mut seen: HashSet<Vec<String>> = HashSet::new();
    let mut cycles = Vec::new();

    for start in graph.nodes() {
        if color.get(start).copied().unwrap_or(Color::White) != Color::White {
            continue;
        }

        color.insert(start, Color::Gray);
        position.insert(start, path.len());
        path.push(start);
        let mut frames: Vec<(&str, Vec<&str>, usize)> =
            vec![(start, graph.dependencies(start).collect(), 0)];

        while let Some(frame) = frames.last_mut() {
            if frame.2 < frame.1.len() {
                let next = frame.1[frame.2];
                frame.2 += 1;

                match color.get(next).copied().unwrap_or(Color::White) {
                    Color::White => {
                        color.insert(next, Color::Gray);
                        position.insert(next, path.len());
                        path.push(next);
                        frames.push((next, graph.dependencies(next).collect(), 0));
                    }
                    Color::Gray => {
                        let Some(&pos) = position.get(next) else {
                            continue;
                        };
                        let mut cycle: Vec<String> =
                            path[pos..].iter().map(|m| m.to_string()).collect();
                        cycle.push(next.to_string());
                        if seen.insert(canonical_rotation(&cycle)) {
                            cycles.push(cycle);
                        }
                    }
                    Color::Black => {}
                }
                continue;
            }

            let Some((node, _, _)) = frames.pop() else {
                break;
            };
            color.insert(node, Color::Black);
            position.remove(node);
            path.pop();
        }
    }

    cycles
}

/// Rotate a closed walk so that `start` comes first
///
/// The whole array, including its repeated closing element, is rotated
/// left to the first occurrence of `start`. Returns the input unchanged
/// when `start` is not part of the cycle.
pub fn rotate_cycle(cycle: &[String], start: &str) -> Vec<String> {
    let mut rotated = cycle.to_vec();
    if let Some(index) = cycle.iter().position(|m| m == start) {
        rotated.rotate_left(index);
    }
    rotated
}

/// Rotation-independent key for a closed walk
fn canonical_rotation(cycle: &[String]) -> Vec<String> {
    let open = match cycle.split_last() {
        Some((last, rest)) if rest.first() == Some(last) => rest,
        _ => cycle,
    };
    let Some(min_index) = open
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.cmp(b.1))
        .map(|(i, _)| i)
    else {
        return Vec::new();
    };
    let mut key = open.to_vec();
    key.rotate_left(min_index);
    key
}

/// Cycle severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleSeverity {
    /// Two modules importing each other
    Low,
    /// 3-5 modules
    Medium,
    /// 6-9 modules
    High,
    /// 10+ modules, or a cycle through a heavily imported module
    Critical,
}

impl std::fmt::Display for CycleSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleSeverity::Low => write!(f, "Low"),
            CycleSeverity::Medium => write!(f, "Medium"),
            CycleSeverity::High => write!(f, "High"),
            CycleSeverity::Critical => write!(f, "Critical"),
        }
    }
}

/// A detected cycle with its classification
#[derive(Debug, Clone, Serialize)]
pub struct CircularDependency {
    /// Closed walk, first element repeated at the end
    pub modules: Vec<String>,
    /// Number of distinct modules
    pub size: usize,
    pub severity: CycleSeverity,
    pub description: String,
}

impl CircularDependency {
    fn new(modules: Vec<String>, graph: &DependencyGraph) -> Self {
        let members = distinct_members(&modules);
        let size = members.len();

        let has_core = members.iter().any(|m| graph.in_degree(m) > CORE_FAN_IN);
        let severity = if has_core || size >= 10 {
            CycleSeverity::Critical
        } else if size >= 6 {
            CycleSeverity::High
        } else if size >= 3 {
            CycleSeverity::Medium
        } else {
            CycleSeverity::Low
        };

        let description = if size == 2 {
            format!(
                "Direct circular dependency between {} and {}",
                members[0], members[1]
            )
        } else {
            format!(
                "Circular dependency involving {} modules: {}",
                size,
                modules.join(" → ")
            )
        };

        Self {
            modules,
            size,
            severity,
            description,
        }
    }

    /// Distinct modules in walk order
    pub fn members(&self) -> Vec<&str> {
        distinct_members(&self.modules)
    }
}

fn distinct_members(cycle: &[String]) -> Vec<&str> {
    let mut seen = HashSet::new();
    cycle
        .iter()
        .map(String::as_str)
        .filter(|m| seen.insert(*m))
        .collect()
}

/// Cycle counts by severity
#[derive(Debug, Clone, Default, Serialize)]
pub struct SeverityBreakdown {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
}

/// Result of cycle analysis over a dependency graph
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleAnalysis {
    pub cycles: Vec<CircularDependency>,
    pub total_cycles: usize,
    /// Distinct modules appearing in at least one cycle
    pub modules_in_cycles: usize,
    pub severity: SeverityBreakdown,
    /// Cycle with the most modules
    pub largest_cycle: Option<Vec<String>>,
    /// Modules appearing in more than one cycle, sorted
    pub core_infrastructure: Vec<String>,
    pub suggestions: Vec<String>,
}

impl CycleAnalysis {
    pub fn has_cycles(&self) -> bool {
        !self.cycles.is_empty()
    }
}

/// Detect and classify cycles, then propose ways to break them
pub fn analyze_cycles(graph: &DependencyGraph) -> CycleAnalysis {
    let cycles: Vec<CircularDependency> = find_cycles(graph)
        .into_iter()
        .map(|cycle| CircularDependency::new(cycle, graph))
        .collect();

    if cycles.is_empty() {
        return CycleAnalysis::default();
    }

    let mut severity = SeverityBreakdown::default();
    let mut occurrences: BTreeMap<&str, usize> = BTreeMap::new();
    for cycle in &cycles {
        match cycle.severity {
            CycleSeverity::Low => severity.low += 1,
            CycleSeverity::Medium => severity.medium += 1,
            CycleSeverity::High => severity.high += 1,
            CycleSeverity::Critical => severity.critical += 1,
        }
        for module in cycle.members() {
            *occurrences.entry(module).or_insert(0) += 1;
        }
    }

    let core_infrastructure: Vec<String> = occurrences
        .iter()
        .filter(|(_, count)| **count > 1)
        .map(|(module, _)| module.to_string())
        .collect();

    let largest_cycle = cycles
        .iter()
        .fold(None::<&CircularDependency>, |best, cycle| match best {
            Some(b) if b.size >= cycle.size => Some(b),
            _ => Some(cycle),
        })
        .map(|c| c.modules.clone());

    let suggestions = breaking_suggestions(&cycles, &core_infrastructure, &severity, graph);

    CycleAnalysis {
        total_cycles: cycles.len(),
        modules_in_cycles: occurrences.len(),
        severity,
        largest_cycle,
        core_infrastructure,
        suggestions,
        cycles,
    }
}

fn breaking_suggestions(
    cycles: &[CircularDependency],
    core_infrastructure: &[String],
    severity: &SeverityBreakdown,
    graph: &DependencyGraph,
) -> Vec<String> {
    let mut suggestions = vec![
        "Consider introducing interfaces or abstract base classes to invert dependencies"
            .to_string(),
    ];

    if let Some(largest) = cycles.iter().max_by_key(|c| c.size).filter(|c| c.size > 2) {
        suggestions.push(format!(
            "Focus on the largest cycle ({} modules) first: {}",
            largest.size,
            largest.modules.join(" → ")
        ));
    }

    if !core_infrastructure.is_empty() {
        suggestions.push(format!(
            "Modules {} appear in multiple cycles; extract their shared functionality into a separate module",
            core_infrastructure.join(", ")
        ));
    }

    for cycle in cycles.iter().take(DETAILED_SUGGESTIONS) {
        let members = cycle.members();
        if members.len() == 2 {
            suggestions.push(format!(
                "Break cycle between {} and {} by introducing a third module or using dependency injection",
                members[0], members[1]
            ));
        } else if members.len() <= 4 {
            let least_coupled = members
                .iter()
                .min_by_key(|m| (graph.in_degree(m) + graph.out_degree(m), **m));
            if let Some(module) = least_coupled {
                suggestions.push(format!(
                    "Cycle {}: extract the dependencies of {}, its least coupled module",
                    cycle.modules.join(" → "),
                    module
                ));
            }
        }
    }

    if severity.critical > 0 {
        suggestions
            .push("Apply the Dependency Inversion Principle to critical cycles first".to_string());
    }

    suggestions.push(
        "Review layer separation (presentation → application → domain → infrastructure)"
            .to_string(),
    );
    suggestions
        .push("Consider event-driven patterns to decouple tightly coupled modules".to_string());

    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_of(edges: &[(&str, &str)]) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for (from, to) in edges {
            graph.add_edge(from, to);
        }
        graph
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_two_node_cycle_reported_once() {
        let graph = graph_of(&[("a", "b"), ("b", "a")]);
        let cycles = find_cycles(&graph);

        assert_eq!(cycles.len(), 1);
        let members: HashSet<&str> = cycles[0].iter().map(String::as_str).collect();
        assert_eq!(members, HashSet::from(["a", "b"]));
        assert_eq!(cycles[0].first(), cycles[0].last());
    }

    #[test]
    fn test_two_node_cycle_independent_of_start() {
        // "z" sorts after "b", so the traversal enters from the other side
        let graph = graph_of(&[("z", "b"), ("b", "z")]);
        let cycles = find_cycles(&graph);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0], strings(&["b", "z", "b"]));
    }

    #[test]
    fn test_three_node_cycle() {
        let graph = graph_of(&[("a", "b"), ("b", "c"), ("c", "a"), ("d", "e")]);
        let cycles = find_cycles(&graph);
        assert_eq!(cycles, vec![strings(&["a", "b", "c", "a"])]);
    }

    #[test]
    fn test_acyclic_graph_and_self_loop() {
        let graph = graph_of(&[("a", "b"), ("b", "c"), ("c", "c")]);
        assert!(find_cycles(&graph).is_empty());
        assert!(!analyze_cycles(&graph).has_cycles());
    }

    #[test]
    fn test_rotate_cycle_to_present_module() {
        let cycle = strings(&["a", "b", "c", "a"]);
        let rotated = rotate_cycle(&cycle, "b");
        assert_eq!(rotated, strings(&["b", "c", "a", "a"]));
        assert_eq!(rotated.len(), cycle.len());

        let mut sorted_in = cycle.clone();
        let mut sorted_out = rotated.clone();
        sorted_in.sort();
        sorted_out.sort();
        assert_eq!(sorted_in, sorted_out);
    }

    #[test]
    fn test_rotate_cycle_absent_module() {
        let cycle = strings(&["a", "b", "a"]);
        assert_eq!(rotate_cycle(&cycle, "x"), cycle);
    }

    #[test]
    fn test_canonical_rotation_dedups() {
        assert_eq!(
            canonical_rotation(&strings(&["b", "c", "a", "b"])),
            canonical_rotation(&strings(&["a", "b", "c", "a"]))
        );
    }

    #[test]
    fn test_severity_by_size() {
        let graph = graph_of(&[("a", "b"), ("b", "a")]);
        assert_eq!(analyze_cycles(&graph).cycles[0].severity, CycleSeverity::Low);

        let graph = graph_of(&[("a", "b"), ("b", "c"), ("c", "a")]);
        assert_eq!(analyze_cycles(&graph).cycles[0].severity, CycleSeverity::Medium);

        let ring: Vec<(String, String)> = (0..6)
            .map(|i| (format!("m{}", i), format!("m{}", (i + 1) % 6)))
            .collect();
        let mut graph = DependencyGraph::new();
        for (from, to) in &ring {
            graph.add_edge(from, to);
        }
        assert_eq!(analyze_cycles(&graph).cycles[0].severity, CycleSeverity::High);
    }

    #[test]
    fn test_heavily_imported_module_makes_cycle_critical() {
        let mut graph = graph_of(&[("core", "util"), ("util", "core")]);
        for i in 0..11 {
            graph.add_edge(&format!("client{}", i), "core");
        }
        let analysis = analyze_cycles(&graph);
        assert_eq!(analysis.cycles[0].severity, CycleSeverity::Critical);
        assert_eq!(analysis.severity.critical, 1);
    }

    #[test]
    fn test_core_infrastructure_and_suggestions() {
        let graph = graph_of(&[("a", "hub"), ("hub", "a"), ("b", "hub"), ("hub", "b")]);
        let analysis = analyze_cycles(&graph);

        assert_eq!(analysis.total_cycles, 2);
        assert_eq!(analysis.modules_in_cycles, 3);
        assert_eq!(analysis.core_infrastructure, vec!["hub".to_string()]);
        assert!(
            analysis
                .suggestions
                .iter()
                .any(|s| s.contains("Break cycle between a and hub"))
        );
        assert!(analysis.suggestions.iter().any(|s| s.contains("hub appear")));
    }

    #[test]
    fn test_empty_graph_has_no_cycles() {
        let analysis = analyze_cycles(&DependencyGraph::new());
        assert_eq!(analysis.total_cycles, 0);
        assert!(analysis.suggestions.is_empty());
        assert!(analysis.largest_cycle.is_none());
    }
}
