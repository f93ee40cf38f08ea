//! Coupling metrics
//!
//! Per-module fan-in/fan-out/instability, abstractness and distance from
//! the main sequence, plus system-wide aggregates computed from a finished
//! [`DependencyGraph`].

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::Serialize;

use crate::graph::DependencyGraph;

/// Score above which a module is listed as a refactoring candidate
const PRIORITY_THRESHOLD: f64 = 10.0;

/// Maximum number of refactoring candidates reported
const PRIORITY_LIMIT: usize = 10;

/// Score bonus for modules that sit inside a cycle
const CYCLE_PENALTY: f64 = 30.0;

/// Distance from the main sequence above which a module is penalized
const DISTANCE_THRESHOLD: f64 = 0.5;

/// Score per unit of distance once over the threshold
const DISTANCE_WEIGHT: f64 = 50.0;

const ABSTRACT_SUFFIXES: &[&str] = &["Interface", "Abstract", "Base", "ABC"];

/// module -> public top-level class names
pub type ModuleClasses = BTreeMap<String, Vec<String>>;

/// Metrics for a single module
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModuleMetrics {
    pub name: String,
    /// First dotted segment, empty for top-level modules
    pub package: String,
    /// Number of modules importing this one (afferent coupling)
    pub fan_in: usize,
    /// Number of modules this one imports (efferent coupling)
    pub fan_out: usize,
    /// I = Ce / (Ca + Ce), 0 when isolated
    pub instability: f64,
    /// Share of public classes that look abstract, 0 without classes
    pub abstractness: f64,
    /// D = |A + I - 1|
    pub distance: f64,
    pub in_cycle: bool,
}

impl ModuleMetrics {
    /// Refactoring priority score
    ///
    /// Heavily coupled unstable modules score highest. Cycle members get a
    /// flat bonus, and coupled modules far from the main sequence are
    /// penalized in proportion to their distance.
    pub fn priority_score(&self) -> f64 {
        let coupling = (self.fan_in + self.fan_out) as f64;
        let mut score = coupling * (0.5 + self.instability);
        if self.in_cycle {
            score += CYCLE_PENALTY;
        }
        if coupling > 0.0 && self.distance > DISTANCE_THRESHOLD {
            score += self.distance * DISTANCE_WEIGHT;
        }
        score
    }
}

/// A module flagged for refactoring
#[derive(Debug, Clone, Serialize)]
pub struct RefactoringCandidate {
    pub module: String,
    pub score: f64,
}

/// System-wide coupling statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct SystemMetrics {
    pub total_modules: usize,
    pub total_dependencies: usize,
    /// Modules inside a cyclic strongly connected component
    pub cyclic_dependencies: usize,
    /// Edges per module
    pub dependency_ratio: f64,
    pub average_fan_in: f64,
    pub average_fan_out: f64,
    pub average_instability: f64,
    pub average_abstractness: f64,
    /// Mean distance from the main sequence
    pub main_sequence_deviation: f64,
    /// Share of edges staying inside one package, discounted by cycles
    pub modularity_index: f64,
    pub system_complexity: f64,
    pub package_count: usize,
    /// Longest dependency chain, counted in modules
    pub max_dependency_depth: usize,
    pub refactoring_priority: Vec<RefactoringCandidate>,
}

/// Module and system metrics for one graph
#[derive(Debug, Clone, Default, Serialize)]
pub struct CouplingMetrics {
    /// Per-module metrics in module name order
    pub modules: Vec<ModuleMetrics>,
    pub system: SystemMetrics,
}

impl CouplingMetrics {
    pub fn module(&self, name: &str) -> Option<&ModuleMetrics> {
        self.modules
            .binary_search_by(|m| m.name.as_str().cmp(name))
            .ok()
            .map(|i| &self.modules[i])
    }
}

/// Package of a dotted module name
pub fn package_of(module: &str) -> &str {
    match module.split_once('.') {
        Some((package, _)) => package,
        None => "",
    }
}

/// Whether a class name follows an interface or base-class convention
///
/// `RepositoryBase`, `StorageABC`, `PaymentInterface` and `IService` count;
/// `Base` or `I` alone do not.
pub fn is_abstract_name(name: &str) -> bool {
    let suffixed = ABSTRACT_SUFFIXES
        .iter()
        .any(|suffix| name.len() > suffix.len() && name.ends_with(suffix));
    let mut chars = name.chars();
    let prefixed = chars.next() == Some('I')
        && chars.next().is_some_and(|c| c.is_ascii_uppercase())
        && chars.next().is_some();
    suffixed || prefixed
}

/// Abstract classes over all public classes, 0 when there are none
pub fn abstractness(classes: &[String]) -> f64 {
    if classes.is_empty() {
        return 0.0;
    }
    let abstract_count = classes.iter().filter(|c| is_abstract_name(c)).count();
    abstract_count as f64 / classes.len() as f64
}

/// Compute coupling metrics for every module and the system as a whole
pub fn calculate_metrics(graph: &DependencyGraph, classes: &ModuleClasses) -> CouplingMetrics {
    if graph.is_empty() {
        return CouplingMetrics::default();
    }

    let in_cycle: HashSet<String> = graph.cyclic_components().into_iter().flatten().collect();

    let modules: Vec<ModuleMetrics> = graph
        .nodes()
        .map(|name| {
            let fan_in = graph.in_degree(name);
            let fan_out = graph.out_degree(name);
            let total = fan_in + fan_out;
            let instability = if total == 0 {
                0.0
            } else {
                fan_out as f64 / total as f64
            };
            let abstractness = classes.get(name).map_or(0.0, |c| abstractness(c));
            ModuleMetrics {
                name: name.to_string(),
                package: package_of(name).to_string(),
                fan_in,
                fan_out,
                instability,
                abstractness,
                distance: (abstractness + instability - 1.0).abs(),
                in_cycle: in_cycle.contains(name),
            }
        })
        .collect();

    let system = system_metrics(graph, &modules, in_cycle.len());
    CouplingMetrics { modules, system }
}

fn system_metrics(
    graph: &DependencyGraph,
    modules: &[ModuleMetrics],
    cyclic_modules: usize,
) -> SystemMetrics {
    let total_modules = modules.len();
    let total_dependencies = graph.edge_count();
    let n = total_modules as f64;

    let dependency_ratio = total_dependencies as f64 / n;
    let average_fan_in = modules.iter().map(|m| m.fan_in as f64).sum::<f64>() / n;
    let average_fan_out = modules.iter().map(|m| m.fan_out as f64).sum::<f64>() / n;
    let average_instability = modules.iter().map(|m| m.instability).sum::<f64>() / n;
    let average_abstractness = modules.iter().map(|m| m.abstractness).sum::<f64>() / n;
    let main_sequence_deviation = modules.iter().map(|m| m.distance).sum::<f64>() / n;

    let packages: BTreeSet<&str> = modules
        .iter()
        .map(|m| m.package.as_str())
        .filter(|p| !p.is_empty())
        .collect();

    let modularity_index = modularity(graph, packages.len(), cyclic_modules, total_modules);

    let instability_stddev = if total_modules > 1 {
        let variance = modules
            .iter()
            .map(|m| (m.instability - average_instability).powi(2))
            .sum::<f64>()
            / n;
        variance.sqrt()
    } else {
        0.0
    };
    let system_complexity = 0.4 * (1.0 + dependency_ratio).log2()
        + 0.3 * (1.0 + n).log2()
        + 0.3 * (10.0 * instability_stddev);

    let mut refactoring_priority: Vec<RefactoringCandidate> = modules
        .iter()
        .map(|m| RefactoringCandidate {
            module: m.name.clone(),
            score: m.priority_score(),
        })
        .filter(|c| c.score > PRIORITY_THRESHOLD)
        .collect();
    refactoring_priority.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.module.cmp(&b.module))
    });
    refactoring_priority.truncate(PRIORITY_LIMIT);

    SystemMetrics {
        total_modules,
        total_dependencies,
        cyclic_dependencies: cyclic_modules,
        dependency_ratio,
        average_fan_in,
        average_fan_out,
        average_instability,
        average_abstractness,
        main_sequence_deviation,
        modularity_index,
        system_complexity,
        package_count: packages.len(),
        max_dependency_depth: max_dependency_depth(graph),
        refactoring_priority,
    }
}

fn modularity(
    graph: &DependencyGraph,
    package_count: usize,
    cyclic_modules: usize,
    total_modules: usize,
) -> f64 {
    if total_modules == 0 {
        return 0.0;
    }
    if package_count <= 1 {
        return 0.5;
    }

    let edges = graph.edges();
    if edges.is_empty() {
        return 1.0;
    }

    let intra = edges
        .iter()
        .filter(|e| {
            let from = package_of(&e.from);
            !from.is_empty() && from == package_of(&e.to)
        })
        .count();

    let cohesion = intra as f64 / edges.len() as f64;
    let cycle_factor = 1.0 - (cyclic_modules as f64 / total_modules as f64) * 0.5;
    cohesion * cycle_factor
}

/// Length of the longest dependency chain, in modules
///
/// Back edges are ignored, so cycles do not make the chain infinite.
pub fn max_dependency_depth(graph: &DependencyGraph) -> usize {
    let mut depth: HashMap<&str, usize> = HashMap::new();
    let mut on_path: HashSet<&str> = HashSet::new();
    let mut deepest = 0;

    for start in graph.nodes() {
        if depth.contains_key(start) {
            continue;
        }

        on_path.insert(start);
        let mut frames: Vec<(&str, Vec<&str>, usize, usize)> =
            vec![(start, graph.dependencies(start).collect(), 0, 0)];

        while let Some(frame) = frames.last_mut() {
            if frame.2 < frame.1.len() {
                let next = frame.1[frame.2];
                frame.2 += 1;

                if let Some(&known) = depth.get(next) {
                    frame.3 = frame.3.max(known);
                } else if !on_path.contains(next) {
                    on_path.insert(next);
                    frames.push((next, graph.dependencies(next).collect(), 0, 0));
                }
                continue;
            }

            let Some((node, _, _, longest_child)) = frames.pop() else {
                break;
            };
            let node_depth = longest_child + 1;
            on_path.remove(node);
            depth.insert(node, node_depth);
            deepest = deepest.max(node_depth);
            if let Some(parent) = frames.last_mut() {
                parent.3 = parent.3.max(node_depth);
            }
        }
    }

    deepest
}

/// Count edges between packages (package -> package -> count)
pub fn package_coupling(graph: &DependencyGraph) -> BTreeMap<String, BTreeMap<String, usize>> {
    let mut coupling: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();
    for edge in graph.edges() {
        let from = package_of(&edge.from);
        let to = package_of(&edge.to);
        if from.is_empty() || to.is_empty() || from == to {
            continue;
        }
        *coupling
            .entry(from.to_string())
            .or_default()
            .entry(to.to_string())
            .or_insert(0) += 1;
    }
    coupling
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

    #[test]
    fn test_empty_graph_is_all_zero() {
        let metrics = calculate_metrics(&DependencyGraph::new(), &ModuleClasses::new());
        let system = &metrics.system;

        assert!(metrics.modules.is_empty());
        assert_eq!(system.total_modules, 0);
        assert_eq!(system.total_dependencies, 0);
        assert_eq!(system.cyclic_dependencies, 0);
        assert_eq!(system.dependency_ratio, 0.0);
        assert_eq!(system.average_instability, 0.0);
        assert_eq!(system.modularity_index, 0.0);
        assert_eq!(system.system_complexity, 0.0);
        assert_eq!(system.max_dependency_depth, 0);
        assert!(system.refactoring_priority.is_empty());
    }

    #[test]
    fn test_fan_in_fan_out_and_instability() {
        let graph = graph_of(&[("pkg.a", "pkg.b"), ("pkg.a", "pkg.c"), ("pkg.c", "pkg.b")]);
        let metrics = calculate_metrics(&graph, &ModuleClasses::new());

        let a = metrics.module("pkg.a").unwrap();
        assert_eq!((a.fan_in, a.fan_out), (0, 2));
        assert_eq!(a.instability, 1.0);
        assert_eq!(a.package, "pkg");

        let b = metrics.module("pkg.b").unwrap();
        assert_eq!((b.fan_in, b.fan_out), (2, 0));
        assert_eq!(b.instability, 0.0);

        let c = metrics.module("pkg.c").unwrap();
        assert!((c.instability - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_isolated_module_has_zero_instability() {
        let mut graph = DependencyGraph::new();
        graph.add_node("lonely");
        let metrics = calculate_metrics(&graph, &ModuleClasses::new());

        let lonely = metrics.module("lonely").unwrap();
        assert_eq!(lonely.instability, 0.0);
        assert_eq!(lonely.package, "");
        assert_eq!(metrics.system.max_dependency_depth, 1);
        assert_eq!(metrics.system.modularity_index, 0.5);
    }

    #[test]
    fn test_cyclic_dependencies_counts_modules() {
        let graph = graph_of(&[("a.x", "a.y"), ("a.y", "a.x"), ("a.y", "b.z")]);
        let metrics = calculate_metrics(&graph, &ModuleClasses::new());

        assert_eq!(metrics.system.cyclic_dependencies, 2);
        assert!(metrics.module("a.x").unwrap().in_cycle);
        assert!(!metrics.module("b.z").unwrap().in_cycle);
    }

    #[test]
    fn test_modularity_index() {
        // Two intra-package edges out of three, no cycles
        let graph = graph_of(&[("a.x", "a.y"), ("b.x", "b.y"), ("a.x", "b.x")]);
        let metrics = calculate_metrics(&graph, &ModuleClasses::new());
        assert!((metrics.system.modularity_index - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(metrics.system.package_count, 2);
    }

    #[test]
    fn test_modularity_without_edges() {
        let mut graph = DependencyGraph::new();
        graph.add_node("a.x");
        graph.add_node("b.x");
        assert_eq!(calculate_metrics(&graph, &ModuleClasses::new()).system.modularity_index, 1.0);
    }

    #[test]
    fn test_max_dependency_depth() {
        let graph = graph_of(&[("a", "b"), ("b", "c"), ("c", "d"), ("a", "d")]);
        assert_eq!(max_dependency_depth(&graph), 4);

        let cyclic = graph_of(&[("a", "b"), ("b", "a")]);
        assert_eq!(max_dependency_depth(&cyclic), 2);
    }

    #[test]
    fn test_refactoring_priority() {
        let mut graph = graph_of(&[("hub", "core"), ("core", "hub")]);
        for i in 0..12 {
            graph.add_edge(&format!("client{:02}", i), "hub");
        }
        let metrics = calculate_metrics(&graph, &ModuleClasses::new());
        let priority = &metrics.system.refactoring_priority;

        assert!(!priority.is_empty());
        assert!(priority.len() <= PRIORITY_LIMIT);
        assert_eq!(priority[0].module, "hub");
        assert!(priority.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_abstract_names() {
        let abstract_names = [
            "RepositoryBase",
            "StorageABC",
            "PaymentInterface",
            "IService",
            "NodeAbstract",
        ];
        for name in abstract_names {
            assert!(is_abstract_name(name), "{}", name);
        }
        for name in ["Base", "ABC", "I", "IO", "Item", "User", "Iservice"] {
            assert!(!is_abstract_name(name), "{}", name);
        }
    }

    #[test]
    fn test_abstractness_and_distance() {
        let graph = graph_of(&[("app.services", "app.ports"), ("app.api", "app.models")]);
        let mut classes = ModuleClasses::new();
        classes.insert(
            "app.ports".to_string(),
            vec!["RepositoryBase".to_string(), "IMailer".to_string()],
        );
        classes.insert(
            "app.models".to_string(),
            vec!["User".to_string(), "OrderBase".to_string()],
        );
        let metrics = calculate_metrics(&graph, &classes);

        // Stable and fully abstract: on the main sequence
        let ports = metrics.module("app.ports").unwrap();
        assert_eq!(ports.abstractness, 1.0);
        assert_eq!(ports.distance, 0.0);

        // Stable and half abstract
        let models = metrics.module("app.models").unwrap();
        assert_eq!(models.abstractness, 0.5);
        assert_eq!(models.distance, 0.5);

        // Unstable without classes
        let api = metrics.module("app.api").unwrap();
        assert_eq!(api.abstractness, 0.0);
        assert_eq!(api.distance, 0.0);

        assert!((metrics.system.average_abstractness - 0.375).abs() < 1e-9);
        assert!((metrics.system.main_sequence_deviation - 0.125).abs() < 1e-9);
    }

    #[test]
    fn test_distance_raises_priority() {
        let concrete = ModuleMetrics {
            name: "app.models".to_string(),
            fan_in: 4,
            distance: 1.0,
            ..Default::default()
        };
        let abstracted = ModuleMetrics {
            abstractness: 1.0,
            distance: 0.0,
            ..concrete.clone()
        };
        assert_eq!(abstracted.priority_score(), 2.0);
        assert_eq!(concrete.priority_score(), 52.0);

        let isolated = ModuleMetrics {
            distance: 1.0,
            ..Default::default()
        };
        assert_eq!(isolated.priority_score(), 0.0);
    }

    #[test]
    fn test_package_coupling() {
        let graph = graph_of(&[("a.x", "b.y"), ("a.z", "b.y"), ("a.x", "a.z"), ("top", "a.x")]);
        let coupling = package_coupling(&graph);
        assert_eq!(coupling["a"]["b"], 2);
        assert_eq!(coupling.len(), 1);
    }
}
