//! Module dependency graph
//!
//! A directed graph of dotted module names. Insertion is idempotent and
//! all iteration is ordered, so two runs over the same file set produce
//! byte-identical edge lists and DOT output.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

/// A directed "imports" relationship between two modules
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub from: String,
    pub to: String,
}

impl DependencyEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Owned adjacency-set graph over module names
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// module -> modules it imports
    dependencies: BTreeMap<String, BTreeSet<String>>,
    /// module -> modules importing it
    dependents: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module node (no-op if it already exists)
    pub fn add_node(&mut self, module: &str) {
        if !self.dependencies.contains_key(module) {
            self.dependencies.insert(module.to_string(), BTreeSet::new());
            self.dependents.insert(module.to_string(), BTreeSet::new());
        }
    }

    /// Add a directed edge, creating both endpoints if needed
    pub fn add_edge(&mut self, from: &str, to: &str) {
        self.add_node(from);
        self.add_node(to);
        if let Some(targets) = self.dependencies.get_mut(from) {
            targets.insert(to.to_string());
        }
        if let Some(sources) = self.dependents.get_mut(to) {
            sources.insert(from.to_string());
        }
    }

    pub fn contains(&self, module: &str) -> bool {
        self.dependencies.contains_key(module)
    }

    pub fn node_count(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// All module names in sorted order
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.dependencies.keys().map(String::as_str)
    }

    /// Modules imported by `module`, self-loops excluded
    pub fn dependencies<'a>(&'a self, module: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.dependencies
            .get(module)
            .into_iter()
            .flatten()
            .map(String::as_str)
            .filter(move |target| *target != module)
    }

    /// Modules importing `module`, self-loops excluded
    pub fn dependents<'a>(&'a self, module: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.dependents
            .get(module)
            .into_iter()
            .flatten()
            .map(String::as_str)
            .filter(move |source| *source != module)
    }

    pub fn out_degree(&self, module: &str) -> usize {
        self.dependencies(module).count()
    }

    pub fn in_degree(&self, module: &str) -> usize {
        self.dependents(module).count()
    }

    /// Every edge in (from, to) order. Self-loops never appear here.
    pub fn edges(&self) -> Vec<DependencyEdge> {
        self.dependencies
            .iter()
            .flat_map(|(from, targets)| {
                targets
                    .iter()
                    .filter(move |to| *to != from)
                    .map(move |to| DependencyEdge::new(from.clone(), to.clone()))
            })
            .collect()
    }

    pub fn edge_count(&self) -> usize {
        self.dependencies
            .iter()
            .map(|(from, targets)| targets.iter().filter(|to| *to != from).count())
            .sum()
    }

    /// Strongly connected components with more than one module
    ///
    /// Iterative Tarjan. Each component is sorted, and components are
    /// ordered by their first member.
    pub fn cyclic_components(&self) -> Vec<Vec<String>> {
        let names: Vec<&str> = self.nodes().collect();
        let index_of: HashMap<&str, usize> =
            names.iter().enumerate().map(|(i, name)| (*name, i)).collect();
        let successors: Vec<Vec<usize>> = names
            .iter()
            .map(|name| {
                self.dependencies(name)
                    .filter_map(|target| index_of.get(target).copied())
                    .collect()
            })
            .collect();

        const UNVISITED: usize = usize::MAX;
        let count = names.len();
        let mut index = vec![UNVISITED; count];
        let mut low_link = vec![0; count];
        let mut on_stack = vec![false; count];
        let mut stack: Vec<usize> = Vec::new();
        let mut next_index = 0;
        let mut components = Vec::new();

        for root in 0..count {
            if index[root] != UNVISITED {
                continue;
            }
            index[root] = next_index;
            low_link[root] = next_index;
            next_index += 1;
            stack.push(root);
            on_stack[root] = true;

            let mut call_stack: Vec<(usize, usize)> = vec![(root, 0)];
            while let Some(frame) = call_stack.last_mut() {
                let node = frame.0;
                if frame.1 < successors[node].len() {
                    let next = successors[node][frame.1];
                    frame.1 += 1;
                    if index[next] == UNVISITED {
                        index[next] = next_index;
                        low_link[next] = next_index;
                        next_index += 1;
                        stack.push(next);
                        on_stack[next] = true;
                        call_stack.push((next, 0));
                    } else if on_stack[next] {
                        low_link[node] = low_link[node].min(index[next]);
                    }
                    continue;
                }

                call_stack.pop();
                if let Some(&(parent, _)) = call_stack.last() {
                    low_link[parent] = low_link[parent].min(low_link[node]);
                }
                if low_link[node] == index[node] {
                    let mut component = Vec::new();
                    while let Some(member) = stack.pop() {
                        on_stack[member] = false;
                        component.push(names[member].to_string());
                        if member == node {
                            break;
                        }
                    }
                    if component.len() > 1 {
                        component.sort();
                        components.push(component);
                    }
                }
            }
        }

        components.sort();
        components
    }

    /// Render the graph in Graphviz DOT format
    ///
    /// Modules inside a cyclic component are filled, and edges between
    /// members of the same component are drawn red.
    pub fn to_dot(&self) -> String {
        let components = self.cyclic_components();
        let mut component_of: HashMap<&str, usize> = HashMap::new();
        for (i, component) in components.iter().enumerate() {
            for module in component {
                component_of.insert(module.as_str(), i);
            }
        }

        let mut dot = String::from("digraph dependencies {\n");
        dot.push_str("  rankdir=LR;\n");
        dot.push_str("  node [shape=box, fontname=\"Helvetica\"];\n");

        for module in self.nodes() {
            if component_of.contains_key(module) {
                dot.push_str(&format!(
                    "  \"{}\" [style=filled, fillcolor=\"#ffe6e6\"];\n",
                    escape_dot(module)
                ));
            } else {
                dot.push_str(&format!("  \"{}\";\n", escape_dot(module)));
            }
        }

        for edge in self.edges() {
            let in_cycle = match (
                component_of.get(edge.from.as_str()),
                component_of.get(edge.to.as_str()),
            ) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            };
            if in_cycle {
                dot.push_str(&format!(
                    "  \"{}\" -> \"{}\" [color=red];\n",
                    escape_dot(&edge.from),
                    escape_dot(&edge.to)
                ));
            } else {
                dot.push_str(&format!(
                    "  \"{}\" -> \"{}\";\n",
                    escape_dot(&edge.from),
                    escape_dot(&edge.to)
                ));
            }
        }

        dot.push_str("}\n");
        dot
    }
}

fn escape_dot(name: &str) -> String {
    name.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_node_is_idempotent() {
        let mut graph = DependencyGraph::new();
        graph.add_node("pkg.a");
        graph.add_node("pkg.a");
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn test_add_edge_is_idempotent() {
        let mut graph = DependencyGraph::new();
        graph.add_edge("pkg.a", "pkg.b");
        graph.add_edge("pkg.a", "pkg.b");
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.edges(), vec![DependencyEdge::new("pkg.a", "pkg.b")]);
        assert!(graph.contains("pkg.b"));
    }

    #[test]
    fn test_self_loops_never_surface() {
        let mut graph = DependencyGraph::new();
        graph.add_edge("pkg.a", "pkg.a");
        graph.add_edge("pkg.a", "pkg.b");

        let edges = graph.edges();
        assert_eq!(edges.len(), 1);
        assert!(edges.iter().all(|e| e.from != e.to));
        assert_eq!(graph.out_degree("pkg.a"), 1);
        assert_eq!(graph.in_degree("pkg.a"), 0);
        assert!(graph.cyclic_components().is_empty());
    }

    #[test]
    fn test_degrees_and_neighbours() {
        let mut graph = DependencyGraph::new();
        graph.add_edge("a", "b");
        graph.add_edge("a", "c");
        graph.add_edge("c", "b");

        assert_eq!(graph.out_degree("a"), 2);
        assert_eq!(graph.in_degree("b"), 2);
        assert_eq!(graph.dependents("b").collect::<Vec<_>>(), vec!["a", "c"]);
        assert_eq!(graph.dependencies("missing").count(), 0);
    }

    #[test]
    fn test_cyclic_components() {
        let mut graph = DependencyGraph::new();
        graph.add_edge("a", "b");
        graph.add_edge("b", "c");
        graph.add_edge("c", "a");
        graph.add_edge("d", "e");

        assert_eq!(
            graph.cyclic_components(),
            vec![vec!["a".to_string(), "b".to_string(), "c".to_string()]]
        );
    }

    #[test]
    fn test_dot_highlights_cycles() {
        let mut graph = DependencyGraph::new();
        graph.add_edge("a", "b");
        graph.add_edge("b", "a");
        graph.add_edge("b", "c");

        let dot = graph.to_dot();
        assert!(dot.starts_with("digraph dependencies {"));
        assert!(dot.contains("\"a\" [style=filled, fillcolor=\"#ffe6e6\"];"));
        assert!(dot.contains("\"a\" -> \"b\" [color=red];"));
        assert!(dot.contains("\"b\" -> \"c\";"));
        assert!(dot.contains("  \"c\";\n"));
    }

    #[test]
    fn test_empty_graph() {
        let graph = DependencyGraph::new();
        assert!(graph.is_empty());
        assert!(graph.edges().is_empty());
        assert_eq!(
            graph.to_dot(),
            "digraph dependencies {\n  rankdir=LR;\n  node [shape=box, fontname=\"Helvetica\"];\n}\n"
        );
    }
}
