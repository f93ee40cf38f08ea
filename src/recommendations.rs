//! Refactoring recommendations derived from architecture validation

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::architecture::ArchitectureReport;

/// Recommendation count below which the generic DI advice is added
const MIN_RECOMMENDATIONS: usize = 3;

/// What kind of change is being recommended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationKind {
    Restructure,
    Refactor,
    Interface,
}

impl fmt::Display for RecommendationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecommendationKind::Restructure => write!(f, "Restructure"),
            RecommendationKind::Refactor => write!(f, "Refactor"),
            RecommendationKind::Interface => write!(f, "Interface"),
        }
    }
}

/// Urgency, most urgent first when sorted
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationPriority {
    Critical,
    High,
    Medium,
    Low,
}

impl fmt::Display for RecommendationPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecommendationPriority::Critical => write!(f, "Critical"),
            RecommendationPriority::High => write!(f, "High"),
            RecommendationPriority::Medium => write!(f, "Medium"),
            RecommendationPriority::Low => write!(f, "Low"),
        }
    }
}

/// Rough size of the work a recommendation asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimatedEffort {
    /// Under half a day
    Low,
    /// A few days at most
    Medium,
    High,
    /// More than a week
    Large,
}

impl fmt::Display for EstimatedEffort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EstimatedEffort::Low => write!(f, "Low"),
            EstimatedEffort::Medium => write!(f, "Medium"),
            EstimatedEffort::High => write!(f, "High"),
            EstimatedEffort::Large => write!(f, "Large"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub priority: RecommendationPriority,
    pub title: String,
    pub description: String,
    pub modules: Vec<String>,
    pub benefits: Vec<String>,
    pub effort: EstimatedEffort,
    /// Ordered implementation steps
    pub steps: Vec<String>,
}

fn lines(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Tunables for recommendation generation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecommendationThresholds {
    /// Violations from one module that make it a restructuring target
    pub module_violation_threshold: usize,
    /// Layer cohesion below this is reported
    pub low_cohesion: f64,
}

impl Default for RecommendationThresholds {
    fn default() -> Self {
        Self {
            module_violation_threshold: 3,
            low_cohesion: 0.5,
        }
    }
}

/// Turn an architecture report into prioritized recommendations
pub fn generate_recommendations(
    report: &ArchitectureReport,
    thresholds: &RecommendationThresholds,
) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    let mut per_module: BTreeMap<&str, usize> = BTreeMap::new();
    for violation in &report.violations {
        *per_module.entry(violation.from_module.as_str()).or_insert(0) += 1;
    }

    let mut ranked: Vec<(&str, usize)> = per_module.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let threshold = thresholds.module_violation_threshold.max(1);
    let (heavy, light): (Vec<_>, Vec<_>) =
        ranked.into_iter().partition(|(_, count)| *count >= threshold);

    if !heavy.is_empty() {
        recommendations.push(Recommendation {
            kind: RecommendationKind::Restructure,
            priority: RecommendationPriority::Critical,
            title: "Restructure Modules with Multiple Violations".to_string(),
            description: format!(
                "{} module(s) have {} or more layer violations each (compliance {:.1}%). \
                 Consider moving them to the layer they actually belong to or splitting them.",
                heavy.len(),
                threshold,
                report.compliance * 100.0
            ),
            modules: heavy.iter().map(|(m, _)| m.to_string()).collect(),
            benefits: lines(&[
                "Clear separation of concerns",
                "Less coupling between layers",
                "Modules that are easier to test in isolation",
            ]),
            effort: EstimatedEffort::Large,
            steps: lines(&[
                "Write down which layer each listed module is meant to belong to",
                "Move code that serves another layer into that layer",
                "Add interfaces where an inner layer still needs outer behaviour",
                "Fix the remaining violations module by module",
            ]),
        });
    }

    if !light.is_empty() {
        recommendations.push(Recommendation {
            kind: RecommendationKind::Refactor,
            priority: RecommendationPriority::High,
            title: "Fix Layer Violations".to_string(),
            description: format!(
                "{} module(s) depend on layers their rules do not allow. \
                 Route these calls through an allowed layer.",
                light.len()
            ),
            modules: light.iter().map(|(m, _)| m.to_string()).collect(),
            benefits: lines(&[
                "Fewer architecture violations",
                "Layer rules that hold in practice",
            ]),
            effort: EstimatedEffort::Medium,
            steps: lines(&[
                "Review the imports of each listed module",
                "Find the import that crosses a layer boundary",
                "Introduce an abstraction or move the code to the right layer",
            ]),
        });
    }

    for (layer, cohesion) in &report.layer_cohesion {
        if !report.problematic_layers.contains(layer) || *cohesion >= thresholds.low_cohesion {
            continue;
        }
        let members = report
            .layer_assignments
            .iter()
            .filter(|(_, l)| *l == layer)
            .map(|(m, _)| m.clone())
            .collect();
        recommendations.push(Recommendation {
            kind: RecommendationKind::Restructure,
            priority: RecommendationPriority::Medium,
            title: format!("Improve Cohesion in {} Layer", capitalize(layer)),
            description: format!(
                "Only {:.1}% of the dependencies leaving the {} layer stay inside it. \
                 Group related modules together or merge thin wrappers.",
                cohesion * 100.0,
                layer
            ),
            modules: members,
            benefits: lines(&[
                "Better separation of concerns",
                "Modules that are easier to reuse",
            ]),
            effort: EstimatedEffort::Medium,
            steps: lines(&[
                "Review what each module in the layer is responsible for",
                "Group related functionality together",
                "Split the layer if it serves several distinct purposes",
            ]),
        });
    }

    if recommendations.len() < MIN_RECOMMENDATIONS && !report.violations.is_empty() {
        recommendations.push(Recommendation {
            kind: RecommendationKind::Interface,
            priority: RecommendationPriority::Low,
            title: "Introduce Dependency Injection".to_string(),
            description: "Pass dependencies in from the outer layers instead of importing \
                          concrete implementations, so inner layers depend only on abstractions."
                .to_string(),
            modules: Vec::new(),
            benefits: lines(&[
                "Tests can pass in fake dependencies",
                "Less coupling between components",
            ]),
            effort: EstimatedEffort::Medium,
            steps: lines(&[
                "Identify tightly coupled components",
                "Define a protocol or abstract base class for each dependency",
                "Pass dependencies in rather than constructing them directly",
            ]),
        });
    }

    recommendations
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
