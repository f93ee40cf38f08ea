//! Layered architecture validation
//!
//! Modules are assigned to layers through dotted-name globs, and every
//! cross-layer edge of the dependency graph is checked against the
//! allow/deny rules of its source layer.
//!
//! ## Glob syntax
//!
//! - `.` separates segments and is literal
//! - `*` matches exactly one segment
//! - `**` matches zero or more segments
//! - `?` matches a single character
//!
//! So `app.api.**` matches `app.api` and `app.api.v1.users`, while
//! `app.*` matches `app.models` but not `app.models.user`.

use std::collections::{BTreeMap, BTreeSet};

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::graph::DependencyGraph;

/// Layer name for modules matching no layer pattern
pub const UNKNOWN_LAYER: &str = "unknown";

/// Cohesion below which a layer is considered problematic
pub const LOW_COHESION: f64 = 0.5;

/// A named layer and the module globs belonging to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchitectureLayer {
    pub name: String,
    #[serde(default)]
    pub packages: Vec<String>,
}

impl ArchitectureLayer {
    pub fn new(name: &str, packages: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            packages: packages.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Which layers a layer may (or may not) depend on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchitectureRule {
    pub from: String,
    #[serde(default)]
    pub allow: Vec<String>,
    #[serde(default)]
    pub deny: Vec<String>,
}

impl ArchitectureRule {
    pub fn allow(from: &str, allow: &[&str]) -> Self {
        Self {
            from: from.to_string(),
            allow: allow.iter().map(|l| l.to_string()).collect(),
            deny: Vec::new(),
        }
    }
}

/// A full layered architecture description
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchitectureSpec {
    #[serde(default)]
    pub layers: Vec<ArchitectureLayer>,
    #[serde(default)]
    pub rules: Vec<ArchitectureRule>,
    /// Flag modules outside every layer and layers without rules
    #[serde(default)]
    pub strict: bool,
}

impl ArchitectureSpec {
    /// Whether there is anything to validate against
    pub fn is_actionable(&self) -> bool {
        !self.layers.is_empty() && !self.rules.is_empty()
    }
}

/// Violation severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationSeverity {
    Error,
    Warning,
}

impl std::fmt::Display for ViolationSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViolationSeverity::Error => write!(f, "error"),
            ViolationSeverity::Warning => write!(f, "warning"),
        }
    }
}

/// An edge breaking the architecture rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerViolation {
    pub from_module: String,
    pub to_module: String,
    pub from_layer: String,
    pub to_layer: String,
    /// The rule that was broken, e.g. `domain !> infrastructure`
    pub rule: String,
    pub severity: ViolationSeverity,
    pub description: String,
    pub suggestion: String,
}

/// Compile a dotted-name glob into an anchored regex
///
/// Returns `None` for an empty glob.
pub fn compile_glob(glob: &str) -> Option<Regex> {
    let glob = glob.trim();
    if glob.is_empty() {
        return None;
    }

    let mut segments: Vec<&str> = glob.split('.').collect();
    segments.dedup_by(|a, b| *a == "**" && *b == "**");
    let last = segments.len() - 1;
    let mut pattern = String::from("^");

    for (i, segment) in segments.iter().enumerate() {
        if *segment == "**" {
            if segments.len() == 1 {
                pattern.push_str(".*");
            } else if i == 0 {
                pattern.push_str(r"(?:[^.]+\.)*");
            } else if i == last {
                pattern.push_str(r"(?:\.[^.]+)*");
            } else {
                pattern.push_str(r"(?:\.[^.]+)*\.");
            }
            continue;
        }

        // A separator before this segment unless a `**` already supplied it
        if i > 0 && segments[i - 1] != "**" {
            pattern.push_str(r"\.");
        }

        if *segment == "*" {
            pattern.push_str("[^.]+");
            continue;
        }

        for c in segment.chars() {
            match c {
                '*' => pattern.push_str("[^.]*"),
                '?' => pattern.push('.'),
                c => pattern.push_str(&regex_lite::escape(&c.to_string())),
            }
        }
    }

    pattern.push('$');
    Regex::new(&pattern).ok()
}

/// Whether a module name matches a dotted glob
pub fn matches_glob(glob: &str, module: &str) -> bool {
    compile_glob(glob).is_some_and(|re| re.is_match(module))
}

struct CompiledLayer {
    name: String,
    patterns: Vec<Regex>,
}

/// An [`ArchitectureSpec`] with every layer glob compiled once
pub struct CompiledArchitecture {
    spec: ArchitectureSpec,
    layers: Vec<CompiledLayer>,
}

impl CompiledArchitecture {
    pub fn new(spec: ArchitectureSpec) -> Self {
        let layers = spec
            .layers
            .iter()
            .map(|layer| CompiledLayer {
                name: layer.name.clone(),
                patterns: layer.packages.iter().filter_map(|p| compile_glob(p)).collect(),
            })
            .collect();
        Self { spec, layers }
    }

    pub fn spec(&self) -> &ArchitectureSpec {
        &self.spec
    }

    /// Layer of a module; the first declared layer with a matching glob wins
    pub fn layer_for(&self, module: &str) -> &str {
        self.layers
            .iter()
            .find(|layer| layer.patterns.iter().any(|re| re.is_match(module)))
            .map(|layer| layer.name.as_str())
            .unwrap_or(UNKNOWN_LAYER)
    }

    fn rule_for(&self, layer: &str) -> Option<&ArchitectureRule> {
        self.spec.rules.iter().find(|rule| rule.from == layer)
    }

    /// Check one edge against the rules
    pub fn evaluate_edge(&self, from: &str, to: &str) -> Option<LayerViolation> {
        let from_layer = self.layer_for(from);
        let to_layer = self.layer_for(to);

        let violation = |rule: String, severity, description: String, suggestion: String| {
            Some(LayerViolation {
                from_module: from.to_string(),
                to_module: to.to_string(),
                from_layer: from_layer.to_string(),
                to_layer: to_layer.to_string(),
                rule,
                severity,
                description,
                suggestion,
            })
        };

        if self.spec.strict && (from_layer == UNKNOWN_LAYER || to_layer == UNKNOWN_LAYER) {
            let unassigned = if from_layer == UNKNOWN_LAYER { from } else { to };
            return violation(
                "strict_mode".to_string(),
                ViolationSeverity::Warning,
                format!("Module {} is not assigned to any layer", unassigned),
                format!("Add a package pattern covering {} to a layer", unassigned),
            );
        }

        if from_layer == to_layer {
            return None;
        }

        let Some(rule) = self.rule_for(from_layer) else {
            if self.spec.strict {
                return violation(
                    "no_rule".to_string(),
                    ViolationSeverity::Warning,
                    format!("No dependency rule defined for layer {}", from_layer),
                    format!("Declare which layers {} may depend on", from_layer),
                );
            }
            return None;
        };

        if rule.deny.iter().any(|l| l == to_layer) {
            return violation(
                format!("{} !> {}", from_layer, to_layer),
                ViolationSeverity::Error,
                format!(
                    "{} ({}) must not depend on {} ({})",
                    from, from_layer, to, to_layer
                ),
                format!(
                    "Move the shared code out of the {} layer or invert the dependency",
                    to_layer
                ),
            );
        }

        if !rule.allow.iter().any(|l| l == to_layer) {
            return violation(
                format!("{} -> [{}]", from_layer, rule.allow.join(", ")),
                ViolationSeverity::Error,
                format!(
                    "{} ({}) depends on {} ({}), which is not an allowed layer",
                    from, from_layer, to, to_layer
                ),
                suggestion_for(from_layer, to_layer, &rule.allow),
            );
        }

        None
    }

    /// Validate every edge of the graph
    pub fn validate(&self, graph: &DependencyGraph) -> ArchitectureReport {
        let layer_assignments: BTreeMap<String, String> = graph
            .nodes()
            .map(|m| (m.to_string(), self.layer_for(m).to_string()))
            .collect();

        let mut violations = Vec::new();
        let mut layer_coupling: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();
        let mut edges_checked = 0;

        for edge in graph.edges() {
            edges_checked += 1;
            let from_layer = &layer_assignments[&edge.from];
            let to_layer = &layer_assignments[&edge.to];
            *layer_coupling
                .entry(from_layer.clone())
                .or_default()
                .entry(to_layer.clone())
                .or_insert(0) += 1;

            if let Some(violation) = self.evaluate_edge(&edge.from, &edge.to) {
                violations.push(violation);
            }
        }

        let layer_cohesion: BTreeMap<String, f64> = layer_assignments
            .values()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|layer| {
                let outgoing = layer_coupling.get(layer);
                let total: usize = outgoing.map(|t| t.values().sum()).unwrap_or(0);
                let intra = outgoing.and_then(|t| t.get(layer)).copied().unwrap_or(0);
                let cohesion = if total == 0 {
                    1.0
                } else {
                    intra as f64 / total as f64
                };
                (layer.clone(), cohesion)
            })
            .collect();

        let problematic_layers = layer_cohesion
            .iter()
            .filter(|(layer, cohesion)| {
                layer.as_str() != UNKNOWN_LAYER && **cohesion < LOW_COHESION
            })
            .map(|(layer, _)| layer.clone())
            .collect();

        let layers_analyzed = layer_cohesion
            .keys()
            .filter(|l| l.as_str() != UNKNOWN_LAYER)
            .count();

        let compliance = if edges_checked == 0 {
            1.0
        } else {
            (1.0 - violations.len() as f64 / edges_checked as f64).max(0.0)
        };

        let error_count = violations
            .iter()
            .filter(|v: &&LayerViolation| v.severity == ViolationSeverity::Error)
            .count();
        let warning_count = violations.len() - error_count;

        ArchitectureReport {
            layer_assignments,
            violations,
            layer_coupling,
            layer_cohesion,
            problematic_layers,
            layers_analyzed,
            compliance,
            edges_checked,
            error_count,
            warning_count,
            auto_detected: false,
        }
    }
}

fn suggestion_for(from_layer: &str, to_layer: &str, allowed: &[String]) -> String {
    if allowed.is_empty() {
        format!(
            "The {} layer should not depend on other layers; depend on abstractions defined inside it",
            from_layer
        )
    } else {
        format!(
            "Route the call from {} through {} instead of depending on {} directly",
            from_layer,
            allowed.join(" or "),
            to_layer
        )
    }
}

/// Result of validating a graph against an architecture
#[derive(Debug, Clone, Default, Serialize)]
pub struct ArchitectureReport {
    /// module -> layer
    pub layer_assignments: BTreeMap<String, String>,
    pub violations: Vec<LayerViolation>,
    /// from layer -> to layer -> edge count
    pub layer_coupling: BTreeMap<String, BTreeMap<String, usize>>,
    /// Share of a layer's outgoing edges that stay inside it
    pub layer_cohesion: BTreeMap<String, f64>,
    pub problematic_layers: Vec<String>,
    pub layers_analyzed: usize,
    /// 1 - violations / edges checked
    pub compliance: f64,
    pub edges_checked: usize,
    pub error_count: usize,
    pub warning_count: usize,
    pub auto_detected: bool,
}

impl ArchitectureReport {
    pub fn is_compliant(&self) -> bool {
        self.violations.is_empty()
    }
}

// ============================================================================
// Auto-detection
// ============================================================================

const PRESENTATION: &str = "presentation";
const APPLICATION: &str = "application";
const DOMAIN: &str = "domain";
const INFRASTRUCTURE: &str = "infrastructure";

/// Keyword tables, in matching priority order
const LAYER_KEYWORDS: &[(&str, &[&str])] = &[
    (
        PRESENTATION,
        &[
            "api",
            "views",
            "controllers",
            "routes",
            "handlers",
            "ui",
            "web",
            "rest",
            "graphql",
            "endpoints",
            "routers",
            "presentation",
        ],
    ),
    (
        INFRASTRUCTURE,
        &[
            "db",
            "database",
            "repositories",
            "repository",
            "repo",
            "external",
            "adapters",
            "persistence",
            "storage",
            "cache",
            "clients",
            "infrastructure",
        ],
    ),
    (
        APPLICATION,
        &[
            "services",
            "service",
            "use_cases",
            "usecases",
            "workflows",
            "commands",
            "queries",
            "application",
        ],
    ),
    (
        DOMAIN,
        &[
            "models",
            "entities",
            "domain",
            "core",
            "business",
            "aggregates",
            "schemas",
        ],
    ),
];

/// Order in which detected layers are declared
const LAYER_ORDER: &[&str] = &[PRESENTATION, APPLICATION, DOMAIN, INFRASTRUCTURE];

/// Shortest keyword allowed to match as a plain substring
const MIN_SUBSTRING_KEYWORD: usize = 4;

fn segment_matches(segment: &str, keyword: &str) -> bool {
    segment == keyword
        || segment.starts_with(&format!("{}_", keyword))
        || segment.ends_with(&format!("_{}", keyword))
}

/// Classify a module; returns the layer and the index of the matched segment
fn classify_module(module: &str) -> Option<(&'static str, usize)> {
    let segments: Vec<&str> = module.split('.').collect();
    let last = segments.len() - 1;

    for (layer, keywords) in LAYER_KEYWORDS {
        let segment = segments[last];
        if keywords.iter().any(|kw| {
            segment_matches(segment, kw)
                || (kw.len() >= MIN_SUBSTRING_KEYWORD && segment.contains(kw))
        }) {
            return Some((*layer, last));
        }
    }

    if last > 0 {
        for (layer, keywords) in LAYER_KEYWORDS {
            if keywords.iter().any(|kw| segment_matches(segments[last - 1], kw)) {
                return Some((*layer, last - 1));
            }
        }
    }

    for (layer, keywords) in LAYER_KEYWORDS {
        if let Some(index) = segments.iter().position(|s| keywords.contains(s)) {
            return Some((*layer, index));
        }
    }

    None
}

/// Infer a layered architecture from module naming conventions
///
/// Returns `None` when no module looks like it belongs to a known layer.
pub fn auto_detect(graph: &DependencyGraph) -> Option<ArchitectureSpec> {
    let mut prefixes: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();

    for module in graph.nodes() {
        if let Some((layer, index)) = classify_module(module) {
            let prefix = module.split('.').take(index + 1).collect::<Vec<_>>().join(".");
            prefixes.entry(layer).or_default().insert(prefix);
        }
    }

    if prefixes.is_empty() {
        return None;
    }

    let layers: Vec<ArchitectureLayer> = LAYER_ORDER
        .iter()
        .filter_map(|name| {
            let found = prefixes.get(name)?;
            let packages = found
                .iter()
                .filter(|prefix| {
                    !found
                        .iter()
                        .any(|other| prefix.starts_with(&format!("{}.", other)))
                })
                .map(|prefix| format!("{}.**", prefix))
                .collect();
            Some(ArchitectureLayer {
                name: name.to_string(),
                packages,
            })
        })
        .collect();

    let rules = vec![
        ArchitectureRule::allow(PRESENTATION, &[APPLICATION, DOMAIN, INFRASTRUCTURE]),
        ArchitectureRule::allow(APPLICATION, &[DOMAIN, INFRASTRUCTURE]),
        ArchitectureRule::allow(DOMAIN, &[INFRASTRUCTURE]),
        ArchitectureRule::allow(INFRASTRUCTURE, &[DOMAIN]),
    ];

    Some(ArchitectureSpec {
        layers,
        rules,
        strict: false,
    })
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

    fn layered_spec() -> ArchitectureSpec {
        ArchitectureSpec {
            layers: vec![
                ArchitectureLayer::new("presentation", &["app.api.**"]),
                ArchitectureLayer::new("application", &["app.services.**"]),
                ArchitectureLayer::new("domain", &["app.models.**"]),
            ],
            rules: vec![
                ArchitectureRule::allow("presentation", &["application"]),
                ArchitectureRule::allow("application", &["domain"]),
                ArchitectureRule::allow("domain", &[]),
            ],
            strict: false,
        }
    }

    #[test]
    fn test_trailing_double_star_glob() {
        let re = compile_glob("pkg.**").unwrap();
        assert!(re.is_match("pkg"));
        assert!(re.is_match("pkg.a"));
        assert!(re.is_match("pkg.a.b.c"));
        assert!(!re.is_match("pkgx"));
        assert!(!re.is_match("other.pkg"));
    }

    #[test]
    fn test_single_star_glob() {
        let re = compile_glob("pkg.*").unwrap();
        assert!(re.is_match("pkg.a"));
        assert!(!re.is_match("pkg.a.b"));
        assert!(!re.is_match("pkg"));
    }

    #[test]
    fn test_leading_and_middle_double_star() {
        assert!(matches_glob("**.models", "models"));
        assert!(matches_glob("**.models", "app.core.models"));
        assert!(!matches_glob("**.models", "app.models.user"));

        assert!(matches_glob("app.**.models", "app.models"));
        assert!(matches_glob("app.**.models", "app.a.b.models"));
        assert!(!matches_glob("app.**.models", "lib.models"));

        assert!(matches_glob("**", "anything.at.all"));
    }

    #[test]
    fn test_glob_literals_and_question_mark() {
        assert!(matches_glob("app.v?", "app.v1"));
        assert!(!matches_glob("app.v?", "app.v10"));
        assert!(matches_glob("app.test_*", "app.test_users"));
        assert!(!matches_glob("app+x", "appx"));
        assert!(compile_glob("").is_none());
        assert!(compile_glob("   ").is_none());
    }

    #[test]
    fn test_layer_for_first_match_wins() {
        let spec = ArchitectureSpec {
            layers: vec![
                ArchitectureLayer::new("special", &["app.api.admin.**"]),
                ArchitectureLayer::new("presentation", &["app.api.**"]),
            ],
            rules: Vec::new(),
            strict: false,
        };
        let arch = CompiledArchitecture::new(spec);
        assert_eq!(arch.layer_for("app.api.admin.users"), "special");
        assert_eq!(arch.layer_for("app.api.users"), "presentation");
        assert_eq!(arch.layer_for("lib.thing"), UNKNOWN_LAYER);
    }

    #[test]
    fn test_layer_skip_is_violation() {
        let graph = graph_of(&[
            ("app.api.users", "app.services.users"),
            ("app.api.users", "app.models.user"),
        ]);
        let report = CompiledArchitecture::new(layered_spec()).validate(&graph);

        assert_eq!(report.violations.len(), 1);
        let violation = &report.violations[0];
        assert_eq!(violation.from_module, "app.api.users");
        assert_eq!(violation.to_module, "app.models.user");
        assert_eq!(violation.rule, "presentation -> [application]");
        assert_eq!(violation.severity, ViolationSeverity::Error);
        assert_eq!(report.edges_checked, 2);
        assert!((report.compliance - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_deny_rule() {
        let mut spec = layered_spec();
        spec.rules[2] = ArchitectureRule {
            from: "domain".to_string(),
            allow: vec!["presentation".to_string()],
            deny: vec!["application".to_string()],
        };
        let arch = CompiledArchitecture::new(spec);

        let violation = arch
            .evaluate_edge("app.models.user", "app.services.users")
            .unwrap();
        assert_eq!(violation.rule, "domain !> application");
        assert!(arch.evaluate_edge("app.models.user", "app.api.x").is_none());
    }

    #[test]
    fn test_empty_allow_list_denies_cross_layer() {
        let arch = CompiledArchitecture::new(layered_spec());
        let violation = arch.evaluate_edge("app.models.user", "app.api.x").unwrap();
        assert_eq!(violation.rule, "domain -> []");
        assert!(arch.evaluate_edge("app.models.user", "app.models.order").is_none());
    }

    #[test]
    fn test_strict_mode() {
        let mut spec = layered_spec();
        spec.strict = true;
        spec.layers
            .push(ArchitectureLayer::new("infrastructure", &["app.db.**"]));
        let arch = CompiledArchitecture::new(spec);

        let unknown = arch.evaluate_edge("app.api.users", "requests").unwrap();
        assert_eq!(unknown.rule, "strict_mode");
        assert_eq!(unknown.severity, ViolationSeverity::Warning);

        let no_rule = arch.evaluate_edge("app.db.session", "app.models.user").unwrap();
        assert_eq!(no_rule.rule, "no_rule");
    }

    #[test]
    fn test_unknown_layers_pass_when_not_strict() {
        let arch = CompiledArchitecture::new(layered_spec());
        assert!(arch.evaluate_edge("app.api.users", "requests").is_none());
        assert!(arch.evaluate_edge("scripts.run", "app.models.user").is_none());
    }

    #[test]
    fn test_layer_cohesion() {
        let graph = graph_of(&[
            ("app.api.a", "app.api.b"),
            ("app.api.a", "app.services.x"),
            ("app.api.b", "app.services.x"),
            ("app.services.x", "app.services.y"),
        ]);
        let report = CompiledArchitecture::new(layered_spec()).validate(&graph);

        assert!((report.layer_cohesion["presentation"] - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(report.layer_cohesion["application"], 1.0);
        assert_eq!(report.problematic_layers, vec!["presentation".to_string()]);
        assert_eq!(report.layer_coupling["presentation"]["application"], 2);
        assert_eq!(report.layers_analyzed, 2);
    }

    #[test]
    fn test_empty_graph_is_compliant() {
        let report = CompiledArchitecture::new(layered_spec()).validate(&DependencyGraph::new());
        assert_eq!(report.compliance, 1.0);
        assert!(report.is_compliant());
        assert_eq!(report.edges_checked, 0);
    }

    #[test]
    fn test_classify_module() {
        assert_eq!(classify_module("app.api"), Some((PRESENTATION, 1)));
        assert_eq!(classify_module("app.api.users"), Some((PRESENTATION, 1)));
        assert_eq!(classify_module("app.user_service"), Some((APPLICATION, 1)));
        assert_eq!(classify_module("app.domain.entities.order"), Some((DOMAIN, 2)));
        assert_eq!(classify_module("app.db.session.pool"), Some((INFRASTRUCTURE, 1)));
        assert_eq!(classify_module("app.build"), None);
        assert_eq!(classify_module("main"), None);
    }

    #[test]
    fn test_auto_detect() {
        let graph = graph_of(&[
            ("app.api.users", "app.services.users"),
            ("app.services.users", "app.models.user"),
            ("app.services.users", "app.db.session"),
            ("app.models.user", "app.db.session"),
            ("app.models.user", "app.api.users"),
        ]);
        let spec = auto_detect(&graph).unwrap();

        let names: Vec<&str> = spec.layers.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["presentation", "application", "domain", "infrastructure"]);
        assert_eq!(spec.layers[0].packages, vec!["app.api.**".to_string()]);
        assert_eq!(spec.layers[3].packages, vec!["app.db.**".to_string()]);
        assert!(!spec.strict);

        let arch = CompiledArchitecture::new(spec);
        // infrastructure is reachable from every layer
        assert!(arch.evaluate_edge("app.models.user", "app.db.session").is_none());
        assert!(arch.evaluate_edge("app.api.users", "app.db.session").is_none());

        let report = arch.validate(&graph);
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].from_module, "app.models.user");
        assert_eq!(report.violations[0].to_layer, "presentation");
    }

    #[test]
    fn test_auto_detect_nothing_recognized() {
        let graph = graph_of(&[("foo.bar", "foo.baz")]);
        assert!(auto_detect(&graph).is_none());
        assert!(auto_detect(&DependencyGraph::new()).is_none());
    }
}
