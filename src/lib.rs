//! # pycoupling - Python Dependency & Architecture Analysis
//!
//! Builds the module-level import graph of a Python codebase and reports
//! what is wrong with its structure.
//!
//! ## Overview
//!
//! 1. **Dependency graph** - files are named as dotted modules, parsed
//!    with tree-sitter, and their imports resolved against the local
//!    module set (third-party imports are dropped)
//! 2. **Cycles** - found by depth-first search over back edges (one per
//!    back edge, not every elementary cycle), with severity and
//!    suggestions for breaking them
//! 3. **Coupling metrics** - fan-in, fan-out and instability per module,
//!    plus system-wide modularity and complexity
//! 4. **Architecture** - layers declared in `.pycoupling.toml` (or
//!    inferred from package names) are checked edge by edge
//!
//! ## Usage
//!
//! ```bash
//! # Full Markdown report
//! pycoupling analyze ./src
//!
//! # Summary only
//! pycoupling analyze --summary ./src
//!
//! # CI gate
//! pycoupling check --max-cycles 0 --min-compliance 0.9 ./src
//! ```
//!
//! ## Instability
//!
//! ```text
//! I = fan_out / (fan_in + fan_out)
//! ```
//!
//! - I close to 0: many dependents, few dependencies (stable)
//! - I close to 1: depends on much, nothing depends on it (unstable)

pub mod analyzer;
pub mod architecture;
pub mod cli_output;
pub mod collector;
pub mod config;
pub mod cycles;
pub mod graph;
pub mod metrics;
pub mod parser;
pub mod recommendations;
pub mod report;
pub mod resolver;
pub mod web;

pub use analyzer::{
    AnalyzerError, Cancellation, DependencyCycle, DependencyRequest, DependencyResponse,
    DependencySummary, PhaseTimings, SystemAnalysis, analyze_dependencies, analyze_system,
};
pub use architecture::{
    ArchitectureLayer, ArchitectureReport, ArchitectureRule, ArchitectureSpec,
    CompiledArchitecture, LayerViolation, ViolationSeverity, auto_detect,
};
pub use cli_output::{
    CheckConfig, CheckResult, generate_check_output, generate_json_output, run_check,
};
pub use collector::{CollectorError, collect_python_files};
pub use config::{
    AnalysisConfig, ConfigError, PyCouplingConfig, ThresholdsConfig, load_config,
    load_config_file,
};
pub use cycles::{
    CircularDependency, CycleAnalysis, CycleSeverity, analyze_cycles, find_cycles, rotate_cycle,
};
pub use graph::{DependencyEdge, DependencyGraph};
pub use metrics::{CouplingMetrics, ModuleClasses, ModuleMetrics, SystemMetrics, calculate_metrics};
pub use parser::{ImportSpec, ParseError, ParsedSource, PythonParser, parse_imports, parse_source};
pub use recommendations::{
    EstimatedEffort, Recommendation, RecommendationKind, RecommendationPriority,
    RecommendationThresholds, generate_recommendations,
};
pub use report::{generate_report, generate_summary};
pub use resolver::{ModuleIndex, module_name_from_path, resolve_imports};
