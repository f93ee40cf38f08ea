//! Dependency analysis pipeline
//!
//! collect files -> name modules -> parse in parallel (rayon) -> resolve
//! imports -> build the graph -> cycles, metrics, layers, recommendations.
//!
//! Parsing is the only parallel phase. Each worker writes into its own
//! slot of a pre-sized table, so no locking is needed; the table is sealed
//! into `ParsedFiles` before resolution starts.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::architecture::{
    ArchitectureReport, ArchitectureSpec, CompiledArchitecture, LayerViolation, auto_detect,
};
use crate::collector::{CollectorError, collect_python_files};
use crate::cycles::{CycleAnalysis, analyze_cycles, find_cycles};
use crate::graph::{DependencyEdge, DependencyGraph};
use crate::metrics::{CouplingMetrics, ModuleClasses, calculate_metrics};
use crate::parser::{ParsedSource, parse_source};
use crate::recommendations::{Recommendation, RecommendationThresholds, generate_recommendations};
use crate::resolver::{ModuleIndex, determine_roots};

/// Errors that abort an analysis
#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("no Python files found")]
    NoFiles,

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error(transparent)]
    Collector(#[from] CollectorError),

    #[error("dependency analysis cancelled")]
    Cancelled,
}

/// Cooperative cancellation flag shared with the caller
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    fn check(&self) -> Result<(), AnalyzerError> {
        if self.is_cancelled() {
            Err(AnalyzerError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// What to analyze
#[derive(Debug, Clone)]
pub struct DependencyRequest {
    pub paths: Vec<PathBuf>,
    pub recursive: bool,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// Explicit architecture; takes precedence over auto-detection
    pub architecture: Option<ArchitectureSpec>,
    /// Infer layers from module names when no architecture is given
    pub auto_detect: bool,
}

impl DependencyRequest {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            recursive: true,
            include: Vec::new(),
            exclude: Vec::new(),
            architecture: None,
            auto_detect: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyCycle {
    pub modules: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DependencySummary {
    pub modules: usize,
    pub edges: usize,
    pub cycles: usize,
    pub files_analyzed: usize,
    pub layer_violations: usize,
}

/// Module graph, cycles and optional layer violations for one run
#[derive(Debug, Clone, Serialize)]
pub struct DependencyResponse {
    /// module -> backing files
    pub modules: BTreeMap<String, Vec<PathBuf>>,
    pub edges: Vec<DependencyEdge>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cycles: Vec<DependencyCycle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer_violations: Option<Vec<LayerViolation>>,
    pub summary: DependencySummary,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    pub generated_at: String,
    pub version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub dot: String,
}

/// Wall-clock time spent in each phase
#[derive(Debug, Clone, Copy, Default)]
pub struct PhaseTimings {
    pub collect: Duration,
    pub parse: Duration,
    pub resolve: Duration,
    pub analyze: Duration,
}

impl PhaseTimings {
    pub fn total(&self) -> Duration {
        self.collect + self.parse + self.resolve + self.analyze
    }
}

/// Everything known about the analyzed system
#[derive(Debug, Clone, Serialize)]
pub struct SystemAnalysis {
    pub dependencies: DependencyResponse,
    pub cycles: CycleAnalysis,
    pub metrics: CouplingMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub architecture: Option<ArchitectureReport>,
    pub recommendations: Vec<Recommendation>,
    #[serde(skip)]
    pub graph: DependencyGraph,
    #[serde(skip)]
    pub timings: PhaseTimings,
}

/// Result of reading and parsing one file
#[derive(Debug)]
enum FileOutcome {
    Parsed(ParsedSource),
    ReadFailed(String),
    ParseFailed(String),
    /// File names no module, or the run was cancelled
    Skipped,
}

/// Parse results in file order, read-only once built
struct ParsedFiles {
    entries: Vec<(PathBuf, FileOutcome)>,
}

impl ParsedFiles {
    fn iter(&self) -> impl Iterator<Item = &(PathBuf, FileOutcome)> {
        self.entries.iter()
    }
}

fn parse_file(path: &Path, index: &ModuleIndex, cancel: &Cancellation) -> FileOutcome {
    if cancel.is_cancelled() || index.module_for(path).is_none() {
        return FileOutcome::Skipped;
    }

    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => return FileOutcome::ReadFailed(e.to_string()),
    };

    match parse_source(&source) {
        Ok(parsed) => {
            debug!(
                file = %path.display(),
                imports = parsed.imports.len(),
                classes = parsed.classes.len(),
                "parsed"
            );
            FileOutcome::Parsed(parsed)
        }
        Err(e) => FileOutcome::ParseFailed(e.to_string()),
    }
}

fn parse_files(
    files: &[PathBuf],
    index: &ModuleIndex,
    cancel: &Cancellation,
) -> Result<ParsedFiles, AnalyzerError> {
    let num_threads = rayon::current_num_threads();
    let file_count = files.len();

    // ~4 chunks per thread keeps work-stealing effective on large trees
    let chunk_size = if file_count < num_threads * 2 {
        1
    } else {
        (file_count / (num_threads * 4)).max(1)
    };

    let mut table: Vec<Vec<FileOutcome>> = Vec::with_capacity(file_count.div_ceil(chunk_size));
    files
        .par_chunks(chunk_size)
        .map(|chunk| {
            chunk
                .iter()
                .map(|path| parse_file(path, index, cancel))
                .collect::<Vec<_>>()
        })
        .collect_into_vec(&mut table);

    cancel.check()?;

    let entries = files
        .iter()
        .cloned()
        .zip(table.into_iter().flatten())
        .collect();
    Ok(ParsedFiles { entries })
}

/// Edges, classes and diagnostics gathered from parsed files
struct Resolved {
    graph: DependencyGraph,
    classes: ModuleClasses,
    warnings: Vec<String>,
    errors: Vec<String>,
}

/// Turn parse results into graph edges, checking for cancellation per file
fn resolve_edges(
    parsed: &ParsedFiles,
    index: &ModuleIndex,
    cancel: &Cancellation,
) -> Result<Resolved, AnalyzerError> {
    let mut graph = DependencyGraph::new();
    for module in index.modules().keys() {
        graph.add_node(module);
    }

    let mut classes = ModuleClasses::new();
    let mut warnings = Vec::new();
    let mut errors = Vec::new();
    for (path, outcome) in parsed.iter() {
        cancel.check()?;
        match outcome {
            FileOutcome::Parsed(source) => {
                let Some(from) = index.module_for(path) else {
                    continue;
                };
                for target in index.resolve_targets(from, &source.imports) {
                    graph.add_edge(from, &target);
                }
                if !source.classes.is_empty() {
                    classes
                        .entry(from.to_string())
                        .or_default()
                        .extend(source.classes.iter().cloned());
                }
            }
            FileOutcome::ReadFailed(e) => {
                warn!(file = %path.display(), error = %e, "read failed");
                errors.push(format!("[{}] read failed: {}", path.display(), e));
            }
            FileOutcome::ParseFailed(e) => {
                warn!(file = %path.display(), error = %e, "parse error");
                warnings.push(format!("[{}] parse error: {}", path.display(), e));
            }
            FileOutcome::Skipped => {}
        }
    }

    Ok(Resolved {
        graph,
        classes,
        warnings,
        errors,
    })
}

/// Graph and diagnostics before any derived analysis
struct GraphBuild {
    graph: DependencyGraph,
    classes: ModuleClasses,
    modules: BTreeMap<String, Vec<PathBuf>>,
    files_analyzed: usize,
    warnings: Vec<String>,
    errors: Vec<String>,
    timings: PhaseTimings,
}

fn build_graph(
    req: &DependencyRequest,
    cancel: &Cancellation,
) -> Result<GraphBuild, AnalyzerError> {
    if req.paths.is_empty() {
        return Err(AnalyzerError::InvalidPath("no paths given".to_string()));
    }
    let mut timings = PhaseTimings::default();

    let start = Instant::now();
    let files = collect_python_files(&req.paths, req.recursive, &req.include, &req.exclude)?;
    if files.is_empty() {
        return Err(AnalyzerError::NoFiles);
    }
    let roots = determine_roots(&req.paths);
    let index = ModuleIndex::build(&files, &roots);
    timings.collect = start.elapsed();
    info!(
        files = files.len(),
        modules = index.modules().len(),
        elapsed = ?timings.collect,
        "collected files"
    );

    let start = Instant::now();
    let parsed = parse_files(&files, &index, cancel)?;
    timings.parse = start.elapsed();
    info!(elapsed = ?timings.parse, "parsed files");

    let start = Instant::now();
    let resolved = resolve_edges(&parsed, &index, cancel)?;
    timings.resolve = start.elapsed();
    info!(
        edges = resolved.graph.edge_count(),
        elapsed = ?timings.resolve,
        "resolved imports"
    );

    Ok(GraphBuild {
        graph: resolved.graph,
        classes: resolved.classes,
        modules: index.into_modules(),
        files_analyzed: files.len(),
        warnings: resolved.warnings,
        errors: resolved.errors,
        timings,
    })
}

/// The explicit architecture, or one inferred from module names
fn select_architecture(
    req: &DependencyRequest,
    graph: &DependencyGraph,
) -> Option<(ArchitectureSpec, bool)> {
    match &req.architecture {
        Some(spec) if spec.is_actionable() => Some((spec.clone(), false)),
        _ if req.auto_detect => auto_detect(graph).map(|spec| (spec, true)),
        _ => None,
    }
}

fn validate_architecture(
    req: &DependencyRequest,
    graph: &DependencyGraph,
) -> Option<ArchitectureReport> {
    let (spec, detected) = select_architecture(req, graph)?;
    let mut report = CompiledArchitecture::new(spec).validate(graph);
    report.auto_detected = detected;
    Some(report)
}

fn respond(build: &GraphBuild, report: Option<&ArchitectureReport>) -> DependencyResponse {
    let edges = build.graph.edges();
    let cycles: Vec<DependencyCycle> = find_cycles(&build.graph)
        .into_iter()
        .map(|modules| DependencyCycle { modules })
        .collect();
    let layer_violations = report.map(|r| r.violations.clone());

    DependencyResponse {
        summary: DependencySummary {
            modules: build.modules.len(),
            edges: edges.len(),
            cycles: cycles.len(),
            files_analyzed: build.files_analyzed,
            layer_violations: layer_violations.as_ref().map_or(0, Vec::len),
        },
        modules: build.modules.clone(),
        edges,
        cycles,
        layer_violations,
        warnings: build.warnings.clone(),
        errors: build.errors.clone(),
        generated_at: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        dot: build.graph.to_dot(),
    }
}

/// Build the module dependency graph and report edges, cycles and layer violations
pub fn analyze_dependencies(
    req: &DependencyRequest,
    cancel: &Cancellation,
) -> Result<DependencyResponse, AnalyzerError> {
    let build = build_graph(req, cancel)?;
    let report = validate_architecture(req, &build.graph);
    Ok(respond(&build, report.as_ref()))
}

/// Full analysis: dependencies plus cycle classification, coupling
/// metrics, architecture validation and recommendations
pub fn analyze_system(
    req: &DependencyRequest,
    thresholds: &RecommendationThresholds,
    cancel: &Cancellation,
) -> Result<SystemAnalysis, AnalyzerError> {
    let build = build_graph(req, cancel)?;

    let start = Instant::now();
    let architecture = validate_architecture(req, &build.graph);
    let dependencies = respond(&build, architecture.as_ref());
    let cycles = analyze_cycles(&build.graph);
    let metrics = calculate_metrics(&build.graph, &build.classes);
    let recommendations = architecture
        .as_ref()
        .map(|report| generate_recommendations(report, thresholds))
        .unwrap_or_default();

    let mut timings = build.timings;
    timings.analyze = start.elapsed();
    info!(elapsed = ?timings.analyze, "analyzed graph");

    Ok(SystemAnalysis {
        dependencies,
        cycles,
        metrics,
        architecture,
        recommendations,
        graph: build.graph,
        timings,
    })
}
