//! pycoupling CLI - Python Dependency & Architecture Analysis
//!
//! Builds the module dependency graph of a Python codebase, reports cycles,
//! coupling metrics and layer violations, and serves the result over HTTP.
//!
//! Usage:
//!   pycoupling analyze [OPTIONS] [PATHS]...
//!   pycoupling check [OPTIONS] [PATHS]...

use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::process;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pycoupling::{
    Cancellation, CheckConfig, DependencyRequest, PyCouplingConfig, SystemAnalysis,
    analyze_system, generate_check_output, generate_json_output, generate_report,
    generate_summary, load_config, load_config_file,
    web::{ServerConfig, start_server},
};

/// Environment variable holding the log filter
const LOG_ENV: &str = "PYCOUPLING_LOG";

/// pycoupling - Dependency and layered-architecture analysis for Python projects
#[derive(Parser, Debug)]
#[command(name = "pycoupling")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze dependencies, cycles and architecture
    Analyze(AnalyzeArgs),
    /// Quality gate for CI: exits with 1 when a threshold is exceeded
    Check(CheckArgs),
}

/// Options shared by every command
#[derive(Args, Debug)]
struct AnalysisArgs {
    /// Files or directories to analyze
    #[arg(default_value = ".")]
    paths: Vec<PathBuf>,

    /// Config file path (default: search for .pycoupling.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only analyze files matching this glob (repeatable)
    #[arg(long, value_name = "GLOB")]
    include: Vec<String>,

    /// Skip files matching this glob (repeatable)
    #[arg(long, value_name = "GLOB")]
    exclude: Vec<String>,

    /// Only analyze the top level of each directory
    #[arg(long)]
    no_recursive: bool,

    /// Report modules outside every layer and layers without rules
    #[arg(long)]
    strict: bool,

    /// Don't infer layers from package names
    #[arg(long)]
    no_auto_detect: bool,

    /// Number of threads for parallel parsing (default: all CPU cores)
    #[arg(long, short = 'j', value_name = "N")]
    jobs: Option<usize>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Show timing information
    #[arg(long)]
    timing: bool,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    #[command(flatten)]
    analysis: AnalysisArgs,

    /// Output file for the report (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Show summary only (no detailed report)
    #[arg(short, long)]
    summary: bool,

    /// Machine-readable JSON output
    #[arg(long, conflicts_with_all = ["summary", "dot"])]
    json: bool,

    /// Graphviz DOT output
    #[arg(long, conflicts_with = "summary")]
    dot: bool,

    // === Web options ===
    /// Serve the analysis over HTTP instead of printing a report
    #[arg(long)]
    web: bool,

    /// Port for web server (default: 3000)
    #[arg(long, default_value = "3000")]
    port: u16,

    /// Don't open browser automatically when starting web server
    #[arg(long)]
    no_open: bool,
}

#[derive(Args, Debug)]
struct CheckArgs {
    #[command(flatten)]
    analysis: AnalysisArgs,

    /// Maximum allowed circular dependencies
    #[arg(long)]
    max_cycles: Option<usize>,

    /// Maximum allowed layer violations
    #[arg(long)]
    max_violations: Option<usize>,

    /// Minimum architecture compliance (0.0 - 1.0)
    #[arg(long)]
    min_compliance: Option<f64>,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze(args) => run_analyze(args),
        Commands::Check(args) => {
            let code = run_check(args)?;
            if code != 0 {
                process::exit(code);
            }
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    // A subscriber may already be installed when embedded; ignore that case
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn configure_threads(args: &AnalysisArgs) {
    let available_cores = std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1);

    let num_threads = args.jobs.unwrap_or(available_cores);
    if args.jobs.is_some() {
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()
            .unwrap_or_else(|e| eprintln!("Warning: Could not set thread count: {}", e));
    }

    if args.verbose || args.timing {
        eprintln!(
            "Using {} thread(s) for parallel processing ({} CPU cores available)",
            num_threads, available_cores
        );
    }
}

/// Load the config file; CLI flags override what it says
fn load_settings(args: &AnalysisArgs) -> Result<PyCouplingConfig, Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => load_config_file(path)?,
        None => {
            let start = args.paths.first().cloned().unwrap_or_else(|| PathBuf::from("."));
            load_config(&start)?
        }
    };

    if args.verbose && config.architecture().is_some() {
        eprintln!(
            "Loaded {} layer(s) from configuration",
            config.architecture.layers.len()
        );
    }

    Ok(config)
}

fn build_request(args: &AnalysisArgs, config: &PyCouplingConfig) -> DependencyRequest {
    let mut request = DependencyRequest::new(args.paths.clone());
    request.recursive = config.analysis.recursive && !args.no_recursive;
    request.include = if args.include.is_empty() {
        config.analysis.include.clone()
    } else {
        args.include.clone()
    };
    request.exclude = config
        .analysis
        .exclude
        .iter()
        .chain(&args.exclude)
        .cloned()
        .collect();
    request.auto_detect = config.analysis.auto_detect && !args.no_auto_detect;
    request.architecture = config.architecture().cloned().map(|mut spec| {
        spec.strict |= args.strict;
        spec
    });
    request
}

fn analyze(
    args: &AnalysisArgs,
    config: &PyCouplingConfig,
) -> Result<SystemAnalysis, Box<dyn std::error::Error>> {
    let request = build_request(args, config);
    let thresholds = config.thresholds.recommendation_thresholds();

    eprintln!(
        "Analyzing {}...",
        args.paths
            .iter()
            .map(|p| format!("'{}'", p.display()))
            .collect::<Vec<_>>()
            .join(", ")
    );

    let start = Instant::now();
    let analysis = analyze_system(&request, &thresholds, &Cancellation::new())?;
    let elapsed = start.elapsed();

    let summary = &analysis.dependencies.summary;
    if args.timing {
        eprintln!(
            "Analysis complete: {} files, {} modules (took {:.2?})",
            summary.files_analyzed, summary.modules, elapsed
        );
        let t = &analysis.timings;
        eprintln!(
            "  collect {:.2?} | parse {:.2?} | resolve {:.2?} | analyze {:.2?}",
            t.collect, t.parse, t.resolve, t.analyze
        );
        eprintln!(
            "  {:.1} files/sec\n",
            summary.files_analyzed as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
        );
    } else {
        eprintln!(
            "Analysis complete: {} files, {} modules\n",
            summary.files_analyzed, summary.modules
        );
    }

    if args.verbose {
        for line in analysis
            .dependencies
            .errors
            .iter()
            .chain(&analysis.dependencies.warnings)
        {
            eprintln!("  skipped: {}", line);
        }
    }

    Ok(analysis)
}

fn run_analyze(args: AnalyzeArgs) -> Result<(), Box<dyn std::error::Error>> {
    init_logging(args.analysis.verbose);
    configure_threads(&args.analysis);

    let config = load_settings(&args.analysis)?;
    let analysis = analyze(&args.analysis, &config)?;

    // Web mode
    if args.web {
        let server_config = ServerConfig {
            port: args.port,
            open_browser: !args.no_open,
        };

        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(start_server(analysis, server_config))
            .map_err(|e| -> Box<dyn std::error::Error> { e })?;

        return Ok(());
    }

    let output: Box<dyn Write> = match &args.output {
        Some(path) => {
            let file = File::create(path)?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(stdout()),
    };

    let mut writer = output;

    if args.json {
        generate_json_output(&analysis, &mut writer)?;
    } else if args.dot {
        writer.write_all(analysis.graph.to_dot().as_bytes())?;
    } else if args.summary {
        generate_summary(&analysis, &mut writer)?;
    } else {
        generate_report(&analysis, &mut writer)?;
    }
    writer.flush()?;

    if let Some(path) = &args.output {
        eprintln!("Report written to: {}", path.display());
    }

    Ok(())
}

fn run_check(args: CheckArgs) -> Result<i32, Box<dyn std::error::Error>> {
    init_logging(args.analysis.verbose);
    configure_threads(&args.analysis);

    let config = load_settings(&args.analysis)?;
    let analysis = analyze(&args.analysis, &config)?;

    let thresholds = &config.thresholds;
    let min_compliance = args.min_compliance.unwrap_or(thresholds.min_compliance);
    let check = CheckConfig {
        max_cycles: Some(args.max_cycles.unwrap_or(thresholds.max_cycles)),
        max_violations: Some(args.max_violations.unwrap_or(thresholds.max_violations)),
        min_compliance: (min_compliance > 0.0).then_some(min_compliance),
    };

    let mut writer = stdout();
    let code = generate_check_output(&analysis, &check, &mut writer)?;
    writer.flush()?;
    Ok(code)
}
