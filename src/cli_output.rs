//! CLI output functions for job-focused commands
//!
//! - Check: CI/CD quality gate with exit codes
//! - JSON: Machine-readable output for automation

use std::io::{self, Write};

use serde::Serialize;

use crate::analyzer::SystemAnalysis;

// ============================================================================
// Check/Gate: CI/CD Quality Gate
// ============================================================================

/// Quality check configuration
#[derive(Debug, Clone)]
pub struct CheckConfig {
    /// Maximum allowed circular dependencies
    pub max_cycles: Option<usize>,
    /// Maximum allowed layer violations
    pub max_violations: Option<usize>,
    /// Minimum architecture compliance (0.0 - 1.0)
    pub min_compliance: Option<f64>,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            max_cycles: Some(0),
            max_violations: Some(0),
            min_compliance: None,
        }
    }
}

/// Check result with details
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub passed: bool,
    pub cycle_count: usize,
    pub violation_count: usize,
    /// `None` when no architecture was declared or detected
    pub compliance: Option<f64>,
    pub failures: Vec<String>,
}

/// Run quality check and return result
pub fn run_check(analysis: &SystemAnalysis, config: &CheckConfig) -> CheckResult {
    let cycle_count = analysis.cycles.total_cycles;
    let violation_count = analysis
        .architecture
        .as_ref()
        .map_or(0, |r| r.violations.len());
    let compliance = analysis.architecture.as_ref().map(|r| r.compliance);

    let mut failures: Vec<String> = Vec::new();

    if let Some(max) = config.max_cycles
        && cycle_count > max
    {
        failures.push(format!("{} circular dependencies (max: {})", cycle_count, max));
    }

    if let Some(max) = config.max_violations
        && violation_count > max
    {
        failures.push(format!("{} layer violations (max: {})", violation_count, max));
    }

    // Without layers there is nothing to be compliant with
    if let Some(min) = config.min_compliance
        && let Some(actual) = compliance
        && actual < min
    {
        failures.push(format!(
            "Architecture compliance {:.1}% is below minimum {:.1}%",
            actual * 100.0,
            min * 100.0
        ));
    }

    CheckResult {
        passed: failures.is_empty(),
        cycle_count,
        violation_count,
        compliance,
        failures,
    }
}

/// Generate check output and return exit code (0 = pass, 1 = fail)
pub fn generate_check_output<W: Write>(
    analysis: &SystemAnalysis,
    config: &CheckConfig,
    writer: &mut W,
) -> io::Result<i32> {
    let result = run_check(analysis, config);

    writeln!(writer, "Coupling Quality Gate")?;
    writeln!(
        writer,
        "═══════════════════════════════════════════════════════════"
    )?;

    let status = if result.passed {
        "✅ PASSED"
    } else {
        "❌ FAILED"
    };
    match result.compliance {
        Some(compliance) => writeln!(writer, "Compliance: {:.0}%  {}", compliance * 100.0, status)?,
        None => writeln!(writer, "Compliance: n/a (no layers)  {}", status)?,
    }

    writeln!(writer)?;
    writeln!(writer, "Metrics:")?;
    writeln!(writer, "  Modules: {}", analysis.metrics.system.total_modules)?;
    writeln!(writer, "  Circular dependencies: {}", result.cycle_count)?;
    writeln!(writer, "  Layer violations: {}", result.violation_count)?;

    if !result.passed {
        writeln!(writer)?;
        writeln!(writer, "Blocking Issues:")?;
        for failure in &result.failures {
            writeln!(writer, "  - {}", failure)?;
        }
    }

    Ok(if result.passed { 0 } else { 1 })
}

// ============================================================================
// JSON Output
// ============================================================================

/// Generate complete JSON output
pub fn generate_json_output<W: Write>(analysis: &SystemAnalysis, writer: &mut W) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *writer, analysis)?;
    writeln!(writer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{Cancellation, DependencyRequest, analyze_system};
    use crate::recommendations::RecommendationThresholds;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn analyze(dir: &TempDir) -> SystemAnalysis {
        analyze_system(
            &DependencyRequest::new(vec![dir.path().to_path_buf()]),
            &RecommendationThresholds::default(),
            &Cancellation::new(),
        )
        .unwrap()
    }

    fn cyclic_project() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "pkg/a.py", "import pkg.b\n");
        write(dir.path(), "pkg/b.py", "import pkg.a\n");
        dir
    }

    #[test]
    fn test_check_passes_on_clean_project() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "pkg/a.py", "import pkg.b\n");
        write(dir.path(), "pkg/b.py", "");

        let analysis = analyze(&dir);
        let result = run_check(&analysis, &CheckConfig::default());
        assert!(result.passed);
        assert_eq!(result.cycle_count, 0);
        assert!(result.compliance.is_none());
    }

    #[test]
    fn test_check_fails_on_cycle() {
        let dir = cyclic_project();
        let analysis = analyze(&dir);

        let result = run_check(&analysis, &CheckConfig::default());
        assert!(!result.passed);
        assert_eq!(result.cycle_count, 1);
        assert_eq!(result.failures, vec!["1 circular dependencies (max: 0)"]);

        let lenient = CheckConfig {
            max_cycles: Some(1),
            ..CheckConfig::default()
        };
        assert!(run_check(&analysis, &lenient).passed);
    }

    #[test]
    fn test_check_compliance() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "app/models/user.py", "import app.api.users\n");
        write(dir.path(), "app/api/users.py", "");
        let analysis = analyze(&dir);

        let config = CheckConfig {
            max_cycles: None,
            max_violations: None,
            min_compliance: Some(0.9),
        };
        let result = run_check(&analysis, &config);
        assert_eq!(result.violation_count, 1);
        assert_eq!(result.compliance, Some(0.0));
        assert!(!result.passed);
        assert!(result.failures[0].contains("below minimum 90.0%"));
    }

    #[test]
    fn test_check_output_exit_code() {
        let dir = cyclic_project();
        let analysis = analyze(&dir);

        let mut out = Vec::new();
        let code = generate_check_output(&analysis, &CheckConfig::default(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(code, 1);
        assert!(text.contains("❌ FAILED"));
        assert!(text.contains("Blocking Issues:"));
    }

    #[test]
    fn test_json_output() {
        let dir = cyclic_project();
        let analysis = analyze(&dir);

        let mut out = Vec::new();
        generate_json_output(&analysis, &mut out).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(json["dependencies"]["summary"]["cycles"], 1);
        assert_eq!(json["cycles"]["total_cycles"], 1);
        assert!(json["metrics"]["modules"].is_array());
        assert!(json.get("graph").is_none());
    }
}
