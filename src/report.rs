//! Report generation for dependency analysis
//!
//! A terse terminal summary and a full Markdown report, both rendered from
//! a [`SystemAnalysis`].

use std::io::{self, Write};

use crate::analyzer::SystemAnalysis;
use crate::architecture::{ArchitectureReport, ViolationSeverity};
use crate::cycles::{CycleAnalysis, CycleSeverity};
use crate::metrics::ModuleMetrics;
use crate::recommendations::RecommendationPriority;

/// Rows shown in the per-module table of the full report
const MODULE_TABLE_LIMIT: usize = 20;

/// Violations listed in the summary before truncating
const SUMMARY_VIOLATION_LIMIT: usize = 5;

fn cycle_icon(severity: CycleSeverity) -> &'static str {
    match severity {
        CycleSeverity::Critical => "🔴",
        CycleSeverity::High => "🟠",
        CycleSeverity::Medium => "🟡",
        CycleSeverity::Low => "⚪",
    }
}

fn priority_icon(priority: RecommendationPriority) -> &'static str {
    match priority {
        RecommendationPriority::Critical => "🔴",
        RecommendationPriority::High => "🟠",
        RecommendationPriority::Medium => "🟡",
        RecommendationPriority::Low => "⚪",
    }
}

/// Generate a summary report to the given writer
pub fn generate_summary<W: Write>(analysis: &SystemAnalysis, writer: &mut W) -> io::Result<()> {
    let deps = &analysis.dependencies;
    let system = &analysis.metrics.system;

    writeln!(writer, "Python Dependency Analysis")?;
    writeln!(writer, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
    writeln!(writer)?;
    writeln!(
        writer,
        "Files: {} | Modules: {} | Dependencies: {} | Cycles: {}",
        deps.summary.files_analyzed,
        deps.summary.modules,
        deps.summary.edges,
        deps.summary.cycles
    )?;
    writeln!(
        writer,
        "Instability: {:.2} avg | Modularity: {:.2} | Complexity: {:.2} | Max depth: {}",
        system.average_instability,
        system.modularity_index,
        system.system_complexity,
        system.max_dependency_depth
    )?;

    if let Some(report) = &analysis.architecture {
        writeln!(
            writer,
            "Architecture: {:.0}% compliant | {} violation(s) across {} edge(s){}",
            report.compliance * 100.0,
            report.violations.len(),
            report.edges_checked,
            if report.auto_detected {
                " (layers auto-detected)"
            } else {
                ""
            }
        )?;
    }

    if analysis.cycles.has_cycles() {
        writeln!(writer)?;
        writeln!(writer, "Circular Dependencies:")?;
        for cycle in &analysis.cycles.cycles {
            writeln!(
                writer,
                "  {} [{}] {}",
                cycle_icon(cycle.severity),
                cycle.severity,
                cycle.modules.join(" → ")
            )?;
        }
    }

    if let Some(report) = &analysis.architecture
        && !report.violations.is_empty()
    {
        writeln!(writer)?;
        writeln!(writer, "Layer Violations:")?;
        for violation in report.violations.iter().take(SUMMARY_VIOLATION_LIMIT) {
            writeln!(
                writer,
                "  {} → {} ({})",
                violation.from_module, violation.to_module, violation.rule
            )?;
        }
        if report.violations.len() > SUMMARY_VIOLATION_LIMIT {
            writeln!(
                writer,
                "  ... and {} more",
                report.violations.len() - SUMMARY_VIOLATION_LIMIT
            )?;
        }
    }

    if !analysis.recommendations.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "Recommendations:")?;
        for rec in &analysis.recommendations {
            writeln!(
                writer,
                "  {} {} ({})",
                priority_icon(rec.priority),
                rec.title,
                rec.kind
            )?;
        }
    }

    if !deps.warnings.is_empty() || !deps.errors.is_empty() {
        writeln!(writer)?;
        writeln!(
            writer,
            "⚠️ {} file(s) could not be analyzed (run with --verbose for details)",
            deps.warnings.len() + deps.errors.len()
        )?;
    }

    Ok(())
}

/// Generate a full Markdown report
pub fn generate_report<W: Write>(analysis: &SystemAnalysis, writer: &mut W) -> io::Result<()> {
    writeln!(writer, "# Python Dependency Analysis Report\n")?;

    write_executive_summary(analysis, writer)?;
    write_cycle_section(&analysis.cycles, writer)?;
    write_module_section(&analysis.metrics.modules, writer)?;
    write_priority_section(analysis, writer)?;

    if let Some(report) = &analysis.architecture {
        write_architecture_section(report, writer)?;
    }

    write_recommendations_section(analysis, writer)?;
    write_diagnostics_section(analysis, writer)?;

    writeln!(
        writer,
        "---\n\n_Generated by pycoupling {} at {}_",
        analysis.dependencies.version, analysis.dependencies.generated_at
    )?;

    Ok(())
}

fn write_executive_summary<W: Write>(analysis: &SystemAnalysis, writer: &mut W) -> io::Result<()> {
    let summary = &analysis.dependencies.summary;
    let system = &analysis.metrics.system;

    writeln!(writer, "## Executive Summary\n")?;
    writeln!(writer, "| Metric | Value |")?;
    writeln!(writer, "|--------|-------|")?;
    writeln!(writer, "| Files Analyzed | {} |", summary.files_analyzed)?;
    writeln!(writer, "| Modules | {} |", summary.modules)?;
    writeln!(writer, "| Packages | {} |", system.package_count)?;
    writeln!(writer, "| Dependencies | {} |", summary.edges)?;
    writeln!(writer, "| Dependency Ratio | {:.2} |", system.dependency_ratio)?;
    writeln!(
        writer,
        "| Avg Fan-in / Fan-out | {:.2} / {:.2} |",
        system.average_fan_in, system.average_fan_out
    )?;
    writeln!(writer, "| Avg Instability | {:.2} |", system.average_instability)?;
    writeln!(writer, "| Avg Abstractness | {:.2} |", system.average_abstractness)?;
    writeln!(
        writer,
        "| Main Sequence Deviation | {:.2} |",
        system.main_sequence_deviation
    )?;
    writeln!(writer, "| Modularity Index | {:.2} |", system.modularity_index)?;
    writeln!(writer, "| System Complexity | {:.2} |", system.system_complexity)?;
    writeln!(writer, "| Max Dependency Depth | {} |", system.max_dependency_depth)?;
    writeln!(writer, "| Modules in Cycles | {} |", system.cyclic_dependencies)?;
    if let Some(report) = &analysis.architecture {
        writeln!(
            writer,
            "| Architecture Compliance | {:.1}% |",
            report.compliance * 100.0
        )?;
    }
    writeln!(writer)?;

    let cycles = &analysis.cycles;
    let violations = analysis
        .architecture
        .as_ref()
        .map_or(0, |r| r.error_count);

    if cycles.severity.critical > 0 || cycles.severity.high > 0 || violations > 0 {
        writeln!(writer, "**⚠️ Action Required**\n")?;
        if cycles.severity.critical > 0 {
            writeln!(writer, "- 🔴 **{} Critical** cycles", cycles.severity.critical)?;
        }
        if cycles.severity.high > 0 {
            writeln!(writer, "- 🟠 **{} High** severity cycles", cycles.severity.high)?;
        }
        if violations > 0 {
            writeln!(writer, "- 🟠 **{}** layer rule violations", violations)?;
        }
        writeln!(writer)?;
    } else if cycles.has_cycles() {
        writeln!(
            writer,
            "**ℹ️ Review Suggested**: {} small cycle(s) to consider.\n",
            cycles.total_cycles
        )?;
    } else {
        writeln!(
            writer,
            "**✅ Good Health**: No cycles or layer violations detected.\n"
        )?;
    }

    Ok(())
}

fn write_cycle_section<W: Write>(cycles: &CycleAnalysis, writer: &mut W) -> io::Result<()> {
    writeln!(writer, "## Circular Dependencies\n")?;

    if !cycles.has_cycles() {
        writeln!(writer, "No circular dependencies detected.\n")?;
        return Ok(());
    }

    writeln!(
        writer,
        "{} cycle(s) involving {} module(s): {} critical, {} high, {} medium, {} low.\n",
        cycles.total_cycles,
        cycles.modules_in_cycles,
        cycles.severity.critical,
        cycles.severity.high,
        cycles.severity.medium,
        cycles.severity.low
    )?;

    for (i, cycle) in cycles.cycles.iter().enumerate() {
        writeln!(
            writer,
            "{}. {} **{}** ({} modules): `{}`",
            i + 1,
            cycle_icon(cycle.severity),
            cycle.severity,
            cycle.size,
            cycle.modules.join(" → ")
        )?;
    }
    writeln!(writer)?;

    if !cycles.core_infrastructure.is_empty() {
        writeln!(
            writer,
            "**Core infrastructure** (in several cycles): {}\n",
            cycles
                .core_infrastructure
                .iter()
                .map(|m| format!("`{}`", m))
                .collect::<Vec<_>>()
                .join(", ")
        )?;
    }

    writeln!(writer, "### How to break them\n")?;
    for suggestion in &cycles.suggestions {
        writeln!(writer, "- {}", suggestion)?;
    }
    writeln!(writer)?;

    Ok(())
}

fn write_module_section<W: Write>(modules: &[ModuleMetrics], writer: &mut W) -> io::Result<()> {
    if modules.is_empty() {
        return Ok(());
    }

    writeln!(writer, "## Modules\n")?;

    let mut ranked: Vec<&ModuleMetrics> = modules.iter().collect();
    ranked.sort_by(|a, b| {
        (b.fan_in + b.fan_out)
            .cmp(&(a.fan_in + a.fan_out))
            .then_with(|| a.name.cmp(&b.name))
    });

    writeln!(
        writer,
        "| Module | Fan-in | Fan-out | Instability | Abstractness | Distance | In Cycle |"
    )?;
    writeln!(
        writer,
        "|--------|--------|---------|-------------|--------------|----------|----------|"
    )?;
    for module in ranked.iter().take(MODULE_TABLE_LIMIT) {
        writeln!(
            writer,
            "| `{}` | {} | {} | {:.2} | {:.2} | {:.2} | {} |",
            module.name,
            module.fan_in,
            module.fan_out,
            module.instability,
            module.abstractness,
            module.distance,
            if module.in_cycle { "yes" } else { "" }
        )?;
    }
    if ranked.len() > MODULE_TABLE_LIMIT {
        writeln!(
            writer,
            "\n_{} more module(s) not shown._",
            ranked.len() - MODULE_TABLE_LIMIT
        )?;
    }
    writeln!(writer)?;

    Ok(())
}

fn write_priority_section<W: Write>(analysis: &SystemAnalysis, writer: &mut W) -> io::Result<()> {
    let priority = &analysis.metrics.system.refactoring_priority;
    if priority.is_empty() {
        return Ok(());
    }

    writeln!(writer, "## 🔧 Refactoring Priorities\n")?;
    for (i, candidate) in priority.iter().enumerate() {
        writeln!(
            writer,
            "{}. `{}` (score {:.1})",
            i + 1,
            candidate.module,
            candidate.score
        )?;
    }
    writeln!(writer)?;

    Ok(())
}

fn write_architecture_section<W: Write>(
    report: &ArchitectureReport,
    writer: &mut W,
) -> io::Result<()> {
    writeln!(writer, "## Architecture\n")?;

    if report.auto_detected {
        writeln!(
            writer,
            "_Layers were inferred from package names. Declare them in `.pycoupling.toml` to make the rules explicit._\n"
        )?;
    }

    writeln!(
        writer,
        "Compliance: **{:.1}%** ({} violation(s) in {} edge(s), {} layer(s))\n",
        report.compliance * 100.0,
        report.violations.len(),
        report.edges_checked,
        report.layers_analyzed
    )?;

    writeln!(writer, "### Layer Cohesion\n")?;
    writeln!(writer, "| Layer | Cohesion | Outgoing |")?;
    writeln!(writer, "|-------|----------|----------|")?;
    for (layer, cohesion) in &report.layer_cohesion {
        let outgoing: usize = report
            .layer_coupling
            .get(layer)
            .map(|targets| targets.values().sum())
            .unwrap_or(0);
        let marker = if report.problematic_layers.contains(layer) {
            " ⚠️"
        } else {
            ""
        };
        writeln!(
            writer,
            "| {} | {:.2}{} | {} |",
            layer, cohesion, marker, outgoing
        )?;
    }
    writeln!(writer)?;

    if report.violations.is_empty() {
        return Ok(());
    }

    writeln!(writer, "### Violations\n")?;
    for violation in &report.violations {
        let icon = match violation.severity {
            ViolationSeverity::Error => "🔴",
            ViolationSeverity::Warning => "🟡",
        };
        writeln!(
            writer,
            "- {} `{}` → `{}` ({} → {}, rule `{}`)",
            icon,
            violation.from_module,
            violation.to_module,
            violation.from_layer,
            violation.to_layer,
            violation.rule
        )?;
        writeln!(writer, "  - {}", violation.suggestion)?;
    }
    writeln!(writer)?;

    Ok(())
}

fn write_recommendations_section<W: Write>(
    analysis: &SystemAnalysis,
    writer: &mut W,
) -> io::Result<()> {
    if analysis.recommendations.is_empty() {
        return Ok(());
    }

    writeln!(writer, "## Recommendations\n")?;
    for rec in &analysis.recommendations {
        writeln!(
            writer,
            "### {} {} ({}, {})\n",
            priority_icon(rec.priority),
            rec.title,
            rec.kind,
            rec.priority
        )?;
        writeln!(writer, "{}\n", rec.description)?;
        writeln!(writer, "**Estimated effort:** {}\n", rec.effort)?;
        if !rec.modules.is_empty() {
            for module in &rec.modules {
                writeln!(writer, "- `{}`", module)?;
            }
            writeln!(writer)?;
        }
        if !rec.benefits.is_empty() {
            writeln!(writer, "**Benefits:**\n")?;
            for benefit in &rec.benefits {
                writeln!(writer, "- {}", benefit)?;
            }
            writeln!(writer)?;
        }
        if !rec.steps.is_empty() {
            writeln!(writer, "**Steps:**\n")?;
            for (i, step) in rec.steps.iter().enumerate() {
                writeln!(writer, "{}. {}", i + 1, step)?;
            }
            writeln!(writer)?;
        }
    }

    Ok(())
}

fn write_diagnostics_section<W: Write>(
    analysis: &SystemAnalysis,
    writer: &mut W,
) -> io::Result<()> {
    let deps = &analysis.dependencies;
    if deps.warnings.is_empty() && deps.errors.is_empty() {
        return Ok(());
    }

    writeln!(writer, "## Skipped Files\n")?;
    for line in deps.errors.iter().chain(&deps.warnings) {
        writeln!(writer, "- {}", line)?;
    }
    writeln!(writer)?;

    Ok(())
}
