//! Rendering of scan outcomes for the terminal, CI logs, and JSON consumers.

use anyhow::Result;
use colored::Colorize;
use kansa_core::{ChangeType, MergedFinding, ScanOutcome, Severity};

#[derive(Copy, Clone, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Console,
    Json,
    Markdown,
}

pub fn render(outcome: &ScanOutcome, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Console => print_console(outcome),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&to_json(outcome))?),
        OutputFormat::Markdown => print!("{}", to_markdown(outcome)),
    }
    Ok(())
}

fn print_console(outcome: &ScanOutcome) {
    println!("\n{}", "=".repeat(60).bright_cyan());
    println!("🔍 Scan completed in {:.1}s", outcome.duration.as_secs_f64());
    println!("{}", "=".repeat(60).bright_cyan());

    if outcome.findings.is_empty() {
        println!("✅ No findings");
    } else {
        println!(
            "⚠️  {} finding(s) after merging {} raw reports ({:.0}% reduction)",
            outcome.findings.len(),
            outcome.dedup_stats.original_count,
            outcome.dedup_stats.reduction_percentage()
        );
        for severity in Severity::all() {
            let count = outcome
                .findings
                .iter()
                .filter(|f| f.severity == severity)
                .count();
            if count > 0 {
                println!("   {} {}: {}", severity.emoji(), severity, count);
            }
        }
        for finding in &outcome.findings {
            print_finding(finding);
        }
    }

    if !outcome.drift.is_empty() {
        println!("\n📐 Baseline drift:");
        for record in &outcome.drift {
            let verb = match record.change_type {
                ChangeType::Added => "added",
                ChangeType::Removed => "removed",
                ChangeType::Modified => "modified",
            };
            println!("   - {} ({verb})", record.entity_identity);
        }
    }

    for failure in &outcome.failed_targets {
        println!(
            "{} target {} skipped: {}",
            "⚠️ ".yellow(),
            failure.reference,
            failure.reason
        );
    }
    for failure in &outcome.normalization_failures {
        println!(
            "{} {} output for {} dropped: {}",
            "⚠️ ".yellow(),
            failure.engine,
            failure.target,
            failure.reason
        );
    }
    if !outcome.degraded_engines.is_empty() {
        println!(
            "🔌 Degraded engines: {}",
            outcome
                .degraded_engines
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    if outcome.deadline_expired {
        println!("{}", "⏱️  Scan deadline expired before all engines finished".yellow());
    }

    println!();
    if outcome.gate.passed {
        println!("{}", "✅ GATE PASSED".green().bold());
    } else {
        println!(
            "{} {} blocking finding(s)",
            "❌ GATE FAILED:".red().bold(),
            outcome.gate.blocking_findings
        );
    }
}

fn print_finding(finding: &MergedFinding) {
    println!(
        "\n{} [{}] {} on {}:{}",
        finding.severity.emoji(),
        finding.severity.to_string().color(finding.severity.color()),
        finding.category,
        finding.entity_type,
        finding.entity_name
    );
    println!("   Target: {}", finding.target);
    println!("   Engines: {}", finding.source_engines.join(", "));
    println!("   Description: {}", finding.description);
    if let Some(remediation) = &finding.remediation {
        println!("   Remediation: {remediation}");
    }
}

fn to_markdown(outcome: &ScanOutcome) -> String {
    let mut out = String::new();
    out.push_str("# Scan Report\n\n");
    out.push_str(&format!(
        "Generated: {}\n\n",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    ));

    out.push_str("## Summary\n\n");
    out.push_str(&format!(
        "- Gate: {}\n",
        if outcome.gate.passed {
            "✅ PASSED"
        } else {
            "❌ FAILED"
        }
    ));
    out.push_str(&format!("- Findings: {}\n", outcome.gate.total_findings));
    out.push_str(&format!("- Blocking: {}\n", outcome.gate.blocking_findings));
    out.push_str(&format!(
        "- Merged {} raw reports into {}\n",
        outcome.dedup_stats.original_count, outcome.dedup_stats.merged_count
    ));
    if !outcome.degraded_engines.is_empty() {
        out.push_str(&format!(
            "- Degraded engines: {}\n",
            outcome
                .degraded_engines
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }
    out.push('\n');

    if !outcome.findings.is_empty() {
        out.push_str("## Findings\n\n");
        for finding in &outcome.findings {
            out.push_str(&format!(
                "### {} {} `{}:{}`\n\n",
                finding.severity.emoji(),
                finding.category,
                finding.entity_type,
                finding.entity_name
            ));
            out.push_str(&format!("- **Severity**: {}\n", finding.severity));
            out.push_str(&format!("- **Target**: `{}`\n", finding.target));
            out.push_str(&format!(
                "- **Engines**: {}\n",
                finding.source_engines.join(", ")
            ));
            out.push_str(&format!("- **Description**: {}\n", finding.description));
            if let Some(remediation) = &finding.remediation {
                out.push_str(&format!("- **Remediation**: {remediation}\n"));
            }
            out.push('\n');
        }
    }

    if !outcome.drift.is_empty() {
        out.push_str("## Baseline Drift\n\n");
        for record in &outcome.drift {
            out.push_str(&format!(
                "- `{}`: {:?}\n",
                record.entity_identity, record.change_type
            ));
        }
        out.push('\n');
    }

    out
}

fn to_json(outcome: &ScanOutcome) -> serde_json::Value {
    serde_json::json!({
        "gate": outcome.gate,
        "findings": outcome.findings,
        "drift": outcome.drift,
        "degraded_engines": outcome.degraded_engines,
        "failed_targets": outcome
            .failed_targets
            .iter()
            .map(|f| serde_json::json!({"reference": f.reference, "reason": f.reason}))
            .collect::<Vec<_>>(),
        "normalization_failures": outcome
            .normalization_failures
            .iter()
            .map(|f| serde_json::json!({
                "engine": f.engine,
                "target": f.target,
                "reason": f.reason,
            }))
            .collect::<Vec<_>>(),
        "dedup": {
            "original_count": outcome.dedup_stats.original_count,
            "merged_count": outcome.dedup_stats.merged_count,
            "collapsed_count": outcome.dedup_stats.collapsed_count,
        },
        "deadline_expired": outcome.deadline_expired,
        "duration_ms": outcome.duration.as_millis() as u64,
    })
}
