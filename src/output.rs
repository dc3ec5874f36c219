//! CLI output formatting for all pipeline stages.
//!
//! Each stage has a `format_*` function returning lines (pure, testable)
//! and a `print_*` wrapper that writes them to stdout. Build scripts end
//! with a human-readable summary whose counts mirror the process exit
//! code: any unrecovered failure in the summary means a non-zero exit, so
//! CI can trust either signal.

use crate::deploy::DeployReport;
use crate::notify::NotifyOutcome;

/// Summary of a store check.
pub fn format_check_output(
    categories: usize,
    glossary: usize,
    comparisons: usize,
    warnings: &[String],
) -> Vec<String> {
    let mut lines = vec![
        format!("Categories: {categories}"),
        format!("Glossary terms: {glossary}"),
        format!("Comparisons: {comparisons}"),
    ];
    if warnings.is_empty() {
        lines.push("No content-quality warnings".to_string());
    } else {
        lines.push(format!("Content-quality warnings: {}", warnings.len()));
        for warning in warnings {
            lines.push(format!("    {warning}"));
        }
    }
    lines
}

/// Summary of a build run.
pub fn format_build_output(
    glossary_pages: usize,
    comparison_pages: usize,
    sitemap_files: &[String],
    output_dir: &str,
) -> Vec<String> {
    let mut lines = vec![
        format!("Glossary pages: {glossary_pages}"),
        format!("Comparison pages: {comparison_pages}"),
        format!("Sitemap files: {}", sitemap_files.len()),
    ];
    for file in sitemap_files {
        lines.push(format!("    {file}"));
    }
    lines.push(format!(
        "Generated {} pages into {output_dir}",
        glossary_pages + comparison_pages
    ));
    lines
}

/// Summary of a deploy run.
pub fn format_deploy_summary(report: &DeployReport) -> Vec<String> {
    let mut lines = Vec::new();
    if report.dry_run {
        lines.push("Dry run - no files were uploaded".to_string());
    }
    lines.push(format!(
        "Uploaded: {}, skipped (unchanged): {}, deleted (orphan): {}, failed: {}",
        report.uploaded,
        report.skipped,
        report.deleted,
        report.failures.len()
    ));
    for (key, message) in &report.failures {
        lines.push(format!("    failed {key}: {message}"));
    }
    lines
}

/// Summary of a notifier run.
pub fn format_notify_outcome(outcome: &NotifyOutcome) -> Vec<String> {
    match outcome {
        NotifyOutcome::Submitted { notified, total } => vec![format!(
            "Notified {notified} of {total} sitemap URLs"
        )],
        NotifyOutcome::Skipped(reason) => vec![format!("Skipped: {reason}")],
    }
}

pub fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::SkipReason;

    #[test]
    fn check_output_lists_warnings() {
        let warnings = vec!["glossary/x: thin content: 120 words (minimum 300)".to_string()];
        let lines = format_check_output(3, 10, 2, &warnings);
        assert_eq!(lines[0], "Categories: 3");
        assert!(lines.iter().any(|l| l.contains("warnings: 1")));
        assert!(lines.iter().any(|l| l.contains("thin content")));
    }

    #[test]
    fn check_output_clean() {
        let lines = format_check_output(3, 10, 2, &[]);
        assert!(lines.iter().any(|l| l == "No content-quality warnings"));
    }

    #[test]
    fn build_output_totals_pages() {
        let files = vec!["sitemap.xml".to_string(), "sitemap-pseo-1.xml".to_string()];
        let lines = format_build_output(40, 12, &files, "dist");
        assert!(lines.iter().any(|l| l == "Generated 52 pages into dist"));
        assert!(lines.iter().any(|l| l.contains("sitemap-pseo-1.xml")));
    }

    #[test]
    fn deploy_summary_reports_counts_and_failures() {
        let report = DeployReport {
            uploaded: 5,
            skipped: 90,
            deleted: 2,
            failures: vec![("glossary/x/index.html".to_string(), "HTTP 503".to_string())],
            dry_run: false,
        };
        let lines = format_deploy_summary(&report);
        assert!(lines[0].contains("Uploaded: 5"));
        assert!(lines[0].contains("failed: 1"));
        assert!(lines.iter().any(|l| l.contains("HTTP 503")));
    }

    #[test]
    fn notify_outcome_lines() {
        let lines = format_notify_outcome(&NotifyOutcome::Skipped(SkipReason::RateLimit));
        assert_eq!(lines, vec!["Skipped: rate_limit"]);
        let lines = format_notify_outcome(&NotifyOutcome::Submitted {
            notified: 3,
            total: 100,
        });
        assert_eq!(lines, vec!["Notified 3 of 100 sitemap URLs"]);
    }
}
