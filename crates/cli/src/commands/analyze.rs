//! Summary, health and comparison commands

use std::path::PathBuf;

use analyzer_lib::{AnalysisSummary, HealthAnalyzer, HealthReport, ImportReport};
use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;

use super::{load_dataset, Session};
use crate::output::{
    color_percent, color_score, color_status, format_duration, format_percent, print_heading,
    print_info, print_json, print_rows, print_success, OutputFormat,
};

/// Row for host health table
#[derive(Tabled)]
struct HealthRow {
    #[tabled(rename = "Host")]
    hostname: String,
    #[tabled(rename = "Mean")]
    mean: String,
    #[tabled(rename = "Max")]
    max: String,
    #[tabled(rename = "Std")]
    std_dev: String,
    #[tabled(rename = "Score")]
    score: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = ">Warn")]
    warning_time: String,
    #[tabled(rename = "Conversion")]
    conversion: String,
    #[tabled(rename = "Recommendation")]
    recommendation: String,
}

/// Row for comparison table
#[derive(Tabled)]
struct RankingRow {
    #[tabled(rename = "Rank")]
    rank: usize,
    #[tabled(rename = "Host")]
    hostname: String,
    #[tabled(rename = "Mean")]
    mean: String,
    #[tabled(rename = "Max")]
    max: String,
    #[tabled(rename = "Score")]
    score: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Recommendation")]
    recommendation: String,
}

#[derive(Serialize)]
struct AnalyzeOutput<'a> {
    profile: String,
    summary: AnalysisSummary,
    health: &'a HealthReport,
    import: &'a ImportReport,
}

/// Import files and show the dataset summary with per-host health
pub async fn analyze(session: &Session, files: &[PathBuf]) -> Result<()> {
    let loaded = load_dataset(session, files).await?;
    let dataset = &loaded.report.dataset;
    let summary = AnalysisSummary::from_dataset(dataset, &session.thresholds);
    let health = HealthAnalyzer::new(session.thresholds).analyze(dataset);

    match session.format {
        OutputFormat::Json => print_json(&AnalyzeOutput {
            profile: dataset.profile().label().to_string(),
            summary,
            health: &health,
            import: &loaded.report,
        }),
        OutputFormat::Table => {
            print_success(&format!(
                "Imported {} hosts, {} records from {} files",
                summary.total_hosts,
                summary.total_records,
                files.len()
            ));
            for detection in &loaded.detections {
                print_info(&format!(
                    "Detected {} ({}, {} records)",
                    detection.profile, detection.reason, detection.records
                ));
            }

            print_heading("Summary");
            println!("  Interval:      {}", dataset.profile());
            if let (Some(start), Some(end)) = (summary.start, summary.end) {
                println!(
                    "  Time range:    {} to {} ({})",
                    start.format("%Y-%m-%d %H:%M"),
                    end.format("%Y-%m-%d %H:%M"),
                    format_duration(summary.duration_secs)
                );
            }
            println!(
                "  Overall mean:  {}",
                color_percent(summary.overall_mean_percent, &session.thresholds)
            );
            println!(
                "  Overall peak:  {}",
                color_percent(summary.overall_max_percent, &session.thresholds)
            );
            println!(
                "  Hosts:         {} critical, {} warning, {} healthy",
                summary.critical_hosts, summary.warning_hosts, summary.healthy_hosts
            );

            print_heading("Host health");
            print_health_rows(&health, &loaded.report, session);
            Ok(())
        }
    }
}

/// Health scores per host, worst first
pub async fn health(session: &Session, files: &[PathBuf]) -> Result<()> {
    let loaded = load_dataset(session, files).await?;
    let health = HealthAnalyzer::new(session.thresholds).analyze(&loaded.report.dataset);

    match session.format {
        OutputFormat::Json => print_json(&health),
        OutputFormat::Table => {
            print_health_rows(&health, &loaded.report, session);
            println!(
                "\nThresholds: warning {}, critical {}",
                format_percent(health.thresholds.warning),
                format_percent(health.thresholds.critical)
            );
            if !health.consolidation_candidates.is_empty() {
                print_info(&format!(
                    "Consolidation candidates: {}",
                    health.consolidation_candidates.join(", ")
                ));
            }
            Ok(())
        }
    }
}

/// Rank hosts best first
pub async fn compare(session: &Session, files: &[PathBuf]) -> Result<()> {
    let loaded = load_dataset(session, files).await?;
    let rankings = HealthAnalyzer::new(session.thresholds).compare(&loaded.report.dataset);

    match session.format {
        OutputFormat::Json => print_json(&rankings),
        OutputFormat::Table => {
            let rows: Vec<RankingRow> = rankings
                .iter()
                .map(|r| RankingRow {
                    rank: r.rank,
                    hostname: r.hostname.clone(),
                    mean: color_percent(r.stats.mean, &session.thresholds),
                    max: format_percent(r.stats.max),
                    score: color_score(r.score),
                    status: color_status(r.status),
                    recommendation: r.recommendation.clone(),
                })
                .collect();
            print_rows(rows);
            Ok(())
        }
    }
}

fn print_health_rows(health: &HealthReport, import: &ImportReport, session: &Session) {
    let rows: Vec<HealthRow> = health
        .hosts
        .iter()
        .map(|h| HealthRow {
            hostname: h.hostname.clone(),
            mean: color_percent(h.stats.mean, &session.thresholds),
            max: format_percent(h.stats.max),
            std_dev: format!("{:.2}", h.stats.std_dev),
            score: color_score(h.score),
            status: color_status(h.status),
            warning_time: format!("{:.0}%", h.warning_time_percent),
            conversion: import
                .dataset
                .host(&h.hostname)
                .map(|s| s.conversion_method.to_string())
                .unwrap_or_default(),
            recommendation: h.recommendation.clone(),
        })
        .collect();
    print_rows(rows);
}
