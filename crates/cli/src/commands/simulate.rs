//! Host removal simulation command

use std::path::PathBuf;

use analyzer_lib::{RemovalImpactSimulator, RemovalPlan};
use anyhow::{Context, Result};
use tabled::Tabled;

use super::{load_dataset, Session};
use crate::output::{
    color_percent, color_risk, format_delta, format_percent, print_heading, print_json,
    print_rows, print_warning, OutputFormat,
};

#[derive(Tabled)]
struct RemovedRow {
    #[tabled(rename = "Removed host")]
    hostname: String,
    #[tabled(rename = "Mean")]
    mean: String,
    #[tabled(rename = "Workload share")]
    share: String,
}

#[derive(Tabled)]
struct ImpactRow {
    #[tabled(rename = "Host")]
    hostname: String,
    #[tabled(rename = "Before")]
    before: String,
    #[tabled(rename = "After")]
    after: String,
    #[tabled(rename = "Change")]
    change: String,
    #[tabled(rename = "Peak after")]
    peak_after: String,
}

/// Simulate removing `remove` hosts from the imported dataset
pub async fn simulate(session: &Session, files: &[PathBuf], remove: Vec<String>) -> Result<()> {
    let loaded = load_dataset(session, files).await?;
    let dataset = &loaded.report.dataset;

    let plan = RemovalPlan::new(remove.iter().map(|h| h.trim()).filter(|h| !h.is_empty()));
    let simulator = RemovalImpactSimulator::new(session.normalizer(), session.thresholds)
        .with_policy(session.config.risk.clone());
    let result = simulator
        .simulate(dataset, &plan)
        .with_context(|| format!("Available hosts: {}", dataset.hostnames().join(", ")))?;
    session.logger.log_removal_simulated(&result);

    match session.format {
        OutputFormat::Json => print_json(&result),
        OutputFormat::Table => {
            print_heading("Removal impact");
            println!("  Risk:                     {}", color_risk(result.risk));
            println!(
                "  Workload redistributed:   {}",
                format_percent(result.workload_percentage)
            );
            println!(
                "  Infrastructure reduction: {} ({} of {} hosts)",
                format_percent(result.infrastructure_reduction_percent),
                result.removed_hosts.len(),
                dataset.host_count()
            );
            println!(
                "  Mean CPU Ready:           {} -> {} ({})",
                color_percent(result.original_mean_percent, &session.thresholds),
                color_percent(result.projected_mean_percent, &session.thresholds),
                format_delta(result.avg_increase)
            );
            for reason in &result.risk_reasons {
                print_warning(reason);
            }

            println!();
            print_rows(
                result
                    .removed_hosts
                    .iter()
                    .map(|h| RemovedRow {
                        hostname: h.hostname.clone(),
                        mean: format_percent(h.mean_percent),
                        share: format_percent(h.workload_percentage),
                    })
                    .collect(),
            );

            println!();
            print_rows(
                result
                    .surviving_hosts
                    .iter()
                    .map(|h| ImpactRow {
                        hostname: h.hostname.clone(),
                        before: color_percent(h.before.mean, &session.thresholds),
                        after: color_percent(h.after.mean, &session.thresholds),
                        change: format_delta(h.increase),
                        peak_after: format_percent(h.after.max),
                    })
                    .collect(),
            );
            Ok(())
        }
    }
}
