//! Trend analysis and daily heat map commands

use std::path::PathBuf;

use analyzer_lib::{daily_profile, TrendAnalyzer};
use anyhow::{bail, Context, Result};
use tabled::Tabled;

use super::{load_dataset, Session};
use crate::output::{
    color_direction, color_percent, format_percent, print_heading, print_json, print_rows,
    OutputFormat,
};

#[derive(Tabled)]
struct TrendRow {
    #[tabled(rename = "Host")]
    hostname: String,
    #[tabled(rename = "Slope (%/h)")]
    slope: String,
    #[tabled(rename = "Trend")]
    direction: String,
    #[tabled(rename = "Latest MA")]
    latest_averages: String,
    #[tabled(rename = "Top peaks")]
    peaks: String,
}

#[derive(Tabled)]
struct HourlyRow {
    #[tabled(rename = "Host")]
    hostname: String,
    #[tabled(rename = "Hour")]
    hour: String,
    #[tabled(rename = "Mean")]
    mean: String,
    #[tabled(rename = "Std")]
    std_dev: String,
    #[tabled(rename = "Samples")]
    samples: usize,
}

pub async fn trends(session: &Session, files: &[PathBuf], host: Option<&str>) -> Result<()> {
    let loaded = load_dataset(session, files).await?;
    let mut report = TrendAnalyzer::default().analyze(&loaded.report.dataset);

    if let Some(host) = host {
        report.hosts.retain(|h| h.hostname == host);
        if report.hosts.is_empty() {
            bail!("Host '{}' not found in the imported data", host);
        }
    }

    match session.format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Table => {
            print_heading("Trends");
            print_rows(
                report
                    .hosts
                    .iter()
                    .map(|h| TrendRow {
                        hostname: h.hostname.clone(),
                        slope: format!("{:+.4}", h.slope_per_hour),
                        direction: color_direction(h.direction),
                        latest_averages: h
                            .moving_averages
                            .iter()
                            .filter_map(|m| {
                                let latest = m.values.last()?;
                                Some(format!("MA{} {}", m.window, format_percent(*latest)))
                            })
                            .collect::<Vec<_>>()
                            .join(", "),
                        peaks: h
                            .peaks
                            .iter()
                            .map(|p| {
                                let at = p.timestamp.format("%m-%d %H:%M");
                                format!("{} @ {}", format_percent(p.percent), at)
                            })
                            .collect::<Vec<_>>()
                            .join(", "),
                    })
                    .collect(),
            );

            let hourly: Vec<HourlyRow> = report
                .hosts
                .iter()
                .flat_map(|h| {
                    h.hourly.iter().map(move |b| HourlyRow {
                        hostname: h.hostname.clone(),
                        hour: format!("{:02}:00", b.hour),
                        mean: format_percent(b.mean),
                        std_dev: b
                            .std_dev
                            .map(|s| format!("{:.2}", s))
                            .unwrap_or_else(|| "-".to_string()),
                        samples: b.samples,
                    })
                })
                .collect();
            if !hourly.is_empty() {
                print_heading("Hour of day");
                print_rows(hourly);
            }

            println!(
                "\nOverall: mean {}, std {:.2}, peak {}, volatility {:.1}%",
                format_percent(report.overall_mean),
                report.overall_std_dev,
                format_percent(report.overall_max),
                report.volatility_percent
            );
            Ok(())
        }
    }
}

#[derive(Tabled)]
struct WeekRow {
    #[tabled(rename = "Week of")]
    start: String,
    #[tabled(rename = "Mon")]
    mon: String,
    #[tabled(rename = "Tue")]
    tue: String,
    #[tabled(rename = "Wed")]
    wed: String,
    #[tabled(rename = "Thu")]
    thu: String,
    #[tabled(rename = "Fri")]
    fri: String,
    #[tabled(rename = "Sat")]
    sat: String,
    #[tabled(rename = "Sun")]
    sun: String,
}

pub async fn heatmap(session: &Session, files: &[PathBuf], host: Option<&str>) -> Result<()> {
    let loaded = load_dataset(session, files).await?;
    let mut report =
        daily_profile(&loaded.report.dataset).context("Imported data has no timestamps")?;

    if let Some(host) = host {
        report.hosts.retain(|h| h.hostname == host);
        if report.hosts.is_empty() {
            bail!("Host '{}' not found in the imported data", host);
        }
    }

    match session.format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Table => {
            for profile in &report.hosts {
                print_heading(&format!("{}: daily CPU Ready", profile.hostname));
                print_rows(
                    profile
                        .weeks
                        .iter()
                        .map(|w| {
                            let [mon, tue, wed, thu, fri, sat, sun] =
                                w.days.map(|v| color_percent(v, &session.thresholds));
                            WeekRow {
                                start: w.start.format("%Y-%m-%d").to_string(),
                                mon,
                                tue,
                                wed,
                                thu,
                                fri,
                                sat,
                                sun,
                            }
                        })
                        .collect(),
                );
            }
            println!("\nRange: {} to {}", report.start, report.end);
            Ok(())
        }
    }
}
