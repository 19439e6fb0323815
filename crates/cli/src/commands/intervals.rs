//! Interval detection and listing commands

use std::path::PathBuf;

use analyzer_lib::{resolve_profiles, IntervalProfile};
use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;

use super::{detect_all, read_tables, Session};
use crate::output::{print_info, print_json, print_rows, OutputFormat};

#[derive(Tabled)]
struct DetectionRow {
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Interval")]
    profile: String,
    #[tabled(rename = "Records")]
    records: usize,
    #[tabled(rename = "Avg spacing")]
    spacing: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

#[derive(Tabled, Serialize)]
struct IntervalRow {
    #[tabled(rename = "Interval")]
    name: String,
    #[tabled(rename = "Period (s)")]
    period_seconds: u64,
    #[tabled(rename = "Max ready (ms)")]
    max_possible_ms: f64,
}

/// Detect and print the interval of each file
pub async fn detect(session: &Session, files: &[PathBuf]) -> Result<()> {
    let tables = read_tables(files).await?;
    let detections = detect_all(session, &tables);
    let profiles: Vec<IntervalProfile> = detections.iter().map(|d| d.profile).collect();
    let resolved = resolve_profiles(&profiles).unwrap_or_default();

    match session.format {
        OutputFormat::Json => {
            let files: Vec<_> = tables
                .iter()
                .zip(&detections)
                .map(|(t, d)| serde_json::json!({ "file": t.source, "detection": d }))
                .collect();
            print_json(&serde_json::json!({ "files": files, "resolved": resolved }))
        }
        OutputFormat::Table => {
            let rows = tables
                .iter()
                .zip(&detections)
                .map(|(t, d)| DetectionRow {
                    file: t.source.clone(),
                    profile: d.profile.to_string(),
                    records: d.records,
                    spacing: d
                        .average_spacing_secs
                        .map(|s| format!("{:.0}s", s))
                        .unwrap_or_else(|| "-".to_string()),
                    reason: d.reason.to_string(),
                })
                .collect();
            print_rows(rows);
            print_info(&format!("Interval used for import: {}", resolved));
            Ok(())
        }
    }
}

/// List the supported intervals
pub fn list(format: OutputFormat) -> Result<()> {
    let rows: Vec<IntervalRow> = IntervalProfile::all()
        .into_iter()
        .map(|p| IntervalRow {
            name: p.label().to_string(),
            period_seconds: p.period_seconds(),
            max_possible_ms: p.max_possible_ms(),
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&rows),
        OutputFormat::Table => {
            print_rows(rows);
            Ok(())
        }
    }
}
