//! CLI command implementations

pub mod analyze;
pub mod intervals;
pub mod settings;
pub mod simulate;
pub mod trends;

use std::path::PathBuf;
use std::str::FromStr;

use analyzer_lib::{
    detect_interval, resolve_profiles, DatasetLoader, ImportReport, IntervalDetection,
    IntervalProfile, RawTable, StructuredLogger, Thresholds, UnitNormalizer,
};
use anyhow::{Context, Result};
use tracing::debug;

use crate::config::AppConfig;
use crate::output::{print_warning, OutputFormat};

/// `--interval` value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalChoice {
    Auto,
    Fixed(IntervalProfile),
}

impl FromStr for IntervalChoice {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            Ok(IntervalChoice::Auto)
        } else {
            s.parse().map(IntervalChoice::Fixed)
        }
    }
}

/// Settings shared by every data command
pub struct Session {
    pub config: AppConfig,
    pub format: OutputFormat,
    pub interval: IntervalChoice,
    pub thresholds: Thresholds,
    pub logger: StructuredLogger,
}

impl Session {
    /// Build a session from the fully merged configuration
    pub fn new(config: AppConfig, format: OutputFormat) -> Result<Self> {
        config.validate()?;

        let interval = match config.default_interval {
            Some(profile) => IntervalChoice::Fixed(profile),
            None => IntervalChoice::Auto,
        };

        Ok(Self {
            thresholds: config.thresholds,
            config,
            format,
            interval,
            logger: StructuredLogger::new("cli"),
        })
    }

    pub fn normalizer(&self) -> UnitNormalizer {
        UnitNormalizer::with_config(self.config.normalizer.clone())
    }
}

/// Imported data plus how its interval was chosen
pub struct LoadedData {
    pub report: ImportReport,
    pub detections: Vec<IntervalDetection>,
}

/// Read CSV files concurrently, one blocking worker per file
pub async fn read_tables(files: &[PathBuf]) -> Result<Vec<RawTable>> {
    let handles: Vec<_> = files
        .iter()
        .cloned()
        .map(|path| {
            tokio::task::spawn_blocking(move || {
                RawTable::from_path(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))
            })
        })
        .collect();

    let mut tables = Vec::with_capacity(handles.len());
    for handle in handles {
        tables.push(handle.await.context("File reader task failed")??);
    }
    Ok(tables)
}

/// Detect the interval of every table
pub fn detect_all(session: &Session, tables: &[RawTable]) -> Vec<IntervalDetection> {
    tables
        .iter()
        .map(|t| {
            let detection = detect_interval(t, &t.source);
            session.logger.log_interval_detected(&t.source, &detection);
            detection
        })
        .collect()
}

/// Read, detect and import files into a dataset
pub async fn load_dataset(session: &Session, files: &[PathBuf]) -> Result<LoadedData> {
    let tables = read_tables(files).await?;
    let detections = detect_all(session, &tables);

    let profile = match session.interval {
        IntervalChoice::Fixed(profile) => profile,
        IntervalChoice::Auto => {
            let detected: Vec<IntervalProfile> =
                detections.iter().map(|d| d.profile).collect();
            let profile = resolve_profiles(&detected).unwrap_or_default();
            if session.format == OutputFormat::Table && detected.iter().any(|p| *p != profile) {
                print_warning(&format!(
                    "Files were collected at different intervals, using {} for all",
                    profile
                ));
            }
            profile
        }
    };

    debug!(files = files.len(), profile = %profile, "Importing CPU Ready exports");
    let loader = DatasetLoader::new(profile)
        .with_normalizer(session.normalizer())
        .with_logger(session.logger.clone());
    let report = loader.load(&tables).context("Failed to import CPU Ready data")?;

    if session.format == OutputFormat::Table {
        for warning in &report.warnings {
            print_warning(&warning.to_string());
        }
    }

    Ok(LoadedData { report, detections })
}
