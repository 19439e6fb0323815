//! Import of vCenter CPU Ready exports
//!
//! Turns raw CSV tables into a normalized [`Dataset`]. Each ready column
//! becomes one host series; rows without a usable timestamp or value are
//! dropped and reported as [`ImportWarning`]s rather than failing the
//! whole import.

mod columns;
mod table;
mod timestamps;


pub use columns::{extract_hostname, find_ready_columns, find_time_column, UNKNOWN_HOST};
pub use table::RawTable;
pub use timestamps::parse_timestamp;

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AnalyzerError, Result};
use crate::models::{Dataset, HostSeries, IntervalProfile};
use crate::normalizer::{ConversionMethod, UnitNormalizer};
use crate::observability::StructuredLogger;

/// Host means above this percentage are reported as suspicious
pub const HIGH_MEAN_WARNING_PERCENT: f64 = 50.0;

/// Non-fatal problems found while importing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImportWarning {
    MissingTimeColumn { table: String },
    MissingReadyColumns { table: String },
    UnparseableTimestamps { table: String, rows: usize },
    DuplicateHost { table: String, hostname: String },
    NoValidRows { table: String, hostname: String },
    RowsDropped { hostname: String, dropped: usize, total: usize },
    HighMean { hostname: String, mean_percent: f64 },
    SuspiciouslyLow { hostname: String, mean_percent: f64, max_percent: f64 },
}

impl ImportWarning {
    pub fn kind(&self) -> &'static str {
        match self {
            ImportWarning::MissingTimeColumn { .. } => "missing_time_column",
            ImportWarning::MissingReadyColumns { .. } => "missing_ready_columns",
            ImportWarning::UnparseableTimestamps { .. } => "unparseable_timestamps",
            ImportWarning::DuplicateHost { .. } => "duplicate_host",
            ImportWarning::NoValidRows { .. } => "no_valid_rows",
            ImportWarning::RowsDropped { .. } => "rows_dropped",
            ImportWarning::HighMean { .. } => "high_mean",
            ImportWarning::SuspiciouslyLow { .. } => "suspiciously_low",
        }
    }
}

impl fmt::Display for ImportWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportWarning::MissingTimeColumn { table } => {
                write!(f, "{}: no time column, table skipped", table)
            }
            ImportWarning::MissingReadyColumns { table } => {
                write!(f, "{}: no CPU Ready columns, table skipped", table)
            }
            ImportWarning::UnparseableTimestamps { table, rows } => {
                write!(f, "{}: {} rows with unparseable timestamps dropped", table, rows)
            }
            ImportWarning::DuplicateHost { table, hostname } => {
                write!(f, "{}: host {} already imported, column skipped", table, hostname)
            }
            ImportWarning::NoValidRows { table, hostname } => {
                write!(f, "{}: host {} has no valid CPU Ready values", table, hostname)
            }
            ImportWarning::RowsDropped { hostname, dropped, total } => write!(
                f,
                "{}: {} of {} rows dropped (missing, zero or negative values)",
                hostname, dropped, total
            ),
            ImportWarning::HighMean { hostname, mean_percent } => write!(
                f,
                "{}: mean CPU Ready {:.2}% is unusually high, check the export units",
                hostname, mean_percent
            ),
            ImportWarning::SuspiciouslyLow { hostname, mean_percent, max_percent } => write!(
                f,
                "{}: CPU Ready is suspiciously low (mean {:.3}%, max {:.3}%)",
                hostname, mean_percent, max_percent
            ),
        }
    }
}

/// Outcome of a successful import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub dataset: Dataset,
    pub warnings: Vec<ImportWarning>,
    /// Conversion chosen per host, in import order
    pub conversions: Vec<(String, ConversionMethod)>,
}

/// Builds datasets from raw tables for one interval profile
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    profile: IntervalProfile,
    normalizer: UnitNormalizer,
    logger: StructuredLogger,
}

impl DatasetLoader {
    pub fn new(profile: IntervalProfile) -> Self {
        Self {
            profile,
            normalizer: UnitNormalizer::default(),
            logger: StructuredLogger::new("import"),
        }
    }

    pub fn with_normalizer(mut self, normalizer: UnitNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn profile(&self) -> IntervalProfile {
        self.profile
    }

    /// Import every table into one dataset
    ///
    /// A hostname seen in an earlier table or column wins; later columns
    /// for the same host are skipped with a warning.
    ///
    /// # Errors
    /// * `NoUsableData` if no table yields a single valid host series
    pub fn load(&self, tables: &[RawTable]) -> Result<ImportReport> {
        let mut warnings = Vec::new();
        let mut conversions = Vec::new();
        let mut series = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for table in tables {
            let Some(time_col) = find_time_column(&table.headers) else {
                warnings.push(ImportWarning::MissingTimeColumn {
                    table: table.source.clone(),
                });
                continue;
            };
            let ready_cols = find_ready_columns(&table.headers);
            if ready_cols.is_empty() {
                warnings.push(ImportWarning::MissingReadyColumns {
                    table: table.source.clone(),
                });
                continue;
            }

            let timestamps: Vec<Option<DateTime<Utc>>> = (0..table.len())
                .map(|row| table.cell(row, time_col).and_then(parse_timestamp))
                .collect();
            let unparseable = timestamps.iter().filter(|t| t.is_none()).count();
            if unparseable > 0 {
                warnings.push(ImportWarning::UnparseableTimestamps {
                    table: table.source.clone(),
                    rows: unparseable,
                });
            }

            for col in ready_cols {
                let hostname = extract_hostname(&table.headers[col]);
                if seen.contains(&hostname) {
                    warnings.push(ImportWarning::DuplicateHost {
                        table: table.source.clone(),
                        hostname,
                    });
                    continue;
                }

                let samples = column_samples(table, col, &timestamps);
                if samples.is_empty() {
                    warnings.push(ImportWarning::NoValidRows {
                        table: table.source.clone(),
                        hostname,
                    });
                    continue;
                }

                let total = table.len();
                let dropped = total - samples.len();
                if dropped * 2 > total {
                    warnings.push(ImportWarning::RowsDropped {
                        hostname: hostname.clone(),
                        dropped,
                        total,
                    });
                }

                let host = HostSeries::from_samples(
                    hostname.clone(),
                    table.source.clone(),
                    samples,
                    self.profile,
                    &self.normalizer,
                )?;
                let stats = host.stats();
                if stats.mean > HIGH_MEAN_WARNING_PERCENT {
                    warnings.push(ImportWarning::HighMean {
                        hostname: hostname.clone(),
                        mean_percent: stats.mean,
                    });
                } else if stats.max < 1.0 && stats.mean < 0.1 {
                    warnings.push(ImportWarning::SuspiciouslyLow {
                        hostname: hostname.clone(),
                        mean_percent: stats.mean,
                        max_percent: stats.max,
                    });
                }

                self.logger.log_conversion(&hostname, host.conversion_method, stats.mean);
                conversions.push((hostname.clone(), host.conversion_method));
                seen.insert(hostname);
                series.push(host);
            }
        }

        for warning in &warnings {
            self.logger.log_import_warning(warning);
        }

        if series.is_empty() {
            return Err(AnalyzerError::NoUsableData);
        }

        let dataset = Dataset::new(self.profile, series)?;
        self.logger.log_dataset_imported(tables.len(), &dataset, warnings.len());

        Ok(ImportReport {
            dataset,
            warnings,
            conversions,
        })
    }
}

/// Valid (timestamp, value) pairs of one ready column
///
/// Rows lacking a timestamp or holding a missing, non-numeric, zero or
/// negative value are skipped.
fn column_samples(
    table: &RawTable,
    column: usize,
    timestamps: &[Option<DateTime<Utc>>],
) -> Vec<(DateTime<Utc>, f64)> {
    timestamps
        .iter()
        .enumerate()
        .filter_map(|(row, ts)| {
            let ts = (*ts)?;
            let value: f64 = table.cell(row, column)?.parse().ok()?;
            (value.is_finite() && value > 0.0).then_some((ts, value))
        })
        .collect()
}
