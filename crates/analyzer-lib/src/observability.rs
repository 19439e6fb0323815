//! Structured logging for analysis events
//!
//! Every event carries an `event` field so JSON log output can be filtered
//! by event name.

use tracing::{info, warn};

use crate::import::ImportWarning;
use crate::interval::IntervalDetection;
use crate::models::{Dataset, RemovalImpactResult};
use crate::normalizer::ConversionMethod;

/// Emits tracing events tagged with the session they belong to
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    session: String,
}

impl StructuredLogger {
    pub fn new(session: impl Into<String>) -> Self {
        Self {
            session: session.into(),
        }
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    /// Log a completed import
    pub fn log_dataset_imported(&self, tables: usize, dataset: &Dataset, warnings: usize) {
        info!(
            event = "dataset_imported",
            session = %self.session,
            tables = tables,
            hosts = dataset.host_count(),
            records = dataset.record_count(),
            profile = %dataset.profile(),
            warnings = warnings,
            "Imported CPU Ready dataset"
        );
    }

    /// Log the conversion chosen for one host
    ///
    /// Recovery conversions mean the raw units could not be identified and
    /// are logged at warn level.
    pub fn log_conversion(&self, hostname: &str, method: ConversionMethod, mean_percent: f64) {
        if method.is_recovery() {
            warn!(
                event = "conversion_recovered",
                session = %self.session,
                host = %hostname,
                method = %method,
                mean_percent = mean_percent,
                "Recovered implausible CPU Ready values"
            );
        } else {
            info!(
                event = "conversion_applied",
                session = %self.session,
                host = %hostname,
                method = %method,
                mean_percent = mean_percent,
                "Normalized CPU Ready values"
            );
        }
    }

    pub fn log_import_warning(&self, warning: &ImportWarning) {
        warn!(
            event = "import_warning",
            session = %self.session,
            kind = warning.kind(),
            details = %warning,
            "Import warning"
        );
    }

    pub fn log_interval_detected(&self, source: &str, detection: &IntervalDetection) {
        info!(
            event = "interval_detected",
            session = %self.session,
            source = %source,
            profile = %detection.profile,
            reason = %detection.reason,
            records = detection.records,
            average_spacing_secs = ?detection.average_spacing_secs,
            "Detected collection interval"
        );
    }

    /// Log a removal simulation outcome
    pub fn log_removal_simulated(&self, result: &RemovalImpactResult) {
        let removed: Vec<&str> = result.removed_hosts.iter().map(|h| h.hostname.as_str()).collect();
        info!(
            event = "removal_simulated",
            session = %self.session,
            removed = ?removed,
            surviving = result.surviving_host_count(),
            workload_percentage = result.workload_percentage,
            projected_mean_percent = result.projected_mean_percent,
            risk = %result.risk,
            "Simulated host removal"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("cli");
        assert_eq!(logger.session(), "cli");
    }
}
