//! Host health analysis against CPU Ready thresholds
//!
//! Scores each host from its mean, peak and variability, classifies it
//! against the warning and critical levels, and summarizes the dataset.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AnalyzerError, Result};
use crate::models::{Dataset, HostSeries, HostStats};

/// Default warning level (% CPU Ready)
pub const DEFAULT_WARNING_PERCENT: f64 = 5.0;

/// Default critical level (% CPU Ready)
pub const DEFAULT_CRITICAL_PERCENT: f64 = 15.0;

/// Mean below which a healthy host is a consolidation candidate
pub const CONSOLIDATION_CANDIDATE_PERCENT: f64 = 2.0;

/// Warning and critical CPU Ready levels in percent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub warning: f64,
    pub critical: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            warning: DEFAULT_WARNING_PERCENT,
            critical: DEFAULT_CRITICAL_PERCENT,
        }
    }
}

impl Thresholds {
    /// Create validated thresholds
    pub fn new(warning: f64, critical: f64) -> Result<Self> {
        let thresholds = Self { warning, critical };
        thresholds.validate()?;
        Ok(thresholds)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.warning > 0.0 && self.warning < self.critical && self.critical.is_finite()) {
            return Err(AnalyzerError::InvalidThresholds {
                warning: self.warning,
                critical: self.critical,
            });
        }
        Ok(())
    }

    pub fn status_for(&self, mean_percent: f64) -> HostStatus {
        if mean_percent >= self.critical {
            HostStatus::Critical
        } else if mean_percent >= self.warning {
            HostStatus::Warning
        } else {
            HostStatus::Healthy
        }
    }
}

/// Threshold classification of a host
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostStatus {
    Healthy,
    Warning,
    Critical,
}

impl std::fmt::Display for HostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostStatus::Healthy => write!(f, "healthy"),
            HostStatus::Warning => write!(f, "warning"),
            HostStatus::Critical => write!(f, "critical"),
        }
    }
}

/// Health score from 0 to 100, higher is better
pub fn health_score(mean: f64, max: f64, std_dev: f64, thresholds: &Thresholds) -> f64 {
    let mut score = 100.0;

    if mean >= thresholds.critical {
        score -= 50.0;
    } else if mean >= thresholds.warning {
        score -= 25.0;
    } else {
        score -= (mean / thresholds.warning) * 10.0;
    }

    // Spikes
    if max >= thresholds.critical * 2.0 {
        score -= 30.0;
    } else if max >= thresholds.critical {
        score -= 15.0;
    }

    // Instability
    if std_dev > thresholds.warning {
        score -= 15.0;
    }

    f64::clamp(score, 0.0, 100.0)
}

/// Health assessment of one host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostHealth {
    pub hostname: String,
    pub stats: HostStats,
    pub score: f64,
    pub status: HostStatus,
    /// Share of samples at or above the warning level
    pub warning_time_percent: f64,
    /// Share of samples at or above the critical level
    pub critical_time_percent: f64,
    pub recommendation: String,
}

/// Health of every host, worst score first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub thresholds: Thresholds,
    pub hosts: Vec<HostHealth>,
    pub critical_hosts: usize,
    pub warning_hosts: usize,
    pub healthy_hosts: usize,
    pub consolidation_candidates: Vec<String>,
}

/// Host ranking entry, best score first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostRanking {
    pub rank: usize,
    pub hostname: String,
    pub stats: HostStats,
    pub score: f64,
    pub status: HostStatus,
    pub recommendation: String,
}

/// Evaluates hosts of a dataset against thresholds
#[derive(Debug, Clone, Default)]
pub struct HealthAnalyzer {
    thresholds: Thresholds,
}

impl HealthAnalyzer {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Assess a single host series
    pub fn assess(&self, series: &HostSeries) -> HostHealth {
        let stats = series.stats();
        let score = health_score(stats.mean, stats.max, stats.std_dev, &self.thresholds);
        let status = self.thresholds.status_for(stats.mean);

        let total = series.len().max(1) as f64;
        let above_warning = series
            .samples
            .iter()
            .filter(|s| s.percent >= self.thresholds.warning)
            .count();
        let above_critical = series
            .samples
            .iter()
            .filter(|s| s.percent >= self.thresholds.critical)
            .count();

        let recommendation = if score < 50.0 {
            "Immediate attention required"
        } else if score < 70.0 {
            "Monitor closely, consider workload redistribution"
        } else if stats.mean < CONSOLIDATION_CANDIDATE_PERCENT {
            "Good consolidation candidate"
        } else {
            "Performing within acceptable ranges"
        };

        HostHealth {
            hostname: series.hostname.clone(),
            stats,
            score,
            status,
            warning_time_percent: above_warning as f64 / total * 100.0,
            critical_time_percent: above_critical as f64 / total * 100.0,
            recommendation: recommendation.to_string(),
        }
    }

    /// Assess every host, worst first
    pub fn analyze(&self, dataset: &Dataset) -> HealthReport {
        let mut hosts: Vec<HostHealth> = dataset.hosts().map(|h| self.assess(h)).collect();
        hosts.sort_by(|a, b| {
            a.score
                .partial_cmp(&b.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.hostname.cmp(&b.hostname))
        });

        let count = |status: HostStatus| hosts.iter().filter(|h| h.status == status).count();
        let consolidation_candidates = hosts
            .iter()
            .filter(|h| {
                h.status == HostStatus::Healthy && h.stats.mean < CONSOLIDATION_CANDIDATE_PERCENT
            })
            .map(|h| h.hostname.clone())
            .collect();

        HealthReport {
            thresholds: self.thresholds,
            critical_hosts: count(HostStatus::Critical),
            warning_hosts: count(HostStatus::Warning),
            healthy_hosts: count(HostStatus::Healthy),
            consolidation_candidates,
            hosts,
        }
    }

    /// Rank hosts best first for side-by-side comparison
    pub fn compare(&self, dataset: &Dataset) -> Vec<HostRanking> {
        let mut assessed: Vec<HostHealth> = dataset.hosts().map(|h| self.assess(h)).collect();
        assessed.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.hostname.cmp(&b.hostname))
        });

        assessed
            .into_iter()
            .enumerate()
            .map(|(i, h)| {
                let recommendation = match h.status {
                    HostStatus::Critical => "Immediate attention needed",
                    HostStatus::Warning => "Monitor and investigate",
                    HostStatus::Healthy if h.stats.mean < CONSOLIDATION_CANDIDATE_PERCENT => {
                        "Great consolidation candidate"
                    }
                    HostStatus::Healthy => "Performing well",
                };
                HostRanking {
                    rank: i + 1,
                    hostname: h.hostname,
                    stats: h.stats,
                    score: h.score,
                    status: h.status,
                    recommendation: recommendation.to_string(),
                }
            })
            .collect()
    }
}

/// Dataset-wide overview shown after an import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub total_hosts: usize,
    pub total_records: usize,
    pub critical_hosts: usize,
    pub warning_hosts: usize,
    pub healthy_hosts: usize,
    pub overall_mean_percent: f64,
    pub overall_max_percent: f64,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub duration_secs: i64,
}

impl AnalysisSummary {
    pub fn from_dataset(dataset: &Dataset, thresholds: &Thresholds) -> Self {
        let mut critical_hosts = 0;
        let mut warning_hosts = 0;
        let mut healthy_hosts = 0;
        for host in dataset.hosts() {
            match thresholds.status_for(host.stats().mean) {
                HostStatus::Critical => critical_hosts += 1,
                HostStatus::Warning => warning_hosts += 1,
                HostStatus::Healthy => healthy_hosts += 1,
            }
        }

        let range = dataset.time_range();
        Self {
            total_hosts: dataset.host_count(),
            total_records: dataset.record_count(),
            critical_hosts,
            warning_hosts,
            healthy_hosts,
            overall_mean_percent: dataset.overall_mean_percent(),
            overall_max_percent: dataset.overall_max_percent(),
            start: range.map(|(s, _)| s),
            end: range.map(|(_, e)| e),
            duration_secs: dataset.duration().num_seconds(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IntervalProfile;
    use crate::normalizer::UnitNormalizer;
    use chrono::{Duration, TimeZone};

    fn series(host: &str, percents: &[f64]) -> HostSeries {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let samples = percents
            .iter()
            .enumerate()
            .map(|(i, v)| (start + Duration::minutes(5 * i as i64), *v))
            .collect();
        let normalizer = UnitNormalizer::new();
        HostSeries::from_samples(host, "t.csv", samples, IntervalProfile::LastDay, &normalizer)
            .unwrap()
    }

    fn dataset() -> Dataset {
        Dataset::new(
            IntervalProfile::LastDay,
            vec![
                series("calm", &[0.5, 1.0, 1.5]),
                series("busy", &[6.0, 7.0, 8.0]),
                series("hot", &[20.0, 25.0, 40.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_threshold_validation() {
        assert!(Thresholds::new(5.0, 15.0).is_ok());
        assert!(Thresholds::new(15.0, 5.0).is_err());
        assert!(Thresholds::new(0.0, 5.0).is_err());
        assert!(Thresholds::new(5.0, 5.0).is_err());
    }

    #[test]
    fn test_health_score_penalties() {
        let t = Thresholds::default();
        assert_eq!(health_score(0.0, 0.0, 0.0, &t), 100.0);
        // 2.5/5 of the warning level costs 5 points
        assert!((health_score(2.5, 3.0, 0.5, &t) - 95.0).abs() < 1e-9);
        assert_eq!(health_score(6.0, 10.0, 1.0, &t), 75.0);
        assert_eq!(health_score(16.0, 20.0, 1.0, &t), 35.0);
        assert_eq!(health_score(20.0, 40.0, 10.0, &t), 5.0);
        assert_eq!(health_score(90.0, 100.0, 50.0, &t), 5.0);
    }

    #[test]
    fn test_status_boundaries() {
        let t = Thresholds::default();
        assert_eq!(t.status_for(4.99), HostStatus::Healthy);
        assert_eq!(t.status_for(5.0), HostStatus::Warning);
        assert_eq!(t.status_for(15.0), HostStatus::Critical);
    }

    #[test]
    fn test_report_sorted_worst_first() {
        let report = HealthAnalyzer::default().analyze(&dataset());
        let order: Vec<&str> = report.hosts.iter().map(|h| h.hostname.as_str()).collect();
        assert_eq!(order, vec!["hot", "busy", "calm"]);
        assert_eq!(report.critical_hosts, 1);
        assert_eq!(report.warning_hosts, 1);
        assert_eq!(report.healthy_hosts, 1);
        assert_eq!(report.consolidation_candidates, vec!["calm".to_string()]);
    }

    #[test]
    fn test_time_above_thresholds() {
        let analyzer = HealthAnalyzer::default();
        let health = analyzer.assess(&series("mixed", &[1.0, 6.0, 16.0, 2.0]));
        assert!((health.warning_time_percent - 50.0).abs() < 1e-9);
        assert!((health.critical_time_percent - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_compare_ranks_best_first() {
        let ranking = HealthAnalyzer::default().compare(&dataset());
        assert_eq!(ranking[0].hostname, "calm");
        assert_eq!(ranking[0].rank, 1);
        assert_eq!(ranking[0].recommendation, "Great consolidation candidate");
        assert_eq!(ranking[2].hostname, "hot");
        assert_eq!(ranking[2].recommendation, "Immediate attention needed");
    }

    #[test]
    fn test_summary() {
        let summary = AnalysisSummary::from_dataset(&dataset(), &Thresholds::default());
        assert_eq!(summary.total_hosts, 3);
        assert_eq!(summary.total_records, 9);
        assert_eq!(summary.critical_hosts, 1);
        assert_eq!(summary.overall_max_percent, 40.0);
        assert_eq!(summary.duration_secs, 600);
    }
}
