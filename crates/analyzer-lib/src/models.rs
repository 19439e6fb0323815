//! Core data models for CPU Ready analysis

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AnalyzerError, Result};
use crate::normalizer::{ConversionMethod, UnitNormalizer};

/// vCenter rollup level a CPU Ready export was collected at
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum IntervalProfile {
    RealTime,
    #[default]
    LastDay,
    LastWeek,
    LastMonth,
    LastYear,
}

impl IntervalProfile {
    /// Collection granularity in seconds
    pub fn period_seconds(&self) -> u64 {
        match self {
            IntervalProfile::RealTime => 20,
            IntervalProfile::LastDay => 300,
            IntervalProfile::LastWeek => 1800,
            IntervalProfile::LastMonth => 7200,
            IntervalProfile::LastYear => 86400,
        }
    }

    /// Largest raw value a milliseconds summation can reach in one period
    pub fn max_possible_ms(&self) -> f64 {
        self.period_seconds() as f64 * 1000.0
    }

    /// Name shown by the vCenter performance chart selector
    pub fn label(&self) -> &'static str {
        match self {
            IntervalProfile::RealTime => "Real-Time",
            IntervalProfile::LastDay => "Last Day",
            IntervalProfile::LastWeek => "Last Week",
            IntervalProfile::LastMonth => "Last Month",
            IntervalProfile::LastYear => "Last Year",
        }
    }

    pub fn all() -> [IntervalProfile; 5] {
        [
            IntervalProfile::RealTime,
            IntervalProfile::LastDay,
            IntervalProfile::LastWeek,
            IntervalProfile::LastMonth,
            IntervalProfile::LastYear,
        ]
    }

    /// Profile whose period is exactly `seconds`
    pub fn from_period_seconds(seconds: u64) -> Option<Self> {
        Self::all().into_iter().find(|p| p.period_seconds() == seconds)
    }
}

impl fmt::Display for IntervalProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for IntervalProfile {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();

        match key.as_str() {
            "realtime" | "rt" | "20" => Ok(IntervalProfile::RealTime),
            "lastday" | "day" | "pastday" | "300" => Ok(IntervalProfile::LastDay),
            "lastweek" | "week" | "pastweek" | "1800" => Ok(IntervalProfile::LastWeek),
            "lastmonth" | "month" | "pastmonth" | "7200" => Ok(IntervalProfile::LastMonth),
            "lastyear" | "year" | "pastyear" | "86400" => Ok(IntervalProfile::LastYear),
            _ => Err(format!(
                "unknown interval '{}' (expected one of: real-time, last-day, last-week, last-month, last-year)",
                s
            )),
        }
    }
}

/// A sample with its derived CPU Ready percentage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSample {
    pub timestamp: DateTime<Utc>,
    pub raw_value: f64,
    pub percent: f64,
    pub conversion_method: ConversionMethod,
}

/// All normalized samples of one host, ordered by timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostSeries {
    pub hostname: String,
    /// File or table the samples were read from
    pub source: String,
    pub profile: IntervalProfile,
    pub conversion_method: ConversionMethod,
    pub samples: Vec<NormalizedSample>,
}

impl HostSeries {
    /// Normalize raw samples of one host into a series
    ///
    /// Samples are sorted by timestamp before conversion; the conversion
    /// branch is decided from the leading window of the sorted column.
    pub fn from_samples(
        hostname: impl Into<String>,
        source: impl Into<String>,
        mut samples: Vec<(DateTime<Utc>, f64)>,
        profile: IntervalProfile,
        normalizer: &UnitNormalizer,
    ) -> Result<Self> {
        samples.sort_by_key(|(ts, _)| *ts);
        let raw: Vec<f64> = samples.iter().map(|(_, v)| *v).collect();
        let normalized = normalizer.normalize(&raw, profile)?;

        let method = normalized.method;
        let samples = samples
            .into_iter()
            .zip(normalized.percents)
            .map(|((timestamp, raw_value), percent)| NormalizedSample {
                timestamp,
                raw_value,
                percent,
                conversion_method: method,
            })
            .collect();

        Ok(Self {
            hostname: hostname.into(),
            source: source.into(),
            profile,
            conversion_method: method,
            samples,
        })
    }

    pub fn raw_values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.raw_value).collect()
    }

    pub fn percents(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.percent).collect()
    }

    pub fn raw_sum(&self) -> f64 {
        self.samples.iter().map(|s| s.raw_value).sum()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn stats(&self) -> HostStats {
        HostStats::from_values(&self.percents())
    }

    /// Re-run the normalizer over the raw values with another profile
    pub fn renormalize(
        &self,
        profile: IntervalProfile,
        normalizer: &UnitNormalizer,
    ) -> Result<Self> {
        let samples = self.samples.iter().map(|s| (s.timestamp, s.raw_value)).collect();
        Self::from_samples(&self.hostname, &self.source, samples, profile, normalizer)
    }
}

/// Every host series of one import, sharing a single interval profile
///
/// A dataset is never mutated in place: changing the interval produces a
/// new dataset through [`Dataset::renormalize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    profile: IntervalProfile,
    hosts: BTreeMap<String, HostSeries>,
}

impl Dataset {
    /// Build a dataset; every series must use `profile` and hostnames must be unique
    pub fn new(profile: IntervalProfile, series: Vec<HostSeries>) -> Result<Self> {
        let mut hosts = BTreeMap::new();
        for s in series {
            if s.profile != profile {
                return Err(AnalyzerError::ProfileMismatch {
                    hostname: s.hostname,
                    expected: profile,
                    found: s.profile,
                });
            }
            if s.is_empty() {
                return Err(AnalyzerError::EmptySeries);
            }
            let hostname = s.hostname.clone();
            if hosts.insert(hostname.clone(), s).is_some() {
                return Err(AnalyzerError::DuplicateHost { hostname });
            }
        }
        if hosts.is_empty() {
            return Err(AnalyzerError::EmptySeries);
        }
        Ok(Self { profile, hosts })
    }

    pub fn profile(&self) -> IntervalProfile {
        self.profile
    }

    /// Host series in hostname order
    pub fn hosts(&self) -> impl Iterator<Item = &HostSeries> {
        self.hosts.values()
    }

    pub fn hostnames(&self) -> Vec<&str> {
        self.hosts.keys().map(String::as_str).collect()
    }

    pub fn host(&self, hostname: &str) -> Option<&HostSeries> {
        self.hosts.get(hostname)
    }

    pub fn contains_host(&self, hostname: &str) -> bool {
        self.hosts.contains_key(hostname)
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    pub fn record_count(&self) -> usize {
        self.hosts.values().map(HostSeries::len).sum()
    }

    /// Earliest and latest timestamp across all hosts
    pub fn time_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let mut timestamps = self
            .hosts
            .values()
            .flat_map(|h| h.samples.iter().map(|s| s.timestamp));
        let first = timestamps.next()?;
        Some(timestamps.fold((first, first), |(lo, hi), ts| (lo.min(ts), hi.max(ts))))
    }

    pub fn duration(&self) -> Duration {
        self.time_range()
            .map(|(start, end)| end - start)
            .unwrap_or_else(Duration::zero)
    }

    /// Percentages of every sample of every host
    pub fn all_percents(&self) -> Vec<f64> {
        self.hosts.values().flat_map(|h| h.samples.iter().map(|s| s.percent)).collect()
    }

    /// Sample-weighted mean percentage across all hosts
    pub fn overall_mean_percent(&self) -> f64 {
        mean(&self.all_percents())
    }

    pub fn overall_max_percent(&self) -> f64 {
        self.all_percents().into_iter().fold(0.0, f64::max)
    }

    /// New dataset with every host re-normalized for `profile`
    pub fn renormalize(
        &self,
        profile: IntervalProfile,
        normalizer: &UnitNormalizer,
    ) -> Result<Self> {
        let series = self
            .hosts
            .values()
            .map(|h| h.renormalize(profile, normalizer))
            .collect::<Result<Vec<_>>>()?;
        Self::new(profile, series)
    }
}

/// Descriptive statistics over a column of percentages
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HostStats {
    pub count: usize,
    pub mean: f64,
    pub max: f64,
    pub min: f64,
    /// Sample standard deviation (Bessel's correction), 0 for fewer than two values
    pub std_dev: f64,
}

impl HostStats {
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let count = values.len();
        let mean = mean(values);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);

        // Two-pass variance for stability
        let std_dev = if count > 1 {
            let variance =
                values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
            variance.sqrt()
        } else {
            0.0
        };

        Self { count, mean, max, min, std_dev }
    }
}

/// Hosts selected for decommissioning in a what-if simulation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalPlan {
    hosts: Vec<String>,
}

impl RemovalPlan {
    /// Create a plan; duplicate hostnames are collapsed, first occurrence wins
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for host in hosts {
            let host = host.into();
            if !unique.contains(&host) {
                unique.push(host);
            }
        }
        Self { hosts: unique }
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    pub fn contains(&self, hostname: &str) -> bool {
        self.hosts.iter().any(|h| h == hostname)
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Check the plan against a dataset: non-empty, known hosts, at least one survivor
    pub fn validate(&self, dataset: &Dataset) -> Result<()> {
        if self.hosts.is_empty() {
            return Err(AnalyzerError::InvalidPlan(
                "select at least one host to remove".to_string(),
            ));
        }

        if let Some(unknown) = self.hosts.iter().find(|h| !dataset.contains_host(h)) {
            return Err(AnalyzerError::InvalidPlan(format!(
                "host '{}' is not present in the dataset",
                unknown
            )));
        }

        if self.hosts.len() >= dataset.host_count() {
            return Err(AnalyzerError::InvalidPlan(
                "cannot remove all hosts - no remaining infrastructure".to_string(),
            ));
        }

        Ok(())
    }
}

/// Aggregate risk of a host removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
        }
    }
}

/// Contribution of one removed host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovedHost {
    pub hostname: String,
    pub raw_workload: f64,
    pub mean_percent: f64,
    /// Share of the total raw workload carried by this host
    pub workload_percentage: f64,
}

/// Projected effect on one surviving host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostImpact {
    pub hostname: String,
    pub before: HostStats,
    pub after: HostStats,
    pub additional_raw_per_sample: f64,
    /// Projected mean minus original mean
    pub increase: f64,
    pub conversion_method: ConversionMethod,
}

/// Result of a host removal simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovalImpactResult {
    pub profile: IntervalProfile,
    pub removed_hosts: Vec<RemovedHost>,
    pub surviving_hosts: Vec<HostImpact>,
    pub total_raw_workload: f64,
    pub removed_raw_workload: f64,
    pub surviving_raw_workload: f64,
    pub workload_percentage: f64,
    pub additional_raw_per_host: f64,
    pub original_mean_percent: f64,
    pub projected_mean_percent: f64,
    pub avg_increase: f64,
    pub infrastructure_reduction_percent: f64,
    /// Workload percentage freed per removed host
    pub consolidation_efficiency: f64,
    pub risk: RiskLevel,
    pub risk_reasons: Vec<String>,
}

impl RemovalImpactResult {
    pub fn surviving_host_count(&self) -> usize {
        self.surviving_hosts.len()
    }

    pub fn impact_for(&self, hostname: &str) -> Option<&HostImpact> {
        self.surviving_hosts.iter().find(|h| h.hostname == hostname)
    }
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn series(host: &str, values: &[f64]) -> HostSeries {
        let samples = values
            .iter()
            .enumerate()
            .map(|(i, v)| (ts(i as i64 * 5), *v))
            .collect();
        let normalizer = UnitNormalizer::default();
        HostSeries::from_samples(host, "test.csv", samples, IntervalProfile::LastDay, &normalizer)
            .unwrap()
    }

    #[test]
    fn test_profile_periods() {
        let periods: Vec<u64> = IntervalProfile::all().iter().map(|p| p.period_seconds()).collect();
        assert_eq!(periods, vec![20, 300, 1800, 7200, 86400]);
        assert_eq!(IntervalProfile::LastDay.max_possible_ms(), 300_000.0);
    }

    #[test]
    fn test_profile_parsing() {
        assert_eq!("Real-Time".parse::<IntervalProfile>().unwrap(), IntervalProfile::RealTime);
        assert_eq!("last-week".parse::<IntervalProfile>().unwrap(), IntervalProfile::LastWeek);
        assert_eq!("Last Month".parse::<IntervalProfile>().unwrap(), IntervalProfile::LastMonth);
        assert_eq!("86400".parse::<IntervalProfile>().unwrap(), IntervalProfile::LastYear);
        assert!("fortnight".parse::<IntervalProfile>().is_err());
    }

    #[test]
    fn test_series_sorted_by_timestamp() {
        let samples = vec![(ts(10), 3.0), (ts(0), 1.0), (ts(5), 2.0)];
        let normalizer = UnitNormalizer::default();
        let profile = IntervalProfile::LastDay;
        let s = HostSeries::from_samples("esx01", "a.csv", samples, profile, &normalizer).unwrap();
        assert_eq!(s.raw_values(), vec![1.0, 2.0, 3.0]);
        assert!(s.samples.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn test_host_stats() {
        let stats = HostStats::from_values(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(stats.count, 4);
        assert!((stats.mean - 2.5).abs() < 1e-12);
        assert_eq!(stats.max, 4.0);
        assert_eq!(stats.min, 1.0);
        // sample std of 1..4
        assert!((stats.std_dev - 1.2909944487358056).abs() < 1e-12);

        let single = HostStats::from_values(&[7.0]);
        assert_eq!(single.std_dev, 0.0);
    }

    #[test]
    fn test_dataset_accessors() {
        let dataset = Dataset::new(
            IntervalProfile::LastDay,
            vec![series("b", &[1.0, 2.0]), series("a", &[3.0])],
        )
        .unwrap();

        assert_eq!(dataset.hostnames(), vec!["a", "b"]);
        assert_eq!(dataset.record_count(), 3);
        assert!((dataset.overall_mean_percent() - 2.0).abs() < 1e-12);
        assert_eq!(dataset.overall_max_percent(), 3.0);
        let (start, end) = dataset.time_range().unwrap();
        assert_eq!(start, ts(0));
        assert_eq!(end, ts(5));
    }

    #[test]
    fn test_dataset_rejects_mixed_profiles() {
        let other = series("b", &[1.0])
            .renormalize(IntervalProfile::RealTime, &UnitNormalizer::default())
            .unwrap();
        let result = Dataset::new(IntervalProfile::LastDay, vec![series("a", &[1.0]), other]);
        assert!(matches!(result, Err(AnalyzerError::ProfileMismatch { .. })));
    }

    #[test]
    fn test_dataset_rejects_duplicate_hostnames() {
        let mut second = series("a", &[1.0, 2.0]);
        second.source = "y.csv".to_string();
        let result = Dataset::new(IntervalProfile::LastDay, vec![series("a", &[3.0]), second]);
        match result {
            Err(AnalyzerError::DuplicateHost { hostname }) => assert_eq!(hostname, "a"),
            other => panic!("expected DuplicateHost, got {:?}", other),
        }
    }

    #[test]
    fn test_renormalize_replaces_profile() {
        let dataset =
            Dataset::new(IntervalProfile::LastDay, vec![series("a", &[1500.0, 1500.0])]).unwrap();
        let switched = dataset
            .renormalize(IntervalProfile::RealTime, &UnitNormalizer::default())
            .unwrap();

        assert_eq!(switched.profile(), IntervalProfile::RealTime);
        assert_eq!(dataset.profile(), IntervalProfile::LastDay);
        // 1500 ms of a 20 s period
        assert!((switched.host("a").unwrap().samples[0].percent - 7.5).abs() < 1e-9);
        assert!((dataset.host("a").unwrap().samples[0].percent - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_removal_plan_validation() {
        let dataset = Dataset::new(
            IntervalProfile::LastDay,
            vec![series("a", &[10.0]), series("b", &[20.0]), series("c", &[30.0])],
        )
        .unwrap();

        assert!(RemovalPlan::new(["a"]).validate(&dataset).is_ok());
        assert!(matches!(
            RemovalPlan::new(Vec::<String>::new()).validate(&dataset),
            Err(AnalyzerError::InvalidPlan(_))
        ));
        assert!(matches!(
            RemovalPlan::new(["a", "zz"]).validate(&dataset),
            Err(AnalyzerError::InvalidPlan(_))
        ));
        assert!(matches!(
            RemovalPlan::new(["a", "b", "c"]).validate(&dataset),
            Err(AnalyzerError::InvalidPlan(_))
        ));
    }

    #[test]
    fn test_removal_plan_dedup() {
        let plan = RemovalPlan::new(["a", "b", "a"]);
        assert_eq!(plan.hosts(), &["a".to_string(), "b".to_string()]);
    }
}
