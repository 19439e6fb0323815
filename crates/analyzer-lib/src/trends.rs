//! Trend analysis over normalized CPU Ready series
//!
//! Smooths each host with centered moving averages, fits a linear slope in
//! percent per hour, extracts peaks and builds hour-of-day and calendar-day
//! profiles.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{mean, Dataset, HostSeries, HostStats};

/// Moving average windows, each capped by the series length
const DEFAULT_MA_WINDOWS: [usize; 2] = [5, 10];

/// Capped windows smaller than this are not computed
const MIN_MA_WINDOW: usize = 3;

/// Slopes within this band (percent per hour) count as flat
const DEFAULT_STABLE_BAND: f64 = 0.01;

const DEFAULT_PEAK_COUNT: usize = 3;

/// Minimum samples in the dataset before hourly profiles are built
const HOURLY_MIN_SAMPLES: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendDirection {
    Rising,
    Falling,
    Stable,
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendDirection::Rising => write!(f, "rising"),
            TrendDirection::Falling => write!(f, "falling"),
            TrendDirection::Stable => write!(f, "stable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    pub timestamp: DateTime<Utc>,
    pub percent: f64,
}

/// CPU Ready statistics for one hour of the day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyBucket {
    pub hour: u32,
    pub samples: usize,
    pub mean: f64,
    /// `None` when the hour holds a single sample
    pub std_dev: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovingAverage {
    /// Requested window; the applied one is capped by the series length
    pub window: usize,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostTrend {
    pub hostname: String,
    pub moving_averages: Vec<MovingAverage>,
    pub slope_per_hour: f64,
    pub direction: TrendDirection,
    pub peaks: Vec<Peak>,
    pub hourly: Vec<HourlyBucket>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    pub hosts: Vec<HostTrend>,
    pub overall_mean: f64,
    pub overall_std_dev: f64,
    pub overall_max: f64,
    /// Coefficient of variation in percent
    pub volatility_percent: f64,
}

/// Mean CPU Ready of one calendar day; zero for days without samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMean {
    pub date: NaiveDate,
    pub samples: usize,
    pub mean: f64,
}

/// Monday-to-Sunday row of a calendar heat map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarWeek {
    /// Monday of this week
    pub start: NaiveDate,
    /// Daily means, Monday first; days outside the range are zero
    pub days: [f64; 7],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyProfile {
    pub hostname: String,
    pub days: Vec<DailyMean>,
    pub weeks: Vec<CalendarWeek>,
}

/// Per-host daily means over the whole date range of a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub hosts: Vec<DailyProfile>,
}

#[derive(Debug, Clone)]
pub struct TrendAnalyzer {
    pub ma_windows: Vec<usize>,
    pub stable_band: f64,
    pub peak_count: usize,
}

impl Default for TrendAnalyzer {
    fn default() -> Self {
        Self {
            ma_windows: DEFAULT_MA_WINDOWS.to_vec(),
            stable_band: DEFAULT_STABLE_BAND,
            peak_count: DEFAULT_PEAK_COUNT,
        }
    }
}

impl TrendAnalyzer {
    pub fn analyze(&self, dataset: &Dataset) -> TrendReport {
        let with_hourly = dataset.record_count() > HOURLY_MIN_SAMPLES;
        let hosts = dataset.hosts().map(|h| self.host_trend(h, with_hourly)).collect();

        let overall = HostStats::from_values(&dataset.all_percents());
        let volatility_percent = if overall.mean > 0.0 {
            overall.std_dev / overall.mean * 100.0
        } else {
            0.0
        };

        TrendReport {
            hosts,
            overall_mean: overall.mean,
            overall_std_dev: overall.std_dev,
            overall_max: overall.max,
            volatility_percent,
        }
    }

    pub fn host_trend(&self, series: &HostSeries, with_hourly: bool) -> HostTrend {
        let percents = series.percents();
        let slope_per_hour = slope_per_hour(series);
        let direction = if slope_per_hour > self.stable_band {
            TrendDirection::Rising
        } else if slope_per_hour < -self.stable_band {
            TrendDirection::Falling
        } else {
            TrendDirection::Stable
        };

        let moving_averages = self
            .ma_windows
            .iter()
            .filter(|w| (**w).min(percents.len()) >= MIN_MA_WINDOW)
            .map(|&window| MovingAverage {
                window,
                values: centered_moving_average(&percents, window),
            })
            .collect();

        HostTrend {
            hostname: series.hostname.clone(),
            moving_averages,
            slope_per_hour,
            direction,
            peaks: top_peaks(series, self.peak_count),
            hourly: if with_hourly { hourly_profile(series) } else { Vec::new() },
        }
    }
}

/// Daily means of every host, with missing days filled as zero
///
/// Returns `None` for a dataset without timestamps.
pub fn daily_profile(dataset: &Dataset) -> Option<DailyReport> {
    let (first, last) = dataset.time_range()?;
    let (start, end) = (first.date_naive(), last.date_naive());

    let hosts = dataset
        .hosts()
        .map(|series| {
            let mut by_date: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
            for s in &series.samples {
                by_date.entry(s.timestamp.date_naive()).or_default().push(s.percent);
            }

            let days: Vec<DailyMean> = start
                .iter_days()
                .take_while(|d| *d <= end)
                .map(|date| {
                    let values = by_date.get(&date).map(Vec::as_slice).unwrap_or_default();
                    DailyMean {
                        date,
                        samples: values.len(),
                        mean: mean(values),
                    }
                })
                .collect();

            DailyProfile {
                hostname: series.hostname.clone(),
                weeks: calendar_weeks(&days),
                days,
            }
        })
        .collect();

    Some(DailyReport { start, end, hosts })
}

fn calendar_weeks(days: &[DailyMean]) -> Vec<CalendarWeek> {
    let mut weeks: Vec<CalendarWeek> = Vec::new();
    for day in days {
        let column = day.date.weekday().num_days_from_monday() as usize;
        let monday = day.date - Duration::days(column as i64);
        match weeks.last_mut() {
            Some(week) if week.start == monday => week.days[column] = day.mean,
            _ => {
                let mut values = [0.0; 7];
                values[column] = day.mean;
                weeks.push(CalendarWeek {
                    start: monday,
                    days: values,
                });
            }
        }
    }
    weeks
}

/// Centered rolling mean; partial windows at the edges use what is available
pub fn centered_moving_average(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    let window = window.min(n).max(1);
    let offset = (window - 1) / 2;

    (0..n)
        .map(|i| {
            let end = (i + 1 + offset).min(n);
            let start = (i + 1 + offset).saturating_sub(window);
            mean(&values[start..end])
        })
        .collect()
}

/// Least-squares slope of percent against elapsed hours
fn slope_per_hour(series: &HostSeries) -> f64 {
    let Some(first) = series.samples.first() else {
        return 0.0;
    };
    let points: Vec<(f64, f64)> = series
        .samples
        .iter()
        .map(|s| {
            let hours = (s.timestamp - first.timestamp).num_seconds() as f64 / 3600.0;
            (hours, s.percent)
        })
        .collect();

    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (x, y) in &points {
        numerator += (x - mean_x) * (y - mean_y);
        denominator += (x - mean_x).powi(2);
    }

    if denominator.abs() < f64::EPSILON {
        return 0.0;
    }
    numerator / denominator
}

fn top_peaks(series: &HostSeries, count: usize) -> Vec<Peak> {
    let mut peaks: Vec<Peak> = series
        .samples
        .iter()
        .map(|s| Peak {
            timestamp: s.timestamp,
            percent: s.percent,
        })
        .collect();
    // Stable sort keeps the earliest of equal peaks first
    peaks.sort_by(|a, b| b.percent.total_cmp(&a.percent));
    peaks.truncate(count);
    peaks
}

fn hourly_profile(series: &HostSeries) -> Vec<HourlyBucket> {
    let mut by_hour: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for s in &series.samples {
        by_hour.entry(s.timestamp.hour()).or_default().push(s.percent);
    }

    by_hour
        .into_iter()
        .map(|(hour, values)| {
            let stats = HostStats::from_values(&values);
            HourlyBucket {
                hour,
                samples: values.len(),
                mean: stats.mean,
                std_dev: (values.len() > 1).then_some(stats.std_dev),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IntervalProfile;
    use crate::normalizer::UnitNormalizer;
    use chrono::{Duration, TimeZone};

    fn series(host: &str, step_minutes: i64, raw: &[f64]) -> HostSeries {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let samples = raw
            .iter()
            .enumerate()
            .map(|(i, v)| (start + Duration::minutes(step_minutes * i as i64), *v))
            .collect();
        let normalizer = UnitNormalizer::new();
        HostSeries::from_samples(host, "t.csv", samples, IntervalProfile::LastDay, &normalizer)
            .unwrap()
    }

    #[test]
    fn test_moving_average_centered() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        // window 3: edges average the two available values
        assert_eq!(centered_moving_average(&values, 3), vec![1.5, 2.0, 3.0, 4.0, 4.5]);
        // window capped at series length
        let capped = centered_moving_average(&values, 10);
        assert_eq!(capped.len(), 5);
        assert!((capped[2] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_moving_average_even_window() {
        let values = [2.0, 4.0, 6.0, 8.0];
        // window 4 covers [i-2, i+1]
        let ma = centered_moving_average(&values, 4);
        assert!((ma[0] - 3.0).abs() < 1e-12);
        assert!((ma[2] - 5.0).abs() < 1e-12);
        assert!((ma[3] - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_slope_and_direction() {
        let analyzer = TrendAnalyzer::default();

        // +1% per sample, one sample per hour
        let rising = analyzer.host_trend(&series("a", 60, &[1.0, 2.0, 3.0, 4.0]), false);
        assert!((rising.slope_per_hour - 1.0).abs() < 1e-9);
        assert_eq!(rising.direction, TrendDirection::Rising);

        let falling = analyzer.host_trend(&series("b", 60, &[4.0, 3.0, 2.0, 1.0]), false);
        assert_eq!(falling.direction, TrendDirection::Falling);

        let flat = analyzer.host_trend(&series("c", 60, &[2.0, 2.0, 2.0]), false);
        assert_eq!(flat.direction, TrendDirection::Stable);
        assert_eq!(flat.slope_per_hour, 0.0);

        let single = analyzer.host_trend(&series("d", 60, &[2.0]), false);
        assert_eq!(single.slope_per_hour, 0.0);
    }

    #[test]
    fn test_top_peaks() {
        let a = series("a", 5, &[1.0, 9.0, 3.0, 7.0, 9.0, 2.0]);
        let trend = TrendAnalyzer::default().host_trend(&a, false);
        let values: Vec<f64> = trend.peaks.iter().map(|p| p.percent).collect();
        assert_eq!(values, vec![9.0, 9.0, 7.0]);
        assert!(trend.peaks[0].timestamp < trend.peaks[1].timestamp);
    }

    #[test]
    fn test_hourly_profile_threshold() {
        let small =
            Dataset::new(IntervalProfile::LastDay, vec![series("a", 60, &[1.0; 12])]).unwrap();
        let report = TrendAnalyzer::default().analyze(&small);
        assert!(report.hosts[0].hourly.is_empty());

        // 48 samples at 30 minutes: two per hour over one day
        let raw: Vec<f64> = (0..48).map(|i| if i % 2 == 0 { 2.0 } else { 4.0 }).collect();
        let large = Dataset::new(IntervalProfile::LastDay, vec![series("a", 30, &raw)]).unwrap();
        let report = TrendAnalyzer::default().analyze(&large);
        let hourly = &report.hosts[0].hourly;
        assert_eq!(hourly.len(), 24);
        assert_eq!(hourly[0].hour, 0);
        assert_eq!(hourly[0].samples, 2);
        assert!((hourly[0].mean - 3.0).abs() < 1e-12);
        assert!(hourly[0].std_dev.is_some());
    }

    #[test]
    fn test_dataset_volatility() {
        let dataset = Dataset::new(
            IntervalProfile::LastDay,
            vec![series("a", 5, &[2.0, 4.0]), series("b", 5, &[6.0, 8.0])],
        )
        .unwrap();
        let report = TrendAnalyzer::default().analyze(&dataset);
        assert!((report.overall_mean - 5.0).abs() < 1e-12);
        assert_eq!(report.overall_max, 8.0);
        let expected_std = (20.0f64 / 3.0).sqrt();
        assert!((report.overall_std_dev - expected_std).abs() < 1e-12);
        assert!((report.volatility_percent - expected_std / 5.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_moving_average_windows() {
        let analyzer = TrendAnalyzer::default();

        let long = analyzer.host_trend(&series("a", 5, &[1.0; 12]), false);
        let windows: Vec<usize> = long.moving_averages.iter().map(|m| m.window).collect();
        assert_eq!(windows, vec![5, 10]);
        assert!(long.moving_averages.iter().all(|m| m.values.len() == 12));

        // both windows cap to 4 samples, still computed
        let short = analyzer.host_trend(&series("b", 5, &[1.0, 2.0, 3.0, 4.0]), false);
        assert_eq!(short.moving_averages.len(), 2);

        // capped below three samples, nothing to smooth
        let tiny = analyzer.host_trend(&series("c", 5, &[1.0, 2.0]), false);
        assert!(tiny.moving_averages.is_empty());
    }

    #[test]
    fn test_daily_profile_fills_missing_days() {
        let at = |day: u32, hour: u32| Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap();
        let normalizer = UnitNormalizer::new();
        let a = HostSeries::from_samples(
            "a",
            "t.csv",
            vec![(at(1, 1), 2.0), (at(1, 13), 4.0), (at(6, 9), 5.0)],
            IntervalProfile::LastDay,
            &normalizer,
        )
        .unwrap();
        let b = HostSeries::from_samples(
            "b",
            "t.csv",
            vec![(at(3, 12), 7.0)],
            IntervalProfile::LastDay,
            &normalizer,
        )
        .unwrap();
        let dataset = Dataset::new(IntervalProfile::LastDay, vec![a, b]).unwrap();

        let report = daily_profile(&dataset).unwrap();
        assert_eq!(report.start, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(report.end, NaiveDate::from_ymd_opt(2024, 5, 6).unwrap());

        let a = &report.hosts[0];
        assert_eq!(a.days.len(), 6);
        assert!((a.days[0].mean - 3.0).abs() < 1e-12);
        assert_eq!(a.days[0].samples, 2);
        assert_eq!(a.days[1].mean, 0.0);
        assert_eq!(a.days[1].samples, 0);

        // 2024-05-01 is a Wednesday, 2024-05-06 the following Monday
        assert_eq!(a.weeks.len(), 2);
        assert_eq!(a.weeks[0].start, NaiveDate::from_ymd_opt(2024, 4, 29).unwrap());
        assert_eq!(a.weeks[0].days, [0.0, 0.0, 3.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(a.weeks[1].days, [5.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);

        // a host with one day of data still spans the dataset's range
        let b = &report.hosts[1];
        assert_eq!(b.days.len(), 6);
        assert_eq!(b.weeks[0].days[4], 7.0);
    }
}
