//! Collection interval detection
//!
//! vCenter exports do not state their rollup level, so the profile is
//! inferred from the file name, the covered time span and the spacing
//! between samples.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::import::{find_time_column, parse_timestamp, RawTable};
use crate::models::IntervalProfile;

/// Filename keywords, most specific profile first
const FILENAME_KEYWORDS: &[(IntervalProfile, &[&str])] = &[
    (IntervalProfile::RealTime, &["real", "realtime", "real-time", "live"]),
    (IntervalProfile::LastWeek, &["week", "weekly", "7day", "1week"]),
    (IntervalProfile::LastMonth, &["month", "monthly", "30day", "1month"]),
    (IntervalProfile::LastYear, &["year", "yearly", "annual", "365day", "1year"]),
    (IntervalProfile::LastDay, &["day", "daily", "24h", "1day"]),
];

/// Record counts of the standard vCenter chart exports
const KNOWN_EXPORTS: &[(usize, &str, IntervalProfile)] = &[
    (180, "realtime", IntervalProfile::RealTime),
    (180, "real", IntervalProfile::RealTime),
    (288, "day", IntervalProfile::LastDay),
    (288, "daily", IntervalProfile::LastDay),
    (336, "week", IntervalProfile::LastWeek),
    (336, "weekly", IntervalProfile::LastWeek),
    (360, "month", IntervalProfile::LastMonth),
    (360, "monthly", IntervalProfile::LastMonth),
];

const KNOWN_EXPORT_TOLERANCE: usize = 20;

/// Spacing assumed when a table holds a single timestamp
const DEFAULT_SPACING_SECS: f64 = 300.0;

/// Why a profile was chosen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetectionReason {
    NoTimestamps,
    Filename { keyword: String },
    TimeSpan { hours: f64 },
    SpacingCorrected { from: IntervalProfile, deviation: f64 },
    KnownExport { records: usize, keyword: String },
}

impl fmt::Display for DetectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionReason::NoTimestamps => write!(f, "no usable timestamps, default"),
            DetectionReason::Filename { keyword } => write!(f, "filename contains '{}'", keyword),
            DetectionReason::TimeSpan { hours } => write!(f, "time span of {:.1} hours", hours),
            DetectionReason::SpacingCorrected { from, deviation } => write!(
                f,
                "sample spacing contradicts {} (deviation {:.2})",
                from, deviation
            ),
            DetectionReason::KnownExport { records, keyword } => write!(
                f,
                "{} records with filename keyword '{}'",
                records, keyword
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalDetection {
    pub profile: IntervalProfile,
    pub reason: DetectionReason,
    /// Mean seconds between consecutive samples
    pub average_spacing_secs: Option<f64>,
    pub records: usize,
}

/// Infer the interval profile of one exported table
pub fn detect_interval(table: &RawTable, filename: &str) -> IntervalDetection {
    let records = table.len();
    let fallback = IntervalDetection {
        profile: IntervalProfile::default(),
        reason: DetectionReason::NoTimestamps,
        average_spacing_secs: None,
        records,
    };

    let Some(time_col) = find_time_column(&table.headers) else {
        return fallback;
    };
    let mut timestamps: Vec<_> = (0..records)
        .filter_map(|row| table.cell(row, time_col).and_then(parse_timestamp))
        .collect();
    timestamps.sort();
    let (Some(first), Some(last)) = (timestamps.first(), timestamps.last()) else {
        return fallback;
    };

    let span_secs = (*last - *first).num_milliseconds() as f64 / 1000.0;
    let spacing = if timestamps.len() > 1 {
        span_secs / (timestamps.len() - 1) as f64
    } else {
        DEFAULT_SPACING_SECS
    };

    let name = filename.to_lowercase();
    let (mut profile, mut reason) = match filename_hint(&name) {
        Some((profile, keyword)) => (
            profile,
            DetectionReason::Filename {
                keyword: keyword.to_string(),
            },
        ),
        None => (
            profile_for_span(span_secs),
            DetectionReason::TimeSpan {
                hours: span_secs / 3600.0,
            },
        ),
    };

    let ratio = spacing / profile.period_seconds() as f64;
    if !(0.3..=3.0).contains(&ratio) {
        let (best, deviation) = closest_profile(spacing);
        debug!(
            detected = %profile,
            spacing,
            ratio,
            best = %best,
            deviation,
            "Sample spacing does not match detected interval"
        );
        if deviation < 2.0 {
            reason = DetectionReason::SpacingCorrected { from: profile, deviation };
            profile = best;
        }
    }

    if let Some((known, keyword)) = known_export(records, &name) {
        profile = known;
        reason = DetectionReason::KnownExport {
            records,
            keyword: keyword.to_string(),
        };
    }

    IntervalDetection {
        profile,
        reason,
        average_spacing_secs: Some(spacing),
        records,
    }
}

/// Majority profile across several detections; ties go to the earliest
pub fn resolve_profiles(detected: &[IntervalProfile]) -> Option<IntervalProfile> {
    let mut best: Option<(IntervalProfile, usize)> = None;
    for profile in detected {
        let count = detected.iter().filter(|p| *p == profile).count();
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((*profile, count));
        }
    }
    best.map(|(p, _)| p)
}

fn filename_hint(name: &str) -> Option<(IntervalProfile, &'static str)> {
    FILENAME_KEYWORDS.iter().find_map(|(profile, keywords)| {
        keywords
            .iter()
            .find(|k| name.contains(*k))
            .map(|k| (*profile, *k))
    })
}

fn profile_for_span(span_secs: f64) -> IntervalProfile {
    let hours = span_secs / 3600.0;
    let days = hours / 24.0;
    if hours <= 1.5 {
        IntervalProfile::RealTime
    } else if days <= 1.5 {
        IntervalProfile::LastDay
    } else if days <= 8.0 {
        IntervalProfile::LastWeek
    } else if days <= 35.0 {
        IntervalProfile::LastMonth
    } else {
        IntervalProfile::LastYear
    }
}

/// Profile whose period best matches the spacing, with |1 - spacing/period|
fn closest_profile(spacing: f64) -> (IntervalProfile, f64) {
    IntervalProfile::all()
        .into_iter()
        .map(|p| (p, (1.0 - spacing / p.period_seconds() as f64).abs()))
        .fold((IntervalProfile::default(), f64::INFINITY), |best, candidate| {
            if candidate.1 < best.1 {
                candidate
            } else {
                best
            }
        })
}

fn known_export(records: usize, name: &str) -> Option<(IntervalProfile, &'static str)> {
    KNOWN_EXPORTS
        .iter()
        .find(|(count, keyword, _)| {
            records.abs_diff(*count) <= KNOWN_EXPORT_TOLERANCE && name.contains(keyword)
        })
        .map(|(_, keyword, profile)| (*profile, *keyword))
}
