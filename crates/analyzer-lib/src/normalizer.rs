//! CPU Ready unit normalization
//!
//! vCenter exports the CPU Ready counter in units that depend on the
//! collection path: milliseconds summed over the sampling period, already
//! a percentage, or something mis-scaled in between. The normalizer picks a
//! conversion once per column from the magnitude of a leading sample window,
//! applies it uniformly, and then sanity-checks the result.
//!
//! The heuristic is best effort. Its thresholds are empirical and exposed
//! through [`NormalizerConfig`] so they can be tuned against real exports.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{AnalyzerError, Result};
use crate::models::{mean, IntervalProfile};

/// Number of leading values inspected to choose a conversion
pub const DEFAULT_SAMPLE_WINDOW: usize = 20;

/// Mean above which a converted column is considered implausible
pub const DEFAULT_SANITY_MEAN_CEILING: f64 = 50.0;

/// Tunable constants of the conversion heuristic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Leading values used for the branch decision
    pub sample_window: usize,
    /// Mean and max must not exceed this for the data to count as a percentage
    pub direct_ceiling: f64,
    /// Value a "small" percentage sample stays under
    pub direct_low_value: f64,
    /// Fraction of window values that must be small for the direct branch
    pub direct_low_fraction: f64,
    /// Multiple of the period maximum above which values are microseconds
    pub microseconds_factor: f64,
    /// Per-second divisor for cumulative daily rollups
    pub daily_cumulative_scale: f64,
    /// Periods at or above this many seconds use the daily cumulative rule
    pub daily_period_seconds: u64,
    /// Means above this are plain milliseconds
    pub milliseconds_floor: f64,
    /// Means above this are centipercent
    pub centipercent_floor: f64,
    /// Means above this are permille
    pub permille_floor: f64,
    /// Converted column mean that triggers the rescale pass
    pub sanity_mean_ceiling: f64,
    /// Divisors tried on the raw values, in order, when the mean is implausible
    pub rescale_divisors: Vec<u64>,
    /// Lowest acceptable mean for a rescaled column
    pub rescale_accept_min: f64,
    /// Last-resort divisor applied to the converted column
    pub emergency_divisor: f64,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            sample_window: DEFAULT_SAMPLE_WINDOW,
            direct_ceiling: 100.0,
            direct_low_value: 50.0,
            direct_low_fraction: 0.8,
            microseconds_factor: 10.0,
            daily_cumulative_scale: 100.0,
            daily_period_seconds: 86_400,
            milliseconds_floor: 1000.0,
            centipercent_floor: 100.0,
            permille_floor: 10.0,
            sanity_mean_ceiling: DEFAULT_SANITY_MEAN_CEILING,
            rescale_divisors: vec![1_000, 10_000, 100_000],
            rescale_accept_min: 0.001,
            emergency_divisor: 100.0,
        }
    }
}

impl NormalizerConfig {
    /// Reject settings that would divide by zero or produce NaN percentages
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("microseconds_factor", self.microseconds_factor),
            ("daily_cumulative_scale", self.daily_cumulative_scale),
            ("sanity_mean_ceiling", self.sanity_mean_ceiling),
            ("emergency_divisor", self.emergency_divisor),
        ];
        if let Some((name, value)) = positive.iter().find(|(_, v)| !(v.is_finite() && *v > 0.0)) {
            return Err(AnalyzerError::InvalidConfig(format!(
                "{} must be a positive number, got {}",
                name, value
            )));
        }
        if self.rescale_divisors.contains(&0) {
            return Err(AnalyzerError::InvalidConfig(
                "rescale_divisors must not contain 0".to_string(),
            ));
        }
        if !(self.rescale_accept_min >= 0.0 && self.rescale_accept_min < self.sanity_mean_ceiling) {
            return Err(AnalyzerError::InvalidConfig(format!(
                "rescale_accept_min {} must lie in [0, sanity_mean_ceiling)",
                self.rescale_accept_min
            )));
        }
        Ok(())
    }
}

/// Which heuristic branch produced a column of percentages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ConversionMethod {
    /// Values already look like percentages
    Direct,
    Microseconds,
    DailyCumulative,
    /// Milliseconds above the theoretical per-period maximum
    MillisecondsHigh,
    Milliseconds,
    Centipercent,
    Permille,
    /// Small values taken as percentages without the direct-shape check
    DirectLow,
    /// Raw values divided by `divisor` after an implausible first conversion
    Rescaled { divisor: u64 },
    /// Converted values divided by the emergency divisor
    EmergencyFix,
}

impl ConversionMethod {
    /// Convert one value with this branch's formula
    ///
    /// For [`ConversionMethod::EmergencyFix`] the input is the percentage
    /// produced by the original branch, not the raw counter value.
    pub fn apply(&self, raw: f64, profile: IntervalProfile, config: &NormalizerConfig) -> f64 {
        let max_ms = profile.max_possible_ms();
        match self {
            ConversionMethod::Direct | ConversionMethod::DirectLow => raw,
            ConversionMethod::Microseconds => raw / (max_ms * config.microseconds_factor) * 100.0,
            ConversionMethod::DailyCumulative => {
                raw / (profile.period_seconds() as f64 * config.daily_cumulative_scale) * 100.0
            }
            ConversionMethod::MillisecondsHigh | ConversionMethod::Milliseconds => {
                raw / max_ms * 100.0
            }
            ConversionMethod::Centipercent => raw / 100.0,
            ConversionMethod::Permille => raw / 10.0,
            ConversionMethod::Rescaled { divisor } => raw / *divisor as f64,
            ConversionMethod::EmergencyFix => raw / config.emergency_divisor,
        }
    }

    /// Whether the sanity pass had to replace the first conversion
    pub fn is_recovery(&self) -> bool {
        matches!(self, ConversionMethod::Rescaled { .. } | ConversionMethod::EmergencyFix)
    }
}

impl fmt::Display for ConversionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionMethod::Direct => write!(f, "direct"),
            ConversionMethod::Microseconds => write!(f, "microseconds"),
            ConversionMethod::DailyCumulative => write!(f, "daily_cumulative"),
            ConversionMethod::MillisecondsHigh => write!(f, "milliseconds_high"),
            ConversionMethod::Milliseconds => write!(f, "milliseconds"),
            ConversionMethod::Centipercent => write!(f, "centipercent"),
            ConversionMethod::Permille => write!(f, "permille"),
            ConversionMethod::DirectLow => write!(f, "direct_low"),
            ConversionMethod::Rescaled { divisor } => write!(f, "rescaled_{}", divisor),
            ConversionMethod::EmergencyFix => write!(f, "emergency_fix"),
        }
    }
}

impl FromStr for ConversionMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "direct" => Ok(ConversionMethod::Direct),
            "microseconds" => Ok(ConversionMethod::Microseconds),
            "daily_cumulative" => Ok(ConversionMethod::DailyCumulative),
            "milliseconds_high" => Ok(ConversionMethod::MillisecondsHigh),
            "milliseconds" => Ok(ConversionMethod::Milliseconds),
            "centipercent" => Ok(ConversionMethod::Centipercent),
            "permille" => Ok(ConversionMethod::Permille),
            "direct_low" => Ok(ConversionMethod::DirectLow),
            "emergency_fix" => Ok(ConversionMethod::EmergencyFix),
            other => other
                .strip_prefix("rescaled_")
                .and_then(|d| d.parse::<u64>().ok())
                .map(|divisor| ConversionMethod::Rescaled { divisor })
                .ok_or_else(|| format!("unknown conversion method '{}'", other)),
        }
    }
}

impl From<ConversionMethod> for String {
    fn from(method: ConversionMethod) -> Self {
        method.to_string()
    }
}

impl TryFrom<String> for ConversionMethod {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

/// Output of a column normalization
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    /// Percentages in [0, 100], same length and order as the input
    pub percents: Vec<f64>,
    pub method: ConversionMethod,
    /// Column mean before the final clamp
    pub pre_clamp_mean: f64,
    /// Number of values pulled into [0, 100] by the clamp
    pub clamped: usize,
}

/// Summary of the leading window used for the branch decision
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    pub mean: f64,
    pub max: f64,
    pub low_fraction: f64,
}

/// Converts raw CPU Ready columns into percentages
#[derive(Debug, Clone, Default)]
pub struct UnitNormalizer {
    config: NormalizerConfig,
}

impl UnitNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Normalize a column of raw values for the given interval
    ///
    /// # Errors
    /// * `EmptySeries` if `raw` is empty
    /// * `InvalidInput` if any value is negative or not finite
    pub fn normalize(&self, raw: &[f64], profile: IntervalProfile) -> Result<Normalized> {
        validate(raw)?;

        let window = self.window_stats(raw);
        let first = self.select_method(&window, profile);
        let mut method = first;
        let mut percents: Vec<f64> = raw
            .iter()
            .map(|v| first.apply(*v, profile, &self.config))
            .collect();

        let converted_mean = mean(&percents);
        debug!(
            method = %first,
            window_mean = window.mean,
            window_max = window.max,
            converted_mean,
            period_seconds = profile.period_seconds(),
            "Selected CPU Ready conversion"
        );

        if converted_mean > self.config.sanity_mean_ceiling {
            match self.rescale(raw) {
                Some((divisor, rescaled)) => {
                    warn!(
                        original_method = %first,
                        original_mean = converted_mean,
                        divisor,
                        "Implausible CPU Ready mean, rescaled raw values"
                    );
                    method = ConversionMethod::Rescaled { divisor };
                    percents = rescaled;
                }
                None => {
                    warn!(
                        original_method = %first,
                        original_mean = converted_mean,
                        divisor = self.config.emergency_divisor,
                        "No rescale produced a plausible mean, applying emergency fix"
                    );
                    method = ConversionMethod::EmergencyFix;
                    for p in percents.iter_mut() {
                        *p = method.apply(*p, profile, &self.config);
                    }
                }
            }
        }

        let pre_clamp_mean = mean(&percents);
        let mut clamped = 0;
        for p in percents.iter_mut() {
            let bounded = p.clamp(0.0, 100.0);
            if bounded != *p {
                clamped += 1;
                *p = bounded;
            }
        }

        Ok(Normalized {
            percents,
            method,
            pre_clamp_mean,
            clamped,
        })
    }

    /// Statistics of the leading sample window
    pub fn window_stats(&self, raw: &[f64]) -> WindowStats {
        let window = &raw[..raw.len().min(self.config.sample_window.max(1))];
        let max = window.iter().copied().fold(0.0, f64::max);
        let low = window.iter().filter(|v| **v <= self.config.direct_low_value).count();
        let low_fraction = if window.is_empty() {
            0.0
        } else {
            low as f64 / window.len() as f64
        };

        WindowStats {
            mean: mean(window),
            max,
            low_fraction,
        }
    }

    /// Decide the conversion branch; first matching rule wins
    pub fn select_method(
        &self,
        window: &WindowStats,
        profile: IntervalProfile,
    ) -> ConversionMethod {
        let c = &self.config;

        if window.mean <= c.direct_ceiling
            && window.max <= c.direct_ceiling
            && window.low_fraction >= c.direct_low_fraction
        {
            return ConversionMethod::Direct;
        }

        let max_ms = profile.max_possible_ms();
        if window.mean > max_ms * c.microseconds_factor {
            ConversionMethod::Microseconds
        } else if window.mean > max_ms {
            if profile.period_seconds() >= c.daily_period_seconds {
                ConversionMethod::DailyCumulative
            } else {
                ConversionMethod::MillisecondsHigh
            }
        } else if window.mean > c.milliseconds_floor {
            ConversionMethod::Milliseconds
        } else if window.mean > c.centipercent_floor {
            ConversionMethod::Centipercent
        } else if window.mean > c.permille_floor {
            ConversionMethod::Permille
        } else {
            ConversionMethod::DirectLow
        }
    }

    /// First divisor whose rescaled mean is plausible
    fn rescale(&self, raw: &[f64]) -> Option<(u64, Vec<f64>)> {
        self.config.rescale_divisors.iter().find_map(|&divisor| {
            let values: Vec<f64> = raw.iter().map(|v| v / divisor as f64).collect();
            let m = mean(&values);
            (m >= self.config.rescale_accept_min && m <= self.config.sanity_mean_ceiling)
                .then_some((divisor, values))
        })
    }
}

fn validate(raw: &[f64]) -> Result<()> {
    if raw.is_empty() {
        return Err(AnalyzerError::EmptySeries);
    }
    if let Some((index, value)) = raw
        .iter()
        .enumerate()
        .find(|(_, v)| !v.is_finite() || **v < 0.0)
    {
        return Err(AnalyzerError::InvalidInput { index, value: *value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> UnitNormalizer {
        UnitNormalizer::new()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_last_day_milliseconds() {
        let result = normalizer().normalize(&[1500.0], IntervalProfile::LastDay).unwrap();
        assert_eq!(result.method, ConversionMethod::Milliseconds);
        assert_close(result.percents[0], 0.5);
    }

    #[test]
    fn test_realtime_small_values_pass_through() {
        let raw = [0.2, 0.5, 1.0, 0.75, 0.0];
        let result = normalizer().normalize(&raw, IntervalProfile::RealTime).unwrap();
        assert_eq!(result.method, ConversionMethod::Direct);
        assert_eq!(result.percents, raw.to_vec());
    }

    #[test]
    fn test_centipercent() {
        let result = normalizer().normalize(&[250.0, 300.0], IntervalProfile::LastDay).unwrap();
        assert_eq!(result.method, ConversionMethod::Centipercent);
        assert_close(result.percents[0], 2.5);
        assert_close(result.percents[1], 3.0);
    }

    #[test]
    fn test_permille_when_values_not_percent_shaped() {
        // mean under 100 but nothing under 50, so not a direct percentage
        let result = normalizer()
            .normalize(&[60.0, 70.0, 80.0, 90.0], IntervalProfile::LastDay)
            .unwrap();
        assert_eq!(result.method, ConversionMethod::Permille);
        assert_close(result.percents[3], 9.0);
    }

    #[test]
    fn test_direct_low_clamps_outlier() {
        let mut raw = vec![0.0; 19];
        raw.insert(0, 101.0);
        let result = normalizer().normalize(&raw, IntervalProfile::LastDay).unwrap();
        assert_eq!(result.method, ConversionMethod::DirectLow);
        assert_eq!(result.percents[0], 100.0);
        assert_eq!(result.clamped, 1);
    }

    #[test]
    fn test_microseconds_branch_selected_and_recovered() {
        let n = normalizer();
        let raw = [4_000_000.0, 4_000_000.0];
        let window = n.window_stats(&raw);
        assert_eq!(
            n.select_method(&window, IntervalProfile::LastDay),
            ConversionMethod::Microseconds
        );

        // 133% after the microseconds formula, so the sanity pass rescales
        let result = n.normalize(&raw, IntervalProfile::LastDay).unwrap();
        assert_eq!(result.method, ConversionMethod::Rescaled { divisor: 100_000 });
        assert_close(result.percents[0], 40.0);
    }

    #[test]
    fn test_milliseconds_high_rescaled() {
        let result = normalizer()
            .normalize(&[400_000.0, 400_000.0], IntervalProfile::LastDay)
            .unwrap();
        assert_eq!(result.method, ConversionMethod::Rescaled { divisor: 10_000 });
        assert_close(result.percents[0], 40.0);
    }

    #[test]
    fn test_rescale_below_accept_min_is_skipped() {
        // 1e9 leaves a mean of 0.0004, under the 0.001 floor; 1e4 gives 40%
        let n = UnitNormalizer::with_config(NormalizerConfig {
            rescale_divisors: vec![1_000_000_000, 10_000],
            ..NormalizerConfig::default()
        });
        let result = n.normalize(&[400_000.0, 400_000.0], IntervalProfile::LastDay).unwrap();
        assert_eq!(result.method, ConversionMethod::Rescaled { divisor: 10_000 });
        assert_close(result.percents[0], 40.0);

        let only_tiny = UnitNormalizer::with_config(NormalizerConfig {
            rescale_divisors: vec![1_000_000_000],
            ..NormalizerConfig::default()
        });
        let result = only_tiny
            .normalize(&[400_000.0, 400_000.0], IntervalProfile::LastDay)
            .unwrap();
        assert_eq!(result.method, ConversionMethod::EmergencyFix);
    }

    #[test]
    fn test_config_validation() {
        assert!(NormalizerConfig::default().validate().is_ok());

        let zero_divisor = NormalizerConfig {
            emergency_divisor: 0.0,
            ..NormalizerConfig::default()
        };
        assert!(matches!(zero_divisor.validate(), Err(AnalyzerError::InvalidConfig(_))));

        let zero_rescale = NormalizerConfig {
            rescale_divisors: vec![1_000, 0],
            ..NormalizerConfig::default()
        };
        assert!(matches!(zero_rescale.validate(), Err(AnalyzerError::InvalidConfig(_))));

        let inverted = NormalizerConfig {
            rescale_accept_min: 80.0,
            ..NormalizerConfig::default()
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_daily_cumulative_emergency_fix() {
        let n = normalizer();
        let raw = [100_000_000.0; 3];
        let window = n.window_stats(&raw);
        assert_eq!(
            n.select_method(&window, IntervalProfile::LastYear),
            ConversionMethod::DailyCumulative
        );

        // no divisor brings 1e8 into [0.001, 50]
        let result = n.normalize(&raw, IntervalProfile::LastYear).unwrap();
        assert_eq!(result.method, ConversionMethod::EmergencyFix);
        let expected = 100_000_000.0 / (86_400.0 * 100.0) * 100.0 / 100.0;
        assert_close(result.percents[0], expected);
    }

    #[test]
    fn test_branch_decided_from_leading_window() {
        // first 20 values are small percentages, the tail is large
        let mut raw = vec![1.0; 20];
        raw.extend(std::iter::repeat(40.0).take(5));
        let result = normalizer().normalize(&raw, IntervalProfile::LastDay).unwrap();
        assert_eq!(result.method, ConversionMethod::Direct);
        assert_eq!(result.percents[24], 40.0);
    }

    #[test]
    fn test_rejects_negative_and_non_finite() {
        let n = normalizer();
        assert!(matches!(
            n.normalize(&[1.0, -2.0], IntervalProfile::LastDay),
            Err(AnalyzerError::InvalidInput { index: 1, .. })
        ));
        assert!(matches!(
            n.normalize(&[f64::NAN], IntervalProfile::LastDay),
            Err(AnalyzerError::InvalidInput { index: 0, .. })
        ));
        assert!(matches!(
            n.normalize(&[], IntervalProfile::LastDay),
            Err(AnalyzerError::EmptySeries)
        ));
    }

    #[test]
    fn test_output_always_within_bounds() {
        let n = normalizer();
        let columns: [&[f64]; 5] = [
            &[0.0, 5.0, 250.0],
            &[5_000.0, 900_000.0],
            &[1e12, 3.0],
            &[45.0, 99.0, 100.0],
            &[0.001],
        ];
        for profile in IntervalProfile::all() {
            for raw in columns {
                let result = n.normalize(raw, profile).unwrap();
                assert_eq!(result.percents.len(), raw.len());
                assert!(result.percents.iter().all(|p| (0.0..=100.0).contains(p)));
            }
        }
    }

    #[test]
    fn test_milliseconds_formula_bounded_and_monotonic() {
        let config = NormalizerConfig::default();
        for profile in IntervalProfile::all() {
            let max_ms = profile.max_possible_ms();
            let mut previous = -1.0;
            for step in 0..=100 {
                let v = max_ms * step as f64 / 100.0;
                let p = ConversionMethod::Milliseconds.apply(v, profile, &config);
                assert!((0.0..=100.0 + 1e-9).contains(&p));
                assert!(p > previous);
                previous = p;
            }
        }
    }

    #[test]
    fn test_normalizing_output_is_idempotent() {
        let n = normalizer();
        let raw: Vec<f64> = (0..48).map(|i| 600.0 + (i % 12) as f64 * 250.0).collect();
        let first = n.normalize(&raw, IntervalProfile::LastDay).unwrap();
        assert_eq!(first.method, ConversionMethod::Milliseconds);

        let second = n.normalize(&first.percents, IntervalProfile::LastDay).unwrap();
        assert_eq!(second.method, ConversionMethod::Direct);
        assert_eq!(second.percents, first.percents);
    }

    #[test]
    fn test_custom_window() {
        let n = UnitNormalizer::with_config(NormalizerConfig {
            sample_window: 2,
            ..NormalizerConfig::default()
        });
        let stats = n.window_stats(&[1.0, 3.0, 1000.0]);
        assert_close(stats.mean, 2.0);
        assert_eq!(stats.max, 3.0);
    }

    #[test]
    fn test_method_labels_round_trip_through_serde() {
        let methods = [
            ConversionMethod::Direct,
            ConversionMethod::MillisecondsHigh,
            ConversionMethod::Rescaled { divisor: 10_000 },
            ConversionMethod::EmergencyFix,
        ];
        for method in methods {
            let json = serde_json::to_string(&method).unwrap();
            assert_eq!(json, format!("\"{}\"", method));
            let back: ConversionMethod = serde_json::from_str(&json).unwrap();
            assert_eq!(back, method);
        }
        assert_eq!(ConversionMethod::DailyCumulative.to_string(), "daily_cumulative");
    }
}
