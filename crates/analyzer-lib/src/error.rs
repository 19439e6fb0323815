//! Error types for CPU Ready analysis

use thiserror::Error;

use crate::models::IntervalProfile;

pub type Result<T> = std::result::Result<T, AnalyzerError>;

/// Errors raised by normalization, simulation and import
///
/// All variants are recoverable: callers report them and carry on.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("Invalid raw value {value} at position {index}: CPU Ready values must be finite and non-negative")]
    InvalidInput { index: usize, value: f64 },

    #[error("No usable CPU Ready samples")]
    EmptySeries,

    #[error("Invalid removal plan: {0}")]
    InvalidPlan(String),

    #[error("Invalid thresholds: warning {warning}% must be positive and below critical {critical}%")]
    InvalidThresholds { warning: f64, critical: f64 },

    #[error("Host {hostname} uses interval {found}, dataset uses {expected}")]
    ProfileMismatch {
        hostname: String,
        expected: IntervalProfile,
        found: IntervalProfile,
    },

    #[error("Host {hostname} appears more than once in the dataset")]
    DuplicateHost { hostname: String },

    #[error("Invalid normalizer configuration: {0}")]
    InvalidConfig(String),

    #[error("No valid CPU Ready data found in any imported table")]
    NoUsableData,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
