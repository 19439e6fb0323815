//! CPU Ready analysis library for vCenter exports
//!
//! This crate provides the core functionality for:
//! - Importing vCenter CSV exports and detecting their collection interval
//! - Normalizing raw CPU Ready counters to percentages
//! - Host health scoring and comparison
//! - Trend analysis and daily calendar profiles
//! - Host removal (consolidation) what-if simulation

pub mod error;
pub mod health;
pub mod import;
pub mod interval;
pub mod models;
pub mod normalizer;
pub mod observability;
pub mod simulator;
pub mod trends;

pub use error::{AnalyzerError, Result};
pub use health::{
    AnalysisSummary, HealthAnalyzer, HealthReport, HostHealth, HostRanking, HostStatus, Thresholds,
};
pub use import::{DatasetLoader, ImportReport, ImportWarning, RawTable};
pub use interval::{detect_interval, resolve_profiles, DetectionReason, IntervalDetection};
pub use models::*;
pub use normalizer::{ConversionMethod, NormalizerConfig, UnitNormalizer};
pub use observability::StructuredLogger;
pub use simulator::{RemovalImpactSimulator, RiskPolicy};
pub use trends::{daily_profile, DailyReport, TrendAnalyzer, TrendDirection, TrendReport};
