//! Host removal what-if simulation
//!
//! Spreads the raw CPU Ready workload of the hosts being removed evenly
//! across the surviving hosts, re-normalizes each survivor with the
//! dataset's interval profile and classifies the resulting risk.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::health::Thresholds;
use crate::models::{
    mean, Dataset, HostImpact, HostStats, RemovalImpactResult, RemovalPlan, RemovedHost, RiskLevel,
};
use crate::normalizer::UnitNormalizer;

/// Workload share above which a removal is high risk
pub const DEFAULT_HIGH_WORKLOAD_PERCENT: f64 = 30.0;

/// Workload share above which a removal is medium risk
pub const DEFAULT_MEDIUM_WORKLOAD_PERCENT: f64 = 15.0;

/// Risk classification limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskPolicy {
    pub high_workload_percent: f64,
    pub medium_workload_percent: f64,
    /// Fraction of the warning level at which a projected mean "approaches" it
    pub warning_approach_ratio: f64,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            high_workload_percent: DEFAULT_HIGH_WORKLOAD_PERCENT,
            medium_workload_percent: DEFAULT_MEDIUM_WORKLOAD_PERCENT,
            warning_approach_ratio: 0.8,
        }
    }
}

/// Projects the effect of decommissioning hosts
#[derive(Debug, Clone, Default)]
pub struct RemovalImpactSimulator {
    normalizer: UnitNormalizer,
    thresholds: Thresholds,
    policy: RiskPolicy,
}

impl RemovalImpactSimulator {
    pub fn new(normalizer: UnitNormalizer, thresholds: Thresholds) -> Self {
        Self {
            normalizer,
            thresholds,
            policy: RiskPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RiskPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Simulate removing the plan's hosts from the dataset
    ///
    /// The dataset is not modified.
    ///
    /// # Errors
    /// * `InvalidPlan` if the plan is empty, names an unknown host or
    ///   leaves no survivors
    pub fn simulate(&self, dataset: &Dataset, plan: &RemovalPlan) -> Result<RemovalImpactResult> {
        plan.validate(dataset)?;

        let profile = dataset.profile();
        let removed_raw_workload: f64 = plan
            .hosts()
            .iter()
            .filter_map(|h| dataset.host(h))
            .map(|h| h.raw_sum())
            .sum();
        let survivors: Vec<_> = dataset.hosts().filter(|h| !plan.contains(&h.hostname)).collect();
        let surviving_raw_workload: f64 = survivors.iter().map(|h| h.raw_sum()).sum();
        let total_raw_workload = removed_raw_workload + surviving_raw_workload;

        let share = |raw: f64| {
            if total_raw_workload > 0.0 {
                raw / total_raw_workload * 100.0
            } else {
                0.0
            }
        };
        let workload_percentage = share(removed_raw_workload);

        let removed_hosts: Vec<RemovedHost> = plan
            .hosts()
            .iter()
            .filter_map(|h| dataset.host(h))
            .map(|h| {
                let raw_workload = h.raw_sum();
                RemovedHost {
                    hostname: h.hostname.clone(),
                    raw_workload,
                    mean_percent: h.stats().mean,
                    workload_percentage: share(raw_workload),
                }
            })
            .collect();

        let additional_raw_per_host = removed_raw_workload / survivors.len() as f64;

        let mut projected_percents = Vec::with_capacity(dataset.record_count());
        let mut surviving_hosts = Vec::with_capacity(survivors.len());
        for host in &survivors {
            let additional_raw_per_sample = additional_raw_per_host / host.len() as f64;
            let redistributed: Vec<f64> = host
                .samples
                .iter()
                .map(|s| s.raw_value + additional_raw_per_sample)
                .collect();
            let normalized = self.normalizer.normalize(&redistributed, profile)?;

            let before = host.stats();
            let after = HostStats::from_values(&normalized.percents);
            debug!(
                host = %host.hostname,
                additional_raw_per_sample,
                before_mean = before.mean,
                after_mean = after.mean,
                method = %normalized.method,
                "Redistributed workload onto host"
            );

            projected_percents.extend_from_slice(&normalized.percents);
            surviving_hosts.push(HostImpact {
                hostname: host.hostname.clone(),
                before,
                after,
                additional_raw_per_sample,
                increase: after.mean - before.mean,
                conversion_method: normalized.method,
            });
        }

        let original_mean_percent = dataset.overall_mean_percent();
        let projected_mean_percent = mean(&projected_percents);
        let (risk, risk_reasons) = self.classify(workload_percentage, &surviving_hosts);

        let result = RemovalImpactResult {
            profile,
            removed_hosts,
            total_raw_workload,
            removed_raw_workload,
            surviving_raw_workload,
            workload_percentage,
            additional_raw_per_host,
            original_mean_percent,
            projected_mean_percent,
            avg_increase: projected_mean_percent - original_mean_percent,
            infrastructure_reduction_percent: plan.len() as f64 / dataset.host_count() as f64
                * 100.0,
            consolidation_efficiency: workload_percentage / plan.len() as f64,
            risk,
            risk_reasons,
            surviving_hosts,
        };

        debug!(
            removed = plan.len(),
            surviving = result.surviving_hosts.len(),
            workload_percentage = result.workload_percentage,
            avg_increase = result.avg_increase,
            risk = %result.risk,
            "Simulated host removal"
        );

        Ok(result)
    }

    /// Risk level plus the rules that produced it
    fn classify(
        &self,
        workload_percentage: f64,
        survivors: &[HostImpact],
    ) -> (RiskLevel, Vec<String>) {
        let mut high = Vec::new();
        if workload_percentage > self.policy.high_workload_percent {
            high.push(format!(
                "{:.1}% of workload redistributed (above {:.0}%)",
                workload_percentage, self.policy.high_workload_percent
            ));
        }
        for host in survivors.iter().filter(|h| h.after.mean > self.thresholds.critical) {
            high.push(format!(
                "{} projected at {:.2}% exceeds critical {:.1}%",
                host.hostname, host.after.mean, self.thresholds.critical
            ));
        }
        if survivors.len() < 2 {
            high.push(format!("only {} host remains", survivors.len()));
        }
        if !high.is_empty() {
            return (RiskLevel::High, high);
        }

        let mut medium = Vec::new();
        if workload_percentage > self.policy.medium_workload_percent {
            medium.push(format!(
                "{:.1}% of workload redistributed (above {:.0}%)",
                workload_percentage, self.policy.medium_workload_percent
            ));
        }
        let approach = self.thresholds.warning * self.policy.warning_approach_ratio;
        for host in survivors.iter().filter(|h| h.after.mean >= approach) {
            medium.push(format!(
                "{} projected at {:.2}% approaches warning {:.1}%",
                host.hostname, host.after.mean, self.thresholds.warning
            ));
        }
        if survivors.len() == 2 {
            medium.push("only 2 hosts remain".to_string());
        }
        if !medium.is_empty() {
            return (RiskLevel::Medium, medium);
        }

        (RiskLevel::Low, Vec::new())
    }
}
