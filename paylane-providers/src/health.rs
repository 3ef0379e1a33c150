//! Health metrics and the composite score
//!
//! The score is a fixed weighted sum so a rank change can always be traced
//! back to one of three inputs:
//!
//! ```text
//! score = 0.4 * uptime/100 + 0.3 * max(0, (1000 - latency_ms) / 1000) + 0.3 * success/100
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

const UPTIME_WEIGHT: f64 = 0.4;
const LATENCY_WEIGHT: f64 = 0.3;
const SUCCESS_WEIGHT: f64 = 0.3;

/// Latency at or above which the latency term contributes nothing
pub const LATENCY_CEILING_MS: f64 = 1000.0;

/// Uptime nudge per observed outcome, in percentage points
pub const UPTIME_NUDGE: f64 = 0.1;

/// Success-rate nudge per observed outcome, in percentage points
pub const SUCCESS_NUDGE: f64 = 1.0;

/// Weight of a new latency sample in the running average
pub const LATENCY_SAMPLE_WEIGHT: f64 = 0.2;

/// Raw health inputs for one provider
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthMetrics {
    /// Uptime percentage, 0 to 100
    pub uptime_pct: f64,
    /// Average response time in milliseconds
    pub response_time_ms: f64,
    /// Success rate percentage, 0 to 100
    pub success_rate_pct: f64,
}

impl Default for HealthMetrics {
    fn default() -> Self {
        Self {
            uptime_pct: 100.0,
            response_time_ms: 0.0,
            success_rate_pct: 100.0,
        }
    }
}

impl HealthMetrics {
    /// Create a metrics snapshot
    pub fn new(uptime_pct: f64, response_time_ms: f64, success_rate_pct: f64) -> Self {
        Self {
            uptime_pct,
            response_time_ms,
            success_rate_pct,
        }
    }

    /// Whether every input is a finite number
    pub fn is_finite(&self) -> bool {
        self.uptime_pct.is_finite()
            && self.response_time_ms.is_finite()
            && self.success_rate_pct.is_finite()
    }

    /// Composite score for this snapshot
    pub fn score(&self) -> f64 {
        compute_score(self)
    }

    /// Fold an observed outcome into the metrics
    pub fn observe(&mut self, observation: &Observation) {
        match observation.outcome {
            Outcome::Success => {
                self.uptime_pct = clamp_pct(self.uptime_pct + UPTIME_NUDGE);
                self.success_rate_pct = clamp_pct(self.success_rate_pct + SUCCESS_NUDGE);
            }
            Outcome::Failure => {
                self.uptime_pct = clamp_pct(self.uptime_pct - UPTIME_NUDGE);
                self.success_rate_pct = clamp_pct(self.success_rate_pct - SUCCESS_NUDGE);
            }
        }

        if let Some(latency) = observation.latency {
            let sample = latency.as_secs_f64() * 1000.0;
            let current = sanitize(self.response_time_ms, LATENCY_CEILING_MS).max(0.0);
            self.response_time_ms =
                current * (1.0 - LATENCY_SAMPLE_WEIGHT) + sample * LATENCY_SAMPLE_WEIGHT;
        }
    }
}

/// Whether an observed provider interaction went well
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The interaction succeeded
    Success,
    /// The interaction failed
    Failure,
}

/// An outcome with an optional latency sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// Success or failure
    pub outcome: Outcome,
    /// How long the interaction took, when measured
    pub latency: Option<Duration>,
}

impl Observation {
    /// A successful interaction
    pub fn success() -> Self {
        Self {
            outcome: Outcome::Success,
            latency: None,
        }
    }

    /// A failed interaction
    pub fn failure() -> Self {
        Self {
            outcome: Outcome::Failure,
            latency: None,
        }
    }

    /// Attach a latency sample
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }
}

impl From<Outcome> for Observation {
    fn from(outcome: Outcome) -> Self {
        Self {
            outcome,
            latency: None,
        }
    }
}

/// Composite score in `[0, 1]`, rounded to three decimals
pub fn compute_score(metrics: &HealthMetrics) -> f64 {
    let uptime = clamp_pct(metrics.uptime_pct) / 100.0;
    let success = clamp_pct(metrics.success_rate_pct) / 100.0;
    let latency = normalize_latency(metrics.response_time_ms);

    let raw = UPTIME_WEIGHT * uptime + LATENCY_WEIGHT * latency + SUCCESS_WEIGHT * success;
    ((raw * 1000.0).round() / 1000.0).clamp(0.0, 1.0)
}

/// Latency term: 1 at 0ms, falling linearly to 0 at the ceiling
pub fn normalize_latency(response_time_ms: f64) -> f64 {
    let t = sanitize(response_time_ms, LATENCY_CEILING_MS).max(0.0);
    ((LATENCY_CEILING_MS - t) / LATENCY_CEILING_MS).clamp(0.0, 1.0)
}

fn clamp_pct(value: f64) -> f64 {
    sanitize(value, 0.0).clamp(0.0, 100.0)
}

// NaN counts as the worst value of its input; infinities clamp naturally.
fn sanitize(value: f64, worst: f64) -> f64 {
    if value.is_nan() { worst } else { value }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_and_worst_scores() {
        assert_eq!(HealthMetrics::new(100.0, 0.0, 100.0).score(), 1.0);
        assert_eq!(HealthMetrics::new(0.0, 1000.0, 0.0).score(), 0.0);
        assert_eq!(HealthMetrics::new(0.0, 5000.0, 0.0).score(), 0.0);
    }

    #[test]
    fn test_weighted_formula() {
        // 0.4*0.99 + 0.3*0.8 + 0.3*0.98 = 0.396 + 0.24 + 0.294
        let metrics = HealthMetrics::new(99.0, 200.0, 98.0);
        assert!((metrics.score() - 0.93).abs() < 1e-9);
    }

    #[test]
    fn test_three_decimal_precision() {
        let score = HealthMetrics::new(99.97, 123.4, 97.31).score();
        assert_eq!(score, (score * 1000.0).round() / 1000.0);
    }

    #[test]
    fn test_out_of_range_inputs_clamped() {
        assert_eq!(HealthMetrics::new(150.0, -20.0, 300.0).score(), 1.0);
        assert_eq!(HealthMetrics::new(-5.0, f64::INFINITY, f64::NAN).score(), 0.0);
    }

    #[test]
    fn test_nan_latency_scores_as_slowest() {
        let garbled = HealthMetrics::new(100.0, f64::NAN, 100.0);
        assert_eq!(normalize_latency(f64::NAN), 0.0);
        assert_eq!(garbled.score(), 0.7);
        assert_eq!(garbled.score(), HealthMetrics::new(100.0, 5000.0, 100.0).score());
        assert!(garbled.score() < HealthMetrics::new(100.0, 999.0, 100.0).score());
        assert!(!garbled.is_finite());
        assert!(HealthMetrics::new(99.0, 120.0, 98.0).is_finite());
    }

    #[test]
    fn test_nan_latency_not_carried_into_average() {
        let mut metrics = HealthMetrics::new(100.0, f64::NAN, 100.0);
        metrics.observe(&Observation::success().with_latency(Duration::from_millis(100)));
        // 1000 * 0.8 + 100 * 0.2
        assert!((metrics.response_time_ms - 820.0).abs() < 1e-9);
    }

    #[test]
    fn test_observe_nudges() {
        let mut metrics = HealthMetrics::new(99.0, 100.0, 95.0);
        metrics.observe(&Observation::failure());
        assert!((metrics.uptime_pct - 98.9).abs() < 1e-9);
        assert!((metrics.success_rate_pct - 94.0).abs() < 1e-9);

        metrics.observe(&Observation::success().with_latency(Duration::from_millis(600)));
        assert!((metrics.uptime_pct - 99.0).abs() < 1e-9);
        assert!((metrics.success_rate_pct - 95.0).abs() < 1e-9);
        assert!((metrics.response_time_ms - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_observe_saturates() {
        let mut metrics = HealthMetrics::default();
        metrics.observe(&Observation::success());
        assert_eq!(metrics.uptime_pct, 100.0);
        assert_eq!(metrics.success_rate_pct, 100.0);

        let mut metrics = HealthMetrics::new(0.05, 0.0, 0.5);
        metrics.observe(&Outcome::Failure.into());
        assert_eq!(metrics.uptime_pct, 0.0);
        assert_eq!(metrics.success_rate_pct, 0.0);
    }
}
