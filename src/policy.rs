use crate::errors::AppError;
use serde::{Deserialize, Serialize};

/// Tolerance for the weight-sum invariant.
const WEIGHT_SUM_EPSILON: f64 = 1e-6;

/// Aggregation weights for the four score components. Must sum to 1.0:
/// changing one weight requires renormalizing the rest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentWeights {
    pub vegetation_trend: f64,
    pub farming_consistency: f64,
    pub no_deforestation: f64,
    pub climate_resilience: f64,
}

impl ComponentWeights {
    pub fn sum(&self) -> f64 {
        self.vegetation_trend
            + self.farming_consistency
            + self.no_deforestation
            + self.climate_resilience
    }
}

impl Default for ComponentWeights {
    /// Deforestation dominates: it most directly signals greenwashing risk.
    fn default() -> Self {
        Self {
            vegetation_trend: 0.30,
            farming_consistency: 0.20,
            no_deforestation: 0.35,
            climate_resilience: 0.15,
        }
    }
}

/// Minimum overall score for each risk tier. Scores below `high` are
/// rejected outright.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierBreakpoints {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

impl Default for TierBreakpoints {
    fn default() -> Self {
        Self {
            low: 80.0,
            medium: 60.0,
            high: 40.0,
        }
    }
}

/// Fraction of the requested amount granted per tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmountMultipliers {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

impl Default for AmountMultipliers {
    fn default() -> Self {
        Self {
            low: 1.0,
            medium: 0.75,
            high: 0.5,
        }
    }
}

/// Interest-rate premium added to the base rate per tier, as decimal
/// fractions (0.02 = 2 percentage points).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatePremiums {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

impl Default for RatePremiums {
    fn default() -> Self {
        Self {
            low: 0.02,
            medium: 0.05,
            high: 0.09,
        }
    }
}

/// Immutable evaluation policy.
///
/// Every threshold the engine consults lives here and is passed explicitly
/// into each component, never read from ambient state, so evaluations are
/// reproducible and testable in isolation. Institutions can load their own
/// policy from JSON; unspecified fields fall back to the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationPolicy {
    /// Short lookback window (trend/consistency analysis), in days.
    pub short_lookback_days: i64,
    /// Long lookback window (land-use change detection), in days.
    pub long_lookback_days: i64,
    /// Observations above this cloud-coverage fraction are discarded.
    pub max_cloud_cover: f64,
    /// Minimum usable observations per window; fewer is a terminal
    /// `InsufficientDataError`.
    pub min_observations: usize,
    /// Satellite revisit cycle; one representative observation is kept per
    /// interval of this length.
    pub revisit_interval_days: i64,
    /// Normalized slopes within this band count as "stable".
    pub stability_epsilon: f64,
    /// Index values below this threshold count as bare soil.
    pub vegetation_floor: f64,
    /// Score assigned to trend and consistency when no vegetation is
    /// detected.
    pub no_vegetation_score: f64,
    pub weights: ComponentWeights,
    /// Relative vegetation decline (baseline vs. recent quarter) beyond
    /// which a sustained drop counts as deforestation.
    pub decline_threshold: f64,
    pub tier_breakpoints: TierBreakpoints,
    pub amount_multipliers: AmountMultipliers,
    /// Absolute cap on any approved amount.
    pub loan_ceiling: f64,
    /// Base yearly interest rate as a decimal fraction.
    pub base_interest_rate: f64,
    pub rate_premiums: RatePremiums,
    /// Rate reduction for sustainability-improving purposes, floored at the
    /// base rate.
    pub sustainable_purpose_discount: f64,
}

impl Default for EvaluationPolicy {
    fn default() -> Self {
        Self {
            short_lookback_days: 180,
            long_lookback_days: 730,
            max_cloud_cover: 0.4,
            min_observations: 3,
            revisit_interval_days: 16,
            stability_epsilon: 0.05,
            vegetation_floor: 0.2,
            no_vegetation_score: 15.0,
            weights: ComponentWeights::default(),
            decline_threshold: 0.30,
            tier_breakpoints: TierBreakpoints::default(),
            amount_multipliers: AmountMultipliers::default(),
            loan_ceiling: 25_000.0,
            base_interest_rate: 0.06,
            rate_premiums: RatePremiums::default(),
            sustainable_purpose_discount: 0.01,
        }
    }
}

impl EvaluationPolicy {
    /// Checks policy invariants. Called once at startup and again at the
    /// top of every evaluation, so a hand-edited policy file cannot
    /// silently skew scores.
    pub fn validate(&self) -> Result<(), AppError> {
        let sum = self.weights.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(AppError::InvalidWeightConfiguration(format!(
                "Component weights must sum to 1.0, got {:.6}",
                sum
            )));
        }
        let w = &self.weights;
        for (name, value) in [
            ("vegetation_trend", w.vegetation_trend),
            ("farming_consistency", w.farming_consistency),
            ("no_deforestation", w.no_deforestation),
            ("climate_resilience", w.climate_resilience),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AppError::InvalidWeightConfiguration(format!(
                    "Weight {} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        let bp = &self.tier_breakpoints;
        if !(bp.low > bp.medium && bp.medium > bp.high && bp.high > 0.0) {
            return Err(AppError::InternalError(format!(
                "Tier breakpoints must be strictly decreasing and positive: {:?}",
                bp
            )));
        }

        let m = &self.amount_multipliers;
        if !(m.low >= m.medium && m.medium >= m.high && m.high > 0.0 && m.low <= 1.0) {
            return Err(AppError::InternalError(format!(
                "Amount multipliers must be monotonic within (0, 1]: {:?}",
                m
            )));
        }

        let p = &self.rate_premiums;
        if !(p.low <= p.medium && p.medium <= p.high && p.low >= 0.0) {
            return Err(AppError::InternalError(format!(
                "Rate premiums must be monotonically increasing: {:?}",
                p
            )));
        }

        if self.short_lookback_days < 30 || self.long_lookback_days <= self.short_lookback_days {
            return Err(AppError::InternalError(
                "Lookback windows must satisfy 30 <= short < long".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.max_cloud_cover) {
            return Err(AppError::InternalError(format!(
                "Cloud-cover threshold must be within [0, 1], got {}",
                self.max_cloud_cover
            )));
        }
        if self.min_observations < 2 {
            return Err(AppError::InternalError(
                "min_observations must be at least 2".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.decline_threshold) {
            return Err(AppError::InternalError(format!(
                "Decline threshold must be within [0, 1), got {}",
                self.decline_threshold
            )));
        }
        if self.base_interest_rate < 0.0 || self.loan_ceiling <= 0.0 {
            return Err(AppError::InternalError(
                "Base rate must be >= 0 and loan ceiling > 0".to_string(),
            ));
        }

        Ok(())
    }
}
