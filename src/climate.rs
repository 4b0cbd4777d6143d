/// Climate resilience estimator.
///
/// Maps the bounded anomaly metrics delivered by the climate collaborator
/// to a [0, 100] resilience score. More anomalous conditions mean lower
/// resilience; the mapping is monotonic in both inputs. The estimator
/// never fetches data itself.
use crate::models::{ClimateAnomaly, ComponentKind, ScoreComponent};
use crate::policy::EvaluationPolicy;

/// Drought dominates the severity blend; precipitation anomalies in either
/// direction (deficit or flooding surplus) carry the rest.
const DROUGHT_WEIGHT: f64 = 0.65;
const PRECIPITATION_WEIGHT: f64 = 0.35;

pub fn assess_climate_resilience(
    anomaly: &ClimateAnomaly,
    policy: &EvaluationPolicy,
) -> ScoreComponent {
    let drought = anomaly.drought_index.clamp(0.0, 1.0);
    let precipitation = anomaly.precipitation_anomaly.clamp(-1.0, 1.0);

    let severity =
        (DROUGHT_WEIGHT * drought + PRECIPITATION_WEIGHT * precipitation.abs()).clamp(0.0, 1.0);
    let value = (100.0 * (1.0 - severity)).clamp(0.0, 100.0);

    ScoreComponent {
        kind: ComponentKind::ClimateResilience,
        value,
        weight: policy.weights.climate_resilience,
        rationale: format!(
            "drought index {:.2}, precipitation anomaly {:+.2}",
            drought, precipitation
        ),
    }
}
