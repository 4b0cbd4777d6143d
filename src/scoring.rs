/// Sustainability score aggregator.
///
/// Combines the four component scores into one overall score with a
/// reproducible breakdown. The weighted sum is only computed after the
/// weight-sum invariant has been checked; the aggregator never emits a
/// bare scalar without its breakdown.
use crate::errors::AppError;
use crate::models::{
    Grade, ScoreBreakdown, ScoreComponent, SustainabilityScore,
};

/// Tolerance for the weight-sum invariant.
const WEIGHT_SUM_EPSILON: f64 = 1e-6;

pub fn aggregate(
    vegetation_trend: ScoreComponent,
    farming_consistency: ScoreComponent,
    no_deforestation: ScoreComponent,
    climate_resilience: ScoreComponent,
) -> Result<SustainabilityScore, AppError> {
    let breakdown = ScoreBreakdown {
        vegetation_trend,
        farming_consistency,
        no_deforestation,
        climate_resilience,
    };

    let weight_sum: f64 = breakdown.components().iter().map(|c| c.weight).sum();
    if (weight_sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
        return Err(AppError::InvalidWeightConfiguration(format!(
            "Component weights must sum to 1.0, got {:.6}",
            weight_sum
        )));
    }

    let overall: f64 = breakdown
        .components()
        .iter()
        .map(|c| c.value.clamp(0.0, 100.0) * c.weight)
        .sum();
    let overall = round1(overall);

    let grade = grade_for(overall);
    let (risk_factors, positive_factors) = factor_lists(&breakdown);

    tracing::debug!(
        "Aggregated sustainability score {:.1} (grade {})",
        overall,
        grade
    );

    Ok(SustainabilityScore {
        overall,
        grade,
        breakdown,
        risk_factors,
        positive_factors,
    })
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn grade_for(overall: f64) -> Grade {
    if overall >= 80.0 {
        Grade::A
    } else if overall >= 65.0 {
        Grade::B
    } else if overall >= 50.0 {
        Grade::C
    } else if overall >= 35.0 {
        Grade::D
    } else {
        Grade::F
    }
}

/// Flags weak and strong components for the report. Presentation only;
/// the numeric decision path never reads these.
fn factor_lists(breakdown: &ScoreBreakdown) -> (Vec<String>, Vec<String>) {
    let mut risk = Vec::new();
    let mut positive = Vec::new();

    if breakdown.vegetation_trend.value < 40.0 {
        risk.push("Declining vegetation health over time".to_string());
    } else if breakdown.vegetation_trend.value > 70.0 {
        positive.push("Improving vegetation health trend".to_string());
    }

    if breakdown.farming_consistency.value < 40.0 {
        risk.push("Inconsistent farming patterns".to_string());
    } else if breakdown.farming_consistency.value > 70.0 {
        positive.push("Consistent and stable land management".to_string());
    }

    if breakdown.no_deforestation.value < 50.0 {
        risk.push("Potential recent deforestation detected".to_string());
    } else if breakdown.no_deforestation.value > 80.0 {
        positive.push("No signs of recent deforestation".to_string());
    }

    if breakdown.climate_resilience.value < 40.0 {
        risk.push("High climate risk exposure".to_string());
    } else if breakdown.climate_resilience.value > 70.0 {
        positive.push("Favorable climate conditions".to_string());
    }

    (risk, positive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ComponentKind;

    fn component(kind: ComponentKind, value: f64, weight: f64) -> ScoreComponent {
        ScoreComponent {
            kind,
            value,
            weight,
            rationale: "test".to_string(),
        }
    }

    fn defaults(trend: f64, consistency: f64, deforestation: f64, climate: f64) -> Result<SustainabilityScore, AppError> {
        aggregate(
            component(ComponentKind::VegetationTrend, trend, 0.30),
            component(ComponentKind::FarmingConsistency, consistency, 0.20),
            component(ComponentKind::NoDeforestation, deforestation, 0.35),
            component(ComponentKind::ClimateResilience, climate, 0.15),
        )
    }

    #[test]
    fn test_weighted_sum() {
        let score = defaults(80.0, 90.0, 100.0, 75.0).unwrap();
        // 24 + 18 + 35 + 11.25 = 88.25 -> 88.3
        assert_eq!(score.overall, 88.3);
        assert_eq!(score.grade, Grade::A);
    }

    #[test]
    fn test_breakdown_carried_in_full() {
        let score = defaults(50.0, 60.0, 70.0, 80.0).unwrap();
        assert_eq!(score.breakdown.components().len(), 4);
        assert_eq!(score.breakdown.vegetation_trend.value, 50.0);
        assert_eq!(score.breakdown.climate_resilience.weight, 0.15);
    }

    #[test]
    fn test_bad_weight_sum_rejected() {
        let err = aggregate(
            component(ComponentKind::VegetationTrend, 80.0, 0.30),
            component(ComponentKind::FarmingConsistency, 90.0, 0.20),
            component(ComponentKind::NoDeforestation, 100.0, 0.35),
            component(ComponentKind::ClimateResilience, 75.0, 0.30), // sum 1.15
        )
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidWeightConfiguration(_)));
    }

    #[test]
    fn test_reweighting_equal_components_changes_nothing() {
        let balanced = defaults(60.0, 60.0, 60.0, 60.0).unwrap();
        let reweighted = aggregate(
            component(ComponentKind::VegetationTrend, 60.0, 0.25),
            component(ComponentKind::FarmingConsistency, 60.0, 0.25),
            component(ComponentKind::NoDeforestation, 60.0, 0.25),
            component(ComponentKind::ClimateResilience, 60.0, 0.25),
        )
        .unwrap();
        assert_eq!(balanced.overall, reweighted.overall);
    }

    #[test]
    fn test_reweighting_unequal_components_shifts_score() {
        let original = defaults(90.0, 40.0, 100.0, 75.0).unwrap();
        // Shift weight from the weak consistency component to the strong
        // trend component
        let shifted = aggregate(
            component(ComponentKind::VegetationTrend, 90.0, 0.40),
            component(ComponentKind::FarmingConsistency, 40.0, 0.10),
            component(ComponentKind::NoDeforestation, 100.0, 0.35),
            component(ComponentKind::ClimateResilience, 75.0, 0.15),
        )
        .unwrap();
        // Expected delta: 0.10 * (90 - 40) = +5.0
        assert_eq!(shifted.overall, original.overall + 5.0);
    }

    #[test]
    fn test_grades() {
        assert_eq!(defaults(100.0, 100.0, 100.0, 100.0).unwrap().grade, Grade::A);
        assert_eq!(defaults(70.0, 70.0, 70.0, 70.0).unwrap().grade, Grade::B);
        assert_eq!(defaults(55.0, 55.0, 55.0, 55.0).unwrap().grade, Grade::C);
        assert_eq!(defaults(40.0, 40.0, 40.0, 40.0).unwrap().grade, Grade::D);
        assert_eq!(defaults(10.0, 10.0, 10.0, 10.0).unwrap().grade, Grade::F);
    }

    #[test]
    fn test_factor_lists() {
        let score = defaults(90.0, 30.0, 100.0, 20.0).unwrap();
        assert!(score
            .positive_factors
            .iter()
            .any(|f| f.contains("vegetation health trend")));
        assert!(score
            .risk_factors
            .iter()
            .any(|f| f.contains("Inconsistent farming")));
        assert!(score
            .risk_factors
            .iter()
            .any(|f| f.contains("climate risk")));
    }
}
