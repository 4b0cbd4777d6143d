/// Property-based tests using proptest
/// Tests invariants and properties that should hold for all inputs
use chrono::{Duration, TimeZone, Utc};
use greenchain_api::certificate::mint_certificate;
use greenchain_api::loan::decide;
use greenchain_api::models::{
    ComponentKind, FarmPolygon, Grade, LoanDecision, LoanPurpose, LoanRequest, LookbackWindow,
    RiskTier, ScoreBreakdown, ScoreComponent, SustainabilityScore, VegetationObservation,
    VegetationSeries,
};
use greenchain_api::policy::EvaluationPolicy;
use greenchain_api::scoring::aggregate;
use greenchain_api::trend::assess_trend;
use proptest::prelude::*;
use uuid::Uuid;

fn linear_series(normalized_slope: f64, n: usize) -> VegetationSeries {
    let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let window = LookbackWindow {
        start,
        end: start + Duration::days(180),
    };
    let observations = (0..n)
        .map(|i| {
            let day = (180 / n as i64) * i as i64;
            // Centered around 0.5 so every value stays above the
            // vegetation floor for |slope| <= 0.4
            let index = 0.5 + normalized_slope * (day as f64 / 180.0 - 0.5);
            VegetationObservation {
                timestamp: start + Duration::days(day),
                index,
                cloud_cover: 0.1,
                scene_id: format!("scene-{}", i),
            }
        })
        .collect();
    VegetationSeries::new(window, observations).unwrap()
}

fn component(kind: ComponentKind, value: f64, weight: f64) -> ScoreComponent {
    ScoreComponent {
        kind,
        value,
        weight,
        rationale: "prop".to_string(),
    }
}

fn score_from(values: [f64; 4]) -> SustainabilityScore {
    aggregate(
        component(ComponentKind::VegetationTrend, values[0], 0.30),
        component(ComponentKind::FarmingConsistency, values[1], 0.20),
        component(ComponentKind::NoDeforestation, values[2], 0.35),
        component(ComponentKind::ClimateResilience, values[3], 0.15),
    )
    .unwrap()
}

fn decision_fixture(approved_amount: f64) -> LoanDecision {
    LoanDecision {
        approved: true,
        risk_tier: RiskTier::Low,
        approved_amount,
        interest_rate: 0.08,
        deforestation_veto: false,
        decision_factors: vec!["fixture".to_string()],
    }
}

fn polygon_fixture() -> FarmPolygon {
    FarmPolygon::new(vec![(0.0, 0.0), (0.0, 0.01), (0.01, 0.01), (0.01, 0.0)]).unwrap()
}

fn score_fixture() -> SustainabilityScore {
    SustainabilityScore {
        overall: 82.4,
        grade: Grade::A,
        breakdown: ScoreBreakdown {
            vegetation_trend: component(ComponentKind::VegetationTrend, 78.0, 0.30),
            farming_consistency: component(ComponentKind::FarmingConsistency, 90.0, 0.20),
            no_deforestation: component(ComponentKind::NoDeforestation, 100.0, 0.35),
            climate_resilience: component(ComponentKind::ClimateResilience, 75.0, 0.15),
        },
        risk_factors: vec![],
        positive_factors: vec![],
    }
}

// Property: trend scores stay bounded for arbitrary series
proptest! {
    #[test]
    fn trend_scores_always_bounded(
        values in prop::collection::vec(-1.0..1.0f64, 3..24)
    ) {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let window = LookbackWindow { start, end: start + Duration::days(180) };
        let n = values.len();
        let observations = values.iter().enumerate().map(|(i, v)| VegetationObservation {
            timestamp: start + Duration::days((180 / n as i64).max(1) * i as i64),
            index: *v,
            cloud_cover: 0.1,
            scene_id: format!("scene-{}", i),
        }).collect();
        let series = VegetationSeries::new(window, observations).unwrap();

        let policy = EvaluationPolicy::default();
        let assessment = assess_trend(&series, &policy);
        prop_assert!((0.0..=100.0).contains(&assessment.vegetation_trend.value));
        prop_assert!((0.0..=100.0).contains(&assessment.farming_consistency.value));
    }

    // Property: above the stability epsilon, the trend score is a
    // non-decreasing function of slope
    #[test]
    fn trend_score_non_decreasing_in_slope(
        a in 0.051..0.39f64,
        delta in 0.001..0.2f64
    ) {
        let policy = EvaluationPolicy::default();
        let b = (a + delta).min(0.4);
        let low = assess_trend(&linear_series(a, 12), &policy);
        let high = assess_trend(&linear_series(b, 12), &policy);
        prop_assert!(high.vegetation_trend.value >= low.vegetation_trend.value - 1e-9);
    }

    #[test]
    fn trend_score_non_decreasing_in_negative_slope(
        a in -0.39..-0.051f64,
        delta in 0.001..0.2f64
    ) {
        let policy = EvaluationPolicy::default();
        let b = (a + delta).min(-0.051);
        let low = assess_trend(&linear_series(a, 12), &policy);
        let high = assess_trend(&linear_series(b, 12), &policy);
        prop_assert!(high.vegetation_trend.value >= low.vegetation_trend.value - 1e-9);
    }
}

// Property: aggregator invariants
proptest! {
    #[test]
    fn overall_score_bounded_and_breakdown_preserved(
        trend in 0.0..100.0f64,
        consistency in 0.0..100.0f64,
        deforestation in 0.0..100.0f64,
        climate in 0.0..100.0f64
    ) {
        let score = score_from([trend, consistency, deforestation, climate]);
        prop_assert!((0.0..=100.0).contains(&score.overall));
        prop_assert_eq!(score.breakdown.components().len(), 4);
    }

    // Re-weighting equal-valued components changes nothing
    #[test]
    fn equal_components_invariant_under_reweighting(
        value in 0.0..100.0f64,
        w1 in 0.1..0.4f64,
        w2 in 0.1..0.3f64
    ) {
        let original = score_from([value, value, value, value]);
        let w3 = 0.2;
        let w4 = 1.0 - w1 - w2 - w3;
        prop_assume!(w4 > 0.0);
        let reweighted = aggregate(
            component(ComponentKind::VegetationTrend, value, w1),
            component(ComponentKind::FarmingConsistency, value, w2),
            component(ComponentKind::NoDeforestation, value, w3),
            component(ComponentKind::ClimateResilience, value, w4),
        ).unwrap();
        prop_assert!((original.overall - reweighted.overall).abs() <= 0.1 + 1e-9);
    }
}

// Property: decision veto holds for every score
proptest! {
    #[test]
    fn deforestation_veto_has_no_counterexample(
        overall in 0.0..100.0f64,
        amount in 1.0..100_000.0f64
    ) {
        let policy = EvaluationPolicy::default();
        let score = score_from([overall, overall, overall, overall]);
        let request = LoanRequest {
            amount,
            purpose: LoanPurpose::Seeds,
            farmer_reference: "prop".to_string(),
        };
        let decision = decide(&score, true, &request, &policy);
        prop_assert!(!decision.approved);
        prop_assert_eq!(decision.approved_amount, 0.0);
    }

    // Approved amounts never exceed the request or the ceiling
    #[test]
    fn approved_amount_bounded(
        overall in 0.0..100.0f64,
        amount in 1.0..100_000.0f64
    ) {
        let policy = EvaluationPolicy::default();
        let score = score_from([overall, overall, overall, overall]);
        let request = LoanRequest {
            amount,
            purpose: LoanPurpose::Seeds,
            farmer_reference: "prop".to_string(),
        };
        let decision = decide(&score, false, &request, &policy);
        prop_assert!(decision.approved_amount <= amount + 1e-9);
        prop_assert!(decision.approved_amount <= policy.loan_ceiling + 1e-9);
        prop_assert!(decision.interest_rate >= 0.0);
    }
}

// Property: certificate fingerprints
proptest! {
    #[test]
    fn fingerprint_deterministic_for_same_inputs(amount in 1.0..100_000.0f64) {
        let id = Uuid::from_u128(42);
        let at = Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0).unwrap();
        let a = mint_certificate(id, at, polygon_fixture(), score_fixture(), decision_fixture(amount));
        let b = mint_certificate(id, at, polygon_fixture(), score_fixture(), decision_fixture(amount));
        prop_assert_eq!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn fingerprint_sensitive_to_amount_change(amount in 1.0..99_000.0f64) {
        let id = Uuid::from_u128(42);
        let at = Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0).unwrap();
        let original = mint_certificate(id, at, polygon_fixture(), score_fixture(), decision_fixture(amount));
        let changed = mint_certificate(id, at, polygon_fixture(), score_fixture(), decision_fixture(amount + 1.0));
        prop_assert_ne!(original.fingerprint, changed.fingerprint);
    }
}
