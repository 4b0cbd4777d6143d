/// Trend analyzer.
///
/// Derives the vegetation-trend and farming-consistency scores from a
/// short-window series. Both are pure functions of the series and policy.
use crate::models::{ComponentKind, ScoreComponent, VegetationSeries};
use crate::policy::EvaluationPolicy;
use chrono::Datelike;

/// Trend and consistency assessment for one series.
#[derive(Debug, Clone)]
pub struct TrendAssessment {
    pub vegetation_trend: ScoreComponent,
    pub farming_consistency: ScoreComponent,
}

/// Slope magnitude (normalized to index change per short window) at which
/// the trend score saturates at 100.
const POSITIVE_SATURATION: f64 = 0.3;
/// Normalized decline at which the trend score reaches 0.
const NEGATIVE_CUTOFF: f64 = 0.4;
/// Coefficient of variation at which the consistency score reaches 0.
const CV_CUTOFF: f64 = 0.5;
/// Score assigned to a stable (near-zero slope) trend.
const STABLE_SCORE: f64 = 70.0;

pub fn assess_trend(series: &VegetationSeries, policy: &EvaluationPolicy) -> TrendAssessment {
    // Bare-soil override: a series with no vegetation signal must not be
    // scored by the regression, whatever its slope.
    if series.values().all(|v| v < policy.vegetation_floor) {
        let rationale = format!(
            "no vegetation detected: all index values below {:.2}",
            policy.vegetation_floor
        );
        return TrendAssessment {
            vegetation_trend: ScoreComponent {
                kind: ComponentKind::VegetationTrend,
                value: policy.no_vegetation_score,
                weight: policy.weights.vegetation_trend,
                rationale: rationale.clone(),
            },
            farming_consistency: ScoreComponent {
                kind: ComponentKind::FarmingConsistency,
                value: policy.no_vegetation_score,
                weight: policy.weights.farming_consistency,
                rationale,
            },
        };
    }

    let normalized_slope = normalized_slope(series, policy);
    let (trend_value, trend_rationale) = trend_score(normalized_slope, policy);

    let (cv, seasonal) = consistency_cv(series);
    let consistency_value = (100.0 * (1.0 - cv / CV_CUTOFF)).clamp(0.0, 100.0);
    let consistency_rationale = if seasonal {
        format!(
            "seasonal coefficient of variation {:.3} across {} observations",
            cv,
            series.len()
        )
    } else {
        format!(
            "coefficient of variation {:.3} across {} observations",
            cv,
            series.len()
        )
    };

    TrendAssessment {
        vegetation_trend: ScoreComponent {
            kind: ComponentKind::VegetationTrend,
            value: trend_value,
            weight: policy.weights.vegetation_trend,
            rationale: trend_rationale,
        },
        farming_consistency: ScoreComponent {
            kind: ComponentKind::FarmingConsistency,
            value: consistency_value,
            weight: policy.weights.farming_consistency,
            rationale: consistency_rationale,
        },
    }
}

/// Ordinary least squares slope of index vs. time, expressed as index
/// change over one short lookback window so the stability epsilon has a
/// scale-independent meaning.
fn normalized_slope(series: &VegetationSeries, policy: &EvaluationPolicy) -> f64 {
    let obs = series.observations();
    let first = obs[0].timestamp;
    let xs: Vec<f64> = obs
        .iter()
        .map(|o| (o.timestamp - first).num_seconds() as f64 / 86_400.0)
        .collect();
    let ys: Vec<f64> = obs.iter().map(|o| o.index).collect();

    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var = 0.0;
    for (x, y) in xs.iter().zip(ys.iter()) {
        cov += (x - mean_x) * (y - mean_y);
        var += (x - mean_x) * (x - mean_x);
    }
    // Timestamps are strictly increasing, so var > 0 for n >= 2
    let slope_per_day = cov / var;
    slope_per_day * policy.short_lookback_days as f64
}

/// Monotonic bounded transform from normalized slope to a [0, 100] score.
/// Near-zero slopes count as stable.
fn trend_score(normalized_slope: f64, policy: &EvaluationPolicy) -> (f64, String) {
    if normalized_slope.abs() <= policy.stability_epsilon {
        return (
            STABLE_SCORE,
            format!("stable vegetation trend ({:+.3}/window)", normalized_slope),
        );
    }
    if normalized_slope > 0.0 {
        let value = STABLE_SCORE
            + (100.0 - STABLE_SCORE) * (normalized_slope / POSITIVE_SATURATION).min(1.0);
        (
            value.clamp(0.0, 100.0),
            format!("improving vegetation trend ({:+.3}/window)", normalized_slope),
        )
    } else {
        let value = STABLE_SCORE * (1.0 + normalized_slope / NEGATIVE_CUTOFF).max(0.0);
        (
            value.clamp(0.0, 100.0),
            format!("declining vegetation trend ({:+.3}/window)", normalized_slope),
        )
    }
}

/// Coefficient of variation, restricted to the calendar season of the
/// series end when multi-year data is available. Returns (cv, seasonal?).
fn consistency_cv(series: &VegetationSeries) -> (f64, bool) {
    let obs = series.observations();
    let years: std::collections::BTreeSet<i32> =
        obs.iter().map(|o| o.timestamp.year()).collect();

    let reference_season = season_of(obs[obs.len() - 1].timestamp.month());
    let seasonal: Vec<f64> = obs
        .iter()
        .filter(|o| season_of(o.timestamp.month()) == reference_season)
        .map(|o| o.index)
        .collect();

    let (values, is_seasonal) = if years.len() >= 2 && seasonal.len() >= 3 {
        (seasonal, true)
    } else {
        (obs.iter().map(|o| o.index).collect(), false)
    };

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean <= f64::EPSILON {
        // No meaningful vegetation level to be consistent around
        return (CV_CUTOFF, is_seasonal);
    }
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (variance.sqrt() / mean, is_seasonal)
}

/// Meteorological season index (DJF=0, MAM=1, JJA=2, SON=3).
fn season_of(month: u32) -> u8 {
    match month {
        12 | 1 | 2 => 0,
        3..=5 => 1,
        6..=8 => 2,
        _ => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LookbackWindow, VegetationObservation};
    use chrono::{Duration, TimeZone, Utc};

    fn series_from(values: &[f64]) -> VegetationSeries {
        let base = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let window = LookbackWindow {
            start: base,
            end: base + Duration::days(180),
        };
        let observations = values
            .iter()
            .enumerate()
            .map(|(i, v)| VegetationObservation {
                timestamp: base + Duration::days(16 * i as i64),
                index: *v,
                cloud_cover: 0.1,
                scene_id: format!("scene-{}", i),
            })
            .collect();
        VegetationSeries::new(window, observations).unwrap()
    }

    #[test]
    fn test_flat_series_scores_stable() {
        let policy = EvaluationPolicy::default();
        let assessment = assess_trend(&series_from(&[0.6, 0.6, 0.6, 0.6, 0.6]), &policy);
        assert_eq!(assessment.vegetation_trend.value, STABLE_SCORE);
        assert!(assessment.vegetation_trend.rationale.contains("stable"));
    }

    #[test]
    fn test_improving_series_scores_above_stable() {
        let policy = EvaluationPolicy::default();
        let assessment = assess_trend(&series_from(&[0.4, 0.5, 0.6, 0.7, 0.8]), &policy);
        assert!(assessment.vegetation_trend.value > STABLE_SCORE);
        assert!(assessment.vegetation_trend.value <= 100.0);
    }

    #[test]
    fn test_declining_series_scores_below_stable() {
        let policy = EvaluationPolicy::default();
        let assessment = assess_trend(&series_from(&[0.8, 0.7, 0.6, 0.5, 0.4]), &policy);
        assert!(assessment.vegetation_trend.value < STABLE_SCORE);
        assert!(assessment.vegetation_trend.value >= 0.0);
    }

    #[test]
    fn test_low_variance_beats_high_variance_consistency() {
        let policy = EvaluationPolicy::default();
        let steady = assess_trend(&series_from(&[0.6, 0.61, 0.59, 0.6, 0.6]), &policy);
        let erratic = assess_trend(&series_from(&[0.3, 0.8, 0.25, 0.75, 0.4]), &policy);
        assert!(steady.farming_consistency.value > erratic.farming_consistency.value);
    }

    #[test]
    fn test_bare_soil_overrides_regression() {
        let policy = EvaluationPolicy::default();
        // Rising, but everything below the vegetation floor
        let assessment = assess_trend(&series_from(&[0.05, 0.08, 0.11, 0.14, 0.17]), &policy);
        assert_eq!(assessment.vegetation_trend.value, policy.no_vegetation_score);
        assert_eq!(
            assessment.farming_consistency.value,
            policy.no_vegetation_score
        );
        assert!(assessment
            .vegetation_trend
            .rationale
            .contains("no vegetation detected"));
    }

    #[test]
    fn test_scores_bounded() {
        let policy = EvaluationPolicy::default();
        for values in [
            vec![0.0, 0.5, 1.0],
            vec![1.0, 0.5, 0.0],
            vec![0.9, 0.9, 0.9, 0.9],
            vec![-0.5, 0.9, -0.5, 0.9],
        ] {
            let assessment = assess_trend(&series_from(&values), &policy);
            assert!((0.0..=100.0).contains(&assessment.vegetation_trend.value));
            assert!((0.0..=100.0).contains(&assessment.farming_consistency.value));
        }
    }
}
