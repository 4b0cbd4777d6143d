/// Land-use change detector.
///
/// Compares the earliest quarter of the long lookback window against the
/// most recent quarter. A deforestation flag requires BOTH a relative
/// decline beyond the configured threshold AND a sustained drop (the
/// recent window's maximum below the baseline window's minimum). The
/// sustained rule is what separates persistent land-cover loss from
/// seasonal harvest dips, which recover within the window.
use crate::errors::AppError;
use crate::models::{ComponentKind, LookbackWindow, ScoreComponent, VegetationSeries};
use crate::policy::EvaluationPolicy;

/// Outcome of the baseline-vs-recent comparison.
#[derive(Debug, Clone)]
pub struct ChangeAssessment {
    pub no_deforestation: ScoreComponent,
    pub deforestation_flag: bool,
    pub baseline_mean: f64,
    pub recent_mean: f64,
    /// Relative decline of recent vs. baseline mean, >= 0 (0 when stable
    /// or improving).
    pub relative_drop: f64,
}

pub fn detect_land_use_change(
    long_series: &VegetationSeries,
    policy: &EvaluationPolicy,
) -> Result<ChangeAssessment, AppError> {
    let window = long_series.window();
    let quarter = chrono::Duration::days(window.duration_days() / 4);

    let baseline_window = LookbackWindow {
        start: window.start,
        end: window.start + quarter,
    };
    let recent_window = LookbackWindow {
        start: window.end - quarter,
        end: window.end,
    };

    let baseline = long_series.slice(baseline_window);
    let recent = long_series.slice(recent_window);

    if baseline.is_empty() {
        return Err(AppError::InsufficientData(format!(
            "No usable observations in baseline quarter ({} to {})",
            baseline_window.start.format("%Y-%m-%d"),
            baseline_window.end.format("%Y-%m-%d")
        )));
    }
    if recent.is_empty() {
        return Err(AppError::InsufficientData(format!(
            "No usable observations in recent quarter ({} to {})",
            recent_window.start.format("%Y-%m-%d"),
            recent_window.end.format("%Y-%m-%d")
        )));
    }

    let baseline_mean = mean(baseline.iter().map(|o| o.index));
    let recent_mean = mean(recent.iter().map(|o| o.index));
    let baseline_min = baseline.iter().map(|o| o.index).fold(f64::INFINITY, f64::min);
    let recent_max = recent
        .iter()
        .map(|o| o.index)
        .fold(f64::NEG_INFINITY, f64::max);

    // A baseline without vegetation has nothing to lose
    let relative_drop = if baseline_mean > f64::EPSILON {
        ((baseline_mean - recent_mean) / baseline_mean).max(0.0)
    } else {
        0.0
    };

    let magnitude_exceeded = relative_drop > policy.decline_threshold;
    let sustained = recent_max < baseline_min;
    let deforestation_flag = magnitude_exceeded && sustained;

    let (value, rationale) = if deforestation_flag {
        // Scaled down proportional to the severity of the decline
        let value = (100.0 * (1.0 - relative_drop)).clamp(0.0, 100.0);
        (
            value,
            format!(
                "sustained vegetation loss: {:.0}% decline, recent max {:.3} below baseline min {:.3}",
                relative_drop * 100.0,
                recent_max,
                baseline_min
            ),
        )
    } else if magnitude_exceeded {
        (
            100.0,
            format!(
                "{:.0}% decline not sustained (recent max {:.3} >= baseline min {:.3}), consistent with harvest cycle",
                relative_drop * 100.0,
                recent_max,
                baseline_min
            ),
        )
    } else {
        (
            100.0,
            format!(
                "no deforestation signal: baseline mean {:.3}, recent mean {:.3}",
                baseline_mean, recent_mean
            ),
        )
    };

    tracing::debug!(
        "Change detector: baseline {:.3}, recent {:.3}, drop {:.1}%, sustained {}",
        baseline_mean,
        recent_mean,
        relative_drop * 100.0,
        sustained
    );

    Ok(ChangeAssessment {
        no_deforestation: ScoreComponent {
            kind: ComponentKind::NoDeforestation,
            value,
            weight: policy.weights.no_deforestation,
            rationale,
        },
        deforestation_flag,
        baseline_mean,
        recent_mean,
        relative_drop,
    })
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for v in values {
        sum += v;
        count += 1;
    }
    sum / count as f64
}
