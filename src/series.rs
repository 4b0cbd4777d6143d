/// VegetationSeries builder.
///
/// Normalizes raw per-date vegetation samples (possibly cloud-occluded,
/// irregularly spaced) into a clean ordered series over one lookback
/// window: one representative observation per satellite revisit interval,
/// cloudy scenes discarded, duplicate dates collapsed. Intervals with no
/// usable observation stay absent; the series is sparse and downstream
/// components handle gaps explicitly rather than interpolating.
use crate::errors::AppError;
use crate::models::{LookbackWindow, VegetationObservation, VegetationSeries};
use crate::policy::EvaluationPolicy;

pub fn build_series(
    raw: Vec<VegetationObservation>,
    window: LookbackWindow,
    policy: &EvaluationPolicy,
) -> Result<VegetationSeries, AppError> {
    let total = raw.len();

    let mut usable: Vec<VegetationObservation> = raw
        .into_iter()
        .filter(|obs| window.contains(obs.timestamp))
        .filter(|obs| obs.cloud_cover.is_finite() && obs.cloud_cover <= policy.max_cloud_cover)
        .filter(|obs| obs.index.is_finite() && (-1.0..=1.0).contains(&obs.index))
        .collect();

    tracing::debug!(
        "Series builder: {} of {} raw observations usable (cloud threshold {})",
        usable.len(),
        total,
        policy.max_cloud_cover
    );

    usable.sort_by_key(|obs| obs.timestamp);

    // One representative per revisit interval: lowest cloud cover wins,
    // earlier acquisition breaks ties.
    let interval = policy.revisit_interval_days.max(1);
    let mut representatives: Vec<VegetationObservation> = Vec::new();
    let mut current_bucket: Option<(i64, VegetationObservation)> = None;
    for obs in usable {
        let bucket = (obs.timestamp - window.start).num_days() / interval;
        match &mut current_bucket {
            Some((current, best)) if *current == bucket => {
                if obs.cloud_cover < best.cloud_cover {
                    *best = obs;
                }
            }
            Some((_, best)) => {
                representatives.push(best.clone());
                current_bucket = Some((bucket, obs));
            }
            None => current_bucket = Some((bucket, obs)),
        }
    }
    if let Some((_, best)) = current_bucket {
        representatives.push(best);
    }

    if representatives.len() < policy.min_observations {
        return Err(AppError::InsufficientData(format!(
            "Only {} usable observation(s) in window {} to {}, need at least {}",
            representatives.len(),
            window.start.format("%Y-%m-%d"),
            window.end.format("%Y-%m-%d"),
            policy.min_observations
        )));
    }

    VegetationSeries::new(window, representatives)
}
