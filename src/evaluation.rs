/// Shared evaluation pipeline for the HTTP handlers
///
/// One invocation takes a validated polygon plus a loan request through
/// the full workflow:
/// 1. Fetch short-window and long-window observations and the climate
///    anomaly (concurrently; these have no data dependency)
/// 2. Build the vegetation series
/// 3. Score trend, consistency, land-use change and climate resilience
/// 4. Aggregate the sustainability score
/// 5. Derive the loan decision
/// 6. Mint the certificate
/// 7. Attach the advisory narrative (recoverable; never blocks a decision)
///
/// Every entity is owned by this single invocation; nothing is shared
/// across concurrent evaluations.
use crate::certificate::mint_certificate;
use crate::climate::assess_climate_resilience;
use crate::errors::AppError;
use crate::land_change::detect_land_use_change;
use crate::loan::decide;
use crate::models::{
    Certificate, FarmPolygon, LoanDecision, LoanRequest, LookbackWindow, Narrative,
    SustainabilityScore,
};
use crate::narrative::{fallback_narrative, NarrativeClient};
use crate::policy::EvaluationPolicy;
use crate::scoring::aggregate;
use crate::series::build_series;
use crate::services::{ClimateSource, ImagerySource};
use crate::trend::assess_trend;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Result of one complete evaluation.
#[derive(Debug)]
pub struct EvaluationOutcome {
    pub evaluation_id: Uuid,
    pub score: SustainabilityScore,
    pub decision: LoanDecision,
    pub certificate: Certificate,
    pub narrative: Narrative,
}

/// A collaborator that fails to deliver usable data terminates the
/// evaluation as insufficient data, never as a partial score.
fn data_source_failure(source: &'static str) -> impl FnOnce(AppError) -> AppError {
    move |e| match e {
        AppError::ExternalApiError(msg) => AppError::InsufficientData(format!(
            "{} failed to deliver usable data: {}",
            source, msg
        )),
        other => other,
    }
}

pub async fn run_evaluation(
    imagery: &ImagerySource,
    climate: &ClimateSource,
    narrative_client: Option<&NarrativeClient>,
    policy: &EvaluationPolicy,
    polygon: FarmPolygon,
    request: LoanRequest,
    now: DateTime<Utc>,
) -> Result<EvaluationOutcome, AppError> {
    let evaluation_id = Uuid::new_v4();
    tracing::info!(
        "Starting evaluation {} for farmer {}",
        evaluation_id,
        request.farmer_reference
    );

    policy.validate()?;
    request.validate()?;

    let short_window = LookbackWindow::ending_at(now, policy.short_lookback_days);
    let long_window = LookbackWindow::ending_at(now, policy.long_lookback_days);

    tracing::info!("Step 1: Fetching observations and climate anomaly");
    let (short_raw, long_raw, anomaly) = tokio::join!(
        imagery.fetch_observations(&polygon, short_window),
        imagery.fetch_observations(&polygon, long_window),
        climate.fetch_anomaly(&polygon, short_window),
    );
    let short_raw = short_raw.map_err(data_source_failure("Imagery source"))?;
    let long_raw = long_raw.map_err(data_source_failure("Imagery source"))?;
    let anomaly = anomaly.map_err(data_source_failure("Climate source"))?;

    tracing::info!(
        "Step 2: Building vegetation series ({} short / {} long raw observations)",
        short_raw.len(),
        long_raw.len()
    );
    let short_series = build_series(short_raw, short_window, policy)?;
    let long_series = build_series(long_raw, long_window, policy)?;

    tracing::info!("Step 3: Scoring components");
    let trend_assessment = assess_trend(&short_series, policy);
    let change = detect_land_use_change(&long_series, policy)?;
    let climate_component = assess_climate_resilience(&anomaly, policy);

    tracing::info!("Step 4: Aggregating sustainability score");
    let score = aggregate(
        trend_assessment.vegetation_trend,
        trend_assessment.farming_consistency,
        change.no_deforestation,
        climate_component,
    )?;

    tracing::info!(
        "Step 5: Deciding loan terms (score {:.1}, deforestation flag {})",
        score.overall,
        change.deforestation_flag
    );
    let decision = decide(&score, change.deforestation_flag, &request, policy);

    tracing::info!("Step 6: Minting certificate");
    let certificate = mint_certificate(
        evaluation_id,
        now,
        polygon,
        score.clone(),
        decision.clone(),
    );

    // Narrative is advisory only: a reasoning-service failure downgrades
    // to a locally assembled fallback, clearly marked as such
    let narrative = match narrative_client {
        Some(client) => match client.generate(&score, &decision).await {
            Ok(narrative) => narrative,
            Err(e) => {
                tracing::warn!("Reasoning service failed, using fallback narrative: {}", e);
                fallback_narrative(&score, &decision)
            }
        },
        None => fallback_narrative(&score, &decision),
    };

    tracing::info!(
        "Evaluation {} complete: approved={}, fingerprint={}",
        evaluation_id,
        decision.approved,
        certificate.fingerprint
    );

    Ok(EvaluationOutcome {
        evaluation_id,
        score,
        decision,
        certificate,
        narrative,
    })
}
