use crate::config::Config;
use crate::errors::AppError;
use crate::evaluation::run_evaluation;
use crate::models::{
    Certificate, EvaluationRequest, EvaluationResponse, FarmPolygon, LoanPurpose, LoanRequest,
};
use crate::narrative::NarrativeClient;
use crate::policy::EvaluationPolicy;
use crate::services::{ClimateSource, ImagerySource};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use moka::future::Cache;
use serde_json::json;
use std::sync::Arc;

/// Shared application state injected into handlers.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Immutable evaluation policy applied to every evaluation.
    pub policy: EvaluationPolicy,
    /// Imagery capability (remote catalog, or deterministic mock).
    pub imagery: ImagerySource,
    /// Climate capability (weather archive, or deterministic mock).
    pub climate: ClimateSource,
    /// Reasoning service client; None runs with fallback narratives.
    pub narrative_client: Option<NarrativeClient>,
    /// Issued certificates by fingerprint, served to the export endpoint.
    pub certificate_cache: Cache<String, Certificate>,
}

/// Health check endpoint.
///
/// Returns the service status, version, and health information.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "greenchain-api",
            "version": "0.1.0"
        })),
    )
}

/// POST /api/v1/evaluations
///
/// Runs the full sustainability evaluation for one farm polygon and loan
/// request, returning the score breakdown, the decision, the minted
/// certificate and the advisory narrative.
///
/// # Errors
///
/// * 400 - malformed polygon or loan request
/// * 422 - too few usable vegetation observations for the window
/// * 502 - a collaborator failed in a non-data way
pub async fn create_evaluation(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<EvaluationRequest>,
) -> Result<Json<EvaluationResponse>, AppError> {
    tracing::info!(
        "POST /api/v1/evaluations - farmer: {}, amount: {}, purpose: {}",
        payload.farmer_reference,
        payload.requested_amount,
        payload.purpose
    );

    // Polygon and request validation happen before any fetch
    let polygon = FarmPolygon::new(payload.polygon)?;
    let purpose = LoanPurpose::parse(&payload.purpose).ok_or_else(|| {
        AppError::InvalidLoanRequest(format!("Unknown loan purpose '{}'", payload.purpose))
    })?;
    let request = LoanRequest {
        amount: payload.requested_amount,
        purpose,
        farmer_reference: payload.farmer_reference,
    };

    let outcome = run_evaluation(
        &state.imagery,
        &state.climate,
        state.narrative_client.as_ref(),
        &state.policy,
        polygon,
        request,
        chrono::Utc::now(),
    )
    .await?;

    state
        .certificate_cache
        .insert(
            outcome.certificate.fingerprint.clone(),
            outcome.certificate.clone(),
        )
        .await;

    Ok(Json(EvaluationResponse {
        evaluation_id: outcome.evaluation_id,
        score: outcome.score,
        decision: outcome.decision,
        certificate: outcome.certificate,
        narrative: outcome.narrative,
    }))
}

/// GET /api/v1/certificates/:fingerprint
///
/// Certificate export for the document-generation and persistence
/// collaborators: returns the full certificate (all fields plus
/// fingerprint) in serializable form.
pub async fn get_certificate(
    State(state): State<Arc<AppState>>,
    Path(fingerprint): Path<String>,
) -> Result<Json<Certificate>, AppError> {
    tracing::info!("GET /api/v1/certificates/{}", fingerprint);

    match state.certificate_cache.get(&fingerprint).await {
        Some(certificate) => Ok(Json(certificate)),
        None => Err(AppError::NotFound(format!(
            "No certificate with fingerprint {}",
            fingerprint
        ))),
    }
}
