use crate::errors::AppError;
use crate::models::{LoanDecision, Narrative, SustainabilityScore};
use serde_json::json;
use std::time::Duration;

/// Client for the reasoning service (LLM) that turns the score breakdown
/// into a free-text risk narrative.
///
/// Strictly advisory: the narrative is attached to the report after the
/// deterministic pipeline has finished, and a failure here never blocks a
/// decision. The client is optional at startup; without an API key the
/// engine runs with locally assembled fallback narratives.
#[derive(Clone)]
pub struct NarrativeClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl NarrativeClient {
    /// Creates a new `NarrativeClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the reasoning service.
    /// * `api_key` - The API key for authentication.
    pub fn new(base_url: String, api_key: String) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create reasoning client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url,
            api_key,
            model: "gemini-pro".to_string(),
        })
    }

    /// Requests a risk narrative for one evaluation.
    pub async fn generate(
        &self,
        score: &SustainabilityScore,
        decision: &LoanDecision,
    ) -> Result<Narrative, AppError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        tracing::info!("Requesting risk narrative from reasoning service");

        let body = json!({
            "contents": [{
                "parts": [{ "text": self.build_prompt(score, decision) }]
            }]
        });

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                AppError::ExternalApiError(format!("Reasoning service request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Reasoning service returned {}: {}",
                status, error_text
            )));
        }

        let response_data: serde_json::Value = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse reasoning response: {}", e))
        })?;

        let text = response_data
            .get("candidates")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.get(0))
            .and_then(|p| p.get("text"))
            .and_then(|t| t.as_str())
            .ok_or_else(|| {
                tracing::warn!("Unexpected reasoning response format: {:?}", response_data);
                AppError::ExternalApiError(
                    "Reasoning response missing candidate text".to_string(),
                )
            })?;

        tracing::info!("Risk narrative received ({} chars)", text.len());
        Ok(Narrative {
            summary: text.trim().to_string(),
            recommendations: Vec::new(),
            source: "model".to_string(),
        })
    }

    fn build_prompt(&self, score: &SustainabilityScore, decision: &LoanDecision) -> String {
        let mut prompt = String::from(
            "You are a sustainable credit officer reviewing an agricultural micro-loan.\n\
             Summarize the key risk factors and give practical recommendations for the farmer.\n\
             The decision below is final; do not second-guess it.\n\n",
        );
        prompt.push_str(&format!(
            "Overall sustainability score: {:.1}/100 (grade {})\n",
            score.overall, score.grade
        ));
        for component in score.breakdown.components() {
            prompt.push_str(&format!(
                "- {}: {:.1}/100 ({})\n",
                component.kind.key(),
                component.value,
                component.rationale
            ));
        }
        prompt.push_str(&format!(
            "Decision: {} ({} tier, amount {:.2}, rate {:.2}%)\n",
            if decision.approved { "APPROVED" } else { "REJECTED" },
            decision.risk_tier,
            decision.approved_amount,
            decision.interest_rate * 100.0
        ));
        prompt
    }
}

/// Locally assembled narrative used when the reasoning service is
/// disabled or unavailable. Clearly marked via `source = "fallback"`.
pub fn fallback_narrative(score: &SustainabilityScore, decision: &LoanDecision) -> Narrative {
    let mut lines = Vec::new();
    lines.push(format!(
        "Sustainability score {:.1}/100 (grade {}), {} tier.",
        score.overall, score.grade, decision.risk_tier
    ));
    for factor in &score.risk_factors {
        lines.push(format!("Risk: {}.", factor));
    }
    for factor in &score.positive_factors {
        lines.push(format!("Strength: {}.", factor));
    }

    let recommendations = if decision.approved {
        Vec::new()
    } else {
        vec![
            "Implement drought-resistant farming techniques".to_string(),
            "Consider crop diversification".to_string(),
            "Reapply after vegetation health stabilizes".to_string(),
        ]
    };

    Narrative {
        summary: lines.join(" "),
        recommendations,
        source: "fallback".to_string(),
    }
}
