use crate::policy::EvaluationPolicy;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub imagery_base_url: String,
    pub climate_base_url: String,
    pub reasoning_base_url: String,
    pub reasoning_api_key: Option<String>, // Narrative disabled when absent
    pub mock_providers: bool,
    pub policy_path: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            imagery_base_url: std::env::var("IMAGERY_BASE_URL")
                .unwrap_or_else(|_| "https://earth-search.aws.element84.com".to_string())
                .trim()
                .to_string(),
            climate_base_url: std::env::var("CLIMATE_BASE_URL")
                .unwrap_or_else(|_| "https://archive-api.open-meteo.com".to_string())
                .trim()
                .to_string(),
            reasoning_base_url: std::env::var("REASONING_BASE_URL")
                .unwrap_or_else(|_| {
                    "https://generativelanguage.googleapis.com".to_string()
                })
                .trim()
                .to_string(),
            reasoning_api_key: std::env::var("REASONING_API_KEY")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            mock_providers: std::env::var("MOCK_PROVIDERS")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            policy_path: std::env::var("POLICY_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty()),
        };

        for (name, url) in [
            ("IMAGERY_BASE_URL", &config.imagery_base_url),
            ("CLIMATE_BASE_URL", &config.climate_base_url),
            ("REASONING_BASE_URL", &config.reasoning_base_url),
        ] {
            if url.is_empty() {
                anyhow::bail!("{} cannot be empty", name);
            }
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("{} must start with http:// or https://", name);
            }
        }

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Imagery Base URL: {}", config.imagery_base_url);
        tracing::debug!("Climate Base URL: {}", config.climate_base_url);
        tracing::debug!(
            "Reasoning service: {}",
            if config.reasoning_api_key.is_some() {
                "enabled"
            } else {
                "disabled (no REASONING_API_KEY)"
            }
        );
        if config.mock_providers {
            tracing::warn!("MOCK_PROVIDERS active: imagery and climate data are simulated");
        }
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    /// Loads the evaluation policy: from `POLICY_PATH` when configured,
    /// otherwise the built-in defaults. Invalid policies abort startup.
    pub fn load_policy(&self) -> anyhow::Result<EvaluationPolicy> {
        let policy = match &self.policy_path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .map_err(|e| anyhow::anyhow!("Failed to read policy file {}: {}", path, e))?;
                let policy: EvaluationPolicy = serde_json::from_str(&raw)
                    .map_err(|e| anyhow::anyhow!("Failed to parse policy file {}: {}", path, e))?;
                tracing::info!("Evaluation policy loaded from {}", path);
                policy
            }
            None => {
                tracing::info!("Using default evaluation policy");
                EvaluationPolicy::default()
            }
        };

        policy
            .validate()
            .map_err(|e| anyhow::anyhow!("Policy rejected: {}", e))?;
        Ok(policy)
    }
}
