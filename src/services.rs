use crate::cache_integrity::ValidatedCacheEntry;
use crate::circuit_breaker::{create_imagery_circuit_breaker, ImageryCircuitBreaker};
use crate::config::Config;
use crate::errors::AppError;
use crate::models::{ClimateAnomaly, FarmPolygon, LookbackWindow, VegetationObservation};
use chrono::{DateTime, Utc};
use failsafe::futures::CircuitBreaker;
use moka::future::Cache;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One scene record as returned by the imagery catalog: the catalog
/// delivers a per-scene vegetation index, the engine never touches raw
/// reflectance bands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneRecord {
    pub scene_id: String,
    pub acquired_at: DateTime<Utc>,
    pub ndvi_mean: f64,
    /// Cloud coverage fraction, [0, 1].
    pub cloud_cover: f64,
}

#[derive(Debug, Deserialize)]
struct SceneSearchResponse {
    scenes: Vec<SceneRecord>,
}

impl From<SceneRecord> for VegetationObservation {
    fn from(record: SceneRecord) -> Self {
        VegetationObservation {
            timestamp: record.acquired_at,
            index: record.ndvi_mean,
            cloud_cover: record.cloud_cover,
            scene_id: record.scene_id,
        }
    }
}

/// Client for the remote imagery catalog.
///
/// Catalog calls are the slowest and flakiest part of an evaluation, so
/// responses are cached per polygon and window (with checksum validation)
/// and the search itself runs behind a circuit breaker.
pub struct CatalogImageryService {
    client: Client,
    base_url: String,
    breaker: ImageryCircuitBreaker,
    response_cache: Cache<String, String>,
}

impl CatalogImageryService {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create imagery client: {}", e))
            })?;

        // Scene sets for a given window only change when new scenes are
        // published, so a 1 hour TTL is safe
        let response_cache = Cache::builder()
            .time_to_live(Duration::from_secs(3600))
            .max_capacity(10_000)
            .build();

        Ok(Self {
            client,
            base_url: config.imagery_base_url.clone(),
            breaker: create_imagery_circuit_breaker(),
            response_cache,
        })
    }

    /// Fetches all scene observations intersecting the polygon within the
    /// window. Short and long lookback windows are queried independently.
    pub async fn fetch_observations(
        &self,
        polygon: &FarmPolygon,
        window: LookbackWindow,
    ) -> Result<Vec<VegetationObservation>, AppError> {
        let centroid = polygon.centroid();
        let cache_key = format!(
            "{:.6},{:.6}:{}:{}",
            centroid.lat,
            centroid.lon,
            window.start.timestamp(),
            window.end.timestamp()
        );

        if let Some(serialized) = self.response_cache.get(&cache_key).await {
            if let Some(payload) = ValidatedCacheEntry::deserialize_and_validate(&serialized) {
                if let Ok(scenes) = serde_json::from_str::<Vec<SceneRecord>>(&payload) {
                    tracing::debug!("Imagery cache hit for {}", cache_key);
                    return Ok(scenes.into_iter().map(Into::into).collect());
                }
            }
            tracing::warn!("Discarding unusable imagery cache entry for {}", cache_key);
        }

        let scenes = self
            .breaker
            .call(self.search_scenes(polygon, window))
            .await
            .map_err(|e| match e {
                failsafe::Error::Inner(err) => err,
                failsafe::Error::Rejected => AppError::ExternalApiError(
                    "Imagery catalog circuit open, failing fast".to_string(),
                ),
            })?;

        if let Ok(payload) = serde_json::to_string(&scenes) {
            let entry = ValidatedCacheEntry::new(payload);
            self.response_cache
                .insert(cache_key, entry.serialize())
                .await;
        }

        Ok(scenes.into_iter().map(Into::into).collect())
    }

    async fn search_scenes(
        &self,
        polygon: &FarmPolygon,
        window: LookbackWindow,
    ) -> Result<Vec<SceneRecord>, AppError> {
        let (min_lon, min_lat, max_lon, max_lat) = polygon.bounding_box();
        let bbox = format!(
            "{:.6},{:.6},{:.6},{:.6}",
            min_lon, min_lat, max_lon, max_lat
        );

        let start = window.start.format("%Y-%m-%d").to_string();
        let end = window.end.format("%Y-%m-%d").to_string();

        // Build URL with proper parameter encoding
        let url = reqwest::Url::parse_with_params(
            &format!("{}/v1/scenes", self.base_url),
            &[
                ("collection", "sentinel-2-l2a"),
                ("bbox", bbox.as_str()),
                ("start", start.as_str()),
                ("end", end.as_str()),
            ],
        )
        .map_err(|e| AppError::ExternalApiError(format!("Failed to build URL: {}", e)))?;

        tracing::info!(
            "Searching imagery catalog: bbox {}, window {} to {}",
            bbox,
            window.start.format("%Y-%m-%d"),
            window.end.format("%Y-%m-%d")
        );

        let response = self.client.get(url).send().await.map_err(|e| {
            AppError::ExternalApiError(format!("Imagery catalog request failed: {}", e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("Imagery catalog returned error {}: {}", status, error_text);
            return Err(AppError::ExternalApiError(format!(
                "Imagery catalog returned status {}: {}",
                status, error_text
            )));
        }

        let result: SceneSearchResponse = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse catalog response: {}", e))
        })?;

        tracing::info!("Catalog returned {} scene(s)", result.scenes.len());
        Ok(result.scenes)
    }
}

/// Deterministic synthetic imagery for demos and offline runs. Produces a
/// mildly improving series with a small seasonal wobble; no randomness so
/// repeated evaluations stay reproducible.
pub struct MockImageryService {
    pub base_index: f64,
    pub daily_trend: f64,
}

impl Default for MockImageryService {
    fn default() -> Self {
        Self {
            base_index: 0.55,
            daily_trend: 0.0003,
        }
    }
}

impl MockImageryService {
    pub fn fetch_observations(
        &self,
        _polygon: &FarmPolygon,
        window: LookbackWindow,
    ) -> Vec<VegetationObservation> {
        let days = window.duration_days();
        let mut observations = Vec::new();
        let mut i = 0i64;
        loop {
            let day = i * 16 + 3;
            if day > days {
                break;
            }
            let wobble = 0.04 * ((i as f64) * 1.7).sin();
            let index = (self.base_index + self.daily_trend * day as f64 + wobble)
                .clamp(-1.0, 1.0);
            let cloud_cover = 0.05 + 0.3 * ((i as f64) * 2.3).sin().abs();
            observations.push(VegetationObservation {
                timestamp: window.start + chrono::Duration::days(day),
                index,
                cloud_cover,
                scene_id: format!("mock-{}-{:03}", window.start.format("%Y%m%d"), i),
            });
            i += 1;
        }
        observations
    }
}

/// Swappable imagery capability. Demo mode is an alternate implementation
/// of the collaborator, never a branch inside the scoring engine.
pub enum ImagerySource {
    Catalog(CatalogImageryService),
    Mock(MockImageryService),
}

impl ImagerySource {
    pub async fn fetch_observations(
        &self,
        polygon: &FarmPolygon,
        window: LookbackWindow,
    ) -> Result<Vec<VegetationObservation>, AppError> {
        match self {
            ImagerySource::Catalog(service) => service.fetch_observations(polygon, window).await,
            ImagerySource::Mock(service) => Ok(service.fetch_observations(polygon, window)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ArchiveResponse {
    daily: ArchiveDaily,
}

#[derive(Debug, Deserialize)]
struct ArchiveDaily {
    #[serde(default)]
    precipitation_sum: Vec<Option<f64>>,
    #[serde(default)]
    et0_fao_evapotranspiration: Vec<Option<f64>>,
}

/// Client for the historical weather archive. Derives the bounded anomaly
/// metrics the resilience estimator consumes from daily precipitation vs.
/// reference evapotranspiration (water balance).
pub struct ArchiveClimateService {
    client: Client,
    base_url: String,
}

impl ArchiveClimateService {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create climate client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.climate_base_url.clone(),
        })
    }

    pub async fn fetch_anomaly(
        &self,
        polygon: &FarmPolygon,
        window: LookbackWindow,
    ) -> Result<ClimateAnomaly, AppError> {
        let centroid = polygon.centroid();

        let latitude = format!("{:.6}", centroid.lat);
        let longitude = format!("{:.6}", centroid.lon);
        let start = window.start.format("%Y-%m-%d").to_string();
        let end = window.end.format("%Y-%m-%d").to_string();

        let url = reqwest::Url::parse_with_params(
            &format!("{}/v1/archive", self.base_url),
            &[
                ("latitude", latitude.as_str()),
                ("longitude", longitude.as_str()),
                ("start_date", start.as_str()),
                ("end_date", end.as_str()),
                ("daily", "precipitation_sum,et0_fao_evapotranspiration"),
                ("timezone", "UTC"),
            ],
        )
        .map_err(|e| AppError::ExternalApiError(format!("Failed to build URL: {}", e)))?;

        tracing::info!(
            "Fetching climate archive for ({:.4}, {:.4}), window {} to {}",
            centroid.lat,
            centroid.lon,
            window.start.format("%Y-%m-%d"),
            window.end.format("%Y-%m-%d")
        );

        let response = self.client.get(url).send().await.map_err(|e| {
            AppError::ExternalApiError(format!("Climate archive request failed: {}", e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("Climate archive returned error {}: {}", status, error_text);
            return Err(AppError::ExternalApiError(format!(
                "Climate archive returned status {}: {}",
                status, error_text
            )));
        }

        let result: ArchiveResponse = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse archive response: {}", e))
        })?;

        let precipitation: Vec<f64> = result
            .daily
            .precipitation_sum
            .into_iter()
            .flatten()
            .collect();
        let evapotranspiration: Vec<f64> = result
            .daily
            .et0_fao_evapotranspiration
            .into_iter()
            .flatten()
            .collect();

        if precipitation.is_empty() {
            return Err(AppError::ExternalApiError(
                "Climate archive returned no daily precipitation data".to_string(),
            ));
        }

        let total_precipitation: f64 = precipitation.iter().sum();
        let total_demand: f64 = evapotranspiration.iter().sum();

        let anomaly = if total_demand > 0.0 {
            let water_balance = total_precipitation / total_demand;
            ClimateAnomaly {
                drought_index: (1.0 - water_balance).clamp(0.0, 1.0),
                precipitation_anomaly: (water_balance - 1.0).clamp(-1.0, 1.0),
            }
        } else {
            // No reference demand reported; the archive documents this as
            // "insufficient coverage" and we report a neutral anomaly
            tracing::warn!("Climate archive delivered no evapotranspiration data, neutral anomaly");
            ClimateAnomaly {
                drought_index: 0.5,
                precipitation_anomaly: 0.0,
            }
        };

        tracing::info!(
            "Climate anomaly: drought {:.2}, precipitation {:+.2}",
            anomaly.drought_index,
            anomaly.precipitation_anomaly
        );
        Ok(anomaly)
    }
}

/// Deterministic mild-drought anomaly for demos and offline runs.
pub struct MockClimateService {
    pub anomaly: ClimateAnomaly,
}

impl Default for MockClimateService {
    fn default() -> Self {
        Self {
            anomaly: ClimateAnomaly {
                drought_index: 0.25,
                precipitation_anomaly: -0.10,
            },
        }
    }
}

/// Swappable climate capability, mirroring `ImagerySource`.
pub enum ClimateSource {
    Archive(ArchiveClimateService),
    Mock(MockClimateService),
}

impl ClimateSource {
    pub async fn fetch_anomaly(
        &self,
        polygon: &FarmPolygon,
        window: LookbackWindow,
    ) -> Result<ClimateAnomaly, AppError> {
        match self {
            ClimateSource::Archive(service) => service.fetch_anomaly(polygon, window).await,
            ClimateSource::Mock(service) => Ok(service.anomaly),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_mock_imagery_is_deterministic() {
        let polygon = FarmPolygon::new(vec![(0.0, 0.0), (0.0, 0.01), (0.01, 0.01), (0.01, 0.0)])
            .unwrap();
        let end = Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap();
        let window = LookbackWindow::ending_at(end, 180);

        let mock = MockImageryService::default();
        let a = mock.fetch_observations(&polygon, window);
        let b = mock.fetch_observations(&polygon, window);
        assert_eq!(a, b);
        assert!(a.len() >= 10);
        assert!(a.iter().all(|o| (-1.0..=1.0).contains(&o.index)));
    }

    #[test]
    fn test_mock_imagery_observations_ordered() {
        let polygon = FarmPolygon::new(vec![(0.0, 0.0), (0.0, 0.01), (0.01, 0.01), (0.01, 0.0)])
            .unwrap();
        let end = Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap();
        let window = LookbackWindow::ending_at(end, 730);

        let observations = MockImageryService::default().fetch_observations(&polygon, window);
        for pair in observations.windows(2) {
            assert!(pair[0].timestamp < pair[1].timestamp);
        }
    }
}
