use crate::errors::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============ Geospatial Models ============

/// A single polygon vertex in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    /// Latitude in decimal degrees, [-90, 90].
    pub lat: f64,
    /// Longitude in decimal degrees, [-180, 180].
    pub lon: f64,
}

/// A farm plot boundary.
///
/// Ordered sequence of vertices (at least 3, auto-closed), with a centroid
/// used for single-point queries against the climate archive.
/// Invariants: coordinates in range, non-self-intersecting, area > 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmPolygon {
    vertices: Vec<Vertex>,
    centroid: Vertex,
}

impl FarmPolygon {
    /// Builds a validated polygon from (lat, lon) vertex pairs.
    ///
    /// A trailing vertex equal to the first is treated as an explicit close
    /// and dropped. All invariant violations are rejected with
    /// `AppError::InvalidPolygon` before any external fetch happens.
    pub fn new(raw: Vec<(f64, f64)>) -> Result<Self, AppError> {
        let mut points: Vec<Vertex> = raw
            .into_iter()
            .map(|(lat, lon)| Vertex { lat, lon })
            .collect();

        // Auto-close: drop an explicit closing vertex
        if points.len() > 1 && points.first() == points.last() {
            points.pop();
        }

        if points.len() < 3 {
            return Err(AppError::InvalidPolygon(format!(
                "Polygon requires at least 3 distinct vertices, got {}",
                points.len()
            )));
        }

        for (i, v) in points.iter().enumerate() {
            if !v.lat.is_finite() || !v.lon.is_finite() {
                return Err(AppError::InvalidPolygon(format!(
                    "Vertex {} has non-finite coordinates",
                    i
                )));
            }
            if !(-90.0..=90.0).contains(&v.lat) {
                return Err(AppError::InvalidPolygon(format!(
                    "Vertex {} latitude {} out of range [-90, 90]",
                    i, v.lat
                )));
            }
            if !(-180.0..=180.0).contains(&v.lon) {
                return Err(AppError::InvalidPolygon(format!(
                    "Vertex {} longitude {} out of range [-180, 180]",
                    i, v.lon
                )));
            }
        }

        let area = shoelace_area(&points);
        if area <= f64::EPSILON {
            return Err(AppError::InvalidPolygon(
                "Polygon has zero area (degenerate or collinear vertices)".to_string(),
            ));
        }

        if has_self_intersection(&points) {
            return Err(AppError::InvalidPolygon(
                "Polygon edges intersect each other".to_string(),
            ));
        }

        let centroid = polygon_centroid(&points);

        Ok(Self {
            vertices: points,
            centroid,
        })
    }

    /// The validated vertex ring (without the closing vertex).
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Area-weighted centroid, used for single-point climate queries.
    pub fn centroid(&self) -> Vertex {
        self.centroid
    }

    /// Bounding box as (min_lon, min_lat, max_lon, max_lat), the order
    /// imagery catalogs expect.
    pub fn bounding_box(&self) -> (f64, f64, f64, f64) {
        let mut min_lon = f64::INFINITY;
        let mut min_lat = f64::INFINITY;
        let mut max_lon = f64::NEG_INFINITY;
        let mut max_lat = f64::NEG_INFINITY;
        for v in &self.vertices {
            min_lon = min_lon.min(v.lon);
            min_lat = min_lat.min(v.lat);
            max_lon = max_lon.max(v.lon);
            max_lat = max_lat.max(v.lat);
        }
        (min_lon, min_lat, max_lon, max_lat)
    }
}

/// Planar shoelace area over decimal degrees. Only used to reject
/// degenerate rings, so the unit does not matter.
fn shoelace_area(points: &[Vertex]) -> f64 {
    let n = points.len();
    let mut acc = 0.0;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        acc += a.lon * b.lat - b.lon * a.lat;
    }
    (acc / 2.0).abs()
}

fn polygon_centroid(points: &[Vertex]) -> Vertex {
    let n = points.len();
    let mut cx = 0.0;
    let mut cy = 0.0;
    let mut signed_area = 0.0;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        let cross = a.lon * b.lat - b.lon * a.lat;
        signed_area += cross;
        cx += (a.lon + b.lon) * cross;
        cy += (a.lat + b.lat) * cross;
    }
    signed_area /= 2.0;
    Vertex {
        lat: cy / (6.0 * signed_area),
        lon: cx / (6.0 * signed_area),
    }
}

/// Proper-intersection check over all non-adjacent edge pairs.
fn has_self_intersection(points: &[Vertex]) -> bool {
    let n = points.len();
    for i in 0..n {
        let a1 = points[i];
        let a2 = points[(i + 1) % n];
        for j in (i + 1)..n {
            // Skip adjacent edges (they share an endpoint)
            if j == i || (j + 1) % n == i || (i + 1) % n == j {
                continue;
            }
            let b1 = points[j];
            let b2 = points[(j + 1) % n];
            if segments_properly_intersect(a1, a2, b1, b2) {
                return true;
            }
        }
    }
    false
}

fn segments_properly_intersect(p1: Vertex, p2: Vertex, q1: Vertex, q2: Vertex) -> bool {
    fn orient(a: Vertex, b: Vertex, c: Vertex) -> f64 {
        (b.lon - a.lon) * (c.lat - a.lat) - (b.lat - a.lat) * (c.lon - a.lon)
    }
    let d1 = orient(p1, p2, q1);
    let d2 = orient(p1, p2, q2);
    let d3 = orient(q1, q2, p1);
    let d4 = orient(q1, q2, p2);
    (d1 * d2 < 0.0) && (d3 * d4 < 0.0)
}

// ============ Vegetation Models ============

/// One satellite-derived vegetation measurement. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VegetationObservation {
    /// Acquisition timestamp of the source scene.
    pub timestamp: DateTime<Utc>,
    /// Vegetation index value (nominal NDVI range [-1, 1]).
    pub index: f64,
    /// Cloud coverage fraction of the scene, [0, 1].
    pub cloud_cover: f64,
    /// Identifier of the source scene in the imagery catalog.
    pub scene_id: String,
}

/// A fixed historical time span over which observations are gathered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LookbackWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl LookbackWindow {
    /// A window of `days` ending at `end`.
    pub fn ending_at(end: DateTime<Utc>, days: i64) -> Self {
        Self {
            start: end - chrono::Duration::days(days),
            end,
        }
    }

    pub fn duration_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }
}

/// Ordered-by-timestamp vegetation observations for one polygon and one
/// lookback window. Timestamps are strictly increasing; the series is
/// sparse (missing intervals stay absent, they are never zero-filled).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VegetationSeries {
    window: LookbackWindow,
    observations: Vec<VegetationObservation>,
}

impl VegetationSeries {
    /// Wraps observations after checking the strict-ordering invariant.
    pub fn new(
        window: LookbackWindow,
        observations: Vec<VegetationObservation>,
    ) -> Result<Self, AppError> {
        for pair in observations.windows(2) {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(AppError::InternalError(
                    "Vegetation series timestamps must be strictly increasing".to_string(),
                ));
            }
        }
        Ok(Self {
            window,
            observations,
        })
    }

    pub fn window(&self) -> LookbackWindow {
        self.window
    }

    pub fn observations(&self) -> &[VegetationObservation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.observations.iter().map(|o| o.index)
    }

    pub fn mean_index(&self) -> Option<f64> {
        if self.observations.is_empty() {
            return None;
        }
        Some(self.values().sum::<f64>() / self.observations.len() as f64)
    }

    /// Observations falling inside `window` (used by the change detector to
    /// slice baseline and recent quarters out of the long series).
    pub fn slice(&self, window: LookbackWindow) -> Vec<&VegetationObservation> {
        self.observations
            .iter()
            .filter(|o| window.contains(o.timestamp))
            .collect()
    }
}

// ============ Scoring Models ============

/// The four fixed score dimensions. A closed enum (not an open mapping)
/// keeps the weight-sum invariant checkable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    VegetationTrend,
    FarmingConsistency,
    NoDeforestation,
    ClimateResilience,
}

impl ComponentKind {
    /// Stable key used in the canonical certificate serialization.
    pub fn key(&self) -> &'static str {
        match self {
            ComponentKind::VegetationTrend => "vegetation_trend",
            ComponentKind::FarmingConsistency => "farming_consistency",
            ComponentKind::NoDeforestation => "no_deforestation",
            ComponentKind::ClimateResilience => "climate_resilience",
        }
    }
}

/// One scored dimension of the sustainability assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub kind: ComponentKind,
    /// Component score, [0, 100].
    pub value: f64,
    /// Aggregation weight, [0, 1]. The four weights sum to 1.
    pub weight: f64,
    /// Human-readable rationale for auditability. Single line.
    pub rationale: String,
}

/// The full four-component breakdown. Fixed structure by design.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub vegetation_trend: ScoreComponent,
    pub farming_consistency: ScoreComponent,
    pub no_deforestation: ScoreComponent,
    pub climate_resilience: ScoreComponent,
}

impl ScoreBreakdown {
    pub fn components(&self) -> [&ScoreComponent; 4] {
        [
            &self.vegetation_trend,
            &self.farming_consistency,
            &self.no_deforestation,
            &self.climate_resilience,
        ]
    }
}

/// Letter grade derived from the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Grade::A => write!(f, "A"),
            Grade::B => write!(f, "B"),
            Grade::C => write!(f, "C"),
            Grade::D => write!(f, "D"),
            Grade::F => write!(f, "F"),
        }
    }
}

/// Overall sustainability assessment with its auditable breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SustainabilityScore {
    /// Weighted sum of the breakdown, [0, 100], rounded to one decimal.
    pub overall: f64,
    pub grade: Grade,
    pub breakdown: ScoreBreakdown,
    /// Flags derived from weak components. Presentation metadata only.
    pub risk_factors: Vec<String>,
    /// Flags derived from strong components. Presentation metadata only.
    pub positive_factors: Vec<String>,
}

// ============ Loan Models ============

/// Recognized loan purposes. Unknown purpose strings fail request
/// validation with `InvalidLoanRequestError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanPurpose {
    Irrigation,
    Seeds,
    Equipment,
    Livestock,
    Solar,
    Conservation,
    Other,
}

impl LoanPurpose {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "irrigation" => Some(LoanPurpose::Irrigation),
            "seeds" => Some(LoanPurpose::Seeds),
            "equipment" => Some(LoanPurpose::Equipment),
            "livestock" => Some(LoanPurpose::Livestock),
            "solar" => Some(LoanPurpose::Solar),
            "conservation" => Some(LoanPurpose::Conservation),
            "other" => Some(LoanPurpose::Other),
            _ => None,
        }
    }

    /// Purposes that directly improve sustainability earn a rate discount.
    pub fn is_sustainable(&self) -> bool {
        matches!(
            self,
            LoanPurpose::Irrigation | LoanPurpose::Solar | LoanPurpose::Conservation
        )
    }

    pub fn key(&self) -> &'static str {
        match self {
            LoanPurpose::Irrigation => "irrigation",
            LoanPurpose::Seeds => "seeds",
            LoanPurpose::Equipment => "equipment",
            LoanPurpose::Livestock => "livestock",
            LoanPurpose::Solar => "solar",
            LoanPurpose::Conservation => "conservation",
            LoanPurpose::Other => "other",
        }
    }
}

/// An incoming micro-loan application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanRequest {
    /// Requested amount in the institution's currency, > 0.
    pub amount: f64,
    pub purpose: LoanPurpose,
    /// Farmer or account reference supplied by the caller.
    pub farmer_reference: String,
}

impl LoanRequest {
    /// Rejects non-positive or non-finite amounts.
    pub fn validate(&self) -> Result<(), AppError> {
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(AppError::InvalidLoanRequest(format!(
                "Requested amount must be positive, got {}",
                self.amount
            )));
        }
        Ok(())
    }
}

/// Discrete risk bucket driving loan terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskTier {
    Low,
    Medium,
    High,
    Rejected,
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskTier::Low => write!(f, "LOW"),
            RiskTier::Medium => write!(f, "MEDIUM"),
            RiskTier::High => write!(f, "HIGH"),
            RiskTier::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// Deterministic loan decision. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanDecision {
    pub approved: bool,
    pub risk_tier: RiskTier,
    /// Granted amount, <= requested amount. Zero when not approved.
    pub approved_amount: f64,
    /// Yearly interest rate as a decimal fraction. Zero when not approved.
    pub interest_rate: f64,
    /// Whether the deforestation veto was applied.
    pub deforestation_veto: bool,
    /// Transparent record of the numeric inputs behind the decision.
    pub decision_factors: Vec<String>,
}

// ============ Climate Models ============

/// Bounded anomaly metrics delivered by the climate collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClimateAnomaly {
    /// Drought severity, [0, 1] (0 = no drought signal).
    pub drought_index: f64,
    /// Precipitation anomaly vs. reference demand, [-1, 1]
    /// (negative = deficit, positive = surplus).
    pub precipitation_anomaly: f64,
}

// ============ Certificate Models ============

/// Tamper-evident record of one evaluation.
///
/// Created once, immutable. The fingerprint over the canonical
/// serialization is the sole externally verifiable identity; "anchoring"
/// is simulated by the fingerprint alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    pub evaluation_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub polygon: FarmPolygon,
    pub score: SustainabilityScore,
    pub decision: LoanDecision,
    /// `0x`-prefixed hex SHA-256 of the canonical serialization.
    pub fingerprint: String,
}

// ============ Narrative Models ============

/// Advisory free-text risk narrative. Never feeds back into the numeric
/// score or decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Narrative {
    pub summary: String,
    pub recommendations: Vec<String>,
    /// "model" when produced by the reasoning service, "fallback" when the
    /// service was unavailable and the narrative was assembled locally.
    pub source: String,
}

// ============ API Models ============

/// Request body for `POST /api/v1/evaluations`.
#[derive(Debug, Clone, Deserialize)]
pub struct EvaluationRequest {
    /// Polygon vertices as (lat, lon) pairs.
    pub polygon: Vec<(f64, f64)>,
    pub requested_amount: f64,
    /// One of the recognized purpose tags.
    pub purpose: String,
    pub farmer_reference: String,
}

/// Response body for `POST /api/v1/evaluations`.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationResponse {
    pub evaluation_id: Uuid,
    pub score: SustainabilityScore,
    pub decision: LoanDecision,
    pub certificate: Certificate,
    pub narrative: Narrative,
}
