use crate::models::{Certificate, FarmPolygon, LoanDecision, SustainabilityScore};
use chrono::{DateTime, Utc};
use hex;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Certificate minter.
///
/// Serializes one evaluation into a canonical record (stable field order,
/// stable numeric formatting) and computes a SHA-256 fingerprint over the
/// exact bytes of that record. The fingerprint stands in for a ledger
/// anchor: the minter performs no network call, and any byte-level change
/// to the inputs changes the fingerprint.
///
/// Canonical formatting rules:
/// - scores: one decimal
/// - amounts: two decimals
/// - rates and weights: four decimals
/// - coordinates: six decimals
/// - timestamps: RFC 3339 at second precision, UTC
/// - one `key=value` pair per line, `\n` separated, no trailing newline

/// Bumped if the canonical layout ever changes, so old fingerprints stay
/// verifiable against their own layout.
const CANONICAL_VERSION: u32 = 1;

pub fn mint_certificate(
    evaluation_id: Uuid,
    issued_at: DateTime<Utc>,
    polygon: FarmPolygon,
    score: SustainabilityScore,
    decision: LoanDecision,
) -> Certificate {
    let canonical = canonical_serialization(evaluation_id, issued_at, &polygon, &score, &decision);
    let fingerprint = fingerprint_of(&canonical);

    tracing::info!(
        "Minted certificate {} for evaluation {}",
        fingerprint,
        evaluation_id
    );

    Certificate {
        evaluation_id,
        issued_at,
        polygon,
        score,
        decision,
        fingerprint,
    }
}

/// Recomputes the fingerprint of an existing certificate. Used to verify
/// that an exported certificate has not been tampered with.
pub fn verify_certificate(certificate: &Certificate) -> bool {
    let canonical = canonical_serialization(
        certificate.evaluation_id,
        certificate.issued_at,
        &certificate.polygon,
        &certificate.score,
        &certificate.decision,
    );
    fingerprint_of(&canonical) == certificate.fingerprint
}

fn fingerprint_of(canonical: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("0x{}", hex::encode(hasher.finalize()))
}

fn canonical_serialization(
    evaluation_id: Uuid,
    issued_at: DateTime<Utc>,
    polygon: &FarmPolygon,
    score: &SustainabilityScore,
    decision: &LoanDecision,
) -> String {
    let mut lines: Vec<String> = Vec::new();

    lines.push(format!("version={}", CANONICAL_VERSION));
    lines.push(format!("evaluation_id={}", evaluation_id));
    lines.push(format!(
        "issued_at={}",
        issued_at.format("%Y-%m-%dT%H:%M:%SZ")
    ));

    let ring = polygon
        .vertices()
        .iter()
        .map(|v| format!("{:.6},{:.6}", v.lat, v.lon))
        .collect::<Vec<_>>()
        .join(";");
    lines.push(format!("polygon={}", ring));
    let centroid = polygon.centroid();
    lines.push(format!(
        "centroid={:.6},{:.6}",
        centroid.lat, centroid.lon
    ));

    lines.push(format!("score.overall={:.1}", score.overall));
    lines.push(format!("score.grade={}", score.grade));
    for component in score.breakdown.components() {
        lines.push(format!(
            "component.{}={:.1}|{:.4}|{}",
            component.kind.key(),
            component.value,
            component.weight,
            component.rationale
        ));
    }

    lines.push(format!("decision.approved={}", decision.approved));
    lines.push(format!("decision.risk_tier={}", decision.risk_tier));
    lines.push(format!(
        "decision.approved_amount={:.2}",
        decision.approved_amount
    ));
    lines.push(format!(
        "decision.interest_rate={:.4}",
        decision.interest_rate
    ));
    lines.push(format!(
        "decision.deforestation_veto={}",
        decision.deforestation_veto
    ));

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ComponentKind, Grade, RiskTier, ScoreBreakdown, ScoreComponent,
    };
    use chrono::TimeZone;

    fn fixture() -> (Uuid, DateTime<Utc>, FarmPolygon, SustainabilityScore, LoanDecision) {
        let evaluation_id = Uuid::from_u128(0x1234_5678_9abc_def0_1234_5678_9abc_def0);
        let issued_at = Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0).unwrap();
        let polygon = FarmPolygon::new(vec![
            (-3.4653, -62.2159),
            (-3.4653, -62.2049),
            (-3.4553, -62.2049),
            (-3.4553, -62.2159),
        ])
        .unwrap();
        let component = |kind, value, weight, rationale: &str| ScoreComponent {
            kind,
            value,
            weight,
            rationale: rationale.to_string(),
        };
        let score = SustainabilityScore {
            overall: 82.4,
            grade: Grade::A,
            breakdown: ScoreBreakdown {
                vegetation_trend: component(
                    ComponentKind::VegetationTrend,
                    78.0,
                    0.30,
                    "improving vegetation trend (+0.080/window)",
                ),
                farming_consistency: component(
                    ComponentKind::FarmingConsistency,
                    90.0,
                    0.20,
                    "coefficient of variation 0.050 across 10 observations",
                ),
                no_deforestation: component(
                    ComponentKind::NoDeforestation,
                    100.0,
                    0.35,
                    "no deforestation signal: baseline mean 0.650, recent mean 0.670",
                ),
                climate_resilience: component(
                    ComponentKind::ClimateResilience,
                    75.0,
                    0.15,
                    "drought index 0.25, precipitation anomaly -0.10",
                ),
            },
            risk_factors: vec![],
            positive_factors: vec!["No signs of recent deforestation".to_string()],
        };
        let decision = LoanDecision {
            approved: true,
            risk_tier: RiskTier::Low,
            approved_amount: 1000.0,
            interest_rate: 0.08,
            deforestation_veto: false,
            decision_factors: vec!["Sustainability score 82.4/100 (grade A) -> LOW tier".to_string()],
        };
        (evaluation_id, issued_at, polygon, score, decision)
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let (id, at, polygon, score, decision) = fixture();
        let a = mint_certificate(id, at, polygon.clone(), score.clone(), decision.clone());
        let b = mint_certificate(id, at, polygon, score, decision);
        assert_eq!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn test_fingerprint_shape() {
        let (id, at, polygon, score, decision) = fixture();
        let certificate = mint_certificate(id, at, polygon, score, decision);
        assert!(certificate.fingerprint.starts_with("0x"));
        assert_eq!(certificate.fingerprint.len(), 2 + 64);
        assert!(certificate.fingerprint[2..]
            .chars()
            .all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_one_unit_amount_change_changes_fingerprint() {
        let (id, at, polygon, score, decision) = fixture();
        let original = mint_certificate(id, at, polygon.clone(), score.clone(), decision.clone());

        let mut tampered = decision;
        tampered.approved_amount += 1.0;
        let reminted = mint_certificate(id, at, polygon, score, tampered);

        assert_ne!(original.fingerprint, reminted.fingerprint);
    }

    #[test]
    fn test_any_field_change_changes_fingerprint() {
        let (id, at, polygon, score, decision) = fixture();
        let original = mint_certificate(id, at, polygon.clone(), score.clone(), decision.clone());

        let mut other_score = score.clone();
        other_score.overall = 82.5;
        let changed_score =
            mint_certificate(id, at, polygon.clone(), other_score, decision.clone());
        assert_ne!(original.fingerprint, changed_score.fingerprint);

        let later = at + chrono::Duration::seconds(1);
        let changed_time = mint_certificate(id, later, polygon, score, decision);
        assert_ne!(original.fingerprint, changed_time.fingerprint);
    }

    #[test]
    fn test_verify_detects_tampering() {
        let (id, at, polygon, score, decision) = fixture();
        let certificate = mint_certificate(id, at, polygon, score, decision);
        assert!(verify_certificate(&certificate));

        let mut tampered = certificate;
        tampered.decision.approved_amount = 999_999.0;
        assert!(!verify_certificate(&tampered));
    }
}
