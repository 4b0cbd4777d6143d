/// Loan risk calculator.
///
/// Maps the overall sustainability score and the loan request to an
/// approve/reject decision, a granted amount and an interest rate. Two
/// structural invariants hold regardless of configuration: confirmed
/// deforestation vetoes approval (no score can offset it), and loan terms
/// degrade monotonically across tiers.
use crate::models::{LoanDecision, LoanRequest, RiskTier, SustainabilityScore};
use crate::policy::EvaluationPolicy;

pub fn decide(
    score: &SustainabilityScore,
    deforestation_flag: bool,
    request: &LoanRequest,
    policy: &EvaluationPolicy,
) -> LoanDecision {
    let tier = tier_for(score.overall, policy);
    let approved = tier != RiskTier::Rejected && !deforestation_flag;

    let mut factors = vec![format!(
        "Sustainability score {:.1}/100 (grade {}) -> {} tier",
        score.overall, score.grade, tier
    )];

    if deforestation_flag {
        factors.push(
            "Deforestation veto applied: confirmed sustained vegetation loss".to_string(),
        );
    }

    let (approved_amount, interest_rate) = if approved {
        let multiplier = match tier {
            RiskTier::Low => policy.amount_multipliers.low,
            RiskTier::Medium => policy.amount_multipliers.medium,
            RiskTier::High => policy.amount_multipliers.high,
            RiskTier::Rejected => unreachable!("approved implies a non-rejected tier"),
        };
        let premium = match tier {
            RiskTier::Low => policy.rate_premiums.low,
            RiskTier::Medium => policy.rate_premiums.medium,
            RiskTier::High => policy.rate_premiums.high,
            RiskTier::Rejected => unreachable!("approved implies a non-rejected tier"),
        };

        let amount = round_cents((request.amount * multiplier).min(policy.loan_ceiling));
        if amount < request.amount {
            factors.push(format!(
                "Amount reduced to {:.2} ({} tier multiplier {:.2}, ceiling {:.0})",
                amount, tier, multiplier, policy.loan_ceiling
            ));
        }

        let mut rate = policy.base_interest_rate + premium;
        if request.purpose.is_sustainable() {
            rate = (rate - policy.sustainable_purpose_discount).max(policy.base_interest_rate);
            factors.push(format!(
                "Sustainable purpose '{}': rate discount applied",
                request.purpose.key()
            ));
        }

        (amount, rate)
    } else {
        (0.0, 0.0)
    };

    tracing::info!(
        "Loan decision: approved={}, tier={}, amount={:.2}, rate={:.4}",
        approved,
        tier,
        approved_amount,
        interest_rate
    );

    LoanDecision {
        approved,
        risk_tier: tier,
        approved_amount,
        interest_rate,
        deforestation_veto: deforestation_flag,
        decision_factors: factors,
    }
}

fn tier_for(overall: f64, policy: &EvaluationPolicy) -> RiskTier {
    let bp = &policy.tier_breakpoints;
    if overall >= bp.low {
        RiskTier::Low
    } else if overall >= bp.medium {
        RiskTier::Medium
    } else if overall >= bp.high {
        RiskTier::High
    } else {
        RiskTier::Rejected
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
