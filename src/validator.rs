//! Tiered post-validation of oracle proposals.
//!
//! Hard failures reject the proposal outright and short-circuit in priority
//! order. Soft failures are advisory warnings; a soft confidence/risk
//! mismatch escalates to hard only when it strays far outside the band.
//! An invalid proposal routes the pipeline to the rule fallback.

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::config::ValidationConfig;
use crate::domain::{AuctionContext, RiskLevel, Strategy, StrategyDecision};

/// One rule violation, with the rule name for audit logs.
#[derive(Debug, Clone)]
pub struct RuleFailure {
    pub rule: &'static str,
    pub message: String,
}

impl std::fmt::Display for RuleFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.rule, self.message)
    }
}

/// Blocking errors and advisory warnings from one validation pass.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: Vec<RuleFailure>,
    pub warnings: Vec<RuleFailure>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Single line combining all failures, errors first.
    pub fn combined_message(&self) -> String {
        self.errors
            .iter()
            .map(|f| f.to_string())
            .chain(self.warnings.iter().map(|f| format!("warning {}", f)))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Concept groups an adequate reasoning should touch.
const CONCEPT_GROUPS: [(&str, &[&str]); 4] = [
    ("financial", &["profit", "margin", "budget", "value", "price"]),
    ("risk", &["risk", "downside", "exposure"]),
    ("competition", &["competition", "bidder", "opponent", "competitor"]),
    ("strategy", &["strategy", "snipe", "proxy", "timing", "closeout"]),
];

pub struct Validator {
    config: ValidationConfig,
}

impl Validator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Run all checks. The first hard failure wins and suppresses the rest;
    /// soft checks only run once every hard check has passed.
    pub fn validate(&self, decision: &StrategyDecision, ctx: &AuctionContext) -> ValidationReport {
        let mut report = ValidationReport::default();

        let hard_checks = [
            Self::check_bid_ceiling,
            Self::check_budget,
            Self::check_do_not_bid_consistency,
            Self::check_reasoning_length,
            Self::check_aggressive_early_floor,
        ];

        for check in hard_checks {
            if let Some(failure) = check(self, decision, ctx) {
                warn!(
                    domain = %ctx.domain,
                    rule = failure.rule,
                    message = %failure.message,
                    "oracle proposal hard-rejected"
                );
                report.errors.push(failure);
                return report;
            }
        }

        self.check_confidence_risk_band(decision, &mut report);
        self.check_reasoning_depth(decision, &mut report);
        self.check_strategy_context_fit(decision, ctx, &mut report);

        if !report.warnings.is_empty() {
            debug!(
                domain = %ctx.domain,
                warnings = report.warnings.len(),
                "oracle proposal accepted with warnings"
            );
        }

        report
    }

    /// Absolute ceiling: the configured fraction of estimated value.
    fn check_bid_ceiling(
        &self,
        decision: &StrategyDecision,
        ctx: &AuctionContext,
    ) -> Option<RuleFailure> {
        let ceiling = ctx.estimated_value * self.config.ceiling_ratio;
        if decision.recommended_bid_amount > ceiling {
            return Some(RuleFailure {
                rule: "bid_ceiling",
                message: format!(
                    "recommended bid (${:.2}) exceeds {:.0}% of estimated value (${:.2})",
                    decision.recommended_bid_amount,
                    self.config.ceiling_ratio * Decimal::ONE_HUNDRED,
                    ceiling
                ),
            });
        }
        None
    }

    fn check_budget(
        &self,
        decision: &StrategyDecision,
        ctx: &AuctionContext,
    ) -> Option<RuleFailure> {
        if decision.recommended_bid_amount > ctx.budget_available {
            return Some(RuleFailure {
                rule: "budget",
                message: format!(
                    "recommended bid (${:.2}) exceeds available budget (${:.2})",
                    decision.recommended_bid_amount, ctx.budget_available
                ),
            });
        }
        None
    }

    fn check_do_not_bid_consistency(
        &self,
        decision: &StrategyDecision,
        _ctx: &AuctionContext,
    ) -> Option<RuleFailure> {
        if decision.strategy == Strategy::DoNotBid
            && decision.recommended_bid_amount > Decimal::ZERO
        {
            return Some(RuleFailure {
                rule: "do_not_bid_consistency",
                message: format!(
                    "strategy is do_not_bid but recommended bid is ${:.2}",
                    decision.recommended_bid_amount
                ),
            });
        }
        None
    }

    fn check_reasoning_length(
        &self,
        decision: &StrategyDecision,
        _ctx: &AuctionContext,
    ) -> Option<RuleFailure> {
        let len = decision.reasoning.chars().count();
        if len < self.config.min_reasoning_chars {
            return Some(RuleFailure {
                rule: "reasoning_length",
                message: format!(
                    "reasoning too brief ({} chars, minimum {})",
                    len, self.config.min_reasoning_chars
                ),
            });
        }
        None
    }

    /// aggressive_early is reserved for must-have domains.
    fn check_aggressive_early_floor(
        &self,
        decision: &StrategyDecision,
        ctx: &AuctionContext,
    ) -> Option<RuleFailure> {
        if decision.strategy == Strategy::AggressiveEarly
            && ctx.estimated_value < self.config.aggressive_early_floor
        {
            return Some(RuleFailure {
                rule: "aggressive_early_floor",
                message: format!(
                    "aggressive_early proposed for a ${:.2} domain (floor ${:.2})",
                    ctx.estimated_value, self.config.aggressive_early_floor
                ),
            });
        }
        None
    }

    /// Widened confidence bands per risk level. A miscalibration inside the
    /// escalation margin is a warning; beyond it, the proposal is rejected.
    fn check_confidence_risk_band(
        &self,
        decision: &StrategyDecision,
        report: &mut ValidationReport,
    ) {
        let deviation = match decision.risk_level {
            RiskLevel::Low => 0.50 - decision.confidence,
            RiskLevel::Medium => 0.35 - decision.confidence,
            RiskLevel::High => decision.confidence - 0.80,
        };

        if deviation <= 0.0 {
            return;
        }

        let failure = RuleFailure {
            rule: "confidence_risk_band",
            message: format!(
                "confidence {:.2} misaligned with {} risk (deviation {:.2})",
                decision.confidence,
                decision.risk_level.as_str(),
                deviation
            ),
        };

        if deviation > self.config.confidence_escalation_margin {
            report.errors.push(failure);
        } else {
            report.warnings.push(failure);
        }
    }

    /// Reasoning between the hard minimum and 100 chars, or touching fewer
    /// than 2 of the 4 concept groups, is superficial but acceptable.
    fn check_reasoning_depth(&self, decision: &StrategyDecision, report: &mut ValidationReport) {
        let len = decision.reasoning.chars().count();
        if len < 100 {
            report.warnings.push(RuleFailure {
                rule: "reasoning_depth",
                message: format!("reasoning is thin ({} chars)", len),
            });
        }

        let lower = decision.reasoning.to_lowercase();
        let groups_hit = CONCEPT_GROUPS
            .iter()
            .filter(|(_, terms)| terms.iter().any(|t| lower.contains(t)))
            .count();
        if groups_hit < 2 {
            report.warnings.push(RuleFailure {
                rule: "reasoning_depth",
                message: format!(
                    "reasoning covers only {} of {} concept groups",
                    groups_hit,
                    CONCEPT_GROUPS.len()
                ),
            });
        }
    }

    fn check_strategy_context_fit(
        &self,
        decision: &StrategyDecision,
        ctx: &AuctionContext,
        report: &mut ValidationReport,
    ) {
        if decision.strategy == Strategy::WaitForCloseout && ctx.num_bidders > 3 {
            report.warnings.push(RuleFailure {
                rule: "strategy_context_fit",
                message: format!(
                    "wait_for_closeout with {} active bidders; closeout unlikely",
                    ctx.num_bidders
                ),
            });
        }

        // Could still be valid for bot avoidance, hence only a warning
        if decision.strategy == Strategy::LastMinuteSnipe && ctx.hours_remaining > 2.0 {
            report.warnings.push(RuleFailure {
                rule: "strategy_context_fit",
                message: format!(
                    "last_minute_snipe with {:.1} hours remaining",
                    ctx.hours_remaining
                ),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BidderAnalysis, Platform};
    use rust_decimal_macros::dec;

    fn validator() -> Validator {
        Validator::new(ValidationConfig::default())
    }

    fn context() -> AuctionContext {
        AuctionContext {
            domain: "example.com".to_string(),
            platform: Platform::GoDaddy,
            estimated_value: dec!(1000),
            current_bid: dec!(300),
            num_bidders: 2,
            hours_remaining: 1.5,
            your_current_proxy: Decimal::ZERO,
            budget_available: dec!(5000),
            bidder_analysis: BidderAnalysis {
                bot_detected: false,
                corporate_buyer: false,
                aggression_score: 4.0,
                reaction_time_avg_secs: 90.0,
            },
            thread_id: None,
        }
    }

    fn decision() -> StrategyDecision {
        StrategyDecision {
            strategy: Strategy::ProxyMax,
            recommended_bid_amount: dec!(700),
            confidence: 0.7,
            risk_level: RiskLevel::Medium,
            reasoning: "Moderate competition suggests a proxy strategy: profit margin stays \
                        protected while the platform handles incremental bidder pressure, and \
                        risk remains bounded by the budget cap."
                .to_string(),
            should_increase_proxy: None,
            next_bid_amount: None,
            max_budget_for_domain: dec!(700),
        }
    }

    #[test]
    fn test_well_formed_proposal_passes_clean() {
        let report = validator().validate(&decision(), &context());
        assert!(report.is_valid());
        assert!(report.warnings.is_empty(), "{}", report.combined_message());
    }

    #[test]
    fn test_bid_ceiling_hard_rejects() {
        let mut d = decision();
        d.recommended_bid_amount = dec!(1001); // ceiling is 100% of 1000
        let report = validator().validate(&d, &context());
        assert!(!report.is_valid());
        assert_eq!(report.errors[0].rule, "bid_ceiling");
        // short-circuit: nothing else evaluated
        assert_eq!(report.errors.len(), 1);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_budget_hard_rejects() {
        let mut ctx = context();
        ctx.budget_available = dec!(500);
        let report = validator().validate(&decision(), &ctx);
        assert!(!report.is_valid());
        assert_eq!(report.errors[0].rule, "budget");
    }

    #[test]
    fn test_ceiling_checked_before_budget() {
        let mut d = decision();
        d.recommended_bid_amount = dec!(6000); // violates both ceiling and budget
        let report = validator().validate(&d, &context());
        assert_eq!(report.errors[0].rule, "bid_ceiling");
    }

    #[test]
    fn test_do_not_bid_with_amount_rejects() {
        let mut d = decision();
        d.strategy = Strategy::DoNotBid;
        d.recommended_bid_amount = dec!(50);
        let report = validator().validate(&d, &context());
        assert_eq!(report.errors[0].rule, "do_not_bid_consistency");
    }

    #[test]
    fn test_short_reasoning_rejects() {
        let mut d = decision();
        d.reasoning = "just bid".to_string();
        let report = validator().validate(&d, &context());
        assert_eq!(report.errors[0].rule, "reasoning_length");
    }

    #[test]
    fn test_aggressive_early_floor_rejects() {
        let mut d = decision();
        d.strategy = Strategy::AggressiveEarly;
        let mut ctx = context();
        ctx.estimated_value = dec!(150);
        d.recommended_bid_amount = dec!(120);
        let report = validator().validate(&d, &ctx);
        assert_eq!(report.errors[0].rule, "aggressive_early_floor");
    }

    #[test]
    fn test_confidence_band_warns_inside_margin() {
        let mut d = decision();
        d.risk_level = RiskLevel::Low;
        d.confidence = 0.40; // deviation 0.10 < margin 0.30
        let report = validator().validate(&d, &context());
        assert!(report.is_valid());
        assert!(report
            .warnings
            .iter()
            .any(|w| w.rule == "confidence_risk_band"));
    }

    #[test]
    fn test_confidence_band_escalates_beyond_margin() {
        let mut d = decision();
        d.risk_level = RiskLevel::Low;
        d.confidence = 0.10; // deviation 0.40 > margin 0.30
        let report = validator().validate(&d, &context());
        assert!(!report.is_valid());
        assert_eq!(report.errors[0].rule, "confidence_risk_band");
    }

    #[test]
    fn test_high_risk_overconfidence_warns() {
        let mut d = decision();
        d.risk_level = RiskLevel::High;
        d.confidence = 0.95; // deviation 0.15
        let report = validator().validate(&d, &context());
        assert!(report.is_valid());
        assert!(report
            .warnings
            .iter()
            .any(|w| w.rule == "confidence_risk_band"));
    }

    #[test]
    fn test_thin_reasoning_warns() {
        let mut d = decision();
        // 50–100 chars, and only the strategy concept group
        d.reasoning = "A proxy strategy seems fine here because the timing works out well."
            .to_string();
        let report = validator().validate(&d, &context());
        assert!(report.is_valid());
        assert!(report.warnings.iter().any(|w| w.rule == "reasoning_depth"));
    }

    #[test]
    fn test_wait_for_closeout_with_crowd_warns() {
        let mut d = decision();
        d.strategy = Strategy::WaitForCloseout;
        let mut ctx = context();
        ctx.num_bidders = 4;
        let report = validator().validate(&d, &ctx);
        assert!(report.is_valid());
        assert!(report
            .warnings
            .iter()
            .any(|w| w.rule == "strategy_context_fit"));
    }

    #[test]
    fn test_snipe_with_long_runway_warns() {
        let mut d = decision();
        d.strategy = Strategy::LastMinuteSnipe;
        let mut ctx = context();
        ctx.hours_remaining = 10.0;
        let report = validator().validate(&d, &ctx);
        assert!(report.is_valid());
        assert!(report
            .warnings
            .iter()
            .any(|w| w.rule == "strategy_context_fit"));
    }
}
