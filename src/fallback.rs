//! Deterministic rule-based strategy selection.
//!
//! Used whenever the oracle fails or its proposal is rejected. Pure function
//! of the snapshot and enrichment: identical inputs always yield an
//! identical decision, which keeps offline backtests honest.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use crate::config::ValidationConfig;
use crate::domain::{AuctionContext, RiskLevel, Strategy, StrategyDecision, ValueTier};
use crate::intel::MarketIntelligence;

pub struct RuleFallbackEngine {
    config: ValidationConfig,
}

impl RuleFallbackEngine {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Safe max is the configured ceiling fraction of estimated value,
    /// trimmed 5% when the opponent reads as aggressive.
    fn safe_max(&self, ctx: &AuctionContext, intel: &MarketIntelligence) -> Decimal {
        let mut safe_max = ctx.estimated_value * self.config.ceiling_ratio;
        if intel.bidder.flags_aggressive() {
            safe_max *= dec!(0.95);
        }
        safe_max
    }

    /// Main entry point: dispatch to the tier-specific decision tree.
    pub fn select(&self, ctx: &AuctionContext, intel: &MarketIntelligence) -> StrategyDecision {
        let decision = match ctx.value_tier() {
            ValueTier::High => self.high_value_strategy(ctx, intel),
            ValueTier::Medium => self.medium_value_strategy(ctx, intel),
            ValueTier::Low => self.low_value_strategy(ctx, intel),
        };

        debug!(
            domain = %ctx.domain,
            tier = ctx.value_tier().as_str(),
            strategy = decision.strategy.as_str(),
            bid = %decision.recommended_bid_amount,
            "rule fallback selected strategy"
        );

        decision
    }

    /// High-value domains ($1000+): conservative, avoid escalation.
    fn high_value_strategy(
        &self,
        ctx: &AuctionContext,
        intel: &MarketIntelligence,
    ) -> StrategyDecision {
        let safe_max = self.safe_max(ctx, intel);

        // No bidders in the closing hour: let it slide to closeout
        if ctx.num_bidders == 0 && ctx.hours_remaining < 1.0 {
            return decision(
                Strategy::WaitForCloseout,
                safe_max,
                0.85,
                RiskLevel::Low,
                format!(
                    "HIGH-VALUE CONSERVATIVE: Domain worth ${:.2}. No bidders with <1 hour \
                     remaining - wait for closeout to minimize competition. Safe max: ${:.2}. \
                     This preserves the budget cap while avoiding premature bidding that could \
                     attract competition.",
                    ctx.estimated_value, safe_max
                ),
                safe_max,
            );
        }

        // Bots excel at rapid proxy wars but struggle with unpredictable timing
        if ctx.bidder_analysis.bot_detected {
            return decision(
                Strategy::LastMinuteSnipe,
                safe_max,
                0.80,
                RiskLevel::Medium,
                format!(
                    "HIGH-VALUE BOT COUNTER: Bot detected with aggression score {}/10. Using \
                     last-minute snipe on {} to minimize bot reaction window. Safe max: ${:.2}. \
                     Bots excel at rapid proxy wars but struggle with unpredictable timing.",
                    ctx.bidder_analysis.aggression_score, ctx.platform, safe_max
                ),
                safe_max,
            );
        }

        if ctx.num_bidders <= 2 {
            return decision(
                Strategy::ProxyMax,
                safe_max,
                0.75,
                RiskLevel::Medium,
                format!(
                    "HIGH-VALUE BALANCED: {} bidders present. Setting conservative proxy max at \
                     ${:.2}. This allows participation while protecting against escalation. \
                     Platform {} rules respected for auto-bidding.",
                    ctx.num_bidders, safe_max, ctx.platform
                ),
                safe_max,
            );
        }

        decision(
            Strategy::LastMinuteSnipe,
            safe_max,
            0.70,
            RiskLevel::High,
            format!(
                "HIGH-VALUE COMPETITION: {} bidders create high risk. Using sniping strategy to \
                 avoid getting caught in a bidding war. Safe max: ${:.2} ensures profit \
                 protection. Conservative timing accounts for {} platform rules.",
                ctx.num_bidders, safe_max, ctx.platform
            ),
            safe_max,
        )
    }

    /// Medium-value domains ($100-1000): balanced, competition-aware.
    fn medium_value_strategy(
        &self,
        ctx: &AuctionContext,
        intel: &MarketIntelligence,
    ) -> StrategyDecision {
        let safe_max = self.safe_max(ctx, intel);

        // Late-stage on an extending platform: snipe around the extension rule
        if ctx.platform.has_late_extension() && ctx.hours_remaining < 1.0 {
            return decision(
                Strategy::LastMinuteSnipe,
                safe_max,
                0.80,
                RiskLevel::Medium,
                format!(
                    "MEDIUM-VALUE {} TIMING: Auction with <1 hour remaining on a platform with \
                     late-bid auto-extension. Sniping strategy respects the extension rule to \
                     avoid triggering it. Safe max: ${:.2}. This timing prevents unnecessary \
                     extensions while maintaining profit margin.",
                    ctx.platform.as_str().to_uppercase(),
                    safe_max
                ),
                safe_max,
            );
        }

        if ctx.num_bidders > 5 {
            let test_bid = safe_max * dec!(0.5);
            return decision(
                Strategy::IncrementalTest,
                test_bid,
                0.65,
                RiskLevel::Medium,
                format!(
                    "MEDIUM-VALUE COMPETITION: {} bidders indicate high interest. Using \
                     incremental testing starting at ${:.2} to gauge competition without \
                     overcommitting. Will escalate to full safe max (${:.2}) if needed.",
                    ctx.num_bidders, test_bid, safe_max
                ),
                safe_max,
            );
        }

        decision(
            Strategy::ProxyMax,
            safe_max,
            0.75,
            RiskLevel::Medium,
            format!(
                "MEDIUM-VALUE BALANCED: {} bidders, domain worth ${:.2}. Setting proxy max at \
                 ${:.2}. Platform {} auto-bidding will handle incremental competition.",
                ctx.num_bidders, ctx.estimated_value, safe_max, ctx.platform
            ),
            safe_max,
        )
    }

    /// Low-value domains (<$100): closeout or cheap probing.
    fn low_value_strategy(
        &self,
        ctx: &AuctionContext,
        intel: &MarketIntelligence,
    ) -> StrategyDecision {
        let safe_max = self.safe_max(ctx, intel);

        if ctx.num_bidders == 0 {
            return decision(
                Strategy::WaitForCloseout,
                safe_max,
                0.90,
                RiskLevel::Low,
                format!(
                    "LOW-VALUE CLOSEOUT: No bidders on ${:.2} domain. Waiting for closeout \
                     maximizes profit potential with zero risk. Safe max ready: ${:.2} if \
                     competition appears. This is optimal for low-value domains with no interest.",
                    ctx.estimated_value, safe_max
                ),
                safe_max,
            );
        }

        let test_bid = safe_max.min(dec!(50));
        decision(
            Strategy::IncrementalTest,
            test_bid,
            0.70,
            RiskLevel::Low,
            format!(
                "LOW-VALUE TESTING: {} bidders on a low-value domain. Using incremental testing \
                 starting at ${:.2}. Safe max: ${:.2}. Low-value domains allow aggressive \
                 testing to find the winning price.",
                ctx.num_bidders, test_bid, safe_max
            ),
            safe_max,
        )
    }
}

fn decision(
    strategy: Strategy,
    amount: Decimal,
    confidence: f64,
    risk_level: RiskLevel,
    reasoning: String,
    max_budget: Decimal,
) -> StrategyDecision {
    StrategyDecision {
        strategy,
        recommended_bid_amount: amount,
        confidence,
        risk_level,
        reasoning,
        should_increase_proxy: None,
        next_bid_amount: None,
        max_budget_for_domain: max_budget,
    }
}
