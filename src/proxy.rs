//! Proxy-bid arithmetic and the final profitability arbiter.
//!
//! Translates the chosen strategy into a concrete proxy adjustment. This is
//! the last authority on financial risk: even a validated oracle decision is
//! downgraded to do_not_bid here once the current bid has passed the safe
//! max, and that override is unconditional.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;

use crate::config::ValidationConfig;
use crate::domain::{
    AuctionContext, ProxyAction, ProxyDecision, RiskLevel, Strategy, StrategyDecision,
};

/// Increase the proxy only when it buys at least this many increments of
/// headroom; smaller gains churn the proxy for nothing.
const MIN_INCREASE_INCREMENTS: Decimal = dec!(3);

pub struct ProxyLogicEngine {
    config: ValidationConfig,
}

impl ProxyLogicEngine {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    fn safe_max(&self, ctx: &AuctionContext) -> Decimal {
        ctx.estimated_value * self.config.ceiling_ratio
    }

    /// Analyze the standing proxy against the current bid and safe max.
    pub fn analyze(&self, ctx: &AuctionContext) -> ProxyDecision {
        let safe_max = self.safe_max(ctx);
        let increment = ctx.platform.min_increment(ctx.current_bid);
        let current_proxy = ctx.your_current_proxy;
        let current_bid = ctx.current_bid;

        // Scenario 1: no proxy set yet, initialize one
        if current_proxy == Decimal::ZERO {
            let new_proxy_max = safe_max.min(ctx.budget_available).min(ctx.estimated_value);
            let next_bid = current_bid + increment;

            return ProxyDecision {
                current_proxy,
                current_bid,
                safe_max,
                should_increase_proxy: true,
                new_proxy_max: Some(new_proxy_max),
                next_bid_amount: Some(next_bid),
                max_budget_for_domain: new_proxy_max,
                proxy_action: ProxyAction::IncreaseProxy,
                explanation: format!(
                    "INITIAL PROXY SETUP: No current proxy set. Safe max calculated as ${:.2} \
                     from estimated value ${:.2}. Setting proxy to ${:.2}. Next visible bid will \
                     be ${:.2} (${:.2} + ${:.2} increment). Domain will never cost more than \
                     ${:.2} even if fully contested.",
                    safe_max,
                    ctx.estimated_value,
                    new_proxy_max,
                    next_bid,
                    current_bid,
                    increment,
                    new_proxy_max
                ),
            };
        }

        // Scenario 2: bidding has already reached the safe max, profit impossible
        if current_bid >= safe_max {
            return ProxyDecision {
                current_proxy,
                current_bid,
                safe_max,
                should_increase_proxy: false,
                new_proxy_max: None,
                next_bid_amount: None,
                max_budget_for_domain: Decimal::ZERO,
                proxy_action: ProxyAction::AcceptLoss,
                explanation: format!(
                    "PROFIT IMPOSSIBLE: Safe max (${:.2}) is not above current bid (${:.2}). \
                     Cannot increase proxy above max budget (${:.2}). Current proxy (${:.2}) is \
                     insufficient. Strategy: Accept loss and do not increase proxy. This \
                     prevents a winner's curse scenario.",
                    safe_max, current_bid, safe_max, current_proxy
                ),
            };
        }

        // Scenario 3: room to raise, but only for meaningful headroom
        let potential_new_proxy = safe_max.min(ctx.budget_available).min(ctx.estimated_value);
        let min_increase = increment * MIN_INCREASE_INCREMENTS;

        if potential_new_proxy > current_proxy + min_increase {
            let next_bid = current_bid + increment;
            ProxyDecision {
                current_proxy,
                current_bid,
                safe_max,
                should_increase_proxy: true,
                new_proxy_max: Some(potential_new_proxy),
                next_bid_amount: Some(next_bid),
                max_budget_for_domain: potential_new_proxy,
                proxy_action: ProxyAction::IncreaseProxy,
                explanation: format!(
                    "PROXY INCREASE OPTIMAL: Safe max (${:.2}) exceeds current bid (${:.2}). \
                     Current proxy (${:.2}) insufficient for profit protection. Increasing \
                     proxy to ${:.2}. Next visible bid will be ${:.2} (${:.2} + ${:.2} \
                     increment). Domain cost capped at ${:.2}.",
                    safe_max,
                    current_bid,
                    current_proxy,
                    potential_new_proxy,
                    next_bid,
                    current_bid,
                    increment,
                    potential_new_proxy
                ),
            }
        } else {
            ProxyDecision {
                current_proxy,
                current_bid,
                safe_max,
                should_increase_proxy: false,
                new_proxy_max: None,
                next_bid_amount: None,
                max_budget_for_domain: current_proxy,
                proxy_action: ProxyAction::MaintainProxy,
                explanation: format!(
                    "PROXY ADEQUATE: Current proxy (${:.2}) provides sufficient protection. \
                     Safe max (${:.2}) supports current position against bid (${:.2}). No proxy \
                     increase needed. Domain will not exceed ${:.2} cost.",
                    current_proxy, safe_max, current_bid, current_proxy
                ),
            }
        }
    }

    /// Apply the proxy analysis to a strategy decision. An accept-loss
    /// verdict overrides the strategy to do_not_bid; the override reason is
    /// appended to the existing reasoning, never replacing it.
    pub fn apply(
        &self,
        ctx: &AuctionContext,
        strategy_decision: StrategyDecision,
    ) -> (StrategyDecision, ProxyDecision) {
        let proxy = self.analyze(ctx);

        let mut updated = strategy_decision;
        updated.should_increase_proxy = Some(proxy.should_increase_proxy);
        updated.next_bid_amount = proxy.next_bid_amount;
        updated.max_budget_for_domain = proxy.max_budget_for_domain;

        if proxy.proxy_action == ProxyAction::AcceptLoss {
            info!(
                domain = %ctx.domain,
                original_strategy = updated.strategy.as_str(),
                "proxy analysis overrides strategy to do_not_bid"
            );
            updated.strategy = Strategy::DoNotBid;
            updated.recommended_bid_amount = Decimal::ZERO;
            updated.confidence = updated.confidence.min(0.5);
            updated.risk_level = RiskLevel::High;
            updated
                .reasoning
                .push_str(&format!(" PROXY ANALYSIS OVERRIDE: {}", proxy.explanation));
        }

        (updated, proxy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BidderAnalysis, Platform};

    fn engine() -> ProxyLogicEngine {
        ProxyLogicEngine::new(ValidationConfig::default())
    }

    fn context(
        value: Decimal,
        current_bid: Decimal,
        current_proxy: Decimal,
        budget: Decimal,
        platform: Platform,
    ) -> AuctionContext {
        AuctionContext {
            domain: "example.com".to_string(),
            platform,
            estimated_value: value,
            current_bid,
            num_bidders: 2,
            hours_remaining: 4.0,
            your_current_proxy: current_proxy,
            budget_available: budget,
            bidder_analysis: BidderAnalysis {
                bot_detected: false,
                corporate_buyer: false,
                aggression_score: 4.0,
                reaction_time_avg_secs: 90.0,
            },
            thread_id: None,
        }
    }

    fn strategy_decision(strategy: Strategy, amount: Decimal) -> StrategyDecision {
        StrategyDecision {
            strategy,
            recommended_bid_amount: amount,
            confidence: 0.8,
            risk_level: RiskLevel::Medium,
            reasoning: "Base reasoning from the strategy layer.".to_string(),
            should_increase_proxy: None,
            next_bid_amount: None,
            max_budget_for_domain: amount,
        }
    }

    #[test]
    fn test_initial_proxy_setup() {
        // value 800, bid 300, no proxy, $5 increment
        let ctx = context(dec!(800), dec!(300), Decimal::ZERO, dec!(2000), Platform::GoDaddy);
        let proxy = engine().analyze(&ctx);
        assert_eq!(proxy.proxy_action, ProxyAction::IncreaseProxy);
        assert_eq!(proxy.next_bid_amount, Some(dec!(305)));
        // min(safe_max=800, budget=2000, value=800)
        assert_eq!(proxy.new_proxy_max, Some(dec!(800)));
        assert_eq!(proxy.max_budget_for_domain, dec!(800));
    }

    #[test]
    fn test_initial_proxy_capped_by_budget() {
        let ctx = context(dec!(800), dec!(300), Decimal::ZERO, dec!(600), Platform::GoDaddy);
        let proxy = engine().analyze(&ctx);
        assert_eq!(proxy.new_proxy_max, Some(dec!(600)));
    }

    #[test]
    fn test_accept_loss_when_bid_reaches_safe_max() {
        let ctx = context(dec!(500), dec!(500), dec!(450), dec!(2000), Platform::GoDaddy);
        let proxy = engine().analyze(&ctx);
        assert_eq!(proxy.proxy_action, ProxyAction::AcceptLoss);
        assert!(proxy.new_proxy_max.is_none());
        assert!(proxy.next_bid_amount.is_none());
        assert_eq!(proxy.max_budget_for_domain, Decimal::ZERO);
    }

    #[test]
    fn test_accept_loss_overrides_strategy() {
        let ctx = context(dec!(500), dec!(650), dec!(450), dec!(2000), Platform::GoDaddy);
        let original = strategy_decision(Strategy::ProxyMax, dec!(480));
        let (updated, proxy) = engine().apply(&ctx, original);

        assert_eq!(proxy.proxy_action, ProxyAction::AcceptLoss);
        assert_eq!(updated.strategy, Strategy::DoNotBid);
        assert_eq!(updated.recommended_bid_amount, Decimal::ZERO);
        assert_eq!(updated.risk_level, RiskLevel::High);
        assert!(updated.confidence <= 0.5);
        // override appends, never replaces
        assert!(updated.reasoning.starts_with("Base reasoning"));
        assert!(updated.reasoning.contains("PROXY ANALYSIS OVERRIDE"));
    }

    #[test]
    fn test_accept_loss_caps_but_does_not_raise_confidence() {
        let ctx = context(dec!(500), dec!(650), dec!(450), dec!(2000), Platform::GoDaddy);
        let mut original = strategy_decision(Strategy::ProxyMax, dec!(480));
        original.confidence = 0.3;
        let (updated, _) = engine().apply(&ctx, original);
        assert!((updated.confidence - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_increase_when_headroom_is_meaningful() {
        // proxy 400, potential 800, increment $5 → gain 400 > 15
        let ctx = context(dec!(800), dec!(450), dec!(400), dec!(2000), Platform::GoDaddy);
        let proxy = engine().analyze(&ctx);
        assert_eq!(proxy.proxy_action, ProxyAction::IncreaseProxy);
        assert_eq!(proxy.new_proxy_max, Some(dec!(800)));
        assert_eq!(proxy.next_bid_amount, Some(dec!(455)));
    }

    #[test]
    fn test_maintain_when_headroom_is_marginal() {
        // proxy 790, potential 800, gain 10 < 3 * $5
        let ctx = context(dec!(800), dec!(450), dec!(790), dec!(2000), Platform::GoDaddy);
        let proxy = engine().analyze(&ctx);
        assert_eq!(proxy.proxy_action, ProxyAction::MaintainProxy);
        assert!(proxy.new_proxy_max.is_none());
        assert_eq!(proxy.max_budget_for_domain, dec!(790));
    }

    #[test]
    fn test_dynadot_percentage_increment() {
        // 5% of $400 = $20 increment
        let ctx = context(dec!(800), dec!(400), Decimal::ZERO, dec!(2000), Platform::Dynadot);
        let proxy = engine().analyze(&ctx);
        assert_eq!(proxy.next_bid_amount, Some(dec!(420)));
    }

    #[test]
    fn test_apply_carries_proxy_fields_into_strategy() {
        let ctx = context(dec!(800), dec!(300), Decimal::ZERO, dec!(2000), Platform::GoDaddy);
        let (updated, proxy) = engine().apply(&ctx, strategy_decision(Strategy::ProxyMax, dec!(700)));
        assert_eq!(updated.should_increase_proxy, Some(true));
        assert_eq!(updated.next_bid_amount, proxy.next_bid_amount);
        assert_eq!(updated.max_budget_for_domain, proxy.max_budget_for_domain);
        // no override on the happy path
        assert_eq!(updated.strategy, Strategy::ProxyMax);
    }
}
