use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bidding strategy for one auction round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Set a maximum proxy bid, let the platform auto-bid incrementally
    ProxyMax,
    /// Time the bid for the final moments to avoid counters
    LastMinuteSnipe,
    /// Small bids to test competition without commitment
    IncrementalTest,
    /// Wait for the auction to end with minimal bids
    WaitForCloseout,
    /// Rare, only for must-have domains
    AggressiveEarly,
    /// Walk away when profit is impossible
    DoNotBid,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::ProxyMax => "proxy_max",
            Strategy::LastMinuteSnipe => "last_minute_snipe",
            Strategy::IncrementalTest => "incremental_test",
            Strategy::WaitForCloseout => "wait_for_closeout",
            Strategy::AggressiveEarly => "aggressive_early",
            Strategy::DoNotBid => "do_not_bid",
        }
    }

    /// Every strategy except do_not_bid
    pub fn biddable() -> [Strategy; 5] {
        [
            Strategy::ProxyMax,
            Strategy::LastMinuteSnipe,
            Strategy::IncrementalTest,
            Strategy::WaitForCloseout,
            Strategy::AggressiveEarly,
        ]
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Output of strategy selection, whether from the oracle or the rule trees.
///
/// Invariant: `strategy == DoNotBid` implies `recommended_bid_amount == 0`.
/// The validator enforces it on oracle proposals; internal producers uphold
/// it by construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyDecision {
    pub strategy: Strategy,
    /// Recommended proxy max (what we set, not the next visible bid)
    pub recommended_bid_amount: Decimal,
    /// 0.0–1.0
    pub confidence: f64,
    pub risk_level: RiskLevel,
    pub reasoning: String,
    #[serde(default)]
    pub should_increase_proxy: Option<bool>,
    #[serde(default)]
    pub next_bid_amount: Option<Decimal>,
    pub max_budget_for_domain: Decimal,
}

/// What to do with the standing proxy bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyAction {
    AcceptLoss,
    IncreaseProxy,
    MaintainProxy,
}

impl ProxyAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyAction::AcceptLoss => "accept_loss",
            ProxyAction::IncreaseProxy => "increase_proxy",
            ProxyAction::MaintainProxy => "maintain_proxy",
        }
    }
}

impl std::fmt::Display for ProxyAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Proxy adjustment derived from context + the chosen strategy.
/// Never persisted on its own; it travels inside the FinalDecision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyDecision {
    pub current_proxy: Decimal,
    pub current_bid: Decimal,
    pub safe_max: Decimal,
    pub should_increase_proxy: bool,
    pub new_proxy_max: Option<Decimal>,
    pub next_bid_amount: Option<Decimal>,
    pub max_budget_for_domain: Decimal,
    pub proxy_action: ProxyAction,
    pub explanation: String,
}

/// Which component ultimately produced the final decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    Llm,
    RulesFallback,
    SafetyBlock,
    SystemError,
}

impl DecisionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionSource::Llm => "llm",
            DecisionSource::RulesFallback => "rules_fallback",
            DecisionSource::SafetyBlock => "safety_block",
            DecisionSource::SystemError => "system_error",
        }
    }
}

impl std::fmt::Display for DecisionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The sole externally observable artifact of one pipeline run.
/// Created exactly once per invocation, never mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalDecision {
    pub decision_id: Uuid,
    pub decided_at: DateTime<Utc>,
    pub strategy: Strategy,
    pub recommended_bid_amount: Decimal,
    pub should_increase_proxy: bool,
    pub next_bid_amount: Option<Decimal>,
    pub max_budget_for_domain: Decimal,
    pub risk_level: RiskLevel,
    pub confidence: f64,
    pub reasoning: String,
    pub proxy_decision: Option<ProxyDecision>,
    pub decision_source: DecisionSource,
}

impl FinalDecision {
    /// Assemble from a proxy-adjusted strategy decision.
    pub fn from_parts(
        strategy: StrategyDecision,
        proxy: ProxyDecision,
        source: DecisionSource,
    ) -> Self {
        Self {
            decision_id: Uuid::new_v4(),
            decided_at: Utc::now(),
            strategy: strategy.strategy,
            recommended_bid_amount: strategy.recommended_bid_amount,
            should_increase_proxy: strategy.should_increase_proxy.unwrap_or(false),
            next_bid_amount: strategy.next_bid_amount,
            max_budget_for_domain: strategy.max_budget_for_domain,
            risk_level: strategy.risk_level,
            confidence: strategy.confidence,
            reasoning: strategy.reasoning,
            proxy_decision: Some(proxy),
            decision_source: source,
        }
    }

    /// Terminal do-not-bid decision with no proxy analysis attached
    /// (safety blocks and system errors).
    pub fn terminal_no_bid(
        reasoning: String,
        confidence: f64,
        source: DecisionSource,
    ) -> Self {
        Self {
            decision_id: Uuid::new_v4(),
            decided_at: Utc::now(),
            strategy: Strategy::DoNotBid,
            recommended_bid_amount: Decimal::ZERO,
            should_increase_proxy: false,
            next_bid_amount: None,
            max_budget_for_domain: Decimal::ZERO,
            risk_level: RiskLevel::High,
            confidence,
            reasoning,
            proxy_decision: None,
            decision_source: source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_strategy_serde_names() {
        assert_eq!(
            serde_json::to_string(&Strategy::LastMinuteSnipe).unwrap(),
            "\"last_minute_snipe\""
        );
        let s: Strategy = serde_json::from_str("\"do_not_bid\"").unwrap();
        assert_eq!(s, Strategy::DoNotBid);
    }

    #[test]
    fn test_decision_source_serde_names() {
        assert_eq!(
            serde_json::to_string(&DecisionSource::RulesFallback).unwrap(),
            "\"rules_fallback\""
        );
    }

    #[test]
    fn test_terminal_no_bid_shape() {
        let d = FinalDecision::terminal_no_bid("blocked".into(), 0.95, DecisionSource::SafetyBlock);
        assert_eq!(d.strategy, Strategy::DoNotBid);
        assert_eq!(d.recommended_bid_amount, Decimal::ZERO);
        assert_eq!(d.risk_level, RiskLevel::High);
        assert!(d.proxy_decision.is_none());
    }

    #[test]
    fn test_from_parts_carries_proxy_fields() {
        let strategy = StrategyDecision {
            strategy: Strategy::ProxyMax,
            recommended_bid_amount: dec!(500),
            confidence: 0.75,
            risk_level: RiskLevel::Medium,
            reasoning: "balanced".into(),
            should_increase_proxy: Some(true),
            next_bid_amount: Some(dec!(305)),
            max_budget_for_domain: dec!(500),
        };
        let proxy = ProxyDecision {
            current_proxy: Decimal::ZERO,
            current_bid: dec!(300),
            safe_max: dec!(800),
            should_increase_proxy: true,
            new_proxy_max: Some(dec!(500)),
            next_bid_amount: Some(dec!(305)),
            max_budget_for_domain: dec!(500),
            proxy_action: ProxyAction::IncreaseProxy,
            explanation: "initial proxy".into(),
        };
        let d = FinalDecision::from_parts(strategy, proxy, DecisionSource::Llm);
        assert!(d.should_increase_proxy);
        assert_eq!(d.next_bid_amount, Some(dec!(305)));
        assert_eq!(d.proxy_decision.unwrap().proxy_action, ProxyAction::IncreaseProxy);
    }
}
