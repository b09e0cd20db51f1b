//! End-to-end pipeline tests with a scripted oracle.

use async_trait::async_trait;
use gavel::{
    AppConfig, AuctionContext, AuctionResult, BidderAnalysis, DecisionPipeline, DecisionSource,
    HistoryStore, InMemoryHistory, IntelligenceData, MarketIntelligence, OracleFailure,
    OracleOutcome, Platform,
    ProxyAction, RiskLevel, Strategy, StrategyDecision, StrategyOracle,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

/// Oracle double that always returns the same scripted outcome.
struct ScriptedOracle {
    outcome: OracleOutcome,
}

impl ScriptedOracle {
    fn proposing(decision: StrategyDecision) -> Arc<dyn StrategyOracle> {
        Arc::new(Self {
            outcome: OracleOutcome::Proposal(decision),
        })
    }

    fn failing(failure: OracleFailure) -> Arc<dyn StrategyOracle> {
        Arc::new(Self {
            outcome: OracleOutcome::Failure(failure),
        })
    }
}

#[async_trait]
impl StrategyOracle for ScriptedOracle {
    async fn propose(&self, _ctx: &AuctionContext, _intel: &MarketIntelligence) -> OracleOutcome {
        self.outcome.clone()
    }
}

fn context() -> AuctionContext {
    AuctionContext {
        domain: "example.com".to_string(),
        platform: Platform::GoDaddy,
        estimated_value: dec!(800),
        current_bid: dec!(300),
        num_bidders: 2,
        hours_remaining: 4.0,
        your_current_proxy: Decimal::ZERO,
        budget_available: dec!(2000),
        bidder_analysis: BidderAnalysis {
            bot_detected: false,
            corporate_buyer: false,
            aggression_score: 4.0,
            reaction_time_avg_secs: 90.0,
        },
        thread_id: None,
    }
}

fn pipeline(oracle: Option<Arc<dyn StrategyOracle>>) -> DecisionPipeline {
    DecisionPipeline::new(
        &AppConfig::default(),
        Arc::new(IntelligenceData::empty()),
        oracle,
    )
}

fn sound_proposal() -> StrategyDecision {
    StrategyDecision {
        strategy: Strategy::ProxyMax,
        recommended_bid_amount: dec!(700),
        confidence: 0.7,
        risk_level: RiskLevel::Medium,
        reasoning: "Two bidders and healthy margin headroom: a proxy max at $700 protects \
                    profit while platform auto-bidding absorbs competition; overall risk stays \
                    bounded by the budget cap and the timing needs no snipe."
            .to_string(),
        should_increase_proxy: None,
        next_bid_amount: None,
        max_budget_for_domain: dec!(700),
    }
}

#[tokio::test]
async fn overpayment_zone_blocks_with_high_confidence() {
    // estimated_value=1000, current_bid=1350 -> blocked, do_not_bid, 0.95
    let mut ctx = context();
    ctx.estimated_value = dec!(1000);
    ctx.current_bid = dec!(1350);
    ctx.budget_available = dec!(5000);

    let decision = pipeline(None).decide(&ctx).await;

    assert_eq!(decision.decision_source, DecisionSource::SafetyBlock);
    assert_eq!(decision.strategy, Strategy::DoNotBid);
    assert_eq!(decision.recommended_bid_amount, Decimal::ZERO);
    assert!((decision.confidence - 0.95).abs() < f64::EPSILON);
    assert_eq!(decision.risk_level, RiskLevel::High);
    assert!(decision.reasoning.contains("OVERPAYMENT"));
}

#[tokio::test]
async fn minimum_budget_blocks_before_other_rules() {
    // estimated_value=500, budget=60 -> minimum-budget rule, not
    // concentration, even though both would fire
    let mut ctx = context();
    ctx.estimated_value = dec!(500);
    ctx.budget_available = dec!(60);

    let decision = pipeline(None).decide(&ctx).await;

    assert_eq!(decision.decision_source, DecisionSource::SafetyBlock);
    assert!(decision.reasoning.contains("MINIMUM BUDGET"));
}

#[tokio::test]
async fn concentration_blocks_when_budget_is_sufficient() {
    let mut ctx = context();
    ctx.estimated_value = dec!(800);
    ctx.budget_available = dec!(1500); // 800 > 50% of 1500

    let decision = pipeline(None).decide(&ctx).await;

    assert_eq!(decision.decision_source, DecisionSource::SafetyBlock);
    assert!(decision.reasoning.contains("CONCENTRATION"));
}

#[tokio::test]
async fn fresh_proxy_is_initialized_with_platform_increment() {
    // value=800, bid=300, no proxy, $5 increment -> next bid 305,
    // new proxy max = min(800, budget, 800)
    let decision = pipeline(None).decide(&context()).await;

    let proxy = decision.proxy_decision.expect("proxy analysis expected");
    assert_eq!(proxy.proxy_action, ProxyAction::IncreaseProxy);
    assert_eq!(proxy.next_bid_amount, Some(dec!(305)));
    assert_eq!(proxy.new_proxy_max, Some(dec!(800)));
    assert!(decision.should_increase_proxy);
}

#[tokio::test]
async fn high_tier_contested_endgame_snipes_deterministically() {
    // value=1000, 4 bidders, 0.5h, no oracle -> high-tier tree -> snipe
    let mut ctx = context();
    ctx.estimated_value = dec!(1000);
    ctx.num_bidders = 4;
    ctx.hours_remaining = 0.5;
    ctx.budget_available = dec!(5000);

    let p = pipeline(None);
    let first = p.decide(&ctx).await;
    let second = p.decide(&ctx).await;

    assert_eq!(first.decision_source, DecisionSource::RulesFallback);
    assert_eq!(first.strategy, Strategy::LastMinuteSnipe);
    assert_eq!(first.strategy, second.strategy);
    assert_eq!(first.recommended_bid_amount, second.recommended_bid_amount);
    assert_eq!(first.reasoning, second.reasoning);
}

#[tokio::test]
async fn validated_proposal_keeps_llm_source() {
    let decision = pipeline(Some(ScriptedOracle::proposing(sound_proposal())))
        .decide(&context())
        .await;

    assert_eq!(decision.decision_source, DecisionSource::Llm);
    assert_eq!(decision.strategy, Strategy::ProxyMax);
    assert_eq!(decision.recommended_bid_amount, dec!(700));
}

#[tokio::test]
async fn overbudget_proposal_falls_back_to_rules() {
    let mut proposal = sound_proposal();
    proposal.recommended_bid_amount = dec!(5000); // over ceiling and budget

    let decision = pipeline(Some(ScriptedOracle::proposing(proposal)))
        .decide(&context())
        .await;

    assert_eq!(decision.decision_source, DecisionSource::RulesFallback);
    assert!(decision.recommended_bid_amount <= dec!(800));
}

#[tokio::test]
async fn oracle_failure_falls_back_to_rules() {
    let decision = pipeline(Some(ScriptedOracle::failing(OracleFailure::Malformed(
        "not json".to_string(),
    ))))
    .decide(&context())
    .await;

    assert_eq!(decision.decision_source, DecisionSource::RulesFallback);
    // medium tier, light competition: proxy max at safe max
    assert_eq!(decision.strategy, Strategy::ProxyMax);
}

#[tokio::test]
async fn proxy_engine_overrides_even_validated_proposals() {
    // current bid at estimated value: no profitable continuation exists
    let mut ctx = context();
    ctx.estimated_value = dec!(500);
    ctx.current_bid = dec!(600);
    ctx.your_current_proxy = dec!(450);

    let mut proposal = sound_proposal();
    proposal.recommended_bid_amount = dec!(480);
    proposal.max_budget_for_domain = dec!(480);

    let decision = pipeline(Some(ScriptedOracle::proposing(proposal)))
        .decide(&ctx)
        .await;

    assert_eq!(decision.decision_source, DecisionSource::Llm);
    assert_eq!(decision.strategy, Strategy::DoNotBid);
    assert_eq!(decision.recommended_bid_amount, Decimal::ZERO);
    assert!(decision.confidence <= 0.5);
    assert_eq!(
        decision.proxy_decision.unwrap().proxy_action,
        ProxyAction::AcceptLoss
    );
}

#[tokio::test]
async fn recording_the_same_outcome_twice_does_not_duplicate() {
    let history = Arc::new(InMemoryHistory::new());
    let p = pipeline(None).with_history(history.clone());

    let ctx = context();
    let decision = p.decide(&ctx).await;

    p.record_outcome(&ctx, &decision, AuctionResult::Won, dec!(400))
        .await
        .unwrap();
    p.record_outcome(&ctx, &decision, AuctionResult::Won, dec!(400))
        .await
        .unwrap();

    let perf = history
        .get_strategy_performance(decision.strategy, Some(ctx.platform), None)
        .await
        .unwrap();
    assert_eq!(perf.total_uses, 1);
    assert_eq!(perf.wins, 1);
}

#[tokio::test]
async fn parallel_runs_share_nothing_but_the_dataset() {
    let p = Arc::new(pipeline(None));

    let mut handles = Vec::new();
    for i in 0..8u32 {
        let p = p.clone();
        let mut ctx = context();
        ctx.domain = format!("parallel{}.com", i);
        handles.push(tokio::spawn(async move { p.decide(&ctx).await }));
    }

    for handle in handles {
        let decision = handle.await.unwrap();
        assert_eq!(decision.decision_source, DecisionSource::RulesFallback);
    }
    assert_eq!(p.stats().total_decisions, 8);
}
