//! Single-pass decision pipeline.
//!
//! safety gate -> (blocked? finalize) -> oracle -> validator ->
//! (valid? proxy logic : rule fallback -> proxy logic) -> finalize.
//!
//! Every run owns a private `PipelineState` and always ends in exactly one
//! `FinalDecision`. Failures anywhere degrade to "do not bid"; nothing
//! propagates to the caller as an unhandled fault.

use rust_decimal::prelude::ToPrimitive;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::domain::{
    AuctionContext, DecisionSource, FinalDecision, ProxyDecision, StrategyDecision,
};
use crate::error::{GavelError, Result};
use crate::fallback::RuleFallbackEngine;
use crate::history::{AuctionOutcome, AuctionResult, AuctionRoundRecord, HistoryStore};
use crate::intel::{IntelligenceData, MarketIntelligence, MarketIntelligenceResolver};
use crate::oracle::{OracleFailure, OracleOutcome, StrategyOracle};
use crate::proxy::ProxyLogicEngine;
use crate::safety::{SafetyGate, SafetyVerdict, BLOCK_CONFIDENCE};
use crate::validator::{ValidationReport, Validator};

/// Transient per-invocation record carrying every stage's output.
/// Owned by one run, discarded after finalize; never shared across runs.
#[derive(Debug)]
pub struct PipelineState {
    pub context: AuctionContext,
    pub intelligence: Option<MarketIntelligence>,
    pub safety: Option<SafetyVerdict>,
    pub oracle_outcome: Option<OracleOutcome>,
    pub validation: Option<ValidationReport>,
    pub fallback_decision: Option<StrategyDecision>,
    pub proxy_analysis: Option<(StrategyDecision, ProxyDecision)>,
    pub decision_source: Option<DecisionSource>,
}

impl PipelineState {
    fn new(context: AuctionContext) -> Self {
        Self {
            context,
            intelligence: None,
            safety: None,
            oracle_outcome: None,
            validation: None,
            fallback_decision: None,
            proxy_analysis: None,
            decision_source: None,
        }
    }
}

/// Per-process decision counters for monitoring.
#[derive(Debug, Default)]
struct Counters {
    total: AtomicU64,
    llm: AtomicU64,
    fallback: AtomicU64,
    safety_blocks: AtomicU64,
    system_errors: AtomicU64,
}

/// Snapshot of the pipeline counters.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct PipelineStats {
    pub total_decisions: u64,
    pub llm_decisions: u64,
    pub fallback_decisions: u64,
    pub safety_blocks: u64,
    pub system_errors: u64,
}

pub struct DecisionPipeline {
    safety: SafetyGate,
    resolver: MarketIntelligenceResolver,
    validator: Validator,
    fallback: RuleFallbackEngine,
    proxy: ProxyLogicEngine,
    oracle: Option<Arc<dyn StrategyOracle>>,
    history: Option<Arc<dyn HistoryStore>>,
    counters: Counters,
}

impl DecisionPipeline {
    pub fn new(
        config: &AppConfig,
        intel: Arc<IntelligenceData>,
        oracle: Option<Arc<dyn StrategyOracle>>,
    ) -> Self {
        let safe_max_ratio = config.validation.ceiling_ratio.to_f64().unwrap_or(1.0);
        Self {
            safety: SafetyGate::new(config.safety.clone()),
            resolver: MarketIntelligenceResolver::new(intel, safe_max_ratio),
            validator: Validator::new(config.validation.clone()),
            fallback: RuleFallbackEngine::new(config.validation.clone()),
            proxy: ProxyLogicEngine::new(config.validation.clone()),
            oracle,
            history: None,
            counters: Counters::default(),
        }
    }

    /// Attach a history store for outcome recording.
    pub fn with_history(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    /// Run the whole pipeline for one snapshot. Always returns a decision.
    pub async fn decide(&self, ctx: &AuctionContext) -> FinalDecision {
        self.counters.total.fetch_add(1, Ordering::Relaxed);

        let decision = match self.run(ctx).await {
            Ok(decision) => decision,
            Err(e) => {
                error!(domain = %ctx.domain, error = %e, "pipeline run failed");
                FinalDecision::terminal_no_bid(
                    format!("System error: {}. Emergency safe decision: do not bid.", e),
                    0.0,
                    DecisionSource::SystemError,
                )
            }
        };

        match decision.decision_source {
            DecisionSource::Llm => self.counters.llm.fetch_add(1, Ordering::Relaxed),
            DecisionSource::RulesFallback => self.counters.fallback.fetch_add(1, Ordering::Relaxed),
            DecisionSource::SafetyBlock => {
                self.counters.safety_blocks.fetch_add(1, Ordering::Relaxed)
            }
            DecisionSource::SystemError => {
                self.counters.system_errors.fetch_add(1, Ordering::Relaxed)
            }
        };

        info!(
            domain = %ctx.domain,
            strategy = decision.strategy.as_str(),
            source = decision.decision_source.as_str(),
            bid = %decision.recommended_bid_amount,
            confidence = decision.confidence,
            "decision finalized"
        );

        decision
    }

    async fn run(&self, ctx: &AuctionContext) -> Result<FinalDecision> {
        ctx.validate()?;

        let mut state = PipelineState::new(ctx.clone());

        let intel = self.resolver.enrich(ctx, None);
        state.intelligence = Some(intel.clone());

        // Safety gate short-circuits everything downstream
        let verdict = self.safety.check(ctx);
        state.safety = Some(verdict.clone());
        if let SafetyVerdict::Blocked { reason, .. } = verdict {
            state.decision_source = Some(DecisionSource::SafetyBlock);
            return Ok(FinalDecision::terminal_no_bid(
                reason,
                BLOCK_CONFIDENCE,
                DecisionSource::SafetyBlock,
            ));
        }

        // Oracle proposal; absence of an oracle is just another failure mode
        let outcome = match &self.oracle {
            Some(oracle) => oracle.propose(ctx, &intel).await,
            None => OracleOutcome::Failure(OracleFailure::NotConfigured),
        };
        state.oracle_outcome = Some(outcome);

        // Trust the proposal only if it survives tiered validation
        let (chosen, source) = match state.oracle_outcome.as_ref().and_then(|o| o.proposal()) {
            Some(proposal) => {
                let report = self.validator.validate(proposal, ctx);
                let valid = report.is_valid();
                state.validation = Some(report);
                if valid {
                    (proposal.clone(), DecisionSource::Llm)
                } else {
                    let fallback = self.fallback.select(ctx, &intel);
                    state.fallback_decision = Some(fallback.clone());
                    (fallback, DecisionSource::RulesFallback)
                }
            }
            None => {
                let fallback = self.fallback.select(ctx, &intel);
                state.fallback_decision = Some(fallback.clone());
                (fallback, DecisionSource::RulesFallback)
            }
        };

        state.proxy_analysis = Some(self.proxy.apply(ctx, chosen));
        state.decision_source = Some(source);

        Ok(Self::finalize(state))
    }

    /// Assemble the final decision. The missing-proxy branch is defensive:
    /// the transitions above always populate it.
    fn finalize(state: PipelineState) -> FinalDecision {
        match state.proxy_analysis {
            Some((strategy, proxy)) => FinalDecision::from_parts(
                strategy,
                proxy,
                state.decision_source.unwrap_or(DecisionSource::RulesFallback),
            ),
            None => FinalDecision::terminal_no_bid(
                "System error: No valid strategy or proxy analysis available".to_string(),
                0.0,
                DecisionSource::SystemError,
            ),
        }
    }

    /// Record how the auction ended so the learning layer can use it.
    /// Keyed by the decision id, so retries upsert the same row.
    pub async fn record_outcome(
        &self,
        ctx: &AuctionContext,
        decision: &FinalDecision,
        result: AuctionResult,
        final_price: rust_decimal::Decimal,
    ) -> Result<()> {
        let history = self
            .history
            .as_ref()
            .ok_or_else(|| GavelError::Internal("no history store attached".to_string()))?;

        let profit_margin = match result {
            AuctionResult::Won if ctx.estimated_value > rust_decimal::Decimal::ZERO => {
                let value = ctx.estimated_value.to_f64().unwrap_or(0.0);
                let price = final_price.to_f64().unwrap_or(0.0);
                Some((value - price) / value)
            }
            _ => None,
        };

        let outcome = AuctionOutcome {
            auction_id: format!("{}_{}", ctx.domain, decision.decision_id),
            domain: ctx.domain.clone(),
            platform: ctx.platform,
            timestamp: decision.decided_at,
            estimated_value: ctx.estimated_value,
            current_bid_at_decision: ctx.current_bid,
            final_price,
            num_bidders: ctx.num_bidders,
            hours_remaining_at_decision: ctx.hours_remaining,
            bot_detected: ctx.bidder_analysis.bot_detected,
            strategy_used: decision.strategy,
            recommended_bid: decision.recommended_bid_amount,
            decision_source: decision.decision_source,
            confidence: decision.confidence,
            result,
            profit_margin,
            opponent_hash: None,
        };

        history.record_outcome(&outcome).await
    }

    /// Record one round of a multi-round auction thread (e.g. after being
    /// outbid). Round number continues from what the store already holds.
    pub async fn record_round_outcome(
        &self,
        ctx: &AuctionContext,
        decision: &FinalDecision,
        result_round: &str,
    ) -> Result<()> {
        let history = self
            .history
            .as_ref()
            .ok_or_else(|| GavelError::Internal("no history store attached".to_string()))?;

        let thread_id = ctx
            .thread_id
            .as_ref()
            .ok_or_else(|| GavelError::Internal("context has no thread_id".to_string()))?;

        let existing = history.get_rounds_for_thread(thread_id).await?;
        let record = AuctionRoundRecord {
            thread_id: thread_id.clone(),
            round_number: existing.len() as u32 + 1,
            domain: ctx.domain.clone(),
            platform: ctx.platform,
            estimated_value: ctx.estimated_value,
            current_bid_at_decision: ctx.current_bid,
            strategy_used: decision.strategy,
            recommended_bid: decision.recommended_bid_amount,
            decision_source: decision.decision_source,
            confidence: decision.confidence,
            result_round: result_round.to_string(),
            timestamp: decision.decided_at,
        };

        history.record_round(&record).await
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            total_decisions: self.counters.total.load(Ordering::Relaxed),
            llm_decisions: self.counters.llm.load(Ordering::Relaxed),
            fallback_decisions: self.counters.fallback.load(Ordering::Relaxed),
            safety_blocks: self.counters.safety_blocks.load(Ordering::Relaxed),
            system_errors: self.counters.system_errors.load(Ordering::Relaxed),
        }
    }
}
