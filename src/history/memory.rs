//! In-memory history backend for dry runs and tests.
//!
//! Mirrors the Postgres backend's semantics exactly: upserts on natural
//! keys, aggregates derived from stored outcomes.

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{
    AuctionOutcome, AuctionResult, AuctionRoundRecord, HistoryStore, StrategyPerformance,
};
use crate::domain::{Platform, Strategy, ValueTier};
use crate::error::Result;

#[derive(Default)]
pub struct InMemoryHistory {
    outcomes: Mutex<HashMap<String, AuctionOutcome>>,
    rounds: Mutex<HashMap<(String, u32), AuctionRoundRecord>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    fn matching_outcomes(
        &self,
        strategy: Option<Strategy>,
        platform: Option<Platform>,
        value_tier: Option<ValueTier>,
    ) -> Vec<AuctionOutcome> {
        let outcomes = self.outcomes.lock().expect("history lock poisoned");
        outcomes
            .values()
            .filter(|o| strategy.map_or(true, |s| o.strategy_used == s))
            .filter(|o| platform.map_or(true, |p| o.platform == p))
            .filter(|o| value_tier.map_or(true, |t| o.value_tier() == t))
            .cloned()
            .collect()
    }

    fn aggregate(strategy: Strategy, outcomes: &[AuctionOutcome]) -> StrategyPerformance {
        let wins = outcomes
            .iter()
            .filter(|o| o.result == AuctionResult::Won)
            .count() as u64;
        let total_profit = outcomes
            .iter()
            .filter(|o| o.result == AuctionResult::Won)
            .filter_map(|o| {
                o.profit_margin
                    .map(|m| m * o.final_price.to_f64().unwrap_or(0.0))
            })
            .sum();
        StrategyPerformance {
            strategy,
            total_uses: outcomes.len() as u64,
            wins,
            total_profit,
        }
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistory {
    async fn record_outcome(&self, outcome: &AuctionOutcome) -> Result<()> {
        self.outcomes
            .lock()
            .expect("history lock poisoned")
            .insert(outcome.auction_id.clone(), outcome.clone());
        Ok(())
    }

    async fn record_round(&self, record: &AuctionRoundRecord) -> Result<()> {
        self.rounds
            .lock()
            .expect("history lock poisoned")
            .insert(
                (record.thread_id.clone(), record.round_number),
                record.clone(),
            );
        Ok(())
    }

    async fn get_similar_auctions(
        &self,
        platform: Platform,
        value_min: Decimal,
        value_max: Decimal,
        limit: u32,
    ) -> Result<Vec<AuctionOutcome>> {
        let mut matches: Vec<AuctionOutcome> = self
            .matching_outcomes(None, Some(platform), None)
            .into_iter()
            .filter(|o| o.estimated_value >= value_min && o.estimated_value <= value_max)
            .collect();
        matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        matches.truncate(limit as usize);
        Ok(matches)
    }

    async fn get_strategy_performance(
        &self,
        strategy: Strategy,
        platform: Option<Platform>,
        value_tier: Option<ValueTier>,
    ) -> Result<StrategyPerformance> {
        let outcomes = self.matching_outcomes(Some(strategy), platform, value_tier);
        Ok(Self::aggregate(strategy, &outcomes))
    }

    async fn get_best_strategy_for_context(
        &self,
        platform: Platform,
        value_tier: ValueTier,
        min_samples: u64,
    ) -> Result<Option<Strategy>> {
        let mut best: Option<(Strategy, f64)> = None;
        for strategy in Strategy::biddable() {
            let perf = self
                .get_strategy_performance(strategy, Some(platform), Some(value_tier))
                .await?;
            if perf.total_uses < min_samples {
                continue;
            }
            let rate = perf.win_rate();
            if best.map_or(true, |(_, r)| rate > r) {
                best = Some((strategy, rate));
            }
        }
        Ok(best.map(|(s, _)| s))
    }

    async fn get_rounds_for_thread(&self, thread_id: &str) -> Result<Vec<AuctionRoundRecord>> {
        let rounds = self.rounds.lock().expect("history lock poisoned");
        let mut matches: Vec<AuctionRoundRecord> = rounds
            .values()
            .filter(|r| r.thread_id == thread_id)
            .cloned()
            .collect();
        matches.sort_by_key(|r| r.round_number);
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DecisionSource;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn outcome(auction_id: &str, result: AuctionResult, strategy: Strategy) -> AuctionOutcome {
        AuctionOutcome {
            auction_id: auction_id.to_string(),
            domain: "example.com".to_string(),
            platform: Platform::GoDaddy,
            timestamp: Utc::now(),
            estimated_value: dec!(500),
            current_bid_at_decision: dec!(100),
            final_price: dec!(350),
            num_bidders: 2,
            hours_remaining_at_decision: 1.0,
            bot_detected: false,
            strategy_used: strategy,
            recommended_bid: dec!(450),
            decision_source: DecisionSource::Llm,
            confidence: 0.7,
            result,
            profit_margin: match result {
                AuctionResult::Won => Some(0.3),
                _ => None,
            },
            opponent_hash: None,
        }
    }

    #[tokio::test]
    async fn test_record_outcome_is_idempotent() {
        let store = InMemoryHistory::new();
        let o = outcome("a1", AuctionResult::Won, Strategy::ProxyMax);
        store.record_outcome(&o).await.unwrap();
        store.record_outcome(&o).await.unwrap();

        let perf = store
            .get_strategy_performance(Strategy::ProxyMax, None, None)
            .await
            .unwrap();
        assert_eq!(perf.total_uses, 1);
        assert_eq!(perf.wins, 1);
    }

    #[tokio::test]
    async fn test_record_round_is_idempotent() {
        let store = InMemoryHistory::new();
        let record = AuctionRoundRecord {
            thread_id: "t1".to_string(),
            round_number: 1,
            domain: "example.com".to_string(),
            platform: Platform::GoDaddy,
            estimated_value: dec!(500),
            current_bid_at_decision: dec!(100),
            strategy_used: Strategy::ProxyMax,
            recommended_bid: dec!(450),
            decision_source: DecisionSource::Llm,
            confidence: 0.7,
            result_round: "outbid".to_string(),
            timestamp: Utc::now(),
        };
        store.record_round(&record).await.unwrap();
        store.record_round(&record).await.unwrap();

        let rounds = store.get_rounds_for_thread("t1").await.unwrap();
        assert_eq!(rounds.len(), 1);
    }

    #[tokio::test]
    async fn test_similar_auctions_filters_by_platform_and_range() {
        let store = InMemoryHistory::new();
        store
            .record_outcome(&outcome("a1", AuctionResult::Won, Strategy::ProxyMax))
            .await
            .unwrap();
        let mut other = outcome("a2", AuctionResult::Lost, Strategy::ProxyMax);
        other.platform = Platform::NameJet;
        store.record_outcome(&other).await.unwrap();
        let mut pricey = outcome("a3", AuctionResult::Lost, Strategy::ProxyMax);
        pricey.estimated_value = dec!(5000);
        store.record_outcome(&pricey).await.unwrap();

        let similar = store
            .get_similar_auctions(Platform::GoDaddy, dec!(300), dec!(700), 10)
            .await
            .unwrap();
        assert_eq!(similar.len(), 1);
        assert_eq!(similar[0].auction_id, "a1");
    }

    #[tokio::test]
    async fn test_best_strategy_requires_min_samples() {
        let store = InMemoryHistory::new();
        store
            .record_outcome(&outcome("a1", AuctionResult::Won, Strategy::ProxyMax))
            .await
            .unwrap();

        // one sample is below the threshold
        let best = store
            .get_best_strategy_for_context(Platform::GoDaddy, ValueTier::Medium, 5)
            .await
            .unwrap();
        assert!(best.is_none());

        for i in 0..5 {
            store
                .record_outcome(&outcome(
                    &format!("s{}", i),
                    AuctionResult::Won,
                    Strategy::LastMinuteSnipe,
                ))
                .await
                .unwrap();
        }
        let best = store
            .get_best_strategy_for_context(Platform::GoDaddy, ValueTier::Medium, 5)
            .await
            .unwrap();
        assert_eq!(best, Some(Strategy::LastMinuteSnipe));
    }
}
