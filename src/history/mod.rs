//! Persistent auction history: outcomes, per-round records, and the
//! aggregate strategy statistics derived from them.
//!
//! The store is an abstract async seam; all writes are idempotent upserts on
//! natural keys (auction_id; thread_id + round_number) because the agent may
//! retry after partial failures.

mod learning;
mod memory;
mod postgres;

pub use learning::{HistoricalContext, HistoricalInsights, HistoricalLearning};
pub use memory::InMemoryHistory;
pub use postgres::PostgresHistory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{DecisionSource, Platform, Strategy, ValueTier};
use crate::error::Result;

/// How an auction (or a round of it) ended for us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuctionResult {
    Won,
    Lost,
    Abandoned,
}

impl AuctionResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuctionResult::Won => "won",
            AuctionResult::Lost => "lost",
            AuctionResult::Abandoned => "abandoned",
        }
    }
}

impl std::str::FromStr for AuctionResult {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "won" => Ok(AuctionResult::Won),
            "lost" => Ok(AuctionResult::Lost),
            "abandoned" => Ok(AuctionResult::Abandoned),
            other => Err(format!("unknown auction result: {}", other)),
        }
    }
}

/// Record of a completed auction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionOutcome {
    pub auction_id: String,
    pub domain: String,
    pub platform: Platform,
    pub timestamp: DateTime<Utc>,

    // Context at decision time
    pub estimated_value: Decimal,
    pub current_bid_at_decision: Decimal,
    pub final_price: Decimal,
    pub num_bidders: u32,
    pub hours_remaining_at_decision: f64,
    pub bot_detected: bool,

    // The agent's decision
    pub strategy_used: Strategy,
    pub recommended_bid: Decimal,
    pub decision_source: DecisionSource,
    pub confidence: f64,

    // Outcome
    pub result: AuctionResult,
    /// Only meaningful for wins
    pub profit_margin: Option<f64>,

    /// Stable hash of the main opponent, when identified
    pub opponent_hash: Option<String>,
}

impl AuctionOutcome {
    pub fn value_tier(&self) -> ValueTier {
        ValueTier::from_value(self.estimated_value)
    }
}

/// One bid round within a single auction (grouped by thread_id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionRoundRecord {
    pub thread_id: String,
    pub round_number: u32,
    pub domain: String,
    pub platform: Platform,
    pub estimated_value: Decimal,
    pub current_bid_at_decision: Decimal,
    pub strategy_used: Strategy,
    pub recommended_bid: Decimal,
    pub decision_source: DecisionSource,
    pub confidence: f64,
    pub result_round: String,
    pub timestamp: DateTime<Utc>,
}

/// Aggregate performance of one strategy in one context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyPerformance {
    pub strategy: Strategy,
    pub total_uses: u64,
    pub wins: u64,
    pub total_profit: f64,
}

impl StrategyPerformance {
    pub fn empty(strategy: Strategy) -> Self {
        Self {
            strategy,
            total_uses: 0,
            wins: 0,
            total_profit: 0.0,
        }
    }

    pub fn win_rate(&self) -> f64 {
        self.wins as f64 / (self.total_uses.max(1)) as f64
    }

    pub fn avg_profit_per_win(&self) -> f64 {
        self.total_profit / (self.wins.max(1)) as f64
    }
}

/// Async seam over the history backend. Aggregates are always derived from
/// the stored outcomes, so re-recording a key can never double-count them.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Idempotent upsert keyed by auction_id.
    async fn record_outcome(&self, outcome: &AuctionOutcome) -> Result<()>;

    /// Idempotent upsert keyed by (thread_id, round_number).
    async fn record_round(&self, record: &AuctionRoundRecord) -> Result<()>;

    /// Most recent outcomes on the platform within the value range.
    async fn get_similar_auctions(
        &self,
        platform: Platform,
        value_min: Decimal,
        value_max: Decimal,
        limit: u32,
    ) -> Result<Vec<AuctionOutcome>>;

    /// Aggregate stats for one strategy, optionally narrowed by platform
    /// and value tier.
    async fn get_strategy_performance(
        &self,
        strategy: Strategy,
        platform: Option<Platform>,
        value_tier: Option<ValueTier>,
    ) -> Result<StrategyPerformance>;

    /// Best-performing strategy by win rate, requiring a minimum sample.
    async fn get_best_strategy_for_context(
        &self,
        platform: Platform,
        value_tier: ValueTier,
        min_samples: u64,
    ) -> Result<Option<Strategy>>;

    /// All recorded rounds for one auction thread, in round order.
    async fn get_rounds_for_thread(&self, thread_id: &str) -> Result<Vec<AuctionRoundRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_performance_ratios() {
        let perf = StrategyPerformance {
            strategy: Strategy::ProxyMax,
            total_uses: 10,
            wins: 4,
            total_profit: 200.0,
        };
        assert!((perf.win_rate() - 0.4).abs() < f64::EPSILON);
        assert!((perf.avg_profit_per_win() - 50.0).abs() < f64::EPSILON);

        let empty = StrategyPerformance::empty(Strategy::ProxyMax);
        assert_eq!(empty.win_rate(), 0.0);
        assert_eq!(empty.avg_profit_per_win(), 0.0);
    }

    #[test]
    fn test_result_round_trip() {
        for r in [
            AuctionResult::Won,
            AuctionResult::Lost,
            AuctionResult::Abandoned,
        ] {
            assert_eq!(r.as_str().parse::<AuctionResult>().unwrap(), r);
        }
        assert!("draw".parse::<AuctionResult>().is_err());
    }
}
