//! Learning from recorded history: contextual insights for the oracle
//! prompt and dynamic safe-max tuning from observed clearing prices.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;

use super::{AuctionResult, HistoryStore, StrategyPerformance};
use crate::domain::{AuctionContext, Strategy, ValueTier};
use crate::error::Result;

/// Insights distilled from similar past auctions.
#[derive(Debug, Clone, Default)]
pub struct HistoricalInsights {
    pub has_data: bool,
    pub total_similar: usize,
    pub win_rate: f64,
    /// Mean of final_price / estimated_value over similar auctions
    pub avg_final_price_ratio: Option<f64>,
    pub price_ratio_insight: Option<String>,
    pub winning_strategies: HashMap<Strategy, u32>,
}

/// Everything history can tell us about the current auction's context.
#[derive(Debug, Clone)]
pub struct HistoricalContext {
    pub similar_auctions_count: usize,
    pub insights: HistoricalInsights,
    /// Only strategies that have actually been used in this context
    pub strategy_performance: Vec<StrategyPerformance>,
    pub historically_best_strategy: Option<Strategy>,
    pub value_tier: ValueTier,
}

pub struct HistoricalLearning {
    store: Arc<dyn HistoryStore>,
}

impl HistoricalLearning {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }

    /// Gather historical insight for the current auction.
    pub async fn historical_context(&self, ctx: &AuctionContext) -> Result<HistoricalContext> {
        let value_tier = ctx.value_tier();
        let value_range = ctx.estimated_value * dec!(0.3);

        let similar = self
            .store
            .get_similar_auctions(
                ctx.platform,
                ctx.estimated_value - value_range,
                ctx.estimated_value + value_range,
                10,
            )
            .await?;

        let insights = Self::calculate_insights(&similar);

        let mut strategy_performance = Vec::new();
        for strategy in Strategy::biddable() {
            let stats = self
                .store
                .get_strategy_performance(strategy, Some(ctx.platform), Some(value_tier))
                .await?;
            if stats.total_uses > 0 {
                strategy_performance.push(stats);
            }
        }

        let historically_best_strategy = self
            .store
            .get_best_strategy_for_context(ctx.platform, value_tier, 5)
            .await?;

        Ok(HistoricalContext {
            similar_auctions_count: similar.len(),
            insights,
            strategy_performance,
            historically_best_strategy,
            value_tier,
        })
    }

    fn calculate_insights(similar: &[super::AuctionOutcome]) -> HistoricalInsights {
        if similar.is_empty() {
            return HistoricalInsights::default();
        }

        let wins: Vec<_> = similar
            .iter()
            .filter(|a| a.result == AuctionResult::Won)
            .collect();

        let price_ratios: Vec<f64> = similar
            .iter()
            .filter_map(|a| {
                let price = a.final_price.to_f64()?;
                let value = a.estimated_value.to_f64()?;
                (price > 0.0 && value > 0.0).then(|| price / value)
            })
            .collect();

        let avg_final_price_ratio = if price_ratios.is_empty() {
            None
        } else {
            Some(price_ratios.iter().sum::<f64>() / price_ratios.len() as f64)
        };

        let mut winning_strategies = HashMap::new();
        for win in &wins {
            *winning_strategies.entry(win.strategy_used).or_insert(0) += 1;
        }

        HistoricalInsights {
            has_data: true,
            total_similar: similar.len(),
            win_rate: wins.len() as f64 / similar.len() as f64,
            price_ratio_insight: avg_final_price_ratio.map(|r| {
                format!(
                    "Similar domains typically sold for {:.0}% of estimated value.",
                    r * 100.0
                )
            }),
            avg_final_price_ratio,
            winning_strategies,
        }
    }

    /// Suggest a safe-max ratio adjusted by what this value band actually
    /// clears at and how often we win it. Clamped to [0.55, 0.80].
    pub async fn suggest_dynamic_threshold(
        &self,
        ctx: &AuctionContext,
        base_safe_max_ratio: f64,
    ) -> Result<f64> {
        let historical = self.historical_context(ctx).await?;
        let mut ratio = base_safe_max_ratio;

        if let Some(avg_ratio) = historical.insights.avg_final_price_ratio {
            if avg_ratio < 0.60 {
                ratio -= 0.05;
            } else if avg_ratio > 0.75 {
                ratio += 0.03;
            }
        }

        if historical.insights.has_data {
            if historical.insights.win_rate < 0.3 {
                ratio += 0.05;
            } else if historical.insights.win_rate > 0.8 {
                ratio -= 0.03;
            }
        }

        Ok(ratio.clamp(0.55, 0.80))
    }
}

#[cfg(test)]
mod tests {
    use super::super::{AuctionOutcome, InMemoryHistory};
    use super::*;
    use crate::domain::{BidderAnalysis, DecisionSource, Platform};
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn context() -> AuctionContext {
        AuctionContext {
            domain: "example.com".to_string(),
            platform: Platform::GoDaddy,
            estimated_value: dec!(500),
            current_bid: dec!(100),
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

    fn outcome(id: &str, final_price: Decimal, result: AuctionResult) -> AuctionOutcome {
        AuctionOutcome {
            auction_id: id.to_string(),
            domain: "example.com".to_string(),
            platform: Platform::GoDaddy,
            timestamp: Utc::now(),
            estimated_value: dec!(500),
            current_bid_at_decision: dec!(100),
            final_price,
            num_bidders: 2,
            hours_remaining_at_decision: 1.0,
            bot_detected: false,
            strategy_used: Strategy::ProxyMax,
            recommended_bid: dec!(450),
            decision_source: DecisionSource::Llm,
            confidence: 0.7,
            result,
            profit_margin: (result == AuctionResult::Won).then_some(0.3),
            opponent_hash: None,
        }
    }

    #[tokio::test]
    async fn test_context_with_no_history() {
        let learning = HistoricalLearning::new(Arc::new(InMemoryHistory::new()));
        let hc = learning.historical_context(&context()).await.unwrap();
        assert_eq!(hc.similar_auctions_count, 0);
        assert!(!hc.insights.has_data);
        assert!(hc.strategy_performance.is_empty());
        assert!(hc.historically_best_strategy.is_none());
        assert_eq!(hc.value_tier, ValueTier::Medium);
    }

    #[tokio::test]
    async fn test_insights_from_similar_auctions() {
        let store = Arc::new(InMemoryHistory::new());
        store
            .record_outcome(&outcome("a1", dec!(250), AuctionResult::Won))
            .await
            .unwrap();
        store
            .record_outcome(&outcome("a2", dec!(300), AuctionResult::Lost))
            .await
            .unwrap();

        let learning = HistoricalLearning::new(store);
        let hc = learning.historical_context(&context()).await.unwrap();
        assert_eq!(hc.similar_auctions_count, 2);
        assert!(hc.insights.has_data);
        assert!((hc.insights.win_rate - 0.5).abs() < f64::EPSILON);
        // (250 + 300) / 2 / 500 = 0.55
        assert!((hc.insights.avg_final_price_ratio.unwrap() - 0.55).abs() < 1e-9);
        assert_eq!(hc.insights.winning_strategies.get(&Strategy::ProxyMax), Some(&1));
        assert_eq!(hc.strategy_performance.len(), 1);
    }

    #[tokio::test]
    async fn test_dynamic_threshold_cheap_band_lowers_ratio() {
        let store = Arc::new(InMemoryHistory::new());
        // Everything sells around 50% of estimate, and we win often
        for i in 0..5 {
            store
                .record_outcome(&outcome(&format!("a{}", i), dec!(250), AuctionResult::Won))
                .await
                .unwrap();
        }
        let learning = HistoricalLearning::new(store);
        let ratio = learning
            .suggest_dynamic_threshold(&context(), 0.70)
            .await
            .unwrap();
        // -0.05 (cheap band) -0.03 (high win rate)
        assert!((ratio - 0.62).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_dynamic_threshold_clamps() {
        let learning = HistoricalLearning::new(Arc::new(InMemoryHistory::new()));
        // no data: base passes through, clamped to the band
        let ratio = learning
            .suggest_dynamic_threshold(&context(), 0.95)
            .await
            .unwrap();
        assert!((ratio - 0.80).abs() < f64::EPSILON);
        let ratio = learning
            .suggest_dynamic_threshold(&context(), 0.40)
            .await
            .unwrap();
        assert!((ratio - 0.55).abs() < f64::EPSILON);
    }
}
