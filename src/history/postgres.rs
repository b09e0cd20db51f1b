//! PostgreSQL history backend.
//!
//! Writes are `ON CONFLICT` upserts on the natural keys; aggregates are
//! computed from the stored outcomes at query time, so replays and retries
//! can never double-count.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::{info, instrument};

use super::{
    AuctionOutcome, AuctionRoundRecord, HistoryStore, StrategyPerformance,
};
use crate::config::DatabaseConfig;
use crate::domain::{Platform, Strategy, ValueTier};
use crate::error::{GavelError, Result};

pub struct PostgresHistory {
    pool: PgPool,
}

impl PostgresHistory {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;
        Ok(Self { pool })
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("database migrations completed");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Parse a TEXT column back into one of the serde enums.
fn parse_enum<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|e| GavelError::Internal(format!("corrupt enum value '{}': {}", raw, e)))
}

fn row_to_outcome(row: &sqlx::postgres::PgRow) -> Result<AuctionOutcome> {
    Ok(AuctionOutcome {
        auction_id: row.get("auction_id"),
        domain: row.get("domain"),
        platform: parse_enum(row.get::<&str, _>("platform"))?,
        timestamp: row.get("timestamp"),
        estimated_value: row.get("estimated_value"),
        current_bid_at_decision: row.get("current_bid_at_decision"),
        final_price: row.get("final_price"),
        num_bidders: row.get::<i32, _>("num_bidders") as u32,
        hours_remaining_at_decision: row.get("hours_remaining_at_decision"),
        bot_detected: row.get("bot_detected"),
        strategy_used: parse_enum(row.get::<&str, _>("strategy_used"))?,
        recommended_bid: row.get("recommended_bid"),
        decision_source: parse_enum(row.get::<&str, _>("decision_source"))?,
        confidence: row.get("confidence"),
        result: parse_enum(row.get::<&str, _>("result"))?,
        profit_margin: row.get("profit_margin"),
        opponent_hash: row.get("opponent_hash"),
    })
}

fn row_to_round(row: &sqlx::postgres::PgRow) -> Result<AuctionRoundRecord> {
    Ok(AuctionRoundRecord {
        thread_id: row.get("thread_id"),
        round_number: row.get::<i32, _>("round_number") as u32,
        domain: row.get("domain"),
        platform: parse_enum(row.get::<&str, _>("platform"))?,
        estimated_value: row.get("estimated_value"),
        current_bid_at_decision: row.get("current_bid_at_decision"),
        strategy_used: parse_enum(row.get::<&str, _>("strategy_used"))?,
        recommended_bid: row.get("recommended_bid"),
        decision_source: parse_enum(row.get::<&str, _>("decision_source"))?,
        confidence: row.get("confidence"),
        result_round: row.get("result_round"),
        timestamp: row.get("timestamp"),
    })
}

/// SQL expression deriving the value tier from estimated_value, matching
/// `ValueTier::from_value`.
const VALUE_TIER_SQL: &str = "CASE WHEN estimated_value >= 1000 THEN 'high' \
                              WHEN estimated_value >= 100 THEN 'medium' \
                              ELSE 'low' END";

#[async_trait]
impl HistoryStore for PostgresHistory {
    #[instrument(skip(self, outcome), fields(auction_id = %outcome.auction_id))]
    async fn record_outcome(&self, outcome: &AuctionOutcome) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO auction_outcomes (
                auction_id, domain, platform, timestamp, estimated_value,
                current_bid_at_decision, final_price, num_bidders,
                hours_remaining_at_decision, bot_detected, strategy_used,
                recommended_bid, decision_source, confidence, result,
                profit_margin, opponent_hash
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            ON CONFLICT (auction_id) DO UPDATE SET
                domain = EXCLUDED.domain,
                platform = EXCLUDED.platform,
                timestamp = EXCLUDED.timestamp,
                estimated_value = EXCLUDED.estimated_value,
                current_bid_at_decision = EXCLUDED.current_bid_at_decision,
                final_price = EXCLUDED.final_price,
                num_bidders = EXCLUDED.num_bidders,
                hours_remaining_at_decision = EXCLUDED.hours_remaining_at_decision,
                bot_detected = EXCLUDED.bot_detected,
                strategy_used = EXCLUDED.strategy_used,
                recommended_bid = EXCLUDED.recommended_bid,
                decision_source = EXCLUDED.decision_source,
                confidence = EXCLUDED.confidence,
                result = EXCLUDED.result,
                profit_margin = EXCLUDED.profit_margin,
                opponent_hash = EXCLUDED.opponent_hash
            "#,
        )
        .bind(&outcome.auction_id)
        .bind(&outcome.domain)
        .bind(outcome.platform.as_str())
        .bind(outcome.timestamp)
        .bind(outcome.estimated_value)
        .bind(outcome.current_bid_at_decision)
        .bind(outcome.final_price)
        .bind(outcome.num_bidders as i32)
        .bind(outcome.hours_remaining_at_decision)
        .bind(outcome.bot_detected)
        .bind(outcome.strategy_used.as_str())
        .bind(outcome.recommended_bid)
        .bind(outcome.decision_source.as_str())
        .bind(outcome.confidence)
        .bind(outcome.result.as_str())
        .bind(outcome.profit_margin)
        .bind(&outcome.opponent_hash)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self, record), fields(thread_id = %record.thread_id, round = record.round_number))]
    async fn record_round(&self, record: &AuctionRoundRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO auction_rounds (
                thread_id, round_number, domain, platform, estimated_value,
                current_bid_at_decision, strategy_used, recommended_bid,
                decision_source, confidence, result_round, timestamp
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (thread_id, round_number) DO UPDATE SET
                domain = EXCLUDED.domain,
                platform = EXCLUDED.platform,
                estimated_value = EXCLUDED.estimated_value,
                current_bid_at_decision = EXCLUDED.current_bid_at_decision,
                strategy_used = EXCLUDED.strategy_used,
                recommended_bid = EXCLUDED.recommended_bid,
                decision_source = EXCLUDED.decision_source,
                confidence = EXCLUDED.confidence,
                result_round = EXCLUDED.result_round,
                timestamp = EXCLUDED.timestamp
            "#,
        )
        .bind(&record.thread_id)
        .bind(record.round_number as i32)
        .bind(&record.domain)
        .bind(record.platform.as_str())
        .bind(record.estimated_value)
        .bind(record.current_bid_at_decision)
        .bind(record.strategy_used.as_str())
        .bind(record.recommended_bid)
        .bind(record.decision_source.as_str())
        .bind(record.confidence)
        .bind(&record.result_round)
        .bind(record.timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_similar_auctions(
        &self,
        platform: Platform,
        value_min: Decimal,
        value_max: Decimal,
        limit: u32,
    ) -> Result<Vec<AuctionOutcome>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM auction_outcomes
            WHERE platform = $1
              AND estimated_value BETWEEN $2 AND $3
            ORDER BY timestamp DESC
            LIMIT $4
            "#,
        )
        .bind(platform.as_str())
        .bind(value_min)
        .bind(value_max)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_outcome).collect()
    }

    async fn get_strategy_performance(
        &self,
        strategy: Strategy,
        platform: Option<Platform>,
        value_tier: Option<ValueTier>,
    ) -> Result<StrategyPerformance> {
        let query = format!(
            r#"
            SELECT
                COUNT(*) AS total_uses,
                COUNT(*) FILTER (WHERE result = 'won') AS wins,
                COALESCE(SUM(profit_margin * final_price::float8)
                         FILTER (WHERE result = 'won'), 0) AS total_profit
            FROM auction_outcomes
            WHERE strategy_used = $1
              AND ($2::text IS NULL OR platform = $2)
              AND ($3::text IS NULL OR ({}) = $3)
            "#,
            VALUE_TIER_SQL
        );

        let row = sqlx::query(&query)
            .bind(strategy.as_str())
            .bind(platform.map(|p| p.as_str()))
            .bind(value_tier.map(|t| t.as_str()))
            .fetch_one(&self.pool)
            .await?;

        Ok(StrategyPerformance {
            strategy,
            total_uses: row.get::<i64, _>("total_uses") as u64,
            wins: row.get::<i64, _>("wins") as u64,
            total_profit: row.get("total_profit"),
        })
    }

    async fn get_best_strategy_for_context(
        &self,
        platform: Platform,
        value_tier: ValueTier,
        min_samples: u64,
    ) -> Result<Option<Strategy>> {
        let query = format!(
            r#"
            SELECT
                strategy_used,
                COUNT(*) FILTER (WHERE result = 'won')::float8 / COUNT(*) AS win_rate
            FROM auction_outcomes
            WHERE platform = $1
              AND ({}) = $2
            GROUP BY strategy_used
            HAVING COUNT(*) >= $3
            ORDER BY win_rate DESC
            LIMIT 1
            "#,
            VALUE_TIER_SQL
        );

        let row = sqlx::query(&query)
            .bind(platform.as_str())
            .bind(value_tier.as_str())
            .bind(min_samples as i64)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| parse_enum(r.get::<&str, _>("strategy_used")))
            .transpose()
    }

    async fn get_rounds_for_thread(&self, thread_id: &str) -> Result<Vec<AuctionRoundRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM auction_rounds
            WHERE thread_id = $1
            ORDER BY round_number ASC
            "#,
        )
        .bind(thread_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_round).collect()
    }
}
