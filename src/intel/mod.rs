//! Tiered market-intelligence enrichment.
//!
//! Pure lookups over the offline tables: exact matches first, pattern
//! matches second, aggregates last, each tier carrying its own confidence
//! so downstream consumers can discount weak enrichment.

mod data;
mod resolver;

pub use data::{ArchetypeRow, BidderProfile, DomainStat, IntelligenceData};
pub use resolver::MarketIntelligenceResolver;

use serde::{Deserialize, Serialize};

/// Behavioral classification of an opponent cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BehaviorCluster {
    Professional,
    Casual,
    Sniper,
    Regular,
}

impl BehaviorCluster {
    pub fn as_str(&self) -> &'static str {
        match self {
            BehaviorCluster::Professional => "professional",
            BehaviorCluster::Casual => "casual",
            BehaviorCluster::Sniper => "sniper",
            BehaviorCluster::Regular => "regular",
        }
    }
}

/// Exact-match bidder stats plus derived signals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExactBidderIntel {
    pub bidder_id: String,
    pub total_auctions: u32,
    pub bids_per_auction: f64,
    pub average_bid_increase: f64,
    pub highest_ever_bid: f64,
    pub win_rate: f64,
    pub late_bid_ratio: f64,
    pub average_reaction_time: f64,
    pub proxy_bid_usage_ratio: f64,
    pub is_aggressive: bool,
    pub is_sniper: bool,
    pub is_proxy_heavy: bool,
}

/// Cluster-match bidder stats when no exact profile exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterBidderIntel {
    pub cluster: BehaviorCluster,
    pub sample_size: usize,
    pub avg_win_rate: f64,
    pub fold_probability: f64,
    pub avg_late_bid_ratio: f64,
    pub is_aggressive_cluster: bool,
    pub is_passive_cluster: bool,
    pub counter_strategy: String,
}

/// Best-available opponent intelligence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "match_type", rename_all = "snake_case")]
pub enum BidderIntel {
    Exact(ExactBidderIntel),
    Cluster(ClusterBidderIntel),
    Unknown,
}

impl BidderIntel {
    pub fn is_known(&self) -> bool {
        !matches!(self, BidderIntel::Unknown)
    }

    /// Aggressive-opponent signal used to discount the safe max.
    pub fn flags_aggressive(&self) -> bool {
        match self {
            BidderIntel::Exact(e) => e.is_aggressive,
            BidderIntel::Cluster(c) => c.is_aggressive_cluster,
            BidderIntel::Unknown => false,
        }
    }
}

/// Which tier of the domain waterfall produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainMatchType {
    Exact,
    TldPattern,
    ValueTier,
    PlatformAverage,
}

impl DomainMatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainMatchType::Exact => "exact",
            DomainMatchType::TldPattern => "tld_pattern",
            DomainMatchType::ValueTier => "value_tier",
            DomainMatchType::PlatformAverage => "platform_average",
        }
    }
}

/// TLD-level statistics attached to a tld_pattern match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TldPattern {
    pub tld: String,
    pub median_final_price: f64,
    pub price_std: f64,
    pub is_premium_tld: bool,
    pub is_budget_tld: bool,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
}

/// Domain price intelligence from the first successful waterfall tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainIntel {
    pub match_type: DomainMatchType,
    pub confidence: f64,
    pub average_final_price: f64,
    pub price_volatility: f64,
    pub sample_size: usize,
    pub is_volatile: bool,
    /// True only for exact matches: this very domain has auction history
    pub has_history: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tld_pattern: Option<TldPattern>,
    /// Only for value_tier matches: 85% of the tier's median price
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_max_bid: Option<f64>,
    /// Set on platform-average matches so consumers discount the signal
    pub low_confidence: bool,
}

/// Aggregate macro behavior of auctions on this platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchetypeIntel {
    pub escalation_speed: EscalationSpeed,
    pub sniper_dominated: bool,
    pub proxy_driven: bool,
    pub avg_late_bid_ratio: f64,
    pub avg_bid_jump: f64,
    pub avg_duration_secs: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscalationSpeed {
    Fast,
    Slow,
}

/// Combined win-probability estimate with the factors that shaped it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WinProbability {
    pub probability: f64,
    pub confidence_label: ConfidenceLabel,
    pub competition_level: u32,
    pub opponent_strength: f64,
    pub budget_adequacy: f64,
    pub domain_predictability: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLabel {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BidRecommendation {
    StrongBid,
    ModerateBid,
    WeakBid,
}

/// Expected-value analysis guiding resource allocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedValueAnalysis {
    pub expected_final_price: f64,
    pub expected_profit: f64,
    pub expected_margin: f64,
    pub expected_value: f64,
    pub risk_adjusted_ev: f64,
    pub roi: f64,
    pub recommendation: BidRecommendation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResourcePriority {
    High,
    Medium,
    Low,
}

/// Priority score for allocating budget across concurrent auctions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceScore {
    pub score: f64,
    pub priority: ResourcePriority,
    pub action: String,
    pub explanation: String,
}

/// Full enrichment record consumed by the oracle prompt, the validator,
/// the fallback trees, and the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketIntelligence {
    pub bidder: BidderIntel,
    pub domain: Option<DomainIntel>,
    pub archetype: Option<ArchetypeIntel>,
    pub win_probability: WinProbability,
    pub expected_value: ExpectedValueAnalysis,
    pub resource_score: ResourceScore,
}
