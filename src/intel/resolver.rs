//! Waterfall lookups and scoring over the intelligence tables.

use rust_decimal::prelude::ToPrimitive;
use std::sync::Arc;
use tracing::debug;

use super::data::{mean, quantile, std_dev, IntelligenceData};
use super::{
    ArchetypeIntel, BehaviorCluster, BidRecommendation, BidderIntel, ClusterBidderIntel,
    ConfidenceLabel, DomainIntel, DomainMatchType, EscalationSpeed, ExactBidderIntel,
    ExpectedValueAnalysis, MarketIntelligence, ResourcePriority, ResourceScore, TldPattern,
    WinProbability,
};
use crate::domain::AuctionContext;

const PREMIUM_TLDS: [&str; 3] = [".com", ".net", ".org"];
const BUDGET_TLDS: [&str; 4] = [".xyz", ".online", ".site", ".club"];

/// Tolerance bands for behavioral-cluster matching.
const AGGRESSION_TOLERANCE: f64 = 2.0;
const REACTION_TOLERANCE_SECS: f64 = 60.0;

pub struct MarketIntelligenceResolver {
    data: Arc<IntelligenceData>,
    /// Safe-max fraction of estimated value, used for budget-adequacy scoring
    safe_max_ratio: f64,
}

impl MarketIntelligenceResolver {
    pub fn new(data: Arc<IntelligenceData>, safe_max_ratio: f64) -> Self {
        Self {
            data,
            safe_max_ratio,
        }
    }

    /// Assemble the full enrichment record for one auction snapshot.
    /// Pure function of the tables and the context.
    pub fn enrich(&self, ctx: &AuctionContext, last_bidder_id: Option<&str>) -> MarketIntelligence {
        let bidder = self.bidder_intelligence(ctx, last_bidder_id);
        let domain = self.domain_intelligence(&ctx.domain, ctx.estimated_value.to_f64());
        let archetype = self.auction_archetype();
        let win_probability = self.estimate_win_probability(ctx, &bidder, domain.as_ref());
        let expected_value = self.calculate_expected_value(ctx, &win_probability, domain.as_ref());
        let resource_score = Self::calculate_resource_score(&win_probability, &expected_value);

        debug!(
            domain = %ctx.domain,
            win_probability = win_probability.probability,
            roi = expected_value.roi,
            domain_match = domain.as_ref().map(|d| d.match_type.as_str()),
            "market intelligence assembled"
        );

        MarketIntelligence {
            bidder,
            domain,
            archetype,
            win_probability,
            expected_value,
            resource_score,
        }
    }

    // ── Bidder intelligence ────────────────────────────────────

    /// Exact profile match, else behavioral-cluster match on the live read.
    fn bidder_intelligence(
        &self,
        ctx: &AuctionContext,
        last_bidder_id: Option<&str>,
    ) -> BidderIntel {
        if let Some(id) = last_bidder_id {
            if let Some(profile) = self.data.bidder(id) {
                return BidderIntel::Exact(ExactBidderIntel {
                    bidder_id: profile.bidder_id.clone(),
                    total_auctions: profile.total_auctions,
                    bids_per_auction: profile.total_bids as f64
                        / (profile.total_auctions.max(1)) as f64,
                    average_bid_increase: profile.avg_bid_increase,
                    highest_ever_bid: profile.max_bid,
                    win_rate: profile.win_rate,
                    late_bid_ratio: profile.late_bid_ratio,
                    average_reaction_time: profile.avg_reaction_time,
                    proxy_bid_usage_ratio: profile.proxy_usage,
                    is_aggressive: profile.avg_bid_increase > 50.0,
                    is_sniper: profile.late_bid_ratio > 0.7,
                    is_proxy_heavy: profile.proxy_usage > 0.8,
                });
            }
        }

        self.behavioral_cluster(
            ctx.bidder_analysis.aggression_score,
            ctx.bidder_analysis.reaction_time_avg_secs,
        )
    }

    /// Match the live aggression/reaction read against profile clusters.
    /// Both bands first; aggression-only if that finds nothing.
    fn behavioral_cluster(&self, live_aggression: f64, live_reaction_secs: f64) -> BidderIntel {
        if self.data.bidders.is_empty() {
            return BidderIntel::Unknown;
        }

        let both_bands: Vec<_> = self
            .data
            .bidders
            .iter()
            .filter(|b| {
                (b.aggression_normalized() - live_aggression).abs() <= AGGRESSION_TOLERANCE
                    && (b.avg_reaction_time - live_reaction_secs).abs() <= REACTION_TOLERANCE_SECS
            })
            .collect();

        let similar = if both_bands.is_empty() {
            self.data
                .bidders
                .iter()
                .filter(|b| {
                    (b.aggression_normalized() - live_aggression).abs() <= AGGRESSION_TOLERANCE
                })
                .collect()
        } else {
            both_bands
        };

        if similar.is_empty() {
            return BidderIntel::Unknown;
        }

        let win_rates: Vec<f64> = similar.iter().map(|b| b.win_rate).collect();
        let late_ratios: Vec<f64> = similar.iter().map(|b| b.late_bid_ratio).collect();
        let avg_win_rate = mean(&win_rates);
        let avg_late_bid_ratio = mean(&late_ratios);

        let cluster = if avg_win_rate > 0.6 {
            BehaviorCluster::Professional
        } else if avg_win_rate < 0.15 {
            BehaviorCluster::Casual
        } else if avg_late_bid_ratio > 0.7 {
            BehaviorCluster::Sniper
        } else {
            BehaviorCluster::Regular
        };

        let fold_probability = 1.0 - avg_win_rate;

        BidderIntel::Cluster(ClusterBidderIntel {
            cluster,
            sample_size: similar.len(),
            avg_win_rate,
            fold_probability,
            avg_late_bid_ratio,
            is_aggressive_cluster: live_aggression > 6.0,
            is_passive_cluster: live_aggression < 3.0,
            counter_strategy: counter_strategy(cluster, fold_probability).to_string(),
        })
    }

    // ── Domain intelligence waterfall ──────────────────────────

    /// Exact match → TLD pattern → value tier → platform average.
    /// Each tier is attempted only when the previous one missed.
    fn domain_intelligence(&self, domain: &str, estimated_value: Option<f64>) -> Option<DomainIntel> {
        // Tier 1: exact domain match
        if let Some(stat) = self.data.domain(domain) {
            return Some(DomainIntel {
                match_type: DomainMatchType::Exact,
                confidence: 0.95,
                average_final_price: stat.avg_final_price,
                price_volatility: stat.volatility,
                sample_size: stat.avg_bids.max(0.0) as usize,
                is_volatile: stat.volatility > 0.3,
                has_history: true,
                tld_pattern: None,
                recommended_max_bid: None,
                low_confidence: false,
            });
        }

        // Tier 2: TLD pattern
        if let Some(intel) = self.tld_pattern(domain) {
            return Some(intel);
        }

        // Tier 3: similar-value tier
        if let Some(value) = estimated_value {
            if let Some(intel) = self.value_tier_pattern(value) {
                return Some(intel);
            }
        }

        // Tier 4: platform-wide average, last resort
        if !self.data.domains.is_empty() {
            let prices: Vec<f64> = self.data.domains.iter().map(|d| d.avg_final_price).collect();
            let volatilities: Vec<f64> = self.data.domains.iter().map(|d| d.volatility).collect();
            let avg_volatility = mean(&volatilities);
            return Some(DomainIntel {
                match_type: DomainMatchType::PlatformAverage,
                confidence: 0.30,
                average_final_price: mean(&prices),
                price_volatility: avg_volatility,
                sample_size: self.data.domains.len(),
                is_volatile: avg_volatility > 0.3,
                has_history: false,
                tld_pattern: None,
                recommended_max_bid: None,
                low_confidence: true,
            });
        }

        None
    }

    /// Statistics over all domains sharing the TLD, e.g. budgetgone.xyz
    /// falls back to the .xyz population.
    fn tld_pattern(&self, domain: &str) -> Option<DomainIntel> {
        let tld = domain.rfind('.').map(|i| &domain[i..])?;

        let rows: Vec<_> = self
            .data
            .domains
            .iter()
            .filter(|d| d.domain.ends_with(tld))
            .collect();
        if rows.is_empty() {
            return None;
        }

        let mut prices: Vec<f64> = rows.iter().map(|d| d.avg_final_price).collect();
        prices.sort_by(|a, b| a.total_cmp(b));
        let volatilities: Vec<f64> = rows.iter().map(|d| d.volatility).collect();
        let sample_size = rows.len();

        Some(DomainIntel {
            match_type: DomainMatchType::TldPattern,
            confidence: (sample_size as f64 / 50.0).min(0.75),
            average_final_price: mean(&prices),
            price_volatility: mean(&volatilities),
            sample_size,
            is_volatile: mean(&volatilities) > 0.3,
            has_history: false,
            tld_pattern: Some(TldPattern {
                tld: tld.to_string(),
                median_final_price: quantile(&prices, 0.50),
                price_std: std_dev(&prices),
                is_premium_tld: PREMIUM_TLDS.contains(&tld),
                is_budget_tld: BUDGET_TLDS.contains(&tld),
                p25: quantile(&prices, 0.25),
                p50: quantile(&prices, 0.50),
                p75: quantile(&prices, 0.75),
                p90: quantile(&prices, 0.90),
            }),
            recommended_max_bid: None,
            low_confidence: false,
        })
    }

    /// Domains that sold within ±30% of the estimated value reveal what this
    /// price band actually clears at.
    fn value_tier_pattern(&self, estimated_value: f64) -> Option<DomainIntel> {
        let lower = estimated_value * 0.70;
        let upper = estimated_value * 1.30;

        let mut prices: Vec<f64> = self
            .data
            .domains
            .iter()
            .map(|d| d.avg_final_price)
            .filter(|p| (lower..=upper).contains(p))
            .collect();
        if prices.is_empty() {
            return None;
        }
        prices.sort_by(|a, b| a.total_cmp(b));

        let sample_size = prices.len();
        let median = quantile(&prices, 0.50);

        Some(DomainIntel {
            match_type: DomainMatchType::ValueTier,
            confidence: (sample_size as f64 / 100.0).min(0.9),
            average_final_price: mean(&prices),
            price_volatility: 0.0,
            sample_size,
            is_volatile: false,
            has_history: false,
            tld_pattern: None,
            recommended_max_bid: Some(median * 0.85),
            low_confidence: false,
        })
    }

    // ── Archetype ──────────────────────────────────────────────

    fn auction_archetype(&self) -> Option<ArchetypeIntel> {
        if self.data.archetypes.is_empty() {
            return None;
        }
        let late: Vec<f64> = self.data.archetypes.iter().map(|a| a.late_bid_ratio).collect();
        let jumps: Vec<f64> = self.data.archetypes.iter().map(|a| a.avg_bid_jump).collect();
        let durations: Vec<f64> = self.data.archetypes.iter().map(|a| a.duration_secs).collect();

        let avg_late = mean(&late);
        let avg_jump = mean(&jumps);

        Some(ArchetypeIntel {
            escalation_speed: if avg_jump > 50.0 {
                EscalationSpeed::Fast
            } else {
                EscalationSpeed::Slow
            },
            sniper_dominated: avg_late > 0.7,
            proxy_driven: avg_late < 0.3,
            avg_late_bid_ratio: avg_late,
            avg_bid_jump: avg_jump,
            avg_duration_secs: mean(&durations),
        })
    }

    // ── Win probability / EV / resource score ──────────────────

    /// Bayesian-style combination of evidence: a competition prior adjusted
    /// by opponent strength, fold tendency, budget adequacy, and volatility,
    /// in that fixed order, clamped to [0.05, 0.95].
    fn estimate_win_probability(
        &self,
        ctx: &AuctionContext,
        bidder: &BidderIntel,
        domain: Option<&DomainIntel>,
    ) -> WinProbability {
        let mut prob = match ctx.num_bidders {
            0 => 0.95,
            1 => 0.70,
            2 => 0.50,
            _ => 0.30,
        };

        let mut opponent_strength = 0.5;
        match bidder {
            BidderIntel::Exact(exact) => {
                // Our win probability is inversely related to the opponent's
                prob *= 1.0 - exact.win_rate * 0.5;
                opponent_strength = exact.win_rate;
            }
            BidderIntel::Cluster(cluster) => {
                prob += (cluster.fold_probability - 0.5) * 0.2;
                opponent_strength = cluster.avg_win_rate;
            }
            BidderIntel::Unknown => {}
        }

        let value = ctx.estimated_value.to_f64().unwrap_or(0.0);
        let budget = ctx.budget_available.to_f64().unwrap_or(0.0);
        let safe_max = value * self.safe_max_ratio;
        let budget_adequacy = if safe_max > 0.0 { budget / safe_max } else { 0.0 };
        if safe_max > 0.0 && budget < safe_max {
            prob *= 0.5 + 0.5 * budget_adequacy;
        }

        let mut domain_predictability = 0.5;
        if let Some(intel) = domain {
            domain_predictability = 1.0 - intel.price_volatility;
            if intel.price_volatility > 0.3 {
                prob *= 0.90;
            }
        }

        let probability = prob.clamp(0.05, 0.95);

        WinProbability {
            probability,
            confidence_label: if probability > 0.7 {
                ConfidenceLabel::High
            } else if probability > 0.4 {
                ConfidenceLabel::Medium
            } else {
                ConfidenceLabel::Low
            },
            competition_level: ctx.num_bidders,
            opponent_strength,
            budget_adequacy,
            domain_predictability,
        }
    }

    fn calculate_expected_value(
        &self,
        ctx: &AuctionContext,
        win_prob: &WinProbability,
        domain: Option<&DomainIntel>,
    ) -> ExpectedValueAnalysis {
        let value = ctx.estimated_value.to_f64().unwrap_or(0.0);

        let expected_final_price = match domain {
            Some(intel) if intel.average_final_price > 0.0 => intel.average_final_price,
            // No history at all: assume the band clears at 65% of estimate
            _ => value * 0.65,
        };

        let expected_profit = value - expected_final_price;
        let expected_margin = if value > 0.0 { expected_profit / value } else { 0.0 };
        let expected_value = win_prob.probability * expected_profit;

        let volatility_factor = domain.map(|d| d.price_volatility).unwrap_or(0.3);
        let risk_adjusted_ev = expected_value * (1.0 - volatility_factor * 0.5);

        let roi = if expected_final_price > 0.0 {
            risk_adjusted_ev / expected_final_price
        } else {
            0.0
        };

        ExpectedValueAnalysis {
            expected_final_price,
            expected_profit,
            expected_margin,
            expected_value,
            risk_adjusted_ev,
            roi,
            recommendation: if roi > 1.5 {
                BidRecommendation::StrongBid
            } else if roi > 0.8 {
                BidRecommendation::ModerateBid
            } else {
                BidRecommendation::WeakBid
            },
        }
    }

    fn calculate_resource_score(
        win_prob: &WinProbability,
        ev: &ExpectedValueAnalysis,
    ) -> ResourceScore {
        let score = win_prob.probability * ev.expected_margin * (1.0 + ev.roi);

        let (priority, action) = if score > 1.0 {
            (ResourcePriority::High, "Allocate maximum safe budget")
        } else if score > 0.5 {
            (ResourcePriority::Medium, "Allocate moderate budget")
        } else {
            (ResourcePriority::Low, "Minimal bid or skip")
        };

        ResourceScore {
            score,
            priority,
            action: action.to_string(),
            explanation: format!(
                "Win prob {:.1}% x Margin {:.1}% x ROI {:.2} = {:.3}",
                win_prob.probability * 100.0,
                ev.expected_margin * 100.0,
                ev.roi,
                score
            ),
        }
    }
}

/// Counter-strategy recommendation keyed off the cluster type.
fn counter_strategy(cluster: BehaviorCluster, fold_probability: f64) -> &'static str {
    match cluster {
        BehaviorCluster::Professional => {
            "Avoid escalation. Set firm cap and be prepared to walk away."
        }
        BehaviorCluster::Casual => "Opponent likely to fold. Set moderate cap and bid confidently.",
        BehaviorCluster::Sniper => {
            "Counter-snipe in final seconds or use early proxy to discourage."
        }
        BehaviorCluster::Regular if fold_probability > 0.85 => {
            "Opponent likely to fold. Set moderate cap and bid confidently."
        }
        BehaviorCluster::Regular => "Standard competitive approach. Monitor and adjust dynamically.",
    }
}
