//! Prompt construction for the strategy oracle.
//!
//! Pure functions: the same context and enrichment always render the same
//! prompts. Tested by asserting section presence, not exact wording.

use crate::config::ValidationConfig;
use crate::domain::{AuctionContext, ValueTier};
use crate::intel::{BidderIntel, EscalationSpeed, MarketIntelligence};

/// Role, rules, and decision framework for the oracle.
pub fn build_system_prompt() -> String {
    r#"# Domain Auction Strategy AI

You are an expert domain auction strategist with deep knowledge of:
- Proxy bidding mechanics across GoDaddy, NameJet, and Dynadot
- Platform-specific rules (GoDaddy's 5-minute extension, minimum increments)
- Bidder psychology and bot detection patterns
- Profit margin optimization and risk management

## Core Principles

1. **Profit First**: Bid below estimated value to preserve profit margin
2. **Safety Ceiling**: Never recommend bids above the stated maximum allowed bid
3. **Platform Awareness**: Respect 5-minute extensions and auto-bidding rules
4. **Opponent Analysis**: Adjust strategy based on bot vs human behavior

## Strategy Options

- `proxy_max`: Set maximum proxy bid, let platform auto-bid incrementally
- `last_minute_snipe`: Time bid for final moments to avoid counters
- `incremental_test`: Small bids to test competition without commitment
- `wait_for_closeout`: Wait for auction to end with minimal bids
- `aggressive_early`: Rare, only for must-have domains
- `do_not_bid`: Walk away when profit impossible

## Platform Rules

**GoDaddy**: 5-minute extension on late bids, $5 minimum increment
**NameJet**: No extensions, $5 increment, fast-paced
**Dynadot**: Variable increments, occasional extensions

## Decision Framework

1. **Value Tier Analysis**:
   - High ($1000+): Conservative, avoid escalation
   - Medium ($100-1000): Balanced approach
   - Low (<$100): Aggressive or wait for closeout

2. **Competition Assessment**:
   - 0 bidders: Wait for closeout or proxy max early
   - 1-2 bidders: Proxy max with safe limits
   - 3+ bidders: Consider sniping or incremental testing

3. **Bot Detection Response**:
   - Bots: Prefer sniping to minimize reaction window
   - Humans: More flexible, can use proxy strategies

4. **Time Pressure**:
   - >1 hour: Strategic positioning
   - <1 hour: Execute final strategy
   - <5 minutes: Sniping mode (GoDaddy extension aware)"#
        .to_string()
}

/// Render the auction snapshot, financial boundaries, and enrichment into
/// the user prompt, ending with the required JSON schema.
pub fn build_user_prompt(
    ctx: &AuctionContext,
    intel: &MarketIntelligence,
    validation: &ValidationConfig,
) -> String {
    let max_bid = ctx.estimated_value * validation.ceiling_ratio;

    let tier = ctx.value_tier();
    let tier_note = match tier {
        ValueTier::High => "Conservative approach, avoid emotional escalation",
        ValueTier::Medium => "Balanced strategy, test competition",
        ValueTier::Low => "Aggressive or wait for closeout",
    };

    let mut prompt = format!(
        r#"## Auction Context

**Domain**: {domain}
**Platform**: {platform}
**Platform Rules**: {rules}

**Financials**:
- Estimated Value: ${value:.2}
- Current Bid: ${bid:.2}
- Your Current Proxy: ${proxy:.2} (0 = none)
- Budget Available: ${budget:.2}
- Maximum Allowed Bid: ${max_bid:.2}

**Competition**:
- Active Bidders: {bidders}
- Hours Remaining: {hours:.1}

**Bidder Analysis**:
- Bot Detected: {bot}
- Corporate Buyer: {corporate}
- Aggression Score: {aggression}/10
- Avg Reaction Time: {reaction:.1}s

**Value Tier**: {tier} - {tier_note}
"#,
        domain = ctx.domain,
        platform = ctx.platform.as_str().to_uppercase(),
        rules = ctx.platform.rules_note(),
        value = ctx.estimated_value,
        bid = ctx.current_bid,
        proxy = ctx.your_current_proxy,
        budget = ctx.budget_available,
        max_bid = max_bid,
        bidders = ctx.num_bidders,
        hours = ctx.hours_remaining,
        bot = ctx.bidder_analysis.bot_detected,
        corporate = ctx.bidder_analysis.corporate_buyer,
        aggression = ctx.bidder_analysis.aggression_score,
        reaction = ctx.bidder_analysis.reaction_time_avg_secs,
        tier = tier.as_str().to_uppercase(),
        tier_note = tier_note,
    );

    prompt.push_str(&market_intel_section(intel));

    prompt.push_str(&format!(
        r#"
## Task

Analyze this auction and recommend the optimal bidding strategy. Consider:

1. **Profit Potential**: Can we achieve a meaningful margin within safe limits?
2. **Competition**: How many bidders and their behavior patterns?
3. **Platform Mechanics**: How do {platform} rules affect timing?
4. **Risk Assessment**: What's the likelihood of overpaying?
5. **Timing**: When should we act given remaining time?

## Required Output Format

Respond with ONLY a valid JSON object matching this schema:

```json
{{
  "strategy": "proxy_max|last_minute_snipe|incremental_test|wait_for_closeout|aggressive_early|do_not_bid",
  "recommended_bid_amount": <number>,
  "confidence": <0.0-1.0>,
  "risk_level": "low|medium|high",
  "reasoning": "<detailed explanation with strategy rationale and profit calculations>"
}}
```

**Important**:
- recommended_bid_amount = your proxy maximum (what you set, not next visible bid)
- confidence = certainty in your strategy (0.0-1.0)
- reasoning = minimum {min_reasoning} characters explaining your logic
- Stay within safe financial boundaries"#,
        platform = ctx.platform.as_str(),
        min_reasoning = validation.min_reasoning_chars,
    ));

    prompt
}

/// Best-available enrichment, rendered only where a tier actually matched.
fn market_intel_section(intel: &MarketIntelligence) -> String {
    let mut section = String::from("\n**Market Intelligence**:\n");

    match &intel.bidder {
        BidderIntel::Exact(e) => {
            section.push_str(&format!(
                "- Bidder Profile: {} auctions, Win Rate: {:.1}%, Aggressive: {}, Sniper: {}\n",
                e.total_auctions,
                e.win_rate * 100.0,
                e.is_aggressive,
                e.is_sniper,
            ));
        }
        BidderIntel::Cluster(c) => {
            section.push_str(&format!(
                "- Bidder Behavior Pattern: cluster={}, fold probability={:.1}%, \
                 avg win rate={:.1}%, sample size={}, Recommendation={}\n",
                c.cluster.as_str(),
                c.fold_probability * 100.0,
                c.avg_win_rate * 100.0,
                c.sample_size,
                c.counter_strategy,
            ));
        }
        BidderIntel::Unknown => {
            section.push_str("- Bidder Profile: no data for this opponent\n");
        }
    }

    if let Some(domain) = &intel.domain {
        section.push_str(&format!(
            "- Domain History ({}, confidence {:.2}): Avg Final Price: ${:.2}, Volatile: {}\n",
            domain.match_type.as_str(),
            domain.confidence,
            domain.average_final_price,
            domain.is_volatile,
        ));
        if let Some(max_bid) = domain.recommended_max_bid {
            section.push_str(&format!(
                "- Similar-value domains suggest a max bid around ${:.2}\n",
                max_bid
            ));
        }
    }

    if let Some(archetype) = &intel.archetype {
        let speed = match archetype.escalation_speed {
            EscalationSpeed::Fast => "fast",
            EscalationSpeed::Slow => "slow",
        };
        section.push_str(&format!(
            "- Auction Archetype: {} escalation, sniper dominated: {}, proxy driven: {}\n",
            speed, archetype.sniper_dominated, archetype.proxy_driven,
        ));
    }

    section.push_str(&format!(
        "- Estimated Win Probability: {:.1}% ({} bidders)\n- Expected Value: ${:.2} (ROI {:.2}, {:?})\n",
        intel.win_probability.probability * 100.0,
        intel.win_probability.competition_level,
        intel.expected_value.risk_adjusted_ev,
        intel.expected_value.roi,
        intel.expected_value.recommendation,
    ));

    section
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BidderAnalysis, Platform};
    use crate::intel::{IntelligenceData, MarketIntelligenceResolver};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn sample_context() -> AuctionContext {
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
                bot_detected: true,
                corporate_buyer: false,
                aggression_score: 7.0,
                reaction_time_avg_secs: 12.5,
            },
            thread_id: None,
        }
    }

    fn sample_intel(ctx: &AuctionContext) -> MarketIntelligence {
        MarketIntelligenceResolver::new(Arc::new(IntelligenceData::empty()), 1.0).enrich(ctx, None)
    }

    #[test]
    fn test_system_prompt_names_all_strategies() {
        let prompt = build_system_prompt();
        for s in [
            "proxy_max",
            "last_minute_snipe",
            "incremental_test",
            "wait_for_closeout",
            "aggressive_early",
            "do_not_bid",
        ] {
            assert!(prompt.contains(s), "missing strategy {}", s);
        }
        assert!(prompt.contains("GoDaddy"));
        assert!(prompt.contains("5-minute extension"));
    }

    #[test]
    fn test_user_prompt_contains_all_sections() {
        let ctx = sample_context();
        let prompt = build_user_prompt(&ctx, &sample_intel(&ctx), &ValidationConfig::default());

        assert!(prompt.contains("example.com"));
        assert!(prompt.contains("GODADDY"));
        assert!(prompt.contains("Estimated Value: $800.00"));
        assert!(prompt.contains("Current Bid: $300.00"));
        // ceiling ratio 1.0 → max allowed bid equals estimated value
        assert!(prompt.contains("Maximum Allowed Bid: $800.00"));
        assert!(prompt.contains("Active Bidders: 2"));
        assert!(prompt.contains("Bot Detected: true"));
        assert!(prompt.contains("Value Tier**: MEDIUM"));
        assert!(prompt.contains("Market Intelligence"));
        assert!(prompt.contains("Estimated Win Probability"));
        assert!(prompt.contains("recommended_bid_amount"));
        assert!(prompt.contains("minimum 50 characters"));
    }

    #[test]
    fn test_user_prompt_renders_cluster_intel() {
        use crate::intel::{BehaviorCluster, BidderIntel, ClusterBidderIntel};

        let ctx = sample_context();
        let mut intel = sample_intel(&ctx);
        intel.bidder = BidderIntel::Cluster(ClusterBidderIntel {
            cluster: BehaviorCluster::Sniper,
            sample_size: 12,
            avg_win_rate: 0.4,
            fold_probability: 0.6,
            avg_late_bid_ratio: 0.8,
            is_aggressive_cluster: true,
            is_passive_cluster: false,
            counter_strategy: "Counter-snipe in final seconds".to_string(),
        });

        let prompt = build_user_prompt(&ctx, &intel, &ValidationConfig::default());
        assert!(prompt.contains("cluster=sniper"));
        assert!(prompt.contains("Counter-snipe"));
    }
}
