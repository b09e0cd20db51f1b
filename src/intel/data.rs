//! Offline market-intelligence tables.
//!
//! Loaded once at startup from JSON files produced by the offline
//! preprocessing jobs, then shared read-only across pipeline runs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{GavelError, Result};

/// One row of the bidder-profile table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidderProfile {
    pub bidder_id: String,
    #[serde(default)]
    pub total_auctions: u32,
    #[serde(default)]
    pub total_bids: u32,
    /// Average dollar jump per bid; the offline job scales this 0–100
    #[serde(default)]
    pub avg_bid_increase: f64,
    #[serde(default)]
    pub max_bid: f64,
    #[serde(default)]
    pub win_rate: f64,
    #[serde(default)]
    pub late_bid_ratio: f64,
    #[serde(default)]
    pub avg_reaction_time: f64,
    #[serde(default)]
    pub proxy_usage: f64,
}

impl BidderProfile {
    /// Live bidder aggression is scored 0–10; profile rows carry
    /// avg_bid_increase on a 0–100 scale.
    pub fn aggression_normalized(&self) -> f64 {
        (self.avg_bid_increase / 10.0).clamp(0.0, 10.0)
    }
}

/// One row of the per-domain auction statistics table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainStat {
    pub domain: String,
    #[serde(default)]
    pub avg_final_price: f64,
    #[serde(default)]
    pub volatility: f64,
    #[serde(default)]
    pub avg_bids: f64,
}

/// One row of the auction-archetype table (macro behavior per auction).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchetypeRow {
    #[serde(default)]
    pub late_bid_ratio: f64,
    #[serde(default)]
    pub avg_bid_jump: f64,
    #[serde(default)]
    pub duration_secs: f64,
}

/// All intelligence tables, indexed for lookup.
#[derive(Debug, Default)]
pub struct IntelligenceData {
    pub bidders: Vec<BidderProfile>,
    bidder_index: HashMap<String, usize>,
    pub domains: Vec<DomainStat>,
    domain_index: HashMap<String, usize>,
    pub archetypes: Vec<ArchetypeRow>,
}

impl IntelligenceData {
    /// Load all tables from a directory. A missing file yields an empty
    /// table (the resolver degrades tier by tier); a malformed file is an
    /// error.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let bidders: Vec<BidderProfile> = load_table(&dir.join("bidder_profiles.json"))?;
        let domains: Vec<DomainStat> = load_table(&dir.join("domain_stats.json"))?;
        let archetypes: Vec<ArchetypeRow> = load_table(&dir.join("auction_archetypes.json"))?;

        info!(
            bidders = bidders.len(),
            domains = domains.len(),
            archetypes = archetypes.len(),
            "loaded market intelligence tables"
        );

        Ok(Self::from_tables(bidders, domains, archetypes))
    }

    /// Build directly from in-memory tables (tests, embedded fixtures).
    pub fn from_tables(
        bidders: Vec<BidderProfile>,
        domains: Vec<DomainStat>,
        archetypes: Vec<ArchetypeRow>,
    ) -> Self {
        let bidder_index = bidders
            .iter()
            .enumerate()
            .map(|(i, b)| (b.bidder_id.clone(), i))
            .collect();
        let domain_index = domains
            .iter()
            .enumerate()
            .map(|(i, d)| (d.domain.clone(), i))
            .collect();
        Self {
            bidders,
            bidder_index,
            domains,
            domain_index,
            archetypes,
        }
    }

    /// Empty dataset; every lookup degrades to its lowest tier.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn bidder(&self, bidder_id: &str) -> Option<&BidderProfile> {
        self.bidder_index.get(bidder_id).map(|&i| &self.bidders[i])
    }

    pub fn domain(&self, domain: &str) -> Option<&DomainStat> {
        self.domain_index.get(domain).map(|&i| &self.domains[i])
    }
}

fn load_table<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        warn!(path = %path.display(), "intelligence table missing, using empty table");
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|e| {
        GavelError::Intelligence(format!("malformed table {}: {}", path.display(), e))
    })
}

// ── Small statistics helpers used by the resolver ──────────────

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n-1 denominator), 0 for fewer than two values.
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// Linearly interpolated quantile over a pre-sorted slice.
pub(crate) fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            if lo == hi {
                sorted[lo]
            } else {
                let frac = pos - lo as f64;
                sorted[lo] * (1.0 - frac) + sorted[hi] * frac
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_indexes() {
        let data = IntelligenceData::from_tables(
            vec![BidderProfile {
                bidder_id: "b1".into(),
                total_auctions: 10,
                total_bids: 40,
                avg_bid_increase: 60.0,
                max_bid: 900.0,
                win_rate: 0.5,
                late_bid_ratio: 0.2,
                avg_reaction_time: 45.0,
                proxy_usage: 0.9,
            }],
            vec![DomainStat {
                domain: "example.com".into(),
                avg_final_price: 420.0,
                volatility: 0.2,
                avg_bids: 7.0,
            }],
            vec![],
        );
        assert!(data.bidder("b1").is_some());
        assert!(data.bidder("b2").is_none());
        assert!(data.domain("example.com").is_some());
        assert!(data.domain("other.com").is_none());
    }

    #[test]
    fn test_aggression_normalization() {
        let mut b = BidderProfile {
            bidder_id: "b".into(),
            total_auctions: 0,
            total_bids: 0,
            avg_bid_increase: 60.0,
            max_bid: 0.0,
            win_rate: 0.0,
            late_bid_ratio: 0.0,
            avg_reaction_time: 0.0,
            proxy_usage: 0.0,
        };
        assert!((b.aggression_normalized() - 6.0).abs() < f64::EPSILON);
        b.avg_bid_increase = 250.0;
        assert!((b.aggression_normalized() - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_quantile_interpolation() {
        let sorted = [10.0, 20.0, 30.0, 40.0];
        assert!((quantile(&sorted, 0.5) - 25.0).abs() < f64::EPSILON);
        assert!((quantile(&sorted, 0.0) - 10.0).abs() < f64::EPSILON);
        assert!((quantile(&sorted, 1.0) - 40.0).abs() < f64::EPSILON);
        assert_eq!(quantile(&[], 0.5), 0.0);
    }

    #[test]
    fn test_std_dev_sample() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        // sample std of this classic set is ~2.138
        assert!((std_dev(&values) - 2.138).abs() < 0.01);
        assert_eq!(std_dev(&[1.0]), 0.0);
    }

    #[test]
    fn test_missing_files_load_empty() {
        let data = IntelligenceData::load("definitely-not-a-data-dir").unwrap();
        assert!(data.bidders.is_empty());
        assert!(data.domains.is_empty());
        assert!(data.archetypes.is_empty());
    }
}
