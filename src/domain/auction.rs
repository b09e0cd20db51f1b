use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{GavelError, Result};

/// Auction platform the domain is listed on.
///
/// Each platform has its own increment and extension mechanics, which the
/// proxy engine and the fallback trees consult directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    GoDaddy,
    NameJet,
    Dynadot,
}

impl Platform {
    /// Minimum outbid increment at the given price level.
    ///
    /// GoDaddy and NameJet use a flat $5 step. Dynadot switches to 5% of the
    /// current bid once that exceeds $5.
    pub fn min_increment(&self, current_bid: Decimal) -> Decimal {
        match self {
            Platform::GoDaddy | Platform::NameJet => dec!(5),
            Platform::Dynadot => dec!(5).max(current_bid * dec!(0.05)),
        }
    }

    /// Whether late bids extend the auction close (GoDaddy's 5-minute rule).
    pub fn has_late_extension(&self) -> bool {
        matches!(self, Platform::GoDaddy)
    }

    /// One-line rules summary used in oracle prompts.
    pub fn rules_note(&self) -> &'static str {
        match self {
            Platform::GoDaddy => {
                "5-minute extension on late bids. Snipe timing must account for auto-extensions."
            }
            Platform::NameJet => "No extensions, fast-paced. Immediate execution required.",
            Platform::Dynadot => "Variable increments, occasional extensions. Monitor closely.",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::GoDaddy => "godaddy",
            Platform::NameJet => "namejet",
            Platform::Dynadot => "dynadot",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coarse value bucket used to select strategy logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueTier {
    High,
    Medium,
    Low,
}

impl ValueTier {
    /// High ≥ $1000, medium $100–999.99, low < $100.
    pub fn from_value(estimated_value: Decimal) -> Self {
        if estimated_value >= dec!(1000) {
            ValueTier::High
        } else if estimated_value >= dec!(100) {
            ValueTier::Medium
        } else {
            ValueTier::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueTier::High => "high",
            ValueTier::Medium => "medium",
            ValueTier::Low => "low",
        }
    }
}

impl std::fmt::Display for ValueTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Live read on the opposing bidders in this auction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidderAnalysis {
    pub bot_detected: bool,
    pub corporate_buyer: bool,
    /// 0–10 scale
    pub aggression_score: f64,
    pub reaction_time_avg_secs: f64,
}

/// Immutable snapshot of one auction round, the input to a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionContext {
    pub domain: String,
    pub platform: Platform,
    /// External valuation estimate, must be positive for any bid to be rational
    pub estimated_value: Decimal,
    pub current_bid: Decimal,
    pub num_bidders: u32,
    pub hours_remaining: f64,
    /// Standing proxy max, 0 = none set
    pub your_current_proxy: Decimal,
    pub budget_available: Decimal,
    pub bidder_analysis: BidderAnalysis,
    /// Groups multiple rounds of the same auction
    #[serde(default)]
    pub thread_id: Option<String>,
}

impl AuctionContext {
    pub fn value_tier(&self) -> ValueTier {
        ValueTier::from_value(self.estimated_value)
    }

    /// Reject snapshots that could never produce a meaningful decision.
    /// A non-positive estimated_value is NOT rejected here; the safety gate
    /// turns it into an auditable block instead.
    pub fn validate(&self) -> Result<()> {
        if self.domain.trim().is_empty() {
            return Err(GavelError::InvalidContext("domain must not be empty".into()));
        }
        if self.current_bid < Decimal::ZERO {
            return Err(GavelError::InvalidContext(format!(
                "current_bid must be non-negative, got {}",
                self.current_bid
            )));
        }
        if self.your_current_proxy < Decimal::ZERO {
            return Err(GavelError::InvalidContext(format!(
                "your_current_proxy must be non-negative, got {}",
                self.your_current_proxy
            )));
        }
        if self.budget_available < Decimal::ZERO {
            return Err(GavelError::InvalidContext(format!(
                "budget_available must be non-negative, got {}",
                self.budget_available
            )));
        }
        if self.hours_remaining < 0.0 || !self.hours_remaining.is_finite() {
            return Err(GavelError::InvalidContext(format!(
                "hours_remaining must be a non-negative number, got {}",
                self.hours_remaining
            )));
        }
        Ok(())
    }
}
