//! Shared data model for the decision pipeline.

mod auction;
mod decision;

pub use auction::{AuctionContext, BidderAnalysis, Platform, ValueTier};
pub use decision::{
    DecisionSource, FinalDecision, ProxyAction, ProxyDecision, RiskLevel, Strategy,
    StrategyDecision,
};
