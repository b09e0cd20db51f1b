pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod fallback;
pub mod history;
pub mod intel;
pub mod oracle;
pub mod pipeline;
pub mod proxy;
pub mod safety;
pub mod validator;

pub use config::AppConfig;
pub use domain::{
    AuctionContext, BidderAnalysis, DecisionSource, FinalDecision, Platform, ProxyAction,
    ProxyDecision, RiskLevel, Strategy, StrategyDecision, ValueTier,
};
pub use error::{GavelError, Result};
pub use fallback::RuleFallbackEngine;
pub use history::{
    AuctionOutcome, AuctionResult, AuctionRoundRecord, HistoricalLearning, HistoryStore,
    InMemoryHistory, PostgresHistory, StrategyPerformance,
};
pub use intel::{IntelligenceData, MarketIntelligence, MarketIntelligenceResolver};
pub use oracle::{HttpOracle, OracleFailure, OracleOutcome, StrategyOracle};
pub use pipeline::{DecisionPipeline, PipelineStats};
pub use proxy::ProxyLogicEngine;
pub use safety::{SafetyGate, SafetyVerdict};
pub use validator::{ValidationReport, Validator};
