//! Reasoning-oracle boundary.
//!
//! The oracle proposes a strategy; it never decides. Its output is either a
//! well-formed proposal or a failure signal, and the pipeline treats failure
//! as "no proposal", not as an error.

mod client;
mod prompt;

pub use client::HttpOracle;
pub use prompt::{build_system_prompt, build_user_prompt};

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{AuctionContext, StrategyDecision};
use crate::intel::MarketIntelligence;

/// Why an oracle call produced no usable proposal.
#[derive(Error, Debug, Clone)]
pub enum OracleFailure {
    #[error("oracle not configured (missing API key)")]
    NotConfigured,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("oracle returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed oracle output: {0}")]
    Malformed(String),

    #[error("oracle failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

/// Tagged result of one oracle consultation.
#[derive(Debug, Clone)]
pub enum OracleOutcome {
    Proposal(StrategyDecision),
    Failure(OracleFailure),
}

impl OracleOutcome {
    pub fn proposal(&self) -> Option<&StrategyDecision> {
        match self {
            OracleOutcome::Proposal(d) => Some(d),
            OracleOutcome::Failure(_) => None,
        }
    }
}

/// External reasoning oracle consulted once per pipeline run.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StrategyOracle: Send + Sync {
    /// Propose a strategy for the snapshot. Must signal failure rather than
    /// panic or propagate on malformed output.
    async fn propose(&self, ctx: &AuctionContext, intel: &MarketIntelligence) -> OracleOutcome;
}
