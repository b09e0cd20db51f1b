//! Gavel CLI - decision harness for auction snapshots
//!
//! Commands:
//! - `gavel decide` - Run the full pipeline on a context JSON file
//! - `gavel prompt` - Render the oracle prompts without calling the oracle

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

use crate::config::AppConfig;
use crate::domain::AuctionContext;
use crate::error::Result;
use crate::intel::{IntelligenceData, MarketIntelligenceResolver};
use crate::oracle::{build_system_prompt, build_user_prompt, HttpOracle, StrategyOracle};
use crate::pipeline::DecisionPipeline;

/// Domain auction strategy agent CLI
#[derive(Parser, Debug)]
#[command(name = "gavel")]
#[command(author, version, about = "Domain auction proxy-bidding strategy agent")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the decision pipeline on an auction snapshot
    Decide {
        /// Path to the auction context JSON file
        #[arg(short, long)]
        context: PathBuf,
        /// Skip the oracle and decide with the rule fallback only
        #[arg(long)]
        no_oracle: bool,
        /// Also print pipeline counters after the decision
        #[arg(long)]
        stats: bool,
    },
    /// Render the oracle prompts for a snapshot without calling the oracle
    Prompt {
        /// Path to the auction context JSON file
        #[arg(short, long)]
        context: PathBuf,
    },
}

fn load_context(path: &Path) -> Result<AuctionContext> {
    let raw = std::fs::read_to_string(path)?;
    let ctx: AuctionContext = serde_json::from_str(&raw)?;
    Ok(ctx)
}

/// Run the pipeline once and print the decision as JSON. A safety block is
/// still a successful decision, so this exits 0 either way.
pub async fn run_decide(
    config: &AppConfig,
    context_path: &Path,
    no_oracle: bool,
    show_stats: bool,
) -> Result<()> {
    let ctx = load_context(context_path)?;
    let intel = Arc::new(IntelligenceData::load(&config.intelligence.data_dir)?);

    let oracle: Option<Arc<dyn StrategyOracle>> = if no_oracle {
        None
    } else {
        let oracle = HttpOracle::new(config.oracle.clone(), config.validation.clone())?;
        if oracle.is_configured() {
            Some(Arc::new(oracle))
        } else {
            warn!("oracle API key not configured; deciding with rule fallback only");
            None
        }
    };

    let pipeline = DecisionPipeline::new(config, intel, oracle);
    let decision = pipeline.decide(&ctx).await;

    println!("{}", serde_json::to_string_pretty(&decision)?);

    if show_stats {
        println!("{}", serde_json::to_string_pretty(&pipeline.stats())?);
    }

    Ok(())
}

/// Print the exact prompts the oracle would receive for this snapshot.
pub fn run_prompt(config: &AppConfig, context_path: &Path) -> Result<()> {
    let ctx = load_context(context_path)?;
    let data = Arc::new(IntelligenceData::load(&config.intelligence.data_dir)?);

    let safe_max_ratio = {
        use rust_decimal::prelude::ToPrimitive;
        config.validation.ceiling_ratio.to_f64().unwrap_or(1.0)
    };
    let resolver = MarketIntelligenceResolver::new(data, safe_max_ratio);
    let intel = resolver.enrich(&ctx, None);

    println!("=== SYSTEM PROMPT ===\n{}\n", build_system_prompt());
    println!(
        "=== USER PROMPT ===\n{}",
        build_user_prompt(&ctx, &intel, &config.validation)
    );

    Ok(())
}
