use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub intelligence: IntelligenceConfig,
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Hard pre-filter thresholds. These cannot be overridden by the oracle.
#[derive(Debug, Clone, Deserialize)]
pub struct SafetyConfig {
    /// Minimum budget for meaningful participation (USD)
    #[serde(default = "default_min_budget")]
    pub min_budget: Decimal,
    /// Current bid above this multiple of estimated value is winner's-curse territory
    #[serde(default = "default_overpayment_factor")]
    pub overpayment_factor: Decimal,
    /// No single domain may consume more than this fraction of remaining budget
    #[serde(default = "default_concentration_limit")]
    pub concentration_limit: Decimal,
}

fn default_min_budget() -> Decimal {
    dec!(100)
}

fn default_overpayment_factor() -> Decimal {
    dec!(1.30)
}

fn default_concentration_limit() -> Decimal {
    dec!(0.50)
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            min_budget: default_min_budget(),
            overpayment_factor: default_overpayment_factor(),
            concentration_limit: default_concentration_limit(),
        }
    }
}

/// Validator and proxy-arithmetic thresholds.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationConfig {
    /// Absolute bid ceiling as a fraction of estimated value. Historical
    /// deployments used both 0.80 and 1.00; this is configuration, not a
    /// hidden precedent.
    #[serde(default = "default_ceiling_ratio")]
    pub ceiling_ratio: Decimal,
    /// Minimum reasoning length for an oracle proposal (chars)
    #[serde(default = "default_min_reasoning_chars")]
    pub min_reasoning_chars: usize,
    /// Below this estimated value, aggressive_early is rejected outright (USD)
    #[serde(default = "default_aggressive_early_floor")]
    pub aggressive_early_floor: Decimal,
    /// Confidence deviation beyond the risk band that escalates a soft
    /// failure to a hard one
    #[serde(default = "default_confidence_escalation_margin")]
    pub confidence_escalation_margin: f64,
}

fn default_ceiling_ratio() -> Decimal {
    Decimal::ONE
}

fn default_min_reasoning_chars() -> usize {
    50
}

fn default_aggressive_early_floor() -> Decimal {
    dec!(200)
}

fn default_confidence_escalation_margin() -> f64 {
    0.30
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            ceiling_ratio: default_ceiling_ratio(),
            min_reasoning_chars: default_min_reasoning_chars(),
            aggressive_early_floor: default_aggressive_early_floor(),
            confidence_escalation_margin: default_confidence_escalation_margin(),
        }
    }
}

/// Reasoning-oracle client configuration (OpenAI-compatible chat endpoint).
#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
    /// API key; falls back to GAVEL_ORACLE_API_KEY at client construction
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_oracle_base_url")]
    pub base_url: String,
    #[serde(default = "default_oracle_model")]
    pub model: String,
    /// Request timeout per attempt
    #[serde(default = "default_oracle_timeout_secs")]
    pub timeout_secs: u64,
    /// Bounded retry before the oracle is treated as failed
    #[serde(default = "default_oracle_max_retries")]
    pub max_retries: u32,
    /// Initial backoff delay, doubled per attempt
    #[serde(default = "default_oracle_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Backoff cap
    #[serde(default = "default_oracle_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_oracle_temperature")]
    pub temperature: f64,
    #[serde(default = "default_oracle_max_tokens")]
    pub max_tokens: u32,
}

fn default_oracle_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_oracle_model() -> String {
    "openai/gpt-4o-mini".to_string()
}

fn default_oracle_timeout_secs() -> u64 {
    30
}

fn default_oracle_max_retries() -> u32 {
    3
}

fn default_oracle_base_delay_ms() -> u64 {
    1_000
}

fn default_oracle_max_delay_ms() -> u64 {
    10_000
}

fn default_oracle_temperature() -> f64 {
    0.1
}

fn default_oracle_max_tokens() -> u32 {
    2_000
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_oracle_base_url(),
            model: default_oracle_model(),
            timeout_secs: default_oracle_timeout_secs(),
            max_retries: default_oracle_max_retries(),
            base_delay_ms: default_oracle_base_delay_ms(),
            max_delay_ms: default_oracle_max_delay_ms(),
            temperature: default_oracle_temperature(),
            max_tokens: default_oracle_max_tokens(),
        }
    }
}

/// Where the offline market-intelligence tables live.
#[derive(Debug, Clone, Deserialize)]
pub struct IntelligenceConfig {
    /// Directory holding bidder_profiles.json, domain_stats.json,
    /// auction_archetypes.json
    #[serde(default = "default_intelligence_dir")]
    pub data_dir: String,
}

fn default_intelligence_dir() -> String {
    "data".to_string()
}

impl Default for IntelligenceConfig {
    fn default() -> Self {
        Self {
            data_dir: default_intelligence_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("GAVEL_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (GAVEL_ORACLE__MODEL, etc.)
            .add_source(
                Environment::with_prefix("GAVEL")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            safety: SafetyConfig::default(),
            validation: ValidationConfig::default(),
            oracle: OracleConfig::default(),
            intelligence: IntelligenceConfig::default(),
            database: None,
            logging: LoggingConfig::default(),
        }
    }
}
