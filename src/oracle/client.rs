//! HTTP oracle client for an OpenAI-compatible chat-completions endpoint.
//!
//! Transport errors are retried with exponential backoff; malformed output
//! is an immediate failure signal. Either way the pipeline sees an
//! `OracleOutcome`, never an unhandled fault.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::{build_system_prompt, build_user_prompt, OracleFailure, OracleOutcome, StrategyOracle};
use crate::config::{OracleConfig, ValidationConfig};
use crate::domain::{AuctionContext, RiskLevel, Strategy, StrategyDecision};
use crate::error::Result;
use crate::intel::MarketIntelligence;

pub struct HttpOracle {
    config: OracleConfig,
    validation: ValidationConfig,
    http: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Raw shape of the oracle's JSON answer. Strategy and risk level parse
/// strictly; optional proxy fields default to absent.
#[derive(Debug, Deserialize)]
struct OracleDecisionJson {
    strategy: Strategy,
    recommended_bid_amount: Decimal,
    confidence: f64,
    risk_level: RiskLevel,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    should_increase_proxy: Option<bool>,
    #[serde(default)]
    next_bid_amount: Option<Decimal>,
    #[serde(default)]
    max_budget_for_domain: Option<Decimal>,
}

impl HttpOracle {
    pub fn new(config: OracleConfig, validation: ValidationConfig) -> Result<Self> {
        let mut config = config;
        if config.api_key.is_empty() {
            if let Ok(key) = std::env::var("GAVEL_ORACLE_API_KEY") {
                config.api_key = key;
            }
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config,
            validation,
            http,
        })
    }

    pub fn is_configured(&self) -> bool {
        !self.config.api_key.is_empty()
    }

    /// Single chat attempt against the completions endpoint.
    async fn chat(&self, system_prompt: &str, user_prompt: &str) -> std::result::Result<String, OracleFailure> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_prompt.to_string(),
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let url = format!("{}/chat/completions", self.config.base_url);

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| OracleFailure::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(OracleFailure::Status { status, body });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| OracleFailure::Transport(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| OracleFailure::Malformed("empty choices array".to_string()))
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self.config.base_delay_ms.saturating_mul(1u64 << attempt.min(16));
        Duration::from_millis(exp.min(self.config.max_delay_ms))
    }
}

#[async_trait]
impl StrategyOracle for HttpOracle {
    async fn propose(&self, ctx: &AuctionContext, intel: &MarketIntelligence) -> OracleOutcome {
        if !self.is_configured() {
            return OracleOutcome::Failure(OracleFailure::NotConfigured);
        }

        let system_prompt = build_system_prompt();
        let user_prompt = build_user_prompt(ctx, intel, &self.validation);

        let mut last_error = String::new();
        for attempt in 0..self.config.max_retries {
            match self.chat(&system_prompt, &user_prompt).await {
                Ok(raw) => {
                    debug!(
                        domain = %ctx.domain,
                        attempt,
                        response_len = raw.len(),
                        "oracle responded"
                    );
                    // Garbage output is not retried: the model already had
                    // the schema in front of it.
                    return match parse_proposal(&raw) {
                        Ok(decision) => OracleOutcome::Proposal(decision),
                        Err(failure) => {
                            warn!(domain = %ctx.domain, error = %failure, "oracle output rejected");
                            OracleOutcome::Failure(failure)
                        }
                    };
                }
                Err(e) => {
                    last_error = e.to_string();
                    if attempt + 1 < self.config.max_retries {
                        let delay = self.backoff_delay(attempt);
                        warn!(
                            domain = %ctx.domain,
                            attempt = attempt + 1,
                            error = %e,
                            delay_ms = delay.as_millis() as u64,
                            "oracle call failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        warn!(
            domain = %ctx.domain,
            attempts = self.config.max_retries,
            error = %last_error,
            "oracle exhausted retries"
        );
        OracleOutcome::Failure(OracleFailure::Exhausted {
            attempts: self.config.max_retries,
            last_error,
        })
    }
}

/// Parse the oracle's answer into a StrategyDecision, tolerating markdown
/// fences around the JSON. Confidence is clamped; a missing max budget
/// defaults to the recommended amount.
pub fn parse_proposal(raw: &str) -> std::result::Result<StrategyDecision, OracleFailure> {
    let json_str = extract_json_block(raw);

    let parsed: OracleDecisionJson =
        serde_json::from_str(&json_str).map_err(|e| OracleFailure::Malformed(e.to_string()))?;

    Ok(StrategyDecision {
        strategy: parsed.strategy,
        recommended_bid_amount: parsed.recommended_bid_amount,
        confidence: parsed.confidence.clamp(0.0, 1.0),
        risk_level: parsed.risk_level,
        reasoning: parsed.reasoning,
        should_increase_proxy: parsed.should_increase_proxy,
        next_bid_amount: parsed.next_bid_amount,
        max_budget_for_domain: parsed
            .max_budget_for_domain
            .unwrap_or(parsed.recommended_bid_amount),
    })
}

/// Strip ```json fences (or bare braces) around the model's answer.
fn extract_json_block(raw: &str) -> String {
    let trimmed = raw.trim();

    if let Some(start) = trimmed.find("```json") {
        let after_fence = &trimmed[start + 7..];
        if let Some(end) = after_fence.find("```") {
            return after_fence[..end].trim().to_string();
        }
    }
    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        if let Some(end) = after_fence.find("```") {
            return after_fence[..end].trim().to_string();
        }
    }
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            return trimmed[start..=end].to_string();
        }
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_valid_proposal() {
        let raw = r#"```json
{
  "strategy": "proxy_max",
  "recommended_bid_amount": 560.0,
  "confidence": 0.72,
  "risk_level": "medium",
  "reasoning": "Moderate competition with profit headroom; proxy max protects margin against escalation."
}
```"#;
        let decision = parse_proposal(raw).unwrap();
        assert_eq!(decision.strategy, Strategy::ProxyMax);
        assert_eq!(decision.recommended_bid_amount, dec!(560.0));
        assert!((decision.confidence - 0.72).abs() < f64::EPSILON);
        assert_eq!(decision.risk_level, RiskLevel::Medium);
        // defaults to the recommended amount when omitted
        assert_eq!(decision.max_budget_for_domain, dec!(560.0));
    }

    #[test]
    fn test_parse_without_fences() {
        let raw = r#"Here is my answer: {"strategy": "do_not_bid", "recommended_bid_amount": 0, "confidence": 0.9, "risk_level": "high", "reasoning": "Profit impossible at this price level given competition and risk."}"#;
        let decision = parse_proposal(raw).unwrap();
        assert_eq!(decision.strategy, Strategy::DoNotBid);
        assert_eq!(decision.recommended_bid_amount, Decimal::ZERO);
    }

    #[test]
    fn test_parse_clamps_confidence() {
        let raw = r#"{"strategy": "proxy_max", "recommended_bid_amount": 100, "confidence": 1.8, "risk_level": "low", "reasoning": "x"}"#;
        let decision = parse_proposal(raw).unwrap();
        assert!((decision.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_rejects_prose() {
        let raw = "I'm not sure about this auction, the data looks unclear.";
        assert!(matches!(
            parse_proposal(raw),
            Err(OracleFailure::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_rejects_unknown_strategy() {
        let raw = r#"{"strategy": "yolo_bid", "recommended_bid_amount": 100, "confidence": 0.5, "risk_level": "low", "reasoning": "x"}"#;
        assert!(matches!(
            parse_proposal(raw),
            Err(OracleFailure::Malformed(_))
        ));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let oracle = HttpOracle::new(OracleConfig::default(), ValidationConfig::default()).unwrap();
        assert_eq!(oracle.backoff_delay(0), Duration::from_millis(1_000));
        assert_eq!(oracle.backoff_delay(1), Duration::from_millis(2_000));
        assert_eq!(oracle.backoff_delay(2), Duration::from_millis(4_000));
        // capped at max_delay_ms
        assert_eq!(oracle.backoff_delay(10), Duration::from_millis(10_000));
    }
}
