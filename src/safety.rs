//! Hardcoded safety pre-filters.
//!
//! Non-negotiable checks that run before the oracle is ever consulted and
//! cannot be overridden by it. First matching rule wins; later rules are not
//! evaluated. A block is an expected terminal outcome, not an error.

use rust_decimal::Decimal;
use tracing::info;

use crate::config::SafetyConfig;
use crate::domain::AuctionContext;

/// Confidence attached to every safety block. The rules are hard thresholds,
/// so the verdict is near-certain by construction.
pub const BLOCK_CONFIDENCE: f64 = 0.95;

/// Verdict of the safety gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafetyVerdict {
    /// All checks passed, proceed to strategy analysis
    Clear,
    /// A rule fired; the pipeline terminates with a do_not_bid decision
    Blocked { rule: SafetyRule, reason: String },
}

impl SafetyVerdict {
    pub fn is_blocked(&self) -> bool {
        matches!(self, SafetyVerdict::Blocked { .. })
    }
}

/// Which safety rule fired, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyRule {
    ValuationValidity,
    MinimumBudget,
    OverpaymentProtection,
    PortfolioConcentration,
}

impl SafetyRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            SafetyRule::ValuationValidity => "valuation_validity",
            SafetyRule::MinimumBudget => "minimum_budget",
            SafetyRule::OverpaymentProtection => "overpayment_protection",
            SafetyRule::PortfolioConcentration => "portfolio_concentration",
        }
    }
}

pub struct SafetyGate {
    config: SafetyConfig,
}

impl SafetyGate {
    pub fn new(config: SafetyConfig) -> Self {
        Self { config }
    }

    /// Run all checks in priority order; the first objection wins.
    pub fn check(&self, ctx: &AuctionContext) -> SafetyVerdict {
        let checks = [
            Self::check_valuation_validity,
            Self::check_minimum_budget,
            Self::check_overpayment_protection,
            Self::check_portfolio_concentration,
        ];

        for check in checks {
            if let Some(verdict) = check(self, ctx) {
                if let SafetyVerdict::Blocked { rule, ref reason } = verdict {
                    info!(
                        domain = %ctx.domain,
                        rule = rule.as_str(),
                        %reason,
                        "safety gate blocked auction"
                    );
                }
                return verdict;
            }
        }

        SafetyVerdict::Clear
    }

    /// Invalid or missing valuation prevents any profit calculation.
    fn check_valuation_validity(&self, ctx: &AuctionContext) -> Option<SafetyVerdict> {
        if ctx.estimated_value <= Decimal::ZERO {
            return Some(SafetyVerdict::Blocked {
                rule: SafetyRule::ValuationValidity,
                reason: format!(
                    "VALUATION INVALID: Estimated value (${:.2}) is invalid or missing. \
                     Cannot calculate profit margins. Strategy: do_not_bid",
                    ctx.estimated_value
                ),
            });
        }
        None
    }

    /// Small budgets lead to poor decisions and margin compression.
    fn check_minimum_budget(&self, ctx: &AuctionContext) -> Option<SafetyVerdict> {
        if ctx.budget_available < self.config.min_budget {
            return Some(SafetyVerdict::Blocked {
                rule: SafetyRule::MinimumBudget,
                reason: format!(
                    "MINIMUM BUDGET: Insufficient budget (${:.2}) for meaningful auction \
                     participation. Minimum required: ${:.2}. Strategy: do_not_bid",
                    ctx.budget_available, self.config.min_budget
                ),
            });
        }
        None
    }

    /// Bidding past this point means paying well above value: winner's curse.
    fn check_overpayment_protection(&self, ctx: &AuctionContext) -> Option<SafetyVerdict> {
        let threshold = ctx.estimated_value * self.config.overpayment_factor;
        if ctx.current_bid > threshold {
            return Some(SafetyVerdict::Blocked {
                rule: SafetyRule::OverpaymentProtection,
                reason: format!(
                    "OVERPAYMENT PROTECTION: Current bid (${:.2}) exceeds {:.0}% of estimated \
                     value (${:.2}). This enters winner's-curse territory where profit is \
                     impossible. Strategy: do_not_bid",
                    ctx.current_bid,
                    self.config.overpayment_factor * Decimal::ONE_HUNDRED,
                    ctx.estimated_value
                ),
            });
        }
        None
    }

    /// No single domain may consume more than the concentration limit of the
    /// remaining budget.
    fn check_portfolio_concentration(&self, ctx: &AuctionContext) -> Option<SafetyVerdict> {
        let max_domain_budget = ctx.budget_available * self.config.concentration_limit;
        if ctx.estimated_value > max_domain_budget {
            return Some(SafetyVerdict::Blocked {
                rule: SafetyRule::PortfolioConcentration,
                reason: format!(
                    "PORTFOLIO CONCENTRATION: Domain value (${:.2}) would consume more than \
                     {:.0}% of remaining budget (${:.2}). Maximum allowed: ${:.2}. \
                     Strategy: do_not_bid",
                    ctx.estimated_value,
                    self.config.concentration_limit * Decimal::ONE_HUNDRED,
                    ctx.budget_available,
                    max_domain_budget
                ),
            });
        }
        None
    }
}
