use decision_core::{DecisionError, DecisionMetrics, PositionValidation, RiskLimits};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Risk-adjusted position sizing
///
/// Size scales with confidence and win probability, shrinks linearly as
/// drawdown approaches the limit, and is clamped to the per-trade and
/// portfolio limits:
///
///   base = max_risk × confidence/100 × P(win) × mode multiplier
///   size = clamp(base × max(0, 1 − drawdown/limit), min, min(max, headroom))
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAdjustedSizer {
    limits: RiskLimits,
}

/// Portfolio state the sizer scales against
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DrawdownContext {
    /// Current equity drawdown from peak, in percent
    pub drawdown_percent: f64,
    /// Fraction of equity already at risk
    pub open_risk: f64,
}

/// Sizing outcome. `NoTrade` is not a zero-size trade: it never reaches
/// the learning loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SizingDecision {
    NoTrade { reason: String },
    Trade { fraction: f64 },
}

impl SizingDecision {
    pub fn no_trade(reason: impl Into<String>) -> Self {
        SizingDecision::NoTrade {
            reason: reason.into(),
        }
    }

    pub fn is_trade(&self) -> bool {
        matches!(self, SizingDecision::Trade { .. })
    }

    /// Fraction of equity to risk, 0 for `NoTrade`
    pub fn fraction(&self) -> f64 {
        match self {
            SizingDecision::Trade { fraction } => *fraction,
            SizingDecision::NoTrade { .. } => 0.0,
        }
    }
}

impl Default for RiskAdjustedSizer {
    fn default() -> Self {
        Self {
            limits: RiskLimits::default(),
        }
    }
}

impl RiskAdjustedSizer {
    pub fn new(limits: RiskLimits) -> Result<Self, DecisionError> {
        limits.validate()?;
        Ok(Self { limits })
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    /// Multiplier in [0, 1] applied for the current drawdown.
    pub fn drawdown_penalty(&self, drawdown_percent: f64) -> f64 {
        (1.0 - drawdown_percent.max(0.0) / self.limits.drawdown_limit_percent).max(0.0)
    }

    pub fn size(
        &self,
        metrics: &DecisionMetrics,
        risk_multiplier: f64,
        context: &DrawdownContext,
    ) -> SizingDecision {
        if !metrics.passes_dynamic_filters {
            return SizingDecision::no_trade(match metrics.first_rejection() {
                Some(rejection) => format!("{} filter rejected", rejection.kind.name()),
                None => "no tradeable signal".to_string(),
            });
        }

        let penalty = self.drawdown_penalty(context.drawdown_percent);
        if penalty <= 0.0 {
            return SizingDecision::no_trade(format!(
                "drawdown {:.1}% at or beyond limit {:.1}%",
                context.drawdown_percent, self.limits.drawdown_limit_percent
            ));
        }

        let headroom = self.limits.max_portfolio_risk - context.open_risk.max(0.0);
        if headroom < self.limits.min_risk_per_trade {
            return SizingDecision::no_trade(format!(
                "portfolio headroom {:.4} below minimum trade risk {:.4}",
                headroom, self.limits.min_risk_per_trade
            ));
        }

        let base = self.limits.max_risk_per_trade
            * (metrics.confidence_level / 100.0)
            * metrics.win_probability
            * risk_multiplier.max(0.0);
        let raw = base * penalty;
        if !(raw > 0.0) {
            return SizingDecision::no_trade("zero expected size");
        }

        let upper = self.limits.max_risk_per_trade.min(headroom);
        let fraction = raw.clamp(self.limits.min_risk_per_trade, upper);

        debug!(
            base,
            penalty,
            headroom,
            fraction,
            "position sized"
        );

        SizingDecision::Trade { fraction }
    }

    /// Apply the portfolio's answer to a proposed size. The portfolio can
    /// veto or shrink a trade, never enlarge it.
    pub fn apply_validation(
        &self,
        decision: SizingDecision,
        validation: &PositionValidation,
    ) -> SizingDecision {
        let fraction = match decision {
            SizingDecision::Trade { fraction } => fraction,
            no_trade => return no_trade,
        };

        if !validation.accepted {
            return SizingDecision::no_trade("portfolio rejected position");
        }
        if validation.max_allowed >= fraction {
            return SizingDecision::Trade { fraction };
        }
        if validation.max_allowed < self.limits.min_risk_per_trade {
            return SizingDecision::no_trade(format!(
                "portfolio allows {:.4}, below minimum trade risk",
                validation.max_allowed
            ));
        }
        SizingDecision::Trade {
            fraction: validation.max_allowed,
        }
    }
}
