use std::sync::Arc;

use decision_core::adaptive::clamp_unit;
use decision_core::{Direction, FilterKind, FilterVerdict, PortfolioGate};

use crate::profiles::ModeProfile;

/// Everything a filter may look at for one candidate trade
#[derive(Debug, Clone, Copy)]
pub struct FilterContext<'a> {
    pub symbol: &'a str,
    pub direction: Direction,
    pub profile: &'a ModeProfile,
    pub volatility: f64,
    pub liquidity: f64,
    /// Sentiment in the signal's direction, 0 to 100
    pub aligned_sentiment: f64,
}

/// A gating check that can veto a trade regardless of its score
pub trait DynamicFilter: Send + Sync {
    fn kind(&self) -> FilterKind;

    fn evaluate(&self, ctx: &FilterContext<'_>) -> FilterVerdict;
}

fn verdict(kind: FilterKind, passed: bool, margin: f64, note: String) -> FilterVerdict {
    FilterVerdict {
        kind,
        passed,
        margin: if passed { clamp_unit(margin) } else { 0.0 },
        note,
    }
}

/// Rejects when volatility exceeds the mode's ceiling
#[derive(Debug, Clone, Copy, Default)]
pub struct VolatilityFilter;

impl DynamicFilter for VolatilityFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::Volatility
    }

    fn evaluate(&self, ctx: &FilterContext<'_>) -> FilterVerdict {
        let ceiling = ctx.profile.volatility_ceiling;
        let passed = ctx.volatility <= ceiling;
        let margin = if ceiling > 0.0 {
            (ceiling - ctx.volatility) / ceiling
        } else {
            0.0
        };
        verdict(
            self.kind(),
            passed,
            margin,
            format!("volatility {:.1} vs ceiling {:.1}", ctx.volatility, ceiling),
        )
    }
}

/// Rejects thin markets below the mode's minimum liquidity
#[derive(Debug, Clone, Copy, Default)]
pub struct LiquidityFilter;

impl DynamicFilter for LiquidityFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::Liquidity
    }

    fn evaluate(&self, ctx: &FilterContext<'_>) -> FilterVerdict {
        let floor = ctx.profile.min_liquidity;
        let passed = ctx.liquidity >= floor;
        let room = 100.0 - floor;
        let margin = if room > 0.0 {
            (ctx.liquidity - floor) / room
        } else {
            1.0
        };
        verdict(
            self.kind(),
            passed,
            margin,
            format!("liquidity {:.1} vs minimum {:.1}", ctx.liquidity, floor),
        )
    }
}

/// Asks the portfolio how much correlated exposure the trade would add to.
/// No gate, or no answer, passes.
pub struct CorrelationFilter {
    gate: Option<Arc<dyn PortfolioGate>>,
    max_exposure: f64,
}

impl CorrelationFilter {
    pub fn new(gate: Option<Arc<dyn PortfolioGate>>, max_exposure: f64) -> Self {
        Self { gate, max_exposure }
    }
}

impl DynamicFilter for CorrelationFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::Correlation
    }

    fn evaluate(&self, ctx: &FilterContext<'_>) -> FilterVerdict {
        let exposure = self
            .gate
            .as_ref()
            .and_then(|gate| gate.correlation_exposure(ctx.symbol, ctx.direction));

        match exposure {
            Some(exposure) => {
                let margin = if self.max_exposure > 0.0 {
                    (self.max_exposure - exposure) / self.max_exposure
                } else {
                    0.0
                };
                verdict(
                    self.kind(),
                    exposure <= self.max_exposure,
                    margin,
                    format!(
                        "correlated exposure {:.1} vs limit {:.1}",
                        exposure, self.max_exposure
                    ),
                )
            }
            None => verdict(
                self.kind(),
                true,
                1.0,
                "no correlation data".to_string(),
            ),
        }
    }
}

/// Rejects when sentiment strongly contradicts the signal direction
#[derive(Debug, Clone, Copy)]
pub struct SentimentAlignmentFilter {
    floor: f64,
}

impl SentimentAlignmentFilter {
    pub fn new(floor: f64) -> Self {
        Self { floor }
    }
}

impl DynamicFilter for SentimentAlignmentFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::SentimentAlignment
    }

    fn evaluate(&self, ctx: &FilterContext<'_>) -> FilterVerdict {
        let room = 100.0 - self.floor;
        let margin = if room > 0.0 {
            (ctx.aligned_sentiment - self.floor) / room
        } else {
            1.0
        };
        verdict(
            self.kind(),
            ctx.aligned_sentiment >= self.floor,
            margin,
            format!(
                "aligned sentiment {:.1} vs floor {:.1}",
                ctx.aligned_sentiment, self.floor
            ),
        )
    }
}
