use std::sync::Arc;

use decision_core::{
    Clock, MarketAnalyzer, MlPredictor, PortfolioGate, SentimentAnalyzer, SystemClock,
    TechnicalSignalSource,
};

/// External services the engine reads from, wired once at startup.
/// ML and sentiment are optional; without them those sources drop out of
/// the fused score.
#[derive(Clone)]
pub struct Collaborators {
    pub technical: Arc<dyn TechnicalSignalSource>,
    pub market: Arc<dyn MarketAnalyzer>,
    pub portfolio: Arc<dyn PortfolioGate>,
    pub ml: Option<Arc<dyn MlPredictor>>,
    pub sentiment: Option<Arc<dyn SentimentAnalyzer>>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    pub fn new(
        technical: Arc<dyn TechnicalSignalSource>,
        market: Arc<dyn MarketAnalyzer>,
        portfolio: Arc<dyn PortfolioGate>,
    ) -> Self {
        Self {
            technical,
            market,
            portfolio,
            ml: None,
            sentiment: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_ml(mut self, ml: Arc<dyn MlPredictor>) -> Self {
        self.ml = Some(ml);
        self
    }

    pub fn with_sentiment(mut self, sentiment: Arc<dyn SentimentAnalyzer>) -> Self {
        self.sentiment = Some(sentiment);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}
