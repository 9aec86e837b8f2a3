use std::sync::Arc;

use tokio::sync::mpsc::{self, error::SendError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use learning_feedback::TradeOutcome;

use crate::engine::DecisionEngine;

/// Producer side of the learning queue. Cheap to clone; the worker stops
/// once every handle is dropped and the queue has drained.
#[derive(Debug, Clone)]
pub struct LearningHandle {
    tx: mpsc::Sender<TradeOutcome>,
}

impl LearningHandle {
    /// Queue an outcome, waiting for room when the queue is full.
    pub async fn submit(&self, outcome: TradeOutcome) -> Result<(), SendError<TradeOutcome>> {
        self.tx.send(outcome).await
    }
}

/// Start the single consumer that applies outcomes to the engine in
/// arrival order. The join handle resolves to the number of outcomes
/// applied successfully.
pub fn spawn_learning_worker(
    engine: Arc<DecisionEngine>,
    capacity: usize,
) -> (LearningHandle, JoinHandle<u64>) {
    let (tx, mut rx) = mpsc::channel::<TradeOutcome>(capacity.max(1));

    let task = tokio::spawn(async move {
        let mut applied = 0u64;
        while let Some(outcome) = rx.recv().await {
            match engine.apply_outcome(outcome) {
                Ok(update) => {
                    applied += 1;
                    debug!(
                        decision_id = %update.decision_id,
                        mode = %update.mode,
                        state = %update.state,
                        "outcome applied"
                    );
                }
                Err(e) => warn!(decision_id = %outcome.decision_id, error = %e, "outcome dropped"),
            }
        }
        info!(applied, "learning worker stopped");
        applied
    });

    (LearningHandle { tx }, task)
}
