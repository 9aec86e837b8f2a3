use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use decision_core::ManualClock;
use decision_engine::{
    spawn_learning_worker, Collaborators, Decision, DecisionEngine, EngineConfig,
    PerformanceSummary, TradeOutcome,
};
use serde::Serialize;

mod replay;

use replay::{ReplayFeed, ReplayFile};

#[derive(Debug, Serialize)]
struct ReplayReport {
    decisions: Vec<Decision>,
    summary: PerformanceSummary,
}

fn init_tracing() {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    // Logs go to stderr so stdout carries only the report
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter())
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("REPLAY_FILE").ok())
        .context("usage: decision-replay <replay.json> (or set REPLAY_FILE)")?;

    let replay = ReplayFile::load(&path)?;
    let config = EngineConfig::from_env()?;
    tracing::info!(
        steps = replay.steps.len(),
        path = %path,
        "replay loaded"
    );

    let start = replay.steps.first().map(|s| s.at).unwrap_or_else(Utc::now);
    let clock = Arc::new(ManualClock::new(start));
    let feed = Arc::new(ReplayFeed::new(config.risk_limits.max_risk_per_trade));
    let collaborators = Collaborators::new(feed.clone(), feed.clone(), feed.clone())
        .with_ml(feed.clone())
        .with_sentiment(feed.clone())
        .with_clock(clock.clone());

    let queue_capacity = config.learning_queue_capacity;
    let engine = Arc::new(DecisionEngine::new(config, collaborators)?);
    let (learning, worker) = spawn_learning_worker(engine.clone(), queue_capacity);

    let mut decisions = Vec::with_capacity(replay.steps.len());
    for step in &replay.steps {
        clock.set(step.at);
        feed.load_step(step);

        let decision = engine.make_decision(&step.symbol);
        if let (true, Some(outcome)) = (decision.sizing.is_trade(), step.outcome) {
            learning
                .submit(TradeOutcome {
                    decision_id: decision.id,
                    realized_return: outcome.realized_return,
                    max_drawdown: outcome.max_drawdown,
                })
                .await
                .context("learning worker stopped early")?;
        }
        decisions.push(decision);
    }

    drop(learning);
    let applied = worker.await.context("learning worker panicked")?;
    tracing::info!(decisions = decisions.len(), applied, "replay complete");

    let report = ReplayReport {
        decisions,
        summary: engine.performance_summary(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
