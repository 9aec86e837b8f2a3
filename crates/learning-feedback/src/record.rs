use chrono::{DateTime, Utc};
use decision_core::adaptive::{ewma, ewma_variance};
use decision_core::PerformanceRecord;

/// Fold one closed trade into a performance record.
///
/// Returns and drawdown are in percent points, holding time in seconds.
/// The first trade seeds every statistic directly; later trades move them
/// by `alpha`.
pub fn update_record(
    record: &mut PerformanceRecord,
    return_percent: f64,
    drawdown_percent: f64,
    holding_secs: f64,
    alpha: f64,
    now: DateTime<Utc>,
) {
    let win = if return_percent > 0.0 { 1.0 } else { 0.0 };
    let drawdown = drawdown_percent.abs();

    if record.trade_count == 0 {
        record.accuracy = win;
        record.profitability = return_percent;
        record.avg_holding_time = holding_secs;
        record.max_drawdown = drawdown;
        record.return_variance = 0.0;
    } else {
        record.return_variance =
            ewma_variance(record.return_variance, record.profitability, return_percent, alpha);
        record.accuracy = ewma(record.accuracy, win, alpha);
        record.profitability = ewma(record.profitability, return_percent, alpha);
        record.avg_holding_time = ewma(record.avg_holding_time, holding_secs, alpha);
        record.max_drawdown = ewma(record.max_drawdown, drawdown, alpha);
    }

    let std = record.return_variance.sqrt();
    record.sharpe_ratio = if std > 1e-9 {
        record.profitability / std
    } else {
        0.0
    };
    record.trade_count += 1;
    record.last_update = Some(now);
}
