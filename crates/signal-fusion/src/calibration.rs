//! Confidence to win-probability mapping.
//!
//! Before any outcomes exist the win probability comes from a normal-CDF
//! prior centred on confidence 50. The learning pass fits a reliability
//! table over closed trades, and bins with enough samples pull the prior
//! toward their observed win rate.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

/// Win probability implied by a 0-100 confidence before any calibration.
pub fn prior_win_probability(confidence: f64, spread: f64) -> f64 {
    match Normal::new(50.0, spread) {
        Ok(normal) => normal.cdf(confidence),
        Err(_) => {
            if confidence >= 50.0 {
                1.0
            } else {
                0.0
            }
        }
    }
}

/// One closed trade as seen by the calibrator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSample {
    /// Confidence level at decision time, 0 to 100
    pub confidence: f64,
    /// Win probability the scorer reported
    pub predicted: f64,
    pub won: bool,
}

/// A confidence bucket in the reliability table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
    pub wins: usize,
    pub avg_predicted: f64,
}

impl CalibrationBin {
    pub fn win_rate(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.wins as f64 / self.count as f64
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationStats {
    /// Expected Calibration Error (lower is better)
    pub ece: f64,
    /// Maximum Calibration Error
    pub mce: f64,
    /// Mean squared error of the predicted probabilities
    pub brier_score: f64,
    pub sample_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationTable {
    bins: Vec<CalibrationBin>,
    stats: CalibrationStats,
}

impl Default for CalibrationTable {
    fn default() -> Self {
        Self::fit(&[])
    }
}

impl CalibrationTable {
    pub const BIN_COUNT: usize = 10;

    pub fn bin_index(confidence: f64) -> usize {
        let width = 100.0 / Self::BIN_COUNT as f64;
        let idx = (confidence.max(0.0) / width) as usize;
        idx.min(Self::BIN_COUNT - 1)
    }

    /// Rebuild the table from scratch.
    pub fn fit(samples: &[CalibrationSample]) -> Self {
        let width = 100.0 / Self::BIN_COUNT as f64;
        let mut bins: Vec<CalibrationBin> = (0..Self::BIN_COUNT)
            .map(|i| CalibrationBin {
                lower: i as f64 * width,
                upper: (i + 1) as f64 * width,
                count: 0,
                wins: 0,
                avg_predicted: 0.0,
            })
            .collect();

        for sample in samples {
            let bin = &mut bins[Self::bin_index(sample.confidence)];
            bin.count += 1;
            if sample.won {
                bin.wins += 1;
            }
            bin.avg_predicted += sample.predicted;
        }

        let n = samples.len() as f64;
        let mut ece = 0.0;
        let mut mce: f64 = 0.0;
        for bin in bins.iter_mut().filter(|b| b.count > 0) {
            bin.avg_predicted /= bin.count as f64;
            let error = (bin.avg_predicted - bin.win_rate()).abs();
            ece += error * bin.count as f64 / n;
            mce = mce.max(error);
        }

        let brier_score = if samples.is_empty() {
            0.0
        } else {
            samples
                .iter()
                .map(|s| {
                    let y = if s.won { 1.0 } else { 0.0 };
                    (s.predicted - y).powi(2)
                })
                .sum::<f64>()
                / n
        };

        Self {
            bins,
            stats: CalibrationStats {
                ece,
                mce,
                brier_score,
                sample_size: samples.len(),
            },
        }
    }

    /// Observed win rate for the confidence's bin, if it holds enough trades.
    pub fn empirical_win_rate(&self, confidence: f64, min_samples: usize) -> Option<f64> {
        let bin = &self.bins[Self::bin_index(confidence)];
        if bin.count >= min_samples && bin.count > 0 {
            Some(bin.win_rate())
        } else {
            None
        }
    }

    pub fn bins(&self) -> &[CalibrationBin] {
        &self.bins
    }

    pub fn stats(&self) -> &CalibrationStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample(confidence: f64, predicted: f64, won: bool) -> CalibrationSample {
        CalibrationSample {
            confidence,
            predicted,
            won,
        }
    }

    #[test]
    fn test_prior_is_monotone_and_centred() {
        assert_relative_eq!(prior_win_probability(50.0, 25.0), 0.5, epsilon = 1e-9);
        assert!(prior_win_probability(67.0, 25.0) > 0.7);
        assert!(prior_win_probability(67.0, 25.0) < 0.8);
        assert!(prior_win_probability(20.0, 25.0) < prior_win_probability(40.0, 25.0));
    }

    #[test]
    fn test_bin_index_bounds() {
        assert_eq!(CalibrationTable::bin_index(0.0), 0);
        assert_eq!(CalibrationTable::bin_index(67.0), 6);
        assert_eq!(CalibrationTable::bin_index(100.0), 9);
        assert_eq!(CalibrationTable::bin_index(-5.0), 0);
    }

    #[test]
    fn test_empirical_rate_needs_min_samples() {
        let mut samples: Vec<_> = (0..12).map(|i| sample(65.0, 0.7, i % 4 != 0)).collect();
        samples.push(sample(15.0, 0.1, false));

        let table = CalibrationTable::fit(&samples);
        assert_relative_eq!(table.empirical_win_rate(65.0, 10).unwrap_or(0.0), 0.75);
        assert!(table.empirical_win_rate(15.0, 10).is_none());
        assert_eq!(table.stats().sample_size, 13);
    }

    #[test]
    fn test_stats_reward_good_calibration() {
        let good: Vec<_> = (0..20).map(|i| sample(85.0, 0.9, i % 10 != 0)).collect();
        let bad: Vec<_> = (0..20).map(|i| sample(85.0, 0.9, i % 10 == 0)).collect();

        let good = CalibrationTable::fit(&good);
        let bad = CalibrationTable::fit(&bad);
        assert!(good.stats().ece < 0.01);
        assert!(bad.stats().ece > 0.7);
        assert!(good.stats().brier_score < bad.stats().brier_score);
    }

    #[test]
    fn test_empty_table() {
        let table = CalibrationTable::default();
        assert_eq!(table.bins().len(), CalibrationTable::BIN_COUNT);
        assert_eq!(table.stats().ece, 0.0);
        assert!(table.empirical_win_rate(50.0, 0).is_none());
    }
}
