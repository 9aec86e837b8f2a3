//! Numeric helpers shared by the classifier, scorer and learning loop.
//!
//! Every score in the engine lives on a 0-100 scale with 50 as neutral.

/// Neutral midpoint of the common 0-100 scale.
pub const NEUTRAL: f64 = 50.0;

/// Clamp to the 0-100 score range. NaN collapses to 0.
pub fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}

/// Clamp to the unit interval. NaN collapses to 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// 0 below `lo`, 1 above `hi`, linear in between.
pub fn ramp_up(x: f64, lo: f64, hi: f64) -> f64 {
    if hi <= lo {
        return if x >= hi { 1.0 } else { 0.0 };
    }
    clamp_unit((x - lo) / (hi - lo))
}

/// 1 below `lo`, 0 above `hi`, linear in between.
pub fn ramp_down(x: f64, lo: f64, hi: f64) -> f64 {
    1.0 - ramp_up(x, lo, hi)
}

/// One exponentially weighted step: old·(1−α) + observation·α.
pub fn ewma(old: f64, observation: f64, alpha: f64) -> f64 {
    old * (1.0 - alpha) + observation * alpha
}

/// EWMA variance step (West's incremental form) around the previous mean.
pub fn ewma_variance(old_variance: f64, old_mean: f64, observation: f64, alpha: f64) -> f64 {
    let diff = observation - old_mean;
    (1.0 - alpha) * (old_variance + alpha * diff * diff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ramps() {
        assert_eq!(ramp_up(50.0, 55.0, 75.0), 0.0);
        assert_relative_eq!(ramp_up(65.0, 55.0, 75.0), 0.5);
        assert_eq!(ramp_up(80.0, 55.0, 75.0), 1.0);
        assert_relative_eq!(ramp_down(65.0, 55.0, 75.0), 0.5);
        assert_eq!(ramp_down(10.0, 55.0, 75.0), 1.0);
    }

    #[test]
    fn test_ewma_step() {
        assert_relative_eq!(ewma(10.0, 20.0, 0.1), 11.0);
        assert_relative_eq!(ewma(10.0, 20.0, 1.0), 20.0);
    }

    #[test]
    fn test_clamps_handle_nan() {
        assert_eq!(clamp_score(f64::NAN), 0.0);
        assert_eq!(clamp_score(140.0), 100.0);
        assert_eq!(clamp_unit(-0.3), 0.0);
    }
}
