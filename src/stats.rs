//! Running mean/variance and Welch's two-sample t-test, used by the
//! bootstrap driver (spec §4.9) to score how stable a bootstrap estimate
//! is across resamples.
//!
//! Ground truth: `.../KmerCounter/helpers/t_test2.c`. The original
//! accumulates a Welford running mean/`M2` independently for an "x" and a
//! "y" series (skipping NaN observations), then derives a Welch t
//! statistic, Welch-Satterthwaite degrees of freedom, and a two-tailed
//! p-value via the regularized incomplete beta function (`bratio` from
//! TOMS Algorithm 708). Hand-porting `bratio`'s continued fraction would
//! just be a bug-for-bug recreation of a numerical recipe already
//! available as a crate, so this port uses `statrs`'s `StudentsT` CDF in
//! its place; the two agree to double precision for any finite degrees of
//! freedom.

use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::error::KatssError;

/// Welford running mean/variance accumulator for one sample series,
/// skipping `NaN` observations (ground truth: `t_test2_update`).
#[derive(Debug, Clone, Copy, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in one observation. `NaN` is silently skipped, matching the
    /// original's treatment of unobserved-kmer enrichment scores.
    pub fn update(&mut self, x: f64) {
        if x.is_nan() {
            return;
        }
        self.count += 1;
        #[allow(clippy::cast_precision_loss)]
        let n = self.count as f64;
        let delta = x - self.mean;
        self.mean += delta / n;
        let delta2 = x - self.mean;
        self.m2 += delta * delta2;
    }

    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }

    #[must_use]
    pub const fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample variance (`M2 / (n - 1)`); `0.0` for fewer than 2 observations.
    #[must_use]
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let n = self.count as f64;
            self.m2 / (n - 1.0)
        }
    }

    #[must_use]
    pub fn stdev(&self) -> f64 {
        self.variance().sqrt()
    }
}

/// Welch's two-sample t-test result (ground truth: `t_test2_finalize`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WelchTTest {
    pub t_stat: f64,
    pub df: f64,
    pub p_value: f64,
}

/// Two-tailed Welch's t-test comparing `x` and `y`'s running means.
///
/// # Errors
/// [`KatssError::BadArgs`] if either series has fewer than 2 observations
/// (matching the original's `x_count >= 2 && y_count >= 2` precondition),
/// or if `statrs` rejects the computed degrees of freedom.
pub fn welch_t_test(x: &RunningStats, y: &RunningStats) -> Result<WelchTTest, KatssError> {
    if x.count < 2 || y.count < 2 {
        return Err(KatssError::bad_args(
            "welch_t_test requires at least 2 observations in each series",
        ));
    }
    #[allow(clippy::cast_precision_loss)]
    let nx = x.count as f64;
    #[allow(clippy::cast_precision_loss)]
    let ny = y.count as f64;
    let varx_over_nx = x.variance() / nx;
    let vary_over_ny = y.variance() / ny;
    let se = (varx_over_nx + vary_over_ny).sqrt();

    let t_stat = if se == 0.0 {
        0.0
    } else {
        (x.mean - y.mean) / se
    };

    let df = if varx_over_nx == 0.0 && vary_over_ny == 0.0 {
        nx + ny - 2.0
    } else {
        (varx_over_nx + vary_over_ny).powi(2)
            / (varx_over_nx.powi(2) / (nx - 1.0) + vary_over_ny.powi(2) / (ny - 1.0))
    };

    let dist = StudentsT::new(0.0, 1.0, df)
        .map_err(|e| KatssError::bad_args(format!("invalid degrees of freedom {df}: {e}")))?;
    let p_value = 2.0 * dist.cdf(-t_stat.abs());

    Ok(WelchTTest { t_stat, df, p_value })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[f64]) -> RunningStats {
        let mut stats = RunningStats::new();
        for &v in values {
            stats.update(v);
        }
        stats
    }

    #[test]
    fn mean_and_variance_match_textbook_formula() {
        let stats = series(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((stats.mean() - 5.0).abs() < 1e-9);
        assert!((stats.variance() - 4.571_428_571_428_571).abs() < 1e-9);
    }

    #[test]
    fn nan_observations_are_skipped() {
        let mut stats = RunningStats::new();
        stats.update(1.0);
        stats.update(f64::NAN);
        stats.update(3.0);
        assert_eq!(stats.count(), 2);
        assert!((stats.mean() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn identical_series_have_p_value_near_one() {
        let x = series(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let y = series(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let result = welch_t_test(&x, &y).unwrap();
        assert!((result.t_stat).abs() < 1e-9);
        assert!(result.p_value > 0.99);
    }

    #[test]
    fn clearly_separated_series_have_small_p_value() {
        let x = series(&[1.0, 1.1, 0.9, 1.0, 1.05]);
        let y = series(&[10.0, 10.1, 9.9, 10.0, 10.05]);
        let result = welch_t_test(&x, &y).unwrap();
        assert!(result.p_value < 0.001);
    }

    #[test]
    fn rejects_too_few_observations() {
        let x = series(&[1.0]);
        let y = series(&[1.0, 2.0]);
        assert!(welch_t_test(&x, &y).is_err());
    }
}
