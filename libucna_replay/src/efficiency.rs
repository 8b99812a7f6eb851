//! Binned trigger efficiency data.
//!
//! An [`EfficiencyHistogram`] collects, for one PMT, how often it fired among events where the
//! rest of its side already guaranteed a trigger. [`EfficiencyCurve`] is the plain ordered bin
//! list handed to the fitter, and [`EfficiencyCurve::ratio`] turns it into efficiency points with
//! Bayesian binomial error bars.
use serde::{Deserialize, Serialize};

use super::special_functions::beta_quantile;

/// Posterior probability contained in the reported error bars (one sigma)
const CONFIDENCE_LEVEL: f64 = 0.682689492137;

/// One bin: the bin center, and how many of `total` events were triggered
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyPoint {
    pub x: f64,
    pub triggered: u64,
    pub total: u64,
}

/// Efficiency estimate for one bin with asymmetric uncertainties
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatioPoint {
    pub x: f64,
    pub y: f64,
    pub err_low: f64,
    pub err_high: f64,
}

impl RatioPoint {
    /// Single uncertainty used to weight the point in a fit
    pub fn sigma(&self) -> f64 {
        0.5 * (self.err_low + self.err_high)
    }
}

/// Ordered bins for one channel, monotonic in `x`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyCurve {
    pub points: Vec<EfficiencyPoint>,
}

impl EfficiencyCurve {
    pub fn new(points: Vec<EfficiencyPoint>) -> Self {
        Self { points }
    }

    /// Bin-by-bin efficiency with a uniform prior.
    ///
    /// The point is the posterior mode k/N; the error bars span the central
    /// [`CONFIDENCE_LEVEL`] interval of Beta(k+1, N-k+1), or a one sided interval when k = 0
    /// or k = N. Empty bins are skipped.
    pub fn ratio(&self) -> Vec<RatioPoint> {
        self.points
            .iter()
            .filter(|p| p.total > 0)
            .map(|p| {
                let k = p.triggered.min(p.total) as f64;
                let n = p.total as f64;
                let (a, b) = (k + 1.0, n - k + 1.0);
                let mode = k / n;
                let (low, high) = if k == 0.0 {
                    (0.0, beta_quantile(CONFIDENCE_LEVEL, a, b))
                } else if k == n {
                    (beta_quantile(1.0 - CONFIDENCE_LEVEL, a, b), 1.0)
                } else {
                    let tail = 0.5 * (1.0 - CONFIDENCE_LEVEL);
                    (
                        beta_quantile(tail, a, b),
                        beta_quantile(1.0 - tail, a, b),
                    )
                };
                RatioPoint {
                    x: p.x,
                    y: mode,
                    err_low: (mode - low).max(0.0),
                    err_high: (high - mode).max(0.0),
                }
            })
            .collect()
    }
}

/// Fixed binning histogram pair (all events, triggered events) for one channel
#[derive(Debug, Clone, PartialEq)]
pub struct EfficiencyHistogram {
    min: f64,
    max: f64,
    all: Vec<u64>,
    triggered: Vec<u64>,
}

impl EfficiencyHistogram {
    pub fn new(n_bins: usize, min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            all: vec![0; n_bins],
            triggered: vec![0; n_bins],
        }
    }

    fn bin_width(&self) -> f64 {
        (self.max - self.min) / self.all.len() as f64
    }

    /// Add an event. Values outside `[min, max)` are dropped.
    pub fn fill(&mut self, value: f64, triggered: bool) {
        if !(self.min..self.max).contains(&value) || self.all.is_empty() {
            return;
        }
        let bin = (((value - self.min) / self.bin_width()) as usize).min(self.all.len() - 1);
        self.all[bin] += 1;
        if triggered {
            self.triggered[bin] += 1;
        }
    }

    pub fn entries(&self) -> u64 {
        self.all.iter().sum()
    }

    pub fn to_curve(&self) -> EfficiencyCurve {
        let width = self.bin_width();
        EfficiencyCurve::new(
            self.all
                .iter()
                .zip(self.triggered.iter())
                .enumerate()
                .map(|(i, (all, trig))| EfficiencyPoint {
                    x: self.min + (i as f64 + 0.5) * width,
                    triggered: *trig,
                    total: *all,
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_histogram_binning() {
        let mut hist = EfficiencyHistogram::new(10, 0.0, 10.0);
        hist.fill(0.0, false);
        hist.fill(0.5, true);
        hist.fill(9.99, true);
        hist.fill(10.0, true);
        hist.fill(-1.0, true);
        assert_eq!(hist.entries(), 3);
        let curve = hist.to_curve();
        assert_eq!(curve.points.len(), 10);
        assert_approx_eq!(curve.points[0].x, 0.5, 1e-12);
        assert_eq!(curve.points[0].total, 2);
        assert_eq!(curve.points[0].triggered, 1);
        assert_eq!(curve.points[9].triggered, 1);
    }

    #[test]
    fn test_ratio_errors() {
        let curve = EfficiencyCurve::new(vec![
            EfficiencyPoint {
                x: 1.0,
                triggered: 0,
                total: 10,
            },
            EfficiencyPoint {
                x: 2.0,
                triggered: 5,
                total: 10,
            },
            EfficiencyPoint {
                x: 3.0,
                triggered: 0,
                total: 0,
            },
            EfficiencyPoint {
                x: 4.0,
                triggered: 10,
                total: 10,
            },
        ]);
        let ratio = curve.ratio();
        assert_eq!(ratio.len(), 3);

        assert_eq!(ratio[0].y, 0.0);
        assert_eq!(ratio[0].err_low, 0.0);
        assert!(ratio[0].err_high > 0.0);

        assert_approx_eq!(ratio[1].y, 0.5, 1e-12);
        assert_approx_eq!(ratio[1].err_low, ratio[1].err_high, 1e-9);
        assert!(ratio[1].err_low > 0.1 && ratio[1].err_low < 0.2);

        assert_eq!(ratio[2].y, 1.0);
        assert_eq!(ratio[2].err_high, 0.0);
        assert!(ratio[2].sigma() > 0.0);
    }
}
