//! Trigger efficiency turn-on fits.
//!
//! Each PMT's efficiency curve is fit with
//!
//! ```text
//! f(x) = plateau * P(n, n * x / center),   n = center / width * shape
//! ```
//!
//! where `P` is the regularized lower incomplete gamma function, i.e. the probability that a
//! Poisson process with mean `n x / center` reaches `n` counts. The curve is 0 for `x <= 0`,
//! passes through roughly half the plateau at `x = center`, and is non-decreasing everywhere.
//!
//! The fit is a bounded Levenberg-Marquardt least squares; parameters are clipped to their
//! bounds after every step, so an out-of-bounds optimum ends up on the boundary.
use nalgebra::{SMatrix, SVector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::efficiency::{EfficiencyCurve, RatioPoint};
use super::range_cut::RangeCut;
use super::side::Side;
use super::special_functions::gamma_p;

pub const N_PARAMETERS: usize = 4;
pub const CENTER: usize = 0;
pub const WIDTH: usize = 1;
pub const SHAPE: usize = 2;
pub const PLATEAU: usize = 3;

/// Smallest uncertainty assigned to a point when weighting the fit
const MIN_SIGMA: f64 = 1.0e-4;
const CHI2_TOLERANCE: f64 = 1.0e-9;
const MAX_LAMBDA: f64 = 1.0e12;

type Matrix = SMatrix<f64, N_PARAMETERS, N_PARAMETERS>;
type Vector = SVector<f64, N_PARAMETERS>;

/// The turn-on model evaluated at `x`
pub fn turn_on(x: f64, params: &[f64; N_PARAMETERS]) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    let center = params[CENTER];
    if center <= 0.0 {
        return params[PLATEAU];
    }
    let n = center / params[WIDTH] * params[SHAPE];
    params[PLATEAU] * gamma_p(n, n * x / center)
}

/// A fitted value and its uncertainty. An infinite error marks a parameter the data do not
/// constrain.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ValueError {
    pub value: f64,
    pub error: f64,
}

/// Identifies one PMT channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelKey {
    pub side: Side,
    pub tube: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriggerEfficiencyFit {
    pub center: ValueError,
    pub width: ValueError,
    pub shape: ValueError,
    pub plateau: ValueError,
    /// Effective photoelectron count at threshold, `center / width * shape`
    pub n: f64,
    pub chi2: f64,
    pub ndf: i64,
    pub converged: bool,
}

impl TriggerEfficiencyFit {
    fn new(
        params: [f64; N_PARAMETERS],
        errors: [f64; N_PARAMETERS],
        chi2: f64,
        ndf: i64,
        converged: bool,
    ) -> Self {
        let ve = |i: usize| ValueError {
            value: params[i],
            error: errors[i],
        };
        Self {
            center: ve(CENTER),
            width: ve(WIDTH),
            shape: ve(SHAPE),
            plateau: ve(PLATEAU),
            n: params[CENTER] / params[WIDTH] * params[SHAPE],
            chi2,
            ndf,
            converged,
        }
    }

    pub fn params(&self) -> [f64; N_PARAMETERS] {
        [
            self.center.value,
            self.width.value,
            self.shape.value,
            self.plateau.value,
        ]
    }

    pub fn errors(&self) -> [f64; N_PARAMETERS] {
        [
            self.center.error,
            self.width.error,
            self.shape.error,
            self.plateau.error,
        ]
    }

    /// True when every parameter has a finite uncertainty
    pub fn errors_valid(&self) -> bool {
        self.errors().iter().all(|e| e.is_finite())
    }

    /// Fitted efficiency at `x`
    pub fn evaluate(&self, x: f64) -> f64 {
        turn_on(x, &self.params())
    }
}

/// A fit attached to its channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelFit {
    pub key: ChannelKey,
    pub fit: TriggerEfficiencyFit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriggerEfficiencyFitter {
    pub bounds: [RangeCut; N_PARAMETERS],
    pub fit_range: RangeCut,
    /// Starting parameters; the center is replaced by the 50% scan when it finds one
    pub seed: [f64; N_PARAMETERS],
    pub max_iterations: usize,
}

impl Default for TriggerEfficiencyFitter {
    fn default() -> Self {
        Self {
            bounds: [
                RangeCut::new(0.0, 100.0),
                RangeCut::new(2.0, 200.0),
                RangeCut::new(0.1, 1000.0),
                RangeCut::new(0.75, 1.0),
            ],
            fit_range: RangeCut::new(-50.0, 200.0),
            seed: [10.0, 10.0, 1.4, 0.99],
            max_iterations: 200,
        }
    }
}

/// Scan from the high end for the first point below 50% efficiency.
/// The lowest point is never taken.
fn threshold_guess(points: &[RatioPoint]) -> Option<f64> {
    (1..points.len())
        .rev()
        .map(|i| &points[i])
        .find(|p| p.y < 0.5)
        .map(|p| p.x)
}

impl TriggerEfficiencyFitter {
    fn clip(&self, params: [f64; N_PARAMETERS]) -> [f64; N_PARAMETERS] {
        let mut clipped = params;
        for (p, bound) in clipped.iter_mut().zip(self.bounds.iter()) {
            *p = p.clamp(bound.start, bound.end);
        }
        clipped
    }

    fn chi2(&self, points: &[RatioPoint], sigmas: &[f64], params: &[f64; N_PARAMETERS]) -> f64 {
        points
            .iter()
            .zip(sigmas.iter())
            .map(|(p, s)| ((p.y - turn_on(p.x, params)) / s).powi(2))
            .sum()
    }

    /// JᵀJ and Jᵀr for the weighted residuals, with a numerical Jacobian that never steps
    /// outside the parameter bounds
    fn normal_equations(
        &self,
        points: &[RatioPoint],
        sigmas: &[f64],
        params: &[f64; N_PARAMETERS],
    ) -> (Matrix, Vector) {
        let mut jtj = Matrix::zeros();
        let mut jtr = Vector::zeros();

        let mut steps = [(*params, *params, 0.0); N_PARAMETERS];
        for (j, (up, down, span)) in steps.iter_mut().enumerate() {
            let h = 1.0e-6 * params[j].abs().max(1.0);
            up[j] = (params[j] + h).min(self.bounds[j].end);
            down[j] = (params[j] - h).max(self.bounds[j].start);
            *span = up[j] - down[j];
        }

        for (p, sigma) in points.iter().zip(sigmas.iter()) {
            let residual = (p.y - turn_on(p.x, params)) / sigma;
            let mut row = [0.0; N_PARAMETERS];
            for (j, (up, down, span)) in steps.iter().enumerate() {
                if *span > 0.0 {
                    row[j] = (turn_on(p.x, up) - turn_on(p.x, down)) / span / sigma;
                }
            }
            for j in 0..N_PARAMETERS {
                jtr[j] += row[j] * residual;
                for k in 0..N_PARAMETERS {
                    jtj[(j, k)] += row[j] * row[k];
                }
            }
        }
        (jtj, jtr)
    }

    /// Fit one channel's efficiency curve.
    ///
    /// Never fails: sparse or degenerate data give a best-effort result flagged as not
    /// converged.
    pub fn fit(&self, curve: &EfficiencyCurve) -> TriggerEfficiencyFit {
        let points: Vec<RatioPoint> = curve
            .ratio()
            .into_iter()
            .filter(|p| self.fit_range.in_range(p.x))
            .collect();

        let guess = threshold_guess(&points).unwrap_or(self.seed[CENTER]);
        log::info!("Pre-fit threshold guess: {guess:.1}");
        let mut params = self.seed;
        params[CENTER] = guess;
        let mut params = self.clip(params);

        if points.is_empty() {
            log::warn!("No populated bins in efficiency curve; keeping seed parameters");
            return TriggerEfficiencyFit::new(params, [f64::INFINITY; N_PARAMETERS], 0.0, 0, false);
        }

        let sigmas: Vec<f64> = points.iter().map(|p| p.sigma().max(MIN_SIGMA)).collect();
        let mut chi2 = self.chi2(&points, &sigmas, &params);
        let mut lambda = 1.0e-3;
        let mut converged = false;

        for _ in 0..self.max_iterations {
            let (jtj, jtr) = self.normal_equations(&points, &sigmas, &params);
            let mut damped = jtj;
            for j in 0..N_PARAMETERS {
                damped[(j, j)] += lambda * jtj[(j, j)].max(f64::EPSILON);
            }
            let step = damped
                .lu()
                .solve(&jtr)
                .filter(|step| step.iter().all(|s| s.is_finite()));
            let Some(step) = step else {
                lambda *= 10.0;
                if lambda > MAX_LAMBDA {
                    break;
                }
                continue;
            };

            let mut trial = params;
            for (p, s) in trial.iter_mut().zip(step.iter()) {
                *p += s;
            }
            let trial = self.clip(trial);
            let trial_chi2 = self.chi2(&points, &sigmas, &trial);

            if trial_chi2 < chi2 {
                let improvement = chi2 - trial_chi2;
                params = trial;
                chi2 = trial_chi2;
                lambda = (lambda / 10.0).max(1.0e-12);
                if improvement < CHI2_TOLERANCE * (chi2 + CHI2_TOLERANCE) {
                    converged = true;
                    break;
                }
            } else {
                lambda *= 10.0;
                if lambda > MAX_LAMBDA {
                    // No downhill step left at any damping
                    converged = true;
                    break;
                }
            }
        }

        let (jtj, _) = self.normal_equations(&points, &sigmas, &params);
        let errors = parameter_errors(&jtj);
        if !errors.iter().all(|e| e.is_finite()) {
            log::warn!("Trigger efficiency fit leaves some parameters unconstrained");
        }

        let ndf = points.len() as i64 - N_PARAMETERS as i64;
        TriggerEfficiencyFit::new(params, errors, chi2, ndf, converged)
    }

    /// Fit every channel. Channels are independent and fit in parallel; the output keeps the
    /// order of the input.
    pub fn fit_all(&self, curves: &[(ChannelKey, EfficiencyCurve)]) -> Vec<ChannelFit> {
        curves
            .par_iter()
            .map(|(key, curve)| {
                let fit = self.fit(curve);
                log::info!(
                    "{}{} Poisson CDF Fit: h = {:.4}({:.4}), x0 = {:.1}({:.1}), dx = {:.1}({:.1}), n = {:.2} [adjust {:.2}({:.2})]",
                    key.side.letter(),
                    key.tube,
                    fit.plateau.value,
                    fit.plateau.error,
                    fit.center.value,
                    fit.center.error,
                    fit.width.value,
                    fit.width.error,
                    fit.n,
                    fit.shape.value,
                    fit.shape.error
                );
                ChannelFit { key: *key, fit }
            })
            .collect()
    }
}

/// Uncertainties from the diagonal of `(JᵀJ)⁻¹`. Entries are infinite when the matrix cannot
/// be inverted or the variance is not positive.
fn parameter_errors(jtj: &Matrix) -> [f64; N_PARAMETERS] {
    let covariance = (*jtj).try_inverse();
    std::array::from_fn(|j| match &covariance {
        Some(cov) if cov[(j, j)].is_finite() && cov[(j, j)] > 0.0 => cov[(j, j)].sqrt(),
        _ => f64::INFINITY,
    })
}
