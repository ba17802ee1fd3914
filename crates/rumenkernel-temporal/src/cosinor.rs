//! Cosinor fitting kernel.
//!
//! Fits `value(t) = M + A·cos(2π·t/period + φ)` by Levenberg-Marquardt
//! nonlinear least squares. Every failure mode yields a `CosinorFit` with
//! `NaN` parameters and a `FitStatus` explaining why; nothing here panics or
//! returns an error for bad data.

use std::f64::consts::PI;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::messages::{CosinorFitInput, CosinorFitOutput};
use crate::types::{CosinorFit, FitStatus, TemperatureSample};
use rumenkernel_core::{
    config::PipelineConfig,
    domain::Domain,
    error::{KernelError, Result},
    kernel::KernelMetadata,
    traits::{AnalysisKernel, BatchKernel},
};

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e16;

/// Optimizer settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitSettings {
    /// Rhythm period in hours.
    pub period_hours: f64,
    /// Maximum Jacobian evaluations.
    pub max_iterations: usize,
    /// Relative change in residual sum of squares treated as converged.
    pub tolerance: f64,
}

impl FitSettings {
    /// Derive settings from a pipeline configuration.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            period_hours: config.cosinor.period_hours,
            max_iterations: config.cosinor.max_iterations,
            tolerance: config.cosinor.tolerance,
        }
    }
}

impl Default for FitSettings {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

// ============================================================================
// Cosinor Fitting Kernel
// ============================================================================

/// Cosinor fitting kernel.
///
/// Initial guess: mesor at the mean, amplitude at half the range, acrophase 0.
/// A negative fitted amplitude is reported as its magnitude with the acrophase
/// shifted by π, and the acrophase is wrapped into (−π, π].
#[derive(Debug, Clone)]
pub struct CosinorFitting {
    metadata: KernelMetadata,
}

impl Default for CosinorFitting {
    fn default() -> Self {
        Self::new()
    }
}

impl CosinorFitting {
    /// Create a new cosinor fitting kernel.
    #[must_use]
    pub fn new() -> Self {
        Self {
            metadata: KernelMetadata::batch("circadian/cosinor-fit", Domain::CircadianRhythm)
                .with_description("24-hour cosinor fit with goodness of fit"),
        }
    }

    /// Fit the model to `(time in hours, value)` pairs.
    ///
    /// Pairs with a non-finite time or value are ignored.
    pub fn compute(times_hours: &[f64], values: &[f64], settings: &FitSettings) -> CosinorFit {
        let points: Vec<(f64, f64)> = times_hours
            .iter()
            .zip(values)
            .map(|(&t, &y)| (t, y))
            .filter(|(t, y)| t.is_finite() && y.is_finite())
            .collect();

        let mut distinct_times: Vec<f64> = points.iter().map(|p| p.0).collect();
        distinct_times.sort_by(f64::total_cmp);
        distinct_times.dedup();
        if distinct_times.len() < 3 {
            return CosinorFit::undefined(FitStatus::InsufficientData);
        }

        let n = points.len() as f64;
        let mean = points.iter().map(|p| p.1).sum::<f64>() / n;
        let (min, max) = points
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p.1), hi.max(p.1))
            });
        if max - min == 0.0 {
            return CosinorFit::undefined(FitStatus::Degenerate);
        }
        let ss_tot: f64 = points.iter().map(|p| (p.1 - mean).powi(2)).sum();

        let omega = 2.0 * PI / settings.period_hours;
        let initial = [mean, (max - min) / 2.0, 0.0];

        let Some((params, ss_res, iterations)) =
            levenberg_marquardt(&points, omega, initial, settings)
        else {
            return CosinorFit::undefined(FitStatus::NotConverged);
        };

        let [mesor, mut amplitude, mut acrophase] = params;
        if amplitude < 0.0 {
            amplitude = -amplitude;
            acrophase += PI;
        }

        CosinorFit {
            mesor,
            amplitude,
            acrophase: wrap_phase(acrophase),
            r_squared: 1.0 - ss_res / ss_tot,
            iterations,
            status: FitStatus::Converged,
        }
    }

    /// Fit a day's samples, using time of day in hours and skipping undefined values.
    pub fn fit_samples<'a>(
        samples: impl IntoIterator<Item = &'a TemperatureSample>,
        settings: &FitSettings,
    ) -> CosinorFit {
        let (times, values): (Vec<f64>, Vec<f64>) = samples
            .into_iter()
            .filter(|s| s.is_defined())
            .map(|s| (s.hour_of_day(), s.value))
            .unzip();
        Self::compute(&times, &values, settings)
    }
}

/// Wrap an angle into (−π, π].
pub fn wrap_phase(phase: f64) -> f64 {
    let wrapped = phase.rem_euclid(2.0 * PI);
    if wrapped > PI {
        wrapped - 2.0 * PI
    } else {
        wrapped
    }
}

fn residual_sum(points: &[(f64, f64)], omega: f64, p: &[f64; 3]) -> f64 {
    points
        .iter()
        .map(|&(t, y)| {
            let r = y - p[0] - p[1] * (omega * t + p[2]).cos();
            r * r
        })
        .sum()
}

/// Returns the optimum, its residual sum of squares and the iteration count,
/// or `None` when the iteration cap is hit first.
#[allow(clippy::needless_range_loop)]
fn levenberg_marquardt(
    points: &[(f64, f64)],
    omega: f64,
    initial: [f64; 3],
    settings: &FitSettings,
) -> Option<([f64; 3], f64, usize)> {
    let mut p = initial;
    let mut ssr = residual_sum(points, omega, &p);
    let mut lambda = LAMBDA_INIT;

    if ssr == 0.0 {
        return Some((p, ssr, 0));
    }

    for iteration in 1..=settings.max_iterations {
        // Normal equations JᵀJ·δ = Jᵀr with J = ∂f/∂(M, A, φ).
        let mut jtj = [[0.0; 3]; 3];
        let mut jtr = [0.0; 3];
        for &(t, y) in points {
            let theta = omega * t + p[2];
            let (sin, cos) = theta.sin_cos();
            let j = [1.0, cos, -p[1] * sin];
            let r = y - p[0] - p[1] * cos;
            for a in 0..3 {
                jtr[a] += j[a] * r;
                for b in 0..3 {
                    jtj[a][b] += j[a] * j[b];
                }
            }
        }

        loop {
            let mut damped = jtj;
            for (k, row) in damped.iter_mut().enumerate() {
                row[k] += lambda * jtj[k][k].max(1e-12);
            }

            let accepted = solve3(damped, jtr).and_then(|delta| {
                let candidate = [p[0] + delta[0], p[1] + delta[1], p[2] + delta[2]];
                let candidate_ssr = residual_sum(points, omega, &candidate);
                (candidate_ssr.is_finite() && candidate_ssr < ssr)
                    .then_some((delta, candidate, candidate_ssr))
            });

            match accepted {
                Some((delta, candidate, candidate_ssr)) => {
                    let reduction = ssr - candidate_ssr;
                    p = candidate;
                    ssr = candidate_ssr;
                    lambda = (lambda / 10.0).max(LAMBDA_MIN);

                    let small_step = delta
                        .iter()
                        .zip(&p)
                        .all(|(d, v)| d.abs() <= settings.tolerance * (v.abs() + settings.tolerance));
                    if reduction <= settings.tolerance * (ssr + reduction) || small_step || ssr == 0.0
                    {
                        return Some((p, ssr, iteration));
                    }
                    break;
                }
                None => {
                    lambda *= 10.0;
                    if lambda > LAMBDA_MAX {
                        // Not even a vanishing gradient step lowers the residual:
                        // numerically stationary.
                        return Some((p, ssr, iteration));
                    }
                }
            }
        }
    }

    tracing::debug!(
        max_iterations = settings.max_iterations,
        ssr,
        "cosinor fit hit iteration cap"
    );
    None
}

/// Solve a 3×3 linear system by Gaussian elimination with partial pivoting.
#[allow(clippy::needless_range_loop)]
fn solve3(mut a: [[f64; 3]; 3], mut b: [f64; 3]) -> Option<[f64; 3]> {
    for col in 0..3 {
        let pivot = (col..3).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if !a[pivot][col].is_finite() || a[pivot][col].abs() < 1e-300 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in (col + 1)..3 {
            let factor = a[row][col] / a[col][col];
            for k in col..3 {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = [0.0; 3];
    for row in (0..3).rev() {
        let tail: f64 = ((row + 1)..3).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    x.iter().all(|v| v.is_finite()).then_some(x)
}

impl AnalysisKernel for CosinorFitting {
    fn metadata(&self) -> &KernelMetadata {
        &self.metadata
    }
}

#[async_trait]
impl BatchKernel<CosinorFitInput, CosinorFitOutput> for CosinorFitting {
    async fn execute(&self, input: CosinorFitInput) -> Result<CosinorFitOutput> {
        let start = Instant::now();
        let fit = Self::compute(&input.times_hours, &input.values, &input.settings);
        Ok(CosinorFitOutput {
            fit,
            compute_time_us: start.elapsed().as_micros() as u64,
        })
    }

    fn validate_input(&self, input: &CosinorFitInput) -> Result<()> {
        if input.times_hours.len() != input.values.len() {
            return Err(KernelError::validation(format!(
                "times ({}) and values ({}) differ in length",
                input.times_hours.len(),
                input.values.len()
            )));
        }
        if !(input.settings.period_hours > 0.0) || input.settings.max_iterations == 0 {
            return Err(KernelError::validation(
                "period must be positive and the iteration cap non-zero",
            ));
        }
        Ok(())
    }
}
