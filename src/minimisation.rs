//! Limit of detection search for bilinear calibration curves.
//!
//! A bilinear curve is flat below its limit of detection and linear above it. For a candidate
//! limit every point at or below it is moved onto the limit, a weighted line is fitted through
//! the moved points, and the candidate is scored by the weighted mean squared residual of the
//! clamped curve against the original points. The candidate is searched with a Nelder-Mead
//! simplex started in each gap between neighbouring concentrations.
use argmin::core::{CostFunction, Executor};
use argmin::solver::neldermead::NelderMead;
use itertools::Itertools;

use crate::curve::CalibrationCurve;
use crate::fit::{RegressionFit, WeightedPoint};
use crate::{Error, Result};

/// Simplex iterations allowed in each gap between concentrations
const MAX_ITERATIONS_PER_INTERVAL: u64 = 50;

/// Score given to a limit which does not produce a usable line
///
/// The simplex orders its vertices by cost, so the score must never be NaN.
const REJECTED: f64 = f64::MAX;

#[derive(Clone, Copy)]
pub(crate) struct LimitOfDetection<'a> {
    points: &'a [WeightedPoint],
}

impl<'a> LimitOfDetection<'a> {
    pub(crate) const fn new(points: &'a [WeightedPoint]) -> Self {
        Self { points }
    }

    /// The bilinear curve whose flat region ends at `limit`
    ///
    /// `None` when clamping leaves fewer than two distinct concentrations or the line through
    /// the clamped points cannot be fitted.
    pub(crate) fn curve_at(&self, limit: f64) -> Option<CalibrationCurve> {
        let clamped = self
            .points
            .iter()
            .map(|point| {
                if point.x > limit {
                    *point
                } else {
                    WeightedPoint { x: limit, ..*point }
                }
            })
            .collect::<Vec<_>>();

        if distinct_concentrations(&clamped).count() <= 1 {
            return None;
        }

        RegressionFit::Linear
            .perform_fit(&clamped)
            .ok()
            .map(|curve| {
                curve
                    .with_turning_point(limit)
                    .with_regression_fit(RegressionFit::Bilinear)
            })
    }

    /// Weighted mean squared residual of the bilinear curve at `limit`
    pub(crate) fn score(&self, limit: f64) -> f64 {
        let Some(curve) = self.curve_at(limit) else {
            return REJECTED;
        };

        let (total_delta, total_weight) =
            self.points
                .iter()
                .fold((0.0, 0.0), |(total_delta, total_weight), point| {
                    let delta = point.y - curve.y_at(point.x);
                    (
                        point.weight.mul_add(delta * delta, total_delta),
                        total_weight + point.weight,
                    )
                });

        let score = total_delta / total_weight;
        if score.is_finite() {
            score
        } else {
            REJECTED
        }
    }

    /// Run a simplex search between two neighbouring concentrations
    ///
    /// Returns the best limit found and its score.
    fn search(self, lower: f64, upper: f64) -> Result<(f64, f64)> {
        let step = (upper - lower) / 4.0;
        let start = (lower + upper) / 2.0;

        let solver = NelderMead::new(vec![vec![start], vec![start + step]])
            // Scores can be far below machine epsilon, only stop on the iteration cap
            .with_sd_tolerance(0.0)?;

        let res = Executor::new(self, solver)
            .configure(|state| state.max_iters(MAX_ITERATIONS_PER_INTERVAL))
            .run()?;

        let mut state = res.state().clone();
        let score = state.get_best_cost();
        let limit = state
            .take_best_param()
            .and_then(|param| param.first().copied())
            .ok_or_else(|| Error::Optimisation("simplex returned no parameters".to_owned()))?;
        Ok((limit, score))
    }
}

impl CostFunction for LimitOfDetection<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, p: &Self::Param) -> ::std::result::Result<Self::Output, argmin::core::Error> {
        Ok(p.first().map_or(REJECTED, |&limit| self.score(limit)))
    }
}

fn distinct_concentrations(points: &[WeightedPoint]) -> impl Iterator<Item = f64> {
    points
        .iter()
        .map(|point| point.x)
        .sorted_by(f64::total_cmp)
        .dedup()
}

/// Fit a bilinear curve to `points`
///
/// When no gap between concentrations yields a usable limit of detection the result is an
/// ordinary weighted line, still reported as bilinear and without a turning point.
pub(crate) fn fit_bilinear(points: &[WeightedPoint]) -> Result<CalibrationCurve> {
    let problem = LimitOfDetection::new(points);

    let mut best: Option<(f64, f64)> = None;
    for (lower, upper) in distinct_concentrations(points).tuple_windows() {
        let (limit, score) = problem.search(lower, upper)?;
        tracing::debug!(lower, upper, limit, score, "searched for limit of detection");
        if score < best.map_or(REJECTED, |(_, best_score)| best_score) {
            best = Some((limit, score));
        }
    }

    match best {
        Some((limit, score)) => {
            tracing::debug!(limit, score, "selected limit of detection");
            problem.curve_at(limit).ok_or_else(|| {
                Error::Optimisation(format!("limit of detection {limit} does not give a line"))
            })
        }
        None => {
            tracing::debug!("no limit of detection found, falling back to a line");
            Ok(RegressionFit::Linear
                .perform_fit(points)?
                .with_regression_fit(RegressionFit::Bilinear))
        }
    }
}
