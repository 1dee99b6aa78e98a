use std::fmt;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::curve::CalibrationCurve;
use crate::least_squares::weighted_regression;
use crate::math::{mean, polynomial_predictors};
use crate::minimisation::fit_bilinear;
use crate::{Error, Result};

/// A single calibration observation
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WeightedPoint {
    /// Concentration of the standard after dilution correction
    pub x: f64,
    /// Normalized response
    pub y: f64,
    pub weight: f64,
}

impl WeightedPoint {
    pub const fn new(x: f64, y: f64, weight: f64) -> Self {
        Self { x, y, weight }
    }

    fn ln(&self) -> Self {
        Self {
            x: self.x.ln(),
            y: self.y.ln(),
            weight: self.weight,
        }
    }
}

/// Split points into the abscissae, response and weight columns of a regression
fn columns(points: &[WeightedPoint]) -> (Vec<f64>, Array1<f64>, Array1<f64>) {
    (
        points.iter().map(|point| point.x).collect(),
        points.iter().map(|point| point.y).collect(),
        points.iter().map(|point| point.weight).collect(),
    )
}

/// The model relating concentration to response
///
/// Each variant knows how to fit a set of points into a [`CalibrationCurve`] and how to evaluate
/// or invert a curve it produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RegressionFit {
    /// No external standards, concentration is the response itself
    #[default]
    None,
    Linear,
    LinearThroughZero,
    Quadratic,
    /// Linear fit of `ln y` against `ln x`
    LinearInLogSpace,
    /// Flat below a limit of detection, linear above it
    Bilinear,
}

impl RegressionFit {
    pub const fn list_all() -> [Self; 6] {
        [
            Self::None,
            Self::LinearThroughZero,
            Self::Linear,
            Self::Bilinear,
            Self::Quadratic,
            Self::LinearInLogSpace,
        ]
    }

    /// Stable key used in settings files
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Linear => "linear",
            Self::LinearThroughZero => "linear_through_zero",
            Self::Quadratic => "quadratic",
            Self::LinearInLogSpace => "linear_in_log_space",
            Self::Bilinear => "bilinear",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Linear => "Linear",
            Self::LinearThroughZero => "Linear through zero",
            Self::Quadratic => "Quadratic",
            Self::LinearInLogSpace => "Linear in Log Space",
            Self::Bilinear => "Bilinear",
        }
    }

    /// Resolve a fit from its key, unknown keys resolve to [`RegressionFit::None`]
    pub fn parse(name: &str) -> Self {
        Self::list_all()
            .into_iter()
            .find(|fit| fit.name() == name)
            .unwrap_or_default()
    }

    /// Fit `points`, never fails
    ///
    /// Any failure is reported through [`CalibrationCurve::error_message`].
    pub fn fit(self, points: &[WeightedPoint]) -> CalibrationCurve {
        self.try_fit(points).unwrap_or_else(|err| {
            tracing::debug!("{} fit over {} points failed: {err}", self.name(), points.len());
            CalibrationCurve::failed(self, err.to_string())
        })
    }

    fn try_fit(self, points: &[WeightedPoint]) -> Result<CalibrationCurve> {
        if points.is_empty() {
            return match self {
                Self::None => Ok(CalibrationCurve::for_no_external_standards()),
                _ => Err(Error::NoDataPoints),
            };
        }

        let curve = self.perform_fit(points)?;
        let r_squared = self.r_squared(&curve, points);
        Ok(curve.with_r_squared(r_squared))
    }

    pub(crate) fn perform_fit(self, points: &[WeightedPoint]) -> Result<CalibrationCurve> {
        match self {
            Self::None => Ok(CalibrationCurve::for_no_external_standards()),
            Self::Linear => fit_line(points, true),
            Self::LinearThroughZero => fit_line(points, false),
            Self::Quadratic => fit_quadratic(points),
            Self::LinearInLogSpace => {
                if points.iter().any(|point| point.x <= 0.0 || point.y <= 0.0) {
                    return Err(Error::NonPositivePoint);
                }
                let log_points = points.iter().map(WeightedPoint::ln).collect::<Vec<_>>();
                Ok(fit_line(&log_points, true)?.with_regression_fit(self))
            }
            Self::Bilinear => fit_bilinear(points),
        }
    }

    /// Coefficient of determination of `curve` over `points`
    ///
    /// The log space fit is scored on the log transformed points it was regressed on.
    fn r_squared(self, curve: &CalibrationCurve, points: &[WeightedPoint]) -> Option<f64> {
        match self {
            Self::LinearInLogSpace => {
                let log_points = points.iter().map(WeightedPoint::ln).collect::<Vec<_>>();
                coefficient_of_determination(&log_points, |x| Self::Linear.y_at(curve, x))
            }
            _ => coefficient_of_determination(points, |x| curve.y_at(x)),
        }
    }

    /// Response of `curve` at concentration `x`, interpreting the curve as this variant
    pub fn y_at(self, curve: &CalibrationCurve, x: f64) -> f64 {
        match self {
            Self::None | Self::Linear | Self::LinearThroughZero => {
                curve.slope().mul_add(x, curve.intercept())
            }
            Self::Quadratic => curve
                .quadratic_coefficient()
                .mul_add(x * x, curve.slope().mul_add(x, curve.intercept())),
            Self::LinearInLogSpace => Self::Linear.y_at(curve, x.ln()).exp(),
            Self::Bilinear => {
                let x = if curve.has_turning_point() && x < curve.turning_point() {
                    curve.turning_point()
                } else {
                    x
                };
                Self::Linear.y_at(curve, x)
            }
        }
    }

    /// Concentration at which `curve` produces `y`, interpreting the curve as this variant
    ///
    /// Returns `None` for a bilinear curve when `y` lies in the flat region below the turning
    /// point. A quadratic with no real root gives `Some(NaN)`.
    pub fn x_at(self, curve: &CalibrationCurve, y: f64) -> Option<f64> {
        match self {
            Self::None | Self::Linear | Self::LinearThroughZero => {
                Some((y - curve.intercept()) / curve.slope())
            }
            Self::Quadratic => {
                let a = curve.quadratic_coefficient();
                let b = curve.slope();
                let c = curve.intercept();
                let discriminant = b.mul_add(b, -4.0 * a * (c - y));
                if discriminant < 0.0 {
                    return Some(f64::NAN);
                }
                Some((-b + discriminant.sqrt()) / 2.0 / a)
            }
            Self::LinearInLogSpace => Self::Linear.x_at(curve, y.ln()).map(f64::exp),
            Self::Bilinear => Self::Linear
                .x_at(curve, y)
                .filter(|&x| !(curve.has_turning_point() && x < curve.turning_point())),
        }
    }
}

fn fit_line(points: &[WeightedPoint], include_intercept: bool) -> Result<CalibrationCurve> {
    let (x, y, w) = columns(points);
    let beta = weighted_regression(&polynomial_predictors(&x, 1)?, &y, &w, include_intercept)?;

    let regression_fit = if include_intercept {
        RegressionFit::Linear
    } else {
        RegressionFit::LinearThroughZero
    };
    let curve = CalibrationCurve::new(regression_fit).with_point_count(points.len());
    Ok(if include_intercept {
        curve.with_intercept(beta[0]).with_slope(beta[1])
    } else {
        curve.with_slope(beta[0])
    })
}

fn fit_quadratic(points: &[WeightedPoint]) -> Result<CalibrationCurve> {
    let (x, y, w) = columns(points);
    let beta = weighted_regression(&polynomial_predictors(&x, 2)?, &y, &w, true)?;

    Ok(CalibrationCurve::new(RegressionFit::Quadratic)
        .with_point_count(points.len())
        .with_intercept(beta[0])
        .with_slope(beta[1])
        .with_quadratic_coefficient(beta[2]))
}

/// `1 - SS_res / SS_tot` over the points whose fitted response is finite
///
/// `None` when no point has a finite fitted response. A flat response (`SS_tot == 0`) also gives
/// `None`, there is no variance for the curve to explain.
fn coefficient_of_determination(
    points: &[WeightedPoint],
    fitted: impl Fn(f64) -> f64,
) -> Option<f64> {
    let (observed, residuals): (Vec<f64>, Vec<f64>) = points
        .iter()
        .filter_map(|point| {
            let y_fitted = fitted(point.x);
            y_fitted
                .is_finite()
                .then_some((point.y, point.y - y_fitted))
        })
        .unzip();
    let observed = Array1::from(observed);
    let residuals = Array1::from(residuals);

    let y_mean = mean(&observed)?;
    let total_sum_of_squares = observed.mapv(|y| (y - y_mean).powi(2)).sum();
    if total_sum_of_squares <= 0.0 {
        return None;
    }
    Some(1.0 - residuals.dot(&residuals) / total_sum_of_squares)
}

impl fmt::Display for RegressionFit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<&str> for RegressionFit {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<String> for RegressionFit {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<RegressionFit> for String {
    fn from(value: RegressionFit) -> Self {
        value.name().to_owned()
    }
}
