use serde::{Deserialize, Serialize};

use crate::fit::RegressionFit;

/// The result of fitting a [`RegressionFit`] to a set of calibration points
///
/// Every coefficient is independently present or absent. Absent coefficients read as zero,
/// presence is queried through the matching `has_*` method. A curve carrying an error message
/// is a failed fit and its numeric fields are placeholders.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationCurve {
    regression_fit: RegressionFit,
    slope: Option<f64>,
    intercept: Option<f64>,
    quadratic_coefficient: Option<f64>,
    /// Limit of detection for bilinear curves
    turning_point: Option<f64>,
    point_count: Option<usize>,
    r_squared: Option<f64>,
    error_message: Option<String>,
}

impl CalibrationCurve {
    pub const fn new(regression_fit: RegressionFit) -> Self {
        Self {
            regression_fit,
            slope: None,
            intercept: None,
            quadratic_coefficient: None,
            turning_point: None,
            point_count: None,
            r_squared: None,
            error_message: None,
        }
    }

    /// The identity curve used when an analyte has no external standards
    pub const fn for_no_external_standards() -> Self {
        Self::new(RegressionFit::None)
            .with_point_count(0)
            .with_slope(1.0)
    }

    /// A failed fit of `regression_fit`
    pub fn failed(regression_fit: RegressionFit, message: impl Into<String>) -> Self {
        let mut curve = Self::new(regression_fit);
        curve.error_message = Some(message.into());
        curve
    }

    pub(crate) const fn with_slope(mut self, slope: f64) -> Self {
        self.slope = Some(slope);
        self
    }

    pub(crate) const fn with_intercept(mut self, intercept: f64) -> Self {
        self.intercept = Some(intercept);
        self
    }

    pub(crate) const fn with_quadratic_coefficient(mut self, quadratic_coefficient: f64) -> Self {
        self.quadratic_coefficient = Some(quadratic_coefficient);
        self
    }

    pub(crate) const fn with_turning_point(mut self, turning_point: f64) -> Self {
        self.turning_point = Some(turning_point);
        self
    }

    pub(crate) const fn with_point_count(mut self, point_count: usize) -> Self {
        self.point_count = Some(point_count);
        self
    }

    pub(crate) const fn with_r_squared(mut self, r_squared: Option<f64>) -> Self {
        self.r_squared = r_squared;
        self
    }

    pub(crate) const fn with_regression_fit(mut self, regression_fit: RegressionFit) -> Self {
        self.regression_fit = regression_fit;
        self
    }

    pub const fn regression_fit(&self) -> RegressionFit {
        self.regression_fit
    }

    pub fn slope(&self) -> f64 {
        self.slope.unwrap_or_default()
    }

    pub const fn has_slope(&self) -> bool {
        self.slope.is_some()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept.unwrap_or_default()
    }

    pub const fn has_intercept(&self) -> bool {
        self.intercept.is_some()
    }

    pub fn quadratic_coefficient(&self) -> f64 {
        self.quadratic_coefficient.unwrap_or_default()
    }

    pub const fn has_quadratic_coefficient(&self) -> bool {
        self.quadratic_coefficient.is_some()
    }

    pub fn turning_point(&self) -> f64 {
        self.turning_point.unwrap_or_default()
    }

    pub const fn has_turning_point(&self) -> bool {
        self.turning_point.is_some()
    }

    /// Number of observations used in the fit
    pub fn point_count(&self) -> usize {
        self.point_count.unwrap_or_default()
    }

    pub const fn has_point_count(&self) -> bool {
        self.point_count.is_some()
    }

    /// Coefficient of determination, `None` when no point could be evaluated
    pub const fn r_squared(&self) -> Option<f64> {
        self.r_squared
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub const fn is_error(&self) -> bool {
        self.error_message.is_some()
    }

    /// Response predicted at concentration `x`
    pub fn y_at(&self, x: f64) -> f64 {
        self.regression_fit.y_at(self, x)
    }

    /// Concentration producing response `y`
    ///
    /// `None` when the response lies in a region the curve cannot quantify. A finite answer is
    /// not guaranteed: a flat line inverts to an infinite or NaN concentration.
    pub fn x_at(&self, y: f64) -> Option<f64> {
        self.regression_fit.x_at(self, y)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::CalibrationCurve;
    use crate::fit::RegressionFit;

    #[test]
    fn absent_coefficients_read_as_zero() {
        let curve = CalibrationCurve::new(RegressionFit::Linear);

        assert!(!curve.has_slope());
        assert!(!curve.has_intercept());
        assert!(!curve.has_quadratic_coefficient());
        assert!(!curve.has_turning_point());
        assert!(!curve.has_point_count());
        assert_relative_eq!(curve.slope(), 0.0);
        assert_relative_eq!(curve.intercept(), 0.0);
        assert_eq!(curve.point_count(), 0);
        assert!(curve.r_squared().is_none());
        assert!(!curve.is_error());
    }

    #[test]
    fn zero_is_distinct_from_absent() {
        let curve = CalibrationCurve::new(RegressionFit::Linear).with_intercept(0.0);
        assert!(curve.has_intercept());
        assert_relative_eq!(curve.intercept(), 0.0);
    }

    #[test]
    fn no_external_standards_is_the_identity() {
        let curve = CalibrationCurve::for_no_external_standards();

        assert_eq!(curve.regression_fit(), RegressionFit::None);
        assert_eq!(curve.point_count(), 0);
        assert!(curve.has_point_count());
        assert!(!curve.has_intercept());
        for x in [-3.0, 0.0, 12.5, 1e9] {
            assert_relative_eq!(curve.y_at(x), x);
            assert_relative_eq!(curve.x_at(x).unwrap(), x);
        }
    }

    #[test]
    fn failed_curves_carry_their_message() {
        let curve = CalibrationCurve::failed(RegressionFit::Quadratic, "matrix is singular");

        assert!(curve.is_error());
        assert_eq!(curve.error_message(), Some("matrix is singular"));
        assert_eq!(curve.regression_fit(), RegressionFit::Quadratic);
    }

    #[test]
    fn evaluation_uses_the_originating_fit() {
        let curve = CalibrationCurve::new(RegressionFit::Quadratic)
            .with_intercept(1.0)
            .with_slope(2.0)
            .with_quadratic_coefficient(3.0);

        assert_relative_eq!(curve.y_at(2.0), 17.0);

        let linear = curve.clone().with_regression_fit(RegressionFit::Linear);
        assert_relative_eq!(linear.y_at(2.0), 5.0);
    }
}
