//! Weighted least squares solver.
//!
//! Solves
//!
//! ```text
//! minimize Σ w_i (y_i - x_i^T β)^2
//! ```
//!
//! by scaling each row of the design (and the response) by `sqrt(w_i)` and solving the resulting
//! ordinary least squares problem with an SVD. Columns are scaled to unit max-abs before the
//! decomposition and the coefficients scaled back afterwards. The designs used for calibration are
//! tall and narrow (at most three columns) so the decomposition is cheap.
use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2};

use crate::{Error, Result};

/// Iteration cap for the singular value decomposition
const MAX_SVD_ITERATIONS: usize = 1_000;

/// Fit `response` against the columns of `predictors` with per-observation `weights`
///
/// Returns the coefficient vector `[intercept, β_1, .., β_k]` when `include_intercept` is set,
/// `[β_1, .., β_k]` otherwise.
///
/// # Errors
/// Returns an error when the inputs disagree in length, contain non-finite values or negative
/// weights, when there are fewer observations than parameters, or when the weighted design is
/// rank deficient.
///
/// # Examples
///
/// ```
/// use calibration_curve::least_squares::weighted_regression;
/// use ndarray::{arr1, arr2};
///
/// let x = arr2(&[[0.0], [1.0], [2.0]]);
/// let y = arr1(&[2.0, 5.0, 8.0]);
/// let w = arr1(&[1.0, 1.0, 1.0]);
///
/// let beta = weighted_regression(&x, &y, &w, true).unwrap();
/// assert!((beta[0] - 2.0).abs() < 1e-10);
/// assert!((beta[1] - 3.0).abs() < 1e-10);
/// ```
#[allow(clippy::cast_precision_loss)]
pub fn weighted_regression(
    predictors: &Array2<f64>,
    response: &Array1<f64>,
    weights: &Array1<f64>,
    include_intercept: bool,
) -> Result<Array1<f64>> {
    let (observations, num_predictors) = predictors.dim();
    if response.len() != observations || weights.len() != observations {
        return Err(Error::DimensionMismatch(format!(
            "{observations} predictor rows, {} responses, {} weights",
            response.len(),
            weights.len()
        )));
    }

    if let Some((index, &weight)) = weights
        .iter()
        .enumerate()
        .find(|(_, weight)| !weight.is_finite() || **weight < 0.0)
    {
        return Err(Error::InvalidWeight { index, weight });
    }

    if let Some(index) = predictors
        .rows()
        .into_iter()
        .zip(response)
        .position(|(row, y)| !y.is_finite() || row.iter().any(|x| !x.is_finite()))
    {
        return Err(Error::NonFiniteObservation(index));
    }

    let offset = usize::from(include_intercept);
    let parameters = num_predictors + offset;
    if parameters == 0 {
        return Err(Error::DimensionMismatch(
            "regression without predictors or intercept".to_owned(),
        ));
    }
    if observations < parameters {
        return Err(Error::InsufficientData {
            observations,
            parameters,
        });
    }

    let scale = weights.mapv(f64::sqrt);
    let weighted = DMatrix::from_fn(observations, parameters, |row, col| {
        let value = if col < offset {
            1.0
        } else {
            predictors[[row, col - offset]]
        };
        value * scale[row]
    });
    let rhs = DVector::from_fn(observations, |row, _| response[row] * scale[row]);

    // Large weights can push finite observations out of range
    if let Some(index) = (0..observations)
        .find(|&row| !rhs[row].is_finite() || weighted.row(row).iter().any(|v| !v.is_finite()))
    {
        return Err(Error::NonFiniteObservation(index));
    }

    // Equilibrate the columns so the rank test does not depend on the units of the predictors
    let column_scales = weighted
        .column_iter()
        .map(|column| column.amax())
        .map(|amax| if amax > 0.0 { amax } else { 1.0 })
        .collect::<Vec<f64>>();
    let design = DMatrix::from_fn(observations, parameters, |row, col| {
        weighted[(row, col)] / column_scales[col]
    });

    let svd = design
        .try_svd(true, true, f64::EPSILON, MAX_SVD_ITERATIONS)
        .ok_or(Error::Solve("singular value decomposition did not converge"))?;
    let tolerance =
        svd.singular_values.max() * f64::EPSILON * observations.max(parameters) as f64;
    let rank = svd.rank(tolerance);
    if rank < parameters {
        return Err(Error::SingularMatrix { rank, parameters });
    }

    let solution = svd.solve(&rhs, tolerance).map_err(Error::Solve)?;
    Ok(solution
        .iter()
        .zip(&column_scales)
        .map(|(beta, column_scale)| beta / column_scale)
        .collect())
}
