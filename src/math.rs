use std::iter::successors;

use ndarray::{s, Array, Array1, Array2};
use num_traits::{Float, NumCast};

use crate::Result;

/// Generate the Vandermonde matrix of `degree` for observations `x`
///
/// The Vandermonde matrix is a (n x degree + 1) matrix. Each row of the matrix is a geometric
/// progression for an individual observation `x` from power `0` to `degree` inclusive.
///
/// # Examples
///
/// ```
/// use calibration_curve::math::vandermonde;
/// use ndarray::arr2;
///
/// let observations: Vec<f64> = vec![2., 3.];
/// let vander = vandermonde(&observations, 2).unwrap();
///
/// let expected = arr2(&[[1., 2., 4.], [1., 3., 9.]]);
/// assert_eq!(vander, expected);
/// ```
///
/// # Errors
/// Returns an error if the generated values cannot be arranged into the requested shape.
pub fn vandermonde<T: Float>(x: &[T], degree: usize) -> Result<Array2<T>> {
    let vals = x.iter().flat_map(|&xi| {
        successors(Some(T::one()), move |&power| Some(power * xi)).take(degree + 1)
    });

    Ok(Array::from_iter(vals).into_shape((x.len(), degree + 1))?)
}

/// Predictor columns `[x, x^2, .., x^degree]` for a polynomial regression
///
/// This is the Vandermonde matrix with the constant column removed, the intercept is handled
/// by the least squares solver.
///
/// # Examples
///
/// ```
/// use calibration_curve::math::polynomial_predictors;
/// use ndarray::arr2;
///
/// let predictors = polynomial_predictors(&[2.0f64, 3.0], 2).unwrap();
/// assert_eq!(predictors, arr2(&[[2., 4.], [3., 9.]]));
/// ```
///
/// # Errors
/// Returns an error if the underlying Vandermonde matrix cannot be built.
pub fn polynomial_predictors<T: Float>(x: &[T], degree: usize) -> Result<Array2<T>> {
    Ok(vandermonde(x, degree)?.slice(s![.., 1..]).to_owned())
}

/// Arithmetic mean of `values`, `None` when empty
pub fn mean<T: Float>(values: &Array1<T>) -> Option<T> {
    if values.is_empty() {
        return None;
    }
    Some(values.sum() / <T as NumCast>::from(values.len())?)
}
