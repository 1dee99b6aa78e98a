#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
// #![warn(clippy::cargo)]

pub mod calibration;
pub mod curve;
pub mod error;
pub mod fit;
pub mod least_squares;
pub mod math;
pub(crate) mod minimisation;
pub mod replicate;
pub mod weighting;

pub use calibration::{CalibrationCurveDataSet, QuantificationSettings};
pub use curve::CalibrationCurve;
pub use error::Error;
pub use fit::{RegressionFit, WeightedPoint};
pub use replicate::{
    NormalizationMethod, Replicate, SampleType, TransitionAreas, TransitionKey, TransitionKeys,
};
pub use weighting::RegressionWeighting;

pub type Result<T> = ::std::result::Result<T, Error>;
