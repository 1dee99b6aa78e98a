use thiserror::Error;

/// Failures raised while building or solving a calibration problem
///
/// Inside the fitting path these never reach the caller: [`crate::RegressionFit::fit`] turns
/// them into a [`crate::CalibrationCurve`] carrying the message. They surface directly only from
/// the numeric primitives and from configuration loading.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unable to calculate curve, since there are no data points available")]
    NoDataPoints,

    #[error(
        "Unable to do a regression in log space because one or more points are non-positive."
    )]
    NonPositivePoint,

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("Not enough data: {observations} observations for {parameters} parameters")]
    InsufficientData {
        observations: usize,
        parameters: usize,
    },

    #[error("Matrix is singular (rank {rank} of {parameters})")]
    SingularMatrix { rank: usize, parameters: usize },

    #[error("Observation {0} is not finite")]
    NonFiniteObservation(usize),

    #[error("Invalid weight {weight} for observation {index}")]
    InvalidWeight { index: usize, weight: f64 },

    #[error("Least squares solve failed: {0}")]
    Solve(&'static str),

    #[error("Optimisation failed: {0}")]
    Optimisation(String),

    #[error("Unknown normalization method: {0}")]
    UnknownNormalizationMethod(String),

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<argmin::core::Error> for Error {
    fn from(value: argmin::core::Error) -> Self {
        Self::Optimisation(value.to_string())
    }
}
