use std::fmt;

use serde::{Deserialize, Serialize};

/// Weighting applied to each calibration point in the regression
///
/// The variance-stabilising policies assume the variance of the response grows with the
/// concentration. They are undefined at or below zero concentration, so such points receive a
/// weight of zero and do not pull on the fit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RegressionWeighting {
    /// Every point carries unit weight
    #[default]
    None,
    /// Weight proportional to `1 / x`
    OneOverX,
    /// Weight proportional to `1 / x^2`
    OneOverXSquared,
}

impl RegressionWeighting {
    pub const fn list_all() -> [Self; 3] {
        [Self::None, Self::OneOverX, Self::OneOverXSquared]
    }

    /// Stable key used in settings files
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::OneOverX => "1/x",
            Self::OneOverXSquared => "1/(x*x)",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::OneOverX => "1 / x",
            Self::OneOverXSquared => "1 / (x^2)",
        }
    }

    /// Resolve a weighting from its key, unknown keys fall back to [`RegressionWeighting::None`]
    pub fn parse(name: &str) -> Self {
        Self::list_all()
            .into_iter()
            .find(|weighting| weighting.name() == name)
            .unwrap_or_default()
    }

    /// Weight of the point `(x, y)`
    ///
    /// Always finite and non-negative for finite input.
    pub fn weight(self, x: f64, _y: f64) -> f64 {
        let weight = match self {
            Self::None => return 1.0,
            Self::OneOverX => x.recip(),
            Self::OneOverXSquared => (x * x).recip(),
        };
        if x > 0.0 && weight.is_finite() {
            weight
        } else {
            0.0
        }
    }
}

impl fmt::Display for RegressionWeighting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<&str> for RegressionWeighting {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<String> for RegressionWeighting {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<RegressionWeighting> for String {
    fn from(value: RegressionWeighting) -> Self {
        value.name().to_owned()
    }
}
