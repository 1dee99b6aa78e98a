use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::curve::CalibrationCurve;
use crate::fit::{RegressionFit, WeightedPoint};
use crate::replicate::{NormalizationMethod, Replicate, SampleType, TransitionKeys};
use crate::weighting::RegressionWeighting;
use crate::Result;

/// Quantification options for an analyte, as stored on disk
///
/// ```toml
/// regression_fit = "bilinear"
/// regression_weighting = "1/x"
/// normalization_method = "ratio_to_heavy"
/// ```
///
/// Every field is optional and defaults to `none`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct QuantificationSettings {
    pub regression_fit: RegressionFit,
    pub regression_weighting: RegressionWeighting,
    pub normalization_method: NormalizationMethod,
}

impl QuantificationSettings {
    /// Read settings from a TOML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is not valid TOML or names an unknown
    /// normalization method.
    pub fn from_file(path: &Path) -> Result<Self> {
        let settings = fs::read_to_string(path)?;
        let settings = toml::from_str(&settings)?;
        tracing::debug!("read quantification settings from {}", path.display());
        Ok(settings)
    }
}

/// The replicates of one analyte and how to turn them into a calibration curve
#[derive(Clone, Debug, Default)]
pub struct CalibrationCurveDataSet {
    normalization_method: NormalizationMethod,
    regression_fit: RegressionFit,
    regression_weighting: RegressionWeighting,
    replicates: Vec<Replicate>,
}

impl CalibrationCurveDataSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &QuantificationSettings) -> Self {
        Self {
            normalization_method: settings.normalization_method.clone(),
            regression_fit: settings.regression_fit,
            regression_weighting: settings.regression_weighting,
            replicates: vec![],
        }
    }

    /// Append a replicate and return it so its areas can be filled in
    pub fn add_replicate(
        &mut self,
        sample_type: SampleType,
        analyte_concentration: Option<f64>,
        sample_dilution_factor: f64,
        exclude_from_calibration: bool,
    ) -> &mut Replicate {
        self.replicates.push(Replicate::new(
            sample_type,
            analyte_concentration,
            sample_dilution_factor,
            exclude_from_calibration,
        ));
        let last = self.replicates.len() - 1;
        &mut self.replicates[last]
    }

    pub fn replicates(&self) -> &[Replicate] {
        &self.replicates
    }

    pub const fn normalization_method(&self) -> &NormalizationMethod {
        &self.normalization_method
    }

    pub fn set_normalization_method(&mut self, normalization_method: NormalizationMethod) {
        self.normalization_method = normalization_method;
    }

    pub const fn regression_fit(&self) -> RegressionFit {
        self.regression_fit
    }

    pub fn set_regression_fit(&mut self, regression_fit: RegressionFit) {
        self.regression_fit = regression_fit;
    }

    pub const fn regression_weighting(&self) -> RegressionWeighting {
        self.regression_weighting
    }

    pub fn set_regression_weighting(&mut self, regression_weighting: RegressionWeighting) {
        self.regression_weighting = regression_weighting;
    }

    /// Fit the calibration curve of `label`
    ///
    /// Only standards which are not excluded, carry a concentration and have a response for
    /// `label` contribute a point. Failures are reported on the returned curve.
    pub fn calibration_curve(&self, label: &str) -> CalibrationCurve {
        if self.regression_fit == RegressionFit::None {
            return CalibrationCurve::for_no_external_standards();
        }

        let features = self.features_to_quantify_on(label);
        let points = self
            .replicates
            .iter()
            .filter(|replicate| {
                replicate.sample_type() == SampleType::Standard
                    && !replicate.is_excluded_from_calibration()
            })
            .filter_map(|replicate| {
                let x = replicate.analyte_concentration()?;
                let y = replicate.normalized_area(
                    &self.normalization_method,
                    label,
                    features.as_ref(),
                )?;
                Some(self.weighted_point(x, y))
            })
            .collect::<Vec<_>>();
        tracing::debug!(
            "{} of {} replicates contribute to the {label} curve",
            points.len(),
            self.replicates.len()
        );

        let curve = self.regression_fit.fit(&points);
        if let Some(message) = curve.error_message() {
            tracing::warn!("{} fit of {label} failed: {message}", self.regression_fit.name());
        }
        curve
    }

    pub fn weighted_point(&self, x: f64, y: f64) -> WeightedPoint {
        WeightedPoint::new(x, y, self.regression_weighting.weight(x, y))
    }

    /// Transitions measured for `label` in any standard with a concentration
    ///
    /// `None` means every transition is used, which is the case when normalizing to a label.
    pub fn features_to_quantify_on(&self, label: &str) -> Option<TransitionKeys> {
        if matches!(self.normalization_method, NormalizationMethod::RatioToLabel(_)) {
            return None;
        }

        Some(
            self.replicates
                .iter()
                .filter(|replicate| {
                    replicate.sample_type() == SampleType::Standard
                        && replicate.analyte_concentration().is_some()
                })
                .filter_map(|replicate| replicate.transition_areas(label))
                .flat_map(|areas| areas.keys())
                .collect(),
        )
    }

    /// Back-calculate the concentration of `replicate` from `curve`
    ///
    /// `None` when there is no usable curve, the replicate has no response for `label`, or the
    /// response lies where the curve cannot be inverted.
    pub fn calculated_concentration(
        &self,
        label: &str,
        curve: Option<&CalibrationCurve>,
        replicate: &Replicate,
    ) -> Option<f64> {
        let features = self.features_to_quantify_on(label);
        self.back_calculate(label, curve?, features.as_ref(), replicate)
    }

    /// Back-calculated concentrations of every replicate, in insertion order
    pub fn calculated_concentrations(
        &self,
        label: &str,
        curve: &CalibrationCurve,
    ) -> Vec<Option<f64>> {
        let features = self.features_to_quantify_on(label);
        self.replicates
            .iter()
            .map(|replicate| self.back_calculate(label, curve, features.as_ref(), replicate))
            .collect()
    }

    fn back_calculate(
        &self,
        label: &str,
        curve: &CalibrationCurve,
        features: Option<&TransitionKeys>,
        replicate: &Replicate,
    ) -> Option<f64> {
        if curve.is_error() {
            return None;
        }
        let y = replicate.normalized_area(&self.normalization_method, label, features)?;
        curve
            .x_at(y)
            .map(|x| x * replicate.sample_dilution_factor())
    }
}
