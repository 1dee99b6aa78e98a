use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleType {
    #[default]
    Unknown,
    Standard,
    QualityControl,
    Solvent,
    Blank,
    DoubleBlank,
}

impl SampleType {
    pub const fn list_all() -> [Self; 6] {
        [
            Self::Unknown,
            Self::Standard,
            Self::QualityControl,
            Self::Solvent,
            Self::Blank,
            Self::DoubleBlank,
        ]
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Standard => "standard",
            Self::QualityControl => "quality_control",
            Self::Solvent => "solvent",
            Self::Blank => "blank",
            Self::DoubleBlank => "double_blank",
        }
    }

    /// Resolve a sample type from its name, unknown names are treated as [`SampleType::Unknown`]
    pub fn parse(name: &str) -> Self {
        Self::list_all()
            .into_iter()
            .find(|sample_type| sample_type.name() == name)
            .unwrap_or_default()
    }
}

/// Identifies one measured transition of an analyte
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransitionKey(pub String);

impl From<&str> for TransitionKey {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

pub type TransitionKeys = BTreeSet<TransitionKey>;

/// Integrated peak areas of the transitions measured for one label in one replicate
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitionAreas(BTreeMap<TransitionKey, f64>);

impl TransitionAreas {
    pub fn insert(&mut self, key: TransitionKey, area: f64) {
        self.0.insert(key, area);
    }

    pub fn get(&self, key: &TransitionKey) -> Option<f64> {
        self.0.get(key).copied()
    }

    pub fn keys(&self) -> TransitionKeys {
        self.0.keys().cloned().collect()
    }

    /// The areas of the transitions in `keys`
    #[must_use]
    pub fn restrict(&self, keys: &TransitionKeys) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(key, _)| keys.contains(*key))
                .map(|(key, &area)| (key.clone(), area))
                .collect(),
        )
    }

    /// Total area, `None` when no transition was measured
    pub fn sum(&self) -> Option<f64> {
        (!self.0.is_empty()).then(|| self.0.values().sum())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Summed area over the transitions shared with `denominator`, divided by the summed area of
    /// those transitions in `denominator`
    pub fn ratio_to(&self, denominator: &Self) -> Option<f64> {
        let (numerator, denominator) = self
            .0
            .iter()
            .filter_map(|(key, &area)| denominator.get(key).map(|other| (area, other)))
            .fold(None, |acc: Option<(f64, f64)>, (area, other)| {
                let (numerator, denominator) = acc.unwrap_or_default();
                Some((numerator + area, denominator + other))
            })?;
        (denominator != 0.0).then(|| numerator / denominator)
    }
}

impl FromIterator<(TransitionKey, f64)> for TransitionAreas {
    fn from_iter<T: IntoIterator<Item = (TransitionKey, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// How raw transition areas are turned into the response used for calibration
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NormalizationMethod {
    /// Use the summed area as is
    #[default]
    None,
    /// Divide by the matching transitions of an internal standard label
    RatioToLabel(String),
    /// Divide by the summed area of the global standards in the replicate
    GlobalStandards,
    /// Shift by the replicate's log2 median adjustment
    EqualizeMedians,
}

const RATIO_PREFIX: &str = "ratio_to_";

impl NormalizationMethod {
    pub fn name(&self) -> String {
        match self {
            Self::None => "none".to_owned(),
            Self::RatioToLabel(label) => format!("{RATIO_PREFIX}{label}"),
            Self::GlobalStandards => "global_standards".to_owned(),
            Self::EqualizeMedians => "equalize_medians".to_owned(),
        }
    }

    /// Resolve a normalization method from its name
    ///
    /// # Errors
    /// Returns [`Error::UnknownNormalizationMethod`] for unrecognised names.
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "none" => Ok(Self::None),
            "global_standards" => Ok(Self::GlobalStandards),
            "equalize_medians" => Ok(Self::EqualizeMedians),
            _ => name
                .strip_prefix(RATIO_PREFIX)
                .filter(|label| !label.is_empty())
                .map(|label| Self::RatioToLabel(label.to_owned()))
                .ok_or_else(|| Error::UnknownNormalizationMethod(name.to_owned())),
        }
    }
}

impl fmt::Display for NormalizationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl TryFrom<String> for NormalizationMethod {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<NormalizationMethod> for String {
    fn from(value: NormalizationMethod) -> Self {
        value.name()
    }
}

/// One injection contributing to a calibration data set
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Replicate {
    sample_type: SampleType,
    /// Concentration before dilution correction
    analyte_concentration: Option<f64>,
    sample_dilution_factor: f64,
    exclude_from_calibration: bool,
    /// Transition areas keyed by isotope label
    areas: HashMap<String, TransitionAreas>,
    global_standard_area: Option<f64>,
    median_adjustment: Option<f64>,
}

impl Replicate {
    pub fn new(
        sample_type: SampleType,
        analyte_concentration: Option<f64>,
        sample_dilution_factor: f64,
        exclude_from_calibration: bool,
    ) -> Self {
        Self {
            sample_type,
            analyte_concentration,
            sample_dilution_factor,
            exclude_from_calibration,
            areas: HashMap::new(),
            global_standard_area: None,
            median_adjustment: None,
        }
    }

    pub const fn sample_type(&self) -> SampleType {
        self.sample_type
    }

    /// Concentration corrected for the sample dilution
    pub fn analyte_concentration(&self) -> Option<f64> {
        self.analyte_concentration
            .map(|concentration| concentration / self.sample_dilution_factor)
    }

    pub const fn sample_dilution_factor(&self) -> f64 {
        self.sample_dilution_factor
    }

    pub const fn is_excluded_from_calibration(&self) -> bool {
        self.exclude_from_calibration
    }

    /// Record the area of transition `key` measured for `label`
    pub fn set_area(&mut self, label: &str, key: impl Into<TransitionKey>, area: f64) -> &mut Self {
        self.areas
            .entry(label.to_owned())
            .or_default()
            .insert(key.into(), area);
        self
    }

    pub fn set_global_standard_area(&mut self, area: f64) -> &mut Self {
        self.global_standard_area = Some(area);
        self
    }

    /// Record the log2 shift which brings this replicate's median onto the common median
    pub fn set_median_adjustment(&mut self, adjustment: f64) -> &mut Self {
        self.median_adjustment = Some(adjustment);
        self
    }

    pub fn transition_areas(&self, label: &str) -> Option<&TransitionAreas> {
        self.areas.get(label)
    }

    /// Response of `label` under `method`
    ///
    /// When `keys` is given only those transitions contribute. `None` when no contributing
    /// transition was measured or the normalizing quantity is missing or zero.
    pub fn normalized_area(
        &self,
        method: &NormalizationMethod,
        label: &str,
        keys: Option<&TransitionKeys>,
    ) -> Option<f64> {
        let areas = self.transition_areas(label)?;
        let restricted;
        let areas = match keys {
            Some(keys) => {
                restricted = areas.restrict(keys);
                &restricted
            }
            None => areas,
        };

        match method {
            NormalizationMethod::None => areas.sum(),
            NormalizationMethod::RatioToLabel(standard) => {
                areas.ratio_to(self.transition_areas(standard)?)
            }
            NormalizationMethod::GlobalStandards => {
                let global = self.global_standard_area.filter(|&area| area != 0.0)?;
                Some(areas.sum()? / global)
            }
            NormalizationMethod::EqualizeMedians => {
                Some(areas.sum()? * self.median_adjustment?.exp2())
            }
        }
    }
}
