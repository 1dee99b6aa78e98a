use std::path::Path;

use approx::assert_relative_eq;
use ndarray_rand::rand::{Rng, SeedableRng};
use rand_isaac::Isaac64Rng;
use serde::Deserialize;
use tempdir::TempDir;

use calibration_curve::{
    CalibrationCurveDataSet, Error, NormalizationMethod, QuantificationSettings, RegressionFit,
    RegressionWeighting, Result, SampleType, WeightedPoint,
};

#[derive(Deserialize)]
struct Row {
    x: f64,
    y: f64,
    weight: f64,
}

fn read_points(path: &Path) -> Vec<WeightedPoint> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .unwrap();

    rdr.deserialize()
        .map(|result| {
            let row: Row = result.unwrap();
            WeightedPoint::new(row.x, row.y, row.weight)
        })
        .collect()
}

fn write_settings(working_dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = working_dir.path().join("quantification.toml");
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn bilinear_fit_matches_reference_series() {
    let fixture = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data/lkpalaviller.csv");
    let points = read_points(&fixture);
    assert_eq!(points.len(), 42);

    let curve = RegressionFit::Bilinear.fit(&points);

    assert!(!curve.is_error(), "{:?}", curve.error_message());
    assert_eq!(curve.regression_fit(), RegressionFit::Bilinear);
    assert_eq!(curve.point_count(), 42);
    assert_relative_eq!(curve.turning_point(), 11_673.593_881_022_069, epsilon = 1.0);
    assert_relative_eq!(curve.slope(), 1.277_107_076_4e-12, epsilon = 1e-15);
    assert_relative_eq!(curve.intercept(), -1.411_899_363_3e-8, epsilon = 1e-12);
    assert!(curve.r_squared().is_some());

    // Below the limit of detection the response is flat and cannot be inverted
    assert_relative_eq!(curve.y_at(0.0), curve.y_at(curve.turning_point()));
    assert!(curve.x_at(curve.y_at(5_000.0) * 0.5).is_none());
    assert_relative_eq!(curve.x_at(curve.y_at(20_000.0)).unwrap(), 20_000.0, max_relative = 1e-9);
}

#[test]
fn settings_are_read_from_disk() -> Result<()> {
    let working_dir = TempDir::new("settings_are_read_from_disk").unwrap();
    let path = write_settings(
        &working_dir,
        "regression_fit = \"quadratic\"\nregression_weighting = \"1/(x*x)\"\nnormalization_method = \"ratio_to_heavy\"\n",
    );

    let settings = QuantificationSettings::from_file(&path)?;

    assert_eq!(settings.regression_fit, RegressionFit::Quadratic);
    assert_eq!(settings.regression_weighting, RegressionWeighting::OneOverXSquared);
    assert_eq!(
        settings.normalization_method,
        NormalizationMethod::RatioToLabel("heavy".to_owned())
    );
    Ok(())
}

#[test]
fn missing_settings_default_to_none() -> Result<()> {
    let working_dir = TempDir::new("missing_settings_default_to_none").unwrap();
    let path = write_settings(&working_dir, "regression_fit = \"smoothing_spline\"\n");

    let settings = QuantificationSettings::from_file(&path)?;

    assert_eq!(settings, QuantificationSettings::default());
    Ok(())
}

#[test]
fn unknown_normalization_is_a_configuration_error() {
    let working_dir = TempDir::new("unknown_normalization").unwrap();
    let path = write_settings(&working_dir, "normalization_method = \"ratio_to\"\n");

    let result = QuantificationSettings::from_file(&path);

    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn absent_settings_file_is_an_io_error() {
    let working_dir = TempDir::new("absent_settings").unwrap();

    let result = QuantificationSettings::from_file(&working_dir.path().join("missing.toml"));

    assert!(matches!(result, Err(Error::Io(_))));
}

#[test]
fn settings_round_trip_through_toml() -> Result<()> {
    let settings = QuantificationSettings {
        regression_fit: RegressionFit::LinearInLogSpace,
        regression_weighting: RegressionWeighting::OneOverX,
        normalization_method: NormalizationMethod::EqualizeMedians,
    };
    let working_dir = TempDir::new("settings_round_trip").unwrap();
    let path = write_settings(&working_dir, &toml::to_string(&settings).unwrap());

    assert_eq!(QuantificationSettings::from_file(&path)?, settings);
    Ok(())
}

/// A dilution series with heavy labelled internal standard, configured from disk
#[test]
fn ratio_normalized_series_quantifies_unknowns() -> Result<()> {
    let working_dir = TempDir::new("ratio_normalized_series").unwrap();
    let path = write_settings(
        &working_dir,
        "regression_fit = \"linear\"\nregression_weighting = \"1/x\"\nnormalization_method = \"ratio_to_heavy\"\n",
    );
    let settings = QuantificationSettings::from_file(&path)?;
    let mut data_set = CalibrationCurveDataSet::from_settings(&settings);

    let seed = 40;
    let mut rng = Isaac64Rng::seed_from_u64(seed);
    let heavy_area = 1e5;
    let response_factor = 0.02;

    for concentration in [0.5, 1.0, 2.5, 5.0, 10.0, 25.0, 50.0] {
        // The light area tracks the concentration, the split across transitions is arbitrary
        let light_area = response_factor * concentration * heavy_area;
        let split: f64 = rng.gen_range(0.2..0.8);
        data_set
            .add_replicate(SampleType::Standard, Some(concentration), 1.0, false)
            .set_area("light", "y4", light_area * split)
            .set_area("light", "y5", light_area * (1.0 - split))
            .set_area("heavy", "y4", heavy_area * split)
            .set_area("heavy", "y5", heavy_area * (1.0 - split));
    }
    data_set
        .add_replicate(SampleType::Unknown, None, 4.0, false)
        .set_area("light", "y4", 0.6 * response_factor * 8.0 * heavy_area)
        .set_area("light", "y5", 0.4 * response_factor * 8.0 * heavy_area)
        .set_area("heavy", "y4", 0.6 * heavy_area)
        .set_area("heavy", "y5", 0.4 * heavy_area);

    let curve = data_set.calibration_curve("light");

    assert!(!curve.is_error());
    assert_eq!(curve.point_count(), 7);
    assert_relative_eq!(curve.slope(), response_factor, max_relative = 1e-9);
    assert_relative_eq!(curve.intercept(), 0.0, epsilon = 1e-9);

    let concentrations = data_set.calculated_concentrations("light", &curve);
    assert_eq!(concentrations.len(), 8);
    // The unknown was diluted four times
    assert_relative_eq!(concentrations[7].unwrap(), 32.0, max_relative = 1e-8);
    Ok(())
}

#[test]
fn every_fit_can_be_requested_for_a_data_set() {
    let seed = 40;
    let mut rng = Isaac64Rng::seed_from_u64(seed);

    for regression_fit in RegressionFit::list_all() {
        let mut data_set = CalibrationCurveDataSet::new();
        data_set.set_regression_fit(regression_fit);
        for concentration in [1.0, 2.0, 4.0, 8.0, 16.0, 32.0] {
            for _ in 0..3 {
                let noise: f64 = rng.gen_range(0.95..1.05);
                data_set
                    .add_replicate(SampleType::Standard, Some(concentration), 1.0, false)
                    .set_area("light", "y7", 100.0 * concentration * noise);
            }
        }

        let curve = data_set.calibration_curve("light");

        assert!(!curve.is_error(), "{regression_fit}: {:?}", curve.error_message());
        assert_eq!(curve.regression_fit(), regression_fit);
        if regression_fit != RegressionFit::None {
            assert_eq!(curve.point_count(), 18);
            let r_squared = curve.r_squared().unwrap();
            assert!(r_squared > 0.9, "{regression_fit}: {r_squared}");
        }
    }
}
