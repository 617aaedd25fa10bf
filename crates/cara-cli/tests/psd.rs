use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use std::error::Error;

mod common;

#[test]
fn psd_command_reports_welch_spectra() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let csv = common::write_recording(dir.path())?;
    let mut cmd = cargo_bin_cmd!("cara");
    cmd.args([
        "psd",
        "--input",
        csv.to_str().unwrap(),
        "--time-col",
        "time",
        "--flow-col",
        "CBFV_L",
    ]);
    let out = cmd.assert().success().get_output().stdout.clone();
    let value: Value = serde_json::from_slice(&out)?;
    let freq = value["freq"].as_array().unwrap();
    assert_eq!(freq.len(), 512);
    assert_eq!(value["n_segments"], 13);
    let sxx = value["sxx"].as_array().unwrap();
    assert!(sxx.iter().all(|v| v.as_f64().unwrap() >= 0.0));
    let first_cross = value["sxy"][1].as_array().unwrap();
    assert_eq!(first_cross.len(), 2);
    Ok(())
}

#[test]
fn segment_longer_than_recording_fails() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let csv = common::write_recording(dir.path())?;
    let mut cmd = cargo_bin_cmd!("cara");
    cmd.args([
        "psd",
        "--input",
        csv.to_str().unwrap(),
        "--fs",
        "5",
        "--flow-col",
        "CBFV_R",
        "--segment-s",
        "1000",
    ]);
    let out = cmd.assert().failure().get_output().stderr.clone();
    assert!(String::from_utf8(out)?.contains("does not fit"));
    Ok(())
}

fn dc_power(csv: &str, detrend: &str) -> Result<f64, Box<dyn Error>> {
    let mut cmd = cargo_bin_cmd!("cara");
    cmd.args([
        "psd",
        "--input",
        csv,
        "--fs",
        "5",
        "--flow-col",
        "CBFV_L",
        "--detrend",
        detrend,
    ]);
    let out = cmd.assert().success().get_output().stdout.clone();
    let value: Value = serde_json::from_slice(&out)?;
    Ok(value["sxx"][0].as_f64().unwrap())
}

#[test]
fn detrend_flag_controls_the_mean() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let csv = common::write_recording(dir.path())?;
    let csv = csv.to_str().unwrap();
    // the pressure channel sits around 80 mmHg
    let raw = dc_power(csv, "none")?;
    let centred = dc_power(csv, "constant")?;
    assert!(raw > 100.0 * centred, "raw {raw}, centred {centred}");
    Ok(())
}

#[test]
fn unknown_detrend_is_rejected() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let csv = common::write_recording(dir.path())?;
    let mut cmd = cargo_bin_cmd!("cara");
    cmd.args([
        "psd",
        "--input",
        csv.to_str().unwrap(),
        "--fs",
        "5",
        "--flow-col",
        "CBFV_L",
        "--detrend",
        "quadratic",
    ]);
    let out = cmd.assert().failure().get_output().stderr.clone();
    assert!(String::from_utf8(out)?.contains("unknown detrend mode"));
    Ok(())
}
