//! End-to-end pipeline tests: file in, JSON report out.

use std::fs;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use ddr_checker::{analyze_to_file, run_analysis, AnalyzeOptions};

use crate::common::SAMPLE_DDR;

fn options_for(input: std::path::PathBuf) -> AnalyzeOptions {
    AnalyzeOptions {
        input_path: input,
        output_path: None,
        debug: false,
        verbose: false,
    }
}

#[test]
fn test_run_analysis_produces_every_sheet() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("sample.xml");
    fs::write(&input, SAMPLE_DDR).unwrap();

    let report = run_analysis(&options_for(input)).unwrap();

    assert_eq!(report.source, "sample.xml");
    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert_eq!(report.sheets.len(), 7);
    let orders: Vec<usize> = report.sheets.iter().map(|sheet| sheet.order).collect();
    assert_eq!(orders, vec![1, 2, 3, 4, 5, 6, 7]);
}

#[test]
fn test_analyze_to_file_defaults_next_to_the_input() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("sample.xml");
    fs::write(&input, SAMPLE_DDR).unwrap();

    let output = analyze_to_file(&options_for(input)).unwrap();

    assert_eq!(output, dir.path().join("sample_report.json"));
    let json = fs::read_to_string(&output).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed["source"], "sample.xml");
    assert_eq!(parsed["sheets"].as_array().unwrap().len(), 7);
}

#[test]
fn test_explicit_output_path_is_honored() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("sample.xml");
    fs::write(&input, SAMPLE_DDR).unwrap();
    let explicit = dir.path().join("out.json");

    let mut options = options_for(input);
    options.output_path = Some(explicit.clone());
    let output = analyze_to_file(&options).unwrap();

    assert_eq!(output, explicit);
    assert!(explicit.exists());
}

#[test]
fn test_missing_input_is_an_error() {
    let dir = TempDir::new().unwrap();
    let result = run_analysis(&options_for(dir.path().join("missing.xml")));
    assert!(result.is_err());
}

#[test]
fn test_unparsable_xml_is_an_error() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("broken.xml");
    fs::write(&input, "<FMPReport><File>").unwrap();

    let result = run_analysis(&options_for(input));
    assert!(result.is_err());
}
