//! ddr-checker: catalog and reference analysis for FileMaker DDR exports
//!
//! This library parses a Database Design Report XML export, builds a
//! catalog of every defined entity, scans the whole document for
//! references to them, and produces a report of what is used, where, and
//! what is broken.

pub mod catalog;
pub mod checks;
pub mod document;
pub mod error;
pub mod report;
pub mod scan;
pub mod sql;
pub mod util;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;

pub use error::DdrError;

/// Options for analyzing a DDR export
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    /// Path to the DDR XML export
    pub input_path: PathBuf,
    /// Output path for the JSON report
    pub output_path: Option<PathBuf>,
    /// Print diagnostics about unclassified references
    pub debug: bool,
    /// Enable verbose output
    pub verbose: bool,
}

/// Analyze a DDR export and return the report
pub fn run_analysis(options: &AnalyzeOptions) -> Result<report::Report> {
    if options.verbose {
        println!("Analyzing DDR export: {}", options.input_path.display());
    }

    // Step 1: Read and parse the export
    let raw = fs::read_to_string(&options.input_path).map_err(|source| DdrError::InputReadError {
        path: options.input_path.clone(),
        source,
    })?;
    let doc =
        document::Document::parse(&raw).map_err(|source| DdrError::XmlParseError {
            path: options.input_path.clone(),
            source,
        })?;

    if options.verbose {
        println!("Parsed {} XML elements", doc.len());
    }

    // Step 2: Build the entity catalog
    let catalog = catalog::build_catalog(&doc);

    if options.verbose {
        println!(
            "Catalog: {} scripts, {} layouts, {} tables, {} occurrences, {} custom functions",
            catalog.scripts.len(),
            catalog.layouts.len(),
            catalog.tables.len(),
            catalog.occurrences.len(),
            catalog.custom_functions.len()
        );
    }

    // Step 3: Run every check
    let source = options
        .input_path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("unknown");
    let mut report = report::Report::new(source);
    report.errors.extend(catalog.errors.iter().cloned());

    let ctx = checks::CheckContext {
        doc: &doc,
        catalog: &catalog,
        debug: options.debug,
        verbose: options.verbose,
    };
    for check in checks::all_checks() {
        if options.verbose {
            println!("Running check: {}", check.name());
        }
        match check.run(&ctx) {
            Ok(sheet) => report.sheets.push(sheet),
            Err(error) => report
                .errors
                .push(format!("check '{}' failed: {}", check.name(), error)),
        }
    }

    Ok(report)
}

/// Analyze a DDR export and write the JSON report next to the input
/// unless an explicit output path was given.
pub fn analyze_to_file(options: &AnalyzeOptions) -> Result<PathBuf> {
    let report = run_analysis(options)?;

    let output_path = options.output_path.clone().unwrap_or_else(|| {
        let input_dir = options.input_path.parent().unwrap_or(Path::new("."));
        let input_name = options
            .input_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("ddr");
        input_dir.join(format!("{}_report.json", input_name))
    });

    report.write_json(&output_path)?;

    Ok(output_path)
}
