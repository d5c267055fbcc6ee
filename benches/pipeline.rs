//! Pipeline benchmarks for ddr-checker
//!
//! This benchmark module provides performance measurements for:
//! - XML parsing into the document arena
//! - Catalog building
//! - The full check suite over a prebuilt document
//!
//! Run with: cargo bench
//! Compare against baseline: cargo bench -- --save-baseline before
//!                          (make changes)
//!                          cargo bench -- --baseline before

use std::fmt::Write as _;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use ddr_checker::catalog::build_catalog;
use ddr_checker::checks::{all_checks, CheckContext};
use ddr_checker::document::Document;

/// Generate a synthetic DDR export with the given number of scripts and
/// layouts, shaped like a real solution: tables with fields, a script
/// catalog with navigation, field and SQL steps, layouts with field
/// objects and buttons.
fn synthetic_ddr(scripts: usize, layouts: usize) -> String {
    let mut xml = String::new();
    xml.push_str("<FMPReport type=\"Report\" version=\"20.1.1\">\n<File name=\"Bench.fmp12\">\n");

    xml.push_str("<BaseTableCatalog>\n");
    for table in 0..4 {
        let _ = writeln!(xml, "<BaseTable id=\"{}\" name=\"Table{}\">", table + 1, table);
        xml.push_str("<FieldCatalog>\n");
        for field in 0..20 {
            let _ = writeln!(
                xml,
                "<Field id=\"{}\" name=\"Field{}_{}\" dataType=\"Text\"/>",
                field + 1,
                table,
                field
            );
        }
        xml.push_str("</FieldCatalog>\n</BaseTable>\n");
    }
    xml.push_str("</BaseTableCatalog>\n");

    xml.push_str("<RelationshipGraph>\n<TableList>\n");
    for table in 0..4 {
        let _ = writeln!(
            xml,
            "<Table id=\"{}\" name=\"Table{}\" baseTable=\"Table{}\"/>",
            table + 1,
            table,
            table
        );
    }
    xml.push_str("</TableList>\n</RelationshipGraph>\n");

    xml.push_str("<LayoutCatalog>\n");
    for layout in 0..layouts {
        let _ = writeln!(xml, "<Layout id=\"{}\" name=\"Layout {}\"/>", layout + 1, layout);
    }
    xml.push_str("</LayoutCatalog>\n<LayoutList>\n");
    for layout in 0..layouts {
        let table = layout % 4;
        let _ = writeln!(
            xml,
            "<Layout id=\"{}\" name=\"Layout {}\" table=\"Table{}\">",
            layout + 1,
            layout,
            table
        );
        for field in 0..5 {
            let _ = writeln!(
                xml,
                "<Object type=\"Field\" name=\"\"><Bounds top=\"{}\" left=\"20\" bottom=\"{}\" right=\"120\"/><FieldObj><Field table=\"Table{}\" name=\"Field{}_{}\" id=\"{}\"/></FieldObj></Object>",
                field * 30 + 10,
                field * 30 + 30,
                table,
                table,
                field,
                field + 1
            );
        }
        let _ = writeln!(
            xml,
            "<Object type=\"Button\" name=\"Button {}\"><Bounds top=\"200\" left=\"20\" bottom=\"220\" right=\"120\"/><ButtonObj><Step index=\"1\" id=\"1\" name=\"Perform Script\"><Script id=\"{}\" name=\"Script {}\"/></Step></ButtonObj></Object>",
            layout,
            layout % scripts.max(1) + 1,
            layout % scripts.max(1)
        );
        xml.push_str("</Layout>\n");
    }
    xml.push_str("</LayoutList>\n");

    xml.push_str("<ScriptCatalog>\n");
    for script in 0..scripts {
        let table = script % 4;
        let _ = writeln!(xml, "<Script id=\"{}\" name=\"Script {}\">", script + 1, script);
        xml.push_str("<StepList>\n");
        let _ = writeln!(
            xml,
            "<Step index=\"1\" id=\"1\" name=\"Perform Script\" enable=\"True\"><Script id=\"{}\" name=\"Script {}\"/></Step>",
            (script + 1) % scripts + 1,
            (script + 1) % scripts
        );
        let _ = writeln!(
            xml,
            "<Step index=\"2\" id=\"6\" name=\"Go to Layout\" enable=\"True\"><Layout id=\"{}\" name=\"Layout {}\" table=\"Table{}\"/></Step>",
            script % layouts.max(1) + 1,
            script % layouts.max(1),
            table
        );
        let _ = writeln!(
            xml,
            "<Step index=\"3\" id=\"76\" name=\"Set Field\" enable=\"True\"><Field table=\"Table{}\" name=\"Field{}_0\" id=\"1\"/><Calculation>Table{}::Field{}_1 + 1</Calculation></Step>",
            table, table, table, table
        );
        let _ = writeln!(
            xml,
            "<Step index=\"4\" id=\"141\" name=\"Set Variable\" enable=\"True\"><Calculation>ExecuteSQL ( \"SELECT Field{}_0 FROM Table{} WHERE Field{}_1 = ?\" ; \"\" ; \"\" ; $id )</Calculation></Step>",
            table, table, table
        );
        xml.push_str("</StepList>\n</Script>\n");
    }
    xml.push_str("</ScriptCatalog>\n</File>\n</FMPReport>\n");
    xml
}

/// Benchmark XML parsing into the document arena
fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    for &size in &[10usize, 100] {
        let xml = synthetic_ddr(size, size);
        group.throughput(Throughput::Bytes(xml.len() as u64));
        group.bench_with_input(BenchmarkId::new("synthetic", size), &xml, |b, xml| {
            b.iter(|| Document::parse(black_box(xml)).unwrap())
        });
    }

    group.finish();
}

/// Benchmark catalog building over a prebuilt document
fn bench_catalog(c: &mut Criterion) {
    let mut group = c.benchmark_group("catalog");

    for &size in &[10usize, 100] {
        let xml = synthetic_ddr(size, size);
        let doc = Document::parse(&xml).unwrap();
        group.throughput(Throughput::Elements(doc.len() as u64));
        group.bench_with_input(BenchmarkId::new("synthetic", size), &doc, |b, doc| {
            b.iter(|| build_catalog(black_box(doc)))
        });
    }

    group.finish();
}

/// Benchmark the full check suite over a prebuilt document and catalog
fn bench_checks(c: &mut Criterion) {
    let mut group = c.benchmark_group("checks");

    for &size in &[10usize, 100] {
        let xml = synthetic_ddr(size, size);
        let doc = Document::parse(&xml).unwrap();
        let catalog = build_catalog(&doc);

        group.bench_function(BenchmarkId::new("all_checks", size), |b| {
            b.iter(|| {
                let ctx = CheckContext {
                    doc: black_box(&doc),
                    catalog: black_box(&catalog),
                    debug: false,
                    verbose: false,
                };
                for check in all_checks() {
                    check.run(&ctx).unwrap();
                }
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parse, bench_catalog, bench_checks);

criterion_main!(benches);
