//! Tests for catalog building: definitions vs references, occurrence
//! resolution, folder paths.

use pretty_assertions::assert_eq;

use ddr_checker::catalog::build_catalog;
use ddr_checker::document::Document;

use crate::common::{sample_catalog, sample_document};

#[test]
fn test_script_references_are_not_definitions() {
    let doc = sample_document();
    let catalog = sample_catalog(&doc);

    // The fixture contains Script reference elements inside steps and
    // button objects; only the three catalog entries are definitions.
    assert_eq!(catalog.scripts.len(), 3);
    assert!(catalog.scripts.contains_key("Sync Orders"));
    assert!(catalog.scripts.contains_key("Nightly Cleanup"));
    assert!(catalog.scripts.contains_key("Old Import"));
    assert!(!catalog.scripts.contains_key("Deleted Script"));
    assert_eq!(catalog.script_definitions.len(), 3);
}

#[test]
fn test_script_ids_and_folders() {
    let doc = sample_document();
    let catalog = sample_catalog(&doc);

    assert_eq!(
        catalog.scripts_by_id.get("201").map(String::as_str),
        Some("Sync Orders")
    );
    assert_eq!(
        catalog.scripts_by_id.get("202").map(String::as_str),
        Some("Nightly Cleanup")
    );
    assert_eq!(catalog.scripts["Sync Orders"].folder, "");
    assert_eq!(catalog.scripts["Old Import"].folder, "ToDelete");

    // Definitions keep their step bodies.
    let definition = catalog.scripts["Sync Orders"].node;
    assert!(doc.find_descendant(definition, "Step").is_some());
}

#[test]
fn test_layout_paths_come_from_the_catalog_tree() {
    let doc = sample_document();
    let catalog = sample_catalog(&doc);

    assert_eq!(catalog.layouts.len(), 3);
    assert_eq!(catalog.layouts["Order List"].path, "Admin");
    assert_eq!(catalog.layouts["Customer Detail"].path, "Top Level");
    assert_eq!(catalog.layouts["Old Invoices"].path, "Top Level");
    assert_eq!(
        catalog.layouts_by_id.get("11").map(String::as_str),
        Some("Customer Detail")
    );
    assert!(catalog.group_names.contains("Admin"));
    assert_eq!(catalog.layout_definitions.len(), 3);
}

#[test]
fn test_later_duplicate_definition_wins_identity() {
    let xml = r#"<FMPReport><File>
<ScriptCatalog>
<Script id="1" name="Sync">
<StepList><Step id="6" index="1" name="Go to Layout"/></StepList>
</Script>
<Group name="Later">
<Script id="2" name="Sync">
<StepList><Step id="6" index="1" name="Go to Layout"/></StepList>
</Script>
</Group>
</ScriptCatalog>
</File></FMPReport>"#;
    let doc = Document::parse(xml).unwrap();
    let catalog = build_catalog(&doc);

    // The later definition owns the catalog entry; both nodes stay known
    // as definitions so neither is ever counted as a usage.
    assert_eq!(catalog.scripts.len(), 1);
    assert_eq!(catalog.scripts["Sync"].id, "2");
    assert_eq!(catalog.scripts["Sync"].folder, "Later");
    assert_eq!(catalog.script_definitions.len(), 2);
}

#[test]
fn test_occurrences_resolve_to_base_tables() {
    let doc = sample_document();
    let catalog = sample_catalog(&doc);

    assert_eq!(catalog.occurrences.len(), 3);
    assert_eq!(catalog.occurrences.resolve("orders_active"), "Orders");
    assert!(catalog.occurrences.is_alias("orders_active"));
    assert!(!catalog.occurrences.is_alias("Customers"));
    assert!(catalog.is_known_table("orders_active"));
    assert!(!catalog.is_base_table("orders_active"));
}

#[test]
fn test_tables_and_fields() {
    let doc = sample_document();
    let catalog = sample_catalog(&doc);

    assert_eq!(catalog.tables.len(), 2);
    assert_eq!(catalog.tables["Orders"].fields.len(), 6);
    assert_eq!(catalog.tables["Customers"].fields.len(), 2);
    assert!(catalog.has_field("Orders", "Total"));
    assert!(catalog.has_field("orders_active", "Total"));
    assert!(!catalog.has_field("Orders", "FullName"));
    assert_eq!(catalog.field_by_id("Orders", "2"), Some("Total"));
    assert_eq!(catalog.tables_with_field("CustomerId").count(), 2);
}

#[test]
fn test_custom_functions_value_lists_and_relationships() {
    let doc = sample_document();
    let catalog = sample_catalog(&doc);

    assert_eq!(catalog.custom_functions.len(), 2);
    assert_eq!(catalog.custom_functions["GetTax"].definition, "amount * .1");

    assert_eq!(catalog.value_lists.len(), 1);
    assert_eq!(catalog.value_lists[0].name, "Customer Names");

    assert_eq!(catalog.relationships.len(), 1);
    assert_eq!(catalog.relationships[0].left_table, "Orders");
    assert_eq!(catalog.relationships[0].right_table, "Customers");
}

#[test]
fn test_clean_fixture_builds_without_errors() {
    let doc = sample_document();
    let catalog = sample_catalog(&doc);
    assert!(catalog.errors.is_empty(), "{:?}", catalog.errors);
}
