//! Tests for the analysis checks, each run against the shared fixture.

use pretty_assertions::assert_eq;

use ddr_checker::catalog::build_catalog;
use ddr_checker::checks::{
    Check, CustomFunctionUsageCheck, FieldUsageCheck, LayoutUsageCheck, ScriptUsageCheck,
    SqlUsageCheck, TableOccurrenceCheck, UnknownReferenceCheck,
};
use ddr_checker::document::Document;

use crate::common::{check_context, row_by_text, row_by_texts, sample_catalog, sample_document};

#[test]
fn test_layout_usage_flags_unreferenced_layouts() {
    let doc = sample_document();
    let catalog = sample_catalog(&doc);
    let ctx = check_context(&doc, &catalog);

    let sheet = LayoutUsageCheck.run(&ctx).unwrap();
    assert_eq!(sheet.rows.len(), 3);

    // Unused layouts sort first.
    assert_eq!(sheet.rows[0][0].as_text(), Some("Old Invoices"));
    assert_eq!(sheet.rows[0][2].as_int(), Some(0));
    assert_eq!(sheet.rows[0][3].as_text(), Some("Not Used"));

    let detail = row_by_text(&sheet, 0, "Customer Detail");
    assert_eq!(detail[3].as_text(), Some("Active"));
    assert!(detail[4].as_text().unwrap().contains("Sync Orders"));

    let order_list = row_by_text(&sheet, 0, "Order List");
    assert_eq!(order_list[1].as_text(), Some("Admin"));
    assert!(order_list[7]
        .as_text()
        .unwrap()
        .contains("File Options - Default Layout"));
}

#[test]
fn test_script_usage_classifies_callers() {
    let doc = sample_document();
    let catalog = sample_catalog(&doc);
    let ctx = check_context(&doc, &catalog);

    let sheet = ScriptUsageCheck.run(&ctx).unwrap();
    assert_eq!(sheet.rows.len(), 3);

    // The broken reference target has no definition and gets no row.
    assert!(sheet
        .rows
        .iter()
        .all(|row| row[0].as_text() != Some("Deleted Script")));

    // Scheduled-for-deletion sorts ahead of active scripts.
    assert_eq!(sheet.rows[0][0].as_text(), Some("Old Import"));
    assert_eq!(sheet.rows[0][2].as_text(), Some("Scheduled For Deletion"));
    assert_eq!(sheet.rows[0][1].as_int(), Some(0));

    let cleanup = row_by_text(&sheet, 0, "Nightly Cleanup");
    assert_eq!(cleanup[2].as_text(), Some("Active"));
    assert_eq!(cleanup[1].as_int(), Some(1));
    assert!(cleanup[4].as_text().unwrap().contains("Sync Orders"));

    let sync = row_by_text(&sheet, 0, "Sync Orders");
    assert_eq!(sync[2].as_text(), Some("Active"));
    assert_eq!(sync[1].as_int(), Some(1));
    assert!(sync[5].as_text().unwrap().contains("Order List"));
}

#[test]
fn test_self_recursive_script_counts_as_unused() {
    let xml = r#"<FMPReport><File>
<ScriptCatalog>
<Script id="301" name="Retry Loop">
<StepList>
<Step id="1" index="1" name="Perform Script">
<Script id="301" name="Retry Loop"/>
<StepText>Perform Script [ "Retry Loop" ]</StepText>
</Step>
</StepList>
</Script>
</ScriptCatalog>
</File></FMPReport>"#;
    let doc = Document::parse(xml).unwrap();
    let catalog = build_catalog(&doc);
    let ctx = check_context(&doc, &catalog);

    let sheet = ScriptUsageCheck.run(&ctx).unwrap();
    let row = row_by_text(&sheet, 0, "Retry Loop");

    // The recursion serializes the name several times, so the raw count
    // alone would say "Check Manually". The only caller is the script
    // itself, and that makes it unused.
    assert!(row[3].as_int().unwrap() > 2);
    assert_eq!(row[1].as_int(), Some(0));
    assert_eq!(row[2].as_text(), Some("Not Used"));
}

#[test]
fn test_custom_function_usage_separates_unused() {
    let doc = sample_document();
    let catalog = sample_catalog(&doc);
    let ctx = check_context(&doc, &catalog);

    let sheet = CustomFunctionUsageCheck.run(&ctx).unwrap();
    assert_eq!(sheet.rows.len(), 2);

    // Unused functions come first.
    assert_eq!(sheet.rows[0][0].as_text(), Some("UnusedHelper"));
    assert_eq!(sheet.rows[0][1].as_int(), Some(0));
    assert_eq!(sheet.rows[0][2].as_text(), Some("NOT USED"));
    assert_eq!(sheet.rows[0][3].as_text(), Some("Unused"));

    let get_tax = row_by_text(&sheet, 0, "GetTax");
    assert_eq!(get_tax[1].as_int(), Some(1));
    assert_eq!(get_tax[3].as_text(), Some("Active"));
    assert!(get_tax[2]
        .as_text()
        .unwrap()
        .contains("Script: Sync Orders, Step 3: Set Field"));
}

#[test]
fn test_field_usage_statuses() {
    let doc = sample_document();
    let catalog = sample_catalog(&doc);
    let ctx = check_context(&doc, &catalog);

    let sheet = FieldUsageCheck.run(&ctx).unwrap();
    assert_eq!(sheet.rows.len(), 8);

    // Dead fields sort first.
    assert_eq!(sheet.rows[0][0].as_text(), Some("Orders"));
    assert_eq!(sheet.rows[0][1].as_text(), Some("AbandonedField"));
    assert_eq!(sheet.rows[0][2].as_text(), Some("Not Used"));
    assert_eq!(sheet.rows[0][3].as_int(), Some(0));

    let total = row_by_texts(&sheet, 0, "Orders", 1, "Total");
    assert_eq!(total[2].as_text(), Some("Used"));
    assert!(total[5].as_text().unwrap().contains("Field - Order List"));
    assert!(total[6].as_text().unwrap().contains("(Target field)"));
    assert!(total[8].as_text().unwrap().contains("SQL (SELECT)"));

    let order_id = row_by_texts(&sheet, 0, "Orders", 1, "OrderId");
    assert_eq!(order_id[2].as_text(), Some("Used"));
    assert!(order_id[8].as_text().unwrap().contains("SQL (WHERE)"));

    // The _c/_cache pair is a caching convention, not dead weight.
    let subtotal = row_by_texts(&sheet, 0, "Orders", 1, "Subtotal_c");
    assert_eq!(subtotal[2].as_text(), Some("Cached"));
    let cache = row_by_texts(&sheet, 0, "Orders", 1, "Subtotal_cache");
    assert_eq!(cache[2].as_text(), Some("Cached"));

    let full_name = row_by_texts(&sheet, 0, "Customers", 1, "FullName");
    assert_eq!(full_name[2].as_text(), Some("Used"));
    assert!(full_name[5]
        .as_text()
        .unwrap()
        .contains("Field - Customer Detail"));
    assert!(full_name[9].as_text().unwrap().contains("Value List"));

    let customer_id = row_by_texts(&sheet, 0, "Orders", 1, "CustomerId");
    assert_eq!(customer_id[2].as_text(), Some("Used"));
    assert!(customer_id[9]
        .as_text()
        .unwrap()
        .contains("Relationship - Orders_Customers"));
}

#[test]
fn test_sql_usage_finds_and_validates_the_query() {
    let doc = sample_document();
    let catalog = sample_catalog(&doc);
    let ctx = check_context(&doc, &catalog);

    let sheet = SqlUsageCheck.run(&ctx).unwrap();
    assert_eq!(sheet.rows.len(), 1);

    let row = &sheet.rows[0];
    assert_eq!(row[0].as_text(), Some(""));
    assert_eq!(row[1].as_text(), Some("Script"));
    assert_eq!(row[2].as_text(), Some("Sync Orders"));
    assert_eq!(row[3].as_text(), Some("Step 4: Set Variable"));
    assert!(row[4].as_text().unwrap().contains("SELECT Total FROM Orders"));
    assert_eq!(row[5].as_text(), Some("Orders"));
    assert_eq!(row[9].as_text(), Some(""));
    assert_eq!(row[10].as_text(), Some(""));
    assert_eq!(row[11].as_text(), Some(""));
    assert_eq!(row[13].as_text(), Some(""));
}

#[test]
fn test_sql_usage_reports_a_missing_field() {
    let xml = r#"<FMPReport><File>
<BaseTableCatalog>
<BaseTable id="1" name="Customers">
<FieldCatalog>
<Field id="1" name="Name" dataType="Text"/>
</FieldCatalog>
</BaseTable>
</BaseTableCatalog>
<ScriptCatalog>
<Script id="1" name="Bad Query">
<StepList>
<Step id="141" index="1" name="Set Variable">
<Calculation>ExecuteSQL ( "SELECT Name FROM Customers WHERE Region = ?" ; "" ; "" ; $id )</Calculation>
</Step>
</StepList>
</Script>
</ScriptCatalog>
</File></FMPReport>"#;
    let doc = Document::parse(xml).unwrap();
    let catalog = build_catalog(&doc);
    let ctx = check_context(&doc, &catalog);

    let sheet = SqlUsageCheck.run(&ctx).unwrap();
    assert_eq!(sheet.rows.len(), 1);

    let row = &sheet.rows[0];
    assert_eq!(row[0].as_text(), Some("Missing Field"));
    assert_eq!(row[1].as_text(), Some("Script"));
    assert_eq!(row[2].as_text(), Some("Bad Query"));
    assert_eq!(row[10].as_text(), Some(""));
    assert!(row[11].as_text().unwrap().contains("Customers::Region"));
    assert!(row[13].as_text().unwrap().contains("Missing fields"));
}

#[test]
fn test_table_occurrence_usage_and_aliasing() {
    let doc = sample_document();
    let catalog = sample_catalog(&doc);
    let ctx = check_context(&doc, &catalog);

    let sheet = TableOccurrenceCheck.run(&ctx).unwrap();
    assert_eq!(sheet.rows.len(), 3);

    // Least-used occurrence sorts first.
    assert_eq!(sheet.rows[0][0].as_text(), Some("orders_active"));
    assert_eq!(sheet.rows[0][1].as_text(), Some("Orders"));
    assert_eq!(sheet.rows[0][2].as_text(), Some("No"));
    assert_eq!(sheet.rows[0][4].as_int(), Some(1));
    assert!(sheet.rows[0][5]
        .as_text()
        .unwrap()
        .contains("Layout 'Order List' (Based on Table Occurrence)"));

    let customers = row_by_text(&sheet, 0, "Customers");
    assert_eq!(customers[2].as_text(), Some("Yes"));
    assert_eq!(customers[4].as_int(), Some(3));
    assert!(customers[5]
        .as_text()
        .unwrap()
        .contains("Go to Layout 'Customer Detail'"));
    assert!(customers[6].as_text().unwrap().contains("<- Orders"));

    let orders = row_by_text(&sheet, 0, "Orders");
    assert_eq!(orders[2].as_text(), Some("Yes"));
    assert_eq!(orders[4].as_int(), Some(4));
    assert!(orders[5].as_text().unwrap().contains("Set Variable (ExecuteSQL)"));
    assert!(orders[6].as_text().unwrap().contains("-> Customers"));
}

#[test]
fn test_unknown_references_find_broken_script_calls() {
    let doc = sample_document();
    let catalog = sample_catalog(&doc);
    let ctx = check_context(&doc, &catalog);

    let sheet = UnknownReferenceCheck.run(&ctx).unwrap();
    assert_eq!(sheet.rows.len(), 2);

    // Script references sort ahead of layout objects.
    let from_script = &sheet.rows[0];
    assert_eq!(from_script[0].as_text(), Some("Active Error"));
    assert_eq!(from_script[1].as_text(), Some("Script"));
    assert_eq!(from_script[2].as_text(), Some("Nightly Cleanup"));
    assert_eq!(from_script[3].as_text(), Some("Step 2: Perform Script"));
    assert_eq!(from_script[4].as_text(), Some("No"));
    assert!(from_script[5].as_text().unwrap().contains("Deleted Script"));

    let from_button = &sheet.rows[1];
    assert_eq!(from_button[0].as_text(), Some("Active Error"));
    assert_eq!(from_button[1].as_text(), Some("Layout Object"));
    assert_eq!(from_button[2].as_text(), Some("Order List"));
    assert!(from_button[3].as_text().unwrap().contains("Broken Button"));
    assert!(from_button[5].as_text().unwrap().contains("Deleted Script"));
}
