//! Common test utilities for ddr-checker tests

use ddr_checker::catalog::{build_catalog, Catalog};
use ddr_checker::checks::CheckContext;
use ddr_checker::document::Document;
use ddr_checker::report::{Cell, Sheet};

/// A small but structurally faithful DDR export: two base tables, three
/// occurrences, three layouts, three scripts, two custom functions, a
/// relationship, a value list, and a pair of dangling script references.
pub const SAMPLE_DDR: &str = r#"<FMPReport type="Report" version="20.1.1">
<File name="Sample.fmp12">
<BaseTableCatalog>
<BaseTable id="1" name="Orders">
<FieldCatalog>
<Field id="1" name="OrderId" dataType="Number"/>
<Field id="2" name="Total" dataType="Number"/>
<Field id="3" name="CustomerId" dataType="Number"/>
<Field id="4" name="AbandonedField" dataType="Text"/>
<Field id="5" name="Subtotal_c" dataType="Number">
<Calculation>Orders::Total - Orders::CustomerId</Calculation>
</Field>
<Field id="6" name="Subtotal_cache" dataType="Number"/>
</FieldCatalog>
</BaseTable>
<BaseTable id="2" name="Customers">
<FieldCatalog>
<Field id="1" name="CustomerId" dataType="Number"/>
<Field id="2" name="FullName" dataType="Text"/>
</FieldCatalog>
</BaseTable>
</BaseTableCatalog>
<RelationshipGraph>
<TableList>
<Table id="1" name="Orders" baseTable="Orders"/>
<Table id="2" name="Customers" baseTable="Customers"/>
<Table id="3" name="orders_active" baseTable="Orders"/>
</TableList>
<RelationshipList>
<Relationship id="1" name="Orders_Customers">
<LeftTable name="Orders"/>
<RightTable name="Customers"/>
<JoinPredicateList>
<JoinPredicate type="Equal">
<FieldPair>
<Field table="Orders" name="CustomerId" id="3"/>
<Field table="Customers" name="CustomerId" id="1"/>
</FieldPair>
</JoinPredicate>
</JoinPredicateList>
</Relationship>
</RelationshipList>
</RelationshipGraph>
<LayoutCatalog>
<Group name="Admin">
<Layout id="10" name="Order List"/>
</Group>
<Layout id="11" name="Customer Detail"/>
<Layout id="12" name="Old Invoices"/>
</LayoutCatalog>
<LayoutList>
<Layout id="10" name="Order List" table="orders_active">
<Object type="Field" name="">
<Bounds top="10" left="20" bottom="30" right="120"/>
<FieldObj>
<Field table="Orders" name="Total" id="2"/>
</FieldObj>
</Object>
<Object type="Button" name="Sync Button">
<Bounds top="50" left="20" bottom="70" right="120"/>
<ButtonObj>
<Step index="1" id="1" name="Perform Script">
<Script id="201" name="Sync Orders"/>
</Step>
</ButtonObj>
</Object>
<Object type="Button" name="Broken Button">
<Bounds top="90" left="20" bottom="110" right="120"/>
<ButtonObj>
<Step index="1" id="1" name="Perform Script">
<Script id="999" name="Deleted Script"/>
</Step>
</ButtonObj>
</Object>
</Layout>
<Layout id="11" name="Customer Detail" table="Customers">
<Object type="Field" name="">
<Bounds top="10" left="20" bottom="30" right="120"/>
<FieldObj>
<Field table="Customers" name="FullName" id="2"/>
</FieldObj>
</Object>
<Object type="Text" name="">
<Bounds top="100" left="20" bottom="120" right="320"/>
<TextObj>
<CharacterStyleVector>
<Style>
<Data>Hello &lt;&lt;FullName&gt;&gt;</Data>
</Style>
</CharacterStyleVector>
</TextObj>
</Object>
</Layout>
<Layout id="12" name="Old Invoices" table="Orders">
</Layout>
</LayoutList>
<ScriptCatalog>
<Script id="201" name="Sync Orders" includeInMenu="True">
<StepList>
<Step index="1" id="1" name="Perform Script" enable="True">
<Script id="202" name="Nightly Cleanup"/>
</Step>
<Step index="2" id="6" name="Go to Layout" enable="True">
<Layout id="11" name="Customer Detail" table="Customers"/>
</Step>
<Step index="3" id="76" name="Set Field" enable="True">
<Field table="Orders" name="Total" id="2"/>
<Calculation>Orders::Total + GetTax ( Orders::Total )</Calculation>
</Step>
<Step index="4" id="141" name="Set Variable" enable="True">
<Calculation>ExecuteSQL ( "SELECT Total FROM Orders WHERE OrderId = ?" ; "" ; "" ; $id )</Calculation>
</Step>
</StepList>
</Script>
<Script id="202" name="Nightly Cleanup" includeInMenu="False">
<StepList>
<Step index="1" id="89" name="Comment" enable="True"/>
<Step index="2" id="1" name="Perform Script" enable="True">
<Script id="999" name="Deleted Script"/>
</Step>
</StepList>
</Script>
<Group name="ToDelete">
<Script id="203" name="Old Import" includeInMenu="False">
<StepList>
<Step index="1" id="89" name="Comment" enable="True"/>
</StepList>
</Script>
</Group>
</ScriptCatalog>
<CustomFunctionCatalog>
<CustomFunction id="301" name="GetTax" functionArity="1" visible="True" parameters="amount">
<Calculation>amount * .1</Calculation>
</CustomFunction>
<CustomFunction id="302" name="UnusedHelper" functionArity="0" visible="True" parameters="">
<Calculation>"nothing"</Calculation>
</CustomFunction>
</CustomFunctionCatalog>
<ValueListCatalog>
<ValueList id="401" name="Customer Names">
<Source value="Field">
<PrimaryField>
<Field table="Customers" name="FullName" id="2"/>
</PrimaryField>
</Source>
</ValueList>
</ValueListCatalog>
<FileOptions>
<DefaultLayout id="10" name="Order List"/>
</FileOptions>
</File>
</FMPReport>
"#;

pub fn sample_document() -> Document {
    Document::parse(SAMPLE_DDR).expect("sample DDR parses")
}

pub fn sample_catalog(doc: &Document) -> Catalog {
    build_catalog(doc)
}

pub fn check_context<'a>(doc: &'a Document, catalog: &'a Catalog) -> CheckContext<'a> {
    CheckContext {
        doc,
        catalog,
        debug: false,
        verbose: false,
    }
}

/// Find the first row whose cell in `column` equals `value`.
pub fn row_by_text<'a>(sheet: &'a Sheet, column: usize, value: &str) -> &'a [Cell] {
    sheet
        .rows
        .iter()
        .find(|row| row[column].as_text() == Some(value))
        .unwrap_or_else(|| panic!("no row with '{}' in column {} of '{}'", value, column, sheet.name))
}

/// Find the first row matching two text cells (e.g. table and field name).
pub fn row_by_texts<'a>(
    sheet: &'a Sheet,
    first_column: usize,
    first: &str,
    second_column: usize,
    second: &str,
) -> &'a [Cell] {
    sheet
        .rows
        .iter()
        .find(|row| {
            row[first_column].as_text() == Some(first)
                && row[second_column].as_text() == Some(second)
        })
        .unwrap_or_else(|| {
            panic!(
                "no row with '{}'/'{}' in sheet '{}'",
                first, second, sheet.name
            )
        })
}
