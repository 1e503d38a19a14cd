//! Integration tests for model-definition parsing

use modelref_tmdl::{build_catalog, parse, parse_file, Declaration, DeclarationKind};
use pretty_assertions::assert_eq;
use std::path::Path;

const DEFINITION: &str = "../../fixtures/sales-model/SalesModel.SemanticModel/definition";

fn fixture_documents() -> Vec<modelref_tmdl::DeclarationNode> {
    let root = Path::new(DEFINITION);
    let mut paths = vec![
        root.join("model.tmdl"),
        root.join("relationships.tmdl"),
        root.join("tables/Sales.tmdl"),
        root.join("tables/Date.tmdl"),
    ];
    paths.sort();
    paths
        .iter()
        .map(|p| parse_file(p).expect("fixture is readable"))
        .collect()
}

#[test]
fn fixture_model_builds_expected_catalog() {
    let catalog = build_catalog(&fixture_documents());
    let stats = catalog.stats();

    assert_eq!(stats.tables, 2);
    assert_eq!(stats.columns, 3);
    assert_eq!(stats.measures, 1);
    assert_eq!(stats.relationships, 1);
    assert_eq!(catalog.name.as_deref(), Some("Model"));

    let total = catalog.find_measure("Sales", "Total").unwrap();
    assert_eq!(total.expression, "SUM('Sales'[Amount])");
    assert_eq!(total.description.as_deref(), Some("Sum of sales amount"));
    assert_eq!(total.display_folder.as_deref(), Some("KPIs"));

    let rel = &catalog.relationships[0];
    assert_eq!(
        (rel.from_table.as_str(), rel.from_column.as_str()),
        ("Sales", "Date")
    );
    assert_eq!((rel.to_table.as_str(), rel.to_column.as_str()), ("Date", "Date"));
    assert!(rel.is_active);
}

#[test]
fn fixture_partitions_keep_source_text() {
    let catalog = build_catalog(&fixture_documents());
    let sales = catalog.find_table("Sales").unwrap();

    assert_eq!(sales.partitions.len(), 1);
    let partition = &sales.partitions[0];
    assert_eq!(partition.source_kind.as_deref(), Some("m"));
    assert_eq!(partition.mode.as_deref(), Some("import"));
    assert!(partition.source.as_deref().unwrap().starts_with("let\n"));
    assert!(sales.columns.iter().all(|c| !c.is_calculated()));
}

#[test]
fn typed_view_of_whole_table() {
    let root = parse(
        "table Product\n\
         \tisHidden\n\
         \n\
         \tmeasure Count = COUNTROWS(Product)\n\
         \n\
         \tcolumn Name\n\
         \t\tdataType: string\n\
         \n\
         \tcolumn Label = [Name] & \" (\" & [Code] & \")\"\n\
         \t\tdataType: string\n\
         \n\
         \thierarchy Catalog\n\
         \t\tlevel Name\n\
         \t\t\tcolumn: Name\n",
    );

    let node = root.child(DeclarationKind::Table, "Product").unwrap();
    let Declaration::Table(table) = Declaration::from_node(node) else {
        panic!("expected a table");
    };

    assert!(table.is_hidden);
    assert_eq!(table.measures[0].expression.as_deref(), Some("COUNTROWS(Product)"));
    assert_eq!(table.columns.len(), 2);
    assert_eq!(
        table.columns[1].expression.as_deref(),
        Some("[Name] & \" (\" & [Code] & \")\"")
    );
    assert_eq!(
        table.hierarchies[0].levels,
        vec![("Name".to_string(), Some("Name".to_string()))]
    );
}
