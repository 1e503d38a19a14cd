//! Integration tests for reference resolution over a parsed model

use modelref_core::ObjectRef;
use modelref_dax::{build_index, resolve, ReferenceIndex};
use modelref_tmdl::{build_catalog, parse};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;

const MODEL: &str = "table Sales\n\
                     \tmeasure Total = SUM('Sales'[Amount])\n\
                     \tmeasure 'Avg Price' =\n\
                     \t\t\tVAR units = SUM(Sales[Qty]) -- quantity sold\n\
                     \t\t\tRETURN DIVIDE([Total], units)\n\
                     \tcolumn Amount\n\
                     \t\tdataType: decimal\n\
                     \tcolumn Qty\n\
                     \t\tdataType: int64\n\
                     \n\
                     table Date\n\
                     \tcolumn Date\n\
                     \t\tdataType: dateTime\n";

fn model_index() -> (modelref_core::ModelCatalog, ReferenceIndex) {
    let catalog = build_catalog(&[parse(MODEL)]);
    let index = ReferenceIndex::from_catalog(&catalog);
    (catalog, index)
}

#[test]
fn catalog_measure_resolves_to_its_column() {
    let (catalog, index) = model_index();
    let total = catalog.find_measure("Sales", "Total").unwrap();

    let refs = resolve(&total.expression, &index);
    assert_eq!(refs.columns, BTreeSet::from([ObjectRef::new("Sales", "Amount")]));
    assert!(refs.measures.is_empty());
}

#[test]
fn multi_line_measure_mixes_columns_and_measures() {
    let (catalog, index) = model_index();
    let avg = catalog.find_measure("Sales", "Avg Price").unwrap();

    let refs = resolve(&avg.expression, &index);
    assert_eq!(refs.columns, BTreeSet::from([ObjectRef::new("Sales", "Qty")]));
    assert_eq!(refs.measures, BTreeSet::from([ObjectRef::new("Sales", "Total")]));
    assert!(refs.unresolved.is_empty());
}

#[test]
fn row_index_matches_catalog_index() {
    let (catalog, from_catalog) = model_index();
    let from_rows = build_index(&catalog.measure_rows(), &catalog.column_rows());

    let expr = "CALCULATE([Total], 'Date'[Date] > 0)";
    assert_eq!(resolve(expr, &from_rows), resolve(expr, &from_catalog));
}
