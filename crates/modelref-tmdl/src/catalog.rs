//! Lowering parsed documents into a `ModelCatalog`

use modelref_core::{
    fold, Column, CrossFilterDirection, Hierarchy, HierarchyLevel, Measure, ModelCatalog,
    NamedExpression, Partition, Relationship, Role, Table, TablePermission,
};
use tracing::{debug, info};

use crate::declaration::{
    ColumnDecl, Declaration, DeclarationKind, DeclarationNode, MeasureDecl, RoleDecl, TableDecl,
};

/// Build one catalog from any number of parsed documents
///
/// Documents are typically one per file. A table declared in several
/// documents is merged by name (case-insensitive), keeping first-seen order.
pub fn build_catalog(documents: &[DeclarationNode]) -> ModelCatalog {
    let mut catalog = ModelCatalog::new();

    for document in documents {
        lower_children(document, &mut catalog);
    }

    let stats = catalog.stats();
    info!(
        tables = stats.tables,
        columns = stats.columns,
        measures = stats.measures,
        relationships = stats.relationships,
        expressions = stats.expressions,
        "built model catalog"
    );

    catalog
}

fn lower_children(node: &DeclarationNode, catalog: &mut ModelCatalog) {
    for child in &node.children {
        if child.kind == DeclarationKind::Model {
            if catalog.name.is_none() {
                catalog.name = Some(child.name.clone());
            }
            lower_children(child, catalog);
            continue;
        }

        match Declaration::from_node(child) {
            Declaration::Table(decl) => merge_table(catalog, decl),
            Declaration::Relationship(decl) => {
                let (Some(from), Some(to)) = (decl.from, decl.to) else {
                    debug!(relationship = %decl.name, "skipping relationship without both endpoints");
                    continue;
                };
                catalog.relationships.push(Relationship {
                    name: decl.name,
                    from_table: from.0,
                    from_column: from.1,
                    to_table: to.0,
                    to_column: to.1,
                    is_active: decl.is_active,
                    cross_filter: decl
                        .cross_filtering_behavior
                        .as_deref()
                        .map(CrossFilterDirection::from_model_value)
                        .unwrap_or_default(),
                    from_cardinality: decl.from_cardinality,
                    to_cardinality: decl.to_cardinality,
                });
            }
            Declaration::NamedExpression(decl) => catalog.expressions.push(NamedExpression {
                name: decl.name,
                expression: decl.expression,
                is_parameter: decl.is_parameter,
                description: decl.description,
                properties: decl.properties.into_map(),
            }),
            Declaration::Role(decl) => catalog.roles.push(lower_role(decl)),
            Declaration::Culture(decl) => catalog.cultures.push(decl.name),
            Declaration::Column(_) | Declaration::Measure(_) | Declaration::Partition(_) => {
                debug!(kind = %child.kind, name = %child.name, "ignoring declaration outside a table");
            }
            Declaration::Other(_) => {}
        }
    }
}

fn merge_table(catalog: &mut ModelCatalog, decl: TableDecl) {
    let lowered = lower_table(decl);

    let existing = catalog
        .tables
        .iter_mut()
        .find(|t| fold(&t.name) == fold(&lowered.name));

    match existing {
        Some(table) => {
            debug!(table = %table.name, "merging repeated table declaration");
            let owner = table.name.clone();
            table.columns.extend(lowered.columns.into_iter().map(|mut c| {
                c.table = owner.clone();
                c
            }));
            table.measures.extend(lowered.measures.into_iter().map(|mut m| {
                m.table = owner.clone();
                m
            }));
            table.partitions.extend(lowered.partitions);
            table.hierarchies.extend(lowered.hierarchies);
            table.is_hidden |= lowered.is_hidden;
            if table.description.is_none() {
                table.description = lowered.description;
            }
            for (k, v) in lowered.properties {
                table.properties.entry(k).or_insert(v);
            }
        }
        None => catalog.tables.push(lowered),
    }
}

fn lower_table(decl: TableDecl) -> Table {
    let name = decl.name;
    Table {
        columns: decl
            .columns
            .into_iter()
            .map(|c| lower_column(&name, c))
            .collect(),
        measures: decl
            .measures
            .into_iter()
            .map(|m| lower_measure(&name, m))
            .collect(),
        partitions: decl
            .partitions
            .into_iter()
            .map(|p| Partition {
                name: p.name,
                source_kind: p.source_kind,
                mode: p.mode,
                source: p.source,
            })
            .collect(),
        hierarchies: decl
            .hierarchies
            .into_iter()
            .map(|h| Hierarchy {
                name: h.name,
                levels: h
                    .levels
                    .into_iter()
                    .map(|(name, column)| HierarchyLevel { name, column })
                    .collect(),
            })
            .collect(),
        description: decl.description,
        is_hidden: decl.is_hidden,
        properties: decl.properties.into_map(),
        name,
    }
}

fn lower_column(table: &str, decl: ColumnDecl) -> Column {
    Column {
        table: table.to_string(),
        name: decl.name,
        data_type: decl.data_type,
        expression: decl.expression,
        source_column: decl.source_column,
        is_hidden: decl.is_hidden,
        is_key: decl.is_key,
        display_folder: decl.display_folder,
        format_string: decl.format_string,
        summarize_by: decl.summarize_by,
        sort_by_column: decl.sort_by_column,
        description: decl.description,
        properties: decl.properties.into_map(),
    }
}

fn lower_measure(table: &str, decl: MeasureDecl) -> Measure {
    if decl.expression.is_none() {
        debug!(table, measure = %decl.name, "measure has no expression");
    }

    let mut properties = decl.properties.into_map();
    if let Some(key) = decl.expression_key.filter(|k| k != "expression") {
        properties.insert("expressionKey".to_string(), key);
    }

    Measure {
        table: table.to_string(),
        name: decl.name,
        expression: decl.expression.unwrap_or_default(),
        display_folder: decl.display_folder,
        format_string: decl.format_string,
        is_hidden: decl.is_hidden,
        description: decl.description,
        properties,
    }
}

fn lower_role(decl: RoleDecl) -> Role {
    Role {
        name: decl.name,
        model_permission: decl.model_permission,
        table_permissions: decl
            .table_permissions
            .into_iter()
            .map(|(table, filter_expression)| TablePermission {
                table,
                filter_expression,
            })
            .collect(),
    }
}
