//! Field extraction from visual definitions
//!
//! Handles the two binding layouts found in visual JSON:
//!
//! - `visual.query.queryState.<Slot>.projections[].field`, with fields shaped
//!   as `Column`, `Measure`, `Aggregation` or `HierarchyLevel`
//! - `prototypeQuery` (`From` aliases plus `Select` items), found under
//!   `singleVisual` in older layouts and beside `queryState` in some visuals
//!
//! Filter fields come from `filterConfig.filters[].field`.

use serde_json::Value;
use std::collections::HashMap;

use crate::visual::{ColumnField, FieldRef, MeasureField, ReportVisual, VisualFields};

/// Projection slots scanned in `queryState`
pub const PROJECTION_SLOTS: [&str; 20] = [
    "Category",
    "Y",
    "Y2",
    "X",
    "Values",
    "Rows",
    "Columns",
    "Legend",
    "Series",
    "Tooltips",
    "Size",
    "Details",
    "Indicator",
    "Goal",
    "TrendLine",
    "Data",
    "Fields",
    "MinValue",
    "MaxValue",
    "TargetValue",
];

/// `From` alias → entity name
pub type Aliases = HashMap<String, String>;

/// Reduce one visual definition to the normalized shape
///
/// `fallback_id` is used when the definition carries no `name`. Returns
/// `None` for containers that are not visuals (visual groups).
pub fn extract_visual(definition: &Value, page: &str, fallback_id: &str) -> Option<ReportVisual> {
    let body = definition
        .get("visual")
        .or_else(|| definition.get("singleVisual"))?;

    let id = definition
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or(fallback_id);
    let visual_type = body
        .get("visualType")
        .and_then(Value::as_str)
        .unwrap_or_default();

    let mut visual = ReportVisual::new(id, visual_type, page);
    visual.fields = extract_fields(body);
    visual.filters = extract_filters(definition);
    Some(visual)
}

/// Fields bound in a visual body's projection slots and prototype query
pub fn extract_fields(body: &Value) -> VisualFields {
    let mut fields = VisualFields::default();
    let no_aliases = Aliases::new();

    if let Some(state) = body.pointer("/query/queryState") {
        for slot in PROJECTION_SLOTS {
            let projections = state
                .get(slot)
                .and_then(|s| s.get("projections"))
                .and_then(Value::as_array);
            for projection in projections.into_iter().flatten() {
                if let Some(field) = projection.get("field") {
                    fields.extend(field_ref(field, &no_aliases));
                }
            }
        }
    }

    let prototype = body
        .get("prototypeQuery")
        .or_else(|| body.pointer("/query/prototypeQuery"));
    if let Some(query) = prototype {
        let aliases = from_aliases(query);
        let selects = query.get("Select").and_then(Value::as_array);
        for item in selects.into_iter().flatten() {
            fields.extend(field_ref(item, &aliases));
        }
    }

    fields
}

/// Fields referenced by a visual's filters
pub fn extract_filters(definition: &Value) -> VisualFields {
    let mut fields = VisualFields::default();
    let no_aliases = Aliases::new();

    let filters = definition
        .pointer("/filterConfig/filters")
        .and_then(Value::as_array);
    for filter in filters.into_iter().flatten() {
        if let Some(field) = filter.get("field") {
            fields.extend(field_ref(field, &no_aliases));
        }
    }

    fields
}

/// Interpret one field expression
pub fn field_ref(field: &Value, aliases: &Aliases) -> Option<FieldRef> {
    if let Some(column) = field.get("Column") {
        let (table, name) = property_of(column, aliases)?;
        return Some(FieldRef::Column(ColumnField::new(table, name)));
    }

    if let Some(measure) = field.get("Measure") {
        let (table, name) = property_of(measure, aliases)?;
        return Some(FieldRef::Measure(MeasureField::new(table, name)));
    }

    if let Some(aggregation) = field.get("Aggregation") {
        return aggregation
            .get("Expression")
            .and_then(|inner| field_ref(inner, aliases));
    }

    if let Some(level) = field.get("HierarchyLevel") {
        return hierarchy_level(level, aliases);
    }

    None
}

/// `{ Expression: { SourceRef }, Property }` → `(table, property)`
fn property_of(node: &Value, aliases: &Aliases) -> Option<(String, String)> {
    let property = node.get("Property").and_then(Value::as_str)?;
    let table = source_entity(node.get("Expression")?, aliases)?;
    Some((table, property.to_string()))
}

/// Entity named by a `SourceRef`, directly or through a `From` alias
fn source_entity(expression: &Value, aliases: &Aliases) -> Option<String> {
    let source_ref = expression.get("SourceRef")?;

    if let Some(entity) = source_ref.get("Entity").and_then(Value::as_str) {
        return Some(entity.to_string());
    }

    let alias = source_ref.get("Source").and_then(Value::as_str)?;
    aliases.get(alias).cloned()
}

/// A hierarchy level binds the column the level is named after
///
/// Auto date hierarchies go through a `PropertyVariationSource`, whose
/// `Property` is the underlying date column.
fn hierarchy_level(level: &Value, aliases: &Aliases) -> Option<FieldRef> {
    let hierarchy = level.get("Expression")?.get("Hierarchy")?;
    let expression = hierarchy.get("Expression")?;

    if let Some(variation) = expression.get("PropertyVariationSource") {
        let (table, column) = property_of(variation, aliases)?;
        return Some(FieldRef::Column(ColumnField::new(table, column)));
    }

    let table = source_entity(expression, aliases)?;
    let name = level.get("Level").and_then(Value::as_str)?;
    Some(FieldRef::Column(ColumnField::new(table, name)))
}

fn from_aliases(query: &Value) -> Aliases {
    query
        .get("From")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|from| {
            let name = from.get("Name")?.as_str()?;
            let entity = from.get("Entity")?.as_str()?;
            Some((name.to_string(), entity.to_string()))
        })
        .collect()
}
