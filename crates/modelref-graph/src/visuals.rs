//! Usage edges from report visuals

use modelref_core::ObjectRef;
use modelref_report::ReportVisual;
use serde::{Deserialize, Serialize};

use crate::graph::NodeKind;

/// One field bound by one visual
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualUsage {
    pub visual_id: String,
    pub visual_type: String,
    pub page: String,
    pub object: ObjectRef,
    pub kind: NodeKind,

    /// Bound only through the visual's filters
    #[serde(default)]
    pub via_filter: bool,
}

impl VisualUsage {
    pub fn refers_to(&self, object: &ObjectRef) -> bool {
        self.object.matches(&object.table, &object.name)
    }
}

/// Flatten visuals into field usage edges
///
/// Projection fields come first for each visual, then filter fields.
pub fn visual_field_usage<'a>(visuals: impl IntoIterator<Item = &'a ReportVisual>) -> Vec<VisualUsage> {
    let mut usage = Vec::new();

    for visual in visuals {
        let edge = |object: ObjectRef, kind: NodeKind, via_filter: bool| VisualUsage {
            visual_id: visual.id.clone(),
            visual_type: visual.visual_type.clone(),
            page: visual.page.clone(),
            object,
            kind,
            via_filter,
        };

        for (fields, via_filter) in [(&visual.fields, false), (&visual.filters, true)] {
            usage.extend(
                fields
                    .measures
                    .iter()
                    .map(|m| edge(m.object_ref(), NodeKind::Measure, via_filter)),
            );
            usage.extend(
                fields
                    .columns
                    .iter()
                    .map(|c| edge(c.object_ref(), NodeKind::Column, via_filter)),
            );
        }
    }

    tracing::debug!(edges = usage.len(), "collected visual field usage");
    usage
}
