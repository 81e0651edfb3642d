//! Plan computation from a resource schema.
//!
//! Planning is schema driven: computed attributes are carried over from prior
//! state (or left unknown on create), every other attribute is diffed, and a
//! change to any `force_new` attribute turns the update into a replacement.

use serde_json::{Map, Value};

use crate::schema::Schema;
use crate::types::{AttributeChange, PlanResult};

/// Compute the plan for one resource instance.
///
/// - `prior == None` plans a create
/// - `proposed == Null` plans a delete
/// - otherwise an in-place update, or a replacement if a `force_new` attribute changed
pub fn plan_resource(schema: &Schema, prior: Option<&Value>, proposed: &Value) -> PlanResult {
    let prior = prior.filter(|p| !p.is_null());

    match (prior, proposed) {
        (Some(prior), Value::Null) => plan_delete(schema, prior),
        (None, Value::Object(proposed)) => plan_create(schema, proposed),
        (Some(Value::Object(prior)), Value::Object(proposed)) => {
            plan_update(schema, prior, proposed)
        },
        _ => PlanResult::no_change(proposed.clone()),
    }
}

fn plan_create(schema: &Schema, proposed: &Map<String, Value>) -> PlanResult {
    let mut planned = proposed.clone();
    let mut changes = Vec::new();

    for (name, attr) in &schema.attributes {
        if attr.flags.is_computed_only() {
            // Unknown until the API assigns it.
            planned.entry(name.clone()).or_insert(Value::Null);
            continue;
        }
        if let Some(value) = proposed.get(name).filter(|v| !v.is_null()) {
            changes.push(AttributeChange::added(name.clone(), value.clone()));
        }
    }

    PlanResult::with_changes(Value::Object(planned), changes, false)
}

fn plan_update(
    schema: &Schema,
    prior: &Map<String, Value>,
    proposed: &Map<String, Value>,
) -> PlanResult {
    let mut changes = Vec::new();
    let mut requires_replace = false;

    for (name, attr) in &schema.attributes {
        if attr.flags.is_computed_only() {
            continue;
        }
        let before = prior.get(name).cloned().unwrap_or(Value::Null);
        let after = proposed.get(name).cloned().unwrap_or(Value::Null);
        if before != after {
            requires_replace |= attr.force_new;
            changes.push(AttributeChange::modified(name.clone(), before, after));
        }
    }

    if changes.is_empty() {
        return PlanResult::no_change(Value::Object(prior.clone()));
    }

    let mut planned = proposed.clone();
    for (name, attr) in &schema.attributes {
        if attr.flags.is_computed_only() {
            let carried = if requires_replace {
                Value::Null
            } else {
                prior.get(name).cloned().unwrap_or(Value::Null)
            };
            planned.insert(name.clone(), carried);
        }
    }

    PlanResult::with_changes(Value::Object(planned), changes, requires_replace)
}

fn plan_delete(schema: &Schema, prior: &Value) -> PlanResult {
    let changes = schema
        .attributes
        .keys()
        .filter_map(|name| {
            prior
                .get(name)
                .filter(|v| !v.is_null())
                .map(|v| AttributeChange::removed(name.clone(), v.clone()))
        })
        .collect();

    PlanResult::with_changes(Value::Null, changes, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;
    use serde_json::json;

    fn document_schema() -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("title", Attribute::required_string())
            .with_attribute("content", Attribute::required_string())
            .with_attribute("source_id", Attribute::required_string().with_force_new())
    }

    #[test]
    fn test_plan_create_leaves_computed_unknown() {
        let plan = plan_resource(
            &document_schema(),
            None,
            &json!({"title": "T", "content": "C", "source_id": "src1"}),
        );

        assert!(plan.has_changes());
        assert!(!plan.requires_replace);
        assert_eq!(plan.changes.len(), 3);
        assert_eq!(plan.planned_state["id"], Value::Null);
        assert_eq!(plan.planned_state["title"], "T");
    }

    #[test]
    fn test_plan_update_in_place() {
        let prior = json!({"id": "doc-9", "title": "T", "content": "C", "source_id": "src1"});
        let proposed = json!({"title": "T2", "content": "C", "source_id": "src1"});

        let plan = plan_resource(&document_schema(), Some(&prior), &proposed);

        assert!(!plan.requires_replace);
        assert_eq!(plan.changes.len(), 1);
        assert_eq!(plan.changes[0].path, "title");
        assert_eq!(plan.planned_state["id"], "doc-9");
        assert_eq!(plan.planned_state["title"], "T2");
    }

    #[test]
    fn test_plan_source_change_forces_replacement() {
        let prior = json!({"id": "doc-9", "title": "T", "content": "C", "source_id": "src1"});
        let proposed = json!({"title": "T", "content": "C", "source_id": "src2"});

        let plan = plan_resource(&document_schema(), Some(&prior), &proposed);

        assert!(plan.requires_replace);
        assert_eq!(plan.planned_state["id"], Value::Null);
    }

    #[test]
    fn test_plan_no_change_keeps_prior() {
        let prior = json!({"id": "doc-9", "title": "T", "content": "C", "source_id": "src1"});
        let proposed = json!({"title": "T", "content": "C", "source_id": "src1"});

        let plan = plan_resource(&document_schema(), Some(&prior), &proposed);

        assert!(!plan.has_changes());
        assert_eq!(plan.planned_state, prior);
    }

    #[test]
    fn test_plan_delete() {
        let prior = json!({"id": "doc-9", "title": "T", "content": "C", "source_id": "src1"});

        let plan = plan_resource(&document_schema(), Some(&prior), &Value::Null);

        assert_eq!(plan.planned_state, Value::Null);
        assert_eq!(plan.changes.len(), 4);
        assert!(plan.changes.iter().all(|c| c.after.is_none()));
    }
}
