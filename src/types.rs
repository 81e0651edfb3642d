//! Convenience types exchanged with the host.

use serde::{Deserialize, Serialize};

/// A change to a single attribute during a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// The path to the attribute that changed.
    pub path: String,
    /// The value before the change (None if creating).
    pub before: Option<serde_json::Value>,
    /// The value after the change (None if deleting).
    pub after: Option<serde_json::Value>,
}

impl AttributeChange {
    /// Create a new attribute change.
    pub fn new(
        path: impl Into<String>,
        before: Option<serde_json::Value>,
        after: Option<serde_json::Value>,
    ) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }

    /// Create a change for a new attribute.
    pub fn added(path: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(path, None, Some(value))
    }

    /// Create a change for a removed attribute.
    pub fn removed(path: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(path, Some(value), None)
    }

    /// Create a change for a modified attribute.
    pub fn modified(
        path: impl Into<String>,
        before: serde_json::Value,
        after: serde_json::Value,
    ) -> Self {
        Self::new(path, Some(before), Some(after))
    }
}

/// The result of a plan operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// The planned state after the operation.
    pub planned_state: serde_json::Value,
    /// The list of attribute changes.
    pub changes: Vec<AttributeChange>,
    /// Whether the resource requires replacement.
    pub requires_replace: bool,
}

impl PlanResult {
    /// Create a plan result with no changes.
    pub fn no_change(state: serde_json::Value) -> Self {
        Self {
            planned_state: state,
            changes: Vec::new(),
            requires_replace: false,
        }
    }

    /// Create a plan result with changes.
    pub fn with_changes(
        planned_state: serde_json::Value,
        changes: Vec<AttributeChange>,
        requires_replace: bool,
    ) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }

    /// Whether the plan changes anything.
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// A resource brought under management by import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// The resource type.
    pub resource_type: String,
    /// The imported state.
    pub state: serde_json::Value,
}

impl ImportedResource {
    /// Create a new imported resource.
    pub fn new(resource_type: impl Into<String>, state: serde_json::Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// Provider metadata: the resource types this provider manages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// Provider type name.
    pub type_name: String,
    /// Provider version.
    pub version: String,
    /// List of resource type names.
    pub resources: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_change_constructors() {
        let added = AttributeChange::added("name", json!("products"));
        assert!(added.before.is_none());
        assert_eq!(added.after, Some(json!("products")));

        let removed = AttributeChange::removed("name", json!("old"));
        assert_eq!(removed.before, Some(json!("old")));
        assert!(removed.after.is_none());

        let modified = AttributeChange::modified("title", json!("a"), json!("b"));
        assert_eq!(modified.before, Some(json!("a")));
        assert_eq!(modified.after, Some(json!("b")));
    }

    #[test]
    fn test_plan_result() {
        let no_change = PlanResult::no_change(json!({"id": "ix-1"}));
        assert!(!no_change.has_changes());
        assert!(!no_change.requires_replace);

        let with_changes = PlanResult::with_changes(
            json!({"id": "ix-1", "name": "new"}),
            vec![AttributeChange::modified("name", json!("old"), json!("new"))],
            false,
        );
        assert!(with_changes.has_changes());
        assert_eq!(with_changes.changes.len(), 1);
    }

    #[test]
    fn test_imported_resource() {
        let imported = ImportedResource::new("coveo_index", json!({"id": "ix-1"}));
        assert_eq!(imported.resource_type, "coveo_index");
        assert_eq!(imported.state["id"], "ix-1");
    }
}
