//! Change events exchanged with the catalog services.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Entity type whose changes are mirrored into the search index.
pub const FIELD_ENTITY: &str = "field";

/// Routing key prefix used by the catalog service when publishing.
pub const ROUTING_KEY_PREFIX: &str = "fields";

/// Notification that a catalog record changed.
///
/// The operation stays a plain string on the wire so that an unknown
/// operation still decodes; [`ChangeEvent::operation`] interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub operation: String,
    pub entity_id: String,
    pub entity_type: String,
}

impl ChangeEvent {
    pub fn new(
        operation: ChangeOperation,
        entity_id: impl Into<String>,
        entity_type: impl Into<String>,
    ) -> Self {
        Self {
            operation: operation.as_str().to_string(),
            entity_id: entity_id.into(),
            entity_type: entity_type.into(),
        }
    }

    /// Shorthand for a field event.
    pub fn field(operation: ChangeOperation, entity_id: impl Into<String>) -> Self {
        Self::new(operation, entity_id, FIELD_ENTITY)
    }

    pub fn operation(&self) -> Option<ChangeOperation> {
        self.operation.parse().ok()
    }

    pub fn is_field(&self) -> bool {
        self.entity_type == FIELD_ENTITY
    }

    pub fn routing_key(&self) -> String {
        format!("{ROUTING_KEY_PREFIX}.{}", self.entity_type)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeOperation {
    Create,
    Update,
    Delete,
}

impl ChangeOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeOperation::Create => "create",
            ChangeOperation::Update => "update",
            ChangeOperation::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown change operation `{0}`")]
pub struct UnknownOperation(pub String);

impl FromStr for ChangeOperation {
    type Err = UnknownOperation;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "create" => Ok(ChangeOperation::Create),
            "update" => Ok(ChangeOperation::Update),
            "delete" => Ok(ChangeOperation::Delete),
            other => Err(UnknownOperation(other.to_string())),
        }
    }
}
