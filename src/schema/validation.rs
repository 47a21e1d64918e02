use serde::{Deserialize, Serialize};
use std::fmt;

use super::{AttributeDefinition, AttributeType};

/// What kind of mismatch a validation error reports
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchemaValidationErrorType {
    /// The entity expects an attribute the table does not have
    MissingInTable,
    /// The table has an attribute the entity does not map
    MissingInEntity,
    /// The table stores the attribute with an incompatible type
    WrongType,
    /// An embeddable type embeds itself
    RecursiveDependency,
    /// The table does not exist
    TableNotFound,
    /// Any other problem
    General,
}

/// Whether a validation error concerns a whole table or one attribute
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchemaValidationScope {
    /// Table level
    Table,
    /// Attribute level
    Attribute,
}

/// Structured schema validation error
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaValidationError {
    error_type: SchemaValidationErrorType,
    scope: SchemaValidationScope,
    identifier: String,
    message: String,
    primary_key: bool,
}

impl SchemaValidationError {
    fn attribute(
        error_type: SchemaValidationErrorType,
        attribute: &AttributeDefinition,
        message: String,
    ) -> Self {
        Self {
            error_type,
            scope: SchemaValidationScope::Attribute,
            identifier: attribute.name().to_string(),
            message,
            primary_key: attribute.is_primary_key(),
        }
    }

    /// Expected attribute absent from the table
    pub fn missing_in_table(attribute: &AttributeDefinition) -> Self {
        Self::attribute(
            SchemaValidationErrorType::MissingInTable,
            attribute,
            format!("Attribute {} not found in table", attribute.name()),
        )
    }

    /// Table attribute the entity does not map
    pub fn missing_in_entity(attribute: &AttributeDefinition) -> Self {
        Self::attribute(
            SchemaValidationErrorType::MissingInEntity,
            attribute,
            format!("Attribute {} not mapped by the entity", attribute.name()),
        )
    }

    /// Attribute stored with an incompatible type
    pub fn wrong_type(attribute: &AttributeDefinition, stored: AttributeType) -> Self {
        Self::attribute(
            SchemaValidationErrorType::WrongType,
            attribute,
            format!(
                "Attribute {} is stored as {}, expected {}",
                attribute.name(),
                stored,
                attribute.attribute_type()
            ),
        )
    }

    /// Attribute-level error that fits no other kind
    pub fn general(attribute: &AttributeDefinition, message: impl Into<String>) -> Self {
        Self::attribute(SchemaValidationErrorType::General, attribute, message.into())
    }

    /// An embeddable type reachable from itself through `field`
    pub fn recursive_dependency(field: impl Into<String>, type_name: &str) -> Self {
        let field = field.into();
        Self {
            error_type: SchemaValidationErrorType::RecursiveDependency,
            scope: SchemaValidationScope::Attribute,
            message: format!(
                "Field {} embeds {} recursively, the branch is skipped",
                field, type_name
            ),
            identifier: field,
            primary_key: false,
        }
    }

    /// Table does not exist
    pub fn table_not_found(table: &str) -> Self {
        Self {
            error_type: SchemaValidationErrorType::TableNotFound,
            scope: SchemaValidationScope::Table,
            identifier: table.to_string(),
            message: format!("Table {} not found", table),
            primary_key: false,
        }
    }

    /// Table-level error that fits no other kind
    pub fn table(table: &str, message: impl Into<String>) -> Self {
        Self {
            error_type: SchemaValidationErrorType::General,
            scope: SchemaValidationScope::Table,
            identifier: table.to_string(),
            message: message.into(),
            primary_key: false,
        }
    }

    /// Error kind
    pub fn error_type(&self) -> SchemaValidationErrorType {
        self.error_type
    }

    /// Error scope
    pub fn scope(&self) -> SchemaValidationScope {
        self.scope
    }

    /// Attribute name, field path or table name the error is about
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Human readable message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the error concerns the primary key attribute
    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }
}

impl fmt::Display for SchemaValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}: {}", self.error_type, self.identifier, self.message)
    }
}
