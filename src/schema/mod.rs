//! Attribute model shared by the mappers, the schema reconciler and the stores
//!
//! All types here are immutable values. Schemas are rebuilt from a describe call or from an
//! entity's descriptors and compared by attribute name.

mod attribute;
mod entity;
mod validation;

pub use attribute::{AttributeConstraint, AttributeConstraintType, AttributeDefinition, AttributeType};
pub use entity::{EntitySchema, Index};
pub use validation::{SchemaValidationError, SchemaValidationErrorType, SchemaValidationScope};
