use aws_sdk_dynamodb::types::AttributeValue;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Scalar type of a stored attribute
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttributeType {
    /// String attribute (`S`)
    String,
    /// Number attribute (`N`)
    Number,
    /// Boolean attribute (`BOOL`)
    Boolean,
}

impl AttributeType {
    /// Infer the attribute type of a raw value
    ///
    /// Returns `None` for nulls and for the document/set/binary types the mapper does not use.
    pub fn of(value: &AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::S(_) => Some(AttributeType::String),
            AttributeValue::N(_) => Some(AttributeType::Number),
            AttributeValue::Bool(_) => Some(AttributeType::Boolean),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttributeType::String => "STRING",
            AttributeType::Number => "NUMBER",
            AttributeType::Boolean => "BOOLEAN",
        };
        f.write_str(name)
    }
}

/// Kind of constraint carried by an attribute
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttributeConstraintType {
    /// The attribute is the table's partition key
    PrimaryKey,
}

/// A property of an attribute, with an optional value
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeConstraint {
    constraint_type: AttributeConstraintType,
    value: Option<String>,
}

impl AttributeConstraint {
    /// Primary key constraint
    pub fn primary_key() -> Self {
        Self {
            constraint_type: AttributeConstraintType::PrimaryKey,
            value: None,
        }
    }

    /// Constraint kind
    pub fn constraint_type(&self) -> AttributeConstraintType {
        self.constraint_type
    }

    /// Constraint value, if any
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

/// One flattened, storable attribute
///
/// Two definitions are equal when their names are equal; type and constraints do not take part
/// in equality or hashing. `Borrow<str>` lets attribute maps be looked up by name.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttributeDefinition {
    name: String,
    attribute_type: AttributeType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    constraints: Vec<AttributeConstraint>,
}

impl AttributeDefinition {
    /// Create an unconstrained attribute
    pub fn new(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attribute_type,
            constraints: Vec::new(),
        }
    }

    /// Create a primary key attribute
    pub fn primary_key(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self::new(name, attribute_type).with_constraint(AttributeConstraint::primary_key())
    }

    /// Add a constraint, ignoring duplicates
    pub fn with_constraint(mut self, constraint: AttributeConstraint) -> Self {
        if !self.constraints.contains(&constraint) {
            self.constraints.push(constraint);
        }
        self
    }

    /// Dotted attribute name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute type
    pub fn attribute_type(&self) -> AttributeType {
        self.attribute_type
    }

    /// Constraints carried by the attribute
    pub fn constraints(&self) -> &[AttributeConstraint] {
        &self.constraints
    }

    /// Whether the attribute carries the primary key constraint
    pub fn is_primary_key(&self) -> bool {
        self.constraints
            .iter()
            .any(|c| c.constraint_type() == AttributeConstraintType::PrimaryKey)
    }

    /// Consume the definition and keep its name
    pub fn into_name(self) -> String {
        self.name
    }
}

impl PartialEq for AttributeDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for AttributeDefinition {}

impl Hash for AttributeDefinition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl Borrow<str> for AttributeDefinition {
    fn borrow(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for AttributeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.attribute_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};

    #[test]
    fn test_equality_by_name_only() {
        let a = AttributeDefinition::new("amount", AttributeType::Number);
        let b = AttributeDefinition::primary_key("amount", AttributeType::String);
        assert_eq!(a, b);

        let mut set = HashSet::new();
        assert!(set.insert(a));
        assert!(!set.insert(b));
    }

    #[test]
    fn test_map_lookup_by_name() {
        let mut map = HashMap::new();
        let _ = map.insert(
            AttributeDefinition::new("merchant.id", AttributeType::String),
            AttributeValue::S("m-1".into()),
        );
        assert_eq!(
            map.get("merchant.id"),
            Some(&AttributeValue::S("m-1".into()))
        );
        assert!(map.get("merchant").is_none());
    }

    #[test]
    fn test_primary_key_constraint_is_not_duplicated() {
        let def = AttributeDefinition::primary_key("id", AttributeType::String)
            .with_constraint(AttributeConstraint::primary_key());
        assert!(def.is_primary_key());
        assert_eq!(def.constraints().len(), 1);
    }

    #[test]
    fn test_type_of_value() {
        assert_eq!(
            AttributeType::of(&AttributeValue::N("1".into())),
            Some(AttributeType::Number)
        );
        assert_eq!(
            AttributeType::of(&AttributeValue::Bool(true)),
            Some(AttributeType::Boolean)
        );
        assert_eq!(AttributeType::of(&AttributeValue::Null(true)), None);
        assert_eq!(AttributeType::Number.to_string(), "NUMBER");
    }
}
