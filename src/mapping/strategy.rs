use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, Utc};
use log::warn;

use super::{AttributeMap, RepositoryRegistry};
use crate::Error;
use crate::entity::{DeclaredType, FieldAccess, FieldDescriptor, FieldRole, Record};
use crate::schema::{AttributeConstraint, AttributeDefinition, AttributeType};

/// Field handler chosen by role
///
/// Roles are mutually exclusive, so at most one strategy of [`MappingStrategy::CHAIN`] handles a
/// given field. Embedded fields are handled by the mappers before the chain is consulted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MappingStrategy {
    /// Suppresses the field in both directions
    Transient,
    /// Rejects one-to-many relationships
    OneToMany,
    /// Stores a referenced entity by id
    ManyToOne,
    /// Stores dates as epoch milliseconds
    Temporal,
    /// Stores string, number and boolean values as they are
    Default,
}

impl MappingStrategy {
    /// Dispatch order; the first strategy that handles a field owns it
    pub const CHAIN: [MappingStrategy; 5] = [
        MappingStrategy::Transient,
        MappingStrategy::OneToMany,
        MappingStrategy::ManyToOne,
        MappingStrategy::Temporal,
        MappingStrategy::Default,
    ];

    /// Whether this strategy owns `field`
    pub fn handles<T>(self, field: &FieldDescriptor<T>) -> bool {
        let role = field.role();
        match self {
            MappingStrategy::Transient => role == FieldRole::Transient,
            MappingStrategy::OneToMany => role == FieldRole::OneToMany,
            MappingStrategy::ManyToOne => role == FieldRole::ManyToOne,
            MappingStrategy::Temporal => role == FieldRole::Temporal,
            MappingStrategy::Default => {
                matches!(role, FieldRole::Plain | FieldRole::Id | FieldRole::GeneratedId)
            }
        }
    }

    /// First strategy of the chain handling `field`
    pub fn for_field<T: Record>(field: &FieldDescriptor<T>) -> Result<Self, Error> {
        Self::CHAIN
            .into_iter()
            .find(|strategy| strategy.handles(field))
            .ok_or_else(|| unsupported_type(field))
    }

    /// Attribute the field is expected to be stored as, `None` when it is not stored
    pub fn describe_expected_attribute<T: Record>(
        self,
        field: &FieldDescriptor<T>,
        prefix: &str,
    ) -> Result<Option<AttributeDefinition>, Error> {
        let name = format!("{}{}", prefix, field.name());

        match self {
            MappingStrategy::Transient => Ok(None),
            MappingStrategy::OneToMany => Err(Error::UnsupportedRelationship {
                record: T::type_name(),
                field: field.name(),
            }),
            MappingStrategy::ManyToOne => match field.access() {
                FieldAccess::Reference(reference) => Ok(Some(AttributeDefinition::new(
                    format!("{}.{}", name, reference.target_id_field()?),
                    AttributeType::String,
                ))),
                _ => Err(unsupported_type(field)),
            },
            MappingStrategy::Temporal => Ok(Some(AttributeDefinition::new(
                name,
                AttributeType::Number,
            ))),
            MappingStrategy::Default => {
                let attribute_type =
                    scalar_type(field.declared_type()).ok_or_else(|| unsupported_type(field))?;
                let definition = AttributeDefinition::new(name, attribute_type);

                if field.is_id() && prefix.is_empty() {
                    Ok(Some(
                        definition.with_constraint(AttributeConstraint::primary_key()),
                    ))
                } else {
                    Ok(Some(definition))
                }
            }
        }
    }

    /// Whether a stored attribute type is acceptable for a field of `declared` type
    pub fn check_compatible(self, declared: &DeclaredType, stored: AttributeType) -> bool {
        match self {
            MappingStrategy::Transient => true,
            MappingStrategy::OneToMany => false,
            MappingStrategy::ManyToOne => stored == AttributeType::String,
            MappingStrategy::Temporal => stored == AttributeType::Number,
            MappingStrategy::Default => scalar_type(declared) == Some(stored),
        }
    }

    /// Attributes produced for `field` of `owner`
    ///
    /// Absent values are returned as `NULL` so callers can tell them apart from fields that are
    /// never stored.
    pub fn to_attributes<T: Record>(
        self,
        owner: &T,
        field: &FieldDescriptor<T>,
        prefix: &str,
    ) -> Result<Vec<(AttributeDefinition, AttributeValue)>, Error> {
        let Some(definition) = self.describe_expected_attribute(field, prefix)? else {
            return Ok(Vec::new());
        };

        let value = match (self, field.access()) {
            (MappingStrategy::ManyToOne, FieldAccess::Reference(reference)) => {
                reference.referenced_id(owner)?.map(AttributeValue::S)
            }
            (MappingStrategy::Temporal, FieldAccess::Temporal { get, .. }) => {
                get(owner).map(|date| AttributeValue::N(date.timestamp_millis().to_string()))
            }
            (MappingStrategy::Default, FieldAccess::Scalar { get, .. }) => Some(get(owner)?),
            (MappingStrategy::Default, FieldAccess::Identifier { get, .. }) => {
                get(owner).map(|id| AttributeValue::S(id.to_string()))
            }
            _ => return Err(unsupported_type(field)),
        };

        Ok(vec![(definition, value.unwrap_or(AttributeValue::Null(true)))])
    }

    /// Read `field` from `attributes` into `owner`
    ///
    /// Missing and `NULL` attributes leave the field untouched.
    pub(crate) async fn from_attributes<T: Record>(
        self,
        owner: &mut T,
        field: &FieldDescriptor<T>,
        attributes: &AttributeMap,
        prefix: &str,
        registry: &RepositoryRegistry,
    ) -> Result<(), Error> {
        let Some(definition) = self.describe_expected_attribute(field, prefix)? else {
            return Ok(());
        };

        let value = match attributes.get(definition.name()) {
            None | Some(AttributeValue::Null(_)) => return Ok(()),
            Some(value) => value,
        };

        match (self, field.access()) {
            (MappingStrategy::ManyToOne, FieldAccess::Reference(reference)) => {
                let AttributeValue::S(id) = value else {
                    return Err(incompatible(&definition, value));
                };

                if !reference.resolve(owner, id.clone(), registry).await? {
                    warn!(
                        "{} with id {} not found, leaving {} unset",
                        reference.target(),
                        id,
                        definition.name()
                    );
                }
                Ok(())
            }
            (MappingStrategy::Temporal, FieldAccess::Temporal { set, .. }) => {
                set(owner, epoch_millis(&definition, value)?);
                Ok(())
            }
            (MappingStrategy::Default, FieldAccess::Scalar { set, .. }) => {
                if AttributeType::of(value) != Some(definition.attribute_type()) {
                    return Err(incompatible(&definition, value));
                }
                set(owner, value.clone())
            }
            (MappingStrategy::Default, FieldAccess::Identifier { set, .. }) => match value {
                AttributeValue::S(id) => {
                    set(owner, id.clone());
                    Ok(())
                }
                other => Err(incompatible(&definition, other)),
            },
            _ => Err(unsupported_type(field)),
        }
    }
}

pub(crate) fn unsupported_type<T: Record>(field: &FieldDescriptor<T>) -> Error {
    Error::UnsupportedFieldType {
        record: T::type_name(),
        field: field.name(),
        declared: field.declared_type().to_string(),
    }
}

fn scalar_type(declared: &DeclaredType) -> Option<AttributeType> {
    match declared {
        DeclaredType::String => Some(AttributeType::String),
        DeclaredType::Number => Some(AttributeType::Number),
        DeclaredType::Boolean => Some(AttributeType::Boolean),
        _ => None,
    }
}

fn incompatible(definition: &AttributeDefinition, value: &AttributeValue) -> Error {
    let found = match AttributeType::of(value) {
        Some(attribute_type) => attribute_type.to_string(),
        None => "an unsupported value".to_string(),
    };

    Error::IncompatibleAttributeType {
        attribute: definition.name().to_string(),
        expected: definition.attribute_type(),
        found,
    }
}

fn epoch_millis(
    definition: &AttributeDefinition,
    value: &AttributeValue,
) -> Result<DateTime<Utc>, Error> {
    let AttributeValue::N(number) = value else {
        return Err(incompatible(definition, value));
    };

    let millis = match number.parse::<i64>() {
        Ok(millis) => Some(millis),
        Err(_) => number.parse::<f64>().ok().map(|millis| millis as i64),
    };

    millis
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .ok_or_else(|| Error::IncompatibleAttributeType {
            attribute: definition.name().to_string(),
            expected: AttributeType::Number,
            found: format!("number {} out of range for a date", number),
        })
}
