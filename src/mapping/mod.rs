//! Bidirectional entity/attribute mapping
//!
//! [`EntityToItemMapper`] flattens a record into an [`AttributeMap`]; [`ItemToEntityMapper`]
//! rebuilds it, resolving many-to-one references through a [`RepositoryRegistry`]. Embedded
//! value objects become dotted attributes (`attachment.location`) at any depth.

pub mod schema;
mod registry;
mod strategy;

pub use registry::{EntityLookup, RepositoryRegistry};
pub use schema::{EntitySchemaSupport, ExpectedAttribute, ExpectedSchema};
pub use strategy::MappingStrategy;

use aws_sdk_dynamodb::types::AttributeValue;
use log::warn;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::Error;
use crate::entity::{
    EmbeddedAccess, EntityIdHandler, FieldAccess, FieldDescriptor, Record, RecordKind, fields_of,
};
use crate::schema::{AttributeDefinition, AttributeType};
use crate::store::Item;

/// Flattened representation of one record
pub type AttributeMap = HashMap<AttributeDefinition, AttributeValue>;

pub(crate) fn nested_prefix(prefix: &str, field: &str) -> String {
    format!("{}{}.", prefix, field)
}

/// Embedded accessor of `field`, if it is an embedded field
pub(crate) fn embedded_access<T: Record>(
    field: &FieldDescriptor<T>,
) -> Result<Option<&dyn EmbeddedAccess<T>>, Error> {
    match field.access() {
        FieldAccess::Embedded(access) if access.nested_kind() == RecordKind::Embeddable => {
            Ok(Some(access.as_ref()))
        }
        FieldAccess::Embedded(access) => Err(Error::NotEmbeddable {
            record: T::type_name(),
            field: field.name(),
            declared: access.nested_name(),
        }),
        _ => Ok(None),
    }
}

pub(crate) fn flatten_into<R: Record>(
    record: &R,
    prefix: &str,
    out: &mut AttributeMap,
) -> Result<(), Error> {
    for field in fields_of::<R>().iter() {
        if let Some(embedded) = embedded_access(field)? {
            embedded.flatten(record, &nested_prefix(prefix, field.name()), out)?;
            continue;
        }

        let strategy = MappingStrategy::for_field(field)?;
        out.extend(strategy.to_attributes(record, field, prefix)?);
    }

    Ok(())
}

pub(crate) async fn unflatten_into<R: Record>(
    record: &mut R,
    attributes: &AttributeMap,
    prefix: &str,
    registry: &RepositoryRegistry,
) -> Result<(), Error> {
    let fields = fields_of::<R>();

    for field in fields.iter() {
        if let Some(embedded) = embedded_access(field)? {
            embedded
                .unflatten(
                    record,
                    attributes,
                    nested_prefix(prefix, field.name()),
                    registry,
                )
                .await?;
            continue;
        }

        MappingStrategy::for_field(field)?
            .from_attributes(record, field, attributes, prefix, registry)
            .await?;
    }

    Ok(())
}

/// Flattens records into attribute maps
#[derive(Debug)]
pub struct EntityToItemMapper<T> {
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> Default for EntityToItemMapper<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> EntityToItemMapper<T> {
    /// Mapper for `T`
    pub fn new() -> Self {
        Self {
            _record: PhantomData,
        }
    }

    /// Flatten `record`
    ///
    /// Absent values appear as `NULL`; embedded values that are `None` produce no attributes.
    pub fn map(&self, record: &T) -> Result<AttributeMap, Error> {
        let mut out = AttributeMap::new();
        flatten_into(record, "", &mut out)?;
        Ok(out)
    }
}

/// Rebuilds records from attribute maps
#[derive(Debug)]
pub struct ItemToEntityMapper<T> {
    registry: Arc<RepositoryRegistry>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> ItemToEntityMapper<T> {
    /// Mapper for `T` resolving references through `registry`
    pub fn new(registry: Arc<RepositoryRegistry>) -> Self {
        Self {
            registry,
            _record: PhantomData,
        }
    }

    /// Rebuild a record from `attributes`
    ///
    /// Entities must come back with their id, otherwise [`Error::MissingPrimaryKey`] is raised.
    pub async fn map(&self, attributes: &AttributeMap) -> Result<T, Error> {
        let mut record = T::default();
        unflatten_into(&mut record, attributes, "", &self.registry).await?;

        if T::KIND == RecordKind::Entity && EntityIdHandler::<T>::new()?.get(&record).is_none() {
            return Err(Error::MissingPrimaryKey {
                record: T::type_name(),
            });
        }

        Ok(record)
    }
}

/// Turn a raw item into an attribute map, inferring attribute types from values
///
/// `NULL` values are skipped with a warning so older items with fewer attributes still load.
pub fn attributes_from_item(item: Item) -> Result<AttributeMap, Error> {
    let mut attributes = AttributeMap::with_capacity(item.len());

    for (name, value) in item {
        if matches!(value, AttributeValue::Null(_)) {
            warn!("Attribute {} is null in stored item, skipping it", name);
            continue;
        }

        let attribute_type =
            AttributeType::of(&value).ok_or_else(|| Error::UnsupportedAttributeValue {
                attribute: name.clone(),
            })?;
        let _ = attributes.insert(AttributeDefinition::new(name, attribute_type), value);
    }

    Ok(attributes)
}

/// Turn an attribute map into a raw item, dropping `NULL` values
pub fn item_from_attributes(attributes: AttributeMap) -> Item {
    attributes
        .into_iter()
        .filter(|(_, value)| !matches!(value, AttributeValue::Null(_)))
        .map(|(definition, value)| (definition.into_name(), value))
        .collect()
}
