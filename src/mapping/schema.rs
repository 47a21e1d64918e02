//! Expected schema derivation and comparison with live tables

use std::any::TypeId;
use std::marker::PhantomData;

use super::{MappingStrategy, embedded_access, nested_prefix};
use crate::Error;
use crate::entity::{DeclaredType, Entity, Record, fields_of};
use crate::schema::{AttributeDefinition, AttributeType, EntitySchema, SchemaValidationError};

/// An attribute the entity expects, with the strategy that will read it
#[derive(Clone, Debug)]
pub struct ExpectedAttribute {
    definition: AttributeDefinition,
    strategy: MappingStrategy,
    declared: DeclaredType,
}

impl ExpectedAttribute {
    /// Attribute definition
    pub fn definition(&self) -> &AttributeDefinition {
        &self.definition
    }

    /// Owning strategy
    pub fn strategy(&self) -> MappingStrategy {
        self.strategy
    }

    /// Whether a stored attribute of type `stored` can be read into this field
    pub fn accepts(&self, stored: AttributeType) -> bool {
        self.strategy.check_compatible(&self.declared, stored)
    }
}

/// Flattened attributes an entity expects, plus the problems found while deriving them
#[derive(Clone, Debug, Default)]
pub struct ExpectedSchema {
    attributes: Vec<ExpectedAttribute>,
    errors: Vec<SchemaValidationError>,
}

impl ExpectedSchema {
    /// Expected attributes, in declaration order
    pub fn attributes(&self) -> &[ExpectedAttribute] {
        &self.attributes
    }

    /// Recursive dependency errors met during the walk
    pub fn errors(&self) -> &[SchemaValidationError] {
        &self.errors
    }

    /// Attribute definitions only
    pub fn definitions(&self) -> Vec<AttributeDefinition> {
        self.attributes
            .iter()
            .map(|attribute| attribute.definition.clone())
            .collect()
    }

    /// Find an expected attribute by name
    pub fn attribute(&self, name: &str) -> Option<&ExpectedAttribute> {
        self.attributes
            .iter()
            .find(|attribute| attribute.definition.name() == name)
    }
}

/// Walk the fields of `R` under `prefix`, recursing into embedded types
///
/// `path` holds the record types already entered on the current branch. A type met again on
/// its own path yields one recursive dependency error and the branch stops there.
pub(crate) fn describe_into<R: Record>(
    prefix: &str,
    path: &mut Vec<TypeId>,
    out: &mut ExpectedSchema,
) -> Result<(), Error> {
    for field in fields_of::<R>().iter() {
        if let Some(embedded) = embedded_access(field)? {
            if path.contains(&embedded.nested_type()) {
                out.errors.push(SchemaValidationError::recursive_dependency(
                    format!("{}{}", prefix, field.name()),
                    embedded.nested_name(),
                ));
                continue;
            }

            path.push(embedded.nested_type());
            let described = embedded.describe(&nested_prefix(prefix, field.name()), path, out);
            let _ = path.pop();
            described?;
            continue;
        }

        let strategy = MappingStrategy::for_field(field)?;
        if let Some(definition) = strategy.describe_expected_attribute(field, prefix)? {
            out.attributes.push(ExpectedAttribute {
                definition,
                strategy,
                declared: field.declared_type().clone(),
            });
        }
    }

    Ok(())
}

/// Compares an entity's expected attributes with a live table schema
#[derive(Debug)]
pub struct EntitySchemaSupport<E> {
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Default for EntitySchemaSupport<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> EntitySchemaSupport<E> {
    /// Schema support for `E`
    pub fn new() -> Self {
        Self {
            _entity: PhantomData,
        }
    }

    /// Expected flattened attributes of `E`
    pub fn expected_schema(&self) -> Result<ExpectedSchema, Error> {
        let mut out = ExpectedSchema::default();
        let mut path = vec![TypeId::of::<E>()];
        describe_into::<E>("", &mut path, &mut out)?;
        Ok(out)
    }

    /// Expected schema as an [`EntitySchema`], with the declared indexes
    pub fn expected_entity_schema(&self) -> Result<EntitySchema, Error> {
        Ok(EntitySchema::new(
            E::TABLE,
            self.expected_schema()?.definitions(),
            E::indexes(),
        ))
    }

    /// Check every expected attribute against `live`
    ///
    /// Without a live schema every attribute gets a general error. Live attributes the entity
    /// does not map are reported after the expected ones. Recursive dependency errors from the
    /// expected schema are always included.
    pub fn validate_schema(
        &self,
        live: Option<&EntitySchema>,
    ) -> Result<Vec<SchemaValidationError>, Error> {
        let expected = self.expected_schema()?;
        let mut errors = expected.errors.clone();

        for attribute in expected.attributes() {
            let definition = attribute.definition();

            let Some(live) = live else {
                errors.push(SchemaValidationError::general(
                    definition,
                    "Table description not available",
                ));
                continue;
            };

            match live.attribute(definition.name()) {
                Some(stored) if !attribute.accepts(stored.attribute_type()) => {
                    errors.push(SchemaValidationError::wrong_type(
                        definition,
                        stored.attribute_type(),
                    ));
                }
                Some(_) => {}
                None => errors.push(SchemaValidationError::missing_in_table(definition)),
            }
        }

        if let Some(live) = live {
            errors.extend(
                live.attributes()
                    .iter()
                    .filter(|attribute| expected.attribute(attribute.name()).is_none())
                    .map(SchemaValidationError::missing_in_entity),
            );
        }

        Ok(errors)
    }

    /// Expected attributes absent from `live`
    ///
    /// Fails when an attribute exists with an incompatible type, since adding it would not fix
    /// the table.
    pub fn missing_fields_in_table(
        &self,
        live: &EntitySchema,
    ) -> Result<Vec<AttributeDefinition>, Error> {
        let expected = self.expected_schema()?;
        let mut missing = Vec::new();

        for attribute in expected.attributes() {
            let definition = attribute.definition();
            match live.attribute(definition.name()) {
                Some(stored) if !attribute.accepts(stored.attribute_type()) => {
                    return Err(Error::IncompatibleAttributeType {
                        attribute: definition.name().to_string(),
                        expected: definition.attribute_type(),
                        found: stored.attribute_type().to_string(),
                    });
                }
                Some(_) => {}
                None => missing.push(definition.clone()),
            }
        }

        Ok(missing)
    }

    /// Live attributes the entity does not map
    pub fn missing_attributes_in_entity(
        &self,
        live: &EntitySchema,
    ) -> Result<Vec<AttributeDefinition>, Error> {
        let expected = self.expected_schema()?;

        Ok(live
            .attributes()
            .iter()
            .filter(|attribute| expected.attribute(attribute.name()).is_none())
            .cloned()
            .collect())
    }
}
