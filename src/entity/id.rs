use std::fmt;
use std::sync::Arc;

use super::{FieldAccess, Record, fields_of};
use crate::Error;

/// Produces identifiers for entities saved without one
pub trait IdGenerator: Send + Sync + fmt::Debug {
    /// Generate a new identifier
    fn generate(&self) -> String;
}

/// Random (v4) UUID identifiers
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Lexicographically sortable ULID identifiers
#[derive(Clone, Copy, Debug, Default)]
pub struct UlidGenerator;

impl IdGenerator for UlidGenerator {
    fn generate(&self) -> String {
        rusty_ulid::generate_ulid_string()
    }
}

/// Reads, writes and generates the identifier of an entity type
pub struct EntityIdHandler<T> {
    field: &'static str,
    get: fn(&T) -> Option<&str>,
    set: fn(&mut T, String),
    generator: Option<Arc<dyn IdGenerator>>,
}

impl<T: Record> EntityIdHandler<T> {
    /// Locate the id field of `T`
    pub fn new() -> Result<Self, Error> {
        fields_of::<T>()
            .iter()
            .find_map(|field| match field.access() {
                FieldAccess::Identifier {
                    get,
                    set,
                    generator,
                } => Some(Self {
                    field: field.name(),
                    get: *get,
                    set: *set,
                    generator: generator.clone(),
                }),
                _ => None,
            })
            .ok_or(Error::MissingIdField {
                record: T::type_name(),
            })
    }

    /// Name of the id field
    pub fn field_name(&self) -> &'static str {
        self.field
    }

    /// Current id, if set
    pub fn get(&self, entity: &T) -> Option<String> {
        (self.get)(entity).map(str::to_string)
    }

    /// Overwrite the id
    pub fn set(&self, entity: &mut T, id: String) {
        (self.set)(entity, id)
    }

    /// Generate an id and set it on `entity`
    ///
    /// Returns `None` when the field has no generator, meaning the caller must supply the id.
    pub fn generate(&self, entity: &mut T) -> Option<String> {
        let id = self.next_id()?;
        self.set(entity, id.clone());
        Some(id)
    }

    /// A fresh id from the generator, leaving every entity untouched
    pub fn next_id(&self) -> Option<String> {
        self.generator.as_ref().map(|generator| generator.generate())
    }

    /// Return the id, generating it first when absent
    pub fn ensure_id(&self, entity: &mut T) -> Result<String, Error> {
        if let Some(id) = self.get(entity) {
            return Ok(id);
        }

        self.generate(entity).ok_or(Error::MissingIdentifier {
            record: T::type_name(),
        })
    }
}

impl<T> Clone for EntityIdHandler<T> {
    fn clone(&self) -> Self {
        Self {
            field: self.field,
            get: self.get,
            set: self.set,
            generator: self.generator.clone(),
        }
    }
}

impl<T> fmt::Debug for EntityIdHandler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityIdHandler")
            .field("field", &self.field)
            .field("generator", &self.generator)
            .finish()
    }
}
