use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use serde_dynamo::{from_attribute_value, to_attribute_value};
use std::any::{TypeId, type_name};
use std::fmt;
use std::sync::Arc;

use super::{Entity, EntityIdHandler, IdGenerator, Record, RecordKind};
use crate::Error;
use crate::mapping::schema::{ExpectedSchema, describe_into};
use crate::mapping::{AttributeMap, RepositoryRegistry, flatten_into, unflatten_into};

/// Role of a field, deciding which mapping strategy owns it
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldRole {
    /// Scalar stored under its own name
    Plain,
    /// Identifier supplied by the caller
    Id,
    /// Identifier produced by a generator when absent
    GeneratedId,
    /// Never stored
    Transient,
    /// Date/time stored as epoch milliseconds
    Temporal,
    /// Reference to another entity, stored as its id
    ManyToOne,
    /// Collection of other entities; cannot be mapped
    OneToMany,
    /// Value object flattened into dotted attributes
    Embedded,
}

/// Declared type of a field, as far as the mappers care
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DeclaredType {
    /// Text
    String,
    /// Any numeric type
    Number,
    /// `bool`
    Boolean,
    /// `DateTime<Utc>`
    Temporal,
    /// Another record type
    Record(&'static str),
    /// A collection of records
    Collection(&'static str),
    /// Anything else
    Other(&'static str),
}

impl fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclaredType::String => f.write_str("string"),
            DeclaredType::Number => f.write_str("number"),
            DeclaredType::Boolean => f.write_str("boolean"),
            DeclaredType::Temporal => f.write_str("date"),
            DeclaredType::Record(name) => write!(f, "record {}", name),
            DeclaredType::Collection(name) => write!(f, "collection of {}", name),
            DeclaredType::Other(name) => f.write_str(name),
        }
    }
}

/// A value that converts to and from a single attribute
///
/// Implemented for strings, booleans, the primitive numbers and `Option`s of them. Implement it
/// for your own types to store them under a plain field; a type declaring
/// [`DeclaredType::Other`] is rejected by the mappers.
pub trait Scalar: Sized + Send + Sync + 'static {
    /// Declared type used for schema derivation
    fn declared_type() -> DeclaredType;

    /// Convert to an attribute value
    fn to_attribute(&self) -> Result<AttributeValue, Error>;

    /// Convert from an attribute value
    fn from_attribute(value: AttributeValue) -> Result<Self, Error>;
}

macro_rules! impl_scalar {
    ($declared:ident => $($ty:ty),+) => {
        $(
            impl Scalar for $ty {
                fn declared_type() -> DeclaredType {
                    DeclaredType::$declared
                }

                fn to_attribute(&self) -> Result<AttributeValue, Error> {
                    Ok(to_attribute_value(self)?)
                }

                fn from_attribute(value: AttributeValue) -> Result<Self, Error> {
                    Ok(from_attribute_value(value)?)
                }
            }
        )+
    };
}

impl_scalar!(String => String);
impl_scalar!(Boolean => bool);
impl_scalar!(Number => i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

impl<V: Scalar> Scalar for Option<V> {
    fn declared_type() -> DeclaredType {
        V::declared_type()
    }

    fn to_attribute(&self) -> Result<AttributeValue, Error> {
        match self {
            Some(value) => value.to_attribute(),
            None => Ok(AttributeValue::Null(true)),
        }
    }

    fn from_attribute(value: AttributeValue) -> Result<Self, Error> {
        match value {
            AttributeValue::Null(_) => Ok(None),
            other => V::from_attribute(other).map(Some),
        }
    }
}

type Getter<T> = Box<dyn Fn(&T) -> Result<AttributeValue, Error> + Send + Sync>;
type Setter<T> = Box<dyn Fn(&mut T, AttributeValue) -> Result<(), Error> + Send + Sync>;

/// Typed access to a field, by role
pub(crate) enum FieldAccess<T> {
    Scalar {
        get: Getter<T>,
        set: Setter<T>,
    },
    Identifier {
        get: fn(&T) -> Option<&str>,
        set: fn(&mut T, String),
        generator: Option<Arc<dyn IdGenerator>>,
    },
    Temporal {
        get: fn(&T) -> Option<DateTime<Utc>>,
        set: fn(&mut T, DateTime<Utc>),
    },
    Reference(Box<dyn ReferenceAccess<T>>),
    Embedded(Box<dyn EmbeddedAccess<T>>),
    Unmapped,
}

/// Many-to-one access, erased over the referenced entity type
pub(crate) trait ReferenceAccess<T>: Send + Sync {
    fn target(&self) -> &'static str;

    fn target_id_field(&self) -> Result<&'static str, Error>;

    fn referenced_id(&self, owner: &T) -> Result<Option<String>, Error>;

    /// Look the id up and set the field; `false` when nothing was found
    fn resolve<'a>(
        &'a self,
        owner: &'a mut T,
        id: String,
        registry: &'a RepositoryRegistry,
    ) -> BoxFuture<'a, Result<bool, Error>>;
}

/// Embedded access, erased over the nested record type
pub(crate) trait EmbeddedAccess<T>: Send + Sync {
    fn nested_type(&self) -> TypeId;

    fn nested_name(&self) -> &'static str;

    fn nested_kind(&self) -> RecordKind;

    fn flatten(&self, owner: &T, prefix: &str, out: &mut AttributeMap) -> Result<(), Error>;

    fn describe(
        &self,
        prefix: &str,
        path: &mut Vec<TypeId>,
        out: &mut ExpectedSchema,
    ) -> Result<(), Error>;

    fn unflatten<'a>(
        &'a self,
        owner: &'a mut T,
        attributes: &'a AttributeMap,
        prefix: String,
        registry: &'a RepositoryRegistry,
    ) -> BoxFuture<'a, Result<(), Error>>;
}

struct ReferenceField<T, R> {
    get: fn(&T) -> Option<&R>,
    set: fn(&mut T, R),
}

impl<T: Record, R: Entity> ReferenceAccess<T> for ReferenceField<T, R> {
    fn target(&self) -> &'static str {
        R::type_name()
    }

    fn target_id_field(&self) -> Result<&'static str, Error> {
        Ok(EntityIdHandler::<R>::new()?.field_name())
    }

    fn referenced_id(&self, owner: &T) -> Result<Option<String>, Error> {
        match (self.get)(owner) {
            Some(referenced) => Ok(EntityIdHandler::<R>::new()?.get(referenced)),
            None => Ok(None),
        }
    }

    fn resolve<'a>(
        &'a self,
        owner: &'a mut T,
        id: String,
        registry: &'a RepositoryRegistry,
    ) -> BoxFuture<'a, Result<bool, Error>> {
        Box::pin(async move {
            match registry.lookup::<R>(&id).await? {
                Some(referenced) => {
                    (self.set)(owner, referenced);
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }
}

struct EmbeddedField<T, E> {
    get: fn(&T) -> Option<&E>,
    set: fn(&mut T, E),
}

impl<T: Record, E: Record> EmbeddedAccess<T> for EmbeddedField<T, E> {
    fn nested_type(&self) -> TypeId {
        TypeId::of::<E>()
    }

    fn nested_name(&self) -> &'static str {
        E::type_name()
    }

    fn nested_kind(&self) -> RecordKind {
        E::KIND
    }

    fn flatten(&self, owner: &T, prefix: &str, out: &mut AttributeMap) -> Result<(), Error> {
        match (self.get)(owner) {
            Some(nested) => flatten_into(nested, prefix, out),
            None => Ok(()),
        }
    }

    fn describe(
        &self,
        prefix: &str,
        path: &mut Vec<TypeId>,
        out: &mut ExpectedSchema,
    ) -> Result<(), Error> {
        describe_into::<E>(prefix, path, out)
    }

    fn unflatten<'a>(
        &'a self,
        owner: &'a mut T,
        attributes: &'a AttributeMap,
        prefix: String,
        registry: &'a RepositoryRegistry,
    ) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            // Only build the value object when something was stored under its prefix
            if !attributes.keys().any(|key| key.name().starts_with(&prefix)) {
                return Ok(());
            }

            let mut nested = E::default();
            unflatten_into(&mut nested, attributes, &prefix, registry).await?;
            (self.set)(owner, nested);
            Ok(())
        })
    }
}

/// One field of a record: name, declared type, role and typed accessors
pub struct FieldDescriptor<T> {
    name: &'static str,
    declared: DeclaredType,
    role: FieldRole,
    access: FieldAccess<T>,
}

impl<T: Record> FieldDescriptor<T> {
    /// Scalar field stored under its own name
    pub fn plain<V: Scalar>(name: &'static str, get: fn(&T) -> &V, set: fn(&mut T, V)) -> Self {
        Self {
            name,
            declared: V::declared_type(),
            role: FieldRole::Plain,
            access: FieldAccess::Scalar {
                get: Box::new(move |owner| get(owner).to_attribute()),
                set: Box::new(move |owner, value| {
                    set(owner, V::from_attribute(value)?);
                    Ok(())
                }),
            },
        }
    }

    /// Identifier the caller must supply
    pub fn id(name: &'static str, get: fn(&T) -> Option<&str>, set: fn(&mut T, String)) -> Self {
        Self {
            name,
            declared: DeclaredType::String,
            role: FieldRole::Id,
            access: FieldAccess::Identifier {
                get,
                set,
                generator: None,
            },
        }
    }

    /// Identifier filled by `generator` when absent on save
    pub fn generated_id(
        name: &'static str,
        get: fn(&T) -> Option<&str>,
        set: fn(&mut T, String),
        generator: impl IdGenerator + 'static,
    ) -> Self {
        Self {
            name,
            declared: DeclaredType::String,
            role: FieldRole::GeneratedId,
            access: FieldAccess::Identifier {
                get,
                set,
                generator: Some(Arc::new(generator)),
            },
        }
    }

    /// Field that is never stored
    pub fn transient(name: &'static str) -> Self {
        Self {
            name,
            declared: DeclaredType::Other("transient"),
            role: FieldRole::Transient,
            access: FieldAccess::Unmapped,
        }
    }

    /// Date/time field stored as epoch milliseconds
    pub fn temporal(
        name: &'static str,
        get: fn(&T) -> Option<DateTime<Utc>>,
        set: fn(&mut T, DateTime<Utc>),
    ) -> Self {
        Self {
            name,
            declared: DeclaredType::Temporal,
            role: FieldRole::Temporal,
            access: FieldAccess::Temporal { get, set },
        }
    }

    /// Reference to another entity, stored as `<name>.<id field>`
    pub fn many_to_one<R: Entity>(
        name: &'static str,
        get: fn(&T) -> Option<&R>,
        set: fn(&mut T, R),
    ) -> Self {
        Self {
            name,
            declared: DeclaredType::Record(R::type_name()),
            role: FieldRole::ManyToOne,
            access: FieldAccess::Reference(Box::new(ReferenceField { get, set })),
        }
    }

    /// Collection of entities
    ///
    /// Declaring it is allowed so the field is visible to the mappers, but every mapping
    /// operation on it fails with [`Error::UnsupportedRelationship`].
    pub fn one_to_many<R: Entity>(name: &'static str) -> Self {
        Self {
            name,
            declared: DeclaredType::Collection(R::type_name()),
            role: FieldRole::OneToMany,
            access: FieldAccess::Unmapped,
        }
    }

    /// Value object flattened into `<name>.<field>` attributes
    pub fn embedded<E: Record>(
        name: &'static str,
        get: fn(&T) -> Option<&E>,
        set: fn(&mut T, E),
    ) -> Self {
        Self {
            name,
            declared: DeclaredType::Record(E::type_name()),
            role: FieldRole::Embedded,
            access: FieldAccess::Embedded(Box::new(EmbeddedField { get, set })),
        }
    }
}

impl<T> FieldDescriptor<T> {
    /// Field name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declared type
    pub fn declared_type(&self) -> &DeclaredType {
        &self.declared
    }

    /// Role
    pub fn role(&self) -> FieldRole {
        self.role
    }

    /// Whether this is the identifier field
    pub fn is_id(&self) -> bool {
        matches!(self.role, FieldRole::Id | FieldRole::GeneratedId)
    }

    pub(crate) fn access(&self) -> &FieldAccess<T> {
        &self.access
    }
}

impl<T> fmt::Debug for FieldDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("owner", &type_name::<T>())
            .field("name", &self.name)
            .field("declared", &self.declared)
            .field("role", &self.role)
            .finish()
    }
}
