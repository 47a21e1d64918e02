//! Entity declarations
//!
//! A type becomes mappable by implementing [`Record`], which lists its fields as
//! [`FieldDescriptor`]s. Types stored in their own table also implement [`Entity`].
//!
//! ```rust
//! use dynamo_entity::entity::{Entity, FieldDescriptor, Record, RecordKind, UuidGenerator};
//!
//! #[derive(Debug, Default)]
//! struct Merchant {
//!     id: Option<String>,
//!     name: String,
//! }
//!
//! impl Record for Merchant {
//!     const KIND: RecordKind = RecordKind::Entity;
//!
//!     fn fields() -> Vec<FieldDescriptor<Self>> {
//!         vec![
//!             FieldDescriptor::generated_id(
//!                 "id",
//!                 |m: &Merchant| m.id.as_deref(),
//!                 |m: &mut Merchant, id| m.id = Some(id),
//!                 UuidGenerator,
//!             ),
//!             FieldDescriptor::plain("name", |m: &Merchant| &m.name, |m: &mut Merchant, v| m.name = v),
//!         ]
//!     }
//! }
//!
//! impl Entity for Merchant {
//!     const TABLE: &'static str = "merchant";
//!     const INDEXES: &'static [&'static str] = &["name"];
//! }
//! ```

mod descriptor;
mod id;

pub use descriptor::{DeclaredType, FieldDescriptor, FieldRole, Scalar};
pub use id::{EntityIdHandler, IdGenerator, UlidGenerator, UuidGenerator};

pub(crate) use descriptor::{EmbeddedAccess, FieldAccess};

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::schema::Index;

/// Whether a record is stored in its own table or inlined into its owner
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// Stored in its own table, identified by an id field
    Entity,
    /// Flattened into the owning record's attributes
    Embeddable,
}

/// A type whose fields can be mapped to and from flat attributes
pub trait Record: Default + Send + Sync + 'static {
    /// Storage kind
    const KIND: RecordKind;

    /// Field descriptors, in mapping order
    ///
    /// Called once per type; use [`fields_of`] to get the cached list.
    fn fields() -> Vec<FieldDescriptor<Self>>;

    /// Name used in errors and logs
    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// A record stored in its own table
pub trait Entity: Record {
    /// Table name
    const TABLE: &'static str;

    /// Secondary indexes, one comma separated column list each
    const INDEXES: &'static [&'static str] = &[];

    /// Declared indexes
    fn indexes() -> Vec<Index> {
        Self::INDEXES
            .iter()
            .map(|columns| Index::for_columns(Self::TABLE, columns))
            .collect()
    }
}

type DescriptorCache = RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>;

static DESCRIPTORS: OnceLock<DescriptorCache> = OnceLock::new();

/// Cached field descriptors of `R`
///
/// `R::fields()` runs at most once per type for the lifetime of the process, unless two threads
/// race on the first call, in which case the first list stored wins.
pub fn fields_of<R: Record>() -> Arc<Vec<FieldDescriptor<R>>> {
    let cache = DESCRIPTORS.get_or_init(Default::default);
    let key = TypeId::of::<R>();

    let cached = cache
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&key)
        .cloned();

    if let Some(fields) = cached.and_then(|any| any.downcast::<Vec<FieldDescriptor<R>>>().ok()) {
        return fields;
    }

    let computed: Arc<dyn Any + Send + Sync> = Arc::new(R::fields());
    let stored = cache
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(key)
        .or_insert(computed)
        .clone();

    match stored.downcast::<Vec<FieldDescriptor<R>>>() {
        Ok(fields) => fields,
        Err(_) => Arc::new(R::fields()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Counter {
        hits: u32,
    }

    impl Record for Counter {
        const KIND: RecordKind = RecordKind::Embeddable;

        fn fields() -> Vec<FieldDescriptor<Self>> {
            vec![FieldDescriptor::plain(
                "hits",
                |c: &Counter| &c.hits,
                |c: &mut Counter, v| c.hits = v,
            )]
        }
    }

    #[derive(Debug, Default)]
    struct Ledger {
        id: Option<String>,
    }

    impl Record for Ledger {
        const KIND: RecordKind = RecordKind::Entity;

        fn fields() -> Vec<FieldDescriptor<Self>> {
            vec![FieldDescriptor::id(
                "id",
                |l: &Ledger| l.id.as_deref(),
                |l: &mut Ledger, id| l.id = Some(id),
            )]
        }
    }

    impl Entity for Ledger {
        const TABLE: &'static str = "ledger";
        const INDEXES: &'static [&'static str] = &["owner", "year,month"];
    }

    #[test]
    fn test_fields_are_cached_per_type() {
        let first = fields_of::<Counter>();
        let second = fields_of::<Counter>();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].name(), "hits");

        let ledger = fields_of::<Ledger>();
        assert_eq!(ledger[0].role(), FieldRole::Id);
    }

    #[test]
    fn test_entity_indexes() {
        let indexes = Ledger::indexes();
        assert_eq!(indexes.len(), 2);
        assert_eq!(indexes[0].name(), "ledger.owner");
        assert_eq!(indexes[1].name(), "ledger.year-month");
    }
}
