use futures_util::future::BoxFuture;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use crate::Error;
use crate::entity::Entity;

/// Finds entities of type `E` by id
///
/// Implemented by [`Repository`](crate::Repository); many-to-one references are resolved
/// through it.
pub trait EntityLookup<E>: Send + Sync {
    /// Look an entity up by id
    fn lookup<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<E>, Error>>;
}

/// Entity type to lookup map used while reading references
///
/// Lookups are held weakly: a repository dropped by its owner stops resolving references and
/// [`RepositoryRegistry::lookup`] reports [`Error::RepositoryNotRegistered`].
#[derive(Default)]
pub struct RepositoryRegistry {
    lookups: RwLock<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl RepositoryRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the lookup for entities of type `E`, replacing any previous one
    pub fn register<E: Entity>(&self, lookup: &Arc<dyn EntityLookup<E>>) {
        let weak: Weak<dyn EntityLookup<E>> = Arc::downgrade(lookup);
        let _ = self
            .lookups
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(TypeId::of::<E>(), Box::new(weak));
    }

    /// Whether a live lookup is registered for `E`
    pub fn contains<E: Entity>(&self) -> bool {
        self.lookup_for::<E>().is_some()
    }

    /// Find an entity of type `E` by id
    pub async fn lookup<E: Entity>(&self, id: &str) -> Result<Option<E>, Error> {
        let lookup = self
            .lookup_for::<E>()
            .ok_or(Error::RepositoryNotRegistered {
                record: E::type_name(),
            })?;

        lookup.lookup(id).await
    }

    fn lookup_for<E: Entity>(&self) -> Option<Arc<dyn EntityLookup<E>>> {
        self.lookups
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&TypeId::of::<E>())
            .and_then(|entry| entry.downcast_ref::<Weak<dyn EntityLookup<E>>>())
            .and_then(Weak::upgrade)
    }
}

impl fmt::Debug for RepositoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registered = self
            .lookups
            .read()
            .map(|lookups| lookups.len())
            .unwrap_or_default();

        f.debug_struct("RepositoryRegistry")
            .field("registered", &registered)
            .finish()
    }
}
