use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::Error;
use crate::entity::Entity;
use crate::mapping::RepositoryRegistry;
use crate::repository::{Repository, RepositoryConfig};
use crate::store::{DocumentStore, DynamoDbStore};

/// Owns the repositories of a set of entity types sharing one store
///
/// Repositories added here are registered for reference resolution and stay alive as long as
/// the manager does.
pub struct EntityManager<S> {
    store: Arc<S>,
    registry: Arc<RepositoryRegistry>,
    config: RepositoryConfig,
    repositories: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl<S: DocumentStore> EntityManager<S> {
    /// Manager with default repository settings
    pub fn new(store: S) -> Self {
        Self::with_config(store, RepositoryConfig::default())
    }

    /// Manager whose repositories all use `config`
    pub fn with_config(store: S, config: RepositoryConfig) -> Self {
        Self {
            store: Arc::new(store),
            registry: Arc::new(RepositoryRegistry::new()),
            config,
            repositories: RwLock::new(HashMap::new()),
        }
    }

    /// Build, register and keep the repository of `E`
    ///
    /// Adding the same type again replaces the previous repository.
    pub fn add_entity<E: Entity>(&self) -> Result<Arc<Repository<E, S>>, Error> {
        let repository =
            Repository::with_config(self.store.clone(), self.registry.clone(), self.config)?
                .register();

        let _ = self
            .repositories
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(TypeId::of::<E>(), repository.clone());

        Ok(repository)
    }

    /// Repository of `E`, if it was added
    pub fn repository<E: Entity>(&self) -> Option<Arc<Repository<E, S>>> {
        self.repositories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&TypeId::of::<E>())
            .cloned()
            .and_then(|repository| repository.downcast::<Repository<E, S>>().ok())
    }

    /// Registry used to resolve references
    pub fn registry(&self) -> &Arc<RepositoryRegistry> {
        &self.registry
    }

    /// Shared store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

impl EntityManager<DynamoDbStore> {
    /// Manager over the global DynamoDB client
    pub async fn connect() -> Self {
        Self::new(DynamoDbStore::from_global().await)
    }
}

impl<S> fmt::Debug for EntityManager<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repositories = self
            .repositories
            .read()
            .map(|repositories| repositories.len())
            .unwrap_or_default();

        f.debug_struct("EntityManager")
            .field("repositories", &repositories)
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish()
    }
}
