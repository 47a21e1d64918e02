//! Per-entity repositories
//!
//! A [`Repository`] ties one entity type to its table: CRUD and index queries through the
//! mappers, bulk writes through the batch executor, and schema reconciliation (see
//! [`SyncOptions`]).

mod batch;
mod schema;

pub use batch::{BatchConfig, BatchReport, RetryConfig};
pub use schema::SyncOptions;

use aws_sdk_dynamodb::types::AttributeValue;
use futures_util::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use batch::{BatchExecutor, BatchTask};

use crate::Error;
use crate::entity::{Entity, EntityIdHandler};
use crate::mapping::{
    EntityLookup, EntitySchemaSupport, EntityToItemMapper, ItemToEntityMapper, RepositoryRegistry,
    attributes_from_item, item_from_attributes,
};
use crate::schema::{AttributeType, Index};
use crate::store::{DocumentStore, Item, KeyCondition, Throughput};

/// Default result limit of [`Repository::find_by`]
pub const DEFAULT_MAX_RESULTS: usize = 100;

/// Repository settings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RepositoryConfig {
    /// Bulk write and delete settings
    pub batch: BatchConfig,
    /// Capacity of created tables and their indexes
    pub throughput: Throughput,
    /// How long table creation or deletion may take
    pub table_wait_timeout: Duration,
    /// Pause between table status checks
    pub table_poll_interval: Duration,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            batch: BatchConfig::default(),
            throughput: Throughput::default(),
            table_wait_timeout: Duration::from_secs(60),
            table_poll_interval: Duration::from_secs(1),
        }
    }
}

/// Stores and loads entities of type `E` in table `E::TABLE`
pub struct Repository<E: Entity, S> {
    store: Arc<S>,
    registry: Arc<RepositoryRegistry>,
    config: RepositoryConfig,
    id_handler: EntityIdHandler<E>,
    to_item: EntityToItemMapper<E>,
    to_entity: ItemToEntityMapper<E>,
    schema: EntitySchemaSupport<E>,
    indexes: Vec<Index>,
}

impl<E: Entity, S: DocumentStore> Repository<E, S> {
    /// Repository with default settings
    ///
    /// Fails when `E` declares no id field or a field the mappers cannot handle.
    pub fn new(store: Arc<S>, registry: Arc<RepositoryRegistry>) -> Result<Self, Error> {
        Self::with_config(store, registry, RepositoryConfig::default())
    }

    /// Repository with explicit settings
    pub fn with_config(
        store: Arc<S>,
        registry: Arc<RepositoryRegistry>,
        config: RepositoryConfig,
    ) -> Result<Self, Error> {
        let id_handler = EntityIdHandler::new()?;
        let schema = EntitySchemaSupport::new();

        // Walk the descriptors once so bad declarations fail here rather than on first use
        let _ = schema.expected_schema()?;

        Ok(Self {
            store,
            to_entity: ItemToEntityMapper::new(registry.clone()),
            registry,
            config,
            id_handler,
            to_item: EntityToItemMapper::new(),
            schema,
            indexes: E::indexes(),
        })
    }

    /// Share the repository and register it as the reference lookup for `E`
    ///
    /// The registry only keeps a weak handle: references to `E` stop resolving once every
    /// returned `Arc` is dropped.
    pub fn register(self) -> Arc<Self> {
        let repository = Arc::new(self);
        let lookup: Arc<dyn EntityLookup<E>> = repository.clone();
        repository.registry.register::<E>(&lookup);
        repository
    }

    /// Table name
    pub fn table_name(&self) -> &'static str {
        E::TABLE
    }

    /// Id handler of `E`
    pub fn id_handler(&self) -> &EntityIdHandler<E> {
        &self.id_handler
    }

    /// Schema support of `E`
    pub fn schema_support(&self) -> &EntitySchemaSupport<E> {
        &self.schema
    }

    /// Declared indexes
    pub fn indexes(&self) -> &[Index] {
        &self.indexes
    }

    /// Settings in use
    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// Find an entity by id
    pub async fn find_one(&self, id: &str) -> Result<Option<E>, Error> {
        match self.store.get_item(E::TABLE, self.key(id)).await? {
            Some(item) => Ok(Some(self.to_entity(item).await?)),
            None => Ok(None),
        }
    }

    /// Every entity in the table
    pub async fn find_all(&self) -> Result<Vec<E>, Error> {
        let items = self.store.scan(E::TABLE).await?;

        let mut entities = Vec::with_capacity(items.len());
        for item in items {
            entities.push(self.to_entity(item).await?);
        }

        Ok(entities)
    }

    /// Entities whose `attribute` equals `value`, through the index declared on `attribute`
    ///
    /// Fails with [`Error::NoIndexFound`] when no single-attribute index covers `attribute`.
    pub async fn query(
        &self,
        attribute: &str,
        value: &str,
        ascending: bool,
        max_results: usize,
    ) -> Result<Vec<E>, Error> {
        let index = self
            .indexes
            .iter()
            .find(|index| index.single_attribute() == Some(attribute))
            .ok_or_else(|| Error::NoIndexFound {
                table: E::TABLE,
                attribute: attribute.to_string(),
            })?;

        let condition = KeyCondition::equals(attribute, self.key_value(attribute, value)?);
        let items = self
            .store
            .query_by_index(E::TABLE, index.name(), condition, ascending, max_results)
            .await?;

        let mut entities = Vec::with_capacity(items.len());
        for item in items {
            entities.push(self.to_entity(item).await?);
        }

        Ok(entities)
    }

    /// [`query`](Self::query) in ascending order, up to [`DEFAULT_MAX_RESULTS`] entities
    pub async fn find_by(&self, attribute: &str, value: &str) -> Result<Vec<E>, Error> {
        self.query(attribute, value, true, DEFAULT_MAX_RESULTS).await
    }

    /// Insert or replace `entity`, assigning an id first when it has none
    pub async fn save(&self, entity: &mut E) -> Result<(), Error> {
        let _ = self.id_handler.ensure_id(entity)?;
        let item = item_from_attributes(self.to_item.map(entity)?);
        self.store.put_item(E::TABLE, item).await
    }

    /// Insert or replace every entity
    ///
    /// All entities are mapped before anything is written or any id is assigned, so a mapping
    /// error leaves both the table and the entities as they were. Entities without an id then
    /// get one and are put one by one; the rest go out in batch writes of up to `chunk_size`
    /// items.
    pub async fn save_all(&self, entities: &mut [E]) -> Result<BatchReport, Error> {
        let mut mapped = Vec::with_capacity(entities.len());

        for entity in entities.iter() {
            let mut item = item_from_attributes(self.to_item.map(entity)?);

            let assigned = match self.id_handler.get(entity) {
                Some(_) => None,
                None => {
                    let id = self.id_handler.next_id().ok_or(Error::MissingIdentifier {
                        record: E::type_name(),
                    })?;
                    let _ = item.insert(
                        self.id_handler.field_name().to_string(),
                        AttributeValue::S(id.clone()),
                    );
                    Some(id)
                }
            };
            mapped.push((item, assigned));
        }

        let mut tasks = Vec::new();
        let mut updates = Vec::new();

        for (entity, (item, assigned)) in entities.iter_mut().zip(mapped) {
            match assigned {
                Some(id) => {
                    self.id_handler.set(entity, id);
                    tasks.push(BatchTask::Insert(item));
                }
                None => updates.push(item),
            }
        }

        let executor = self.executor();
        tasks.extend(executor.write_tasks(updates));
        executor.run(tasks).await
    }

    /// Delete an entity by id; deleting a missing id is not an error
    pub async fn delete_by_id(&self, id: &str) -> Result<(), Error> {
        self.store.delete_item(E::TABLE, self.key(id)).await
    }

    /// Delete entities by id in batches of up to `chunk_size` keys
    pub async fn delete_all_by_id(&self, ids: &[String]) -> Result<BatchReport, Error> {
        let executor = self.executor();
        let tasks = executor.delete_tasks(ids.to_vec());
        executor.run(tasks).await
    }

    fn executor(&self) -> BatchExecutor<'_, S> {
        BatchExecutor::new(
            self.store.as_ref(),
            E::TABLE,
            self.id_handler.field_name(),
            &self.config.batch,
        )
    }

    fn key(&self, id: &str) -> Item {
        [(
            self.id_handler.field_name().to_string(),
            AttributeValue::S(id.to_string()),
        )]
        .into_iter()
        .collect()
    }

    /// Query value typed after the expected attribute, string when unknown
    fn key_value(&self, attribute: &str, value: &str) -> Result<AttributeValue, Error> {
        let expected = self.schema.expected_schema()?;
        let attribute_type = expected
            .attribute(attribute)
            .map(|expected| expected.definition().attribute_type())
            .unwrap_or(AttributeType::String);

        Ok(match attribute_type {
            AttributeType::String => AttributeValue::S(value.to_string()),
            AttributeType::Number => AttributeValue::N(value.to_string()),
            AttributeType::Boolean => AttributeValue::Bool(value == "true"),
        })
    }

    async fn to_entity(&self, item: Item) -> Result<E, Error> {
        let attributes = attributes_from_item(item)?;
        self.to_entity.map(&attributes).await
    }
}

impl<E: Entity, S: DocumentStore> EntityLookup<E> for Repository<E, S> {
    fn lookup<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<E>, Error>> {
        Box::pin(self.find_one(id))
    }
}

impl<E: Entity, S> fmt::Debug for Repository<E, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("table", &E::TABLE)
            .field("indexes", &self.indexes)
            .field("config", &self.config)
            .finish()
    }
}
