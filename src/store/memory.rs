use aws_sdk_dynamodb::types::AttributeValue;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{
    BatchOutcome, DocumentStore, Item, KeyCondition, TableDescription, TableSpec, TableStatus,
};
use crate::Error;
use crate::schema::{AttributeDefinition, AttributeType, Index};

/// How many items of each batch call a [`MemoryStore`] leaves unprocessed
#[derive(Clone, Debug, Default)]
pub enum UnprocessedPolicy {
    /// Apply every item
    #[default]
    None,
    /// The n-th batch call leaves the n-th count unprocessed (capped at the call size); calls
    /// past the end of the script apply everything
    Scripted(VecDeque<usize>),
    /// Never apply anything
    Always,
}

impl UnprocessedPolicy {
    /// Script from a list of counts
    pub fn scripted(counts: impl IntoIterator<Item = usize>) -> Self {
        UnprocessedPolicy::Scripted(counts.into_iter().collect())
    }

    fn next(&mut self, requested: usize) -> usize {
        match self {
            UnprocessedPolicy::None => 0,
            UnprocessedPolicy::Scripted(counts) => counts.pop_front().unwrap_or(0).min(requested),
            UnprocessedPolicy::Always => requested,
        }
    }
}

#[derive(Debug)]
struct MemoryTable {
    partition_key: String,
    attribute_definitions: Vec<AttributeDefinition>,
    indexes: Vec<Index>,
    items: BTreeMap<String, Item>,
    pending_describes: usize,
}

impl MemoryTable {
    fn key_of(&self, item: &Item) -> Result<String, Error> {
        match item.get(&self.partition_key) {
            Some(AttributeValue::S(key)) => Ok(key.clone()),
            _ => Err(Error::Store(format!(
                "Item is missing string key {}",
                self.partition_key
            ))),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    tables: HashMap<String, MemoryTable>,
    policy: UnprocessedPolicy,
    activation_delay: usize,
    batch_write_sizes: Vec<usize>,
    batch_delete_sizes: Vec<usize>,
    puts: usize,
}

impl State {
    fn table(&mut self, name: &str) -> Result<&mut MemoryTable, Error> {
        self.tables.get_mut(name).ok_or_else(|| Error::TableNotFound {
            table: name.to_string(),
        })
    }
}

/// In-process [`DocumentStore`]
///
/// Tables are keyed by a single string partition key. Every batch call is recorded so callers
/// can check how work was chunked.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with an active table keyed by `partition_key`
    pub fn with_table(self, table: &str, partition_key: &str) -> Self {
        let _ = self.lock().tables.insert(
            table.to_string(),
            MemoryTable {
                partition_key: partition_key.to_string(),
                attribute_definitions: vec![AttributeDefinition::primary_key(
                    partition_key,
                    AttributeType::String,
                )],
                indexes: Vec::new(),
                items: BTreeMap::new(),
                pending_describes: 0,
            },
        );
        self
    }

    /// Use `policy` for subsequent batch calls
    pub fn with_unprocessed(self, policy: UnprocessedPolicy) -> Self {
        self.set_unprocessed(policy);
        self
    }

    /// Report tables created from now on as creating for `describes` describe calls
    pub fn with_activation_delay(self, describes: usize) -> Self {
        self.lock().activation_delay = describes;
        self
    }

    /// Replace the unprocessed-item policy
    pub fn set_unprocessed(&self, policy: UnprocessedPolicy) {
        self.lock().policy = policy;
    }

    /// Item count of each batch write call, in call order
    pub fn batch_write_sizes(&self) -> Vec<usize> {
        self.lock().batch_write_sizes.clone()
    }

    /// Key count of each batch delete call, in call order
    pub fn batch_delete_sizes(&self) -> Vec<usize> {
        self.lock().batch_delete_sizes.clone()
    }

    /// Number of single put calls
    pub fn put_count(&self) -> usize {
        self.lock().puts
    }

    /// Stored items of `table`, ordered by key
    pub fn items(&self, table: &str) -> Vec<Item> {
        self.lock()
            .tables
            .get(table)
            .map(|t| t.items.values().cloned().collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DocumentStore for MemoryStore {
    async fn get_item(&self, table: &str, key: Item) -> Result<Option<Item>, Error> {
        let mut state = self.lock();
        let table = state.table(table)?;
        let key = table.key_of(&key)?;
        Ok(table.items.get(&key).cloned())
    }

    async fn scan(&self, table: &str) -> Result<Vec<Item>, Error> {
        let mut state = self.lock();
        Ok(state.table(table)?.items.values().cloned().collect())
    }

    async fn query_by_index(
        &self,
        table: &str,
        index: &str,
        condition: KeyCondition,
        ascending: bool,
        max_results: usize,
    ) -> Result<Vec<Item>, Error> {
        let mut state = self.lock();
        let table = state.table(table)?;

        if !table.indexes.iter().any(|i| i.name() == index) {
            return Err(Error::Store(format!("Index {} not found", index)));
        }

        let matching = table
            .items
            .values()
            .filter(|item| item.get(&condition.attribute) == Some(&condition.value));

        let items = if ascending {
            matching.take(max_results).cloned().collect()
        } else {
            matching.rev().take(max_results).cloned().collect()
        };

        Ok(items)
    }

    async fn put_item(&self, table: &str, item: Item) -> Result<(), Error> {
        let mut state = self.lock();
        state.puts += 1;
        let table = state.table(table)?;
        let key = table.key_of(&item)?;
        let _ = table.items.insert(key, item);
        Ok(())
    }

    async fn delete_item(&self, table: &str, key: Item) -> Result<(), Error> {
        let mut state = self.lock();
        let table = state.table(table)?;
        let key = table.key_of(&key)?;
        let _ = table.items.remove(&key);
        Ok(())
    }

    async fn batch_write(
        &self,
        table: &str,
        mut items: Vec<Item>,
    ) -> Result<BatchOutcome<Item>, Error> {
        let mut state = self.lock();
        state.batch_write_sizes.push(items.len());

        let skipped = state.policy.next(items.len());
        let unprocessed = items.split_off(items.len() - skipped);

        let table = state.table(table)?;
        for item in items {
            let key = table.key_of(&item)?;
            let _ = table.items.insert(key, item);
        }

        Ok(BatchOutcome { unprocessed })
    }

    async fn batch_delete_by_key(
        &self,
        table: &str,
        key_field: &str,
        mut ids: Vec<String>,
    ) -> Result<BatchOutcome<String>, Error> {
        let mut state = self.lock();
        state.batch_delete_sizes.push(ids.len());

        let skipped = state.policy.next(ids.len());
        let unprocessed = ids.split_off(ids.len() - skipped);

        let table = state.table(table)?;
        if table.partition_key != key_field {
            return Err(Error::Store(format!(
                "Key field {} does not match partition key {}",
                key_field, table.partition_key
            )));
        }

        for id in ids {
            let _ = table.items.remove(&id);
        }

        Ok(BatchOutcome { unprocessed })
    }

    async fn describe_table(&self, name: &str) -> Result<Option<TableDescription>, Error> {
        let mut state = self.lock();
        let Some(table) = state.tables.get_mut(name) else {
            return Ok(None);
        };

        let status = if table.pending_describes > 0 {
            table.pending_describes -= 1;
            TableStatus::Creating
        } else {
            TableStatus::Active
        };

        Ok(Some(TableDescription {
            table_name: name.to_string(),
            status,
            attribute_definitions: table.attribute_definitions.clone(),
            indexes: table.indexes.clone(),
        }))
    }

    async fn create_table(&self, spec: TableSpec) -> Result<(), Error> {
        let mut state = self.lock();
        let pending_describes = state.activation_delay;

        let _ = state
            .tables
            .entry(spec.table_name)
            .or_insert_with(|| MemoryTable {
                partition_key: spec.partition_key,
                attribute_definitions: spec.attribute_definitions,
                indexes: spec.indexes,
                items: BTreeMap::new(),
                pending_describes,
            });
        Ok(())
    }

    async fn delete_table(&self, table: &str) -> Result<(), Error> {
        let _ = self.lock().tables.remove(table);
        Ok(())
    }
}
