//! Storage collaborator
//!
//! Repositories talk to storage only through [`DocumentStore`]. [`DynamoDbStore`] runs against
//! DynamoDB (or LocalStack); [`MemoryStore`] keeps tables in process and can simulate
//! unprocessed batch items and slow table activation.

mod dynamodb;
mod memory;

pub use dynamodb::DynamoDbStore;
pub use memory::{MemoryStore, UnprocessedPolicy};

use aws_sdk_dynamodb::types::AttributeValue;
use std::collections::HashMap;
use std::future::Future;

use crate::Error;
use crate::schema::{AttributeDefinition, EntitySchema, Index};

/// Raw stored item
pub type Item = HashMap<String, AttributeValue>;

/// Per-call item limit of the batch write primitive
pub const BATCH_WRITE_SIZE: usize = 25;

/// Result of one batch write or delete call
#[derive(Debug, Default)]
pub struct BatchOutcome<K> {
    /// Items (or keys) the store did not apply
    pub unprocessed: Vec<K>,
}

impl<K> BatchOutcome<K> {
    /// Every item was applied
    pub fn complete() -> Self {
        Self {
            unprocessed: Vec::new(),
        }
    }

    /// Whether every item was applied
    pub fn is_complete(&self) -> bool {
        self.unprocessed.is_empty()
    }
}

/// Equality condition on a single index attribute
#[derive(Clone, Debug, PartialEq)]
pub struct KeyCondition {
    /// Attribute name, possibly dotted
    pub attribute: String,
    /// Value to match
    pub value: AttributeValue,
}

impl KeyCondition {
    /// Build an equality condition
    pub fn equals(attribute: impl Into<String>, value: AttributeValue) -> Self {
        Self {
            attribute: attribute.into(),
            value,
        }
    }

    /// Placeholder used for the attribute name in expressions; dots are not allowed there
    pub fn name_placeholder(&self) -> String {
        format!("#{}", self.attribute.replace('.', "_"))
    }

    /// Placeholder used for the value in expressions
    pub fn value_placeholder(&self) -> &'static str {
        ":attrValue"
    }

    /// `#attr = :attrValue`
    pub fn expression(&self) -> String {
        format!("{} = {}", self.name_placeholder(), self.value_placeholder())
    }
}

/// Lifecycle state of a table
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableStatus {
    /// Being created
    Creating,
    /// Ready for use
    Active,
    /// Being updated; still usable
    Updating,
    /// Being deleted
    Deleting,
    /// Any other state reported by the store
    Unknown,
}

/// What a describe call reports about a table
#[derive(Clone, Debug)]
pub struct TableDescription {
    /// Table name
    pub table_name: String,
    /// Lifecycle state
    pub status: TableStatus,
    /// Attributes the store knows about; for DynamoDB only key attributes are listed
    pub attribute_definitions: Vec<AttributeDefinition>,
    /// Secondary indexes
    pub indexes: Vec<Index>,
}

impl TableDescription {
    /// Whether the table accepts reads and writes
    pub fn is_active(&self) -> bool {
        matches!(self.status, TableStatus::Active | TableStatus::Updating)
    }

    /// Convert into the schema shape used by the reconciler
    pub fn into_schema(self) -> EntitySchema {
        EntitySchema::new(self.table_name, self.attribute_definitions, self.indexes)
    }
}

/// Provisioned capacity for a table and its indexes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Throughput {
    /// Read capacity units
    pub read: i64,
    /// Write capacity units
    pub write: i64,
}

impl Default for Throughput {
    fn default() -> Self {
        Self {
            read: 100,
            write: 100,
        }
    }
}

/// Everything needed to create a table
#[derive(Clone, Debug)]
pub struct TableSpec {
    /// Table name
    pub table_name: String,
    /// Partition key attribute, always a string
    pub partition_key: String,
    /// Attribute definitions: the key plus every index attribute
    pub attribute_definitions: Vec<AttributeDefinition>,
    /// Single-attribute secondary indexes
    pub indexes: Vec<Index>,
    /// Capacity for the table and each index
    pub throughput: Throughput,
}

/// Item store the repositories run against
///
/// Implementations must be safe to call concurrently; batch operations issue several calls at
/// once on the same store.
pub trait DocumentStore: Send + Sync + 'static {
    /// Point lookup by key
    fn get_item(
        &self,
        table: &str,
        key: Item,
    ) -> impl Future<Output = Result<Option<Item>, Error>> + Send;

    /// Every item of the table
    fn scan(&self, table: &str) -> impl Future<Output = Result<Vec<Item>, Error>> + Send;

    /// Items of `index` matching `condition`, at most `max_results`
    fn query_by_index(
        &self,
        table: &str,
        index: &str,
        condition: KeyCondition,
        ascending: bool,
        max_results: usize,
    ) -> impl Future<Output = Result<Vec<Item>, Error>> + Send;

    /// Insert or replace one item
    fn put_item(&self, table: &str, item: Item) -> impl Future<Output = Result<(), Error>> + Send;

    /// Delete one item by key
    fn delete_item(&self, table: &str, key: Item)
    -> impl Future<Output = Result<(), Error>> + Send;

    /// Insert or replace up to [`BATCH_WRITE_SIZE`] items
    fn batch_write(
        &self,
        table: &str,
        items: Vec<Item>,
    ) -> impl Future<Output = Result<BatchOutcome<Item>, Error>> + Send;

    /// Delete up to [`BATCH_WRITE_SIZE`] items by their string key
    fn batch_delete_by_key(
        &self,
        table: &str,
        key_field: &str,
        ids: Vec<String>,
    ) -> impl Future<Output = Result<BatchOutcome<String>, Error>> + Send;

    /// Describe the table; `None` when it does not exist
    fn describe_table(
        &self,
        table: &str,
    ) -> impl Future<Output = Result<Option<TableDescription>, Error>> + Send;

    /// Request table creation; the table may not be active yet when this returns
    fn create_table(&self, spec: TableSpec) -> impl Future<Output = Result<(), Error>> + Send;

    /// Request table deletion; deleting a missing table is not an error
    fn delete_table(&self, table: &str) -> impl Future<Output = Result<(), Error>> + Send;
}
