use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::operation::create_table::CreateTableError;
use aws_sdk_dynamodb::operation::delete_table::DeleteTableError;
use aws_sdk_dynamodb::operation::describe_table::DescribeTableError;
use aws_sdk_dynamodb::types::{
    self as types, DeleteRequest, GlobalSecondaryIndex, KeySchemaElement, KeyType, Projection,
    ProjectionType, ProvisionedThroughput, PutRequest, ScalarAttributeType, WriteRequest,
};
use aws_smithy_types_convert::stream::PaginationStreamExt;
use aws_types::SdkConfig;
use futures_util::{StreamExt, TryStreamExt};
use log::debug;

use super::{
    BatchOutcome, DocumentStore, Item, KeyCondition, TableDescription, TableSpec, TableStatus,
    Throughput,
};
use crate::Error;
use crate::schema::{AttributeDefinition, AttributeType, Index};

/// [`DocumentStore`] backed by the AWS SDK DynamoDB client
#[derive(Clone, Debug)]
pub struct DynamoDbStore {
    client: Client,
}

impl DynamoDbStore {
    /// Store over an existing client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Store over a client built from `config`
    pub fn from_conf(config: &SdkConfig) -> Self {
        Self::new(Client::new(config))
    }

    /// Store over the global client, initializing it with defaults when needed
    ///
    /// See [`dynamodb_client`](crate::dynamodb_client).
    pub async fn from_global() -> Self {
        Self::new(crate::dynamodb_client().await.clone())
    }

    /// Underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Key attribute type; DynamoDB keys are strings, numbers or binary, never booleans
fn scalar_type(name: &str, attribute_type: AttributeType) -> Result<ScalarAttributeType, Error> {
    match attribute_type {
        AttributeType::String => Ok(ScalarAttributeType::S),
        AttributeType::Number => Ok(ScalarAttributeType::N),
        AttributeType::Boolean => Err(Error::Store(format!(
            "Attribute {} is boolean and cannot be used as a key",
            name
        ))),
    }
}

fn attribute_type(scalar: &ScalarAttributeType) -> AttributeType {
    match scalar {
        ScalarAttributeType::N => AttributeType::Number,
        _ => AttributeType::String,
    }
}

fn table_status(status: Option<&types::TableStatus>) -> TableStatus {
    match status {
        Some(types::TableStatus::Active) => TableStatus::Active,
        Some(types::TableStatus::Creating) => TableStatus::Creating,
        Some(types::TableStatus::Updating) => TableStatus::Updating,
        Some(types::TableStatus::Deleting) => TableStatus::Deleting,
        _ => TableStatus::Unknown,
    }
}

fn hash_key(schema: &[KeySchemaElement]) -> Option<&str> {
    schema
        .iter()
        .find(|element| element.key_type() == &KeyType::Hash)
        .map(|element| element.attribute_name())
}

fn provisioned(throughput: Throughput) -> Result<ProvisionedThroughput, Error> {
    Ok(ProvisionedThroughput::builder()
        .read_capacity_units(throughput.read)
        .write_capacity_units(throughput.write)
        .build()?)
}

fn describe(table: types::TableDescription) -> TableDescription {
    let partition_key = hash_key(table.key_schema()).map(str::to_string);

    let attribute_definitions = table
        .attribute_definitions()
        .iter()
        .map(|definition| {
            let name = definition.attribute_name();
            let attribute_type = attribute_type(definition.attribute_type());
            if partition_key.as_deref() == Some(name) {
                AttributeDefinition::primary_key(name, attribute_type)
            } else {
                AttributeDefinition::new(name, attribute_type)
            }
        })
        .collect();

    let indexes = table
        .global_secondary_indexes()
        .iter()
        .filter_map(|index| {
            let name = index.index_name()?;
            let attributes = index
                .key_schema()
                .iter()
                .map(|element| element.attribute_name().to_string())
                .collect();
            Some(Index::new(name, attributes))
        })
        .collect();

    TableDescription {
        table_name: table.table_name().unwrap_or_default().to_string(),
        status: table_status(table.table_status()),
        attribute_definitions,
        indexes,
    }
}

impl DocumentStore for DynamoDbStore {
    async fn get_item(&self, table: &str, key: Item) -> Result<Option<Item>, Error> {
        let output = self
            .client
            .get_item()
            .table_name(table)
            .set_key(Some(key))
            .send()
            .await?;

        Ok(output.item)
    }

    async fn scan(&self, table: &str) -> Result<Vec<Item>, Error> {
        self.client
            .scan()
            .table_name(table)
            .into_paginator()
            .items()
            .send()
            .into_stream_03x()
            .map_err(Into::into)
            .try_collect()
            .await
    }

    async fn query_by_index(
        &self,
        table: &str,
        index: &str,
        condition: KeyCondition,
        ascending: bool,
        max_results: usize,
    ) -> Result<Vec<Item>, Error> {
        let page_size = i32::try_from(max_results.max(1)).unwrap_or(i32::MAX);

        self.client
            .query()
            .table_name(table)
            .index_name(index)
            .key_condition_expression(condition.expression())
            .expression_attribute_names(condition.name_placeholder(), condition.attribute.clone())
            .expression_attribute_values(condition.value_placeholder(), condition.value)
            .scan_index_forward(ascending)
            .into_paginator()
            .page_size(page_size)
            .items()
            .send()
            .into_stream_03x()
            .take(max_results)
            .map_err(Into::into)
            .try_collect()
            .await
    }

    async fn put_item(&self, table: &str, item: Item) -> Result<(), Error> {
        let _ = self
            .client
            .put_item()
            .table_name(table)
            .set_item(Some(item))
            .send()
            .await?;

        Ok(())
    }

    async fn delete_item(&self, table: &str, key: Item) -> Result<(), Error> {
        let _ = self
            .client
            .delete_item()
            .table_name(table)
            .set_key(Some(key))
            .send()
            .await?;

        Ok(())
    }

    async fn batch_write(&self, table: &str, items: Vec<Item>) -> Result<BatchOutcome<Item>, Error> {
        if items.is_empty() {
            return Ok(BatchOutcome::complete());
        }

        let mut requests = Vec::with_capacity(items.len());
        for item in items {
            let put_request = PutRequest::builder().set_item(Some(item)).build()?;
            requests.push(
                WriteRequest::builder()
                    .set_put_request(Some(put_request))
                    .build(),
            );
        }

        let output = self
            .client
            .batch_write_item()
            .request_items(table, requests)
            .send()
            .await?;

        let unprocessed = output
            .unprocessed_items
            .and_then(|mut tables| tables.remove(table))
            .unwrap_or_default()
            .into_iter()
            .filter_map(|request| request.put_request)
            .map(|put_request| put_request.item)
            .collect();

        Ok(BatchOutcome { unprocessed })
    }

    async fn batch_delete_by_key(
        &self,
        table: &str,
        key_field: &str,
        ids: Vec<String>,
    ) -> Result<BatchOutcome<String>, Error> {
        if ids.is_empty() {
            return Ok(BatchOutcome::complete());
        }

        let mut requests = Vec::with_capacity(ids.len());
        for id in ids {
            let delete_request = DeleteRequest::builder()
                .key(key_field, types::AttributeValue::S(id))
                .build()?;
            requests.push(
                WriteRequest::builder()
                    .set_delete_request(Some(delete_request))
                    .build(),
            );
        }

        let output = self
            .client
            .batch_write_item()
            .request_items(table, requests)
            .send()
            .await?;

        let unprocessed = output
            .unprocessed_items
            .and_then(|mut tables| tables.remove(table))
            .unwrap_or_default()
            .into_iter()
            .filter_map(|request| request.delete_request)
            .filter_map(|mut delete_request| match delete_request.key.remove(key_field) {
                Some(types::AttributeValue::S(id)) => Some(id),
                _ => None,
            })
            .collect();

        Ok(BatchOutcome { unprocessed })
    }

    async fn describe_table(&self, table: &str) -> Result<Option<TableDescription>, Error> {
        match self.client.describe_table().table_name(table).send().await {
            Ok(output) => Ok(output.table.map(describe)),
            Err(e) => {
                if let Some(DescribeTableError::ResourceNotFoundException(_)) =
                    e.as_service_error()
                {
                    return Ok(None);
                }
                Err(e.into())
            }
        }
    }

    async fn create_table(&self, spec: TableSpec) -> Result<(), Error> {
        let mut builder = self
            .client
            .create_table()
            .table_name(&spec.table_name)
            .key_schema(
                KeySchemaElement::builder()
                    .attribute_name(&spec.partition_key)
                    .key_type(KeyType::Hash)
                    .build()?,
            )
            .provisioned_throughput(provisioned(spec.throughput)?);

        for definition in &spec.attribute_definitions {
            builder = builder.attribute_definitions(
                types::AttributeDefinition::builder()
                    .attribute_name(definition.name())
                    .attribute_type(scalar_type(definition.name(), definition.attribute_type())?)
                    .build()?,
            );
        }

        for index in &spec.indexes {
            let Some(attribute) = index.single_attribute() else {
                return Err(Error::Store(format!(
                    "Index {} on table {} must cover exactly one attribute",
                    index.name(),
                    spec.table_name
                )));
            };

            builder = builder.global_secondary_indexes(
                GlobalSecondaryIndex::builder()
                    .index_name(index.name())
                    .key_schema(
                        KeySchemaElement::builder()
                            .attribute_name(attribute)
                            .key_type(KeyType::Hash)
                            .build()?,
                    )
                    .projection(
                        Projection::builder()
                            .projection_type(ProjectionType::All)
                            .build(),
                    )
                    .provisioned_throughput(provisioned(spec.throughput)?)
                    .build()?,
            );
        }

        debug!(
            "Creating table {} with {} indexes",
            spec.table_name,
            spec.indexes.len()
        );

        // Ignore ResourceInUseException - table already exists
        match builder.send().await {
            Ok(_) => Ok(()),
            Err(e) => {
                if let Some(CreateTableError::ResourceInUseException(_)) = e.as_service_error() {
                    return Ok(());
                }
                Err(e.into())
            }
        }
    }

    async fn delete_table(&self, table: &str) -> Result<(), Error> {
        match self.client.delete_table().table_name(table).send().await {
            Ok(_) => Ok(()),
            Err(e) => {
                if let Some(DeleteTableError::ResourceNotFoundException(_)) = e.as_service_error() {
                    return Ok(());
                }
                Err(e.into())
            }
        }
    }
}
