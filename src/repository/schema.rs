use log::{debug, info};
use tokio::time::{Instant, sleep};

use super::Repository;
use crate::Error;
use crate::entity::Entity;
use crate::schema::{
    AttributeDefinition, AttributeType, EntitySchema, SchemaValidationError,
    SchemaValidationErrorType,
};
use crate::store::{DocumentStore, TableDescription, TableSpec, TableStatus};

/// What [`Repository::sync_to_schema`] may do
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Drop table attributes the entity no longer maps; not applied
    pub delete_missing_fields: bool,
    /// Create the table when it does not exist
    pub create_table_if_not_exists: bool,
    /// Create the tables of referenced entities; not applied
    pub create_references: bool,
}

impl SyncOptions {
    /// Only create a missing table
    pub fn create_if_missing() -> Self {
        Self {
            create_table_if_not_exists: true,
            ..Self::default()
        }
    }
}

impl<E: Entity, S: DocumentStore> Repository<E, S> {
    /// Live table schema, `None` when the table does not exist
    pub async fn live_schema(&self) -> Result<Option<EntitySchema>, Error> {
        Ok(self
            .store
            .describe_table(E::TABLE)
            .await?
            .map(TableDescription::into_schema))
    }

    /// Check the live table against the entity, appending problems to `errors`
    ///
    /// DynamoDB only describes key attributes, so only primary key problems and recursive
    /// embedding count; other attributes are expected to be absent from the description. Live
    /// attributes the entity no longer maps are not a reason to reject the table.
    pub async fn is_valid(&self, errors: &mut Vec<SchemaValidationError>) -> Result<bool, Error> {
        let Some(live) = self.live_schema().await? else {
            errors.push(SchemaValidationError::table_not_found(E::TABLE));
            return Ok(false);
        };

        if live.attributes().is_empty() {
            errors.push(SchemaValidationError::table(E::TABLE, "No attributes found"));
            return Ok(false);
        }

        let found: Vec<SchemaValidationError> = self
            .schema
            .validate_schema(Some(&live))?
            .into_iter()
            .filter(|error| match error.error_type() {
                SchemaValidationErrorType::RecursiveDependency => true,
                SchemaValidationErrorType::MissingInEntity => false,
                _ => error.is_primary_key(),
            })
            .collect();

        let valid = found.is_empty();
        errors.extend(found);
        Ok(valid)
    }

    /// Make sure the table exists and matches the entity
    ///
    /// A missing table is created (when allowed) and awaited until active. An existing table
    /// is validated with [`is_valid`](Self::is_valid) and never migrated.
    pub async fn sync_to_schema(&self, options: SyncOptions) -> Result<bool, Error> {
        if options.delete_missing_fields || options.create_references {
            debug!(
                "Table {}: delete_missing_fields and create_references are not applied",
                E::TABLE
            );
        }

        if self.store.describe_table(E::TABLE).await?.is_none() {
            if !options.create_table_if_not_exists {
                return Err(Error::TableNotFound {
                    table: E::TABLE.to_string(),
                });
            }

            let spec = self.table_spec()?;
            info!(
                "Creating table {} with {} indexes",
                E::TABLE,
                spec.indexes.len()
            );
            self.store.create_table(spec).await?;
            self.wait_until_active().await?;
            info!("Table {} is active", E::TABLE);
            return Ok(true);
        }

        let mut errors = Vec::new();
        if !self.is_valid(&mut errors).await? {
            return Err(Error::InvalidSchema {
                table: E::TABLE,
                errors,
            });
        }

        Ok(true)
    }

    /// Delete the table and wait until it is gone
    ///
    /// Returns `false` when there was no table to delete.
    pub async fn delete_table(&self) -> Result<bool, Error> {
        if self.store.describe_table(E::TABLE).await?.is_none() {
            return Ok(false);
        }

        info!("Deleting table {}", E::TABLE);
        self.store.delete_table(E::TABLE).await?;

        let started = Instant::now();
        while self.store.describe_table(E::TABLE).await?.is_some() {
            if started.elapsed() >= self.config.table_wait_timeout {
                return Err(Error::TableWaitTimeout {
                    table: E::TABLE.to_string(),
                    state: "deleted",
                    waited: started.elapsed(),
                });
            }
            sleep(self.config.table_poll_interval).await;
        }

        Ok(true)
    }

    /// Create request for the table of `E`
    ///
    /// The id is the string partition key and every declared index becomes a single-attribute
    /// secondary index typed after the attribute it covers. Boolean attributes cannot key an
    /// index.
    pub fn table_spec(&self) -> Result<TableSpec, Error> {
        let expected = self.schema.expected_schema()?;
        let partition_key = self.id_handler.field_name();

        let mut attribute_definitions = vec![AttributeDefinition::primary_key(
            partition_key,
            AttributeType::String,
        )];

        for index in &self.indexes {
            let attribute = index.single_attribute().ok_or_else(|| Error::InvalidIndex {
                table: E::TABLE,
                index: index.name().to_string(),
                reason: "expected only one attribute for the index".to_string(),
            })?;

            if attribute_definitions
                .iter()
                .any(|definition| definition.name() == attribute)
            {
                continue;
            }

            let attribute_type = expected
                .attribute(attribute)
                .map(|expected| expected.definition().attribute_type())
                .unwrap_or(AttributeType::String);
            if attribute_type == AttributeType::Boolean {
                return Err(Error::InvalidIndex {
                    table: E::TABLE,
                    index: index.name().to_string(),
                    reason: "boolean attributes cannot be index keys".to_string(),
                });
            }
            attribute_definitions.push(AttributeDefinition::new(attribute, attribute_type));
        }

        Ok(TableSpec {
            table_name: E::TABLE.to_string(),
            partition_key: partition_key.to_string(),
            attribute_definitions,
            indexes: self.indexes.clone(),
            throughput: self.config.throughput,
        })
    }

    /// Poll the table until it accepts reads and writes
    async fn wait_until_active(&self) -> Result<(), Error> {
        let started = Instant::now();

        loop {
            let status = match self.store.describe_table(E::TABLE).await? {
                Some(description) if description.is_active() => return Ok(()),
                Some(description) => description.status,
                None => TableStatus::Unknown,
            };

            if started.elapsed() >= self.config.table_wait_timeout {
                return Err(Error::TableWaitTimeout {
                    table: E::TABLE.to_string(),
                    state: "active",
                    waited: started.elapsed(),
                });
            }

            debug!("Table {} is {:?}, waiting", E::TABLE, status);
            sleep(self.config.table_poll_interval).await;
        }
    }
}
