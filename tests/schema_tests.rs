/// Schema reconciliation tests
///
/// Expected schema derivation, drift diffs, validation and table creation against the
/// in-process store.
use dynamo_entity::mapping::{EntitySchemaSupport, RepositoryRegistry};
use dynamo_entity::schema::{
    AttributeDefinition, AttributeType, EntitySchema, SchemaValidationErrorType,
};
use dynamo_entity::store::DocumentStore;
use std::sync::Arc;
use std::time::Duration;

mod helpers;
use helpers::*;

fn repository<E: dynamo_entity::Entity>(
    store: MemoryStore,
    config: RepositoryConfig,
) -> (Arc<MemoryStore>, Repository<E, MemoryStore>) {
    let store = Arc::new(store);
    let repository =
        Repository::with_config(store.clone(), Arc::new(RepositoryRegistry::new()), config)
            .unwrap();
    (store, repository)
}

/// A value object embedding itself yields exactly one recursive dependency error
#[test]
fn test_recursive_embedding_detected_once() {
    let expected = EntitySchemaSupport::<SampleEntity>::new()
        .expected_schema()
        .unwrap();

    assert_eq!(expected.errors().len(), 1);
    let error = &expected.errors()[0];
    assert_eq!(error.error_type(), SchemaValidationErrorType::RecursiveDependency);
    assert_eq!(error.identifier(), "embedded.deep_embedded");

    let names: Vec<&str> = expected
        .attributes()
        .iter()
        .map(|attribute| attribute.definition().name())
        .collect();
    assert_eq!(names, vec!["id", "name", "embedded.some_field"]);
}

/// Expected expense attributes, with the id as primary key
#[test]
fn test_expected_expense_schema() {
    let schema = EntitySchemaSupport::<Expense>::new()
        .expected_entity_schema()
        .unwrap();

    assert_eq!(schema.table_name(), "expense");
    assert_eq!(schema.primary_key().map(|key| key.name()), Some("id"));
    assert_eq!(
        schema.attribute("merchant.id").map(|a| a.attribute_type()),
        Some(AttributeType::String)
    );
    assert_eq!(
        schema.attribute("date").map(|a| a.attribute_type()),
        Some(AttributeType::Number)
    );
    assert_eq!(
        schema.attribute("approved").map(|a| a.attribute_type()),
        Some(AttributeType::Boolean)
    );
    assert!(schema.attribute("cache").is_none());
    assert_eq!(schema.indexes()[0].name(), "expense.merchant.id");
}

/// Dropping k attributes from the live schema gives back exactly those k, and extra live
/// attributes show up on the other side
#[test]
fn test_schema_diff_symmetry() {
    let support = EntitySchemaSupport::<Expense>::new();
    let expected = support.expected_schema().unwrap().definitions();

    let dropped = ["description", "attachment.size"];
    let mut live_attributes: Vec<AttributeDefinition> = expected
        .iter()
        .filter(|definition| !dropped.contains(&definition.name()))
        .cloned()
        .collect();
    live_attributes.push(AttributeDefinition::new("legacy_code", AttributeType::String));
    let live = EntitySchema::new("expense", live_attributes, Vec::new());

    let missing: Vec<String> = support
        .missing_fields_in_table(&live)
        .unwrap()
        .into_iter()
        .map(AttributeDefinition::into_name)
        .collect();
    assert_eq!(missing, vec!["description", "attachment.size"]);

    let extra: Vec<String> = support
        .missing_attributes_in_entity(&live)
        .unwrap()
        .into_iter()
        .map(AttributeDefinition::into_name)
        .collect();
    assert_eq!(extra, vec!["legacy_code"]);

    let errors = support.validate_schema(Some(&live)).unwrap();
    let reported: Vec<(SchemaValidationErrorType, &str)> = errors
        .iter()
        .map(|error| (error.error_type(), error.identifier()))
        .collect();
    assert_eq!(
        reported,
        vec![
            (SchemaValidationErrorType::MissingInTable, "description"),
            (SchemaValidationErrorType::MissingInTable, "attachment.size"),
            (SchemaValidationErrorType::MissingInEntity, "legacy_code"),
        ]
    );
}

/// Attributes left in the table by removed fields are reported, but do not invalidate it
#[tokio::test]
async fn test_unmapped_live_attribute_keeps_table_valid() {
    let (store, merchants) = repository::<Merchant>(MemoryStore::new(), fast_config());
    let mut spec = merchants.table_spec().unwrap();
    spec.attribute_definitions
        .push(AttributeDefinition::new("legacy_code", AttributeType::String));
    store.create_table(spec).await.unwrap();

    let live = merchants.live_schema().await.unwrap().unwrap();
    let errors = merchants.schema_support().validate_schema(Some(&live)).unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].error_type(), SchemaValidationErrorType::MissingInEntity);
    assert_eq!(errors[0].identifier(), "legacy_code");

    let mut found = Vec::new();
    assert!(merchants.is_valid(&mut found).await.unwrap());
    assert!(found.is_empty());
}

/// A live attribute of the wrong type is reported, and blocks the drift diff
#[test]
fn test_incompatible_live_attribute() {
    let support = EntitySchemaSupport::<Expense>::new();
    let live = EntitySchema::new(
        "expense",
        vec![
            AttributeDefinition::primary_key("id", AttributeType::String),
            AttributeDefinition::new("amount", AttributeType::String),
        ],
        Vec::new(),
    );

    let errors = support.validate_schema(Some(&live)).unwrap();
    let wrong_type: Vec<_> = errors
        .iter()
        .filter(|error| error.error_type() == SchemaValidationErrorType::WrongType)
        .collect();
    assert_eq!(wrong_type.len(), 1);
    assert_eq!(wrong_type[0].identifier(), "amount");

    assert!(matches!(
        support.missing_fields_in_table(&live),
        Err(Error::IncompatibleAttributeType { .. })
    ));
}

/// Without a table description every attribute gets a general error
#[test]
fn test_validate_without_live_schema() {
    let support = EntitySchemaSupport::<Merchant>::new();
    let errors = support.validate_schema(None).unwrap();

    assert_eq!(errors.len(), 2);
    assert!(
        errors
            .iter()
            .all(|error| error.error_type() == SchemaValidationErrorType::General)
    );
}

/// A missing table is reported through the error list, not as a failure
#[tokio::test]
async fn test_is_valid_missing_table() {
    let (_, merchants) = repository::<Merchant>(MemoryStore::new(), fast_config());

    let mut errors = Vec::new();
    assert!(!merchants.is_valid(&mut errors).await.unwrap());
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].error_type(), SchemaValidationErrorType::TableNotFound);
}

/// Sync creates the table with one index per declaration and waits for it to become active
#[tokio::test]
async fn test_sync_creates_table_and_waits() {
    let (store, expenses) =
        repository::<Expense>(MemoryStore::new().with_activation_delay(3), fast_config());

    assert!(expenses.sync_to_schema(SyncOptions::create_if_missing()).await.unwrap());

    let description = store.describe_table("expense").await.unwrap().unwrap();
    assert!(description.is_active());
    assert_eq!(description.indexes.len(), 1);
    assert_eq!(description.indexes[0].name(), "expense.merchant.id");

    let names: Vec<&str> = description
        .attribute_definitions
        .iter()
        .map(|definition| definition.name())
        .collect();
    assert_eq!(names, vec!["id", "merchant.id"]);
    assert!(description.attribute_definitions[0].is_primary_key());

    let mut errors = Vec::new();
    assert!(expenses.is_valid(&mut errors).await.unwrap());
    assert!(errors.is_empty());

    // Existing and valid: nothing to do
    assert!(expenses.sync_to_schema(SyncOptions::default()).await.unwrap());
}

/// Index attributes are typed after the attribute they cover
#[test]
fn test_table_spec_index_types() {
    let (_, merchants) = repository::<Merchant>(MemoryStore::new(), fast_config());
    let spec = merchants.table_spec().unwrap();

    assert_eq!(spec.partition_key, "id");
    assert_eq!(spec.throughput.read, 100);
    assert_eq!(spec.throughput.write, 100);
    assert_eq!(spec.indexes[0].name(), "merchant.name");
    assert_eq!(
        spec.attribute_definitions[1],
        AttributeDefinition::new("name", AttributeType::String)
    );
}

/// Sync refuses to create a table unless allowed
#[tokio::test]
async fn test_sync_without_create_fails() {
    let (store, merchants) = repository::<Merchant>(MemoryStore::new(), fast_config());

    let result = merchants.sync_to_schema(SyncOptions::default()).await;
    assert!(matches!(result, Err(Error::TableNotFound { .. })));
    assert!(store.describe_table("merchant").await.unwrap().is_none());
}

/// A table that never becomes active fails the sync once the wait budget is spent
#[tokio::test]
async fn test_sync_wait_timeout() {
    let config = RepositoryConfig {
        table_wait_timeout: Duration::from_millis(20),
        table_poll_interval: Duration::from_millis(2),
        ..RepositoryConfig::default()
    };
    let (_, merchants) =
        repository::<Merchant>(MemoryStore::new().with_activation_delay(usize::MAX), config);

    let result = merchants
        .sync_to_schema(SyncOptions::create_if_missing())
        .await;
    match result {
        Err(error) => {
            assert!(matches!(error, Error::TableWaitTimeout { state: "active", .. }));
            assert!(error.is_timeout());
        }
        Ok(_) => panic!("table never becomes active"),
    }
}

/// An existing table keyed differently is invalid and never migrated
#[tokio::test]
async fn test_sync_existing_invalid_table() {
    let (_, merchants) = repository::<Merchant>(
        MemoryStore::new().with_table("merchant", "merchant_id"),
        fast_config(),
    );

    let mut errors = Vec::new();
    assert!(!merchants.is_valid(&mut errors).await.unwrap());
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].identifier(), "id");
    assert!(errors[0].is_primary_key());

    let options = SyncOptions {
        delete_missing_fields: true,
        create_table_if_not_exists: true,
        create_references: true,
    };
    match merchants.sync_to_schema(options).await {
        Err(Error::InvalidSchema { table, errors }) => {
            assert_eq!(table, "merchant");
            assert_eq!(errors.len(), 1);
        }
        other => panic!("expected invalid schema, got {:?}", other),
    }
}

/// Recursive embedding makes an existing table invalid
#[tokio::test]
async fn test_recursive_entity_table_is_invalid() {
    let (_, samples) = repository::<SampleEntity>(
        MemoryStore::new().with_table("sample_entity", "id"),
        fast_config(),
    );

    let mut errors = Vec::new();
    assert!(!samples.is_valid(&mut errors).await.unwrap());
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].error_type(),
        SchemaValidationErrorType::RecursiveDependency
    );
}

/// Only single-attribute indexes can be created
#[tokio::test]
async fn test_multi_attribute_index_rejected() {
    let (store, trips) = repository::<Trip>(MemoryStore::new(), fast_config());

    let result = trips.sync_to_schema(SyncOptions::create_if_missing()).await;
    match result {
        Err(Error::InvalidIndex { table, index, .. }) => {
            assert_eq!(table, "trip");
            assert_eq!(index, "trip.origin-destination");
        }
        other => panic!("expected invalid index, got {:?}", other.map(|_| ())),
    }
    assert!(store.describe_table("trip").await.unwrap().is_none());
}

/// DynamoDB keys cannot be booleans, so a boolean index is refused before creation
#[tokio::test]
async fn test_boolean_index_rejected() {
    let (store, reminders) = repository::<Reminder>(MemoryStore::new(), fast_config());

    match reminders.table_spec() {
        Err(error) => {
            assert!(error.is_configuration_error());
            match error {
                Error::InvalidIndex { table, index, .. } => {
                    assert_eq!(table, "reminder");
                    assert_eq!(index, "reminder.done");
                }
                other => panic!("expected invalid index, got {:?}", other),
            }
        }
        Ok(spec) => panic!("boolean index accepted: {:?}", spec),
    }

    let result = reminders.sync_to_schema(SyncOptions::create_if_missing()).await;
    assert!(matches!(result, Err(Error::InvalidIndex { .. })));
    assert!(store.describe_table("reminder").await.unwrap().is_none());
}

/// Deleting waits for the table to disappear
#[tokio::test]
async fn test_delete_table() {
    let (store, categories) = repository::<Category>(MemoryStore::new(), fast_config());

    assert!(!categories.delete_table().await.unwrap());
    assert!(categories.sync_to_schema(SyncOptions::create_if_missing()).await.unwrap());
    assert!(categories.delete_table().await.unwrap());
    assert!(store.describe_table("category").await.unwrap().is_none());
    assert!(categories.live_schema().await.unwrap().is_none());
}
