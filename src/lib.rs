//! # DynamoDB Entity Mapping
//!
//! Maps plain Rust structs to flat DynamoDB items and back, keeps tables in line with the
//! entity declarations and runs bulk writes with bounded concurrency.
//!
//! ## Features
//!
//! - **Explicit descriptors**: entities list their fields once; the list is cached per type
//! - **Embedded value objects**: flattened into dotted attributes (`attachment.location`)
//! - **References**: many-to-one links stored as `<field>.<id>` and resolved on read
//! - **Schema reconciliation**: validate a live table or create it with its secondary indexes
//! - **Batch writes**: chunks of 25, parallel dispatch, unprocessed item retry, overall timeout
//! - **Pluggable storage**: DynamoDB through the AWS SDK, or the in-process [`MemoryStore`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dynamo_entity::entity::{Entity, FieldDescriptor, Record, RecordKind, UuidGenerator};
//! use dynamo_entity::{EntityManager, Error, SyncOptions};
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
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let config = aws_config::defaults(aws_config::BehaviorVersion::latest()).load().await;
//!     dynamo_entity::init(&config).await;
//!
//!     let manager = EntityManager::connect().await;
//!     let merchants = manager.add_entity::<Merchant>()?;
//!     merchants.sync_to_schema(SyncOptions::create_if_missing()).await?;
//!
//!     let mut merchant = Merchant { id: None, name: "Coffee Shop".to_string() };
//!     merchants.save(&mut merchant).await?;
//!
//!     let found = merchants.find_by("name", "Coffee Shop").await?;
//!     assert_eq!(found.len(), 1);
//!
//!     Ok(())
//! }
//! ```
#![deny(
    warnings,
    bad_style,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused,
    unused_allocation,
    unused_comparisons,
    unused_parens,
    while_true,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results,
    deprecated,
    unknown_lints,
    unreachable_code,
    unused_mut
)]

mod error;
pub use error::Error;

/// Entity declarations and id generation
pub mod entity;

/// Entity/attribute mappers and reference resolution
pub mod mapping;

/// Schema model and validation errors
pub mod schema;

/// Storage collaborator and its implementations
pub mod store;

/// Per-entity repositories
pub mod repository;

mod manager;

// Re-export main types for convenience
pub use entity::{Entity, FieldDescriptor, Record, RecordKind};
pub use manager::EntityManager;
pub use mapping::RepositoryRegistry;
pub use repository::{
    BatchConfig, BatchReport, Repository, RepositoryConfig, RetryConfig, SyncOptions,
};
pub use store::{DocumentStore, DynamoDbStore, MemoryStore};

use aws_config::retry::RetryConfig as SdkRetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, defaults};
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_types::SdkConfig;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Client shared by every [`DynamoDbStore::from_global`] store
static GLOBAL_CLIENT: OnceCell<DynamoDbClient> = OnceCell::const_new();

const LOCALSTACK_ENDPOINT: &str = "http://127.0.0.1:4566";

/// SDK settings used when the global client is built lazily
///
/// Table creation polls and batch calls retry on their own, so the SDK keeps few attempts and
/// short connect timeouts.
async fn default_sdk_config() -> SdkConfig {
    let mut loader = defaults(BehaviorVersion::latest())
        .retry_config(
            SdkRetryConfig::adaptive()
                .with_max_attempts(3)
                .with_initial_backoff(Duration::from_secs(1)),
        )
        .timeout_config(
            TimeoutConfig::builder()
                .connect_timeout(Duration::from_secs(3))
                .read_timeout(Duration::from_secs(20))
                .operation_timeout(Duration::from_secs(60))
                .build(),
        );

    if std::env::var("AWS_PROFILE").is_ok_and(|profile| profile == "localstack") {
        loader = loader.endpoint_url(LOCALSTACK_ENDPOINT);
    }

    loader.load().await
}

/// Build the global client from `config`
///
/// Must run before the first [`EntityManager::connect`]; later calls are ignored.
pub async fn init(config: &SdkConfig) {
    let _ = GLOBAL_CLIENT
        .get_or_init(|| async { DynamoDbClient::new(config) })
        .await;
}

/// Use `client` as the global client; ignored once a client is set
pub async fn init_with_client(client: DynamoDbClient) {
    let _ = GLOBAL_CLIENT.get_or_init(|| async { client }).await;
}

/// The global client, built with default settings on first use
///
/// Defaults: adaptive retry with 3 attempts, 3s connect, 20s read and 60s operation timeouts.
/// With `AWS_PROFILE=localstack` the client targets LocalStack on port 4566.
pub async fn dynamodb_client() -> &'static DynamoDbClient {
    GLOBAL_CLIENT
        .get_or_init(|| async { DynamoDbClient::new(&default_sdk_config().await) })
        .await
}
