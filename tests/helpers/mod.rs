/// Test helpers and fixtures for repository integration tests
///
/// Builds managers over the in-process store with the fixture entities registered and their
/// tables created.
pub mod fixtures;

pub use dynamo_entity::store::{MemoryStore, UnprocessedPolicy};
pub use dynamo_entity::{
    BatchConfig, EntityManager, Error, Repository, RepositoryConfig, RetryConfig, SyncOptions,
};

// Re-export common fixtures
pub use fixtures::{Attachment, Category, Expense, Merchant};

#[allow(unused_imports)]
pub use fixtures::{
    ExpenseReport, Invoice, Note, Price, Product, Reminder, SampleEmbeddable, SampleEntity,
    Trip,
};

use std::sync::Arc;
use std::time::Duration;

/// Repository settings with fast table polling
#[allow(dead_code)]
pub fn fast_config() -> RepositoryConfig {
    RepositoryConfig {
        table_wait_timeout: Duration::from_secs(5),
        table_poll_interval: Duration::from_millis(1),
        ..RepositoryConfig::default()
    }
}

/// Repositories of the expense model sharing one store
#[allow(dead_code)]
pub struct ExpenseModel {
    pub manager: EntityManager<MemoryStore>,
    pub merchants: Arc<Repository<Merchant, MemoryStore>>,
    pub categories: Arc<Repository<Category, MemoryStore>>,
    pub expenses: Arc<Repository<Expense, MemoryStore>>,
}

#[allow(dead_code)]
impl ExpenseModel {
    /// Underlying store, to inspect recorded batch calls
    pub fn store(&self) -> &MemoryStore {
        self.manager.store()
    }
}

/// Expense model over `store`, with every table created
#[allow(dead_code)]
pub async fn expense_model_with(store: MemoryStore, config: RepositoryConfig) -> ExpenseModel {
    let manager = EntityManager::with_config(store, config);

    let merchants = manager.add_entity::<Merchant>().unwrap();
    let categories = manager.add_entity::<Category>().unwrap();
    let expenses = manager.add_entity::<Expense>().unwrap();

    assert!(merchants.sync_to_schema(SyncOptions::create_if_missing()).await.unwrap());
    assert!(categories.sync_to_schema(SyncOptions::create_if_missing()).await.unwrap());
    assert!(expenses.sync_to_schema(SyncOptions::create_if_missing()).await.unwrap());

    ExpenseModel {
        manager,
        merchants,
        categories,
        expenses,
    }
}

/// Expense model over an empty store with default settings
#[allow(dead_code)]
pub async fn expense_model() -> ExpenseModel {
    expense_model_with(MemoryStore::new(), fast_config()).await
}

/// `count` merchants with preset ids `merchant-000`, `merchant-001`, ...
#[allow(dead_code)]
pub fn merchants_with_ids(count: usize) -> Vec<Merchant> {
    (0..count)
        .map(|i| Merchant::with_id(&format!("merchant-{:03}", i), &format!("Merchant {}", i)))
        .collect()
}
