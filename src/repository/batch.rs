use futures_util::{StreamExt, TryStreamExt};
use log::{debug, warn};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_stream::{self as stream};

use crate::Error;
use crate::store::{BATCH_WRITE_SIZE, BatchOutcome, DocumentStore, Item};

/// Calculate retry delay with exponential backoff
///
/// `attempt` is 0-based; the delay doubles each attempt and never exceeds `max`.
pub(crate) fn retry_delay(attempt: usize, initial: Duration, max: Duration) -> Duration {
    let factor = 2u32.saturating_pow(u32::try_from(attempt).unwrap_or(u32::MAX));
    initial.saturating_mul(factor).min(max)
}

/// How unprocessed items are retried
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum retries per task; `None` keeps retrying until the batch times out
    pub max_retries: Option<usize>,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound of the exponential delay
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    /// Retry without limit and without delay
    fn default() -> Self {
        Self {
            max_retries: None,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }
}

impl RetryConfig {
    /// Bounded retries with exponential backoff
    pub fn exponential(max_retries: usize, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries: Some(max_retries),
            initial_delay,
            max_delay,
        }
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn delay(&self, attempt: usize) -> Duration {
        retry_delay(attempt, self.initial_delay, self.max_delay)
    }
}

/// Chunking, concurrency and timeout settings of bulk operations
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchConfig {
    /// Items per batch call, at most [`BATCH_WRITE_SIZE`]
    pub chunk_size: usize,
    /// Tasks in flight at once
    pub workers: usize,
    /// Time allowed per task; a bulk call gets this times its task count
    pub task_timeout: Duration,
    /// Retry policy for unprocessed items
    pub retry: RetryConfig,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: BATCH_WRITE_SIZE,
            workers: 25,
            task_timeout: Duration::from_secs(10),
            retry: RetryConfig::default(),
        }
    }
}

impl BatchConfig {
    /// Run one task at a time
    pub fn sequential() -> Self {
        Self {
            workers: 1,
            ..Self::default()
        }
    }

    fn chunk_size(&self) -> usize {
        self.chunk_size.clamp(1, BATCH_WRITE_SIZE)
    }
}

/// What a bulk operation did
#[must_use = "batch reports tell how many store calls and retries a bulk operation needed"]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Tasks run
    pub tasks: usize,
    /// Store calls made, retries included
    pub dispatches: usize,
    /// Resubmissions of unprocessed items
    pub retries: usize,
    /// Items (or keys) submitted
    pub items: usize,
}

impl BatchReport {
    fn merge(mut self, other: BatchReport) -> Self {
        self.tasks += other.tasks;
        self.dispatches += other.dispatches;
        self.retries += other.retries;
        self.items += other.items;
        self
    }
}

/// One unit of bulk work
#[derive(Debug)]
pub(crate) enum BatchTask {
    /// Single put of a new entity
    Insert(Item),
    /// Batch write of one chunk
    Write(Vec<Item>),
    /// Batch delete of one chunk of ids
    Delete(Vec<String>),
}

/// Runs [`BatchTask`]s against one table
#[derive(Debug)]
pub(crate) struct BatchExecutor<'a, S> {
    store: &'a S,
    table: &'static str,
    key_field: &'static str,
    config: &'a BatchConfig,
}

impl<'a, S: DocumentStore> BatchExecutor<'a, S> {
    pub(crate) fn new(
        store: &'a S,
        table: &'static str,
        key_field: &'static str,
        config: &'a BatchConfig,
    ) -> Self {
        Self {
            store,
            table,
            key_field,
            config,
        }
    }

    /// Split `items` into write tasks of at most `chunk_size` items
    pub(crate) fn write_tasks(&self, items: Vec<Item>) -> Vec<BatchTask> {
        chunks(items, self.config.chunk_size())
            .into_iter()
            .map(BatchTask::Write)
            .collect()
    }

    /// Split `ids` into delete tasks of at most `chunk_size` keys
    pub(crate) fn delete_tasks(&self, ids: Vec<String>) -> Vec<BatchTask> {
        chunks(ids, self.config.chunk_size())
            .into_iter()
            .map(BatchTask::Delete)
            .collect()
    }

    /// Run every task, at most `workers` at a time
    ///
    /// Fails with [`Error::BatchTimeout`] when the tasks do not all finish within
    /// `task_timeout` times the task count; work still in flight is dropped. The first task
    /// error aborts the rest.
    pub(crate) async fn run(&self, tasks: Vec<BatchTask>) -> Result<BatchReport, Error> {
        let total = tasks.len();
        if total == 0 {
            return Ok(BatchReport::default());
        }

        let budget = self
            .config
            .task_timeout
            .saturating_mul(u32::try_from(total).unwrap_or(u32::MAX));
        let concurrency = total.min(self.config.workers.max(1));
        let completed = AtomicUsize::new(0);

        let pipeline = stream::iter(tasks.into_iter().map(|task| self.execute(task, &completed)))
            .buffer_unordered(concurrency)
            .try_fold(BatchReport::default(), |report, task| async move {
                Ok(report.merge(task))
            });

        match timeout(budget, pipeline).await {
            Ok(report) => {
                let report = report?;
                debug!(
                    "Batch on table {} finished: {} tasks, {} store calls, {} retries",
                    self.table, report.tasks, report.dispatches, report.retries
                );
                Ok(report)
            }
            Err(_) => Err(Error::BatchTimeout {
                table: self.table,
                timeout: budget,
                completed: completed.load(Ordering::SeqCst),
                total,
            }),
        }
    }

    async fn execute(&self, task: BatchTask, completed: &AtomicUsize) -> Result<BatchReport, Error> {
        let report = match task {
            BatchTask::Insert(item) => {
                self.store.put_item(self.table, item).await?;
                BatchReport {
                    tasks: 1,
                    dispatches: 1,
                    retries: 0,
                    items: 1,
                }
            }
            BatchTask::Write(items) => {
                self.drain(items, |items| self.store.batch_write(self.table, items))
                    .await?
            }
            BatchTask::Delete(ids) => {
                self.drain(ids, |ids| {
                    self.store
                        .batch_delete_by_key(self.table, self.key_field, ids)
                })
                .await?
            }
        };

        let _ = completed.fetch_add(1, Ordering::SeqCst);
        Ok(report)
    }

    /// Submit `pending` and resubmit whatever comes back unprocessed
    async fn drain<K, F, Fut>(&self, mut pending: Vec<K>, mut submit: F) -> Result<BatchReport, Error>
    where
        F: FnMut(Vec<K>) -> Fut,
        Fut: Future<Output = Result<BatchOutcome<K>, Error>>,
    {
        let retry = self.config.retry;
        let mut report = BatchReport {
            tasks: 1,
            items: pending.len(),
            ..BatchReport::default()
        };

        loop {
            let outcome = submit(pending).await?;
            report.dispatches += 1;

            if outcome.is_complete() {
                return Ok(report);
            }
            pending = outcome.unprocessed;

            if retry
                .max_retries
                .is_some_and(|max_retries| report.retries >= max_retries)
            {
                return Err(Error::UnprocessedItems {
                    table: self.table,
                    remaining: pending.len(),
                    retries: report.retries,
                });
            }

            let delay = retry.delay(report.retries);
            report.retries += 1;
            warn!(
                "Going to retry {} unprocessed items on table {} (try #{})",
                pending.len(),
                self.table,
                report.retries
            );

            if delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                sleep(delay).await;
            }
        }
    }
}

fn chunks<K>(mut items: Vec<K>, size: usize) -> Vec<Vec<K>> {
    let mut out = Vec::with_capacity(items.len().div_ceil(size));
    while items.len() > size {
        let rest = items.split_off(size);
        out.push(items);
        items = rest;
    }
    if !items.is_empty() {
        out.push(items);
    }
    out
}
