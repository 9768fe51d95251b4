//! Task queue seams: publishing from the dispatcher and handlers, claiming
//! from the consumer.

use adreport_core::ReportTask;
use async_trait::async_trait;

use crate::error::StoreError;

/// A claimed queue message awaiting ack, release or burial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    pub id: i64,
    pub body: String,
    pub attempts: i32,
}

/// Buffered task publishing.
///
/// Published tasks are not visible to consumers until [`flush`] returns.
///
/// [`flush`]: TaskPublisher::flush
#[async_trait]
pub trait TaskPublisher: Send + Sync {
    async fn publish(&self, task: ReportTask) -> Result<(), StoreError>;

    /// Durably enqueue everything published so far. Returns how many tasks
    /// were written.
    async fn flush(&self) -> Result<usize, StoreError>;
}

/// At-least-once message delivery.
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Claim the next available message, if any.
    async fn claim(&self) -> Result<Option<QueuedMessage>, StoreError>;

    /// The message was handled; remove it.
    async fn ack(&self, id: i64) -> Result<(), StoreError>;

    /// The message failed transiently; make it available again.
    async fn release(&self, id: i64, error: &str) -> Result<(), StoreError>;

    /// The message can never succeed; park it.
    async fn bury(&self, id: i64, error: &str) -> Result<(), StoreError>;
}
