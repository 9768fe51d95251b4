//! Queue consumer: claim report tasks, route them to their handler, and
//! settle each message.

use std::sync::Arc;

use adreport_core::{QueueSettings, ReportTask, TaskMessage};
use tokio::sync::watch;

use crate::context::ReportContext;
use crate::daily::generate_daily_link_reports;
use crate::error::{StoreError, WorkerError};
use crate::lifetime::generate_lifetime_campaign_reports;
use crate::queue::{QueuedMessage, TaskSource};

/// How a single message was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// The handler ran to completion (including a no-op skip).
    Completed,
    /// The report failed or timed out; a fresh copy of the task was queued.
    Requeued,
    /// The action is not one this consumer handles.
    Dropped,
    /// The body is not a decodable task.
    Malformed(String),
}

async fn run_task(ctx: &ReportContext, task: &ReportTask) -> Result<(), WorkerError> {
    match task {
        ReportTask::GenerateDailyLinkReports(t) => generate_daily_link_reports(ctx, t).await?,
        ReportTask::GenerateLifetimeCampaignReports(t) => {
            generate_lifetime_campaign_reports(ctx, t).await?
        }
    };
    Ok(())
}

/// Decode one message body and run its handler.
///
/// A timed-out or failed report is not an error here: the same task is
/// published again and flushed, and the outcome is [`MessageOutcome::Requeued`].
///
/// # Errors
///
/// Returns [`WorkerError`] for transport, database or publish failures. The
/// caller should make the message available again.
pub async fn process_message(
    ctx: &ReportContext,
    body: &str,
) -> Result<MessageOutcome, WorkerError> {
    let task = match TaskMessage::decode(body) {
        Ok(TaskMessage::Task(task)) => task,
        Ok(TaskMessage::UnknownAction(action)) => {
            tracing::warn!(
                action = action.as_deref().unwrap_or("<missing>"),
                "consumer: dropping message with unknown action"
            );
            return Ok(MessageOutcome::Dropped);
        }
        Err(e) => return Ok(MessageOutcome::Malformed(e.to_string())),
    };

    match run_task(ctx, &task).await {
        Ok(()) => Ok(MessageOutcome::Completed),
        Err(e) if e.is_report_failure() => {
            tracing::error!(
                action = task.action(),
                error = %e,
                "consumer: report failed, re-enqueueing"
            );
            ctx.publisher.publish(task).await?;
            ctx.publisher.flush().await?;
            Ok(MessageOutcome::Requeued)
        }
        Err(e) => Err(e),
    }
}

/// Long-running consumer over a [`TaskSource`].
pub struct Consumer {
    ctx: ReportContext,
    source: Arc<dyn TaskSource>,
    settings: QueueSettings,
}

impl Consumer {
    #[must_use]
    pub fn new(ctx: ReportContext, source: Arc<dyn TaskSource>, settings: QueueSettings) -> Self {
        Self {
            ctx,
            source,
            settings,
        }
    }

    /// Claim and settle at most one message. Returns `false` when the queue
    /// was empty.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if claiming or settling the message fails.
    /// Handler failures are settled on the message, not returned.
    pub async fn run_once(&self) -> Result<bool, StoreError> {
        let Some(message) = self.source.claim().await? else {
            return Ok(false);
        };
        self.settle(&message).await?;
        Ok(true)
    }

    async fn settle(&self, message: &QueuedMessage) -> Result<(), StoreError> {
        match process_message(&self.ctx, &message.body).await {
            Ok(MessageOutcome::Malformed(reason)) => {
                tracing::error!(
                    message_id = message.id,
                    error = %reason,
                    "consumer: burying undecodable message"
                );
                self.source.bury(message.id, &reason).await
            }
            Ok(outcome) => {
                tracing::debug!(message_id = message.id, ?outcome, "consumer: message handled");
                self.source.ack(message.id).await
            }
            Err(e) => {
                tracing::error!(
                    message_id = message.id,
                    attempts = message.attempts,
                    error = %e,
                    "consumer: handler failed, releasing message"
                );
                self.source.release(message.id, &e.to_string()).await
            }
        }
    }

    /// Process messages until `shutdown` flips to `true`.
    ///
    /// Shutdown is checked between messages; an in-flight report is always
    /// finished first. When the queue is empty the consumer sleeps for the
    /// idle poll interval.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("consumer: started");
        while !*shutdown.borrow() {
            let idle = match self.run_once().await {
                Ok(handled) => !handled,
                Err(e) => {
                    tracing::error!(error = %e, "consumer: queue error");
                    true
                }
            };
            if idle {
                tokio::select! {
                    () = tokio::time::sleep(self.settings.idle_poll) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }
        tracing::info!("consumer: stopped");
    }
}

#[cfg(test)]
#[path = "consumer_test.rs"]
mod tests;
