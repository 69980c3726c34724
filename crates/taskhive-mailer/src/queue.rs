//! Delivery queue — unbounded FIFO with a single background consumer.
//!
//! Producers (request handlers, scanner jobs) call `enqueue`, which is O(1),
//! never blocks, and never fails. The consumer task drains the queue for the
//! life of the process, delivering through the configured transport. A failed
//! send is logged and the job discarded — at-most-once, no retry.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use taskhive_core::types::EmailJob;

use crate::transport::MailTransport;

enum QueueMsg {
    Job(EmailJob),
    /// Ack once every message enqueued before this one has been attempted.
    Flush(oneshot::Sender<()>),
}

/// Handle to the delivery queue. Cheap to clone; all clones feed the same
/// consumer. Constructed once by the composition root — no ambient globals.
#[derive(Clone)]
pub struct Mailer {
    tx: mpsc::UnboundedSender<QueueMsg>,
}

impl Mailer {
    /// Start the consumer task and return the producer handle.
    pub fn start(transport: Arc<dyn MailTransport>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<QueueMsg>();

        tokio::spawn(async move {
            tracing::info!("📬 Email worker started (transport: {})", transport.name());
            while let Some(msg) = rx.recv().await {
                match msg {
                    QueueMsg::Job(job) => {
                        if let Err(e) = transport.send(&job.to, &job.subject, &job.body).await {
                            tracing::error!("Failed to send email to {}: {e}", job.to);
                        }
                    }
                    QueueMsg::Flush(ack) => {
                        let _ = ack.send(());
                    }
                }
            }
            tracing::info!("📬 Email worker stopped");
        });

        Self { tx }
    }

    /// Enqueue a job. Non-blocking, unbounded, never fails; if the worker is
    /// gone (shutdown) the job is silently dropped, matching the
    /// fire-and-forget contract.
    pub fn enqueue(&self, job: EmailJob) {
        let _ = self.tx.send(QueueMsg::Job(job));
    }

    /// Convenience wrapper over [`enqueue`](Self::enqueue).
    pub fn enqueue_email(&self, to: &str, subject: &str, body: &str) {
        self.enqueue(EmailJob {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
    }

    /// Wait until every job enqueued before this call has been attempted.
    /// Used by tests and orderly shutdown.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(QueueMsg::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }
}
