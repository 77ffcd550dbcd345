//! Bounded, tracked execution of inbound messages

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::handler::ConversationHandler;
use crate::types::InboundMessage;

/// Counter snapshot exposed on `/health`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DispatchStats {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub in_flight: u64,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

/// Spawns one task per message, at most `max_in_flight` running at once
pub struct Dispatcher {
    handler: Arc<ConversationHandler>,
    permits: Arc<Semaphore>,
    tasks: Mutex<JoinSet<()>>,
    counters: Arc<Counters>,
}

impl Dispatcher {
    pub fn new(handler: Arc<ConversationHandler>, max_in_flight: usize) -> Self {
        Self {
            handler,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
            tasks: Mutex::new(JoinSet::new()),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn handler(&self) -> &Arc<ConversationHandler> {
        &self.handler
    }

    /// Queue a message for handling. Must be called inside a tokio runtime.
    pub fn submit(&self, message: InboundMessage) {
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);

        let handler = Arc::clone(&self.handler);
        let permits = Arc::clone(&self.permits);
        let counters = Arc::clone(&self.counters);

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        // Reap finished tasks so the set only holds live work
        while tasks.try_join_next().is_some() {}

        tasks.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                return;
            };

            match handler.handle_message(&message.phone, &message.text).await {
                Ok(step) => {
                    debug!(
                        "Handled message from {} ({} directives)",
                        message.phone,
                        step.directives.len()
                    );
                    counters.completed.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    error!("Failed to handle message from {}: {}", message.phone, e);
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                }
            }
        });
    }

    pub fn stats(&self) -> DispatchStats {
        let submitted = self.counters.submitted.load(Ordering::Relaxed);
        let completed = self.counters.completed.load(Ordering::Relaxed);
        let failed = self.counters.failed.load(Ordering::Relaxed);

        DispatchStats {
            submitted,
            completed,
            failed,
            in_flight: submitted.saturating_sub(completed + failed),
        }
    }

    /// Wait for every submitted message to finish
    pub async fn drain(&self) {
        let mut tasks = {
            let mut guard = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };

        if !tasks.is_empty() {
            info!("Waiting for {} in-flight messages", tasks.len());
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!("Message task aborted: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::tests::{
        fixture, yielding_fixture, RecordingNotifier, RecordingSender, ReadOnlyRepository, PHONE,
    };
    use cv_core::{ContactRepository, ConversationState, Outcome, Script};

    #[tokio::test]
    async fn test_drain_waits_for_all_messages() {
        let f = fixture();
        let dispatcher = Dispatcher::new(Arc::new(f.handler), 2);

        let phones: Vec<String> = (0..10).map(|i| format!("57300123450{}", i)).collect();
        for phone in &phones {
            dispatcher.submit(InboundMessage::new(phone.clone(), "hola"));
        }
        dispatcher.drain().await;

        assert_eq!(
            dispatcher.stats(),
            DispatchStats {
                submitted: 10,
                completed: 10,
                failed: 0,
                in_flight: 0,
            }
        );
        assert_eq!(f.sender.sent.lock().unwrap().len(), 10);
        for phone in &phones {
            let contact = f.repo.get(phone).await.unwrap().unwrap();
            assert_eq!(contact.state, ConversationState::AwaitingSentiment);
        }
    }

    #[tokio::test]
    async fn test_messages_from_one_contact_apply_in_turn() {
        let f = yielding_fixture();
        let dispatcher = Dispatcher::new(Arc::new(f.handler), 4);

        // Both tasks are in flight together; the second must see the state
        // written by the first.
        dispatcher.submit(InboundMessage::new(PHONE, "hola"));
        dispatcher.submit(InboundMessage::new(PHONE, "1"));
        dispatcher.drain().await;

        let contact = f.repo.get(PHONE).await.unwrap().unwrap();
        assert_eq!(contact.state, ConversationState::AwaitingLocality);
        assert_eq!(contact.outcome, Some(Outcome::Supportive));
        assert_eq!(dispatcher.stats().completed, 2);
    }

    #[tokio::test]
    async fn test_storage_failures_are_counted() {
        let handler = ConversationHandler::new(
            Arc::new(ReadOnlyRepository),
            Arc::new(RecordingSender::default()),
            Arc::new(RecordingNotifier::default()),
            Script::default(),
        );
        let dispatcher = Dispatcher::new(Arc::new(handler), 1);

        dispatcher.submit(InboundMessage::new(PHONE, "hola"));
        dispatcher.submit(InboundMessage::new("573009999999", "hola"));
        dispatcher.drain().await;

        let stats = dispatcher.stats();
        assert_eq!(stats.submitted, 2);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.in_flight, 0);
    }

    #[tokio::test]
    async fn test_drain_with_nothing_submitted() {
        let dispatcher = Dispatcher::new(Arc::new(fixture().handler), 1);
        dispatcher.drain().await;
        assert_eq!(dispatcher.stats(), DispatchStats::default());
    }
}
