//! Notification dispatcher
//!
//! At-least-once fan-out of domain events to every configured sink. Each
//! sink gets a bounded number of attempts; failures are logged and reported
//! back but never turned into an error for the caller, whose state change is
//! already committed. Services hand events to [`NotificationDispatcher::spawn`]
//! so a slow sink never holds up the response.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use market_common::NotificationConfig;
use market_core::{DomainError, DomainEvent, Notification, NotificationSink};

/// What happened to one dispatch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: Vec<&'static str>,
    pub failed: Vec<&'static str>,
}

impl DispatchReport {
    pub fn all_delivered(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct NotificationDispatcher {
    sinks: Vec<Arc<dyn NotificationSink>>,
    max_attempts: u32,
    retry_delay: Duration,
    in_flight: AtomicUsize,
    idle: Notify,
}

/// Decrements the in-flight count even if the dispatch task is cancelled
struct InFlight(Arc<NotificationDispatcher>);

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.0.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

impl NotificationDispatcher {
    pub fn new(sinks: Vec<Arc<dyn NotificationSink>>, config: &NotificationConfig) -> Self {
        Self {
            sinks,
            max_attempts: config.max_attempts.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            in_flight: AtomicUsize::new(0),
            idle: Notify::new(),
        }
    }

    pub fn sink_names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Dispatch on a background task
    pub fn spawn(self: &Arc<Self>, event: DomainEvent) -> JoinHandle<DispatchReport> {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        let guard = InFlight(Arc::clone(self));
        tokio::spawn(async move {
            let report = guard.0.dispatch(&event).await;
            drop(guard);
            report
        })
    }

    /// Number of spawned dispatches not yet finished
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Wait until every spawned dispatch has finished
    pub async fn settled(&self) {
        loop {
            let idle = self.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();
            if self.in_flight() == 0 {
                return;
            }
            idle.await;
        }
    }

    #[instrument(skip(self, event), fields(event_type = event.event_type()))]
    pub async fn dispatch(&self, event: &DomainEvent) -> DispatchReport {
        let notification = event.to_notification();
        let mut report = DispatchReport::default();

        for sink in &self.sinks {
            match self.deliver_with_retry(sink.as_ref(), &notification).await {
                Ok(()) => report.delivered.push(sink.name()),
                Err(e) => {
                    warn!(
                        sink = sink.name(),
                        event_id = %notification.event_id,
                        error = %e,
                        "Notification dropped after retries"
                    );
                    report.failed.push(sink.name());
                }
            }
        }

        report
    }

    async fn deliver_with_retry(
        &self,
        sink: &dyn NotificationSink,
        notification: &Notification,
    ) -> Result<(), DomainError> {
        let mut attempt = 1;
        loop {
            match sink.deliver(notification).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.max_attempts => {
                    warn!(sink = sink.name(), attempt, error = %e, "Notification delivery failed, retrying");
                    tokio::time::sleep(self.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Writes every notification to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSink;

#[async_trait]
impl NotificationSink for LoggingSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), DomainError> {
        info!(
            event_id = %notification.event_id,
            event_type = %notification.event_type,
            recipients = ?notification.recipients,
            "Notification"
        );
        Ok(())
    }
}

/// Keeps every delivered notification in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.delivered.lock().clone()
    }

    pub fn event_types(&self) -> Vec<String> {
        self.delivered.lock().iter().map(|n| n.event_type.clone()).collect()
    }

    pub fn count_of(&self, event_type: &str) -> usize {
        self.delivered
            .lock()
            .iter()
            .filter(|n| n.event_type == event_type)
            .count()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), DomainError> {
        self.delivered.lock().push(notification.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_core::Snowflake;
    use std::sync::atomic::AtomicU32;
    use std::time::Instant;

    /// Fails the first `failures` deliveries
    struct FlakySink {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl NotificationSink for FlakySink {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn deliver(&self, _notification: &Notification) -> Result<(), DomainError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(DomainError::DependencyUnavailable("push gateway".into()))
            } else {
                Ok(())
            }
        }
    }

    fn event() -> DomainEvent {
        DomainEvent::RequestCompleted {
            request_id: Snowflake::new(1),
            buyer_id: Snowflake::new(2),
            supplier_id: Snowflake::new(3),
        }
    }

    fn config(max_attempts: u32) -> NotificationConfig {
        NotificationConfig {
            max_attempts,
            retry_delay_ms: 1,
        }
    }

    #[tokio::test]
    async fn test_retries_until_delivered() {
        let flaky = Arc::new(FlakySink {
            failures: 2,
            calls: AtomicU32::new(0),
        });
        let dispatcher = NotificationDispatcher::new(vec![flaky.clone()], &config(3));

        let report = dispatcher.dispatch(&event()).await;
        assert!(report.all_delivered());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failure_is_reported_not_raised() {
        let flaky = Arc::new(FlakySink {
            failures: u32::MAX,
            calls: AtomicU32::new(0),
        });
        let recording = Arc::new(RecordingSink::new());
        let dispatcher =
            NotificationDispatcher::new(vec![flaky.clone(), recording.clone()], &config(2));

        let report = dispatcher.dispatch(&event()).await;
        assert_eq!(report.failed, vec!["flaky"]);
        assert_eq!(report.delivered, vec!["recording"]);
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 2);
        assert_eq!(recording.event_types(), vec!["request_completed".to_string()]);
    }

    #[tokio::test]
    async fn test_notification_carries_stable_event_id() {
        let recording = Arc::new(RecordingSink::new());
        let dispatcher = NotificationDispatcher::new(vec![recording.clone()], &config(1));

        dispatcher.dispatch(&event()).await;
        dispatcher.dispatch(&event()).await;

        let ids: Vec<_> = recording.notifications().into_iter().map(|n| n.event_id).collect();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0], ids[1]);
    }

    /// Fails every delivery after a fixed pause
    struct StallingSink {
        pause: Duration,
    }

    #[async_trait]
    impl NotificationSink for StallingSink {
        fn name(&self) -> &'static str {
            "stalling"
        }

        async fn deliver(&self, _notification: &Notification) -> Result<(), DomainError> {
            tokio::time::sleep(self.pause).await;
            Err(DomainError::DependencyUnavailable("push gateway".into()))
        }
    }

    #[tokio::test]
    async fn test_spawn_returns_before_slow_sink_finishes() {
        let recording = Arc::new(RecordingSink::new());
        let dispatcher = Arc::new(NotificationDispatcher::new(
            vec![
                Arc::new(StallingSink {
                    pause: Duration::from_millis(50),
                }),
                recording.clone(),
            ],
            &NotificationConfig {
                max_attempts: 3,
                retry_delay_ms: 100,
            },
        ));

        let started = Instant::now();
        let handle = dispatcher.spawn(event());
        assert!(started.elapsed() < Duration::from_millis(50));
        assert_eq!(dispatcher.in_flight(), 1);
        assert!(recording.notifications().is_empty());

        dispatcher.settled().await;
        assert_eq!(dispatcher.in_flight(), 0);
        assert_eq!(recording.event_types(), vec!["request_completed".to_string()]);

        let report = handle.await.unwrap();
        assert_eq!(report.failed, vec!["stalling"]);
    }

    #[tokio::test]
    async fn test_settled_returns_immediately_when_idle() {
        let dispatcher = Arc::new(NotificationDispatcher::new(vec![], &config(1)));
        tokio::time::timeout(Duration::from_millis(100), dispatcher.settled())
            .await
            .unwrap();
    }
}
