use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use super::{EventRecord, EventSource};
use crate::config::EventsConfig;

const MAX_CHANNEL_CAPACITY: usize = 256;

/// Bounds for a single pull: stop at `max_events` records or after `listen`,
/// whichever comes first.
#[derive(Debug, Clone, Copy)]
pub struct CollectWindow {
    pub max_events: usize,
    pub listen: Duration,
    /// How long a cancelled source may take to unwind before it is aborted.
    pub shutdown_grace: Duration,
}

impl From<&EventsConfig> for CollectWindow {
    fn from(config: &EventsConfig) -> Self {
        Self {
            max_events: config.max_events,
            listen: config.listen,
            shutdown_grace: config.shutdown_grace,
        }
    }
}

/// Runs `source` until the window closes and returns what it delivered.
///
/// `max_events` is a hard cap. Once this returns the source task has either
/// finished or been aborted, and nothing else holds the returned records.
pub async fn collect(source: Arc<dyn EventSource>, window: CollectWindow) -> Vec<EventRecord> {
    if window.max_events == 0 {
        return Vec::new();
    }

    let deadline = Instant::now() + window.listen;
    let capacity = window.max_events.min(MAX_CHANNEL_CAPACITY);
    let (tx, mut rx) = mpsc::channel(capacity);
    let mut pump = tokio::spawn(async move { source.pump(tx).await });

    let mut events = Vec::with_capacity(capacity);
    loop {
        // The timer rounds deadlines up, so sleep_until alone can fire late.
        if Instant::now() >= deadline {
            tracing::debug!("Listen window elapsed with {} events", events.len());
            break;
        }
        tokio::select! {
            biased;
            _ = tokio::time::sleep_until(deadline) => {
                tracing::debug!("Listen window elapsed with {} events", events.len());
                break;
            }
            next = rx.recv() => match next {
                Some(record) => {
                    events.push(record);
                    if events.len() >= window.max_events {
                        tracing::debug!("Reached max events ({})", window.max_events);
                        break;
                    }
                }
                None => {
                    tracing::debug!("Event source closed after {} events", events.len());
                    break;
                }
            },
        }
    }

    // Closing the receiver is the cancellation signal for the source.
    drop(rx);
    match tokio::time::timeout(window.shutdown_grace, &mut pump).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => tracing::warn!("Event source stopped with error: {}", e),
        Ok(Err(e)) => tracing::warn!("Event source task failed: {}", e),
        Err(_) => {
            tracing::warn!(
                "Event source did not stop within {:?}, aborting",
                window.shutdown_grace
            );
            pump.abort();
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventSourceError;
    use async_trait::async_trait;

    fn record(i: i64) -> EventRecord {
        EventRecord {
            partition: "0".into(),
            offset: i.to_string(),
            sequence_number: i,
            enqueued_time: None,
            body: format!("event-{}", i),
        }
    }

    /// Sends `count` records back to back, then idles until cancelled.
    struct Burst(i64);

    #[async_trait]
    impl EventSource for Burst {
        async fn pump(&self, sink: mpsc::Sender<EventRecord>) -> Result<(), EventSourceError> {
            for i in 0..self.0 {
                if sink.send(record(i)).await.is_err() {
                    return Ok(());
                }
            }
            sink.closed().await;
            Ok(())
        }
    }

    /// Never looks at the sink.
    struct Stubborn;

    #[async_trait]
    impl EventSource for Stubborn {
        async fn pump(&self, _sink: mpsc::Sender<EventRecord>) -> Result<(), EventSourceError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    struct Broken;

    #[async_trait]
    impl EventSource for Broken {
        async fn pump(&self, _sink: mpsc::Sender<EventRecord>) -> Result<(), EventSourceError> {
            Err(EventSourceError::ConnectionString("no endpoint".into()))
        }
    }

    fn window(max_events: usize, listen_ms: u64) -> CollectWindow {
        CollectWindow {
            max_events,
            listen: Duration::from_millis(listen_ms),
            shutdown_grace: Duration::from_millis(200),
        }
    }

    #[tokio::test]
    async fn zero_window_returns_immediately() {
        let started = std::time::Instant::now();
        let events = collect(Arc::new(Burst(10)), window(0, 0)).await;
        assert!(events.is_empty());
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn zero_listen_collects_nothing() {
        for _ in 0..20 {
            let events = collect(Arc::new(Burst(10)), window(50, 0)).await;
            assert!(events.is_empty());
        }
    }

    #[tokio::test]
    async fn burst_is_capped_at_max_events() {
        let started = std::time::Instant::now();
        let events = collect(Arc::new(Burst(500)), window(50, 5_000)).await;

        assert_eq!(events.len(), 50);
        assert_eq!(events.first().unwrap().sequence_number, 0);
        assert_eq!(events.last().unwrap().sequence_number, 49);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn listen_window_bounds_a_quiet_source() {
        let started = std::time::Instant::now();
        let events = collect(Arc::new(Burst(3)), window(50, 150)).await;

        assert_eq!(events.len(), 3);
        assert!(started.elapsed() >= Duration::from_millis(150));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn unresponsive_source_is_aborted_after_grace() {
        let started = std::time::Instant::now();
        let events = collect(Arc::new(Stubborn), window(50, 50)).await;

        assert!(events.is_empty());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn failing_source_yields_empty_batch() {
        let started = std::time::Instant::now();
        let events = collect(Arc::new(Broken), window(50, 5_000)).await;

        assert!(events.is_empty());
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
