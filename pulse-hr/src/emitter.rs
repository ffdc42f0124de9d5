//! Heart rate event stream
//!
//! One [`HeartRateEmitter`] per connection. The stream yields an event right
//! away, then one every `interval` until its cancellation token fires or the
//! consumer drops it. Cancellation is checked before every draw and raced
//! against the inter-event sleep, so nothing is emitted after the signal.

use futures::stream::Stream;
use pulse_common::{ServiceConfig, SseEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;
use crate::sample::HeartRateSample;

/// Event type label written on the `event:` line
pub const HEART_RATE_EVENT: &str = "heartRate";

/// Default delay between events
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(2000);

/// Default reconnection hint sent with every event
pub const DEFAULT_RETRY: Duration = Duration::from_millis(60_000);

/// Pacing and envelope settings shared by every connection
#[derive(Debug, Clone)]
pub struct EmitterSettings {
    interval: Duration,
    prototype: SseEvent,
}

impl EmitterSettings {
    /// Build settings, validating the event type label once up front
    pub fn new(interval: Duration, retry: Option<Duration>, event_type: &str) -> Result<Self> {
        let mut prototype = SseEvent::new(event_type, "")?;
        if let Some(retry) = retry {
            prototype = prototype.with_retry(retry);
        }
        Ok(Self { interval, prototype })
    }

    /// Heart rate settings with the given cadence and reconnection hint
    pub fn heart_rate(interval: Duration, retry: Duration) -> Result<Self> {
        Self::new(interval, Some(retry), HEART_RATE_EVENT)
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        Self::heart_rate(config.emit_interval(), config.retry())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn retry(&self) -> Option<Duration> {
        self.prototype.retry()
    }

    pub fn event_type(&self) -> &str {
        self.prototype.event_type()
    }

    fn event_for(&self, sample: HeartRateSample) -> SseEvent {
        self.prototype.with_data(sample.to_string())
    }
}

/// Count of events the consumer has taken delivery of
///
/// An event counts once the consumer polls the stream again after receiving
/// it. For an HTTP body that means the previous chunk was written out.
#[derive(Debug, Clone, Default)]
pub struct DeliveredEvents(Arc<AtomicU64>);

impl DeliveredEvents {
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

/// Producer of heart rate events for a single connection
pub struct HeartRateEmitter {
    settings: Arc<EmitterSettings>,
    cancel: CancellationToken,
    connection_id: Uuid,
    delivered: DeliveredEvents,
}

impl HeartRateEmitter {
    pub fn new(settings: Arc<EmitterSettings>, cancel: CancellationToken) -> Self {
        Self {
            settings,
            cancel,
            connection_id: Uuid::new_v4(),
            delivered: DeliveredEvents::default(),
        }
    }

    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    /// Handle onto this connection's delivery counter
    pub fn delivered(&self) -> DeliveredEvents {
        self.delivered.clone()
    }

    /// Token that stops this emitter's stream when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Turn the emitter into a lazy, cancellable event stream
    ///
    /// Dropping the stream cancels the emitter's token.
    pub fn into_stream(self) -> impl Stream<Item = SseEvent> + Send + 'static {
        let HeartRateEmitter {
            settings,
            cancel,
            connection_id,
            delivered,
        } = self;
        let guard = ConnectionGuard::with_counter(connection_id, cancel.clone(), delivered);

        async_stream::stream! {
            let guard = guard;

            loop {
                if cancel.is_cancelled() {
                    break;
                }

                let sample = HeartRateSample::draw();
                debug!(connection = %connection_id, bpm = sample.bpm(), "SSE: emitting heart rate");
                yield settings.event_for(sample);
                // Resumed: the consumer is asking for more, so the last event went out
                guard.record_event();

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(settings.interval) => {}
                }
            }

            debug!(connection = %connection_id, "SSE: heart rate stream cancelled");
        }
    }
}

/// Why a connection's stream ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The connection token fired first (server shutdown or explicit cancel)
    Cancelled,
    /// The stream was dropped with its token still live: the client went away
    /// or a body write failed
    ClientGone,
}

/// Per-connection guard owned by the event stream
///
/// Fires the connection's cancellation token when dropped and logs how the
/// connection ended.
#[derive(Debug)]
pub struct ConnectionGuard {
    connection_id: Uuid,
    cancel: CancellationToken,
    delivered: DeliveredEvents,
}

impl ConnectionGuard {
    pub fn new(connection_id: Uuid, cancel: CancellationToken) -> Self {
        Self::with_counter(connection_id, cancel, DeliveredEvents::default())
    }

    fn with_counter(
        connection_id: Uuid,
        cancel: CancellationToken,
        delivered: DeliveredEvents,
    ) -> Self {
        Self {
            connection_id,
            cancel,
            delivered,
        }
    }

    pub fn record_event(&self) {
        self.delivered.increment();
    }

    pub fn events_sent(&self) -> u64 {
        self.delivered.get()
    }

    /// Reason the connection would be reported as closed if dropped now
    pub fn close_reason(&self) -> CloseReason {
        if self.cancel.is_cancelled() {
            CloseReason::Cancelled
        } else {
            CloseReason::ClientGone
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let reason = self.close_reason();
        self.cancel.cancel();

        match reason {
            CloseReason::Cancelled => info!(
                connection = %self.connection_id,
                events_sent = self.events_sent(),
                "SSE heart rate stream closed by cancellation"
            ),
            CloseReason::ClientGone => info!(
                connection = %self.connection_id,
                events_sent = self.events_sent(),
                "SSE client disconnected from heart rate stream"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tokio::time::Instant;

    fn settings() -> Arc<EmitterSettings> {
        Arc::new(EmitterSettings::heart_rate(DEFAULT_INTERVAL, DEFAULT_RETRY).unwrap())
    }

    #[test]
    fn test_settings_reject_multiline_event_type() {
        assert!(EmitterSettings::new(DEFAULT_INTERVAL, None, "heart\nrate").is_err());
    }

    #[test]
    fn test_settings_from_default_config() {
        let settings = EmitterSettings::from_config(&ServiceConfig::default()).unwrap();
        assert_eq!(settings.interval(), Duration::from_secs(2));
        assert_eq!(settings.retry(), Some(Duration::from_secs(60)));
        assert_eq!(settings.event_type(), "heartRate");
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_carry_heart_rate_envelope() {
        let token = CancellationToken::new();
        let stream = HeartRateEmitter::new(settings(), token).into_stream();

        let events: Vec<SseEvent> = stream.take(10).collect().await;
        assert_eq!(events.len(), 10);

        for event in events {
            assert_eq!(event.event_type(), "heartRate");
            assert_eq!(event.retry(), Some(Duration::from_millis(60_000)));
            let bpm: u8 = event.data().parse().expect("data is a decimal integer");
            assert!((60..100).contains(&bpm));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_first_emission_yields_nothing() {
        let token = CancellationToken::new();
        token.cancel();

        let events: Vec<SseEvent> = HeartRateEmitter::new(settings(), token)
            .into_stream()
            .collect()
            .await;

        assert!(events.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_delay_ends_stream_without_another_event() {
        let token = CancellationToken::new();
        let stream = HeartRateEmitter::new(settings(), token.clone()).into_stream();
        tokio::pin!(stream);

        let start = Instant::now();
        assert!(stream.next().await.is_some());

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1000)).await;
            canceller.cancel();
        });

        assert!(stream.next().await.is_none());
        assert!(start.elapsed() < DEFAULT_INTERVAL);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_stream_cancels_token() {
        let token = CancellationToken::new();
        let emitter = HeartRateEmitter::new(settings(), token.child_token());
        let connection_token = emitter.cancel_token();
        let mut stream = Box::pin(emitter.into_stream());

        assert!(stream.next().await.is_some());
        assert!(!connection_token.is_cancelled());

        drop(stream);
        assert!(connection_token.is_cancelled());
        assert!(!token.is_cancelled(), "parent token must not be affected");
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_cancellation_stops_child_stream() {
        let shutdown = CancellationToken::new();
        let stream = HeartRateEmitter::new(settings(), shutdown.child_token()).into_stream();
        tokio::pin!(stream);

        assert!(stream.next().await.is_some());
        shutdown.cancel();
        assert!(stream.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_inter_event_gap_matches_interval() {
        let token = CancellationToken::new();
        let stream = HeartRateEmitter::new(settings(), token).into_stream();
        tokio::pin!(stream);

        let mut arrivals = Vec::new();
        for _ in 0..6 {
            stream.next().await.expect("stream keeps emitting");
            arrivals.push(Instant::now());
        }

        let mut gaps: Vec<Duration> = arrivals.windows(2).map(|w| w[1] - w[0]).collect();
        gaps.sort();
        let median = gaps[gaps.len() / 2];
        assert!(median >= Duration::from_millis(1800) && median <= Duration::from_millis(2200));
    }

    #[test]
    fn test_guard_counts_events_and_cancels_on_drop() {
        let token = CancellationToken::new();
        let guard = ConnectionGuard::new(Uuid::new_v4(), token.clone());
        guard.record_event();
        guard.record_event();
        assert_eq!(guard.events_sent(), 2);

        drop(guard);
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_close_reason_distinguishes_cancel_from_disconnect() {
        let token = CancellationToken::new();
        let guard = ConnectionGuard::new(Uuid::new_v4(), token.clone());
        assert_eq!(guard.close_reason(), CloseReason::ClientGone);

        token.cancel();
        assert_eq!(guard.close_reason(), CloseReason::Cancelled);
    }

    #[test]
    fn test_parent_shutdown_reports_cancelled() {
        let shutdown = CancellationToken::new();
        let guard = ConnectionGuard::new(Uuid::new_v4(), shutdown.child_token());

        shutdown.cancel();
        assert_eq!(guard.close_reason(), CloseReason::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_counted_only_after_consumer_pulls_again() {
        let emitter = HeartRateEmitter::new(settings(), CancellationToken::new());
        let delivered = emitter.delivered();
        let mut stream = Box::pin(emitter.into_stream());

        assert!(stream.next().await.is_some());
        assert_eq!(delivered.get(), 0, "handed off but not yet confirmed");

        assert!(stream.next().await.is_some());
        assert_eq!(delivered.get(), 1);

        // Dropped while holding the second event: it is never counted
        drop(stream);
        assert_eq!(delivered.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_before_cancel_are_counted() {
        let token = CancellationToken::new();
        let emitter = HeartRateEmitter::new(settings(), token.clone());
        let delivered = emitter.delivered();
        let mut stream = Box::pin(emitter.into_stream());

        assert!(stream.next().await.is_some());
        assert!(stream.next().await.is_some());
        token.cancel();
        assert!(stream.next().await.is_none());

        assert_eq!(delivered.get(), 2);
    }
}
