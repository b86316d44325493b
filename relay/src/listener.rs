//! Upstream subscription to the database notification channel.
//!
//! `EventSource` owns the one connection that issues `LISTEN`. It yields
//! payloads as a lazy stream and hides transport failures from its consumer
//! by reconnecting with the configured `Backoff`. Events notified while it
//! is reconnecting are lost; the channel is not durable.

use crate::backoff::Backoff;
use crate::error::{Error, RelayErrorKind};
use crate::RelaySettings;
use async_stream::stream;
use async_trait::async_trait;
use events::{Event, EventPublisher};
use futures::{Stream, StreamExt};
use log::*;
use sqlx::postgres::PgListener;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Opens a subscription to a named notification channel.
#[async_trait]
pub trait NotificationConnector: Send + Sync + 'static {
    type Stream: NotificationStream;

    async fn connect(&self, channel: &str) -> Result<Self::Stream, Error>;
}

/// An open subscription. Exactly one task reads from it.
#[async_trait]
pub trait NotificationStream: Send + 'static {
    /// Wait for the next payload. Any error means the subscription is gone
    /// and must be re-established.
    async fn next_payload(&mut self) -> Result<String, Error>;
}

/// PostgreSQL `LISTEN` over a dedicated connection.
#[derive(Clone)]
pub struct PgConnector {
    database_url: String,
}

impl PgConnector {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }
}

#[async_trait]
impl NotificationConnector for PgConnector {
    type Stream = PgNotificationStream;

    async fn connect(&self, channel: &str) -> Result<Self::Stream, Error> {
        let mut listener = PgListener::connect(&self.database_url)
            .await
            .map_err(Error::connect)?;
        listener.listen(channel).await.map_err(Error::connect)?;

        Ok(PgNotificationStream { listener })
    }
}

pub struct PgNotificationStream {
    listener: PgListener,
}

#[async_trait]
impl NotificationStream for PgNotificationStream {
    async fn next_payload(&mut self) -> Result<String, Error> {
        // `try_recv` reports a dropped connection as `Ok(None)` instead of
        // silently reconnecting, so the backoff policy stays in charge.
        match self.listener.try_recv().await {
            Ok(Some(notification)) => Ok(notification.payload().to_owned()),
            Ok(None) => Err(Error::with_reason(
                RelayErrorKind::Transport,
                "connection to the notification channel was lost",
            )),
            Err(e) => Err(Error::transport(e)),
        }
    }
}

/// Long-lived subscription to one notification channel.
pub struct EventSource<C: NotificationConnector> {
    connector: C,
    channel: String,
    backoff: Backoff,
    connect_timeout: Duration,
    shutdown: CancellationToken,
}

impl<C: NotificationConnector> EventSource<C> {
    pub fn new(connector: C, settings: &RelaySettings, shutdown: CancellationToken) -> Self {
        Self {
            connector,
            channel: settings.channel.clone(),
            backoff: settings.backoff.clone(),
            connect_timeout: settings.connect_timeout,
            shutdown,
        }
    }

    /// Open the subscription and return the stream of events it delivers.
    ///
    /// Fails with a `Connect` error if the first connection cannot be
    /// established within the connect timeout. After that the stream never
    /// yields errors; it ends only on shutdown or when the backoff policy
    /// gives up.
    pub async fn subscribe(self) -> Result<impl Stream<Item = Event> + Send, Error> {
        let upstream = self.connect_once().await?;
        info!("Listening for notifications on channel {}", self.channel);

        Ok(self.into_stream(upstream))
    }

    async fn connect_once(&self) -> Result<C::Stream, Error> {
        match tokio::time::timeout(self.connect_timeout, self.connector.connect(&self.channel))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::with_reason(
                RelayErrorKind::Connect,
                format!(
                    "timed out after {:?} connecting to channel {}",
                    self.connect_timeout, self.channel
                ),
            )),
        }
    }

    /// Re-establish the subscription, or `None` on shutdown or when the
    /// policy runs out of attempts.
    async fn reconnect(&self) -> Option<C::Stream> {
        let mut attempt = 0;
        loop {
            let Some(delay) = self.backoff.delay_for(attempt) else {
                error!(
                    "Giving up on notification channel {} after {} reconnect attempt(s)",
                    self.channel, attempt
                );
                return None;
            };

            debug!(
                "Reconnecting to notification channel {} in {:?} (attempt {})",
                self.channel,
                delay,
                attempt + 1
            );
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return None,
                _ = tokio::time::sleep(delay) => {}
            }

            let result = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return None,
                result = self.connect_once() => result,
            };

            match result {
                Ok(upstream) => {
                    info!(
                        "Re-established notification channel {} after {} attempt(s)",
                        self.channel,
                        attempt + 1
                    );
                    return Some(upstream);
                }
                Err(e) => warn!("Reconnect to notification channel {} failed: {e}", self.channel),
            }
            attempt += 1;
        }
    }

    fn into_stream(self, upstream: C::Stream) -> impl Stream<Item = Event> + Send {
        stream! {
            let mut upstream = upstream;
            loop {
                let next = tokio::select! {
                    biased;
                    _ = self.shutdown.cancelled() => break,
                    next = upstream.next_payload() => next,
                };

                match next {
                    Ok(payload) => {
                        trace!("Notification on {}: {payload}", self.channel);
                        yield Event::from(payload);
                    }
                    Err(e) => {
                        warn!("Lost notification channel {}: {e}", self.channel);
                        match self.reconnect().await {
                            Some(reconnected) => upstream = reconnected,
                            None => break,
                        }
                    }
                }
            }
            info!("Stopped listening on notification channel {}", self.channel);
        }
    }
}

/// Drive `events` into `publisher` until the stream ends.
pub async fn forward<S>(events: S, publisher: EventPublisher)
where
    S: Stream<Item = Event>,
{
    tokio::pin!(events);
    while let Some(event) = events.next().await {
        publisher.publish(event).await;
    }
    debug!("Relay forwarding loop finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::Hub;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;

    type Script = Arc<Mutex<VecDeque<Result<ScriptedStream, ()>>>>;

    /// Hands out pre-built streams in order; an empty script refuses to connect.
    struct ScriptedConnector {
        script: Script,
        connects: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl NotificationConnector for ScriptedConnector {
        type Stream = ScriptedStream;

        async fn connect(&self, _channel: &str) -> Result<Self::Stream, Error> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Ok(stream)) => Ok(stream),
                _ => Err(Error::with_reason(RelayErrorKind::Connect, "refused")),
            }
        }
    }

    /// `Err(())` simulates the transport dropping.
    struct ScriptedStream {
        rx: mpsc::UnboundedReceiver<Result<String, ()>>,
    }

    #[async_trait]
    impl NotificationStream for ScriptedStream {
        async fn next_payload(&mut self) -> Result<String, Error> {
            match self.rx.recv().await {
                Some(Ok(payload)) => Ok(payload),
                _ => Err(Error::with_reason(RelayErrorKind::Transport, "dropped")),
            }
        }
    }

    /// Never completes a connection.
    struct HangingConnector;

    #[async_trait]
    impl NotificationConnector for HangingConnector {
        type Stream = ScriptedStream;

        async fn connect(&self, _channel: &str) -> Result<Self::Stream, Error> {
            futures::future::pending().await
        }
    }

    fn scripted_stream() -> (ScriptedStream, mpsc::UnboundedSender<Result<String, ()>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ScriptedStream { rx }, tx)
    }

    fn connector(
        script: Vec<Result<ScriptedStream, ()>>,
    ) -> (ScriptedConnector, Arc<AtomicUsize>) {
        let connects = Arc::new(AtomicUsize::new(0));
        (
            ScriptedConnector {
                script: Arc::new(Mutex::new(script.into())),
                connects: Arc::clone(&connects),
            },
            connects,
        )
    }

    fn settings(max_attempts: Option<u32>) -> RelaySettings {
        RelaySettings {
            backoff: Backoff::new(Duration::from_secs(1), Duration::from_secs(8))
                .with_max_attempts(max_attempts),
            ..RelaySettings::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn yields_payloads_in_delivery_order() {
        let (upstream, tx) = scripted_stream();
        let (connector, _) = connector(vec![Ok(upstream)]);
        let source = EventSource::new(connector, &settings(None), CancellationToken::new());
        let events = source.subscribe().await.unwrap();
        tokio::pin!(events);

        tx.send(Ok("E1".to_string())).unwrap();
        tx.send(Ok("E2".to_string())).unwrap();
        tx.send(Ok("E1".to_string())).unwrap();

        assert_eq!(events.next().await.unwrap().as_str(), "E1");
        assert_eq!(events.next().await.unwrap().as_str(), "E2");
        // No deduplication.
        assert_eq!(events.next().await.unwrap().as_str(), "E1");
    }

    #[tokio::test(start_paused = true)]
    async fn resumes_after_transport_drop() {
        let (first, first_tx) = scripted_stream();
        let (second, second_tx) = scripted_stream();
        let (connector, connects) = connector(vec![Ok(first), Err(()), Ok(second)]);
        let source = EventSource::new(connector, &settings(None), CancellationToken::new());
        let events = source.subscribe().await.unwrap();
        tokio::pin!(events);

        first_tx.send(Ok("before".to_string())).unwrap();
        assert_eq!(events.next().await.unwrap().as_str(), "before");

        // The transport drops; anything after that on the old link is lost.
        first_tx.send(Err(())).unwrap();
        first_tx.send(Ok("lost".to_string())).unwrap();
        second_tx.send(Ok("after".to_string())).unwrap();

        assert_eq!(events.next().await.unwrap().as_str(), "after");
        // Initial connect, one refused reconnect, one successful reconnect.
        assert_eq!(connects.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn initial_connect_failure_is_surfaced() {
        let (connector, connects) = connector(vec![Err(())]);
        let source = EventSource::new(connector, &settings(None), CancellationToken::new());

        let err = source.subscribe().await.err().unwrap();

        assert!(err.is_connect());
        assert_eq!(connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn initial_connect_times_out() {
        let source = EventSource::new(HangingConnector, &settings(None), CancellationToken::new());

        let err = source.subscribe().await.err().unwrap();

        assert_eq!(err.error_kind, RelayErrorKind::Connect);
    }

    #[tokio::test(start_paused = true)]
    async fn stream_ends_when_backoff_gives_up() {
        let (upstream, tx) = scripted_stream();
        let (connector, connects) = connector(vec![Ok(upstream)]);
        let source = EventSource::new(connector, &settings(Some(2)), CancellationToken::new());
        let events = source.subscribe().await.unwrap();
        tokio::pin!(events);

        tx.send(Err(())).unwrap();

        assert!(events.next().await.is_none());
        assert_eq!(connects.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_an_in_flight_reconnect() {
        let (upstream, tx) = scripted_stream();
        let (connector, _) = connector(vec![Ok(upstream)]);
        let shutdown = CancellationToken::new();
        let source = EventSource::new(connector, &settings(None), shutdown.clone());
        let events = source.subscribe().await.unwrap();

        tx.send(Err(())).unwrap();
        let consumer = tokio::spawn(async move {
            tokio::pin!(events);
            events.next().await
        });

        // Let the consumer enter the backoff loop, then shut down.
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        shutdown.cancel();

        assert!(consumer.await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn client_leaving_mid_reconnect_only_lowers_the_count() {
        let (upstream, tx) = scripted_stream();
        let (connector, _) = connector(vec![Ok(upstream)]);
        let shutdown = CancellationToken::new();
        let hub = Arc::new(Hub::new(4));
        let staying = hub.subscribe(&shutdown);
        let leaving = hub.subscribe(&shutdown);

        let source = EventSource::new(connector, &settings(None), shutdown.clone());
        let events = source.subscribe().await.unwrap();
        let publisher = EventPublisher::new().with_handler(hub.clone());
        let pump = tokio::spawn(forward(events, publisher));

        tx.send(Err(())).unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!pump.is_finished());

        drop(leaving);

        assert_eq!(hub.subscriber_count(), 1);
        assert!(hub.registry().contains(&staying.id));
        shutdown.cancel();
        pump.await.unwrap();
    }
}
