use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use log::*;
use relay::error::{Error as RelayError, RelayErrorKind};
use relay::session::SessionState;
use relay::ClientSession;
use service::AppState;
use std::sync::Arc;

/// GET upgrade to a WebSocket that streams every new sale as it is recorded
#[utoipa::path(
    get,
    path = "/ws/sales",
    responses(
        (status = 101, description = "Switched to the WebSocket protocol; one JSON change notification per text frame"),
        (status = 400, description = "Malformed WebSocket handshake"),
        (status = 426, description = "Request did not ask for a WebSocket upgrade")
    )
)]
pub(crate) async fn relay_handler(
    State(app_state): State<AppState>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let ws = match upgrade {
        Ok(ws) => ws,
        Err(rejection) => {
            let status = rejection_status(&rejection);
            let err = RelayError::with_reason(RelayErrorKind::ProtocolUpgrade, rejection.body_text());
            warn!("Relay request rejected ({status}): {err}");
            debug!("Relay request: {:?} -> {:?}", SessionState::Received, SessionState::Closed);
            return (status, rejection.body_text()).into_response();
        }
    };
    debug!("Relay request: {:?} -> {:?}", SessionState::Received, SessionState::Upgrading);

    let hub = Arc::clone(&app_state.relay_hub);
    let shutdown = app_state.shutdown.clone();
    let ping_interval = app_state.config.relay_settings().ping_interval;

    ws.on_failed_upgrade(|e| {
        warn!("Relay upgrade failed: {e}");
        debug!("Relay request: {:?} -> {:?}", SessionState::Upgrading, SessionState::Closed);
    })
    .on_upgrade(move |socket| async move {
        let (sink, stream) = socket.split();
        let session = ClientSession::new(hub.subscribe(&shutdown), sink, stream, ping_interval);
        let outcome = session.run().await;
        debug!(
            "Relay session {} finished: {} ({} event(s) sent, {} still connected)",
            outcome.id,
            outcome.reason,
            outcome.events_sent,
            hub.subscriber_count()
        );
    })
}

/// A request that never asked to upgrade gets `426 Upgrade Required`; a
/// malformed handshake keeps axum's own status.
fn rejection_status(rejection: &WebSocketUpgradeRejection) -> StatusCode {
    match rejection {
        WebSocketUpgradeRejection::InvalidConnectionHeader(_)
        | WebSocketUpgradeRejection::InvalidUpgradeHeader(_) => StatusCode::UPGRADE_REQUIRED,
        other => other.status(),
    }
}

#[cfg(test)]
mod tests {
    use crate::{define_routes, test_support};
    use events::Event;
    use futures::StreamExt;
    use relay::Hub;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio_tungstenite::{connect_async, tungstenite::Message};
    use tokio_util::sync::CancellationToken;

    async fn serve() -> (SocketAddr, Arc<Hub>, CancellationToken) {
        let app_state = test_support::app_state();
        let hub = Arc::clone(&app_state.relay_hub);
        let shutdown = app_state.shutdown.clone();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server_shutdown = shutdown.clone();
        tokio::spawn(async move {
            axum::serve(listener, define_routes(app_state))
                .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
                .await
                .unwrap();
        });

        (addr, hub, shutdown)
    }

    async fn wait_for_subscribers(hub: &Hub, expected: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while hub.subscriber_count() != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| {
            panic!(
                "expected {expected} subscriber(s), found {}",
                hub.subscriber_count()
            )
        });
    }

    #[tokio::test]
    async fn upgraded_client_receives_events_as_discrete_text_frames() {
        let (addr, hub, shutdown) = serve().await;

        let (mut socket, response) = connect_async(format!("ws://{addr}/ws/sales"))
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 101);
        wait_for_subscribers(&hub, 1).await;

        let e1 = r#"{"operation":"INSERT","record":{"id":1,"product_id":2}}"#;
        let e2 = r#"{"operation":"INSERT","record":{"id":2,"product_id":3}}"#;
        hub.publish(&Event::from(e1));
        hub.publish(&Event::from(e2));

        let mut texts = Vec::new();
        while texts.len() < 2 {
            match socket.next().await {
                Some(Ok(Message::Text(text))) => texts.push(text.as_str().to_owned()),
                Some(Ok(_)) => continue,
                other => panic!("connection ended before both events arrived: {other:?}"),
            }
        }
        assert_eq!(texts, [e1, e2]);

        socket.close(None).await.unwrap();
        while let Some(Ok(_)) = socket.next().await {}
        wait_for_subscribers(&hub, 0).await;

        shutdown.cancel();
    }

    #[tokio::test]
    async fn shutdown_closes_upgraded_clients() {
        let (addr, hub, shutdown) = serve().await;

        let (mut socket, _) = connect_async(format!("ws://{addr}/ws/sales"))
            .await
            .unwrap();
        wait_for_subscribers(&hub, 1).await;

        shutdown.cancel();

        let closed = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match socket.next().await {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => continue,
                }
            }
        })
        .await;
        assert!(closed.is_ok(), "client was not closed on shutdown");
        wait_for_subscribers(&hub, 0).await;

        // Nothing published after teardown reaches anyone.
        assert_eq!(hub.publish(&Event::from("late")).enqueued, 0);
    }
}
