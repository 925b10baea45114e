//! WebSocket Transport
//!
//! `Transport` adapter over `tokio-tungstenite`. Each `connect` spawns one
//! socket task that reports lifecycle and inbound text frames on the event
//! channel and drains an unbounded outbound queue, so `send` never blocks
//! the caller.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{Transport, TransportError, TransportEvent, TransportHandle};

/// WebSocket transport to the exchange stream endpoint.
#[derive(Debug, Clone)]
pub struct WsTransport {
    url: String,
}

impl WsTransport {
    /// Create a transport connecting to `url`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Transport for WsTransport {
    fn connect(&self, events: mpsc::Sender<TransportEvent>) -> Box<dyn TransportHandle> {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        tokio::spawn(run_socket(
            self.url.clone(),
            events,
            outbound_rx,
            cancel.clone(),
        ));

        Box::new(WsHandle {
            outbound: outbound_tx,
            cancel,
        })
    }
}

/// Outbound side of one WebSocket session.
#[derive(Debug)]
struct WsHandle {
    outbound: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
}

impl TransportHandle for WsHandle {
    fn send(&self, frame: String) -> Result<(), TransportError> {
        if self.cancel.is_cancelled() {
            return Err(TransportError::Closed);
        }
        self.outbound
            .send(frame)
            .map_err(|_| TransportError::Closed)
    }

    fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for WsHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Run one session until the socket ends or the handle closes it.
async fn run_socket(
    url: String,
    events: mpsc::Sender<TransportEvent>,
    mut outbound: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
) {
    let connected = tokio::select! {
        () = cancel.cancelled() => return,
        result = tokio_tungstenite::connect_async(url.as_str()) => result,
    };

    let ws_stream = match connected {
        Ok((ws_stream, _response)) => ws_stream,
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "WebSocket connect failed");
            let _ = events.send(TransportEvent::Errored(e.to_string())).await;
            return;
        }
    };

    let (mut write, mut read) = ws_stream.split();
    if events.send(TransportEvent::Opened).await.is_err() {
        return;
    }

    let end = loop {
        tokio::select! {
            () = cancel.cancelled() => {
                // Drain frames queued before the close, such as final unsubscribes.
                while let Ok(frame) = outbound.try_recv() {
                    if write.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                let _ = write.send(Message::Close(None)).await;
                tracing::debug!("WebSocket closed by client");
                return;
            }
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    let _ = write.send(Message::Close(None)).await;
                    return;
                };
                if let Err(e) = write.send(Message::Text(frame.into())).await {
                    break TransportEvent::Errored(e.to_string());
                }
            }
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if events.send(TransportEvent::Message(text.as_str().to_owned())).await.is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = write.send(Message::Pong(data)).await {
                            break TransportEvent::Errored(e.to_string());
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame.map_or_else(
                            || "no close frame".to_string(),
                            |f| format!("{} {}", u16::from(f.code), f.reason.as_str()),
                        );
                        tracing::info!(reason = %reason, "Server sent close frame");
                        break TransportEvent::Closed { reason };
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break TransportEvent::Errored(e.to_string()),
                    None => {
                        break TransportEvent::Closed {
                            reason: "stream ended".to_string(),
                        };
                    }
                }
            }
        }
    };

    let _ = events.send(end).await;
}
