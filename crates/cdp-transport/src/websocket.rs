//! WebSocket implementation of [`Transport`].
//!
//! One writer task owns the sink and drains an mpsc queue; one reader task
//! owns the stream, completes pending commands and forwards events. When the
//! stream ends the reader cancels everything in flight and sends
//! [`ChannelEvent::Closed`].
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{timeout, Duration};
use tokio_tungstenite::tungstenite::Message;

use crate::channel::{ChannelEvent, EventReceiver, Transport};
use crate::dispatcher::{DispatchResult, Dispatcher};
use crate::error::TransportError;
use crate::message::{next_message_id, parse_message, serialize_command};

/// Default timeout for a single command (seconds).
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// A CDP channel over a WebSocket connection.
pub struct WsTransport {
    url: String,
    dispatcher: Arc<Mutex<Dispatcher>>,
    writer_tx: mpsc::Sender<Message>,
    closed: Arc<AtomicBool>,
    request_timeout_secs: u64,
}

impl WsTransport {
    /// Connect to `url` (a `webSocketDebuggerUrl`) and start the I/O tasks.
    pub async fn connect(url: &str) -> Result<(Self, EventReceiver), TransportError> {
        let (socket, _response) =
            tokio_tungstenite::connect_async(url)
                .await
                .map_err(|e| TransportError::Connect {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
        tracing::info!("connected to {}", url);

        let (mut sink, mut stream) = socket.split();

        let (writer_tx, mut writer_rx) = mpsc::channel::<Message>(64);
        tokio::spawn(async move {
            while let Some(msg) = writer_rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if sink.send(msg).await.is_err() || closing {
                    break;
                }
            }
        });

        let dispatcher = Arc::new(Mutex::new(Dispatcher::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let reader_dispatcher = dispatcher.clone();
        let reader_closed = closed.clone();
        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                        Ok(text) => text,
                        Err(_) => continue,
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::warn!("websocket read failed: {}", e);
                        break;
                    }
                };

                let message = match parse_message(&text) {
                    Ok(m) => m,
                    Err(e) => {
                        tracing::warn!("dropping malformed message: {}", e);
                        continue;
                    }
                };

                let event = reader_dispatcher.lock().await.dispatch(message);
                if let Some(event) = event {
                    let _ = events_tx.send(event);
                }
            }

            {
                let mut disp = reader_dispatcher.lock().await;
                reader_closed.store(true, Ordering::SeqCst);
                disp.cancel_all();
            }
            tracing::info!("channel closed");
            let _ = events_tx.send(ChannelEvent::Closed);
        });

        Ok((
            Self {
                url: url.to_string(),
                dispatcher,
                writer_tx,
                closed,
                request_timeout_secs: REQUEST_TIMEOUT_SECS,
            },
            events_rx,
        ))
    }

    /// Override the per-command timeout.
    pub fn with_request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// The address this channel is connected to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether the channel has closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn call(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        let id = next_message_id();
        let rx = {
            let mut disp = self.dispatcher.lock().await;
            if self.closed.load(Ordering::SeqCst) {
                return Err(TransportError::Closed);
            }
            disp.register_request(id)
        };

        tracing::debug!("--> {} #{}", method, id);
        let text = serialize_command(id, method, params);
        if self.writer_tx.send(Message::Text(text)).await.is_err() {
            self.dispatcher.lock().await.cancel(id);
            return Err(TransportError::Closed);
        }

        let outcome = match timeout(Duration::from_secs(self.request_timeout_secs), rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => return Err(TransportError::Closed),
            Err(_) => {
                self.dispatcher.lock().await.cancel(id);
                return Err(TransportError::Timeout {
                    method: method.to_string(),
                    secs: self.request_timeout_secs,
                });
            }
        };

        match outcome {
            DispatchResult::Success(value) => {
                tracing::debug!("<-- {} #{}", method, id);
                Ok(value)
            }
            DispatchResult::Error(err) => {
                tracing::debug!("<-- {} #{} error {}", method, id, err.code);
                Err(TransportError::Protocol {
                    code: err.code,
                    message: err.message,
                })
            }
        }
    }

    async fn close(&self) {
        let _ = self.writer_tx.send(Message::Close(None)).await;
    }
}
