use crate::error::{DeckError, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Low-level WebSocket connection to the Stream Deck application
///
/// Outgoing frames go through an unbounded channel drained by a writer task;
/// incoming text frames are handed to the callback given to [`Connection::connect`].
pub struct Connection {
    /// Channel for sending outgoing messages
    ws_tx: mpsc::UnboundedSender<Message>,
    /// Flips to `true` once the socket is gone
    closed_rx: watch::Receiver<bool>,
    reader: Option<JoinHandle<()>>,
}

impl Connection {
    /// Connect to a WebSocket URL and forward every text frame to `on_text`
    pub async fn connect<F>(url: impl Into<String>, on_text: F) -> Result<Self>
    where
        F: Fn(String) + Send + 'static,
    {
        let url = url.into();
        tracing::info!("Connecting to {}", url);

        let (ws_stream, _) = connect_async(&url).await?;
        let (mut write, mut read) = ws_stream.split();

        let (ws_tx, mut ws_rx) = mpsc::unbounded_channel::<Message>();
        let (closed_tx, closed_rx) = watch::channel(false);

        // Spawn task to forward outgoing messages to WebSocket
        let write_handle = tokio::spawn(async move {
            while let Some(msg) = ws_rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if let Err(e) = write.send(msg).await {
                    tracing::error!("Failed to send message: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        // Spawn task to receive and process incoming messages
        let reader = tokio::spawn(async move {
            while let Some(msg_result) = read.next().await {
                match msg_result {
                    Ok(Message::Text(text)) => on_text(text),
                    Ok(Message::Close(frame)) => {
                        tracing::info!("WebSocket connection closed: {:?}", frame);
                        break;
                    }
                    Err(e) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }

            let _ = closed_tx.send(true);
            write_handle.abort();
        });

        Ok(Self {
            ws_tx,
            closed_rx,
            reader: Some(reader),
        })
    }

    /// Connection backed by a plain channel, used to observe outgoing frames in tests
    #[cfg(test)]
    pub(crate) fn detached(ws_tx: mpsc::UnboundedSender<Message>) -> Self {
        let (_closed_tx, closed_rx) = watch::channel(false);
        Self {
            ws_tx,
            closed_rx,
            reader: None,
        }
    }

    /// Queue a text frame for sending
    pub fn send_text(&self, text: String) -> Result<()> {
        tracing::debug!("Sending: {}", text);
        self.ws_tx
            .send(Message::Text(text))
            .map_err(|_| DeckError::ConnectionClosed)
    }

    /// Whether the socket has gone away
    pub fn is_closed(&self) -> bool {
        *self.closed_rx.borrow() || self.ws_tx.is_closed()
    }

    /// Receiver that flips to `true` when the socket closes
    pub fn closed(&self) -> watch::Receiver<bool> {
        self.closed_rx.clone()
    }

    /// Send a close frame and stop reading; safe to call more than once
    pub fn close(&mut self) {
        let _ = self.ws_tx.send(Message::Close(None));
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}
