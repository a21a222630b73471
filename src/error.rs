use thiserror::Error;

/// Result type for plugin operations
pub type Result<T> = std::result::Result<T, DeckError>;

/// Errors that can occur while talking to the Stream Deck host or a Sonos player
#[derive(Error, Debug)]
pub enum DeckError {
    /// WebSocket connection error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Connection to the host was closed or never opened
    #[error("Connection closed")]
    ConnectionClosed,

    /// No matching reply arrived before the deadline
    #[error("Timed out waiting for {event}")]
    Timeout {
        /// Reply event that was awaited
        event: String,
    },

    /// HTTP request to the player failed before a response arrived
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Player answered with a non-success status
    #[error("Transport error (HTTP {status}): {body}")]
    Transport {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// Malformed XML in a player reply
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// A device call was attempted before host and port were configured
    #[error("Not connected to sonos")]
    NotConnected,

    /// User supplied content the player cannot use
    #[error("Invalid content: {0}")]
    ContentValidation(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or unexpected response
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl DeckError {
    /// Whether the error came from the player link rather than from user input
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            DeckError::Http(_)
                | DeckError::Transport { .. }
                | DeckError::Xml(_)
                | DeckError::InvalidResponse(_)
                | DeckError::NotConnected
        )
    }
}
