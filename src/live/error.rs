#![expect(
    clippy::module_name_repetitions,
    reason = "Error types include the module name to indicate their scope"
)]

use std::error::Error as StdError;
use std::fmt;

use crate::error::Kind;

/// Live-connection error variants.
#[non_exhaustive]
#[derive(Debug)]
pub enum LiveError {
    /// Error opening or communicating over the WebSocket transport
    Connection(tokio_tungstenite::tungstenite::Error),
    /// The transport closed while the connection was expected to stay open
    ConnectionClosed,
    /// No access credential was available at connect time
    MissingCredential,
    /// Reconnect attempts hit the configured cap
    RetriesExhausted {
        /// Number of consecutive failed attempts
        attempts: u32,
    },
    /// An inbound frame could not be parsed as a live-update envelope
    MalformedFrame(serde_json::Error),
    /// A channel control frame could not be sent
    SubscriptionFailed(String),
}

impl fmt::Display for LiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(e) => write!(f, "live connection error: {e}"),
            Self::ConnectionClosed => write!(f, "live connection closed"),
            Self::MissingCredential => write!(f, "no access credential available"),
            Self::RetriesExhausted { attempts } => {
                write!(f, "gave up reconnecting after {attempts} failed attempts")
            }
            Self::MalformedFrame(e) => write!(f, "malformed live frame: {e}"),
            Self::SubscriptionFailed(reason) => write!(f, "subscription failed: {reason}"),
        }
    }
}

impl StdError for LiveError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Connection(e) => Some(e),
            Self::MalformedFrame(e) => Some(e),
            _ => None,
        }
    }
}

// Integration with main Error type
impl From<LiveError> for crate::error::Error {
    fn from(e: LiveError) -> Self {
        let kind = match e {
            LiveError::MissingCredential => Kind::Auth,
            _ => Kind::WebSocket,
        };
        crate::error::Error::with_source(kind, e)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for crate::error::Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        crate::error::Error::with_source(Kind::WebSocket, LiveError::Connection(e))
    }
}
