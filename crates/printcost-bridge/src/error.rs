//! # Bridge Error Types
//!
//! Error types for the host ⇄ embedded calculator protocol.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Bridge Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────────┐  ┌─────────────────────┐  │
//! │  │  Configuration  │  │   Protocol          │  │     Session         │  │
//! │  │                 │  │                     │  │                     │  │
//! │  │  InvalidConfig  │  │  Unauthorized       │  │  NotInitialized     │  │
//! │  │  InvalidUrl     │  │  MalformedFrame     │  │  SessionClosed      │  │
//! │  │  InvalidInit    │  │  UnexpectedMessage  │  │  ChannelClosed      │  │
//! │  └─────────────────┘  └─────────────────────┘  └─────────────────────┘  │
//! │                                                                         │
//! │  Protocol errors on the host side are logged and the frame dropped.     │
//! │  They never stop the host actor.                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use printcost_core::ErrorKind;
use thiserror::Error;

/// Result type alias for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Bridge error type.
#[derive(Debug, Error)]
pub enum BridgeError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid bridge configuration.
    #[error("Invalid bridge configuration: {0}")]
    InvalidConfig(String),

    /// apiBase is not an absolute URL with an allowed scheme.
    #[error("Invalid api base: {0}")]
    InvalidUrl(String),

    /// Initialization payload rejected.
    #[error("Invalid init payload: {0}")]
    InvalidInit(String),

    /// Failed to load config.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    // =========================================================================
    // Protocol Errors
    // =========================================================================
    /// Message token missing or not the one issued for this session.
    #[error("Unauthorized {message_type} message: session token mismatch")]
    Unauthorized { message_type: String },

    /// Frame is not a valid envelope or its payload does not fit its type.
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Message not valid in the current session state.
    #[error("Unexpected {message_type} message in state {state}")]
    UnexpectedMessage { message_type: String, state: String },

    /// Failed to serialize an outbound message.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    // =========================================================================
    // Session Errors
    // =========================================================================
    /// Embedded view tried to send before receiving INIT.
    #[error("Bridge session not initialized")]
    NotInitialized,

    /// Session already reached a terminal state.
    #[error("Bridge session already closed")]
    SessionClosed,

    /// The other side went away.
    #[error("Channel error: {0}")]
    ChannelClosed(String),
}

impl From<url::ParseError> for BridgeError {
    fn from(err: url::ParseError) -> Self {
        BridgeError::InvalidUrl(err.to_string())
    }
}

impl From<toml::de::Error> for BridgeError {
    fn from(err: toml::de::Error) -> Self {
        BridgeError::ConfigLoadFailed(err.to_string())
    }
}

impl BridgeError {
    /// Machine-readable kind, used when the error crosses to a caller.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::Unauthorized { .. } => ErrorKind::UnauthorizedMessage,
            _ => ErrorKind::InvalidInput,
        }
    }

    /// Returns true for errors the host handles by logging and dropping the frame.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            BridgeError::Unauthorized { .. }
                | BridgeError::MalformedFrame(_)
                | BridgeError::UnexpectedMessage { .. }
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            BridgeError::InvalidConfig(_)
                | BridgeError::InvalidUrl(_)
                | BridgeError::ConfigLoadFailed(_)
        )
    }
}
