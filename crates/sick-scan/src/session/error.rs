//! Device session errors

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SessionError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Not connected")]
    NotConnected,

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Device answered a command with an error reply
    #[error("Device rejected '{command}': {reply}")]
    DeviceRejected { command: String, reply: String },

    /// Session task is gone or not accepting commands
    #[error("Session unavailable")]
    Unavailable,
}
