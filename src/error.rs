//! # Error Types
//!
//! Structured error handling for the client using thiserror. The taxonomy
//! mirrors how failures surface: configuration problems are returned to the
//! caller synchronously, everything that happens inside the poll loop is
//! recovered and logged, never propagated.

use thiserror::Error;

/// Errors surfaced to direct callers of the client API.
///
/// These are programmer errors, fatal to the call that triggered them and to
/// nothing else. The poll loop never raises them.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("invalid subscription: {reason}")]
    InvalidSubscription { reason: String },

    #[error("topic '{topic_name}' already has an active subscription")]
    DuplicateTopic { topic_name: String },

    #[error("subscription for topic '{topic_name}' is already registered with another poller")]
    AlreadyRegistered { topic_name: String },

    #[error("invalid client configuration: {reason}")]
    Configuration { reason: String },
}

/// Errors raised at the remote engine boundary.
///
/// The poll loop treats any of these from `fetch_and_lock` as an empty cycle
/// result. Handlers see them unchanged when task service operations fail.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("connection lost: {message}")]
    ConnectionLost { message: String },

    #[error("engine rejected request: {operation}: {message}")]
    BadRequest { operation: String, message: String },

    #[error("resource not found: {operation}: {message}")]
    NotFound { operation: String, message: String },

    #[error("engine-side failure: {operation}: {message}")]
    Engine { operation: String, message: String },

    #[error("unexpected engine response: {operation}: status {status}")]
    UnknownResponse { operation: String, status: u16 },
}

/// Errors raised while mapping wire variables to typed values.
///
/// Consumed per work item: a mapping failure skips that item's handler and
/// leaves the rest of the cycle untouched.
#[derive(Error, Debug)]
pub enum VariableError {
    #[error("variable '{name}' has unsupported type '{type_name}'")]
    UnsupportedType { name: String, type_name: String },

    #[error("variable '{name}' of type '{type_name}' carries an incompatible value: {reason}")]
    ValueMismatch {
        name: String,
        type_name: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_topic_message_names_the_topic() {
        let err = ClientError::DuplicateTopic {
            topic_name: "invoice".to_string(),
        };
        assert!(err.to_string().contains("invoice"));
    }

    #[test]
    fn variable_error_names_the_variable() {
        let err = VariableError::UnsupportedType {
            name: "amount".to_string(),
            type_name: "Money".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("amount"));
        assert!(rendered.contains("Money"));
    }
}
