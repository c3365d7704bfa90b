//! Blocking client for the machinist HTTP API.
//!
//! Wraps a `ureq` agent configured to hand back non-2xx responses instead of
//! turning them into transport errors, so validation messages in a 400 body
//! reach the caller intact through [`ClientError::Status`].

pub mod http;

pub use http::{MachineClient, RawResponse};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("HTTP {code}: {body}")]
    Status { code: u16, body: String },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// HTTP status carried by the error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::NotFound(_) => Some(404),
            ClientError::Status { code, .. } => Some(*code),
            ClientError::Http(_) | ClientError::Serialization(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub url: String,
}

impl ClientConfig {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_owned(),
        }
    }
}
