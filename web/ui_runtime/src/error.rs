use thiserror::Error;

use crate::connection::ConnectionState;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("element marked `{marker}` has neither an id nor a name; not bound")]
    MissingIdentifier { marker: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallbackError {
    #[error("no callback registered as `{0}`")]
    NoSuchCallback(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("{0} is unavailable")]
    Unavailable(&'static str),
    #[error("socket error: {0}")]
    Socket(String),
    #[error("property `{name}` could not be set: {detail}")]
    Property { name: String, detail: String },
}

#[derive(Debug, Error)]
pub enum SendError {
    #[error("connection is {0}; event not sent")]
    Inert(ConnectionState),
    #[error("event could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Host(#[from] HostError),
}
