use thiserror::Error;

/// Errors raised while decoding an inbound notification payload.
#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("invalid notification payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("notification payload is not a JSON object")]
    NotAnObject,

    #[error("missing required key: {0}")]
    MissingField(&'static str),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("handler registry is empty")]
    Empty,

    #[error("invalid handler slug: {0:?}")]
    InvalidSlug(String),

    #[error("duplicate handler slug: {0}")]
    DuplicateSlug(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),
}
