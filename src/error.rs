use serde::{Deserialize, Serialize};
use thiserror::Error;
use wasm_bindgen::JsValue;

/// Wire-level failure taxonomy carried in a `DeliveryResult`.
///
/// Every failure inside the engine or the relay is recovered at the
/// component that detected it and reported as exactly one of these kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ComposerNotFound,
    InjectionFailed,
    ActivationTimeout,
    ChannelUnavailable,
    UnsupportedPlatform,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ComposerNotFound => "ComposerNotFound",
            ErrorKind::InjectionFailed => "InjectionFailed",
            ErrorKind::ActivationTimeout => "ActivationTimeout",
            ErrorKind::ChannelUnavailable => "ChannelUnavailable",
            ErrorKind::UnsupportedPlatform => "UnsupportedPlatform",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures raised while talking to the live DOM.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomError {
    #[error("ElementNotFound: No element found for selector '{selector}'")]
    ElementNotFound { selector: String },
    #[error("InvalidSelector: Invalid selector '{selector}'. Details: {error}")]
    InvalidSelector { selector: String, error: String },
    #[error("ElementTypeError: Element is not of expected type '{expected_type}'")]
    ElementTypeError { expected_type: String },
    #[error("JsError: {message}")]
    JsError { message: String },
}

impl From<JsValue> for DomError {
    fn from(value: JsValue) -> Self {
        DomError::JsError {
            message: value.as_string().unwrap_or_else(|| format!("{:?}", value)),
        }
    }
}

impl From<DomError> for JsValue {
    fn from(err: DomError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

/// Failures in the background relay: tab management and the message channel.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RelayError {
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),
    #[error("Tab operation failed: {0}")]
    TabFailed(String),
    #[error("Channel unavailable: {0}")]
    ChannelUnavailable(String),
    #[error("Malformed message: {0}")]
    Malformed(String),
}

impl RelayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::UnsupportedPlatform(_) => ErrorKind::UnsupportedPlatform,
            // A tab we could not open or address is indistinguishable from a
            // page context that never answered.
            RelayError::TabFailed(_)
            | RelayError::ChannelUnavailable(_)
            | RelayError::Malformed(_) => ErrorKind::ChannelUnavailable,
        }
    }
}

impl From<RelayError> for JsValue {
    fn from(err: RelayError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Invalid descriptor '{key}': {reason}")]
    InvalidDescriptor { key: String, reason: String },
}

impl From<ConfigError> for JsValue {
    fn from(err: ConfigError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}
