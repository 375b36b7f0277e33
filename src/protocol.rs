//! Messages exchanged between the background relay and page engines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wasm_bindgen::JsValue;

use crate::error::{ErrorKind, RelayError};
use crate::platform::PlatformDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    /// Write text into the composer without sending.
    Input,
    /// Activate the send control only.
    Send,
    InputAndSend,
    GetReply,
    Status,
    /// Replace descriptors used by subsequent locate/await calls.
    ConfigUpdate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CommandMode {
    InputOnly,
    InputAndSend,
}

impl CommandMode {
    pub fn action(self) -> Action {
        match self {
            CommandMode::InputOnly => Action::Input,
            CommandMode::InputAndSend => Action::InputAndSend,
        }
    }

    /// Accepts the wire names plus the short forms used by callers.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "inputOnly" | "input" | "InputOnly" => Some(CommandMode::InputOnly),
            "inputAndSend" | "send" | "InputAndSend" => Some(CommandMode::InputAndSend),
            _ => None,
        }
    }
}

/// One request for one platform, created by the relay and consumed once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    pub id: Uuid,
    pub platform_key: String,
    pub text: String,
    pub mode: CommandMode,
    pub created_at: DateTime<Utc>,
}

impl Command {
    pub fn new(platform_key: impl Into<String>, text: impl Into<String>, mode: CommandMode) -> Self {
        Command {
            id: Uuid::new_v4(),
            platform_key: platform_key.into(),
            text: text.into(),
            mode,
            created_at: Utc::now(),
        }
    }

    pub fn to_request(&self) -> Request {
        Request {
            action: self.mode.action(),
            command_id: Some(self.id),
            text: Some(self.text.clone()),
            descriptors: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descriptors: Option<Vec<PlatformDescriptor>>,
}

impl Request {
    pub fn new(action: Action) -> Self {
        Request { action, command_id: None, text: None, descriptors: None }
    }

    pub fn config_update(descriptors: Vec<PlatformDescriptor>) -> Self {
        Request { descriptors: Some(descriptors), ..Request::new(Action::ConfigUpdate) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub success: bool,
    pub platform_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready: Option<bool>,
}

impl Response {
    pub fn ok(platform_key: impl Into<String>, command_id: Option<Uuid>) -> Self {
        Response {
            success: true,
            platform_key: platform_key.into(),
            command_id,
            reply: None,
            error_kind: None,
            ready: None,
        }
    }

    pub fn failed(platform_key: impl Into<String>, command_id: Option<Uuid>, kind: ErrorKind) -> Self {
        Response { success: false, error_kind: Some(kind), ..Response::ok(platform_key, command_id) }
    }
}

/// Outcome of one `Command`, returned to whoever asked the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryResult {
    pub command_id: Uuid,
    pub platform_key: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl DeliveryResult {
    /// Builds the result for `command` from the page's response. The
    /// command id always comes from the command itself.
    pub fn from_response(command: &Command, response: Response) -> Self {
        DeliveryResult {
            command_id: command.id,
            platform_key: command.platform_key.clone(),
            success: response.success,
            reply_text: response.reply,
            error_kind: if response.success { None } else { response.error_kind.or(Some(ErrorKind::InjectionFailed)) },
        }
    }

    pub fn failure(command: &Command, kind: ErrorKind) -> Self {
        DeliveryResult {
            command_id: command.id,
            platform_key: command.platform_key.clone(),
            success: false,
            reply_text: None,
            error_kind: Some(kind),
        }
    }
}

/// Serializes through JSON so the value crosses `chrome.runtime` as a plain object.
pub fn to_js<T: Serialize>(value: &T) -> Result<JsValue, RelayError> {
    let json = serde_json::to_string(value).map_err(|e| RelayError::Malformed(e.to_string()))?;
    js_sys::JSON::parse(&json).map_err(|e| RelayError::Malformed(format!("{:?}", e)))
}

pub fn from_js<T: for<'de> Deserialize<'de>>(value: &JsValue) -> Result<T, RelayError> {
    if value.is_undefined() || value.is_null() {
        return Err(RelayError::ChannelUnavailable("empty message".to_string()));
    }
    let json: String = js_sys::JSON::stringify(value)
        .map_err(|e| RelayError::Malformed(format!("{:?}", e)))?
        .into();
    serde_json::from_str(&json).map_err(|e| RelayError::Malformed(e.to_string()))
}
