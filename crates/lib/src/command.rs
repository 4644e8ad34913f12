//! Commands produced by the interpretation service and their typed payloads.
//!
//! The service answers with `{ "type", "data", "message" }` ([`RawCommand`]). `data` is kept
//! opaque until [`Command::decode`] turns the pair into one variant of the closed
//! [`Command`] enum; only `set_alarm` and `lamp_control` carry structured data.

use serde::{Deserialize, Deserializer, Serialize};

/// Wire shape returned by the interpretation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCommand {
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific payload, decoded lazily by the matching handler.
    #[serde(default)]
    pub data: serde_json::Value,
    /// Interpreter reply text, echoed back for conversational types.
    #[serde(default)]
    pub message: String,
}

impl RawCommand {
    /// Command the router reports as `unknown` without publishing anything.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self {
            kind: "unknown".to_string(),
            data: serde_json::Value::Null,
            message: message.into(),
        }
    }
}

/// Alarm parameters published to the `set_alarm` queue. All fields are free-form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmPayload {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub time: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub date: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub repeat: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub days: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub label: String,
}

/// What to do with a lamp. Unrecognised actions are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LampAction {
    TurnOn,
    TurnOff,
    SetColor,
    SetIntensity,
    Other(String),
}

impl LampAction {
    pub fn as_str(&self) -> &str {
        match self {
            LampAction::TurnOn => "turn_on",
            LampAction::TurnOff => "turn_off",
            LampAction::SetColor => "set_color",
            LampAction::SetIntensity => "set_intensity",
            LampAction::Other(s) => s,
        }
    }
}

impl From<String> for LampAction {
    fn from(s: String) -> Self {
        match s.as_str() {
            "turn_on" => LampAction::TurnOn,
            "turn_off" => LampAction::TurnOff,
            "set_color" => LampAction::SetColor,
            "set_intensity" => LampAction::SetIntensity,
            _ => LampAction::Other(s),
        }
    }
}

impl From<LampAction> for String {
    fn from(a: LampAction) -> Self {
        match a {
            LampAction::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for LampAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lamp parameters published to the `lamp_control` queue.
/// `color` and `intensity` are only meaningful for the matching action; empty values are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LampPayload {
    pub action: LampAction,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub room: String,
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub color: Option<String>,
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub intensity: Option<String>,
}

/// The interpreter emits optional strings; `null` and a missing key both mean "".
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.filter(|s| !s.is_empty()))
}

/// Structured payload did not match the shape expected for its type.
#[derive(Debug, thiserror::Error)]
#[error("decoding {kind} payload: {source}")]
pub struct DecodeError {
    pub kind: &'static str,
    #[source]
    pub source: serde_json::Error,
}

pub const SET_ALARM: &str = "set_alarm";
pub const CANCEL_ALARM: &str = "cancel_alarm";
pub const SET_REMINDER: &str = "set_reminder";
pub const CANCEL_REMINDER: &str = "cancel_reminder";
pub const LAMP_CONTROL: &str = "lamp_control";
pub const CONVERSATION: &str = "conversa";
pub const SEARCH: &str = "pesquisa";

/// Closed set of commands the router knows how to handle, each with its decoded payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetAlarm(AlarmPayload),
    CancelAlarm,
    SetReminder,
    CancelReminder,
    LampControl(LampPayload),
    Conversation,
    Search,
    Unknown { kind: String },
}

impl Command {
    /// Map a raw interpretation to a command, decoding the payload for types that carry one.
    pub fn decode(raw: &RawCommand) -> Result<Self, DecodeError> {
        let cmd = match raw.kind.as_str() {
            // null alarm data is an alarm with every field empty
            SET_ALARM if raw.data.is_null() => Command::SetAlarm(AlarmPayload::default()),
            SET_ALARM => Command::SetAlarm(decode_payload(SET_ALARM, &raw.data)?),
            CANCEL_ALARM => Command::CancelAlarm,
            SET_REMINDER => Command::SetReminder,
            CANCEL_REMINDER => Command::CancelReminder,
            LAMP_CONTROL => Command::LampControl(decode_payload(LAMP_CONTROL, &raw.data)?),
            CONVERSATION => Command::Conversation,
            SEARCH => Command::Search,
            other => Command::Unknown {
                kind: other.to_string(),
            },
        };
        Ok(cmd)
    }

    /// Type identifier as used on the wire.
    pub fn kind(&self) -> &str {
        match self {
            Command::SetAlarm(_) => SET_ALARM,
            Command::CancelAlarm => CANCEL_ALARM,
            Command::SetReminder => SET_REMINDER,
            Command::CancelReminder => CANCEL_REMINDER,
            Command::LampControl(_) => LAMP_CONTROL,
            Command::Conversation => CONVERSATION,
            Command::Search => SEARCH,
            Command::Unknown { kind } => kind,
        }
    }
}

fn decode_payload<T: serde::de::DeserializeOwned>(
    kind: &'static str,
    data: &serde_json::Value,
) -> Result<T, DecodeError> {
    T::deserialize(data).map_err(|source| DecodeError { kind, source })
}
