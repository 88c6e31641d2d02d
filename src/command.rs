//! Typed host commands
//!
//! Host invocations arrive as a method name plus a loosely-typed JSON argument
//! bag. Decoding validates every required field up front, so a `Command` that
//! exists is always complete.

use crate::engine::{Environment, ViewOptions};
use crate::error::BridgeError;
use crate::session::ViewParams;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::str::FromStr;

/// Session-scoped commands
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    LoadCharacter {
        character_id: String,
        view: ViewOptions,
    },
    PreloadCharacter {
        character_id: String,
    },
    DeleteAssets {
        character_id: String,
    },
    DeleteAllAssets,
    Start,
    Close {
        should_cleanup: bool,
    },
    Interrupt,
    SendAudio {
        audio: Vec<u8>,
        end: bool,
    },
    SetVolume {
        level: f64,
    },
}

/// Commands that act on the process-wide SDK rather than a session
#[derive(Debug, Clone, PartialEq)]
pub enum GlobalCommand {
    SupportsCurrentDevice,
    SetUpEnvironment { environment: Environment },
}

/// Outcome of decoding a method name
#[derive(Debug)]
pub enum Decoded<T> {
    Command(T),
    /// The method is not part of the catalogue
    Unknown,
}

// ============================================================================
// Argument shapes
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadCharacterInput {
    character_id: String,
    #[serde(default)]
    background_image: Option<Bytes>,
    #[serde(default, deserialize_with = "optional_bool")]
    is_background_opaque: Option<bool>,
}

/// Optional flags: `null` or a non-boolean falls back to the default
fn optional_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Value::deserialize(deserializer)?.as_bool())
}

/// A character id given bare or as `{characterId}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CharacterIdInput {
    Bare(String),
    #[serde(rename_all = "camelCase")]
    Keyed { character_id: String },
}

impl CharacterIdInput {
    fn into_id(self) -> String {
        match self {
            CharacterIdInput::Bare(id) | CharacterIdInput::Keyed { character_id: id } => id,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CloseInput {
    #[serde(default, deserialize_with = "optional_bool")]
    should_cleanup: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendAudioInput {
    audio_data: Bytes,
    #[serde(default, deserialize_with = "optional_bool")]
    end: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VolumeInput {
    Bare(f64),
    Keyed { level: f64 },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EnvironmentInput {
    Bare(String),
    Keyed { environment: String },
}

/// Binary payload: a list of byte values or a base64 string
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Bytes {
    List(Vec<u8>),
    Base64(String),
}

impl Bytes {
    fn decode(self, field: &str) -> Result<Vec<u8>, BridgeError> {
        match self {
            Bytes::List(bytes) => Ok(bytes),
            Bytes::Base64(encoded) => base64::engine::general_purpose::STANDARD
                .decode(encoded.as_bytes())
                .map_err(|e| {
                    BridgeError::invalid_argument(format!("{field}: invalid base64 ({e})"))
                }),
        }
    }
}

/// Deserialize an argument bag, treating a missing bag as `{}`
fn parse<T: DeserializeOwned>(method: &str, args: &Value) -> Result<T, BridgeError> {
    let args = if args.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        args.clone()
    };
    serde_json::from_value(args)
        .map_err(|e| BridgeError::invalid_argument(format!("{method}: {e}")))
}

fn parse_required<T: DeserializeOwned>(
    method: &str,
    field: &str,
    args: &Value,
) -> Result<T, BridgeError> {
    if args.is_null() {
        return Err(BridgeError::invalid_argument(format!(
            "{method}: missing required argument '{field}'"
        )));
    }
    serde_json::from_value(args.clone()).map_err(|_| {
        BridgeError::invalid_argument(format!(
            "{method}: '{field}' is missing or has the wrong type"
        ))
    })
}

fn non_empty(method: &str, field: &str, value: String) -> Result<String, BridgeError> {
    if value.is_empty() {
        return Err(BridgeError::invalid_argument(format!(
            "{method}: '{field}' must not be empty"
        )));
    }
    Ok(value)
}

// ============================================================================
// Decoding
// ============================================================================

impl Command {
    /// Decode a session command.
    ///
    /// # Errors
    /// `InvalidArgument` when a required field is missing or mistyped.
    pub fn decode(method: &str, args: &Value) -> Result<Decoded<Command>, BridgeError> {
        let command = match method {
            "loadCharacterData" => {
                let input: LoadCharacterInput = parse(method, args)?;
                let background_image = input
                    .background_image
                    .map(|bytes| bytes.decode("backgroundImage"))
                    .transpose()?;
                Command::LoadCharacter {
                    character_id: non_empty(method, "characterId", input.character_id)?,
                    view: ViewOptions {
                        background_image,
                        is_background_opaque: input.is_background_opaque.unwrap_or(true),
                    },
                }
            }
            "preloadCharacterData" => Command::PreloadCharacter {
                character_id: character_id(method, args)?,
            },
            "deleteCharacterAssets" => Command::DeleteAssets {
                character_id: character_id(method, args)?,
            },
            "deleteAllCharacterAssets" => Command::DeleteAllAssets,
            "start" => Command::Start,
            "close" => {
                // Anything but a map closes without cleanup
                let input: CloseInput = if args.is_object() {
                    parse(method, args)?
                } else {
                    CloseInput::default()
                };
                Command::Close {
                    should_cleanup: input.should_cleanup.unwrap_or(false),
                }
            }
            "interrupt" => Command::Interrupt,
            "sendAudioData" => {
                let input: SendAudioInput = parse(method, args)?;
                Command::SendAudio {
                    audio: input.audio_data.decode("audioData")?,
                    end: input.end.unwrap_or(false),
                }
            }
            "setVolume" => {
                let level = match parse_required::<VolumeInput>(method, "level", args)? {
                    VolumeInput::Bare(level) | VolumeInput::Keyed { level } => level,
                };
                Command::SetVolume { level }
            }
            _ => return Ok(Decoded::Unknown),
        };
        Ok(Decoded::Command(command))
    }

    /// Method name this command is invoked with
    pub fn method(&self) -> &'static str {
        match self {
            Command::LoadCharacter { .. } => "loadCharacterData",
            Command::PreloadCharacter { .. } => "preloadCharacterData",
            Command::DeleteAssets { .. } => "deleteCharacterAssets",
            Command::DeleteAllAssets => "deleteAllCharacterAssets",
            Command::Start => "start",
            Command::Close { .. } => "close",
            Command::Interrupt => "interrupt",
            Command::SendAudio { .. } => "sendAudioData",
            Command::SetVolume { .. } => "setVolume",
        }
    }
}

fn character_id(method: &str, args: &Value) -> Result<String, BridgeError> {
    let id = parse_required::<CharacterIdInput>(method, "characterId", args)?.into_id();
    non_empty(method, "characterId", id)
}

impl GlobalCommand {
    /// Decode a process-wide command.
    ///
    /// # Errors
    /// `InvalidArgument` for a missing or unrecognized environment.
    pub fn decode(method: &str, args: &Value) -> Result<Decoded<GlobalCommand>, BridgeError> {
        let command = match method {
            "supportsCurrentDevice" => GlobalCommand::SupportsCurrentDevice,
            "setUpEnvironment" => {
                let input: EnvironmentInput = parse_required(method, "environment", args)?;
                let name = match input {
                    EnvironmentInput::Bare(name)
                    | EnvironmentInput::Keyed { environment: name } => name,
                };
                let environment = Environment::from_str(&name)
                    .map_err(|e| BridgeError::invalid_argument(format!("{method}: {e}")))?;
                GlobalCommand::SetUpEnvironment { environment }
            }
            _ => return Ok(Decoded::Unknown),
        };
        Ok(Decoded::Command(command))
    }
}

// ============================================================================
// View creation parameters
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ViewParamsInput {
    #[serde(default)]
    view_id: Option<i64>,
    #[serde(default)]
    session_token: Option<String>,
    #[serde(default)]
    channel_name: Option<String>,
}

impl ViewParams {
    /// Decode the argument bag the host passes when creating a view.
    /// Every field is optional; an empty session token counts as absent.
    ///
    /// # Errors
    /// `InvalidArgument` when a field has the wrong type.
    pub fn from_args(args: &Value) -> Result<Self, BridgeError> {
        let input: ViewParamsInput = parse("createView", args)?;
        Ok(Self {
            view_id: input.view_id,
            session_token: input.session_token.filter(|token| !token.is_empty()),
            channel_name: input.channel_name,
        })
    }
}
