//! Value types exchanged with the avatar engine

use std::fmt;
use std::str::FromStr;

/// A character whose metadata and assets the engine has resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Character {
    pub id: String,
}

impl Character {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Presentation options handed to the engine when a character is opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewOptions {
    pub background_image: Option<Vec<u8>>,
    pub is_background_opaque: bool,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            background_image: None,
            is_background_opaque: true,
        }
    }
}

/// Why a load attempt ended without a usable character
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadFailure {
    FetchCharacterMetaFailed,
    DownloadAssetsFailed,
}

impl LoadFailure {
    pub fn as_str(self) -> &'static str {
        match self {
            LoadFailure::FetchCharacterMetaFailed => "fetchCharacterMetaFailed",
            LoadFailure::DownloadAssetsFailed => "downloadAssetsFailed",
        }
    }
}

impl fmt::Display for LoadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress reported by the engine while a character loads
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadProgress {
    Preparing,
    /// Fraction in `0.0..=1.0`
    Downloading { progress: f64 },
    Completed,
    Failed { reason: LoadFailure },
}

/// Connection to the engine's backend service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Reported to the host as `"error"`
    Failed,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Failed => "error",
        }
    }

    /// Failed and Disconnected stay put until the next start
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Disconnected | ConnectionState::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversationState {
    #[default]
    Idle,
    Active,
}

impl ConversationState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConversationState::Idle => "idle",
            ConversationState::Active => "active",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerState {
    #[default]
    Idle,
    Playing,
}

impl PlayerState {
    pub fn as_str(self) -> &'static str {
        match self {
            PlayerState::Idle => "idle",
            PlayerState::Playing => "playing",
        }
    }
}

/// Backend environment the engine talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Develop,
    Release,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Develop => "develop",
            Environment::Release => "release",
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "develop" => Ok(Environment::Develop),
            "release" => Ok(Environment::Release),
            other => Err(format!(
                "unknown environment '{other}' (expected 'develop' or 'release')"
            )),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-wide engine configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SdkConfig {
    pub environment: Environment,
    pub session_token: String,
}
