//! State token codec.
//!
//! The token is echoed by the client on every interaction. It only sequences
//! the UI: nothing that guards world state may branch on it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Claim,
    Attack,
}

impl Mode {
    pub fn opposite(self) -> Self {
        match self {
            Self::Claim => Self::Attack,
            Self::Attack => Self::Claim,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Claim => "claim",
            Self::Attack => "attack",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ModeState {
    /// The mode the next switch moves into, not the mode just acted in.
    pub mode: Mode,
}

impl ModeState {
    pub fn new(mode: Mode) -> Self {
        Self { mode }
    }

    /// The action the primary button performs under this token.
    pub fn primary_action(&self) -> Mode {
        self.mode.opposite()
    }

    /// The token after a mode switch.
    pub fn switched(&self) -> Self {
        Self::new(self.mode.opposite())
    }
}

/// Decode a raw token, falling back to the default on missing or malformed input.
pub fn decode(raw: Option<&str>) -> ModeState {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return ModeState::default();
    };

    serde_json::from_str(raw).unwrap_or_default()
}

const DEFAULT_TOKEN: &str = r#"{"mode":"claim"}"#;

pub fn encode(state: &ModeState) -> String {
    serde_json::to_string(state).unwrap_or_else(|_| DEFAULT_TOKEN.to_string())
}
