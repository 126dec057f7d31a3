//! v1 cross-boundary contracts for the territory engine, API, and world store.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod config;
pub mod token;

pub use config::GameConfig;
pub use token::{Mode, ModeState};

pub const SCHEMA_VERSION_V1: &str = "1.0";

pub type SeasonId = i64;
pub type TileId = i64;
pub type CommunityId = i64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Season {
    pub season_id: SeasonId,
    pub label: String,
    pub is_active: bool,
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "season_id={} label={} active={}",
            self.season_id, self.label, self.is_active
        )
    }
}

/// A claimed cell of the world grid. Unique per `(season_id, x, y)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tile {
    pub tile_id: TileId,
    pub season_id: SeasonId,
    pub x: u32,
    pub y: u32,
    /// Lowercased wallet-style address of the current owner.
    pub owner_address: String,
    pub owner_id: String,
    pub color: String,
    pub health: u8,
    pub image_url: Option<String>,
    pub created_at_ms: i64,
}

impl Tile {
    pub fn coords(&self) -> (u32, u32) {
        (self.x, self.y)
    }

    pub fn view(&self) -> TileView {
        TileView {
            x: self.x,
            y: self.y,
            color: self.color.clone(),
            image_url: self.image_url.clone(),
            owner_address: self.owner_address.clone(),
        }
    }
}

/// The per-tile fields the grid renderer reads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TileView {
    pub x: u32,
    pub y: u32,
    pub color: String,
    pub image_url: Option<String>,
    pub owner_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerStanding {
    pub caller_id: String,
    pub address: Option<String>,
    pub tile_count: u64,
    pub balance: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommunityStanding {
    pub community_id: CommunityId,
    pub name: String,
    pub reference_url: String,
    pub tile_count: u64,
    pub member_count: u64,
}

// ---------------------------------------------------------------------------
// Inbound action
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// The shared action button; what it does depends on the state token.
    Primary,
    SwitchMode,
    JoinCommunity,
    AttachArt,
}

impl Trigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::SwitchMode => "switch_mode",
            Self::JoinCommunity => "join_community",
            Self::AttachArt => "attach_art",
        }
    }
}

/// An action message that the transport layer has already authenticated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionMessage {
    pub trigger: Trigger,
    pub caller_id: String,
    #[serde(default)]
    pub caller_address: Option<String>,
    #[serde(default)]
    pub input_text: Option<String>,
    /// Raw client-echoed state token. Untrusted.
    #[serde(default)]
    pub state: Option<String>,
}

impl ActionMessage {
    pub fn new(trigger: Trigger, caller_id: impl Into<String>) -> Self {
        Self {
            trigger,
            caller_id: caller_id.into(),
            caller_address: None,
            input_text: None,
            state: None,
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.caller_address = Some(address.into());
        self
    }

    pub fn with_input(mut self, text: impl Into<String>) -> Self {
        self.input_text = Some(text.into());
        self
    }

    pub fn with_state(mut self, state: &ModeState) -> Self {
        self.state = Some(token::encode(state));
        self
    }
}

// ---------------------------------------------------------------------------
// Outbound result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationFailure,
    ContentionExhausted,
    NotFound,
    ExternalFailure,
    ReconciliationNeeded,
    InvalidQuery,
    InternalError,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiError {
    pub schema_version: String,
    pub error_code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(error_code: ErrorCode, message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            error_code,
            message: message.into(),
            details,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    ModeSwitched {
        mode: Mode,
    },
    Claimed {
        x: u32,
        y: u32,
        color: String,
        health: u8,
        settlement_tx: Option<String>,
    },
    Hit {
        x: u32,
        y: u32,
        health: u8,
    },
    Captured {
        x: u32,
        y: u32,
        color: String,
    },
    CommunityJoined {
        community_id: CommunityId,
        name: String,
    },
    ArtAttached {
        x: u32,
        y: u32,
        image_url: String,
    },
    Failed {
        error: ApiError,
    },
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Everything the response assembler needs to render one interaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionResponse {
    pub schema_version: String,
    pub outcome: Outcome,
    pub message: String,
    /// Encoded state token to echo on the next interaction.
    pub state: String,
    pub buttons: Vec<String>,
    pub return_to_start: bool,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl ActionResponse {
    /// A result frame: one button carrying the message, back to the start frame.
    pub fn result(outcome: Outcome, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            outcome,
            buttons: vec![message.clone()],
            message,
            state: token::encode(&ModeState::default()),
            return_to_start: true,
            warnings: Vec::new(),
        }
    }

    pub fn failure(error: ApiError) -> Self {
        let message = format!("Error: {}", error.message);
        Self::result(Outcome::Failed { error }, message)
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

impl fmt::Display for ActionResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} state={}", self.message, self.state)?;
        for warning in &self.warnings {
            write!(f, " warning=\"{warning}\"")?;
        }
        Ok(())
    }
}
