use contracts::{ApiError, ErrorCode};

use crate::store::StoreError;

const GENERIC_FAILURE: &str = "Something went wrong. Please try again later.";

/// Every way a single action can fail. None of these are fatal to the process.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{0}")]
    Validation(String),

    #[error("No active season found.")]
    NoActiveSeason,

    #[error("Could not find an available tile after {attempts} attempts.")]
    NoAvailableCell { attempts: u32 },

    #[error("Tile kept changing under attack after {attempts} attempts.")]
    ContentionExhausted { attempts: u32 },

    #[error("No attackable tiles found.")]
    NoAttackableTarget,

    #[error("You don't own a tile this season.")]
    NoOwnedTile,

    #[error("{service} failed: {message}")]
    External {
        service: &'static str,
        message: String,
    },

    /// The chain settled but the store write did not. Needs an operator.
    #[error("settled claim {tx_ref} at ({x},{y}) was not recorded: {source}")]
    ReconciliationNeeded {
        tx_ref: String,
        x: u32,
        y: u32,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn external(service: &'static str, message: impl Into<String>) -> Self {
        Self::External {
            service,
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::ValidationFailure,
            Self::NoAvailableCell { .. } | Self::ContentionExhausted { .. } => {
                ErrorCode::ContentionExhausted
            }
            Self::NoActiveSeason | Self::NoAttackableTarget | Self::NoOwnedTile => {
                ErrorCode::NotFound
            }
            Self::External { .. } => ErrorCode::ExternalFailure,
            Self::ReconciliationNeeded { .. } => ErrorCode::ReconciliationNeeded,
            Self::Store(_) => ErrorCode::InternalError,
        }
    }

    /// Short text that is safe to show the caller.
    pub fn user_message(&self) -> String {
        match self {
            Self::NoAvailableCell { .. } => {
                "Could not find an available tile. Try again.".to_string()
            }
            Self::ContentionExhausted { .. } => "That tile is busy. Try again.".to_string(),
            Self::External { service, .. } => format!("The {service} service is unavailable."),
            Self::ReconciliationNeeded { .. } => GENERIC_FAILURE.to_string(),
            Self::Store(err) => err.to_string(),
            other => other.to_string(),
        }
    }

    pub fn to_api_error(&self) -> ApiError {
        let details = match self {
            Self::ReconciliationNeeded { tx_ref, .. } => Some(format!("tx_ref={tx_ref}")),
            Self::External { message, .. } => Some(message.clone()),
            _ => None,
        };
        ApiError::new(self.code(), self.user_message(), details)
    }
}
