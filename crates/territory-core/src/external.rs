//! Interfaces to the collaborators outside the engine.
//!
//! All of these block and are expected to enforce their own timeouts. Once a
//! resolver starts one, the call is not cancelled.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExternalError {
    #[error("timed out")]
    Timeout,
    #[error("{0}")]
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Failed(String),
    /// No answer before the timeout; the transaction may still land.
    Unknown,
}

/// On-chain record of a claim. Submitting the same claim twice must be harmless.
pub trait ChainSettlement: Send + Sync {
    fn submit_claim(&self, address: &str, x: u32, y: u32) -> Result<String, ExternalError>;

    fn await_confirmation(&self, tx_ref: &str, timeout: Duration) -> Confirmation;
}

pub trait ImageSynthesis: Send + Sync {
    /// Returns a URL for the generated image.
    fn generate(&self, prompt: &str) -> Result<String, ExternalError>;

    fn fetch(&self, image_url: &str) -> Result<Vec<u8>, ExternalError>;
}

pub trait AssetStore: Send + Sync {
    /// Stores `bytes` at `path` and returns the public URL.
    fn store(&self, bytes: &[u8], path: &str) -> Result<String, ExternalError>;
}

/// Stand-in for image synthesis and asset storage when none is wired up.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unconfigured;

impl ImageSynthesis for Unconfigured {
    fn generate(&self, _prompt: &str) -> Result<String, ExternalError> {
        Err(ExternalError::Failed("not configured".to_string()))
    }

    fn fetch(&self, _image_url: &str) -> Result<Vec<u8>, ExternalError> {
        Err(ExternalError::Failed("not configured".to_string()))
    }
}

impl AssetStore for Unconfigured {
    fn store(&self, _bytes: &[u8], _path: &str) -> Result<String, ExternalError> {
        Err(ExternalError::Failed("not configured".to_string()))
    }
}
