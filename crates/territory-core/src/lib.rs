//! Stateless game-state engine: claim and attack resolution over a shared tile grid.
//!
//! All durable state lives behind [`WorldStore`]. Each call re-reads what it
//! needs, so any number of engines may serve requests against one store.

pub mod art;
pub mod attack;
pub mod claim;
pub mod community;
pub mod engine;
pub mod error;
pub mod external;
pub mod memory;
pub mod store;

#[cfg(test)]
mod testing;

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

pub use attack::{AttackOutcome, AttackResolver};
pub use claim::{ClaimOutcome, ClaimResolver};
pub use community::normalize_channel_name;
pub use engine::GameEngine;
pub use error::EngineError;
pub use external::{AssetStore, ChainSettlement, Confirmation, ExternalError, ImageSynthesis};
pub use memory::MemoryWorldStore;
pub use store::{NewTile, StoreError, TileCapture, WorldReader, WorldStore};

/// The identity an action is performed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor<'a> {
    pub caller_id: &'a str,
    /// Canonical lowercased address.
    pub address: &'a str,
}

pub fn random_color<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("#{:06x}", rng.gen_range(0..=0x00FF_FFFF_u32))
}

pub(crate) fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
