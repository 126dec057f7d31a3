//! Single entry point for every inbound action.
//!
//! The router decodes the state token, resolves the active season, dispatches
//! on the trigger, and turns every failure into a renderable response. The
//! token only decides which resolver the primary button runs. Everything the
//! resolvers check is re-read from the store.

use std::sync::Arc;

use contracts::{
    token, ActionMessage, ActionResponse, GameConfig, Mode, ModeState, Outcome, Season, Trigger,
    SCHEMA_VERSION_V1,
};
use rand::Rng;
use tracing::{debug, warn};

use crate::art::ArtAttacher;
use crate::attack::{AttackOutcome, AttackResolver};
use crate::claim::ClaimResolver;
use crate::community::join_community;
use crate::error::EngineError;
use crate::external::{AssetStore, ChainSettlement, ImageSynthesis, Unconfigured};
use crate::store::WorldStore;
use crate::Actor;

pub struct GameEngine {
    store: Arc<dyn WorldStore>,
    settlement: Option<Arc<dyn ChainSettlement>>,
    images: Arc<dyn ImageSynthesis>,
    assets: Arc<dyn AssetStore>,
    config: GameConfig,
}

impl GameEngine {
    /// Fails on a config that could not hold the tile invariants.
    pub fn new(store: Arc<dyn WorldStore>, config: GameConfig) -> Result<Self, EngineError> {
        config
            .validate()
            .map_err(|reason| EngineError::validation(format!("invalid game config: {reason}")))?;
        Ok(Self {
            store,
            settlement: None,
            images: Arc::new(Unconfigured),
            assets: Arc::new(Unconfigured),
            config,
        })
    }

    pub fn with_settlement(mut self, settlement: Arc<dyn ChainSettlement>) -> Self {
        self.settlement = Some(settlement);
        self
    }

    pub fn with_art(mut self, images: Arc<dyn ImageSynthesis>, assets: Arc<dyn AssetStore>) -> Self {
        self.images = images;
        self.assets = assets;
        self
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn handle(&self, message: &ActionMessage) -> ActionResponse {
        self.handle_with_rng(&mut rand::thread_rng(), message)
    }

    pub fn handle_with_rng<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        message: &ActionMessage,
    ) -> ActionResponse {
        let state = token::decode(message.state.as_deref());
        debug!(
            trigger = message.trigger.as_str(),
            caller_id = %message.caller_id,
            mode = state.mode.as_str(),
            "action.received"
        );

        // A mode switch never reads or writes the world.
        if message.trigger == Trigger::SwitchMode {
            return switch_mode_response(state);
        }

        match self.dispatch(rng, message, state) {
            Ok(response) => response,
            Err(err) => {
                warn!(
                    trigger = message.trigger.as_str(),
                    caller_id = %message.caller_id,
                    code = ?err.code(),
                    error = %err,
                    "action.failed"
                );
                ActionResponse::failure(err.to_api_error())
            }
        }
    }

    fn dispatch<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        message: &ActionMessage,
        state: ModeState,
    ) -> Result<ActionResponse, EngineError> {
        if message.caller_id.trim().is_empty() {
            return Err(EngineError::validation("Missing caller id."));
        }

        let season = self
            .store
            .active_season()?
            .ok_or(EngineError::NoActiveSeason)?;

        match message.trigger {
            Trigger::Primary => match state.primary_action() {
                Mode::Claim => self.claim(rng, &season, message),
                Mode::Attack => self.attack(rng, &season, message),
            },
            Trigger::JoinCommunity => self.join(message),
            Trigger::AttachArt => self.attach_art(&season, message),
            Trigger::SwitchMode => Ok(switch_mode_response(state)),
        }
    }

    fn claim<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        season: &Season,
        message: &ActionMessage,
    ) -> Result<ActionResponse, EngineError> {
        let address = canonical_address(message.caller_address.as_deref())?;
        let claimant = Actor {
            caller_id: &message.caller_id,
            address: &address,
        };

        let outcome = ClaimResolver::new(self.store.as_ref(), &self.config)
            .with_settlement(self.settlement.as_deref())
            .claim(rng, season.season_id, &claimant)?;

        let tile = &outcome.tile;
        let response = ActionResponse::result(
            Outcome::Claimed {
                x: tile.x,
                y: tile.y,
                color: tile.color.clone(),
                health: tile.health,
                settlement_tx: outcome.settlement_tx.clone(),
            },
            format!("You claimed tile ({}, {})!", tile.x, tile.y),
        );

        Ok(with_warning(response, outcome.reward_warning))
    }

    fn attack<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        season: &Season,
        message: &ActionMessage,
    ) -> Result<ActionResponse, EngineError> {
        let address = canonical_address(message.caller_address.as_deref())?;
        let attacker = Actor {
            caller_id: &message.caller_id,
            address: &address,
        };

        let outcome = AttackResolver::new(self.store.as_ref(), &self.config).attack(
            rng,
            season.season_id,
            &attacker,
        )?;

        let warning = self.record_player(attacker.caller_id, attacker.address);
        let response = match outcome {
            AttackOutcome::Hit { tile, remaining } => ActionResponse::result(
                Outcome::Hit {
                    x: tile.x,
                    y: tile.y,
                    health: remaining,
                },
                format!("Hit! Tile ({},{}) has {remaining} HP.", tile.x, tile.y),
            ),
            AttackOutcome::Captured { tile } => ActionResponse::result(
                Outcome::Captured {
                    x: tile.x,
                    y: tile.y,
                    color: tile.color.clone(),
                },
                format!("Captured! Tile ({},{}) is yours!", tile.x, tile.y),
            ),
        };
        Ok(with_warning(response, warning))
    }

    fn join(&self, message: &ActionMessage) -> Result<ActionResponse, EngineError> {
        let raw = message.input_text.as_deref().unwrap_or_default();
        let joined = join_community(self.store.as_ref(), &self.config, &message.caller_id, raw)?;
        let warning = canonical_address(message.caller_address.as_deref())
            .ok()
            .and_then(|address| self.record_player(&message.caller_id, &address));

        let text = format!("You joined {}!", joined.name);
        let response = ActionResponse::result(
            Outcome::CommunityJoined {
                community_id: joined.community_id,
                name: joined.name,
            },
            text,
        );
        Ok(with_warning(response, warning))
    }

    /// Upserts the caller's player row on contact. Best effort, like the claim reward.
    fn record_player(&self, caller_id: &str, address: &str) -> Option<String> {
        self.store.upsert_player(caller_id, address).err().map(|err| {
            warn!(caller_id, error = %err, "player.upsert_failed");
            format!("Player record could not be updated: {err}")
        })
    }

    fn attach_art(
        &self,
        season: &Season,
        message: &ActionMessage,
    ) -> Result<ActionResponse, EngineError> {
        let attacher = ArtAttacher {
            store: self.store.as_ref(),
            images: self.images.as_ref(),
            assets: self.assets.as_ref(),
            config: &self.config,
        };
        let outcome = attacher.attach(
            season.season_id,
            &message.caller_id,
            message.input_text.as_deref(),
        )?;

        let (x, y) = outcome.tile.coords();
        Ok(ActionResponse::result(
            Outcome::ArtAttached {
                x,
                y,
                image_url: outcome.image_url,
            },
            format!("Art added to tile ({x},{y})!"),
        ))
    }
}

/// Flips the token; the primary button now performs the mode it named.
pub fn switch_mode_response(state: ModeState) -> ActionResponse {
    let next = state.switched();
    let primary = next.primary_action();

    ActionResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        outcome: Outcome::ModeSwitched { mode: next.mode },
        message: format!("{} mode", capitalized(primary)),
        state: token::encode(&next),
        buttons: vec![
            primary_label(primary).to_string(),
            format!("Switch to {} Mode", next.mode.as_str()),
        ],
        return_to_start: false,
        warnings: Vec::new(),
    }
}

pub fn primary_label(action: Mode) -> &'static str {
    match action {
        Mode::Claim => "Claim a Tile",
        Mode::Attack => "Attack a Tile",
    }
}

fn capitalized(mode: Mode) -> &'static str {
    match mode {
        Mode::Claim => "Claim",
        Mode::Attack => "Attack",
    }
}

fn with_warning(response: ActionResponse, warning: Option<String>) -> ActionResponse {
    match warning {
        Some(warning) => response.with_warning(warning),
        None => response,
    }
}

fn canonical_address(raw: Option<&str>) -> Result<String, EngineError> {
    raw.map(str::trim)
        .filter(|address| !address.is_empty())
        .map(str::to_lowercase)
        .ok_or_else(|| EngineError::validation("No verified wallet."))
}
