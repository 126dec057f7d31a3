use contracts::{GameConfig, SeasonId, Tile};
use tracing::{info, warn};

use crate::error::EngineError;
use crate::external::{AssetStore, ImageSynthesis};
use crate::now_ms;
use crate::store::WorldStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtOutcome {
    pub tile: Tile,
    pub image_url: String,
}

/// Generates art from a prompt and pins it to the caller's newest tile.
pub struct ArtAttacher<'a> {
    pub store: &'a dyn WorldStore,
    pub images: &'a dyn ImageSynthesis,
    pub assets: &'a dyn AssetStore,
    pub config: &'a GameConfig,
}

impl ArtAttacher<'_> {
    pub fn attach(
        &self,
        season_id: SeasonId,
        caller_id: &str,
        prompt: Option<&str>,
    ) -> Result<ArtOutcome, EngineError> {
        let prompt = prompt.map(str::trim).unwrap_or_default();
        if prompt.chars().count() < self.config.min_prompt_chars {
            return Err(EngineError::validation(format!(
                "Prompt must be at least {} characters.",
                self.config.min_prompt_chars
            )));
        }

        let Some(mut tile) = self.store.latest_owned_tile(season_id, caller_id)? else {
            return Err(EngineError::NoOwnedTile);
        };

        let generated_url = self
            .images
            .generate(prompt)
            .map_err(|err| EngineError::external("image", err.to_string()))?;
        let bytes = self
            .images
            .fetch(&generated_url)
            .map_err(|err| EngineError::external("image", err.to_string()))?;

        let path = format!(
            "seasons/{season_id}/tiles/{}-{}-{}.png",
            tile.x,
            tile.y,
            now_ms()
        );
        let image_url = self
            .assets
            .store(&bytes, &path)
            .map_err(|err| EngineError::external("storage", err.to_string()))?;

        if let Err(err) = self.store.set_tile_image(tile.tile_id, &image_url) {
            warn!(tile_id = tile.tile_id, image_url = %image_url, error = %err, "art.orphaned_asset");
            return Err(err.into());
        }
        info!(x = tile.x, y = tile.y, caller_id, "art.attached");

        tile.image_url = Some(image_url.clone());
        Ok(ArtOutcome { tile, image_url })
    }
}
