/// Shared handler state. Holds no game state of its own: every request
/// re-reads the world through the store.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<GameEngine>,
    world: Arc<dyn WorldStore>,
    reader: Arc<dyn WorldReader>,
}

impl AppState {
    pub fn new<S>(engine: GameEngine, store: Arc<S>) -> Self
    where
        S: WorldStore + WorldReader + 'static,
    {
        Self {
            engine: Arc::new(engine),
            world: store.clone(),
            reader: store,
        }
    }

    fn leaderboard_default(&self) -> usize {
        self.engine.config().leaderboard_limit
    }
}

async fn require_active_season(state: &AppState) -> Result<Season, HttpApiError> {
    let world = state.world.clone();
    blocking(move || world.active_season())
        .await?
        .ok_or_else(HttpApiError::no_active_season)
}
