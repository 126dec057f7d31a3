#[derive(Debug, Deserialize, Default)]
struct LimitQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct SeasonResponse {
    schema_version: String,
    season: Season,
}

#[derive(Debug, Serialize)]
struct GridResponse {
    schema_version: String,
    season_id: SeasonId,
    grid_size: u32,
    tiles: Vec<TileView>,
}

#[derive(Debug, Serialize)]
struct LeaderboardResponse<T> {
    schema_version: String,
    season_id: SeasonId,
    entries: Vec<T>,
}

impl<T> LeaderboardResponse<T> {
    fn new(season_id: SeasonId, entries: Vec<T>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            season_id,
            entries,
        }
    }
}

async fn get_season(State(state): State<AppState>) -> Result<Json<SeasonResponse>, HttpApiError> {
    let season = require_active_season(&state).await?;
    Ok(Json(SeasonResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        season,
    }))
}

async fn get_grid(State(state): State<AppState>) -> Result<Json<GridResponse>, HttpApiError> {
    let season = require_active_season(&state).await?;
    let reader = state.reader.clone();
    let season_id = season.season_id;
    let tiles = blocking(move || reader.season_tiles(season_id)).await?;

    Ok(Json(GridResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        season_id,
        grid_size: state.engine.config().grid_size,
        tiles,
    }))
}

async fn get_player_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<LeaderboardResponse<PlayerStanding>>, HttpApiError> {
    let limit = resolve_limit(query.limit, state.leaderboard_default())?;
    let season = require_active_season(&state).await?;
    let reader = state.reader.clone();
    let season_id = season.season_id;
    let entries = blocking(move || reader.player_standings(season_id, limit)).await?;

    Ok(Json(LeaderboardResponse::new(season_id, entries)))
}

async fn get_community_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<LeaderboardResponse<CommunityStanding>>, HttpApiError> {
    let limit = resolve_limit(query.limit, state.leaderboard_default())?;
    let season = require_active_season(&state).await?;
    let reader = state.reader.clone();
    let season_id = season.season_id;
    let entries = blocking(move || reader.community_standings(season_id, limit)).await?;

    Ok(Json(LeaderboardResponse::new(season_id, entries)))
}
