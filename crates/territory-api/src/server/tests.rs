use axum::body::Body;
use axum::extract::FromRequest;
use contracts::{CommunityId, GameConfig, Mode, ModeState, Outcome, Tile, TileId, Trigger};
use territory_core::{MemoryWorldStore, NewTile, TileCapture};

use super::*;

fn state_with_season() -> (AppState, Arc<MemoryWorldStore>) {
    let store = Arc::new(MemoryWorldStore::with_seed(3));
    store.start_season("test").expect("season");
    let engine = GameEngine::new(store.clone(), GameConfig::default()).expect("engine");
    (AppState::new(engine, store.clone()), store)
}

fn claim_message(caller_id: &str) -> ActionMessage {
    ActionMessage::new(Trigger::Primary, caller_id)
        .with_address("0xABC")
        .with_state(&ModeState::new(Mode::Attack))
}

#[tokio::test]
async fn action_claims_through_the_blocking_pool() {
    let (state, store) = state_with_season();

    let Json(response) = post_action(State(state), Ok(Json(claim_message("7")))).await;

    assert!(matches!(response.outcome, Outcome::Claimed { .. }), "{response}");
    assert!(response.return_to_start);
    assert_eq!(store.tiles(1).expect("tiles").len(), 1);
}

#[tokio::test]
async fn action_failure_is_still_a_rendered_frame() {
    let store = Arc::new(MemoryWorldStore::with_seed(3));
    let engine = GameEngine::new(store.clone(), GameConfig::default()).expect("engine");
    let state = AppState::new(engine, store);

    let Json(response) = post_action(State(state), Ok(Json(claim_message("7")))).await;

    let Outcome::Failed { error } = &response.outcome else {
        panic!("expected failure, got {response}");
    };
    assert_eq!(error.error_code, ErrorCode::NotFound);
    assert_eq!(response.message, "Error: No active season found.");
}

/// Every call panics, as a store bug inside the blocking pool would.
struct PanickingStore;

impl WorldStore for PanickingStore {
    fn active_season(&self) -> Result<Option<Season>, StoreError> {
        panic!("season lookup blew up");
    }

    fn tile_at(&self, _: SeasonId, _: u32, _: u32) -> Result<Option<Tile>, StoreError> {
        panic!("tile_at");
    }

    fn insert_tile(&self, _: NewTile) -> Result<Tile, StoreError> {
        panic!("insert_tile");
    }

    fn update_tile_health(&self, _: TileId, _: u8, _: u8) -> Result<(), StoreError> {
        panic!("update_tile_health");
    }

    fn capture_tile(&self, _: TileId, _: u8, _: &TileCapture) -> Result<(), StoreError> {
        panic!("capture_tile");
    }

    fn random_attackable_tile(&self, _: SeasonId, _: &str) -> Result<Option<Tile>, StoreError> {
        panic!("random_attackable_tile");
    }

    fn latest_owned_tile(&self, _: SeasonId, _: &str) -> Result<Option<Tile>, StoreError> {
        panic!("latest_owned_tile");
    }

    fn set_tile_image(&self, _: TileId, _: &str) -> Result<(), StoreError> {
        panic!("set_tile_image");
    }

    fn upsert_player(&self, _: &str, _: &str) -> Result<(), StoreError> {
        panic!("upsert_player");
    }

    fn increment_player_balance(&self, _: &str, _: i64) -> Result<(), StoreError> {
        panic!("increment_player_balance");
    }

    fn find_or_create_community(&self, _: &str, _: &str) -> Result<CommunityId, StoreError> {
        panic!("find_or_create_community");
    }

    fn upsert_membership(&self, _: &str, _: CommunityId) -> Result<(), StoreError> {
        panic!("upsert_membership");
    }
}

impl WorldReader for PanickingStore {
    fn season_tiles(&self, _: SeasonId) -> Result<Vec<TileView>, StoreError> {
        panic!("season_tiles");
    }

    fn player_standings(&self, _: SeasonId, _: usize) -> Result<Vec<PlayerStanding>, StoreError> {
        panic!("player_standings");
    }

    fn community_standings(
        &self,
        _: SeasonId,
        _: usize,
    ) -> Result<Vec<CommunityStanding>, StoreError> {
        panic!("community_standings");
    }
}

#[tokio::test]
async fn malformed_action_body_is_a_validation_frame() {
    let (state, store) = state_with_season();
    let request = axum::http::Request::builder()
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .expect("request");
    let rejection = Json::<ActionMessage>::from_request(request, &())
        .await
        .err()
        .expect("malformed body is rejected");

    let Json(response) = post_action(State(state), Err(rejection)).await;

    let Outcome::Failed { error } = &response.outcome else {
        panic!("expected failure, got {response}");
    };
    assert_eq!(error.error_code, ErrorCode::ValidationFailure);
    assert!(error.details.is_some());
    assert_eq!(response.message, "Error: Invalid action message.");
    assert!(store.tiles(1).expect("tiles").is_empty());
}

#[tokio::test]
async fn engine_panic_becomes_an_internal_error_frame() {
    let store = Arc::new(PanickingStore);
    let engine = GameEngine::new(store.clone(), GameConfig::default()).expect("engine");
    let state = AppState::new(engine, store);

    let Json(response) = post_action(State(state), Ok(Json(claim_message("7")))).await;

    let Outcome::Failed { error } = &response.outcome else {
        panic!("expected failure, got {response}");
    };
    assert_eq!(error.error_code, ErrorCode::InternalError);
    assert_eq!(error.details, None);
    assert_eq!(
        response.message,
        "Error: Something went wrong. Please try again later."
    );
}

#[tokio::test]
async fn grid_and_leaderboards_reflect_claims() {
    let (state, _store) = state_with_season();
    for caller in ["7", "7", "8"] {
        let Json(response) = post_action(State(state.clone()), Ok(Json(claim_message(caller)))).await;
        assert!(!response.outcome.is_failure(), "{response}");
    }

    let Json(grid) = get_grid(State(state.clone())).await.expect("grid");
    assert_eq!(grid.tiles.len(), 3);
    assert_eq!(grid.grid_size, 100);

    let Json(players) = get_player_leaderboard(State(state.clone()), Query(LimitQuery::default()))
        .await
        .expect("players");
    assert_eq!(players.entries[0].caller_id, "7");
    assert_eq!(players.entries[0].tile_count, 2);

    let Json(top) = get_player_leaderboard(State(state), Query(LimitQuery { limit: Some(1) }))
        .await
        .expect("players");
    assert_eq!(top.entries.len(), 1);
}

#[tokio::test]
async fn season_endpoint_reports_missing_season() {
    let store = Arc::new(MemoryWorldStore::with_seed(3));
    let engine = GameEngine::new(store.clone(), GameConfig::default()).expect("engine");
    let state = AppState::new(engine, store);

    let err = get_season(State(state)).await.unwrap_err();
    assert_eq!(err.status, StatusCode::NOT_FOUND);
    assert_eq!(err.error.error_code, ErrorCode::NotFound);
}

#[test]
fn leaderboard_limit_is_bounded() {
    assert_eq!(resolve_limit(None, 10).expect("default"), 10);
    assert_eq!(resolve_limit(Some(25), 10).expect("explicit"), 25);
    for bad in [0, MAX_LEADERBOARD_LIMIT + 1] {
        let err = resolve_limit(Some(bad), 10).unwrap_err();
        assert_eq!(err.error.error_code, ErrorCode::InvalidQuery);
    }
}

#[test]
fn cors_headers_are_applied() {
    let mut headers = axum::http::HeaderMap::new();
    apply_cors_headers(&mut headers);
    assert_eq!(
        headers.get("access-control-allow-origin").map(|v| v.as_bytes()),
        Some(&b"*"[..])
    );
}
