use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, Request, State};
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::{Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use contracts::{
    ActionMessage, ActionResponse, ApiError, CommunityStanding, ErrorCode, PlayerStanding, Season,
    SeasonId, TileView, SCHEMA_VERSION_V1,
};
use serde::{Deserialize, Serialize};
use territory_core::{GameEngine, StoreError, WorldReader, WorldStore};
use tokio::net::TcpListener;
use tracing::{error, info};

pub const DEFAULT_SQLITE_PATH: &str = "territory.sqlite";
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";
const MAX_LEADERBOARD_LIMIT: usize = 100;

include!("error.rs");
include!("state.rs");
include!("routes/action.rs");
include!("routes/query.rs");
include!("util.rs");

pub async fn serve(addr: SocketAddr, state: AppState) -> Result<(), ServerError> {
    let app = router(state);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "server.listening");
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/action", post(post_action))
        .route("/api/v1/season", get(get_season))
        .route("/api/v1/grid", get(get_grid))
        .route("/api/v1/leaderboard/players", get(get_player_leaderboard))
        .route(
            "/api/v1/leaderboard/communities",
            get(get_community_leaderboard),
        )
        .layer(middleware::from_fn(cors_middleware))
        .with_state(state)
}

async fn cors_middleware(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = Response::new(axum::body::Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return response;
    }

    let mut response = next.run(request).await;
    apply_cors_headers(response.headers_mut());
    response
}

#[cfg(test)]
mod tests;
