//! SQLite persistence and the HTTP surface in front of the game engine.

mod persistence;
mod server;

pub use persistence::{PersistenceError, SqliteWorldStore};
pub use server::{router, serve, AppState, ServerError, DEFAULT_ADDR, DEFAULT_SQLITE_PATH};
