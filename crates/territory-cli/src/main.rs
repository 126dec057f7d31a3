//! `territory` binary: serve the HTTP API, administer seasons, inspect the grid.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use contracts::{ActionMessage, GameConfig, Trigger};
use territory_api::{serve, AppState, SqliteWorldStore, DEFAULT_ADDR, DEFAULT_SQLITE_PATH};
use territory_core::{GameEngine, WorldReader, WorldStore};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "territory")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// SQLite database file
    #[arg(long, global = true, env = "TERRITORY_SQLITE_PATH", default_value = DEFAULT_SQLITE_PATH)]
    db: PathBuf,

    /// Game config JSON; missing fields take their defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the HTTP API
    Serve {
        #[arg(long, env = "TERRITORY_ADDR", default_value = DEFAULT_ADDR)]
        addr: SocketAddr,
    },

    /// Season administration
    Season {
        #[command(subcommand)]
        command: SeasonCommands,
    },

    /// Print every tile of the active season
    Grid,

    /// Print standings for the active season
    Leaderboard {
        /// Rank communities instead of players
        #[arg(long)]
        communities: bool,

        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Run one action against the store and print the response as JSON
    Act {
        #[arg(value_enum)]
        trigger: TriggerArg,

        #[arg(long)]
        caller: String,

        #[arg(long)]
        address: Option<String>,

        /// Channel name or art prompt
        #[arg(long)]
        input: Option<String>,

        /// State token echoed from the previous response
        #[arg(long)]
        state: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum SeasonCommands {
    /// Deactivate every season and start a new one
    Start { label: String },
    /// Show the active season
    Show,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum TriggerArg {
    Primary,
    Switch,
    Join,
    Art,
}

impl From<TriggerArg> for Trigger {
    fn from(value: TriggerArg) -> Self {
        match value {
            TriggerArg::Primary => Trigger::Primary,
            TriggerArg::Switch => Trigger::SwitchMode,
            TriggerArg::Join => Trigger::JoinCommunity,
            TriggerArg::Art => Trigger::AttachArt,
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<GameConfig, String> {
    let config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .map_err(|err| format!("failed to read config {}: {err}", path.display()))?;
            serde_json::from_str::<GameConfig>(&raw)
                .map_err(|err| format!("invalid config {}: {err}", path.display()))?
        }
        None => GameConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn open_store(path: &Path) -> Result<Arc<SqliteWorldStore>, String> {
    SqliteWorldStore::open(path)
        .map(Arc::new)
        .map_err(|err| format!("failed to open sqlite store {}: {err}", path.display()))
}

fn active_season_id(store: &SqliteWorldStore) -> Result<i64, String> {
    store
        .active_season()
        .map_err(|err| err.to_string())?
        .map(|season| season.season_id)
        .ok_or_else(|| "no active season; run `territory season start <label>`".to_string())
}

async fn run(args: Args) -> Result<(), String> {
    let config = load_config(args.config.as_deref())?;
    let store = open_store(&args.db)?;

    match args.command {
        Commands::Serve { addr } => {
            info!(db = %args.db.display(), "store.opened");
            let engine = GameEngine::new(store.clone(), config).map_err(|err| err.to_string())?;
            serve(addr, AppState::new(engine, store))
                .await
                .map_err(|err| format!("server error: {err}"))?;
        }
        Commands::Season {
            command: SeasonCommands::Start { label },
        } => {
            let season = store
                .start_season(label.trim())
                .map_err(|err| format!("failed to start season: {err}"))?;
            println!("started {season}");
        }
        Commands::Season {
            command: SeasonCommands::Show,
        } => match store.active_season().map_err(|err| err.to_string())? {
            Some(season) => println!("{season}"),
            None => println!("no active season"),
        },
        Commands::Grid => {
            let season_id = active_season_id(&store)?;
            let tiles = store
                .season_tiles(season_id)
                .map_err(|err| err.to_string())?;
            for tile in &tiles {
                println!(
                    "({},{}) {} owner={} image={}",
                    tile.x,
                    tile.y,
                    tile.color,
                    tile.owner_address,
                    tile.image_url.as_deref().unwrap_or("-")
                );
            }
            println!("tiles={} grid={}x{}", tiles.len(), config.grid_size, config.grid_size);
        }
        Commands::Leaderboard { communities, limit } => {
            let season_id = active_season_id(&store)?;
            let limit = limit.unwrap_or(config.leaderboard_limit);
            if communities {
                for (rank, row) in store
                    .community_standings(season_id, limit)
                    .map_err(|err| err.to_string())?
                    .iter()
                    .enumerate()
                {
                    println!(
                        "{:>3}. {} tiles={} members={} {}",
                        rank + 1,
                        row.name,
                        row.tile_count,
                        row.member_count,
                        row.reference_url
                    );
                }
            } else {
                for (rank, row) in store
                    .player_standings(season_id, limit)
                    .map_err(|err| err.to_string())?
                    .iter()
                    .enumerate()
                {
                    println!(
                        "{:>3}. {} tiles={} balance={} address={}",
                        rank + 1,
                        row.caller_id,
                        row.tile_count,
                        row.balance,
                        row.address.as_deref().unwrap_or("-")
                    );
                }
            }
        }
        Commands::Act {
            trigger,
            caller,
            address,
            input,
            state,
        } => {
            let message = ActionMessage {
                trigger: trigger.into(),
                caller_id: caller,
                caller_address: address,
                input_text: input,
                state,
            };
            let engine = GameEngine::new(store, config).map_err(|err| err.to_string())?;
            let response = engine.handle(&message);
            let rendered = serde_json::to_string_pretty(&response)
                .map_err(|err| format!("failed to render response: {err}"))?;
            println!("{rendered}");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
