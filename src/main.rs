use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

mod action;
mod commands;
mod condition;
mod config;
mod db;
mod engine;
mod error;
mod host;
mod objective;
mod quest;
mod variable;

use action::ActionStore;
use commands::{CommandSender, DataFiles};
use config::ServerConfig;
use db::Database;
use engine::QuestEngine;
use error::{QuestError, Result};
use host::{HostServices, MemoryHost};
use quest::{HotReloadEvent, ProgressUpdate, QuestEvent, QuestStore};
use variable::VariableRegistry;

#[derive(Parser, Debug)]
#[command(name = "notquests-server", about = "Quest server")]
struct Cli {
    /// Path to the server config file
    #[arg(long, default_value = "notquests.toml")]
    config: PathBuf,
}

// ============================================================================
// App State
// ============================================================================

#[derive(Clone)]
struct AppState {
    /// The engine is single-threaded; this lock is the "game thread"
    engine: Arc<Mutex<QuestEngine>>,
    /// In-memory stand-in for the game server's players and plugins
    host: Arc<MemoryHost>,
    db: Arc<Database>,
    files: DataFiles,
}

impl AppState {
    async fn new(config: &ServerConfig) -> Result<Self> {
        let files = DataFiles {
            quests: config.quests_path(),
            actions: config.actions_path(),
        };

        let quests = QuestStore::load(&files.quests)?;
        let actions = ActionStore::load(&files.actions).map_err(QuestError::Other)?;
        info!("Loaded {} quests and {} actions", quests.len(), actions.len());

        let variables = VariableRegistry::with_defaults(&config.integrations);
        let host = Arc::new(MemoryHost::new());
        let services = HostServices::memory(host.clone(), &config.integrations);
        let mut engine = QuestEngine::new(quests, actions, variables, services)?;

        let db = Database::new(&config.database_url).await?;
        let players = db.load_all_players().await?;
        info!("Loaded quest data for {} players", players.len());
        for player in players {
            engine.insert_player(player);
        }

        Ok(Self {
            engine: Arc::new(Mutex::new(engine)),
            host,
            db: Arc::new(db),
            files,
        })
    }

    /// Write every player changed since the last save
    async fn save_dirty_players(&self) -> usize {
        self.db.save_dirty_players(&self.engine).await
    }

    /// Reload quests.toml and actions.toml, keeping the old definitions on error
    async fn reload_definitions(&self) {
        let quests = match QuestStore::load(&self.files.quests) {
            Ok(quests) => quests,
            Err(e) => {
                error!("Quest reload failed: {}", e);
                return;
            }
        };
        let actions = match ActionStore::load(&self.files.actions) {
            Ok(actions) => actions,
            Err(e) => {
                error!("Action reload failed: {}", e);
                return;
            }
        };
        info!("Reloaded {} quests and {} actions", quests.len(), actions.len());
        self.engine.lock().await.replace_definitions(quests, actions);
    }
}

// ============================================================================
// HTTP Handlers - Players
// ============================================================================

#[derive(Deserialize)]
struct JoinRequest {
    name: String,
    #[serde(default)]
    uuid: Option<Uuid>,
    #[serde(default)]
    permissions: Vec<String>,
}

#[derive(Serialize)]
struct JoinResponse {
    uuid: Uuid,
}

async fn join_player(State(state): State<AppState>, Json(req): Json<JoinRequest>) -> impl IntoResponse {
    let name = req.name.trim();
    if name.is_empty() {
        return (StatusCode::BAD_REQUEST, "Player name is required").into_response();
    }

    let uuid = match req.uuid {
        Some(uuid) => state.host.add_player_with_uuid(name, uuid),
        None => state.host.add_player(name),
    };
    state.host.with_player(uuid, |p| p.permissions.extend(req.permissions));
    state.engine.lock().await.get_or_create_quest_player(uuid);

    info!("Player {} joined ({})", name, uuid);
    Json(JoinResponse { uuid }).into_response()
}

async fn leave_player(Path(uuid): Path<Uuid>, State(state): State<AppState>) -> impl IntoResponse {
    if state.host.player(uuid).is_none() {
        return StatusCode::NOT_FOUND.into_response();
    }
    state.host.set_online(uuid, false);
    {
        let mut engine = state.engine.lock().await;
        engine.handle_event(QuestEvent::Game {
            player: uuid,
            trigger_type: quest::TriggerType::Disconnect,
            world: None,
            npc_id: None,
        });
        engine.mark_dirty(uuid);
    }
    state.save_dirty_players().await;

    info!("Player {} left", uuid);
    StatusCode::NO_CONTENT.into_response()
}

#[derive(Serialize)]
struct ActiveQuestSummary {
    quest_name: String,
    completed_objectives: usize,
    total_objectives: usize,
}

#[derive(Serialize)]
struct PlayerSummary {
    uuid: Uuid,
    name: String,
    quest_points: i64,
    active_quests: Vec<ActiveQuestSummary>,
    completed_quests: Vec<String>,
    messages: Vec<String>,
}

async fn get_player(Path(uuid): Path<Uuid>, State(state): State<AppState>) -> impl IntoResponse {
    let engine = state.engine.lock().await;
    let Some(player) = engine.get_quest_player(uuid) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    Json(PlayerSummary {
        uuid,
        name: engine.host().display_name(uuid),
        quest_points: player.quest_points,
        active_quests: player
            .active_quests
            .iter()
            .map(|a| ActiveQuestSummary {
                quest_name: a.quest_name.clone(),
                completed_objectives: a.completed_count(),
                total_objectives: a.objectives.len(),
            })
            .collect(),
        completed_quests: player
            .completed_quests
            .iter()
            .map(|c| c.quest_name.clone())
            .collect(),
        messages: state.host.messages(uuid),
    })
    .into_response()
}

// ============================================================================
// HTTP Handlers - Commands and Events
// ============================================================================

#[derive(Deserialize)]
struct CommandRequest {
    /// Player name or UUID; omitted or "console" runs as the console
    #[serde(default)]
    sender: Option<String>,
    line: String,
}

#[derive(Serialize)]
struct CommandResponse {
    messages: Vec<String>,
}

fn resolve_sender(engine: &QuestEngine, sender: Option<&str>) -> Option<CommandSender> {
    match sender {
        None => Some(CommandSender::Console),
        Some(s) if s.eq_ignore_ascii_case("console") => Some(CommandSender::Console),
        Some(s) => s
            .parse::<Uuid>()
            .ok()
            .or_else(|| engine.resolve_player(s))
            .map(CommandSender::Player),
    }
}

async fn run_command(State(state): State<AppState>, Json(req): Json<CommandRequest>) -> impl IntoResponse {
    let messages = {
        let mut engine = state.engine.lock().await;
        let Some(sender) = resolve_sender(&engine, req.sender.as_deref()) else {
            return (StatusCode::NOT_FOUND, "Unknown sender").into_response();
        };
        commands::execute(&mut engine, &state.files, sender, &req.line)
    };
    state.save_dirty_players().await;

    Json(CommandResponse { messages }).into_response()
}

async fn complete_command(State(state): State<AppState>, Json(req): Json<CommandRequest>) -> impl IntoResponse {
    let engine = state.engine.lock().await;
    let Some(sender) = resolve_sender(&engine, req.sender.as_deref()) else {
        return (StatusCode::NOT_FOUND, "Unknown sender").into_response();
    };
    Json(commands::complete(&engine, sender, &req.line)).into_response()
}

#[derive(Serialize)]
struct EventResponse {
    updates: Vec<ProgressUpdate>,
}

async fn post_event(State(state): State<AppState>, Json(event): Json<QuestEvent>) -> impl IntoResponse {
    if let QuestEvent::ItemCrafted { amount, .. } | QuestEvent::ItemCollected { amount, .. } = &event {
        if *amount < 1 {
            return (StatusCode::BAD_REQUEST, "Item amount must be at least 1").into_response();
        }
    }
    let player = event.player();
    if state.host.player(player).is_none() {
        return (StatusCode::NOT_FOUND, "Player is not online").into_response();
    }

    let updates = state.engine.lock().await.handle_event(event);
    Json(EventResponse { updates }).into_response()
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().timestamp_millis()
    }))
}

// ============================================================================
// Main
// ============================================================================

fn spawn_hot_reload(state: AppState) {
    let files = vec![state.files.quests.clone(), state.files.actions.clone()];
    match QuestStore::start_file_watcher(files) {
        Ok(mut rx) => {
            tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    match event {
                        HotReloadEvent::Changed(path) => {
                            info!("Definition hot-reload: {}", path);
                            // Editors write in bursts; wait for the file to settle
                            tokio::time::sleep(Duration::from_millis(200)).await;
                            while rx.try_recv().is_ok() {}
                            state.reload_definitions().await;
                        }
                    }
                }
            });
            info!("Definition hot-reload enabled");
        }
        Err(e) => {
            warn!("Failed to start definition hot-reload: {}", e);
        }
    }
}

async fn run(config: ServerConfig) -> Result<()> {
    let state = AppState::new(&config).await?;

    if config.hot_reload {
        spawn_hot_reload(state.clone());
    }

    // Auto-save loop
    let save_state = state.clone();
    let interval_secs = config.autosave_interval_secs.max(1);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            let saved = save_state.save_dirty_players().await;
            if saved > 0 {
                info!("Auto-saved quest data for {} player(s)", saved);
            }
        }
    });

    let app = Router::new()
        .route("/health", get(health_check))
        // Players
        .route("/api/players", post(join_player))
        .route("/api/players/:uuid", get(get_player).delete(leave_player))
        // Commands
        .route("/api/command", post(run_command))
        .route("/api/complete", post(complete_command))
        // Game events
        .route("/api/events", post(post_event))
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::DELETE,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([axum::http::header::CONTENT_TYPE]),
        )
        .with_state(state.clone());

    let addr: SocketAddr = config
        .bind_address
        .parse()
        .map_err(|e| QuestError::Other(format!("Invalid bind address {}: {}", config.bind_address, e)))?;
    info!("Quest server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    info!("Shutting down, saving quest data");
    state.engine.lock().await.mark_all_dirty();
    let saved = state.save_dirty_players().await;
    info!("Saved quest data for {} player(s)", saved);
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ServerConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter)),
        )
        .init();

    if let Err(e) = run(config).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
