//! Top-level wiring: one struct that owns every shared component and
//! exposes a single `run` entry point, going straight from a
//! `ServerConfig` to a running server — there is only ever one game here,
//! so no generic runtime/hook registration step is needed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::config::ServerConfig;
use crate::delta::DeltaTracker;
use crate::error::ServerError;
use crate::message::types;
use crate::room::RoomRegistry;
use crate::schema::SchemaRegistry;
use crate::scheduler::{run_broadcast_tick, run_match_timer_tick, Scheduler};
use crate::session::SessionManager;
use crate::transport::ws;

const REQUIRED_SCHEMAS: &[&str] = &[
    types::INPUT_STATE,
    types::PLAYER_SHOOT,
    types::PLAYER_RELOAD,
    types::PLAYER_MELEE_ATTACK,
    types::PLAYER_ROLL,
    types::WEAPON_PICKUP_ATTEMPT,
];

fn schema_names() -> Vec<String> {
    REQUIRED_SCHEMAS.iter().map(|t| format!("{t}-data")).collect()
}

pub struct ArenaServer {
    config: Arc<ServerConfig>,
    registry: Arc<RwLock<RoomRegistry>>,
    sessions: Arc<SessionManager>,
    schemas: Arc<SchemaRegistry>,
}

impl ArenaServer {
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let required = schema_names();
        let required_refs: Vec<&str> = required.iter().map(String::as_str).collect();
        let schemas = SchemaRegistry::load(&config.schema_dir, &required_refs)?;

        Ok(Self {
            sessions: Arc::new(SessionManager::new(config.outbound_queue_capacity)),
            schemas: Arc::new(schemas),
            registry: Arc::new(RwLock::new(RoomRegistry::new())),
            config: Arc::new(config),
        })
    }

    /// Starts the simulation thread and the broadcast / match-timer tasks,
    /// then runs the WebSocket accept loop until the process is killed.
    pub async fn run(self, addr: &str) -> Result<(), ServerError> {
        let mut scheduler =
            Scheduler::start_simulation(Arc::clone(&self.registry), Arc::clone(&self.sessions), Arc::clone(&self.config));

        let trackers: Arc<Mutex<HashMap<crate::room::RoomId, DeltaTracker>>> =
            Arc::new(Mutex::new(HashMap::new()));

        let broadcast_registry = Arc::clone(&self.registry);
        let broadcast_sessions = Arc::clone(&self.sessions);
        let broadcast_config = Arc::clone(&self.config);
        let broadcast_trackers = Arc::clone(&trackers);
        let broadcast_tick = self.config.broadcast_tick;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(broadcast_tick);
            loop {
                interval.tick().await;
                run_broadcast_tick(&broadcast_registry, &broadcast_sessions, &broadcast_config, &broadcast_trackers);
            }
        });

        let timer_registry = Arc::clone(&self.registry);
        let timer_sessions = Arc::clone(&self.sessions);
        let match_timer_tick = self.config.match_timer_tick;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(match_timer_tick);
            loop {
                interval.tick().await;
                run_match_timer_tick(&timer_registry, &timer_sessions);
            }
        });

        let result = ws::run(addr, self.registry, self.sessions, self.schemas, self.config, trackers).await;
        scheduler.shutdown();
        result
    }
}
