/**
 * Server Initialization
 *
 * Builds the application state and router from a `ServerConfig`.
 *
 * # Initialization Process
 *
 * 1. Pick persistence: Postgres when `DATABASE_URL` is set and reachable,
 *    otherwise the in-memory store
 * 2. Build the lease manager, room hub, board service and realtime service
 * 3. Start the maintenance task (presence sweep, typing expiry, lease purge)
 * 4. Create the router
 */

use crate::backend::auth::JwtKeys;
use crate::backend::board::BoardService;
use crate::backend::locks::{LeaseStore, LockManager, MemoryLeaseStore, PgLeaseStore};
use crate::backend::realtime::{MemoryPresenceStore, PresenceSettings, RealtimeService, RoomHub};
use crate::backend::routes::create_router;
use crate::backend::server::config::ServerConfig;
use crate::backend::server::state::AppState;
use crate::backend::store::{BoardStore, MemoryStore, PgStore, StoreError};
use axum::Router;
use std::sync::Arc;

/// Board and lease storage backing one server
#[derive(Clone)]
pub struct Persistence {
    pub store: Arc<dyn BoardStore>,
    pub leases: Arc<dyn LeaseStore>,
}

impl Persistence {
    pub fn memory() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            leases: Arc::new(MemoryLeaseStore::new()),
        }
    }

    pub async fn postgres(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let store = PgStore::connect(database_url, max_connections).await?;
        store.migrate().await?;
        let leases = PgLeaseStore::new(store.pool().clone());
        Ok(Self {
            store: Arc::new(store),
            leases: Arc::new(leases),
        })
    }

    /// Resolve persistence from the configuration
    ///
    /// A configured database that cannot be reached or migrated is logged and
    /// replaced by the in-memory store so the server still starts.
    pub async fn from_config(config: &ServerConfig) -> Self {
        let Some(url) = config.database_url.as_deref() else {
            tracing::info!("[Store] DATABASE_URL not set, using in-memory store");
            return Self::memory();
        };
        match Self::postgres(url, config.max_connections).await {
            Ok(persistence) => persistence,
            Err(e) => {
                tracing::warn!("[Store] Failed to initialize database: {:?}", e);
                tracing::warn!("[Store] Falling back to in-memory store, data will not survive a restart");
                Self::memory()
            }
        }
    }
}

/// Assemble the application state on top of `persistence`
pub fn build_state(config: ServerConfig, persistence: Persistence) -> AppState {
    if config.uses_dev_secret() {
        tracing::warn!("JWT_SECRET not set, using the development secret");
    }

    let hub = RoomHub::new(config.connection_buffer);
    let locks = LockManager::new(persistence.leases, config.lock_ttl());
    let boards = BoardService::new(
        persistence.store,
        locks,
        config.access_policy.build(),
        hub.clone(),
    );
    let realtime = RealtimeService::new(
        hub,
        Arc::new(MemoryPresenceStore::new()),
        boards.clone(),
        PresenceSettings {
            presence_ttl: config.presence_ttl(),
            typing_ttl: config.typing_ttl(),
        },
    );
    let jwt = Arc::new(JwtKeys::new(&config.jwt_secret));

    AppState {
        config: Arc::new(config),
        boards,
        realtime,
        jwt,
    }
}

/// Create and configure the Axum application
///
/// Must be called inside a Tokio runtime; the maintenance task is spawned
/// onto it and lives as long as the runtime.
pub async fn create_app(config: ServerConfig) -> Router<()> {
    tracing::info!("Initializing boardsync server");

    let persistence = Persistence::from_config(&config).await;
    let state = build_state(config, persistence);

    state
        .realtime
        .spawn_maintenance(state.config.sweep_interval());
    tracing::info!(
        "Maintenance task started (every {}s)",
        state.config.sweep_interval_secs
    );

    create_router(state)
}
