//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by both CLI and the
//! HTTP/WebSocket server. The gateway and history service are generic over
//! their collaborator traits; AppState pins them to the infra implementations.

use std::path::PathBuf;
use std::sync::Arc;

use parley_core::gateway::Gateway;
use parley_core::message::HistoryService;
use parley_infra::config::{load_gateway_config, resolve_data_dir};
use parley_infra::identity::JwtIdentityService;
use parley_infra::sqlite::group::SqliteGroupDirectory;
use parley_infra::sqlite::message::SqliteMessageRepository;
use parley_infra::sqlite::pool::{DatabasePool, database_url};
use parley_infra::sqlite::user::SqliteUserRepository;
use parley_types::config::GatewayConfig;

use crate::transport::WsTransport;

/// Concrete type aliases for the service generics pinned to infra implementations.
pub type ConcreteGateway =
    Gateway<JwtIdentityService, SqliteGroupDirectory, SqliteMessageRepository, WsTransport>;

pub type ConcreteHistory = HistoryService<SqliteMessageRepository, SqliteGroupDirectory>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub gateway: Arc<ConcreteGateway>,
    pub history: Arc<ConcreteHistory>,
    pub transport: Arc<WsTransport>,
    pub identity: Arc<JwtIdentityService>,
    pub groups: Arc<SqliteGroupDirectory>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Initialize the application state: load config, connect to DB, wire services.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_gateway_config(&data_dir).await?;
        let db_pool = DatabasePool::new(&database_url(&data_dir)).await?;

        Ok(Self::with_pool(config, data_dir, db_pool))
    }

    pub fn with_pool(config: GatewayConfig, data_dir: PathBuf, db_pool: DatabasePool) -> Self {
        let identity = Arc::new(JwtIdentityService::new(
            &config.jwt_secret,
            config.token_ttl_secs,
            SqliteUserRepository::new(db_pool.clone()),
        ));
        let groups = Arc::new(SqliteGroupDirectory::new(db_pool.clone()));
        let messages = Arc::new(SqliteMessageRepository::new(db_pool.clone()));
        let transport = Arc::new(WsTransport::new(config.outbound_buffer));

        let gateway = Gateway::new(
            Arc::clone(&identity),
            Arc::clone(&groups),
            Arc::clone(&messages),
            Arc::clone(&transport),
            &config,
        );
        let history = HistoryService::new(messages, Arc::clone(&groups), &config);

        Self {
            config: Arc::new(config),
            gateway: Arc::new(gateway),
            history: Arc::new(history),
            transport,
            identity,
            groups,
            data_dir,
        }
    }

    pub fn users(&self) -> &SqliteUserRepository {
        self.identity.users()
    }
}
