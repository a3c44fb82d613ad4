use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use tutor_portal::auth::provider::GoTrueClient;
use tutor_portal::auth::roles::{InMemoryRoleCache, RoleResolver};
use tutor_portal::config::AppConfig;
use tutor_portal::db;
use tutor_portal::routes::create_router;
use tutor_portal::s3::build_client;
use tutor_portal::state::AppState;
use tutor_portal::storage::S3Storage;
use tutor_portal::store::{PgRecordStore, RecordStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "server",
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        server_host = %config.server_host,
        server_port = config.server_port,
        storage_bucket = %config.storage_bucket,
        document_url_mode = ?config.document_url_mode,
        role_source = ?config.role_source,
        auth_bypass = config.auth_bypass,
        static_dir = config.static_dir.as_deref().unwrap_or("-"),
        "loaded portal configuration"
    );
    if config.auth_bypass {
        tracing::warn!("AUTH_BYPASS is set, page access gate is disabled");
    }

    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    let records: Arc<dyn RecordStore> = Arc::new(PgRecordStore::new(pool));
    let s3_client = build_client(&config).await?;
    let storage = Arc::new(S3Storage::new(
        s3_client,
        config.storage_bucket.clone(),
        config.storage_public_url.clone(),
    ));
    let auth = Arc::new(GoTrueClient::from_config(&config)?);
    let roles = RoleResolver::from_config(
        &config,
        records.clone(),
        Arc::new(InMemoryRoleCache::default()),
    );

    let state = AppState::new(config, records, storage, auth, roles);
    let listen_addr: SocketAddr =
        format!("{}:{}", state.config.server_host, state.config.server_port).parse()?;
    let router = create_router(state);

    let listener = TcpListener::bind(listen_addr).await?;
    tracing::info!("listening on {}", listen_addr);

    axum::serve(listener, router).await?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
