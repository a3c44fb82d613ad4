use std::env;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use tutor_portal::{
    auth::provider::{AuthProvider, GoTrueClient},
    auth::roles::{InMemoryRoleCache, RoleResolver},
    config::AppConfig,
    db,
    models::Role,
    s3,
    services::maintenance::refresh_all_urls,
    state::AppState,
    storage::{ObjectStorage, S3Storage},
    store::{PgRecordStore, RecordStore},
};

const USAGE: &str =
    "Usage: maintenance <migrate | ensure-bucket | refresh-urls | create-teacher <email> <password>>";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("migrate") => migrate()?,
        Some("ensure-bucket") => ensure_bucket().await?,
        Some("refresh-urls") => refresh_urls().await?,
        Some("create-teacher") => {
            let (Some(email), Some(password)) = (args.next(), args.next()) else {
                bail!("create-teacher needs an email and a password\n{USAGE}");
            };
            create_teacher(&email, &password).await?;
        }
        Some(cmd) => {
            eprintln!("Unknown command: {cmd}\n{USAGE}");
            std::process::exit(1);
        }
        None => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn load_config() -> Result<AppConfig> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "maintenance",
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        storage_bucket = %config.storage_bucket,
        "loaded portal configuration"
    );
    Ok(config)
}

fn migrate() -> Result<()> {
    let config = load_config()?;
    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    let applied = db::run_migrations(&pool)?;
    if applied.is_empty() {
        println!("Schema is up to date.");
    } else {
        for version in &applied {
            println!("Applied migration {version}");
        }
    }
    Ok(())
}

async fn build_storage(config: &AppConfig) -> Result<S3Storage> {
    let s3_client = s3::build_client(config).await?;
    Ok(S3Storage::new(
        s3_client,
        config.storage_bucket.clone(),
        config.storage_public_url.clone(),
    ))
}

async fn ensure_bucket() -> Result<()> {
    let config = load_config()?;
    let storage = build_storage(&config).await?;
    if storage.ensure_bucket().await? {
        println!("Created bucket {}.", config.storage_bucket);
    } else {
        println!("Bucket {} already exists.", config.storage_bucket);
    }
    Ok(())
}

fn build_state(config: AppConfig, storage: S3Storage) -> Result<AppState> {
    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    let records: Arc<dyn RecordStore> = Arc::new(PgRecordStore::new(pool));
    let auth = Arc::new(GoTrueClient::from_config(&config)?);
    let roles = RoleResolver::from_config(
        &config,
        records.clone(),
        Arc::new(InMemoryRoleCache::default()),
    );
    Ok(AppState::new(config, records, Arc::new(storage), auth, roles))
}

async fn refresh_urls() -> Result<()> {
    let config = load_config()?;
    let storage = build_storage(&config).await?;
    let state = build_state(config, storage)?;

    let summary = refresh_all_urls(&state).await?;
    println!(
        "Updated {} of {} document URLs ({} failed).",
        summary.success, summary.total, summary.failed
    );
    for error in &summary.errors {
        eprintln!("  {error}");
    }
    Ok(())
}

async fn create_teacher(email: &str, password: &str) -> Result<()> {
    let config = load_config()?;
    let storage = build_storage(&config).await?;
    let state = build_state(config, storage)?;

    let user = state
        .auth
        .sign_up(
            email,
            password,
            json!({ "full_name": "Teacher", "role": Role::Teacher.as_str() }),
        )
        .await
        .context("failed to create teacher account")?;
    state
        .roles
        .assign(user.id, Role::Teacher)
        .await
        .context("teacher account created but role could not be recorded")?;

    println!("Teacher account {} created ({}).", email, user.id);
    if !state.config.is_teacher_email(email) {
        println!("Set TEACHER_EMAIL={email} to protect it from self-service deletion.");
    }
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
