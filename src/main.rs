use anyhow::Result;
use axum::Router;
use gallery_server::{
    AppState, GalleryService, TokenVerifier,
    config::{AppConfig, RunMode},
    db, routes,
    services::local_store::LocalObjectStore,
};
use std::{io::ErrorKind, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config + run mode ---
    let (cfg, mode) = AppConfig::from_env_and_args()?;
    let verifier = Arc::new(TokenVerifier::new(cfg.jwt_secret.as_bytes()));

    if let RunMode::IssueToken {
        subject_id,
        email,
        ttl_hours,
    } = &mode
    {
        let token = verifier.issue_for(*subject_id, email, chrono::Duration::hours(*ttl_hours))?;
        println!("{}", token);
        return Ok(());
    }

    tracing::info!("Starting gallery-server with config: {:?}", cfg);

    // --- Ensure storage directory exists ---
    db::ensure_dir(Path::new(&cfg.storage_dir))?;

    // --- Initialize SQLite connection + schema ---
    let pool = db::connect(&cfg.database_url).await?;
    db::run_migrations(&pool).await?;

    if mode == RunMode::Migrate {
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    // --- Initialize core service ---
    let store = Arc::new(LocalObjectStore::new(
        cfg.storage_dir.clone(),
        cfg.public_base_url.clone(),
    ));
    let gallery = GalleryService::new(Arc::new(pool), store.clone());
    let state = AppState::new(gallery, verifier);

    // --- Build router ---
    let app: Router =
        routes::routes(state, &cfg.http_options()).merge(routes::asset_routes(store));

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
