use anyhow::{Context, Result, bail};
use clap::Parser;
use std::{env, fmt};

use crate::routes::{HttpOptions, routes::DEFAULT_MAX_UPLOAD_BYTES};

const DEFAULT_CORS_ORIGIN: &str = "http://localhost:5173";

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub public_base_url: String,
    pub max_upload_bytes: usize,
    pub cors_origin: Option<String>,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("storage_dir", &self.storage_dir)
            .field("database_url", &self.database_url)
            .field("jwt_secret", &"<redacted>")
            .field("public_base_url", &self.public_base_url)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("cors_origin", &self.cors_origin)
            .finish()
    }
}

/// What the process should do after configuration is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    Serve,
    Migrate,
    IssueToken {
        subject_id: i64,
        email: String,
        ttl_hours: i64,
    },
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Drawing gallery API")]
pub struct Args {
    /// Host to bind to (overrides GALLERY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides GALLERY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where uploaded images are stored (overrides GALLERY_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides GALLERY_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// HMAC secret for bearer tokens (overrides GALLERY_JWT_SECRET)
    #[arg(long)]
    pub jwt_secret: Option<String>,

    /// Origin used when building image references (overrides GALLERY_PUBLIC_BASE_URL)
    #[arg(long)]
    pub public_base_url: Option<String>,

    /// Maximum upload request size in bytes (overrides GALLERY_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Allowed browser origin, empty to disable CORS (overrides GALLERY_CORS_ORIGIN)
    #[arg(long)]
    pub cors_origin: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,

    /// Print a bearer token for this user id and exit
    #[arg(long, value_name = "SUBJECT_ID")]
    pub issue_token: Option<i64>,

    /// Email embedded in an issued token
    #[arg(long, default_value = "dev@localhost")]
    pub email: String,

    /// Lifetime of an issued token in hours
    #[arg(long, default_value_t = 24)]
    pub ttl_hours: i64,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and run mode.
    pub fn from_env_and_args() -> Result<(Self, RunMode)> {
        Self::from_args(Args::parse())
    }

    pub fn from_args(args: Args) -> Result<(Self, RunMode)> {
        // --- Environment fallback ---
        let env_host = env::var("GALLERY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_env("GALLERY_PORT", 8080u16)?;
        let env_storage =
            env::var("GALLERY_STORAGE_DIR").unwrap_or_else(|_| "./data/objects".into());
        let env_db = env::var("GALLERY_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/gallery.db".into());
        let env_max_upload = parse_env("GALLERY_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;

        // --- Merge ---
        let host = args.host.unwrap_or(env_host);
        let port = args.port.unwrap_or(env_port);

        let jwt_secret = args
            .jwt_secret
            .or_else(|| env::var("GALLERY_JWT_SECRET").ok())
            .unwrap_or_default();
        if jwt_secret.trim().is_empty() {
            bail!("GALLERY_JWT_SECRET not set");
        }

        let public_base_url = args
            .public_base_url
            .or_else(|| env::var("GALLERY_PUBLIC_BASE_URL").ok())
            .unwrap_or_else(|| default_public_base_url(&host, port));

        let cors_origin = args
            .cors_origin
            .or_else(|| env::var("GALLERY_CORS_ORIGIN").ok())
            .unwrap_or_else(|| DEFAULT_CORS_ORIGIN.into());

        let cfg = Self {
            host,
            port,
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.unwrap_or(env_db),
            jwt_secret,
            public_base_url,
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_max_upload),
            cors_origin: Some(cors_origin).filter(|o| !o.trim().is_empty()),
        };

        let mode = match args.issue_token {
            Some(subject_id) => RunMode::IssueToken {
                subject_id,
                email: args.email,
                ttl_hours: args.ttl_hours,
            },
            None if args.migrate => RunMode::Migrate,
            None => RunMode::Serve,
        };

        Ok((cfg, mode))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn http_options(&self) -> HttpOptions {
        HttpOptions {
            max_upload_bytes: self.max_upload_bytes,
            cors_origin: self.cors_origin.clone(),
        }
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}

/// Wildcard binds are not reachable addresses; point clients at localhost instead.
fn default_public_base_url(host: &str, port: u16) -> String {
    match host {
        "0.0.0.0" | "::" => format!("http://localhost:{}", port),
        other => format!("http://{}:{}", other, port),
    }
}
