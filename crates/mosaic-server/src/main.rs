//! Mosaic - media sharing API server

use clap::Parser;
use mosaic_server::{run_server, shutdown_signal, ObjectStoreKind, ServerConfig};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "mosaic")]
#[command(about = "API server for the Mosaic media sharing service")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "MOSAIC_CONFIG")]
    config: Option<PathBuf>,

    /// Host to bind to
    #[arg(short = 'H', long, env = "MOSAIC_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "MOSAIC_PORT")]
    port: Option<u16>,

    /// PostgreSQL URL (in-memory store when absent)
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Object store backend
    #[arg(long, value_enum, env = "MOSAIC_OBJECT_STORE")]
    object_store: Option<ObjectStoreKind>,

    /// S3 endpoint, e.g. localhost:9000
    #[arg(long, env = "MOSAIC_S3_ENDPOINT")]
    s3_endpoint: Option<String>,

    /// S3 access key
    #[arg(long, env = "MOSAIC_S3_ACCESS_KEY")]
    s3_access_key: Option<String>,

    /// S3 secret key
    #[arg(long, env = "MOSAIC_S3_SECRET_KEY", hide_env_values = true)]
    s3_secret_key: Option<String>,

    /// Use https for the S3 endpoint
    #[arg(long, env = "MOSAIC_S3_SECURE")]
    s3_secure: bool,

    /// Root directory for the filesystem object store
    #[arg(long, env = "MOSAIC_OBJECTS_ROOT")]
    objects_root: Option<PathBuf>,

    /// Base URL of public object links
    #[arg(long, env = "MOSAIC_PUBLIC_BASE_URL")]
    public_base_url: Option<String>,

    /// JWT secret for signing tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// Use a random signing secret (for development only!)
    #[arg(long, env = "MOSAIC_DEV_SECRET")]
    dev_secret: bool,

    /// Enable debug logging
    #[arg(short, long, env = "MOSAIC_DEBUG")]
    debug: bool,

    /// Log as JSON lines
    #[arg(long, env = "MOSAIC_LOG_JSON")]
    log_json: bool,
}

impl Args {
    /// Command-line values override the file and environment
    fn apply(self, config: &mut ServerConfig) {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if self.database_url.is_some() {
            config.database_url = self.database_url;
        }
        if let Some(kind) = self.object_store {
            config.object_store = kind;
        }
        if let Some(endpoint) = self.s3_endpoint {
            config.s3_endpoint = endpoint;
        }
        if let Some(key) = self.s3_access_key {
            config.s3_access_key = key;
        }
        if let Some(secret) = self.s3_secret_key {
            config.s3_secret_key = secret;
        }
        if let Some(root) = self.objects_root {
            config.objects_root = root;
        }
        if self.public_base_url.is_some() {
            config.public_base_url = self.public_base_url;
        }
        if self.jwt_secret.is_some() {
            config.jwt_secret = self.jwt_secret;
        }
        config.s3_secure |= self.s3_secure;
        config.dev_secret |= self.dev_secret;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Parse arguments
    let args = Args::parse();

    // Setup logging
    let log_level = if args.debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "mosaic_server={level},mosaic_core={level},mosaic_storage={level},tower_http=debug",
            level = log_level
        )
        .into()
    });
    let (plain, json) = if args.log_json {
        (None, Some(tracing_subscriber::fmt::layer().json()))
    } else {
        (Some(tracing_subscriber::fmt::layer()), None)
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(plain)
        .with(json)
        .init();

    // Build configuration
    let mut config = ServerConfig::load(args.config.as_deref())?;
    args.apply(&mut config);

    tracing::info!("Starting Mosaic on {}", config.bind_addr());
    tracing::info!(
        "Object store: {:?}, bucket: {}",
        config.object_store,
        config.media_bucket
    );

    if config.database_url.is_none() {
        tracing::warn!("⚠️  No database configured - data will NOT persist!");
    }

    if config.dev_secret && config.jwt_secret.is_none() {
        tracing::warn!("⚠️  Random signing secret - for development only!");
    }

    // Run the server
    run_server(config, shutdown_signal()).await
}
