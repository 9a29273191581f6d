use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    pub merge_timeout_secs: u64,
    pub max_chunk_bytes: usize,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Resumable chunked upload engine")]
pub struct Args {
    /// Host to bind to (overrides UPLOAD_ENGINE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides UPLOAD_ENGINE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory for staged chunks and published objects (overrides UPLOAD_ENGINE_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides UPLOAD_ENGINE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Upper bound on a single merge run in seconds (overrides UPLOAD_ENGINE_MERGE_TIMEOUT_SECS)
    #[arg(long)]
    pub merge_timeout_secs: Option<u64>,

    /// Largest accepted chunk body in bytes (overrides UPLOAD_ENGINE_MAX_CHUNK_BYTES)
    #[arg(long)]
    pub max_chunk_bytes: Option<usize>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("UPLOAD_ENGINE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_env("UPLOAD_ENGINE_PORT", 3000u16)?;
        let env_storage =
            env::var("UPLOAD_ENGINE_STORAGE_DIR").unwrap_or_else(|_| "./data/uploads".into());
        let env_db = env::var("UPLOAD_ENGINE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/upload_engine.db".into());
        let env_merge_timeout = parse_env("UPLOAD_ENGINE_MERGE_TIMEOUT_SECS", 300u64)?;
        let env_max_chunk = parse_env("UPLOAD_ENGINE_MAX_CHUNK_BYTES", 16 * 1024 * 1024usize)?;

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.unwrap_or(env_db),
            merge_timeout_secs: args.merge_timeout_secs.unwrap_or(env_merge_timeout),
            max_chunk_bytes: args.max_chunk_bytes.unwrap_or(env_max_chunk),
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).context(format!("reading {}", name)),
    }
}
