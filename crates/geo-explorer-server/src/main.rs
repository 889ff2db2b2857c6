//! Geo Explorer server entry point.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use geo_explorer::Layer;
use geo_explorer_server::config::{Overrides, ServerConfig};
use geo_explorer_server::state::AppState;
use geo_explorer_server::{logging, rest};

#[derive(Parser)]
#[command(
    name = "geo-explorer",
    about = "Geo Explorer: boundary GeoJSON layers with remote provider and local fallback",
    version
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Settings shared by every command. Unset values fall back to the
/// environment, then to defaults.
#[derive(Args, Default)]
struct ConfigArgs {
    /// Listen address (host:port).
    #[arg(long, global = true)]
    addr: Option<String>,

    /// Directory holding the local fallback GeoJSON files.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Cache lifetime in seconds.
    #[arg(long, global = true)]
    cache_ttl: Option<u64>,

    /// Remote fetch timeout in seconds.
    #[arg(long, global = true)]
    fetch_timeout: Option<u64>,

    /// Base URL of the remote geospatial provider.
    #[arg(long, global = true)]
    provider_url: Option<String>,

    /// Service account key file for the remote provider.
    #[arg(long, global = true)]
    credentials: Option<PathBuf>,

    /// Token required by the upload endpoint.
    /// Also reads from UPLOAD_TOKEN env var.
    #[arg(long, global = true)]
    upload_token: Option<String>,
}

impl From<ConfigArgs> for Overrides {
    fn from(args: ConfigArgs) -> Self {
        Overrides {
            addr: args.addr,
            data_dir: args.data_dir,
            cache_ttl_secs: args.cache_ttl,
            fetch_timeout_secs: args.fetch_timeout,
            provider_url: args.provider_url,
            credentials: args.credentials,
            upload_token: args.upload_token,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default).
    Serve,

    /// Resolve every layer once and report where its data came from.
    Check,

    /// Print the resolved configuration as JSON.
    Info,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   geo-explorer completions bash > ~/.local/share/bash-completion/completions/geo-explorer
    ///   geo-explorer completions zsh > ~/.zfunc/_geo-explorer
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level, cli.log_json);

    let overrides: Overrides = cli.config.into();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let config = ServerConfig::resolve(overrides)?;
            tokio::fs::create_dir_all(&config.data_dir).await?;
            let addr = config.addr.clone();
            tracing::info!("Data dir: {}", config.data_dir.display());
            let state = Arc::new(AppState::from_config(config));
            tracing::info!(
                "Remote provider available: {} ({})",
                state.resolver.provider().is_available(),
                state.resolver.provider().status()
            );
            rest::serve(&addr, state).await?;
        }

        Commands::Check => {
            let config = ServerConfig::resolve(overrides)?;
            let state = AppState::from_config(config);
            let mut missing = 0;
            for layer in Layer::ALL {
                match state.resolver.resolve(layer, false).await {
                    Ok(fc) => {
                        let source = state
                            .resolver
                            .cache()
                            .entry(layer)
                            .source
                            .map_or("cache", |s| s.as_str());
                        println!("{layer:<14} ok   {:>6} features ({source})", fc.len());
                    }
                    Err(e) => {
                        missing += 1;
                        println!("{layer:<14} FAIL {e}");
                    }
                }
            }
            if missing > 0 {
                std::process::exit(1);
            }
        }

        Commands::Info => {
            let config = ServerConfig::resolve(overrides)?;
            let layers: Vec<_> = config
                .catalog
                .iter()
                .map(|(layer, source)| {
                    serde_json::json!({
                        "layer": layer,
                        "asset_id": source.asset_id,
                        "local_path": source.local_path,
                    })
                })
                .collect();
            let info = serde_json::json!({
                "addr": config.addr,
                "data_dir": config.data_dir,
                "cache_ttl_seconds": config.cache_ttl.as_secs(),
                "fetch_timeout_seconds": config.fetch_timeout.as_secs(),
                "provider_url": config.provider_url,
                "credentials": config.credentials,
                "upload_token_set": config.upload_token.is_some(),
                "layers": layers,
            });
            println!("{}", serde_json::to_string_pretty(&info)?);
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "geo-explorer", &mut std::io::stdout());
        }
    }

    Ok(())
}
