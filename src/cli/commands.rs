use crate::config::Config;
use crate::handlers::Services;
use crate::logging::{self, LogFormat};
use crate::registry::build_dispatcher;
use crate::runtime_config::RuntimeConfig;
use crate::server::{AppService, HttpServer, ServerHandle, ServerOptions};
use crate::static_files::StaticFiles;
use crate::tls::ListenerConfig;
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Keys whose values are never printed.
const SECRET_KEYS: [(&str, &str); 2] = [("postgresql", "password"), ("https", "key")];

/// Command-line interface for the forum server
#[derive(Parser)]
#[command(name = "forumd")]
#[command(about = "Self-hosted forum backend", long_about = None, version)]
pub struct Cli {
    /// Custom configuration file, overlaid on the built-in defaults
    #[arg(long, global = true, env = "FORUMD_CONFIG", default_value = "config.json")]
    pub config: PathBuf,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// The subcommand to execute (default: serve)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the server
    Serve(ServeArgs),
    /// List the registered API routes
    Routes,
    /// Print the merged configuration
    Config,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ServeArgs {
    /// Directory holding `data/` and `assets/`
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Directory of the frontend bundle
    #[arg(long, default_value = "web")]
    pub web_dir: PathBuf,
}

impl Default for ServeArgs {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            web_dir: PathBuf::from("web"),
        }
    }
}

/// Parse the command line and run the selected command.
///
/// # Errors
///
/// Returns an error if:
/// - The configuration file exists but cannot be read or parsed
/// - The TLS certificate or key cannot be loaded
/// - The listen address cannot be bound
pub fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_format)?;
    let config = Config::load(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;

    match cli.command.unwrap_or(Commands::Serve(ServeArgs::default())) {
        Commands::Serve(args) => {
            RuntimeConfig::from_env().apply();
            let handle = serve(&config, &args)?;
            wait_for_shutdown(handle)
        }
        Commands::Routes => {
            let services = Arc::new(Services::from_config(&config)?);
            let dispatcher = build_dispatcher(&services);
            for route in dispatcher.registry().routes() {
                println!("GET|POST {route}");
            }
            Ok(())
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&redacted(&config))?);
            Ok(())
        }
    }
}

/// Assemble the application from `config` and start listening.
///
/// # Errors
///
/// Fails on invalid settings, TLS material that cannot be loaded, or a
/// bind failure.
pub fn serve(config: &Config, args: &ServeArgs) -> anyhow::Result<ServerHandle> {
    info!(
        host = %config.get("postgresql", "host"),
        port = %config.get("postgresql", "port"),
        database = %config.get("postgresql", "database"),
        "No database collaborator mounted, users are kept in memory"
    );
    let services = Arc::new(Services::from_config(config).context("configuring password hashing")?);
    let dispatcher = Arc::new(build_dispatcher(&services));
    let service = AppService::new(
        dispatcher,
        StaticFiles::data(&args.root),
        Some(StaticFiles::web(&args.web_dir)),
    );

    let listener = ListenerConfig::from_config(config);
    let tls = listener
        .server_config()
        .context("loading TLS certificate and key")?;
    let timeout_secs = config.get_u64_or("http", "timeout_secs", 30);
    let options = ServerOptions {
        tls,
        timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
    };

    let handle = HttpServer(service)
        .start(listener.bind_address(), options)
        .with_context(|| format!("binding {}", listener.bind_address()))?;
    info!(url = %listener.display_url(), "forumd listening");
    Ok(handle)
}

#[cfg(unix)]
fn wait_for_shutdown(handle: ServerHandle) -> anyhow::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("installing signal handlers")?;
    if let Some(signal) = signals.forever().next() {
        info!(signal = signal, "Shutdown requested");
    }
    handle.stop();
    Ok(())
}

#[cfg(not(unix))]
fn wait_for_shutdown(handle: ServerHandle) -> anyhow::Result<()> {
    handle
        .join()
        .map_err(|e| anyhow::anyhow!("server failed: {e:?}"))
}

/// Configuration as a JSON object with secret values masked.
pub(crate) fn redacted(config: &Config) -> Value {
    let mut out = Map::new();
    for (section, entries) in config.sections() {
        let mut obj = Map::new();
        for (key, value) in entries {
            let secret = SECRET_KEYS.contains(&(section.as_str(), key.as_str()));
            let shown = if secret && !value.is_empty() { "***" } else { value.as_str() };
            obj.insert(key.clone(), Value::String(shown.to_string()));
        }
        out.insert(section.clone(), Value::Object(obj));
    }
    Value::Object(out)
}
