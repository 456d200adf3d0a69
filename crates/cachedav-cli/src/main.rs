#![deny(unsafe_code)]

// Use mimalloc for reduced allocation latency (enabled by default).
#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod exit_code;

use std::io;
use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
#[cfg(feature = "tokio-console")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cachedav_core::{CacheDir, HybridFs};
use cachedav_webdav::{
    BasicAuth, ClientConfig, DEFAULT_PORT, DEFAULT_REMOTE_URL, HybridDav, ServerConfig,
    WebDavClient, WebDavError, WebDavServer,
};

/// WebDAV proxy serving a local cache directory in front of a remote WebDAV server
#[derive(Parser, Debug)]
#[command(name = "cachedav")]
#[command(author, version)]
#[command(after_help = "EXAMPLES:
    # Proxy the default remote with files cached under /cache
    WEBDAV_USER=me WEBDAV_PASS=secret cachedav

    # Serve on localhost only, with Basic auth in front of the proxy
    cachedav --bind 127.0.0.1 --auth-enabled --auth-user admin --auth-pass hunter2

    # Use a different remote and cache directory
    cachedav --webdav-url https://dav.example.com/remote.php/dav/ --local-path ~/cache
")]
struct Cli {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Address to bind to
    #[arg(long = "bind", env = "BIND_ADDRESS", default_value = "0.0.0.0")]
    bind_address: IpAddr,

    /// Local cache directory consulted before the remote server
    #[arg(long, env = "LOCAL_PATH", default_value = "/cache")]
    local_path: PathBuf,

    /// Require Basic authentication from clients
    #[arg(long, env = "AUTH_ENABLED")]
    auth_enabled: bool,

    /// Username clients must present
    #[arg(long, env = "AUTH_USER")]
    auth_user: Option<String>,

    /// Password clients must present
    #[arg(long, env = "AUTH_PASS", hide_env_values = true)]
    auth_pass: Option<String>,

    /// Remote WebDAV server URL
    #[arg(long, env = "WEBDAV_URL", default_value = DEFAULT_REMOTE_URL)]
    webdav_url: String,

    /// Remote WebDAV username
    #[arg(long, env = "WEBDAV_USER")]
    webdav_user: Option<String>,

    /// Remote WebDAV password
    #[arg(long, env = "WEBDAV_PASS", hide_env_values = true)]
    webdav_pass: Option<String>,

    /// Timeout for each remote request, in seconds
    #[arg(long, env = "WEBDAV_TIMEOUT_SECS", default_value_t = 60)]
    timeout_secs: u64,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Enable debug logging (same as -vv)
    #[arg(long, env = "DEBUG")]
    debug: bool,
}

impl Cli {
    /// Tracing filter directive for the requested verbosity.
    fn log_level(&self) -> &'static str {
        let level = if self.debug {
            self.verbose.max(2)
        } else {
            self.verbose
        };
        match level {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    /// Credentials the server will demand, validated.
    fn server_auth(&self) -> Result<Option<BasicAuth>> {
        if !self.auth_enabled {
            return Ok(None);
        }
        let user = self.auth_user.as_deref().unwrap_or_default();
        let pass = self.auth_pass.as_deref().unwrap_or_default();
        if user.is_empty() || pass.is_empty() {
            bail!("Authentication is enabled but AUTH_USER or AUTH_PASS is empty");
        }
        Ok(Some(BasicAuth::new(user, pass)))
    }

    fn client_config(&self) -> ClientConfig {
        ClientConfig {
            url: self.webdav_url.clone(),
            user: self.webdav_user.clone(),
            password: self.webdav_pass.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    fn server_config(&self, auth: Option<BasicAuth>) -> ServerConfig {
        ServerConfig {
            port: self.port,
            bind_address: self.bind_address,
            auth,
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::from(exit_code::SUCCESS),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(categorize_error(&e))
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.log_level());

    let auth = cli.server_auth()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(serve(&cli, auth))
}

async fn serve(cli: &Cli, auth: Option<BasicAuth>) -> Result<()> {
    let remote = WebDavClient::new(cli.client_config()).context("Invalid remote configuration")?;
    remote
        .connect()
        .await
        .with_context(|| format!("Cannot connect to {}", cli.webdav_url))?;

    let cache = CacheDir::ensure(cli.local_path.clone())
        .await
        .with_context(|| format!("Cannot create cache directory {}", cli.local_path.display()))?;

    let fs = HybridFs::new(Arc::new(cache), Arc::new(remote));
    let server = WebDavServer::start(Box::new(HybridDav::new(fs)), cli.server_config(auth))
        .await
        .with_context(|| format!("Cannot listen on {}:{}", cli.bind_address, cli.port))?;

    info!(
        url = %server.url(),
        local = %cli.local_path.display(),
        remote = %cli.webdav_url,
        "Proxy running, press Ctrl-C to stop"
    );

    shutdown_signal()
        .await
        .context("Failed to install signal handler")?;

    info!("Shutting down");
    server.stop().await;
    Ok(())
}

/// Wait for Ctrl-C (or SIGTERM on Unix).
async fn shutdown_signal() -> io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result,
            _ = terminate.recv() => Ok(()),
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await
}

/// Set up tracing/logging with the given default filter (`RUST_LOG` wins)
fn setup_tracing(filter: &str) {
    #[cfg(feature = "tokio-console")]
    {
        use std::net::SocketAddr;
        use tracing_subscriber::Layer;

        let console_port: u16 = std::env::var("TOKIO_CONSOLE_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(6669);

        let console_addr: SocketAddr = ([127, 0, 0, 1], console_port).into();
        let port_available = std::net::TcpListener::bind(console_addr).is_ok();

        let fmt_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

        if port_available {
            let console_layer = console_subscriber::ConsoleLayer::builder()
                .server_addr(console_addr)
                .spawn();
            tracing_subscriber::registry()
                .with(console_layer)
                .with(tracing_subscriber::fmt::layer().with_writer(io::stderr).with_filter(fmt_filter))
                .init();
            tracing::info!("tokio-console enabled, connect with: tokio-console http://127.0.0.1:{}", console_port);
        } else {
            tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer().with_writer(io::stderr).with_filter(fmt_filter))
                .init();
            tracing::warn!(
                "tokio-console port {} already in use, running without console instrumentation.",
                console_port
            );
        }
    }

    #[cfg(not(feature = "tokio-console"))]
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(io::stderr)
        .init();
}

/// Map an error to an exit code by looking for typed causes in its chain.
fn categorize_error(e: &anyhow::Error) -> u8 {
    let unreachable = e
        .chain()
        .any(|cause| matches!(cause.downcast_ref::<WebDavError>(), Some(WebDavError::Connect(_))));
    if unreachable {
        exit_code::REMOTE_UNREACHABLE
    } else {
        exit_code::FAILURE
    }
}
