//! notifyhub - web push notification server.
//!
//! This is the main binary entry point. See the `notifyhub` library for the
//! core functionality.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use notifyhub::notifications::{VapidKeys, WebPushSender};
use notifyhub::{build_router, persistence, AppState, Config, Dispatcher, JsonFileStore, SubscriptionRegistry};
use std::path::PathBuf;
use std::sync::Arc;

/// Global allocator configured per M-MIMALLOC-APPS guideline.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[command(name = "notifyhub")]
#[command(version)]
#[command(about = "Web push notification server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default)
    Serve {
        /// Port to listen on (overrides PORT)
        #[arg(long)]
        port: Option<u16>,
        /// Address to bind (overrides NOTIFYHUB_BIND)
        #[arg(long)]
        bind: Option<String>,
        /// Directory for subscriptions and generated keys (overrides NOTIFYHUB_DATA_DIR)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Generate a VAPID keypair and print it as environment variables
    VapidKeys,
}

/// Wire up the registry, dispatcher and router, then serve until shutdown.
async fn serve(config: Config) -> Result<()> {
    let vapid = Arc::new(persistence::load_or_create_vapid_keys(&config)?);
    let public_key = vapid.public_key_base64url().to_string();

    let store = JsonFileStore::new(config.subscriptions_path());
    store.init().await?;
    let registry = Arc::new(SubscriptionRegistry::new(Arc::new(store)));

    let sender = WebPushSender::new(vapid, config.vapid_subject.clone(), config.push_ttl_secs)
        .context("Failed to build push HTTP client")?;
    let dispatcher = Arc::new(
        Dispatcher::new(registry, Arc::new(sender)).with_delivery_timeout(config.delivery_timeout()),
    );

    let app = build_router(AppState::new(dispatcher, public_key.as_str()));

    let addr = config.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    log::info!("notifyhub v{} listening on {}", env!("CARGO_PKG_VERSION"), addr);
    log::info!("Data directory: {}", config.data_dir.display());
    log::info!("VAPID public key: {}", public_key);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    log::info!("Shut down cleanly");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    log::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve {
        port: None,
        bind: None,
        data_dir: None,
    }) {
        Commands::Serve {
            port,
            bind,
            data_dir,
        } => {
            let mut config = Config::load()?;
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(bind) = bind {
                config.bind_address = bind;
            }
            if let Some(data_dir) = data_dir {
                config.data_dir = data_dir;
            }
            serve(config).await?;
        }
        Commands::VapidKeys => {
            let keys = VapidKeys::generate();
            println!("PUBLIC_VAPID_KEY={}", keys.public_key_base64url());
            println!("PRIVATE_VAPID_KEY={}", keys.private_key_base64url());
        }
    }

    Ok(())
}
