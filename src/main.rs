use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use sonohub::api;
use sonohub::scheduler;
use sonohub::settings;
use sonohub::state::AppState;

#[derive(Parser)]
#[command(name = "sonohub", version, about = "Local API hub for Sonos speakers")]
struct Args {
    /// Directory holding settings, macros and other persisted state.
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Override the API port from settings.
    #[arg(long)]
    port: Option<u16>,

    /// Override the port of the supervised command server.
    #[arg(long)]
    bridge_port: Option<u16>,

    /// Override the command server executable.
    #[arg(long)]
    bridge_executable: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    std::fs::create_dir_all(&args.data_dir)
        .with_context(|| format!("failed to create data dir {}", args.data_dir.display()))?;

    let mut app_settings = settings::load_or_default(&args.data_dir);
    if let Some(port) = args.port {
        app_settings.port = port;
    }
    if let Some(port) = args.bridge_port {
        app_settings.bridge_port = port;
    }
    if let Some(executable) = args.bridge_executable {
        app_settings.bridge_executable = executable;
    }

    let state = Arc::new(AppState::new(app_settings.clone()));

    // Bring the command server up and warm the discovery cache without
    // blocking API startup; commands started before this finishes do their
    // own ensure-running dance.
    let warmup = state.clone();
    tokio::spawn(async move {
        if !warmup.supervisor.start().await {
            log::warn!("command server did not start; will retry on first command");
            return;
        }
        if let Err(e) = warmup.discovery.discover(true).await {
            log::warn!("initial speaker discovery failed: {e}");
        }
    });

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let scheduler_handle = scheduler::spawn_refresh_scheduler(
        state.catalog.clone(),
        app_settings.library_refresh_hour,
        shutdown_rx,
    );

    let addr = format!("{}:{}", app_settings.host, app_settings.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    log::info!("listening on http://{addr}");

    axum::serve(listener, api::router(state.clone()))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            log::info!("shutdown signal received");
        })
        .await
        .context("API server error")?;

    // Scheduler first so no refresh starts mid-teardown, then the child
    let _ = shutdown_tx.send(true);
    let _ = scheduler_handle.await;
    state.supervisor.stop().await;
    log::info!("shut down cleanly");
    Ok(())
}
