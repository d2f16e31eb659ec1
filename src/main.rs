use std::error::Error;
use std::process::ExitCode;

use stream_bridge::config::BridgeConfig;
use stream_bridge::dispatch::{initialize_groups, shutdown, Dispatcher, ShutdownTrigger};
use stream_bridge::invoke::HttpInvoker;
use stream_bridge::store::{RedisStreamStore, StreamStore};
use tracing::{error, info, warn};
use tracing_appender::non_blocking;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine; the environment may be set directly
    let _ = dotenvy::dotenv();

    let (non_blocking, _guard) = non_blocking(std::io::stdout());
    fmt()
        .with_writer(non_blocking)
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Bridge terminated");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let config = BridgeConfig::from_env()?;
    info!(
        store = %config.store.redacted_url(),
        streams = ?config.streams,
        group = %config.group,
        consumer = %config.consumer,
        function = %config.function,
        "Starting stream bridge"
    );

    let store = RedisStreamStore::connect(&config.store).await?;
    let invoker = HttpInvoker::new(config.invoker.clone())?;

    initialize_groups(&store, &config.streams, &config.group).await?;

    for stream in &config.streams {
        match store.pending_count(stream, &config.group).await {
            Ok(0) => {}
            Ok(pending) => warn!(
                stream = %stream,
                group = %config.group,
                pending,
                "Group has messages pending from earlier deliveries"
            ),
            Err(e) => warn!(stream = %stream, error = %e, "Could not read pending count"),
        }
    }

    let (trigger, signal) = shutdown::channel();
    tokio::spawn(forward_shutdown(trigger));

    let dispatcher = Dispatcher::new(store, invoker, config.dispatch_config());
    dispatcher.run(signal).await;

    Ok(())
}

/// Trigger shutdown on Ctrl-C or SIGTERM
async fn forward_shutdown(trigger: ShutdownTrigger) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Shutdown requested");
    trigger.trigger();
}
