use std::{future::Future, sync::Arc, time::Duration};

use chrono::Utc;
use server::{AppState, adapters::HttpAdapterFactory, http};
use sessions::SessionStore;
use tracing_subscriber::{EnvFilter, prelude::*};

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_SESSION_TTL_SECS: u64 = 3600;
const SESSION_TTL_ENV: &str = "DEMOGEN_SESSION_TTL_SECS";

fn spawn_background<F>(task: F) -> tokio::task::JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(task)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let filter_string = format!(
        "warn,server={level},pipeline={level},sessions={level},devapi={level},genai={level}",
        level = log_level
    );
    let env_filter = EnvFilter::try_new(filter_string)?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();

    let ttl = read_ttl_secs(SESSION_TTL_ENV, DEFAULT_SESSION_TTL_SECS);
    let sessions = Arc::new(SessionStore::new(Duration::from_secs(ttl)));
    let adapters = Arc::new(HttpAdapterFactory::from_env()?);
    let state = AppState::new(sessions.clone(), adapters);

    // Finished sessions linger for the TTL so the form can fetch the final
    // snapshot and log, then get swept.
    spawn_background(async move {
        loop {
            tokio::time::sleep(SESSION_SWEEP_INTERVAL).await;
            let removed = sessions.sweep_expired(Utc::now());
            if removed > 0 {
                tracing::info!(removed, "swept expired sessions");
            }
        }
    });

    let app_router = http::router(state);

    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = std::env::var("PORT")
        .ok()
        .and_then(|raw| raw.trim().parse::<u16>().ok())
        .unwrap_or(8000);
    let listener = tokio::net::TcpListener::bind(format!("{host}:{port}")).await?;
    let actual_port = listener.local_addr()?.port();
    tracing::info!("Server running on http://{host}:{actual_port}");

    axum::serve(listener, app_router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {e}");
        return;
    }
    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

fn read_ttl_secs(name: &str, default: u64) -> u64 {
    let raw = match std::env::var(name) {
        Ok(value) => value,
        Err(_) => return default,
    };
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => value,
        _ => {
            tracing::warn!(value = raw, "Invalid {name}; using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::oneshot;

    use super::spawn_background;

    #[tokio::test]
    async fn spawn_background_returns_immediately() {
        let (tx, rx) = oneshot::channel::<()>();

        let start = std::time::Instant::now();
        let handle = spawn_background(async move {
            let _ = rx.await;
        });
        assert!(start.elapsed() < Duration::from_millis(50));

        let _ = tx.send(());
        let _ = handle.await;
    }
}
