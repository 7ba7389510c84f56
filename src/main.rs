use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use firewatch_client::{
    models::Credentials,
    realtime::RealtimeConfig,
    AlertMonitor, ApiClient, CloseReason, Config, FileStorage, LiveFeed, LogRedirect, RealtimeClient,
    SessionStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env (ignore error if file absent; env vars may be set externally)
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    info!(api_url = %config.api_url, ws_url = %config.ws_url, "Configuration loaded");

    // Restore the persisted session before anything talks to the backend
    let session = SessionStore::new(Arc::new(FileStorage::new(config.session_file.clone())));
    info!(file = %config.session_file.display(), "Using session file");
    session.hydrate();

    let api = ApiClient::new(&config, session.clone(), Arc::new(LogRedirect))
        .context("failed to build HTTP client")?;

    if !session.is_authenticated() {
        if let (Some(email), Some(password)) = (&config.email, &config.password) {
            let credentials = Credentials {
                username: email.clone(),
                password: password.clone(),
            };
            match api.login(&credentials).await {
                Ok(user) => info!(email = %user.email, role = %user.role, "Logged in"),
                Err(e) => warn!(error = %e, "Login failed; continuing without a session"),
            }
        }
    }

    // Realtime feed: subscribe before starting so the first frame is not missed
    let realtime = RealtimeClient::new(RealtimeConfig::from(&config));
    let mut updates = realtime.sensor_updates();
    realtime.start();

    {
        let feed = LiveFeed::new(config.history_size);
        tokio::spawn(async move {
            while let Some(update) = updates.recv().await {
                let snapshot = feed.push(&update).await;
                let reading = &update.reading;
                info!(
                    temperature = reading.temperature,
                    humidity = reading.humidity,
                    smoke_level = reading.smoke_level,
                    rain_detected = reading.rain_detected,
                    risk_score = ?reading.fire_risk_score,
                    trend = ?snapshot.risk_trend(),
                    "Sensor update"
                );
                if let Some(rec) = update.recommendation() {
                    info!(
                        risk_level = %rec.risk_level,
                        sprinkler = rec.should_activate_sprinkler,
                        recommendations = ?rec.recommendations,
                        "AI recommendation"
                    );
                }
            }
        });
    }

    if config.alert_poll_secs > 0 {
        let monitor = AlertMonitor::new(api.clone(), config.alert_poll_secs);
        tokio::spawn(monitor.run());
    }

    tokio::select! {
        _ = shutdown_signal() => {}
        reason = realtime.closed() => return feed_outcome(reason),
    }

    realtime.disconnect().await;
    info!("Realtime client stopped");

    Ok(())
}

/// The realtime feed only closes on its own when it runs out of reconnects,
/// which leaves the process without live data.
fn feed_outcome(reason: CloseReason) -> Result<()> {
    match reason {
        CloseReason::RetriesExhausted => {
            error!("Realtime feed lost; reconnect attempts exhausted");
            bail!("realtime connection could not be re-established")
        }
        CloseReason::Requested => {
            info!("Realtime client stopped");
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_feed_is_an_error() {
        let err = feed_outcome(CloseReason::RetriesExhausted).unwrap_err();
        assert!(err.to_string().contains("re-established"));
    }

    #[test]
    fn requested_close_is_clean() {
        assert!(feed_outcome(CloseReason::Requested).is_ok());
    }
}
