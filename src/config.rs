use std::{path::PathBuf, time::Duration};

use anyhow::{bail, Context, Result};

use crate::realtime::ReconnectPolicy;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP base URL of the monitoring backend, without a trailing slash.
    pub api_url: String,
    /// Full WebSocket endpoint, e.g. `ws://localhost:8000/ws`.
    pub ws_url: String,
    /// File holding the persisted `user` and `token` values.
    pub session_file: PathBuf,
    pub reconnect: ReconnectPolicy,
    /// Number of readings kept in the live feed history.
    pub history_size: usize,
    /// Alert polling interval in seconds. `0` disables polling.
    pub alert_poll_secs: u64,
    pub request_timeout: Duration,
    /// Optional credentials used by the binary when no session is persisted.
    pub email: Option<String>,
    pub password: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let api_url = optional("FIREWATCH_API_URL", "http://localhost:8000")
            .trim_end_matches('/')
            .to_owned();
        let ws_url = match std::env::var("FIREWATCH_WS_URL") {
            Ok(raw) if !raw.trim().is_empty() => ws_endpoint(raw.trim()),
            _ => derive_ws_url(&api_url)?,
        };

        Ok(Self {
            ws_url,
            session_file: PathBuf::from(optional(
                "FIREWATCH_SESSION_FILE",
                ".firewatch/session.json",
            )),
            reconnect: ReconnectPolicy {
                delay: Duration::from_millis(
                    optional("FIREWATCH_RECONNECT_DELAY_MS", "3000")
                        .parse()
                        .context("FIREWATCH_RECONNECT_DELAY_MS must be a non-negative integer")?,
                ),
                max_attempts: optional("FIREWATCH_MAX_RECONNECT_ATTEMPTS", "5")
                    .parse()
                    .context("FIREWATCH_MAX_RECONNECT_ATTEMPTS must be a non-negative integer")?,
            },
            history_size: positive(
                "FIREWATCH_HISTORY_SIZE",
                &optional("FIREWATCH_HISTORY_SIZE", "20"),
            )?,
            alert_poll_secs: optional("FIREWATCH_ALERT_POLL_SECS", "30")
                .parse()
                .context("FIREWATCH_ALERT_POLL_SECS must be a non-negative integer")?,
            request_timeout: Duration::from_secs(positive(
                "FIREWATCH_REQUEST_TIMEOUT_SECS",
                &optional("FIREWATCH_REQUEST_TIMEOUT_SECS", "30"),
            )?),
            email: std::env::var("FIREWATCH_EMAIL").ok(),
            password: std::env::var("FIREWATCH_PASSWORD").ok(),
            api_url,
        })
    }

    /// Defaults suitable for tests and local development against `api_url`.
    pub fn local(api_url: &str) -> Result<Self> {
        let api_url = api_url.trim_end_matches('/').to_owned();
        Ok(Self {
            ws_url: derive_ws_url(&api_url)?,
            session_file: PathBuf::from(".firewatch/session.json"),
            reconnect: ReconnectPolicy::default(),
            history_size: 20,
            alert_poll_secs: 30,
            request_timeout: Duration::from_secs(30),
            email: None,
            password: None,
            api_url,
        })
    }
}

/// Map the HTTP origin onto its sibling `/ws` endpoint.
///
/// `http://host:8000` → `ws://host:8000/ws`, `https://host` → `wss://host/ws`.
/// Any path on the HTTP URL is dropped; the socket always lives at the origin.
pub fn derive_ws_url(api_url: &str) -> Result<String> {
    let (scheme, rest) = api_url
        .split_once("://")
        .with_context(|| format!("API URL must include a scheme, got: {api_url:?}"))?;
    let ws_scheme = match scheme {
        "http" => "ws",
        "https" => "wss",
        other => bail!("unsupported API URL scheme: {other:?}"),
    };
    let authority = rest.split('/').next().unwrap_or_default();
    if authority.is_empty() {
        bail!("API URL has no host: {api_url:?}");
    }
    Ok(format!("{ws_scheme}://{authority}/ws"))
}

/// Accept either a full endpoint or a bare origin (`ws://host:8000`).
fn ws_endpoint(raw: &str) -> String {
    let raw = raw.trim_end_matches('/');
    match raw.split_once("://") {
        Some((_, rest)) if !rest.contains('/') => format!("{raw}/ws"),
        _ => raw.to_owned(),
    }
}

/// Parse `raw` as a value of `key` that must be at least 1.
fn positive<T>(key: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr + PartialEq + From<u8>,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value: T = raw
        .trim()
        .parse()
        .with_context(|| format!("{key} must be a positive integer, got {raw:?}"))?;
    if value == T::from(0) {
        bail!("{key} must be a positive integer, got 0");
    }
    Ok(value)
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_ws_url_from_plain_http() {
        assert_eq!(
            derive_ws_url("http://localhost:8000").unwrap(),
            "ws://localhost:8000/ws"
        );
    }

    #[test]
    fn derive_ws_url_uses_wss_for_https_and_drops_path() {
        assert_eq!(
            derive_ws_url("https://fire.example.com/api/v1").unwrap(),
            "wss://fire.example.com/ws"
        );
    }

    #[test]
    fn derive_ws_url_rejects_unknown_scheme() {
        let err = derive_ws_url("ftp://host").unwrap_err();
        assert!(err.to_string().contains("unsupported"));
    }

    #[test]
    fn derive_ws_url_requires_scheme() {
        let err = derive_ws_url("localhost:8000").unwrap_err();
        assert!(err.to_string().contains("scheme"));
    }

    #[test]
    fn positive_rejects_zero() {
        let err = positive::<u64>("FIREWATCH_REQUEST_TIMEOUT_SECS", "0").unwrap_err();
        assert!(err.to_string().contains("FIREWATCH_REQUEST_TIMEOUT_SECS"));
        assert!(positive::<usize>("FIREWATCH_HISTORY_SIZE", "0").is_err());
    }

    #[test]
    fn positive_rejects_garbage_and_accepts_values() {
        assert!(positive::<usize>("FIREWATCH_HISTORY_SIZE", "-3").is_err());
        assert!(positive::<usize>("FIREWATCH_HISTORY_SIZE", "many").is_err());
        assert_eq!(positive::<usize>("FIREWATCH_HISTORY_SIZE", " 50 ").unwrap(), 50);
        assert_eq!(positive::<u64>("FIREWATCH_REQUEST_TIMEOUT_SECS", "30").unwrap(), 30);
    }

    #[test]
    fn ws_endpoint_appends_path_to_bare_origin() {
        assert_eq!(ws_endpoint("ws://localhost:8000"), "ws://localhost:8000/ws");
        assert_eq!(ws_endpoint("ws://localhost:8000/"), "ws://localhost:8000/ws");
        assert_eq!(ws_endpoint("wss://h/stream"), "wss://h/stream");
    }

    #[test]
    fn local_config_uses_default_reconnect_policy() {
        let config = Config::local("http://127.0.0.1:9000/").unwrap();
        assert_eq!(config.api_url, "http://127.0.0.1:9000");
        assert_eq!(config.ws_url, "ws://127.0.0.1:9000/ws");
        assert_eq!(config.reconnect.delay, Duration::from_secs(3));
        assert_eq!(config.reconnect.max_attempts, 5);
        assert_eq!(config.history_size, 20);
    }
}
