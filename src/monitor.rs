use std::{collections::HashSet, time::Duration};

use tokio::time;
use tracing::{error, info, warn};

use crate::{api::ApiClient, error::ApiError, models::Alert};

/// Periodically polls active alerts and logs the ones not seen before.
pub struct AlertMonitor {
    api: ApiClient,
    interval: Duration,
    seen: HashSet<String>,
}

impl AlertMonitor {
    pub fn new(api: ApiClient, interval_secs: u64) -> Self {
        Self {
            api,
            interval: Duration::from_secs(interval_secs.max(1)),
            seen: HashSet::new(),
        }
    }

    /// Runs the polling loop indefinitely.
    /// Spawn this via `tokio::spawn`.
    pub async fn run(mut self) {
        info!(interval_secs = self.interval.as_secs(), "Alert polling started");
        let mut ticker = time::interval(self.interval);

        loop {
            ticker.tick().await;
            if !self.api.session().is_authenticated() {
                info!("No session; skipping alert poll");
                continue;
            }
            match self.run_once().await {
                Ok(_) => {}
                Err(ApiError::Unauthorized) => warn!("Alert poll rejected; waiting for a new login"),
                Err(e) => error!(error = %e, "Alert poll failed"),
            }
        }
    }

    /// Fetch active alerts once and return those that are new since the
    /// previous poll.
    pub async fn run_once(&mut self) -> Result<Vec<Alert>, ApiError> {
        let alerts = self.api.active_alerts().await?;
        let fresh = self.track(alerts);

        for alert in &fresh {
            warn!(
                id = %alert.id,
                severity = %alert.severity,
                title = %alert.title,
                "New active alert"
            );
        }
        Ok(fresh)
    }

    /// Remember the currently active set and return the newcomers. Alerts that
    /// left the active set are forgotten so a re-raised alert is reported again.
    fn track(&mut self, alerts: Vec<Alert>) -> Vec<Alert> {
        let current: HashSet<String> = alerts.iter().map(|a| a.id.clone()).collect();
        let fresh = alerts
            .into_iter()
            .filter(|a| !self.seen.contains(&a.id))
            .collect();
        self.seen = current;
        fresh
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use super::*;
    use crate::{
        api::LogRedirect,
        config::Config,
        models::{AlertStatus, RiskLevel},
        session::{MemoryStorage, SessionStore},
    };

    fn alert(id: &str) -> Alert {
        Alert {
            id: id.into(),
            title: "Smoke".into(),
            message: "Smoke level high".into(),
            severity: RiskLevel::High,
            status: AlertStatus::Active,
            timestamp: Utc::now(),
        }
    }

    fn monitor() -> AlertMonitor {
        let config = Config::local("http://127.0.0.1:9").unwrap();
        let session = SessionStore::new(Arc::new(MemoryStorage::new()));
        let api = ApiClient::new(&config, session, Arc::new(LogRedirect)).unwrap();
        AlertMonitor::new(api, 0)
    }

    #[test]
    fn zero_interval_is_clamped() {
        assert_eq!(monitor().interval, Duration::from_secs(1));
    }

    #[test]
    fn reports_each_alert_once_while_active() {
        let mut m = monitor();
        let first = m.track(vec![alert("a"), alert("b")]);
        assert_eq!(first.len(), 2);

        let second = m.track(vec![alert("a"), alert("b"), alert("c")]);
        assert_eq!(second.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(), vec!["c"]);
    }

    #[test]
    fn re_raised_alert_is_reported_again() {
        let mut m = monitor();
        m.track(vec![alert("a")]);
        m.track(vec![]);
        assert_eq!(m.track(vec![alert("a")]).len(), 1);
    }
}
