use reqwest::Method;

use super::ApiClient;
use crate::{
    error::ApiError,
    models::{ActionAck, Alert, AlertCounts, AlertFilter},
};

impl ApiClient {
    pub async fn alerts(&self, filter: &AlertFilter) -> Result<Vec<Alert>, ApiError> {
        let mut req = self
            .get("/alerts")
            .query(&[("hours", filter.hours), ("limit", filter.limit)]);
        if let Some(status) = filter.status {
            req = req.query(&[("status", status.as_str())]);
        }
        self.json(req, "alerts").await
    }

    pub async fn active_alerts(&self) -> Result<Vec<Alert>, ApiError> {
        self.json(self.get("/alerts/active"), "active alerts").await
    }

    pub async fn alert_counts(&self) -> Result<AlertCounts, ApiError> {
        self.json(self.get("/alerts/count"), "alert counts").await
    }

    /// `active → acknowledged`. The caller refetches to observe the new state.
    pub async fn acknowledge_alert(&self, alert_id: &str) -> Result<ActionAck, ApiError> {
        self.json(
            self.request_at(Method::PATCH, &["alerts", alert_id, "acknowledge"]),
            "acknowledge alert",
        )
        .await
    }

    pub async fn resolve_alert(&self, alert_id: &str) -> Result<ActionAck, ApiError> {
        self.json(
            self.request_at(Method::PATCH, &["alerts", alert_id, "resolve"]),
            "resolve alert",
        )
        .await
    }
}
