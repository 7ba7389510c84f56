//! ML, multi-zone, external data, analytics, smart-alert and system-health
//! endpoints under `/api`. These return analytics-shaped documents whose
//! layout is owned by the backend, so most are surfaced as JSON values.

use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;

use super::ApiClient;
use crate::{
    error::ApiError,
    models::{ActionAck, AlertPriority, SmartAlert},
};

/// Coordinates used when the caller has no site of its own.
pub const DEFAULT_LATITUDE: f64 = 12.9716;
pub const DEFAULT_LONGITUDE: f64 = 77.5946;

#[derive(Deserialize)]
struct SmartAlertList {
    alerts: Vec<SmartAlert>,
}

impl ApiClient {
    // -- ML ------------------------------------------------------------------

    pub async fn fire_risk_prediction(&self, hours_ahead: u32) -> Result<Value, ApiError> {
        self.json(
            self.get("/api/predictions/fire-risk")
                .query(&[("hours_ahead", hours_ahead)]),
            "fire risk prediction",
        )
        .await
    }

    /// Retrain the risk model. The backend restricts this to admins.
    pub async fn train_model(&self) -> Result<Value, ApiError> {
        self.json(self.post("/api/ml/train"), "model training").await
    }

    pub async fn ml_status(&self) -> Result<Value, ApiError> {
        self.json(self.get("/api/ml/status"), "ML status").await
    }

    pub async fn feature_importance(&self) -> Result<Value, ApiError> {
        self.json(self.get("/api/ml/feature-importance"), "feature importance")
            .await
    }

    // -- Zones ---------------------------------------------------------------

    pub async fn zones(&self) -> Result<Value, ApiError> {
        self.json(self.get("/api/zones"), "zones").await
    }

    pub async fn zone_heatmap(&self) -> Result<Value, ApiError> {
        self.json(self.get("/api/zones/heatmap"), "zone heatmap").await
    }

    pub async fn zone_comparison(&self) -> Result<Value, ApiError> {
        self.json(self.get("/api/zones/comparison"), "zone comparison")
            .await
    }

    pub async fn fire_spread(&self, zone_id: &str) -> Result<Value, ApiError> {
        self.json(
            self.request_at(Method::GET, &["api", "zones", zone_id, "fire-spread"]),
            "fire spread",
        )
        .await
    }

    pub async fn activate_zone_sprinklers(&self, zone_id: &str) -> Result<Value, ApiError> {
        self.json(
            self.request_at(Method::POST, &["api", "zones", zone_id, "activate-sprinklers"]),
            "zone sprinkler activation",
        )
        .await
    }

    pub async fn sensor_nodes(&self) -> Result<Value, ApiError> {
        self.json(self.get("/api/nodes"), "sensor nodes").await
    }

    // -- External data -------------------------------------------------------

    pub async fn current_weather(&self, latitude: f64, longitude: f64) -> Result<Value, ApiError> {
        self.json(
            self.get("/api/weather/current")
                .query(&[("latitude", latitude), ("longitude", longitude)]),
            "current weather",
        )
        .await
    }

    pub async fn weather_forecast(
        &self,
        latitude: f64,
        longitude: f64,
        days: u32,
    ) -> Result<Value, ApiError> {
        self.json(
            self.get("/api/weather/forecast")
                .query(&[("latitude", latitude), ("longitude", longitude)])
                .query(&[("days", days)]),
            "weather forecast",
        )
        .await
    }

    pub async fn fire_hotspots(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: u32,
    ) -> Result<Value, ApiError> {
        self.json(
            self.get("/api/satellite/fire-hotspots")
                .query(&[("latitude", latitude), ("longitude", longitude)])
                .query(&[("radius_km", radius_km)]),
            "fire hotspots",
        )
        .await
    }

    pub async fn location_info(&self) -> Result<Value, ApiError> {
        self.json(self.get("/api/external/location"), "location info")
            .await
    }

    /// Risk analysis that folds weather and satellite data into the latest reading.
    pub async fn enhanced_risk(&self) -> Result<Value, ApiError> {
        self.json(self.post("/api/analysis/enhanced-risk"), "enhanced risk")
            .await
    }

    // -- Analytics -----------------------------------------------------------

    pub async fn analytics_trends(&self, metric: &str) -> Result<Value, ApiError> {
        self.json(
            self.get("/api/analytics/trends").query(&[("metric", metric)]),
            "analytics trends",
        )
        .await
    }

    pub async fn analytics_patterns(&self) -> Result<Value, ApiError> {
        self.json(self.get("/api/analytics/patterns"), "analytics patterns")
            .await
    }

    pub async fn analytics_insights(&self) -> Result<Value, ApiError> {
        self.json(self.get("/api/analytics/insights"), "analytics insights")
            .await
    }

    pub async fn analytics_forecast(&self) -> Result<Value, ApiError> {
        self.json(self.get("/api/analytics/forecast"), "analytics forecast")
            .await
    }

    pub async fn historical_comparison(&self, days_back: u32) -> Result<Value, ApiError> {
        self.json(
            self.get("/api/analytics/historical-comparison")
                .query(&[("days_back", days_back)]),
            "historical comparison",
        )
        .await
    }

    // -- Smart alerts --------------------------------------------------------

    pub async fn smart_alerts(
        &self,
        priority: Option<AlertPriority>,
    ) -> Result<Vec<SmartAlert>, ApiError> {
        let mut req = self.get("/api/alerts/active");
        if let Some(priority) = priority {
            req = req.query(&[("priority", priority.as_str())]);
        }
        let list: SmartAlertList = self.json(req, "smart alerts").await?;
        Ok(list.alerts)
    }

    pub async fn acknowledge_smart_alert(&self, alert_id: &str) -> Result<ActionAck, ApiError> {
        self.json(
            self.request_at(Method::POST, &["api", "alerts", alert_id, "acknowledge"]),
            "acknowledge smart alert",
        )
        .await
    }

    pub async fn resolve_smart_alert(&self, alert_id: &str) -> Result<ActionAck, ApiError> {
        self.json(
            self.request_at(Method::POST, &["api", "alerts", alert_id, "resolve"]),
            "resolve smart alert",
        )
        .await
    }

    pub async fn smart_alert_statistics(&self) -> Result<Value, ApiError> {
        self.json(self.get("/api/alerts/statistics"), "smart alert statistics")
            .await
    }

    // -- System --------------------------------------------------------------

    pub async fn system_health(&self) -> Result<Value, ApiError> {
        self.json(self.get("/api/system/health"), "system health").await
    }
}
