use serde_json::Value;

use super::ApiClient;
use crate::{error::ApiError, models::DashboardStats};

impl ApiClient {
    pub async fn dashboard_stats(&self) -> Result<DashboardStats, ApiError> {
        self.json(self.get("/dashboard/stats"), "dashboard stats").await
    }

    /// Time-bucketed series for the dashboard charts over the last `hours`.
    pub async fn chart_data(&self, hours: u32) -> Result<Value, ApiError> {
        self.json(
            self.get("/dashboard/chart-data").query(&[("hours", hours)]),
            "chart data",
        )
        .await
    }

    pub async fn risk_analysis(&self, limit: u32) -> Result<Value, ApiError> {
        self.json(
            self.get("/dashboard/risk-analysis").query(&[("limit", limit)]),
            "risk analysis",
        )
        .await
    }
}
