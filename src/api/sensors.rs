use serde_json::Value;

use super::ApiClient;
use crate::{
    error::ApiError,
    models::{RecordsQuery, SensorReading, SensorRecordsPage},
};

impl ApiClient {
    pub async fn latest_reading(&self) -> Result<SensorReading, ApiError> {
        self.json(self.get("/sensors/latest"), "latest reading").await
    }

    pub async fn sensor_history(
        &self,
        hours: u32,
        limit: u32,
    ) -> Result<Vec<SensorReading>, ApiError> {
        self.json(
            self.get("/sensors/history")
                .query(&[("hours", hours), ("limit", limit)]),
            "sensor history",
        )
        .await
    }

    pub async fn sensor_statistics(&self, hours: u32) -> Result<Value, ApiError> {
        self.json(
            self.get("/sensors/statistics").query(&[("hours", hours)]),
            "sensor statistics",
        )
        .await
    }

    /// One page of stored readings, newest first.
    ///
    /// The returned page always carries the `skip`/`limit` it was requested
    /// with, so [`SensorRecordsPage::page_info`] works even when the backend
    /// omits them.
    pub async fn sensor_records(
        &self,
        query: &RecordsQuery,
    ) -> Result<SensorRecordsPage, ApiError> {
        let mut req = self
            .get("/sensors/records")
            .query(&[("skip", query.skip), ("limit", query.limit)]);
        if let Some(level) = &query.risk_level {
            req = req.query(&[("risk_level", level.as_str())]);
        }

        let mut page: SensorRecordsPage = self.json(req, "sensor records").await?;
        page.skip = query.skip;
        page.limit = query.limit;
        Ok(page)
    }

    /// Stored AI risk analyses, newest first.
    pub async fn ai_responses(&self, limit: u32) -> Result<Vec<Value>, ApiError> {
        self.json(
            self.get("/sensors/ai-responses").query(&[("limit", limit)]),
            "AI responses",
        )
        .await
    }
}
