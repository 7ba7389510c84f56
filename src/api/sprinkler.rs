use serde_json::Value;
use tracing::info;

use super::ApiClient;
use crate::{
    error::ApiError,
    models::{SprinklerCommandAck, SprinklerMode, SprinklerState},
};

impl ApiClient {
    pub async fn sprinkler_status(&self) -> Result<SprinklerState, ApiError> {
        self.json(self.get("/sprinkler/status"), "sprinkler status").await
    }

    pub async fn sprinkler_history(&self, limit: u32) -> Result<Vec<Value>, ApiError> {
        self.json(
            self.get("/sprinkler/history").query(&[("limit", limit)]),
            "sprinkler history",
        )
        .await
    }

    /// Manual override. `reason` is recorded in the backend's control log.
    pub async fn control_sprinkler(
        &self,
        mode: SprinklerMode,
        reason: Option<&str>,
    ) -> Result<SprinklerCommandAck, ApiError> {
        info!(mode = mode.as_str(), reason = ?reason, "Sending sprinkler command");
        let mut req = self
            .post("/sprinkler/control")
            .query(&[("action", mode.as_str())]);
        if let Some(reason) = reason {
            req = req.query(&[("reason", reason)]);
        }
        self.json(req, "sprinkler control").await
    }

    /// Hand control back to the backend's automatic mode.
    pub async fn sprinkler_auto(&self) -> Result<SprinklerCommandAck, ApiError> {
        info!("Setting sprinkler to automatic mode");
        self.json(self.post("/sprinkler/auto"), "sprinkler auto").await
    }
}
