use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::info;

use super::ApiClient;
use crate::error::ApiError;

/// CSV documents the backend can export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportKind {
    SensorData,
    AiResponses,
    Alerts,
}

impl ExportKind {
    fn path(self) -> &'static str {
        match self {
            Self::SensorData => "/export/sensor-data/csv",
            Self::AiResponses => "/export/ai-responses/csv",
            Self::Alerts => "/export/alerts/csv",
        }
    }

    /// Prefix of the downloaded file name.
    pub fn file_stem(self) -> &'static str {
        match self {
            Self::SensorData => "sensor_data",
            Self::AiResponses => "ai_responses",
            Self::Alerts => "alerts",
        }
    }
}

/// Hours accepted by the export endpoints.
const MAX_EXPORT_HOURS: u32 = 720;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvExport {
    pub kind: ExportKind,
    pub bytes: Vec<u8>,
    /// `{type}_{YYYY-MM-DD}.csv`
    pub file_name: String,
}

impl CsvExport {
    pub fn file_name_for(kind: ExportKind, date: NaiveDate) -> String {
        format!("{}_{}.csv", kind.file_stem(), date.format("%Y-%m-%d"))
    }

    /// Write the export into `dir` under its file name.
    pub async fn save_in(&self, dir: impl AsRef<Path>) -> Result<PathBuf, ApiError> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(&self.file_name);
        tokio::fs::write(&path, &self.bytes).await?;
        info!(path = %path.display(), bytes = self.bytes.len(), "CSV export saved");
        Ok(path)
    }
}

impl ApiClient {
    /// Download `kind` covering the last `hours` (clamped to 1..=720).
    pub async fn export_csv(&self, kind: ExportKind, hours: u32) -> Result<CsvExport, ApiError> {
        let hours = hours.clamp(1, MAX_EXPORT_HOURS);
        let bytes = self
            .send(self.get(kind.path()).query(&[("hours", hours)]))
            .await?
            .bytes()
            .await?
            .to_vec();

        Ok(CsvExport {
            kind,
            file_name: CsvExport::file_name_for(kind, chrono::Utc::now().date_naive()),
            bytes,
        })
    }
}
