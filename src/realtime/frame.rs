use serde::Deserialize;
use serde_json::Value;

use crate::{error::FrameError, models::SensorUpdate};

pub const SENSOR_UPDATE: &str = "sensor_update";

/// Wire shape of every inbound frame: `{"type": "...", "data": {...}}`.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

/// Inbound frame after validation at the socket boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    SensorUpdate { data: Value, update: Box<SensorUpdate> },
    /// A frame type this client has no typed model for. Raw subscribers of
    /// `kind` still receive `data`.
    Other { kind: String, data: Value },
}

impl Frame {
    pub fn kind(&self) -> &str {
        match self {
            Frame::SensorUpdate { .. } => SENSOR_UPDATE,
            Frame::Other { kind, .. } => kind,
        }
    }

    pub fn data(&self) -> &Value {
        match self {
            Frame::SensorUpdate { data, .. } | Frame::Other { data, .. } => data,
        }
    }
}

pub fn parse(text: &str) -> Result<Frame, FrameError> {
    let envelope: Envelope = serde_json::from_str(text).map_err(FrameError::Json)?;
    match envelope.kind.as_str() {
        SENSOR_UPDATE => {
            let update = SensorUpdate::deserialize(&envelope.data).map_err(|source| {
                FrameError::Payload {
                    kind: SENSOR_UPDATE,
                    source,
                }
            })?;
            Ok(Frame::SensorUpdate {
                data: envelope.data,
                update: Box::new(update),
            })
        }
        _ => Ok(Frame::Other {
            kind: envelope.kind,
            data: envelope.data,
        }),
    }
}
