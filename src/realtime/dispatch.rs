use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use super::frame::{self, Frame};
use crate::models::SensorUpdate;

/// Routes validated frames to the consumers subscribed to their `type`.
///
/// Consumers only ever see `data` payloads; the envelope stays here.
/// Subscribers whose receiver was dropped are pruned on the next dispatch.
#[derive(Debug, Default)]
pub struct Dispatcher {
    inner: Mutex<Subscribers>,
}

#[derive(Debug, Default)]
struct Subscribers {
    raw: HashMap<String, Vec<mpsc::UnboundedSender<Value>>>,
    sensor_updates: Vec<mpsc::UnboundedSender<SensorUpdate>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw `data` payloads of every frame whose `type` equals `kind`.
    pub fn subscribe(&self, kind: &str) -> mpsc::UnboundedReceiver<Value> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().raw.entry(kind.to_owned()).or_default().push(tx);
        rx
    }

    /// Typed `sensor_update` payloads.
    pub fn sensor_updates(&self) -> mpsc::UnboundedReceiver<SensorUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().sensor_updates.push(tx);
        rx
    }

    /// Parse one text frame and deliver it. Malformed frames are logged and
    /// dropped; they never affect the connection.
    pub fn handle_text(&self, text: &str) {
        match frame::parse(text) {
            Ok(frame) => self.dispatch(frame),
            Err(e) => warn!(error = %e, len = text.len(), "Discarding malformed realtime frame"),
        }
    }

    pub fn dispatch(&self, frame: Frame) {
        let mut subs = self.lock();
        trace!(kind = frame.kind(), "Dispatching realtime frame");

        if let Some(senders) = subs.raw.get_mut(frame.kind()) {
            senders.retain(|tx| tx.send(frame.data().clone()).is_ok());
        }

        match frame {
            Frame::SensorUpdate { update, .. } => {
                subs.sensor_updates.retain(|tx| tx.send((*update).clone()).is_ok());
            }
            Frame::Other { kind, .. } => {
                if !subs.raw.contains_key(&kind) {
                    debug!(kind = %kind, "No subscriber for realtime frame type");
                }
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Subscribers> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sensor_frame(temperature: f64) -> String {
        json!({
            "type": "sensor_update",
            "data": {
                "temperature": temperature,
                "humidity": 40.0,
                "smoke_level": 20.0,
                "rain_level": 4000.0,
                "rain_detected": false,
                "timestamp": "2024-05-01T12:00:00"
            }
        })
        .to_string()
    }

    #[test]
    fn delivers_only_matching_type() {
        let dispatcher = Dispatcher::new();
        let mut sensors = dispatcher.subscribe("sensor_update");
        let mut alerts = dispatcher.subscribe("alert_created");

        dispatcher.handle_text(&sensor_frame(31.0));

        let data = sensors.try_recv().unwrap();
        assert_eq!(data["temperature"], 31.0);
        assert!(alerts.try_recv().is_err());
    }

    #[test]
    fn typed_and_raw_subscribers_both_receive_sensor_updates() {
        let dispatcher = Dispatcher::new();
        let mut raw = dispatcher.subscribe("sensor_update");
        let mut typed = dispatcher.sensor_updates();

        dispatcher.handle_text(&sensor_frame(25.0));

        assert!(raw.try_recv().is_ok());
        assert_eq!(typed.try_recv().unwrap().reading.temperature, 25.0);
    }

    #[test]
    fn malformed_frame_does_not_block_following_frames() {
        let dispatcher = Dispatcher::new();
        let mut typed = dispatcher.sensor_updates();

        dispatcher.handle_text("{{{ not json");
        dispatcher.handle_text(r#"{"type":"sensor_update","data":{"temperature":"x"}}"#);
        dispatcher.handle_text(&sensor_frame(27.5));

        assert_eq!(typed.try_recv().unwrap().reading.temperature, 27.5);
        assert!(typed.try_recv().is_err());
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let dispatcher = Dispatcher::new();
        drop(dispatcher.sensor_updates());
        let mut live = dispatcher.sensor_updates();

        dispatcher.handle_text(&sensor_frame(20.0));

        assert_eq!(dispatcher.lock().sensor_updates.len(), 1);
        assert!(live.try_recv().is_ok());
    }

    #[test]
    fn frames_arrive_in_transport_order() {
        let dispatcher = Dispatcher::new();
        let mut typed = dispatcher.sensor_updates();
        for t in [1.0, 2.0, 3.0] {
            dispatcher.handle_text(&sensor_frame(t));
        }
        let order: Vec<f64> = std::iter::from_fn(|| typed.try_recv().ok())
            .map(|u| u.reading.temperature)
            .collect();
        assert_eq!(order, vec![1.0, 2.0, 3.0]);
    }
}
