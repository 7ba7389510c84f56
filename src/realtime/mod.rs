pub mod client;
pub mod dispatch;
pub mod frame;
pub mod machine;

pub use client::{RealtimeClient, RealtimeConfig};
pub use dispatch::Dispatcher;
pub use frame::{Frame, SENSOR_UPDATE};
pub use machine::{Action, CloseReason, ConnectionState, Machine, ReconnectPolicy};
