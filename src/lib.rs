//! Client-side data layer for the forest-fire monitoring dashboard: a
//! persisted auth session, a typed REST façade over the monitoring backend,
//! and a self-reconnecting realtime sensor feed.

pub mod api;
pub mod config;
pub mod error;
pub mod feed;
pub mod models;
pub mod monitor;
pub mod realtime;
pub mod session;

pub use api::{ApiClient, LogRedirect, LoginRedirect};
pub use config::Config;
pub use error::{ApiError, FrameError, RealtimeError, SessionError};
pub use feed::{FeedSnapshot, LiveFeed};
pub use monitor::AlertMonitor;
pub use realtime::{CloseReason, ConnectionState, RealtimeClient, RealtimeConfig, ReconnectPolicy};
pub use session::{FileStorage, MemoryStorage, SessionStorage, SessionStore};
