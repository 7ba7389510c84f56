mod advanced;
mod alerts;
mod auth;
pub mod client;
mod dashboard;
pub mod export;
mod sensors;
mod sprinkler;

pub use advanced::{DEFAULT_LATITUDE, DEFAULT_LONGITUDE};
pub use client::{ApiClient, LogRedirect, LoginRedirect};
pub use export::{CsvExport, ExportKind};
