//! London housing market dashboard
//!
//! This library loads and cleans the London house price dataset, assigns
//! properties to boroughs, computes the dashboard analytics, trains and
//! serves the price model, and exposes everything through a JSON API.

pub mod analytics;
pub mod cache;
pub mod config;
pub mod data;
pub mod error;
pub mod models;
pub mod spatial;
pub mod telemetry;
pub mod valuation;
pub mod web;

// Re-export core types for public API
pub use cache::PersistentCache;
pub use config::{HousingConfig, Secrets};
pub use data::{DashboardFilter, Dataset};
pub use error::HousingError;
pub use models::{Location, Property};
pub use spatial::{BoroughAtlas, MapMetric};
pub use valuation::{PredictionInput, PriceEstimator, RoiInput};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, HousingError>;
