//! Data models for the housing dashboard
//!
//! - Location: property coordinates and Street View URLs
//! - Property: one cleaned dataset row

pub mod location;
pub mod property;

pub use location::{Location, StreetViewSize};
pub use property::Property;
