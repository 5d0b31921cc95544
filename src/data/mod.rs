//! Housing dataset: loading, cleaning and sidebar filtering

pub mod filter;
pub mod loader;

pub use filter::DashboardFilter;
pub use loader::{Dataset, load_and_clean, load_dataset};
