//! Borough geometry
//!
//! - `topojson`: decoding of the borough boundary files
//! - `boroughs`: the borough atlas and point-in-borough assignment
//! - `choropleth`: per-borough metrics shaded for the map

pub mod boroughs;
pub mod choropleth;
pub mod topojson;

pub use boroughs::{BoroughAtlas, BoroughShape};
pub use choropleth::{ChoroplethMap, MapMetric, ViewState, build_choropleth, interpolate_color};
pub use topojson::Topology;
