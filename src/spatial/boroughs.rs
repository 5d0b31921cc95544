//! London borough boundaries and point-in-borough lookup

use std::fs;
use std::path::Path;

use geo::{BoundingRect, Contains, MultiPolygon, Point, Rect};
use tracing::{debug, info, instrument, warn};

use super::topojson::Topology;
use crate::{HousingError, Result};

/// One polygonal feature belonging to a borough
#[derive(Debug, Clone)]
pub struct BoroughShape {
    pub borough: String,
    pub geometry: MultiPolygon<f64>,
    bbox: Option<Rect<f64>>,
}

impl BoroughShape {
    #[must_use]
    pub fn new(borough: impl Into<String>, geometry: MultiPolygon<f64>) -> Self {
        let bbox = geometry.bounding_rect();
        Self {
            borough: borough.into(),
            geometry,
            bbox,
        }
    }

    /// Strictly inside; points on the boundary do not count
    #[must_use]
    pub fn contains(&self, point: &Point<f64>) -> bool {
        let Some(bbox) = self.bbox else {
            return false;
        };
        let (min, max) = (bbox.min(), bbox.max());
        if point.x() < min.x || point.x() > max.x || point.y() < min.y || point.y() > max.y {
            return false;
        }
        self.geometry.contains(point)
    }
}

/// Every borough shape, in the order the files were read
#[derive(Debug, Clone, Default)]
pub struct BoroughAtlas {
    shapes: Vec<BoroughShape>,
}

impl BoroughAtlas {
    #[must_use]
    pub fn from_shapes(shapes: Vec<BoroughShape>) -> Self {
        Self { shapes }
    }

    /// Load every `*.json` TopoJSON file in `dir`. The borough name comes
    /// from the file name: `topo_camden.json` becomes `Camden`.
    #[instrument(skip_all, fields(dir = %dir.as_ref().display()))]
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut files: Vec<_> = fs::read_dir(dir)
            .map_err(|e| {
                HousingError::geo(format!("cannot read borough folder {}: {e}", dir.display()))
            })?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();

        let mut shapes = Vec::new();
        let mut boroughs = 0usize;
        for path in files {
            let parsed = fs::read_to_string(&path)
                .map_err(HousingError::from)
                .and_then(|text| Topology::from_json(&text))
                .and_then(|topology| topology.first_object_shapes());
            let geometries = match parsed {
                Ok(Some(geometries)) => geometries,
                Ok(None) => {
                    warn!("Skipping {}: topology has no objects", path.display());
                    continue;
                }
                Err(e) => {
                    warn!("Skipping {}: {e}", path.display());
                    continue;
                }
            };

            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let borough = borough_name_from_stem(&stem);
            debug!("Loaded {} shapes for {}", geometries.len(), borough);

            shapes.extend(
                geometries
                    .into_iter()
                    .map(|geometry| BoroughShape::new(borough.clone(), geometry)),
            );
            boroughs += 1;
        }

        if boroughs == 0 {
            return Err(HousingError::geo("No valid borough TopoJSON files found."));
        }

        info!("Loaded {} boroughs ({} shapes)", boroughs, shapes.len());
        Ok(Self { shapes })
    }

    #[must_use]
    pub fn shapes(&self) -> &[BoroughShape] {
        &self.shapes
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Borough whose shape contains the coordinates; the first match wins
    #[must_use]
    pub fn assign(&self, latitude: f64, longitude: f64) -> Option<&str> {
        let point = Point::new(longitude, latitude);
        self.shapes
            .iter()
            .find(|shape| shape.contains(&point))
            .map(|shape| shape.borough.as_str())
    }
}

/// `topo_kensington and chelsea` → `Kensington And Chelsea`
#[must_use]
pub fn borough_name_from_stem(stem: &str) -> String {
    title_case(&stem.replace("topo_", ""))
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest
#[must_use]
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_word = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}
