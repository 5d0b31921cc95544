//! TopoJSON decoding
//!
//! Borough boundaries ship as TopoJSON topologies: shared, optionally
//! quantized and delta-encoded arcs referenced by index from polygon rings.
//! Only polygonal geometry is decoded; everything else is skipped.

use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{HousingError, Result};

/// A parsed TopoJSON document
#[derive(Debug, Deserialize)]
pub struct Topology {
    #[serde(default)]
    pub transform: Option<Transform>,
    #[serde(default)]
    pub arcs: Vec<Vec<Vec<f64>>>,
    /// Named objects in document order
    #[serde(default)]
    pub objects: Map<String, Value>,
}

/// Quantization transform
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Transform {
    pub scale: [f64; 2],
    pub translate: [f64; 2],
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum TopoGeometry {
    GeometryCollection {
        #[serde(default)]
        geometries: Vec<TopoGeometry>,
    },
    Polygon {
        arcs: Vec<Vec<i64>>,
    },
    MultiPolygon {
        arcs: Vec<Vec<Vec<i64>>>,
    },
    #[serde(other)]
    Other,
}

impl Topology {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| HousingError::geo(format!("invalid TopoJSON: {e}")))
    }

    /// Decode every polygonal geometry of the first object. `None` when the
    /// topology has no objects at all.
    pub fn first_object_shapes(&self) -> Result<Option<Vec<MultiPolygon<f64>>>> {
        let Some((name, object)) = self.objects.iter().next() else {
            return Ok(None);
        };

        let geometry: TopoGeometry = serde_json::from_value(object.clone())
            .map_err(|e| HousingError::geo(format!("invalid geometry in object '{name}': {e}")))?;

        let arcs = self.decode_arcs();
        let mut shapes = Vec::new();
        collect_shapes(&geometry, &arcs, &mut shapes)?;
        Ok(Some(shapes))
    }

    /// Absolute coordinates of every arc
    fn decode_arcs(&self) -> Vec<Vec<Coord<f64>>> {
        self.arcs
            .iter()
            .map(|arc| {
                let (mut x, mut y) = (0.0, 0.0);
                arc.iter()
                    .filter(|position| position.len() >= 2)
                    .map(|position| match self.transform {
                        Some(t) => {
                            x += position[0];
                            y += position[1];
                            Coord {
                                x: x * t.scale[0] + t.translate[0],
                                y: y * t.scale[1] + t.translate[1],
                            }
                        }
                        None => Coord {
                            x: position[0],
                            y: position[1],
                        },
                    })
                    .collect()
            })
            .collect()
    }
}

fn collect_shapes(
    geometry: &TopoGeometry,
    arcs: &[Vec<Coord<f64>>],
    shapes: &mut Vec<MultiPolygon<f64>>,
) -> Result<()> {
    match geometry {
        TopoGeometry::GeometryCollection { geometries } => {
            for child in geometries {
                collect_shapes(child, arcs, shapes)?;
            }
        }
        TopoGeometry::Polygon { arcs: rings } => {
            shapes.push(MultiPolygon::new(vec![polygon(rings, arcs)?]));
        }
        TopoGeometry::MultiPolygon { arcs: polygons } => {
            let polygons = polygons
                .iter()
                .map(|rings| polygon(rings, arcs))
                .collect::<Result<Vec<_>>>()?;
            shapes.push(MultiPolygon::new(polygons));
        }
        TopoGeometry::Other => {}
    }
    Ok(())
}

fn polygon(rings: &[Vec<i64>], arcs: &[Vec<Coord<f64>>]) -> Result<Polygon<f64>> {
    let mut rings = rings.iter().map(|ring| stitch_ring(ring, arcs));
    let exterior = rings
        .next()
        .ok_or_else(|| HousingError::geo("polygon without rings"))??;
    let interiors = rings.collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, interiors))
}

/// Join the referenced arcs into one ring. Consecutive arcs share an
/// endpoint, which is kept once. A negative index `i` refers to arc `!i`
/// traversed backwards.
fn stitch_ring(indices: &[i64], arcs: &[Vec<Coord<f64>>]) -> Result<LineString<f64>> {
    let mut coords: Vec<Coord<f64>> = Vec::new();

    for &index in indices {
        let (position, reversed) = if index < 0 {
            (!index, true)
        } else {
            (index, false)
        };
        let arc = usize::try_from(position)
            .ok()
            .and_then(|i| arcs.get(i))
            .ok_or_else(|| HousingError::geo(format!("arc index {index} out of range")))?;

        coords.pop();
        if reversed {
            coords.extend(arc.iter().rev().copied());
        } else {
            coords.extend(arc.iter().copied());
        }
    }

    Ok(LineString::new(coords))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Contains, Point};

    const SQUARE: &str = r#"{
        "type": "Topology",
        "objects": {
            "camden": {
                "type": "GeometryCollection",
                "geometries": [
                    {"type": "Polygon", "arcs": [[0, 1]], "properties": {"name": "x"}},
                    {"type": "Point", "coordinates": [0, 0]}
                ]
            },
            "ignored": {"type": "Polygon", "arcs": [[0, 1]]}
        },
        "arcs": [
            [[0, 0], [1, 0], [1, 1]],
            [[1, 1], [0, 1], [0, 0]]
        ]
    }"#;

    #[test]
    fn test_decode_plain_polygon() {
        let topology = Topology::from_json(SQUARE).unwrap();
        let shapes = topology.first_object_shapes().unwrap().unwrap();
        assert_eq!(shapes.len(), 1);

        let exterior = shapes[0].0[0].exterior();
        // shared endpoint appears once, ring closed by the last point
        assert_eq!(exterior.0.len(), 5);
        assert!(shapes[0].contains(&Point::new(0.5, 0.5)));
        assert!(!shapes[0].contains(&Point::new(1.5, 0.5)));
    }

    #[test]
    fn test_quantized_reversed_arcs() {
        // arc 0 runs along the bottom and right edge, arc 1 is stored in the
        // opposite direction of travel and referenced as !1 = -2
        let text = r#"{
            "type": "Topology",
            "transform": {"scale": [0.5, 0.5], "translate": [-1.0, 51.0]},
            "objects": {"b": {"type": "MultiPolygon", "arcs": [[[0, -2]]]}},
            "arcs": [
                [[0, 0], [2, 0], [0, 2]],
                [[0, 0], [0, 2], [2, 0]]
            ]
        }"#;
        let topology = Topology::from_json(text).unwrap();
        let shapes = topology.first_object_shapes().unwrap().unwrap();
        assert_eq!(shapes.len(), 1);

        let ring = &shapes[0].0[0].exterior().0;
        assert_eq!(ring.first(), Some(&Coord { x: -1.0, y: 51.0 }));
        assert_eq!(ring[1], Coord { x: 0.0, y: 51.0 });
        assert_eq!(ring[2], Coord { x: 0.0, y: 52.0 });
        assert!(shapes[0].contains(&Point::new(-0.5, 51.5)));
    }

    #[test]
    fn test_no_objects() {
        let topology = Topology::from_json(r#"{"type":"Topology","objects":{},"arcs":[]}"#).unwrap();
        assert!(topology.first_object_shapes().unwrap().is_none());
    }

    #[test]
    fn test_bad_arc_index() {
        let text = r#"{"type":"Topology","objects":{"a":{"type":"Polygon","arcs":[[3]]}},"arcs":[]}"#;
        let topology = Topology::from_json(text).unwrap();
        assert!(topology.first_object_shapes().is_err());
    }
}
