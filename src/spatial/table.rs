/*!
 * In-memory feature table
 *
 * A `GeoTable` is an ordered list of GeoJSON features plus the attribute
 * column names known for the source. Shapefiles and GeoJSON documents both
 * load into it; output is always a GeoJSON FeatureCollection.
 */

use geo::{BoundingRect, Geometry, GeometryCollection, SimplifyVwPreserve};
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject};
use serde_json::Value as JsonValue;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

use super::shp;
use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Default)]
pub struct GeoTable {
    columns: Vec<String>,
    features: Vec<Feature>,
}

impl GeoTable {
    pub fn new(columns: Vec<String>, features: Vec<Feature>) -> Self {
        Self { columns, features }
    }

    /// Build a feature from a decoded geometry and its attributes
    pub fn feature(geometry: Option<Geometry<f64>>, properties: JsonObject) -> Feature {
        Feature {
            bbox: None,
            geometry: geometry.map(|g| geojson::Geometry::new(geojson::Value::from(&g))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        }
    }

    /// Load a `.shp` or GeoJSON file, chosen by extension
    pub fn read(path: &Path) -> Result<Self> {
        let is_shp = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("shp"));
        if is_shp {
            shp::read_shapefile(path)
        } else {
            Self::read_geojson(path)
        }
    }

    pub fn read_geojson(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| PipelineError::geo_read(path, e))?;
        let doc = text
            .parse::<GeoJson>()
            .map_err(|e| PipelineError::geo_read(path, e))?;

        let features = match doc {
            GeoJson::FeatureCollection(fc) => fc.features,
            GeoJson::Feature(f) => vec![f],
            GeoJson::Geometry(g) => vec![Feature {
                bbox: None,
                geometry: Some(g),
                id: None,
                properties: Some(JsonObject::new()),
                foreign_members: None,
            }],
        };

        let mut columns: Vec<String> = Vec::new();
        for props in features.iter().filter_map(|f| f.properties.as_ref()) {
            for key in props.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }

        Ok(Self { columns, features })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Topology-preserving simplification of every line and polygon
    ///
    /// `tolerance` is a distance in coordinate units; the Visvalingam-Whyatt
    /// area threshold is its square. Points pass through unchanged.
    pub fn simplify(&mut self, tolerance: f64) {
        if tolerance <= 0.0 {
            return;
        }
        let epsilon = tolerance * tolerance;
        for feature in &mut self.features {
            let Some(geom) = feature.geometry.as_mut() else { continue };
            match Geometry::<f64>::try_from(&*geom) {
                Ok(g) => {
                    let simplified = simplify_geometry(g, epsilon);
                    *geom = geojson::Geometry::new(geojson::Value::from(&simplified));
                }
                Err(e) => debug!("Leaving geometry unsimplified: {}", e),
            }
        }
    }

    /// Non-null values of `column`, in order of first appearance
    pub fn distinct_values(&self, column: &str) -> Vec<JsonValue> {
        let mut seen: Vec<JsonValue> = Vec::new();
        for feature in &self.features {
            match feature.property(column) {
                Some(JsonValue::Null) | None => {}
                Some(v) => {
                    if !seen.contains(v) {
                        seen.push(v.clone());
                    }
                }
            }
        }
        seen
    }

    /// Features whose `column` equals `value`
    pub fn filter_eq(&self, column: &str, value: &JsonValue) -> GeoTable {
        let features = self
            .features
            .iter()
            .filter(|f| f.property(column) == Some(value))
            .cloned()
            .collect();
        GeoTable::new(self.columns.clone(), features)
    }

    /// Consecutive sub-tables of at most `size` features each
    pub fn chunks(&self, size: usize) -> impl Iterator<Item = GeoTable> + '_ {
        self.features
            .chunks(size.max(1))
            .map(|part| GeoTable::new(self.columns.clone(), part.to_vec()))
    }

    /// `[minx, miny, maxx, maxy]` over all geometries, if any has an extent
    pub fn total_bounds(&self) -> Option<[f64; 4]> {
        self.features
            .iter()
            .filter_map(|f| f.geometry.as_ref())
            .filter_map(|g| Geometry::<f64>::try_from(g).ok())
            .filter_map(|g| g.bounding_rect())
            .fold(None, |acc: Option<[f64; 4]>, rect| {
                let (min, max) = (rect.min(), rect.max());
                Some(match acc {
                    None => [min.x, min.y, max.x, max.y],
                    Some([x0, y0, x1, y1]) => [x0.min(min.x), y0.min(min.y), x1.max(max.x), y1.max(max.y)],
                })
            })
    }

    pub fn to_feature_collection(&self) -> FeatureCollection {
        FeatureCollection {
            bbox: None,
            features: self.features.clone(),
            foreign_members: None,
        }
    }

    /// Write as a GeoJSON FeatureCollection, creating parent directories
    pub fn write_geojson(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, &self.to_feature_collection())?;
        writer.flush()?;
        Ok(())
    }
}

fn simplify_geometry(geometry: Geometry<f64>, epsilon: f64) -> Geometry<f64> {
    match geometry {
        Geometry::LineString(ls) => Geometry::LineString(ls.simplify_vw_preserve(&epsilon)),
        Geometry::MultiLineString(mls) => Geometry::MultiLineString(mls.simplify_vw_preserve(&epsilon)),
        Geometry::Polygon(p) => Geometry::Polygon(p.simplify_vw_preserve(&epsilon)),
        Geometry::MultiPolygon(mp) => Geometry::MultiPolygon(mp.simplify_vw_preserve(&epsilon)),
        Geometry::GeometryCollection(gc) => Geometry::GeometryCollection(GeometryCollection(
            gc.0.into_iter().map(|g| simplify_geometry(g, epsilon)).collect(),
        )),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Point};
    use serde_json::json;
    use tempfile::TempDir;

    fn props(value: JsonValue) -> JsonObject {
        match value {
            JsonValue::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn sample() -> GeoTable {
        let features = vec![
            GeoTable::feature(
                Some(Geometry::Point(Point::new(-105.0, 39.0))),
                props(json!({"FORESTNAME": "Pike", "REGION": 2})),
            ),
            GeoTable::feature(
                Some(Geometry::Point(Point::new(-120.0, 45.5))),
                props(json!({"FORESTNAME": "Deschutes", "REGION": 6})),
            ),
            GeoTable::feature(
                Some(Geometry::Point(Point::new(-104.5, 38.0))),
                props(json!({"FORESTNAME": "Pike", "REGION": 2})),
            ),
            GeoTable::feature(None, props(json!({"FORESTNAME": null, "REGION": 9}))),
        ];
        GeoTable::new(vec!["FORESTNAME".into(), "REGION".into()], features)
    }

    #[test]
    fn test_distinct_values_first_seen_order() {
        let table = sample();
        assert_eq!(
            table.distinct_values("FORESTNAME"),
            vec![json!("Pike"), json!("Deschutes")]
        );
        assert!(table.distinct_values("NOPE").is_empty());
    }

    #[test]
    fn test_filter_eq() {
        let table = sample();
        let pike = table.filter_eq("FORESTNAME", &json!("Pike"));
        assert_eq!(pike.len(), 2);
        assert_eq!(pike.columns(), table.columns());
    }

    #[test]
    fn test_total_bounds_skips_missing_geometry() {
        let bounds = sample().total_bounds().unwrap();
        assert_eq!(bounds, [-120.0, 38.0, -104.5, 45.5]);

        let empty = GeoTable::new(vec![], vec![GeoTable::feature(None, JsonObject::new())]);
        assert!(empty.total_bounds().is_none());
    }

    #[test]
    fn test_chunks_preserve_order_and_count() {
        let table = sample();
        let parts: Vec<_> = table.chunks(3).collect();
        assert_eq!(parts.iter().map(GeoTable::len).collect::<Vec<_>>(), vec![3, 1]);
        assert_eq!(
            parts[0].features()[1].property("FORESTNAME"),
            Some(&json!("Deschutes"))
        );
    }

    #[test]
    fn test_simplify_drops_collinear_vertices() {
        let poly = polygon![
            (x: 0.0, y: 0.0),
            (x: 5.0, y: 0.00001),
            (x: 10.0, y: 0.0),
            (x: 10.0, y: 10.0),
            (x: 0.0, y: 10.0),
            (x: 0.0, y: 0.0),
        ];
        let mut table = GeoTable::new(
            vec![],
            vec![GeoTable::feature(Some(Geometry::Polygon(poly)), JsonObject::new())],
        );
        table.simplify(0.01);

        let geom = table.features()[0].geometry.as_ref().unwrap();
        match Geometry::<f64>::try_from(geom).unwrap() {
            Geometry::Polygon(p) => assert_eq!(p.exterior().0.len(), 5),
            other => panic!("expected polygon, got {:?}", other),
        }
    }

    #[test]
    fn test_write_then_read_geojson() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/out.geojson");
        sample().write_geojson(&path).unwrap();

        let back = GeoTable::read(&path).unwrap();
        assert_eq!(back.len(), 4);
        assert!(back.has_column("REGION"));
        assert_eq!(back.total_bounds(), sample().total_bounds());
    }

    #[test]
    fn test_read_rejects_invalid_geojson() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.geojson");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            GeoTable::read(&path),
            Err(PipelineError::GeoRead { .. })
        ));
    }
}
