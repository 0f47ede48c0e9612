/*!
 * Shapefile input
 *
 * Geometry is read from the `.shp` stream with the `shapefile` crate and
 * converted to `geo` types; attributes come from the companion `.dbf`.
 * Z and M values are dropped by the conversion.
 */

use geo::Geometry;
use geojson::JsonObject;
use serde_json::{Number, Value as JsonValue};
use shapefile::dbase::{self, FieldValue};
use shapefile::Shape;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::table::GeoTable;
use crate::error::{PipelineError, Result};

/// Load a shapefile (and its `.dbf`, when present) into a feature table
///
/// Every failure to open or decode either file is a `GeoRead` error.
pub fn read_shapefile(path: &Path) -> Result<GeoTable> {
    let shapes = shapefile::read_shapes(path).map_err(|e| PipelineError::geo_read(path, e))?;
    let geometries = shapes
        .into_iter()
        .map(shape_to_geometry)
        .collect::<std::result::Result<Vec<_>, String>>()
        .map_err(|e| PipelineError::geo_read(path, e))?;

    let (columns, records) = match companion_dbf(path) {
        Some(dbf_path) => read_attributes(&dbf_path)?,
        None => {
            debug!("No .dbf found next to {}; features carry no attributes", path.display());
            (Vec::new(), vec![JsonObject::new(); geometries.len()])
        }
    };

    if records.len() != geometries.len() {
        warn!(
            "{} has {} shapes but {} attribute records; extra entries are ignored",
            path.display(),
            geometries.len(),
            records.len()
        );
    }

    let features = geometries
        .into_iter()
        .zip(records)
        .map(|(geometry, props)| GeoTable::feature(geometry, props))
        .collect();

    Ok(GeoTable::new(columns, features))
}

fn shape_to_geometry(shape: Shape) -> std::result::Result<Option<Geometry<f64>>, String> {
    match shape {
        Shape::NullShape => Ok(None),
        other => Geometry::<f64>::try_from(other)
            .map(Some)
            .map_err(|e| e.to_string()),
    }
}

fn companion_dbf(shp_path: &Path) -> Option<PathBuf> {
    ["dbf", "DBF"]
        .iter()
        .map(|ext| shp_path.with_extension(ext))
        .find(|p| p.is_file())
}

/// Column names in table order, and one property map per record
fn read_attributes(dbf_path: &Path) -> Result<(Vec<String>, Vec<JsonObject>)> {
    let mut reader =
        dbase::Reader::from_path(dbf_path).map_err(|e| PipelineError::geo_read(dbf_path, e))?;
    let columns: Vec<String> = reader
        .fields()
        .iter()
        .map(|field| field.name().to_string())
        .collect();
    let records = reader
        .read()
        .map_err(|e| PipelineError::geo_read(dbf_path, e))?;

    let rows = records
        .iter()
        .map(|record| {
            columns
                .iter()
                .map(|name| {
                    let value = record.get(name).map(field_to_json).unwrap_or(JsonValue::Null);
                    (name.clone(), value)
                })
                .collect()
        })
        .collect();

    Ok((columns, rows))
}

/// JSON value of one dBASE cell; blanks become `null`
pub fn field_to_json(value: &FieldValue) -> JsonValue {
    match value {
        FieldValue::Character(Some(text)) => {
            let text = text.trim_end();
            if text.is_empty() {
                JsonValue::Null
            } else {
                JsonValue::String(text.to_string())
            }
        }
        FieldValue::Numeric(Some(n)) | FieldValue::Double(n) => number(*n),
        FieldValue::Float(Some(n)) => number(f64::from(*n)),
        FieldValue::Integer(n) => JsonValue::from(*n),
        FieldValue::Logical(Some(b)) => JsonValue::Bool(*b),
        FieldValue::Date(Some(date)) => JsonValue::String(format!(
            "{:04}-{:02}-{:02}",
            date.year(),
            date.month(),
            date.day()
        )),
        _ => JsonValue::Null,
    }
}

// Whole numbers stay integers so ids and codes keep their JSON type
fn number(n: f64) -> JsonValue {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        return JsonValue::from(n as i64);
    }
    Number::from_f64(n)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}
