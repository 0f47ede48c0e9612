/*!
 * Export stage
 *
 * Converts each layer's raw shapefiles to GeoJSON under
 * `data-in-geojson/{output_dir}/`, optionally simplifying geometry and
 * splitting rows into one file per distinct attribute value.
 */

use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::config::{LayerCatalog, LayerConfig};
use crate::error::{PipelineError, Result};
use crate::paths::RepoPaths;
use crate::report::ExportReport;
use crate::spatial::GeoTable;

/// Outcome of exporting a single layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayerExport {
    pub skipped: bool,
    pub files_written: usize,
    pub files_failed: usize,
}

/// Directories are never export candidates
pub fn should_skip_file(path: &Path) -> bool {
    if path.is_dir() {
        debug!("Skipping directory: {}", path.display());
        return true;
    }
    false
}

/// Filesystem-safe name for an attribute value
pub fn safe_file_name(value: &JsonValue) -> String {
    let text = match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    };
    let safe = text
        .trim()
        .to_lowercase()
        .replace(' ', "_")
        .replace(['/', '\\'], "-");

    // Empty and all-dot names would resolve outside the group folder
    if safe.chars().all(|c| c == '.') {
        return "_".repeat(safe.len().max(1));
    }
    safe
}

/// `safe`, or `safe_2`, `safe_3`, ... if an earlier group already claimed it
fn unique_name(safe: String, taken: &mut HashSet<String>) -> String {
    if taken.insert(safe.clone()) {
        return safe;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}_{}", safe, n);
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Fail unless every name in `columns` is present in `table`
pub fn validate_columns(table: &GeoTable, columns: &[&str], label: &str) -> Result<()> {
    let missing: Vec<&str> = columns
        .iter()
        .copied()
        .filter(|c| !table.has_column(c))
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    debug!("All columns in {}: {:?}", label, table.columns());
    Err(PipelineError::MissingColumn {
        column: missing.join(", "),
        file: label.to_string(),
        available: table.columns().to_vec(),
    })
}

/// Drop a top-level `crs` member from a GeoJSON file
///
/// Returns `true` when the file was rewritten.
pub fn remove_crs_field(path: &Path) -> Result<bool> {
    let mut doc: JsonValue = serde_json::from_reader(BufReader::new(File::open(path)?))?;
    let removed = doc
        .as_object_mut()
        .is_some_and(|obj| obj.remove("crs").is_some());
    if removed {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, &doc)?;
        writer.flush()?;
        debug!("Removed 'crs' property from {}", path.display());
    }
    Ok(removed)
}

fn write_output(table: &GeoTable, path: &Path) -> Result<()> {
    table.write_geojson(path)?;
    if let Err(e) = remove_crs_field(path) {
        warn!("Could not remove 'crs' from {}: {}", path.display(), e);
    }
    Ok(())
}

/// Write one shapefile's features as GeoJSON
///
/// Returns the files written. A missing split column is an error; groups
/// are written to `{output_dir}/{safe}/{safe}.geojson`.
pub fn export_split_geojson(
    shp_path: &Path,
    output_dir: &Path,
    split_by: Option<&str>,
    simplify_tolerance: f64,
) -> Result<Vec<PathBuf>> {
    info!("Reading shapefile: {}", shp_path.display());
    let mut table = GeoTable::read(shp_path)?;

    if simplify_tolerance > 0.0 {
        table.simplify(simplify_tolerance);
        info!("Simplified geometries with tolerance {}", simplify_tolerance);
    }

    let label = shp_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut written = Vec::new();

    let Some(column) = split_by else {
        let stem = shp_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let path = output_dir.join(format!("{}.geojson", stem));
        write_output(&table, &path)?;
        info!("Saved GeoJSON: {}", path.display());
        written.push(path);
        return Ok(written);
    };

    validate_columns(&table, &[column], &label)?;

    let values = table.distinct_values(column);
    info!("Splitting layer by '{}' -> {} groups", column, values.len());

    let mut taken = HashSet::new();
    for value in values {
        let group = table.filter_eq(column, &value);
        if group.is_empty() {
            warn!("Skipped empty group for {}={}", column, value);
            continue;
        }
        debug!("Processing group: {} with {} features", value, group.len());

        let base = safe_file_name(&value);
        let safe = unique_name(base.clone(), &mut taken);
        if safe != base {
            warn!(
                "Value {} maps to an existing file name '{}'; writing it as '{}'",
                value, base, safe
            );
        }
        let path = output_dir.join(&safe).join(format!("{}.geojson", safe));
        write_output(&group, &path)?;
        info!("Saved split GeoJSON: {}", path.display());
        written.push(path);
    }

    Ok(written)
}

/// `*.shp` directly in `input_dir`, else one level down, sorted
pub fn find_shapefiles(input_dir: &Path) -> Vec<PathBuf> {
    let direct = glob_sorted(input_dir, "*.shp");
    if !direct.is_empty() {
        return direct;
    }
    glob_sorted(input_dir, "*/*.shp")
}

fn glob_sorted(dir: &Path, pattern: &str) -> Vec<PathBuf> {
    let full = format!(
        "{}/{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        pattern
    );
    let mut found: Vec<PathBuf> = match glob::glob(&full) {
        Ok(paths) => paths.filter_map(|p| p.ok()).collect(),
        Err(e) => {
            warn!("Invalid glob pattern {}: {}", full, e);
            Vec::new()
        }
    };
    found.sort();
    found
}

/// Export one layer
pub fn export_layer(paths: &RepoPaths, layer: &LayerConfig) -> Result<LayerExport> {
    let name = layer.label();
    let output_dir_name = layer.require_output_dir()?;
    let output_dir = paths.layer_in_geojson(output_dir_name);
    fs::create_dir_all(&output_dir)?;

    let input_dir = paths.layer_in(output_dir_name);
    debug!("Looking for shapefiles in {}", input_dir.display());

    if !input_dir.exists() {
        error!("Input directory does not exist: {}", input_dir.display());
        return Ok(LayerExport {
            skipped: true,
            ..Default::default()
        });
    }

    let candidates = find_shapefiles(&input_dir);
    if candidates.is_empty() {
        warn!(
            "No shapefile found for layer: {} in {}",
            name,
            input_dir.display()
        );
        return Ok(LayerExport {
            skipped: true,
            ..Default::default()
        });
    }

    let mut outcome = LayerExport::default();
    for shp_path in candidates {
        if should_skip_file(&shp_path) {
            continue;
        }

        info!("Exporting layer: {}", name);
        match export_split_geojson(
            &shp_path,
            &output_dir,
            layer.split_column(),
            layer.tolerance(),
        ) {
            Ok(files) => outcome.files_written += files.len(),
            Err(e @ PipelineError::GeoRead { .. }) => {
                error!("Skipping unreadable shapefile: {}", e);
                outcome.files_failed += 1;
            }
            Err(e) => return Err(e),
        }
    }

    info!("Finished exporting layer: {}", name);
    Ok(outcome)
}

/// Export every configured layer
pub fn run(paths: &RepoPaths) -> Result<ExportReport> {
    info!("=== Starting EXPORT process for forest layers ===");
    fs::create_dir_all(paths.data_in_geojson())?;

    let catalog = LayerCatalog::load(&paths.config_dir())?;
    let mut report = ExportReport::default();

    for layer in &catalog.layers {
        let outcome = export_layer(paths, layer)?;
        report.layers += 1;
        if outcome.skipped {
            report.layers_skipped += 1;
        }
        report.files_written += outcome.files_written;
        report.files_failed += outcome.files_failed;
    }

    info!("=== EXPORT complete ===");
    Ok(report)
}
