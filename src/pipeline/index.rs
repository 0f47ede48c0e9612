/*!
 * Index stage
 *
 * Scans the final output trees and writes `data-out/index.json`: one entry
 * per GeoJSON file with its repo-relative path, bounding box and size.
 * Entries under `data-out-chunked/` are also written to a separate index in
 * that folder.
 */

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::Result;
use crate::paths::{RepoPaths, DATA_OUT_CHUNKED_DIR_NAME, DATA_OUT_DIR_NAME};
use crate::report::IndexReport;
use crate::spatial::GeoTable;

pub const INDEX_FILE_NAME: &str = "index.json";

/// One manifest record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Repo-relative, forward slashes
    pub path: String,
    /// `[minx, miny, maxx, maxy]`
    pub bbox: [f64; 4],
    /// MiB, `None` if the file disappeared before it could be measured
    pub size_mb: Option<f64>,
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Bounding box of a GeoJSON file rounded to 6 decimals
///
/// `None` if the file cannot be read or has no bounded geometry.
pub fn compute_bbox(path: &Path) -> Option<[f64; 4]> {
    let table = match GeoTable::read(path) {
        Ok(table) => table,
        Err(e) => {
            warn!("Could not read {}: {}", path.display(), e);
            return None;
        }
    };
    let bbox = table.total_bounds()?.map(|v| round_to(v, 6));
    debug!("Computed bounds for {}: {:?}", path.display(), bbox);
    Some(bbox)
}

/// File size in MiB rounded to 2 decimals
pub fn size_mb(path: &Path) -> Option<f64> {
    match fs::metadata(path) {
        Ok(meta) => Some(round_to(meta.len() as f64 / (1024.0 * 1024.0), 2)),
        Err(_) => {
            warn!("File listed in index not found: {}", path.display());
            None
        }
    }
}

/// Every regular `*.geojson` file below `base_dir`, in path order
pub fn find_geojson_files(base_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(base_dir).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file()
            && entry.path().extension().is_some_and(|ext| ext == "geojson")
        {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn relative_path(base_dir: &Path, path: &Path, prefix: &str) -> String {
    let rel = path.strip_prefix(base_dir).unwrap_or(path);
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    format!("{}/{}", prefix, parts.join("/"))
}

/// Index entries for all GeoJSON files under `base_dir`
///
/// Returns the entries and the number of files found.
pub fn index_geojsons_in_folder(base_dir: &Path, prefix: &str) -> Result<(Vec<IndexEntry>, usize)> {
    let files = find_geojson_files(base_dir)?;
    if files.is_empty() {
        info!("No geojson files found in {}", base_dir.display());
        return Ok((Vec::new(), 0));
    }
    info!("Found {} geojson files in {}", files.len(), base_dir.display());

    let mut entries = Vec::with_capacity(files.len());
    for file in &files {
        debug!("Indexing: {}", file.display());
        match compute_bbox(file) {
            Some(bbox) => entries.push(IndexEntry {
                path: relative_path(base_dir, file, prefix),
                bbox,
                size_mb: size_mb(file),
            }),
            None => warn!(
                "Skipping {} because bounding box could not be computed.",
                file.display()
            ),
        }
    }
    Ok((entries, files.len()))
}

fn write_index(path: &Path, entries: &[IndexEntry]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, entries)?;
    writer.flush()?;
    Ok(())
}

/// Rebuild both manifests from scratch
pub fn build_index(paths: &RepoPaths) -> Result<IndexReport> {
    let out_dir = paths.data_out();
    let chunked_dir = paths.data_out_chunked();
    fs::create_dir_all(&out_dir)?;

    let (mut index, mut scanned) = index_geojsons_in_folder(&out_dir, DATA_OUT_DIR_NAME)?;

    if chunked_dir.exists() {
        let (chunked, found) = index_geojsons_in_folder(&chunked_dir, DATA_OUT_CHUNKED_DIR_NAME)?;
        index.extend(chunked);
        scanned += found;
    } else {
        info!("No chunked data found at {}", chunked_dir.display());
    }

    let index_path = out_dir.join(INDEX_FILE_NAME);
    write_index(&index_path, &index)?;
    info!("index.json written to {}", index_path.display());
    info!("Indexed {} GeoJSON files.", index.len());

    let chunked_prefix = format!("{}/", DATA_OUT_CHUNKED_DIR_NAME);
    let chunked_index: Vec<IndexEntry> = index
        .iter()
        .filter(|e| e.path.starts_with(&chunked_prefix))
        .cloned()
        .collect();
    if !chunked_index.is_empty() {
        let chunked_path = chunked_dir.join(INDEX_FILE_NAME);
        write_index(&chunked_path, &chunked_index)?;
        info!("Chunked-only index.json written to {}", chunked_path.display());
    }

    Ok(IndexReport {
        scanned,
        indexed: index.len(),
        omitted: scanned - index.len(),
        chunked_indexed: chunked_index.len(),
    })
}
