/*!
 * Chunk stage
 *
 * Moves exported GeoJSON from `data-in-geojson/` into `data-out/`. Files with
 * more features than the configured ceiling are split into numbered parts
 * inside a `{stem}_chunked.geojson/` directory; smaller files are copied
 * byte-for-byte.
 */

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::config::{ChunkParams, LayerCatalog, LayerConfig};
use crate::error::Result;
use crate::paths::RepoPaths;
use crate::report::ChunkReport;
use crate::spatial::GeoTable;

/// Suffix of a chunk container directory (and of legacy chunked files)
pub const CHUNKED_SUFFIX: &str = "_chunked.geojson";

/// What chunk-or-copy did with one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    Copied,
    Chunked { parts: usize },
}

/// Container directory for the chunks of `source`
pub fn chunked_dir_name(source: &Path) -> String {
    format!("{}{}", file_stem(source), CHUNKED_SUFFIX)
}

/// File name of the 1-based `index`-th chunk of `stem`
pub fn chunk_file_name(stem: &str, index: usize) -> String {
    format!("{}_chunk_{:03}.geojson", stem, index)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// A regular file whose name ends in `_chunked.geojson`
pub fn is_chunked_file(path: &Path) -> bool {
    path.is_file()
        && path
            .file_name()
            .is_some_and(|n| n.to_string_lossy().ends_with(CHUNKED_SUFFIX))
}

/// Directories and already-chunked files are left alone
pub fn should_skip_file(path: &Path) -> bool {
    if path.is_dir() {
        debug!("Skipping directory: {}", path.display());
        return true;
    }
    if is_chunked_file(path) {
        debug!("Skipping already-chunked file: {}", path.display());
        return true;
    }
    false
}

/// Entries named `*.geojson` directly inside `dir`, sorted
pub fn list_geojson_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "geojson"))
        .collect();
    entries.sort();
    Ok(entries)
}

/// Copy a GeoJSON file verbatim, creating the destination folder
pub fn copy_geojson_file(src: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(src, dest)?;
    info!("Copied unchunked file to: {}", dest.display());
    Ok(())
}

/// Write `table` as consecutive parts of at most `max_features` features
///
/// Returns the number of parts written.
pub fn write_chunks(table: &GeoTable, stem: &str, max_features: usize, dir: &Path) -> Result<usize> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;

    let mut parts = 0;
    for (i, chunk) in table.chunks(max_features).enumerate() {
        let path = dir.join(chunk_file_name(stem, i + 1));
        chunk.write_geojson(&path)?;
        debug!("Wrote {} features to {}", chunk.len(), path.display());
        parts += 1;
    }
    Ok(parts)
}

/// Chunk `source` into `output_dir` if it exceeds `max_features`, else copy it
///
/// An unreadable source counts as zero features and is copied.
pub fn chunk_or_copy_file(source: &Path, max_features: usize, output_dir: &Path) -> Result<ChunkOutcome> {
    let table = match GeoTable::read(source) {
        Ok(table) => {
            debug!("{} has {} features.", source.display(), table.len());
            Some(table)
        }
        Err(e) => {
            error!("Could not read {}: {}", source.display(), e);
            None
        }
    };

    let container = output_dir.join(chunked_dir_name(source));
    let copy = source.file_name().map(|name| output_dir.join(name));

    match table {
        Some(table) if table.len() > max_features => {
            if let Some(stale) = copy.as_deref().filter(|p| p.is_file()) {
                fs::remove_file(stale)?;
                debug!("Removed previous copy: {}", stale.display());
            }
            info!("Chunking file: {} -> {}", source.display(), container.display());
            let parts = write_chunks(&table, &file_stem(source), max_features, &container)?;
            Ok(ChunkOutcome::Chunked { parts })
        }
        _ => {
            if container.is_dir() {
                fs::remove_dir_all(&container)?;
                debug!("Removed previous chunks: {}", container.display());
            }
            if let Some(dest) = copy {
                copy_geojson_file(source, &dest)?;
            }
            Ok(ChunkOutcome::Copied)
        }
    }
}

fn tally(report: &mut ChunkReport, outcome: ChunkOutcome) {
    match outcome {
        ChunkOutcome::Copied => report.files_copied += 1,
        ChunkOutcome::Chunked { parts } => {
            report.files_chunked += 1;
            report.chunk_parts += parts;
        }
    }
}

/// Chunk or copy every eligible GeoJSON file directly in `input_folder`
pub fn chunk_geojson_folder(
    input_folder: &Path,
    max_features: usize,
    output_folder: &Path,
    report: &mut ChunkReport,
) -> Result<()> {
    let entries = list_geojson_entries(input_folder)?;
    debug!(
        "Found {} GeoJSON files in {}",
        entries.len(),
        input_folder.display()
    );

    if entries.is_empty() {
        warn!("No GeoJSON files found in {}", input_folder.display());
        return Ok(());
    }

    for entry in entries {
        if should_skip_file(&entry) {
            report.files_skipped += 1;
            continue;
        }
        tally(report, chunk_or_copy_file(&entry, max_features, output_folder)?);
    }
    Ok(())
}

fn chunk_split_layer(
    input_dir: &Path,
    output_dir: &Path,
    max_features: usize,
    report: &mut ChunkReport,
) -> Result<()> {
    let mut subfolders: Vec<PathBuf> = fs::read_dir(input_dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_dir())
        .collect();
    subfolders.sort();

    if subfolders.is_empty() {
        info!("No subfolders found in {}", input_dir.display());
        return Ok(());
    }

    for subfolder in subfolders {
        info!("Searching for GeoJSONs in {}", subfolder.display());
        let files: Vec<PathBuf> = list_geojson_entries(&subfolder)?
            .into_iter()
            .filter(|p| p.is_file())
            .collect();

        if files.is_empty() {
            info!("No GeoJSONs found in {}", subfolder.display());
            continue;
        }

        for file in files {
            let destination = output_dir.join(file_stem(&file));
            fs::create_dir_all(&destination)?;
            info!("Chunking {} into {}", file.display(), destination.display());
            tally(report, chunk_or_copy_file(&file, max_features, &destination)?);
        }
    }
    Ok(())
}

/// Chunk one layer's intermediate GeoJSON into `data-out/{output_dir}/`
///
/// Returns `false` when the layer had no intermediate directory.
pub fn chunk_layer(
    paths: &RepoPaths,
    layer: &LayerConfig,
    params: &ChunkParams,
    report: &mut ChunkReport,
) -> Result<bool> {
    let output_dir_name = layer.require_output_dir()?;
    let input_dir = paths.layer_in_geojson(output_dir_name);
    let output_dir = paths.layer_out(output_dir_name);
    fs::create_dir_all(&output_dir)?;

    if !input_dir.exists() {
        warn!("Layer input dir does not exist: {}", input_dir.display());
        return Ok(false);
    }

    if layer.split_column().is_some() {
        chunk_split_layer(&input_dir, &output_dir, params.chunk_max_features, report)?;
    } else {
        info!(
            "Checking all files in {} for chunking or copying...",
            input_dir.display()
        );
        chunk_geojson_folder(&input_dir, params.chunk_max_features, &output_dir, report)?;
    }
    Ok(true)
}

/// Chunk every configured layer
pub fn run(paths: &RepoPaths) -> Result<ChunkReport> {
    info!("Starting chunking process...");

    let catalog = LayerCatalog::load(&paths.config_dir())?;
    let params = catalog.chunk_params();
    debug!(
        "Chunk parameters: max {} features, tolerance {}",
        params.chunk_max_features, params.simplify_tolerance
    );

    fs::create_dir_all(paths.data_out())?;

    let mut report = ChunkReport::default();
    for layer in &catalog.layers {
        report.layers += 1;
        if !chunk_layer(paths, layer, &params, &mut report)? {
            report.layers_skipped += 1;
        }
    }

    info!("Chunking complete.");
    Ok(report)
}
