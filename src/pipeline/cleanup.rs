/*!
 * Cleanup stage
 *
 * Removes downloaded archives, extracted shapefile folders and the
 * intermediate GeoJSON tree. The final output tree is never touched.
 */

use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

use crate::error::Result;
use crate::paths::RepoPaths;
use crate::report::CleanupReport;

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .is_some_and(|e| e.to_string_lossy().eq_ignore_ascii_case(ext))
}

/// Whether any regular `.shp` file exists below `dir`
pub fn contains_shapefile(dir: &Path) -> bool {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .any(|e| e.file_type().is_file() && has_extension(e.path(), "shp"))
}

/// Delete archives and extracted shapefile folders under `data_in_dir`
///
/// Returns `(zips_deleted, dirs_deleted)`.
pub fn clean_data_in_dir(data_in_dir: &Path) -> Result<(usize, usize)> {
    if !data_in_dir.exists() {
        info!(
            "No cleanup needed. Folder does not exist: {}",
            data_in_dir.display()
        );
        return Ok((0, 0));
    }

    let mut entries: Vec<(PathBuf, bool)> = Vec::new();
    for entry in WalkDir::new(data_in_dir).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let file_type = entry.file_type();
        if file_type.is_file() || file_type.is_dir() {
            entries.push((entry.into_path(), file_type.is_dir()));
        }
    }

    let mut deleted_files = 0;
    let mut deleted_dirs = 0;

    for (path, is_dir) in entries {
        // An ancestor may already have been removed
        if fs::symlink_metadata(&path).is_err() {
            continue;
        }
        if !is_dir && has_extension(&path, "zip") {
            fs::remove_file(&path)?;
            info!("Deleted zip file: {}", path.display());
            deleted_files += 1;
        } else if is_dir && contains_shapefile(&path) {
            fs::remove_dir_all(&path)?;
            info!("Deleted extracted shapefiles folder: {}", path.display());
            deleted_dirs += 1;
        }
    }

    info!(
        "Cleanup complete in data-in/. Deleted {} zip(s) and {} shapefile folder(s).",
        deleted_files, deleted_dirs
    );
    Ok((deleted_files, deleted_dirs))
}

/// Remove the whole intermediate tree; returns whether it existed
pub fn clean_data_in_geojson_dir(data_in_geojson_dir: &Path) -> Result<bool> {
    if !data_in_geojson_dir.exists() {
        info!(
            "No cleanup needed. Folder does not exist: {}",
            data_in_geojson_dir.display()
        );
        return Ok(false);
    }

    fs::remove_dir_all(data_in_geojson_dir)?;
    info!(
        "Deleted entire data-in-geojson folder: {}",
        data_in_geojson_dir.display()
    );
    Ok(true)
}

/// Remove raw downloads and intermediate GeoJSON
pub fn run(paths: &RepoPaths) -> Result<CleanupReport> {
    let (zips_deleted, dirs_deleted) = clean_data_in_dir(&paths.data_in())?;
    let intermediate_removed = clean_data_in_geojson_dir(&paths.data_in_geojson())?;

    info!("Cleanup completed successfully.");
    Ok(CleanupReport {
        zips_deleted,
        dirs_deleted,
        intermediate_removed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_clean_data_in_removes_archives_and_shapefile_dirs() {
        let dir = TempDir::new().unwrap();
        let data_in = dir.path().join("data-in");

        // Downloaded but never extracted
        let forests = data_in.join("national-forests");
        fs::create_dir_all(&forests).unwrap();
        fs::write(forests.join("S_USA.AdministrativeForest.zip"), b"zip").unwrap();
        fs::write(forests.join("notes.txt"), b"keep").unwrap();

        // Extracted: the whole layer folder holds a shapefile
        let districts = data_in.join("ranger-districts");
        fs::create_dir_all(districts.join("S_USA.RangerDistrict/nested")).unwrap();
        fs::write(districts.join("S_USA.RangerDistrict/nested/d.shp"), b"shp").unwrap();

        let (zips, dirs) = clean_data_in_dir(&data_in).unwrap();
        assert_eq!(zips, 1);
        assert_eq!(dirs, 1);
        assert!(!forests.join("S_USA.AdministrativeForest.zip").exists());
        assert!(forests.join("notes.txt").exists());
        assert!(!districts.exists());

        // Second pass has nothing left to do
        assert_eq!(clean_data_in_dir(&data_in).unwrap(), (0, 0));
    }

    #[test]
    fn test_missing_folders_are_noops() {
        let dir = TempDir::new().unwrap();
        assert_eq!(clean_data_in_dir(&dir.path().join("nope")).unwrap(), (0, 0));
        assert!(!clean_data_in_geojson_dir(&dir.path().join("nope")).unwrap());
    }

    #[test]
    fn test_run_leaves_data_out_alone() {
        let dir = TempDir::new().unwrap();
        let paths = RepoPaths::new(dir.path());
        fs::create_dir_all(paths.layer_in_geojson("forests")).unwrap();
        fs::write(paths.layer_in_geojson("forests").join("a.geojson"), "{}").unwrap();
        fs::create_dir_all(paths.layer_out("forests")).unwrap();
        fs::write(paths.layer_out("forests").join("a.geojson"), "{}").unwrap();
        fs::write(paths.layer_out("forests").join("stray.shp"), b"").unwrap();

        let report = run(&paths).unwrap();
        assert!(report.intermediate_removed);
        assert!(!paths.data_in_geojson().exists());
        assert!(paths.layer_out("forests").join("a.geojson").exists());
        assert!(paths.layer_out("forests").join("stray.shp").exists());
    }
}
