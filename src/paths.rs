/*!
 * Repository root discovery and data directory layout
 */

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{PipelineError, Result};

/// Folder holding the YAML layer definitions; marks the repository root
pub const CONFIG_DIR_NAME: &str = "data-config";
pub const DATA_IN_DIR_NAME: &str = "data-in";
pub const DATA_IN_GEOJSON_DIR_NAME: &str = "data-in-geojson";
pub const DATA_OUT_DIR_NAME: &str = "data-out";
pub const DATA_OUT_CHUNKED_DIR_NAME: &str = "data-out-chunked";

/// Resolved data directory layout, fixed for the lifetime of a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoPaths {
    root: PathBuf,
}

impl RepoPaths {
    /// Use `root` as-is, without checking for a config folder
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Locate the repository root
    ///
    /// An explicit root must contain `data-config/`. Otherwise the crate's own
    /// source directory is tried, then the working directory and its ancestors.
    pub fn discover(explicit_root: Option<&Path>) -> Result<Self> {
        if let Some(root) = explicit_root {
            if root.join(CONFIG_DIR_NAME).is_dir() {
                return Ok(Self::new(root));
            }
            return Err(PipelineError::RepoRootNotFound {
                start: root.to_path_buf(),
            });
        }

        let source_root = Path::new(env!("CARGO_MANIFEST_DIR"));
        if source_root.join(CONFIG_DIR_NAME).is_dir() {
            debug!("Using source checkout as repository root: {}", source_root.display());
            return Ok(Self::new(source_root));
        }

        let cwd = std::env::current_dir()?;
        Self::search_upward(&cwd)
    }

    /// First of `start` and its ancestors that contains `data-config/`
    pub fn search_upward(start: &Path) -> Result<Self> {
        start
            .ancestors()
            .find(|dir| dir.join(CONFIG_DIR_NAME).is_dir())
            .map(Self::new)
            .ok_or_else(|| PipelineError::RepoRootNotFound {
                start: start.to_path_buf(),
            })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_dir(&self) -> PathBuf {
        self.root.join(CONFIG_DIR_NAME)
    }

    /// Raw downloads: zip archives and extracted shapefiles
    pub fn data_in(&self) -> PathBuf {
        self.root.join(DATA_IN_DIR_NAME)
    }

    /// Exported GeoJSON before chunking
    pub fn data_in_geojson(&self) -> PathBuf {
        self.root.join(DATA_IN_GEOJSON_DIR_NAME)
    }

    /// Final GeoJSON, chunked or copied
    pub fn data_out(&self) -> PathBuf {
        self.root.join(DATA_OUT_DIR_NAME)
    }

    /// Legacy location of chunked output, still indexed when present
    pub fn data_out_chunked(&self) -> PathBuf {
        self.root.join(DATA_OUT_CHUNKED_DIR_NAME)
    }

    pub fn layer_in(&self, output_dir: &str) -> PathBuf {
        self.data_in().join(output_dir)
    }

    pub fn layer_in_geojson(&self, output_dir: &str) -> PathBuf {
        self.data_in_geojson().join(output_dir)
    }

    pub fn layer_out(&self, output_dir: &str) -> PathBuf {
        self.data_out().join(output_dir)
    }
}
