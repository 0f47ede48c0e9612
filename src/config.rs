/*!
 * Configuration types for the boundary pipeline
 *
 * Two kinds of configuration are involved:
 * - layer definitions, one or more YAML files under `data-config/`
 * - pipeline settings (logging, download timeout), an optional TOML file
 */

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{PipelineError, Result};

/// Default simplification tolerance, in source coordinate units (degrees)
pub const DEFAULT_SIMPLIFY_TOLERANCE: f64 = 0.01;

/// Default feature ceiling per output file
pub const DEFAULT_CHUNK_MAX_FEATURES: usize = 500;

/// One dataset to fetch, export and chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LayerConfig {
    /// Human-readable identifier
    #[serde(default)]
    pub name: Option<String>,

    /// Relative directory used under every data root
    #[serde(default)]
    pub output_dir: Option<String>,

    /// Location of the zipped shapefile archive
    #[serde(default)]
    pub url: Option<String>,

    /// Attribute whose distinct values each get their own output file
    #[serde(default)]
    pub split_by: Option<String>,

    #[serde(default)]
    pub simplify_tolerance: Option<f64>,

    #[serde(default)]
    pub chunk_max_features: Option<usize>,
}

impl LayerConfig {
    /// Name used in log lines and error messages
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .or(self.output_dir.as_deref())
            .unwrap_or("Unknown")
    }

    /// The layer's `output_dir`, or a configuration error naming the layer
    pub fn require_output_dir(&self) -> Result<&str> {
        self.output_dir
            .as_deref()
            .ok_or_else(|| PipelineError::MissingField {
                field: "output_dir",
                layer: self.label().to_string(),
            })
    }

    /// The layer's `url`, or a configuration error naming the layer
    pub fn require_url(&self) -> Result<&str> {
        self.url.as_deref().ok_or_else(|| PipelineError::MissingField {
            field: "url",
            layer: self.label().to_string(),
        })
    }

    /// Split attribute, treating an empty string as unset
    pub fn split_column(&self) -> Option<&str> {
        self.split_by.as_deref().filter(|s| !s.is_empty())
    }

    /// Per-layer simplification tolerance used by the exporter
    pub fn tolerance(&self) -> f64 {
        self.simplify_tolerance
            .unwrap_or(DEFAULT_SIMPLIFY_TOLERANCE)
    }
}

/// Top-level shape of a layer YAML file
#[derive(Debug, Default, Deserialize)]
struct LayerFileDoc {
    #[serde(default)]
    layers: Option<Vec<LayerConfig>>,
}

/// One parsed layer file
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub path: PathBuf,
    /// `None` when the file is empty or has no `layers` key
    pub layers: Option<Vec<LayerConfig>>,
}

impl ConfigFile {
    /// Parse a single YAML layer file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let layers = if contents.trim().is_empty() {
            None
        } else {
            let doc: Option<LayerFileDoc> =
                serde_yaml::from_str(&contents).map_err(|source| PipelineError::Yaml {
                    path: path.to_path_buf(),
                    source,
                })?;
            doc.and_then(|d| d.layers)
        };

        Ok(Self {
            path: path.to_path_buf(),
            layers,
        })
    }

    /// File name for log lines
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// All `*.yaml` files directly inside `dir`, parsed, in file-name order
pub fn load_config_files(dir: &Path) -> Result<Vec<ConfigFile>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "yaml"))
        .collect();
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    paths.iter().map(|p| ConfigFile::from_file(p)).collect()
}

/// The merged, ordered list of layers across every config file
#[derive(Debug, Clone, Default)]
pub struct LayerCatalog {
    pub files: Vec<ConfigFile>,
    pub layers: Vec<LayerConfig>,
}

impl LayerCatalog {
    /// Load every layer file; empty files contribute nothing
    pub fn load(dir: &Path) -> Result<Self> {
        let files = load_config_files(dir)?;
        let mut layers = Vec::new();
        for file in &files {
            info!("Processing YAML config: {}", file.file_name());
            if let Some(ref file_layers) = file.layers {
                layers.extend(file_layers.iter().cloned());
            }
        }
        debug!("Loaded {} layer(s) from {}", layers.len(), dir.display());
        Ok(Self { files, layers })
    }

    /// Load every layer file, rejecting a missing, empty or layer-less configuration
    pub fn load_strict(dir: &Path) -> Result<Self> {
        let catalog = Self::load(dir)?;

        if catalog.files.is_empty() {
            return Err(PipelineError::Config(format!(
                "No YAML configs found in: {}",
                dir.display()
            )));
        }

        if let Some(file) = catalog.files.iter().find(|f| f.layers.is_none()) {
            return Err(PipelineError::Config(format!(
                "YAML config file is empty or missing 'layers': {}",
                file.path.display()
            )));
        }

        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Chunk parameters resolved across the whole catalog
    pub fn chunk_params(&self) -> ChunkParams {
        ChunkParams::resolve(&self.layers)
    }
}

/// Chunking parameters shared by every layer in a chunk run
///
/// Resolution scans all layers in catalog order and keeps the last value seen
/// for each key, so one layer's `chunk_max_features` applies to every layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkParams {
    pub chunk_max_features: usize,
    pub simplify_tolerance: f64,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            chunk_max_features: DEFAULT_CHUNK_MAX_FEATURES,
            simplify_tolerance: DEFAULT_SIMPLIFY_TOLERANCE,
        }
    }
}

impl ChunkParams {
    /// Last-write-wins scan over `layers`
    pub fn resolve(layers: &[LayerConfig]) -> Self {
        layers.iter().fold(Self::default(), |params, layer| Self {
            chunk_max_features: layer
                .chunk_max_features
                .unwrap_or(params.chunk_max_features),
            simplify_tolerance: layer
                .simplify_tolerance
                .unwrap_or(params.simplify_tolerance),
        })
    }
}

/// Pipeline settings (ambient behaviour, not dataset definitions)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Upper bound on a single archive download, in seconds
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,

    /// Draw a progress bar while downloading
    #[serde(default = "default_true")]
    pub show_progress: bool,

    /// Log level for diagnostic output
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file path (None = stderr)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging (shorthand for log_level = debug)
    #[serde(default)]
    pub verbose: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            download_timeout_secs: default_download_timeout(),
            show_progress: true,
            log_level: LogLevel::default(),
            log_file: None,
            verbose: false,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| {
            PipelineError::Config(format!("Invalid settings file {}: {}", path.display(), e))
        })
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Convert to tracing Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_download_timeout() -> u64 {
    60
}
