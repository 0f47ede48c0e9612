/*!
 * forest-bounds - US Forest Service boundary pipeline
 *
 * Turns the Forest Service's zipped boundary shapefiles into web-ready
 * GeoJSON:
 * - fetch: download and unpack layer archives
 * - export: shapefile to GeoJSON, with optional simplification and split
 * - chunk: cap features per output file
 * - index: bounding-box manifest of every output file
 * - cleanup: remove raw and intermediate data
 *
 * Layers are declared in `.yaml` files under `data-config/`.
 */

pub mod cli_style;
pub mod config;
pub mod error;
pub mod logging;
pub mod paths;
pub mod pipeline;
pub mod report;
pub mod spatial;

// Re-export commonly used types
pub use config::{ChunkParams, LayerCatalog, LayerConfig, Settings};
pub use error::{PipelineError, Result};
pub use paths::RepoPaths;
pub use spatial::GeoTable;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
