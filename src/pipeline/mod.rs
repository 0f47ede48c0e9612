/*!
 * Pipeline stages
 *
 * Each stage reads and writes the repository's data folders and returns a
 * summary report. Stages are independent commands; `run_all` chains the
 * ones that produce output.
 */

pub mod chunk;
pub mod cleanup;
pub mod export;
pub mod fetch;
pub mod index;

use tracing::info;

use crate::config::Settings;
use crate::error::Result;
use crate::paths::RepoPaths;
use crate::report::PipelineReport;

/// Fetch, export, chunk and index in order, stopping at the first failure
pub fn run_all(paths: &RepoPaths, settings: &Settings) -> Result<PipelineReport> {
    let fetch = fetch::run(paths, settings)?;
    let export = export::run(paths)?;
    let chunk = chunk::run(paths)?;
    let index = index::build_index(paths)?;
    info!("Pipeline complete: {} file(s) indexed", index.indexed);

    Ok(PipelineReport {
        fetch,
        export,
        chunk,
        index,
    })
}
