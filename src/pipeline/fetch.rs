/*!
 * Fetch stage
 *
 * Downloads each layer's zipped shapefile archive into `data-in/{output_dir}/`
 * and unpacks it next to the archive. Both steps are skipped when their
 * output already exists, so re-running is cheap.
 */

use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::{LayerCatalog, LayerConfig, Settings};
use crate::error::{PipelineError, Result};
use crate::paths::RepoPaths;
use crate::report::FetchReport;

/// Suffix for an in-flight download
const PARTIAL_SUFFIX: &str = ".part";

/// What happened to one layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayerFetch {
    pub downloaded: bool,
    pub extracted: bool,
}

/// Last path segment of `url`, ignoring any query string or fragment
pub fn archive_file_name(url: &str) -> Option<String> {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let path = without_fragment.split('?').next().unwrap_or(without_fragment);
    path.rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// Directory an archive unpacks into: the archive path minus `.zip`
pub fn extraction_dir(zip_path: &Path) -> PathBuf {
    let is_zip = zip_path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
    match (is_zip, zip_path.file_stem()) {
        (true, Some(stem)) => zip_path.with_file_name(stem),
        _ => {
            let mut name = zip_path.as_os_str().to_os_string();
            name.push("_extracted");
            PathBuf::from(name)
        }
    }
}

/// Blocking HTTP downloader with a whole-request timeout
pub struct Downloader {
    client: reqwest::blocking::Client,
    show_progress: bool,
}

impl Downloader {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.download_timeout_secs))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PipelineError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            show_progress: settings.show_progress,
        })
    }

    /// Download `url` to `dest` unless `dest` already exists
    ///
    /// Returns `true` when a download happened. The body is streamed to a
    /// sibling `.part` file and renamed into place once complete.
    pub fn download_file(&self, url: &str, dest: &Path) -> Result<bool> {
        debug!("Preparing to download file from URL: {}", url);
        debug!("Destination path: {}", dest.display());

        if dest.exists() {
            info!("Skipping download. File already exists: {}", dest.display());
            return Ok(false);
        }

        info!("Downloading: {}", url);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut partial = dest.as_os_str().to_os_string();
        partial.push(PARTIAL_SUFFIX);
        let partial = PathBuf::from(partial);

        match self.stream_to(url, &partial) {
            Ok(bytes) => {
                fs::rename(&partial, dest)?;
                info!("Downloaded file saved to: {} ({} bytes)", dest.display(), bytes);
                Ok(true)
            }
            Err(e) => {
                let _ = fs::remove_file(&partial);
                error!("Failed to download {}. Error: {}", url, e);
                Err(e)
            }
        }
    }

    fn stream_to(&self, url: &str, path: &Path) -> Result<u64> {
        let download_err = |message: String| PipelineError::Download {
            url: url.to_string(),
            message,
        };

        let mut response = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| download_err(e.to_string()))?;

        let progress = match (self.show_progress, response.content_length()) {
            (true, Some(len)) => {
                let pb = ProgressBar::new(len);
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("#>-"),
                );
                pb
            }
            _ => ProgressBar::hidden(),
        };

        let file = File::create(path)?;
        let mut writer = progress.wrap_write(BufWriter::new(file));
        let copied = io::copy(&mut response, &mut writer)
            .and_then(|n| writer.flush().map(|_| n))
            .map_err(|e| download_err(e.to_string()));
        progress.finish_and_clear();
        copied
    }
}

/// Unpack `zip_path` into `extract_to` unless the target already exists
///
/// Returns `true` when an extraction happened.
pub fn extract_zip(zip_path: &Path, extract_to: &Path) -> Result<bool> {
    debug!("Preparing to extract zip: {}", zip_path.display());
    debug!("Extraction target: {}", extract_to.display());

    if !zip_path.exists() {
        return Err(PipelineError::Archive {
            path: zip_path.to_path_buf(),
            message: "zip file does not exist".to_string(),
        });
    }

    if extract_to.exists() {
        info!(
            "Skipping extraction. Folder already exists: {}",
            extract_to.display()
        );
        return Ok(false);
    }

    info!("Extracting {} to {}", zip_path.display(), extract_to.display());

    let result = File::open(zip_path)
        .map_err(zip::result::ZipError::Io)
        .and_then(zip::ZipArchive::new)
        .and_then(|mut archive| archive.extract(extract_to));

    match result {
        Ok(()) => {
            info!("Extraction complete: {}", extract_to.display());
            Ok(true)
        }
        Err(e) => {
            if extract_to.exists() {
                let _ = fs::remove_dir_all(extract_to);
            }
            Err(PipelineError::Archive {
                path: zip_path.to_path_buf(),
                message: e.to_string(),
            })
        }
    }
}

/// Download and unpack one layer
pub fn process_layer(
    paths: &RepoPaths,
    downloader: &Downloader,
    layer: &LayerConfig,
) -> Result<LayerFetch> {
    debug!("Processing layer config: {:?}", layer);

    let output_dir = paths.layer_in(layer.require_output_dir()?);
    fs::create_dir_all(&output_dir)?;
    info!("Output directory ensured: {}", output_dir.display());

    let url = layer.require_url()?;
    let file_name = archive_file_name(url).ok_or_else(|| {
        PipelineError::Config(format!(
            "URL for layer {} has no file name: {}",
            layer.label(),
            url
        ))
    })?;
    let zip_path = output_dir.join(&file_name);
    let extract_path = extraction_dir(&zip_path);

    let downloaded = downloader.download_file(url, &zip_path)?;
    let extracted = extract_zip(&zip_path, &extract_path)?;

    Ok(LayerFetch {
        downloaded,
        extracted,
    })
}

/// Fetch every configured layer, stopping at the first failure
pub fn run(paths: &RepoPaths, settings: &Settings) -> Result<FetchReport> {
    info!("Starting data download process for forest layers...");
    let config_dir = paths.config_dir();
    info!("Searching for YAML configs in {}", config_dir.display());

    let catalog = LayerCatalog::load_strict(&config_dir)?;
    info!(
        "Found {} YAML config file(s) in: {}",
        catalog.files.len(),
        config_dir.display()
    );

    let downloader = Downloader::new(settings)?;
    let mut report = FetchReport::default();

    for layer in &catalog.layers {
        let outcome = process_layer(paths, &downloader, layer).inspect_err(|_| {
            error!("Failed processing layer: {}", layer.label());
        })?;

        report.layers += 1;
        if outcome.downloaded {
            report.downloaded += 1;
        } else {
            report.download_skipped += 1;
        }
        if outcome.extracted {
            report.extracted += 1;
        } else {
            report.extract_skipped += 1;
        }
    }

    info!("All forest layers fetched and extracted successfully.");
    Ok(report)
}
