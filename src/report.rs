/*!
 * Per-stage run summaries
 *
 * Each stage returns a small counter struct. The CLI prints it as a table,
 * or as JSON with `--json`.
 */

use serde::Serialize;

/// Common surface of every stage summary
pub trait StageReport {
    /// Stage name used in headings
    fn stage(&self) -> &'static str;

    /// Label/value pairs shown in the summary table
    fn summary_rows(&self) -> Vec<(&'static str, String)>;

    /// Whether any input was dropped along the way
    fn has_failures(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FetchReport {
    pub layers: usize,
    pub downloaded: usize,
    pub download_skipped: usize,
    pub extracted: usize,
    pub extract_skipped: usize,
}

impl StageReport for FetchReport {
    fn stage(&self) -> &'static str {
        "fetch"
    }

    fn summary_rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Layers", self.layers.to_string()),
            ("Downloaded", self.downloaded.to_string()),
            ("Already downloaded", self.download_skipped.to_string()),
            ("Extracted", self.extracted.to_string()),
            ("Already extracted", self.extract_skipped.to_string()),
        ]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    pub layers: usize,
    pub layers_skipped: usize,
    pub files_written: usize,
    pub files_failed: usize,
}

impl StageReport for ExportReport {
    fn stage(&self) -> &'static str {
        "export"
    }

    fn summary_rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Layers", self.layers.to_string()),
            ("Layers skipped", self.layers_skipped.to_string()),
            ("GeoJSON written", self.files_written.to_string()),
            ("Unreadable inputs", self.files_failed.to_string()),
        ]
    }

    fn has_failures(&self) -> bool {
        self.files_failed > 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChunkReport {
    pub layers: usize,
    pub layers_skipped: usize,
    pub files_copied: usize,
    pub files_chunked: usize,
    pub chunk_parts: usize,
    pub files_skipped: usize,
}

impl StageReport for ChunkReport {
    fn stage(&self) -> &'static str {
        "chunk"
    }

    fn summary_rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Layers", self.layers.to_string()),
            ("Layers skipped", self.layers_skipped.to_string()),
            ("Copied", self.files_copied.to_string()),
            ("Chunked", self.files_chunked.to_string()),
            ("Chunk files", self.chunk_parts.to_string()),
            ("Skipped entries", self.files_skipped.to_string()),
        ]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub scanned: usize,
    pub indexed: usize,
    pub omitted: usize,
    pub chunked_indexed: usize,
}

impl StageReport for IndexReport {
    fn stage(&self) -> &'static str {
        "index"
    }

    fn summary_rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("GeoJSON scanned", self.scanned.to_string()),
            ("Indexed", self.indexed.to_string()),
            ("Omitted", self.omitted.to_string()),
            ("Chunked subset", self.chunked_indexed.to_string()),
        ]
    }

    fn has_failures(&self) -> bool {
        self.omitted > 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub zips_deleted: usize,
    pub dirs_deleted: usize,
    pub intermediate_removed: bool,
}

impl StageReport for CleanupReport {
    fn stage(&self) -> &'static str {
        "cleanup"
    }

    fn summary_rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Archives deleted", self.zips_deleted.to_string()),
            ("Shapefile dirs deleted", self.dirs_deleted.to_string()),
            (
                "Intermediate tree removed",
                if self.intermediate_removed { "yes" } else { "no" }.to_string(),
            ),
        ]
    }
}

/// Everything `all` ran, in order
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineReport {
    pub fetch: FetchReport,
    pub export: ExportReport,
    pub chunk: ChunkReport,
    pub index: IndexReport,
}
