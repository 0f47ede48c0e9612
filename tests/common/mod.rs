/*!
 * Shared fixtures for integration tests
 *
 * Writes small point shapefiles, zips them, and serves bytes over a local
 * HTTP listener so the whole pipeline runs without network access.
 */

#![allow(dead_code)]

use std::fs;
use std::io::{Cursor, Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

pub const NAME_FIELD_LEN: usize = 40;

/// Temporary repository root with a `data-config/` folder
pub fn temp_repo(layers_yaml: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("data-config")).unwrap();
    fs::write(dir.path().join("data-config/layers.yaml"), layers_yaml).unwrap();
    dir
}

/// `.shp` bytes for a point layer
pub fn point_shp(points: &[(f64, f64)]) -> Vec<u8> {
    let record_len = 8 + 20;
    let total = 100 + record_len * points.len();

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&9994i32.to_be_bytes());
    out.extend_from_slice(&[0u8; 20]);
    out.extend_from_slice(&((total / 2) as i32).to_be_bytes());
    out.extend_from_slice(&1000i32.to_le_bytes());
    out.extend_from_slice(&1i32.to_le_bytes());
    out.extend_from_slice(&[0u8; 64]);

    for (i, (x, y)) in points.iter().enumerate() {
        out.extend_from_slice(&(i as i32 + 1).to_be_bytes());
        out.extend_from_slice(&10i32.to_be_bytes());
        out.extend_from_slice(&1i32.to_le_bytes());
        out.extend_from_slice(&x.to_le_bytes());
        out.extend_from_slice(&y.to_le_bytes());
    }
    out
}

/// `.dbf` bytes with a single character column
pub fn name_dbf(column: &str, values: &[&str]) -> Vec<u8> {
    let header_len = 32 + 32 + 1;
    let record_len = 1 + NAME_FIELD_LEN;

    let mut out = vec![0x03, 124, 1, 1];
    out.extend_from_slice(&(values.len() as u32).to_le_bytes());
    out.extend_from_slice(&(header_len as u16).to_le_bytes());
    out.extend_from_slice(&(record_len as u16).to_le_bytes());
    out.extend_from_slice(&[0u8; 20]);

    let mut desc = [0u8; 32];
    desc[..column.len()].copy_from_slice(column.as_bytes());
    desc[11] = b'C';
    desc[16] = NAME_FIELD_LEN as u8;
    out.extend_from_slice(&desc);
    out.push(0x0D);

    for value in values {
        out.push(b' ');
        let mut cell = value.as_bytes().to_vec();
        cell.resize(NAME_FIELD_LEN, b' ');
        out.extend_from_slice(&cell);
    }
    out.push(0x1A);
    out
}

/// Point features on a diagonal, each tagged with `names[i % names.len()]`
pub fn layer_files(stem: &str, column: &str, count: usize, names: &[&str]) -> Vec<(String, Vec<u8>)> {
    let points: Vec<(f64, f64)> = (0..count)
        .map(|i| (-110.0 + i as f64 * 0.001, 40.0 + i as f64 * 0.001))
        .collect();
    let values: Vec<&str> = (0..count).map(|i| names[i % names.len()]).collect();
    vec![
        (format!("{}.shp", stem), point_shp(&points)),
        (format!("{}.dbf", stem), name_dbf(column, &values)),
    ]
}

/// Write shapefile parts into `dir`
pub fn write_files(dir: &Path, files: &[(String, Vec<u8>)]) -> Vec<PathBuf> {
    fs::create_dir_all(dir).unwrap();
    files
        .iter()
        .map(|(name, data)| {
            let path = dir.join(name);
            fs::write(&path, data).unwrap();
            path
        })
        .collect()
}

/// In-memory zip archive of `files`
pub fn zip_bytes(files: &[(String, Vec<u8>)]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in files {
        zip.start_file(name.as_str(), zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Minimal HTTP server answering every GET with `body`
pub struct TestServer {
    pub base_url: String,
    hits: Arc<AtomicUsize>,
}

impl TestServer {
    pub fn serve(body: Vec<u8>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                counter.fetch_add(1, Ordering::SeqCst);

                let not_found = !request.starts_with(b"GET ") || request_path(&request).contains("missing");
                let (status, payload): (&str, &[u8]) = if not_found {
                    ("404 Not Found", b"not found")
                } else {
                    ("200 OK", &body)
                };
                let header = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/zip\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    status,
                    payload.len()
                );
                let _ = stream.write_all(header.as_bytes());
                let _ = stream.write_all(payload);
                let _ = stream.flush();
            }
        });

        Self { base_url, hits }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

fn request_path(request: &[u8]) -> String {
    String::from_utf8_lossy(request)
        .split_whitespace()
        .nth(1)
        .unwrap_or_default()
        .to_string()
}
