//! Frame acquisition: live MJPEG streams and offline image directories.

use image::{ImageFormat, RgbImage};
use log::{debug, info};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_STREAM_PORT: u16 = 8000;
pub const DEFAULT_STREAM_PATH: &str = "/video_feed";

const READ_CHUNK: usize = 16 * 1024;
const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

#[derive(thiserror::Error, Debug)]
pub enum FrameSourceError {
    #[error("stream request to {url} failed: {reason}")]
    Connect { url: String, reason: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("frame decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("no image files in {}", .0.display())]
    Empty(PathBuf),
}

/// Pull-based frame provider.
pub trait FrameSource {
    /// Next frame, `Ok(None)` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<RgbImage>, FrameSourceError>;

    /// Release the underlying connection or handles.
    fn release(&mut self) {}
}

/// `http://<ip>:<port><path>`.
pub fn stream_url(ip: &str, port: u16, path: &str) -> String {
    let path = path.trim_start_matches('/');
    format!("http://{ip}:{port}/{path}")
}

/// JPEG frames cut out of a `multipart/x-mixed-replace` byte stream.
///
/// Part headers are not parsed; frames are delimited by their SOI and EOI
/// markers. Nested SOI/EOI pairs, such as an EXIF thumbnail, stay inside the
/// enclosing frame.
pub struct MjpegSource {
    reader: Option<Box<dyn Read + Send>>,
    buf: Vec<u8>,
    eof: bool,
}

impl MjpegSource {
    /// Open `url`; `timeout` bounds connecting and each read.
    pub fn connect(url: &str, timeout: Duration) -> Result<Self, FrameSourceError> {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .build();
        let resp = agent
            .get(url)
            .call()
            .map_err(|e| FrameSourceError::Connect {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        info!(
            "connected to {url} ({})",
            resp.header("Content-Type").unwrap_or("no content type")
        );
        Ok(Self::from_reader(resp.into_reader()))
    }

    pub fn from_reader(reader: impl Read + Send + 'static) -> Self {
        Self {
            reader: Some(Box::new(reader)),
            buf: Vec::new(),
            eof: false,
        }
    }

    /// Byte range of the first complete JPEG in the buffer.
    fn complete_frame(&self) -> Option<(usize, usize)> {
        let start = find(&self.buf, &SOI, 0)?;
        let mut depth = 1usize;
        let mut i = start + SOI.len();
        while i + 1 < self.buf.len() {
            let pair = [self.buf[i], self.buf[i + 1]];
            if pair == SOI {
                depth += 1;
                i += 2;
            } else if pair == EOI {
                depth -= 1;
                i += 2;
                if depth == 0 {
                    return Some((start, i));
                }
            } else {
                i += 1;
            }
        }
        None
    }

    fn fill(&mut self) -> Result<(), FrameSourceError> {
        let Some(reader) = self.reader.as_mut() else {
            self.eof = true;
            return Ok(());
        };
        let mut chunk = [0u8; READ_CHUNK];
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            self.eof = true;
        } else {
            self.buf.extend_from_slice(&chunk[..n]);
        }
        Ok(())
    }
}

impl FrameSource for MjpegSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>, FrameSourceError> {
        loop {
            if let Some((start, end)) = self.complete_frame() {
                let decoded = image::load_from_memory_with_format(
                    &self.buf[start..end],
                    ImageFormat::Jpeg,
                );
                self.buf.drain(..end);
                return Ok(Some(decoded?.to_rgb8()));
            }
            if find(&self.buf, &SOI, 0).is_none() && self.buf.len() > 1 {
                // Keep a possible leading 0xFF of a split marker.
                let keep = self.buf.len() - 1;
                self.buf.drain(..keep);
            }
            if self.eof {
                return Ok(None);
            }
            self.fill()?;
        }
    }

    fn release(&mut self) {
        self.reader = None;
        self.buf.clear();
    }
}

fn find(haystack: &[u8], needle: &[u8; 2], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(2)
        .position(|w| w == needle)
        .map(|i| i + from)
}

/// Every image file of a directory, in lexicographic order.
pub struct DirectorySource {
    files: Vec<PathBuf>,
    next: usize,
}

impl DirectorySource {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, FrameSourceError> {
        let dir = dir.as_ref();
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && is_image(&path) {
                files.push(path);
            }
        }
        if files.is_empty() {
            return Err(FrameSourceError::Empty(dir.to_path_buf()));
        }
        files.sort();
        debug!("{} frames in {}", files.len(), dir.display());
        Ok(Self { files, next: 0 })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| matches!(e.as_str(), "jpg" | "jpeg" | "png" | "bmp"))
}

impl FrameSource for DirectorySource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>, FrameSourceError> {
        let Some(path) = self.files.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;
        Ok(Some(image::open(path)?.to_rgb8()))
    }

    fn release(&mut self) {
        self.next = self.files.len();
    }
}
