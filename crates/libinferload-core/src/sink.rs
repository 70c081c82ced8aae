//! Append-only sinks for per-attempt and per-batch summary lines

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{BenchError, Result};

/// Receives one formatted line per attempt or summary
pub trait SummarySink: Send + Sync {
    fn record(&self, line: &str) -> Result<()>;
}

/// Timestamped lines appended to a file
pub struct FileSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileSink {
    /// Open `path` for appending, creating it if needed
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SummarySink for FileSink {
    fn record(&self, line: &str) -> Result<()> {
        let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S,%3f");
        let mut file = self
            .file
            .lock()
            .map_err(|_| BenchError::Io(std::io::Error::other("log file lock poisoned")))?;
        writeln!(file, "{} {}", stamp, line)?;
        file.flush()?;
        Ok(())
    }
}

/// Keeps lines in memory
#[derive(Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl SummarySink for MemorySink {
    fn record(&self, line: &str) -> Result<()> {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
        Ok(())
    }
}
