//! Per-directory execution context and the user-visible log sink.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Local;
use tracing::warn;

use crate::error::CiResult;

/// Shared, line-oriented transcript writer (stdout or a per-directory file).
///
/// Clones write to the same destination; each line is flushed as written so
/// streamed subprocess output shows up immediately.
#[derive(Clone)]
pub struct LogSink {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl std::fmt::Debug for LogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSink").finish_non_exhaustive()
    }
}

impl LogSink {
    pub fn from_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    pub fn stdout() -> Self {
        Self::from_writer(io::stdout())
    }

    pub fn create_file(path: &Path) -> io::Result<Self> {
        Ok(Self::from_writer(File::create(path)?))
    }

    /// Stdout without a log directory, else `<log_dir>/<YYYY-mm-dd_HH:MM:SS>_<dir name>.log`.
    pub fn for_directory(log_dir: Option<&Path>, dir: &Path) -> CiResult<Self> {
        match log_dir {
            None => Ok(Self::stdout()),
            Some(log_dir) => {
                std::fs::create_dir_all(log_dir)?;
                let name = format!(
                    "{}_{}.log",
                    Local::now().format("%Y-%m-%d_%H:%M:%S"),
                    dir_basename(dir)
                );
                Ok(Self::create_file(&log_dir.join(name))?)
            }
        }
    }

    /// Write raw text, flushing afterwards. Failures are reported through tracing only.
    pub fn write_str(&self, text: &str) {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = guard.write_all(text.as_bytes()).and_then(|_| guard.flush()) {
            warn!(error = %e, "failed to write to log sink");
        }
    }

    /// Write one line.
    pub fn line(&self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if text.ends_with('\n') {
            self.write_str(text);
        } else {
            self.write_str(&format!("{}\n", text));
        }
    }
}

/// In-memory writer, handy for capturing a transcript.
#[derive(Debug, Clone, Default)]
pub struct MemoryLog(Arc<Mutex<Vec<u8>>>);

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink writing into this buffer.
    pub fn sink(&self) -> LogSink {
        LogSink::from_writer(self.clone())
    }

    pub fn contents(&self) -> String {
        let buf = self.0.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl Write for MemoryLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.0.lock().unwrap_or_else(|e| e.into_inner());
        inner.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Last path component, or the whole path when it has none.
pub fn dir_basename(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.to_string_lossy().into_owned())
}

/// What every stage sees for one input directory. Fixed for the directory's run.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    input_dir: PathBuf,
    output_dir: PathBuf,
    log: LogSink,
}

impl ExecutionContext {
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>, log: LogSink) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            log,
        }
    }

    /// The project directory being analysed.
    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    /// Where generated files (diagnostics, report) go.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn log(&self) -> &LogSink {
        &self.log
    }

    /// `<input_dir>/<build_dir>`.
    pub fn build_path(&self, build_dir: &str) -> PathBuf {
        self.input_dir.join(build_dir)
    }
}
