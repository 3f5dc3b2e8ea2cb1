//! JSONL audit log of value changes.
//!
//! Each [`ValueChange`] is serialized as a single JSON line with a `type`
//! field and a `timestamp`, appended to the file via a buffered writer.

use regpilot_application::ports::change_notifier::{ChangeNotifier, NotifyError};
use regpilot_domain::ValueChange;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

const RECORD_TYPE: &str = "value_change";

/// Append-only change log writing one JSON object per line.
///
/// Thread-safe via `Mutex<BufWriter<File>>`. Flushes after every record and
/// on `Drop`.
pub struct JsonlChangeLog {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl JsonlChangeLog {
    /// Open `path` for appending.
    ///
    /// Creates the file (and parent directories) if they don't exist.
    /// Returns `None` if the file cannot be opened.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!("Could not create audit log directory {}: {}", parent.display(), e);
            return None;
        }

        let file = match OpenOptions::new().create(true).append(true).open(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Could not open audit log {}: {}", path.display(), e);
                return None;
            }
        };

        Some(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ChangeNotifier for JsonlChangeLog {
    fn publish(&self, change: &ValueChange) -> Result<(), NotifyError> {
        let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

        let mut record =
            serde_json::to_value(change).map_err(|e| NotifyError::Serialization(e.to_string()))?;
        if let serde_json::Value::Object(map) = &mut record {
            map.insert("type".to_string(), RECORD_TYPE.into());
            map.insert("timestamp".to_string(), timestamp.into());
        }
        let line =
            serde_json::to_string(&record).map_err(|e| NotifyError::Serialization(e.to_string()))?;

        let mut writer = self.writer.lock().map_err(|_| NotifyError::Closed)?;
        writeln!(writer, "{}", line).map_err(|e| NotifyError::Io(e.to_string()))?;
        writer.flush().map_err(|e| NotifyError::Io(e.to_string()))
    }
}

impl Drop for JsonlChangeLog {
    fn drop(&mut self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}
