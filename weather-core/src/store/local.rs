use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::Mutex};

use super::{DataStore, EventStore};
use crate::{Event, WeatherError};

/// Writes each object as a file inside one directory.
#[derive(Debug)]
pub struct LocalFileDataStore {
    directory: PathBuf,
}

impl LocalFileDataStore {
    /// Create `directory` if needed; urls are built from its canonical path.
    pub fn new(directory: impl AsRef<Path>) -> Result<Self, WeatherError> {
        let directory = directory.as_ref();
        let target = directory.display().to_string();

        std::fs::create_dir_all(directory).map_err(|e| WeatherError::storage(&target, e))?;
        let directory = directory
            .canonicalize()
            .map_err(|e| WeatherError::storage(&target, e))?;

        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

#[async_trait]
impl DataStore for LocalFileDataStore {
    async fn put_object(&self, object_name: &str, data: Vec<u8>) -> Result<String, WeatherError> {
        if object_name.is_empty() || object_name.contains(['/', '\\']) || object_name.starts_with('.') {
            return Err(WeatherError::storage(
                object_name,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "invalid object name"),
            ));
        }

        let path = self.directory.join(object_name);
        let url = path.display().to_string();

        tokio::fs::write(&path, data)
            .await
            .map_err(|e| WeatherError::storage(&url, e))?;

        tracing::debug!(url = %url, "Stored weather object");
        Ok(url)
    }
}

/// Append-log of events, one JSON object per line.
#[derive(Debug)]
pub struct LocalEventStore {
    file_path: PathBuf,
    write_lock: Mutex<()>,
}

impl LocalEventStore {
    /// Create the parent directory of `file_path` if needed.
    pub fn new(file_path: impl AsRef<Path>) -> Result<Self, WeatherError> {
        let file_path = file_path.as_ref().to_path_buf();

        if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| WeatherError::storage(parent.display().to_string(), e))?;
        }

        Ok(Self {
            file_path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Read back every event in the log, oldest first.
    pub async fn read_events(&self) -> Result<Vec<Event>, WeatherError> {
        let contents = match tokio::fs::read_to_string(&self.file_path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(WeatherError::storage(self.file_path.display().to_string(), e)),
        };

        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(WeatherError::from))
            .collect()
    }
}

#[async_trait]
impl EventStore for LocalEventStore {
    async fn put_event(&self, event: &Event) -> Result<(), WeatherError> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let target = self.file_path.display().to_string();
        let _guard = self.write_lock.lock().await;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)
            .await
            .map_err(|e| WeatherError::storage(&target, e))?;

        file.write_all(line.as_bytes())
            .await
            .map_err(|e| WeatherError::storage(&target, e))?;
        file.flush().await.map_err(|e| WeatherError::storage(&target, e))?;

        tracing::debug!(event_id = %event.id(), "Appended event");
        Ok(())
    }
}
