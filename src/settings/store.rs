//! JSON-file settings store with a change stream.

use super::Settings;
use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

/// Owns the current [`Settings`] and publishes every change.
///
/// Subscribers receive whole `Arc<Settings>` values; a value is never
/// mutated after it has been published.
#[derive(Debug)]
pub struct SettingsStore {
    path: Option<PathBuf>,
    tx: watch::Sender<Arc<Settings>>,
    write_lock: Mutex<()>,
}

impl SettingsStore {
    /// Store that never touches the filesystem.
    pub fn in_memory(settings: Settings) -> Self {
        Self::with_path(None, settings)
    }

    fn with_path(path: Option<PathBuf>, settings: Settings) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(settings));
        Self {
            path,
            tx,
            write_lock: Mutex::new(()),
        }
    }

    /// Opens the settings file at `path`.
    ///
    /// A missing file yields defaults. Malformed content is logged and
    /// replaced by defaults. Other I/O errors are returned.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, NetError> {
        let path = path.as_ref().to_path_buf();
        let path_str = path.display().to_string();

        let settings = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Settings::from_json_str(&contents).unwrap_or_else(|e| {
                tracing::warn!(path = %path_str, error = %e, "malformed settings file, using defaults");
                Settings::default()
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path_str, "settings file not found, using defaults");
                Settings::default()
            }
            Err(e) => return Err(e).settings_context(&path_str),
        };

        Ok(Self::with_path(Some(path), settings))
    }

    /// Current settings.
    pub fn current(&self) -> Arc<Settings> {
        self.tx.borrow().clone()
    }

    /// Change stream. The receiver starts at the current value.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Settings>> {
        self.tx.subscribe()
    }

    /// Applies `f` to a copy of the current settings, persists the result and
    /// publishes it.
    ///
    /// Nothing is published when persisting fails.
    pub async fn update<F>(&self, f: F) -> Result<Arc<Settings>, NetError>
    where
        F: FnOnce(&mut Settings),
    {
        let _guard = self.write_lock.lock().await;

        let mut next = (*self.current()).clone();
        f(&mut next);
        if *self.current() == next {
            return Ok(self.current());
        }

        if let Some(path) = &self.path {
            let json = next.to_json_string()?;
            tokio::fs::write(path, json)
                .await
                .settings_context(&path.display().to_string())?;
        }

        let next = Arc::new(next);
        self.tx.send_replace(Arc::clone(&next));
        tracing::debug!("settings updated");
        Ok(next)
    }
}
