//! Snapshot and screen recording.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::ar::Snapshot;
use crate::error::Result;
use crate::protocol::Command;

use super::ArSession;

/// Path the native recorder returns when it cannot start.
const RECORDING_ERROR: &str = "error";

// ============================================================================
// ArSession - Media
// ============================================================================

impl ArSession {
    /// Captures the current AR view.
    ///
    /// # Errors
    ///
    /// - [`Error::SessionDisposed`](crate::Error::SessionDisposed) after dispose
    /// - transport errors from the channel
    /// - [`Error::Decode`](crate::Error::Decode) if the payload is empty or
    ///   not image bytes
    pub async fn snapshot(&self) -> Result<Snapshot> {
        let value = self.inner.invoke(Command::Snapshot).await?;
        let snapshot = Snapshot::from_value(&value)?;
        debug!(session_id = %self.inner.session_id, bytes = snapshot.as_bytes().len(), "Snapshot captured");
        Ok(snapshot)
    }

    /// Starts recording the AR view to `path`.
    ///
    /// Returns the path the native layer records to, or `None` if recording
    /// could not start.
    pub async fn start_recording(&self, path: impl AsRef<Path>) -> Option<PathBuf> {
        let path = path.as_ref().to_string_lossy().into_owned();
        let value = self.inner.query(Command::StartRecording { path }).await?;

        match value.as_str() {
            Some(RECORDING_ERROR) | Some("") | None => None,
            Some(resolved) => Some(PathBuf::from(resolved)),
        }
    }

    /// Stops the running recording.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionDisposed`](crate::Error::SessionDisposed)
    /// after dispose, or the channel's transport error.
    pub async fn stop_recording(&self) -> Result<()> {
        self.inner.invoke(Command::StopRecording).await?;
        Ok(())
    }

    /// Returns the length of the recording at `path`.
    ///
    /// `None` if the file is unknown to the native layer or the query fails.
    pub async fn record_length(&self, path: impl AsRef<Path>) -> Option<Duration> {
        let path = path.as_ref().to_string_lossy().into_owned();
        let value = self.inner.query(Command::GetRecordLength { path }).await?;
        millis(&value)
    }
}

/// Reads a non-negative millisecond count.
fn millis(value: &Value) -> Option<Duration> {
    let ms = value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))?;
    u64::try_from(ms).ok().map(Duration::from_millis)
}

// ============================================================================
// Tests
// ============================================================================
