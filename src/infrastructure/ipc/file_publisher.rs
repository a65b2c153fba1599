//! File-based state publisher adapter

use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use crate::application::ports::{PublishError, StatePublisher};
use crate::domain::session::DaemonState;

use super::IpcPaths;

/// Publishes daemon state to small text files external UIs poll.
///
/// Every write replaces the whole artifact through a rename, so a reader
/// polling mid-write never observes a torn value.
pub struct FilePublisher {
    paths: IpcPaths,
    last_interim: Mutex<String>,
}

impl FilePublisher {
    /// Create a publisher over the given artifact paths
    pub fn new(paths: IpcPaths) -> Self {
        Self {
            paths,
            last_interim: Mutex::new(String::new()),
        }
    }

    /// Remove all artifacts this publisher owns (daemon shutdown)
    pub fn remove_artifacts(&self) {
        let _ = fs::remove_file(self.paths.state_path());
        let _ = fs::remove_file(self.paths.interim_path());
    }

    fn write_atomic(&self, path: &Path, value: &str) -> Result<(), PublishError> {
        let dir = path
            .parent()
            .ok_or_else(|| PublishError::WriteFailed("artifact path has no parent".into()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| PublishError::WriteFailed(e.to_string()))?;

        tmp.write_all(value.as_bytes())
            .and_then(|_| tmp.flush())
            .map_err(|e| PublishError::WriteFailed(e.to_string()))?;

        tmp.persist(path)
            .map_err(|e| PublishError::WriteFailed(e.to_string()))?;

        Ok(())
    }
}

impl StatePublisher for FilePublisher {
    fn publish_state(&self, state: DaemonState) -> Result<(), PublishError> {
        self.write_atomic(&self.paths.state_path(), state.as_str())
    }

    fn publish_interim(&self, text: &str) -> Result<(), PublishError> {
        // A pause in partial results must not blank what is shown, and an
        // update may never regress to an older (shorter prefix) partial.
        if text.trim().is_empty() {
            return Ok(());
        }

        {
            let mut last = self.last_interim.lock().unwrap_or_else(|e| e.into_inner());
            if last.starts_with(text) && text.len() < last.len() {
                return Ok(());
            }
            *last = text.to_string();
        }

        self.write_atomic(&self.paths.interim_path(), text)
    }

    fn clear_interim(&self) -> Result<(), PublishError> {
        {
            let mut last = self.last_interim.lock().unwrap_or_else(|e| e.into_inner());
            last.clear();
        }

        match fs::remove_file(self.paths.interim_path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PublishError::WriteFailed(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publisher() -> (FilePublisher, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let paths = IpcPaths::in_dir(dir.path());
        (FilePublisher::new(paths), dir)
    }

    #[test]
    fn state_is_written_as_lowercase_token() {
        let (publisher, dir) = publisher();

        publisher.publish_state(DaemonState::Recording).unwrap();

        let content = fs::read_to_string(dir.path().join("voxd.state")).unwrap();
        assert_eq!(content, "recording");
    }

    #[test]
    fn state_writes_replace_whole_value() {
        let (publisher, dir) = publisher();

        publisher.publish_state(DaemonState::Transcribing).unwrap();
        publisher.publish_state(DaemonState::Done).unwrap();

        let content = fs::read_to_string(dir.path().join("voxd.state")).unwrap();
        assert_eq!(content, "done");
    }

    #[test]
    fn interim_is_published_and_cleared() {
        let (publisher, dir) = publisher();
        let interim_path = dir.path().join("voxd.interim");

        publisher.publish_interim("hello wor").unwrap();
        assert_eq!(fs::read_to_string(&interim_path).unwrap(), "hello wor");

        publisher.clear_interim().unwrap();
        assert!(!interim_path.exists());
    }

    #[test]
    fn empty_interim_updates_do_not_blank_the_artifact() {
        let (publisher, dir) = publisher();
        let interim_path = dir.path().join("voxd.interim");

        publisher.publish_interim("hello world").unwrap();
        publisher.publish_interim("").unwrap();
        publisher.publish_interim("   ").unwrap();

        assert_eq!(fs::read_to_string(&interim_path).unwrap(), "hello world");
    }

    #[test]
    fn interim_never_regresses_to_an_older_partial() {
        let (publisher, dir) = publisher();
        let interim_path = dir.path().join("voxd.interim");

        publisher.publish_interim("hello world and").unwrap();
        // A stale shorter prefix arrives late
        publisher.publish_interim("hello world").unwrap();

        assert_eq!(
            fs::read_to_string(&interim_path).unwrap(),
            "hello world and"
        );
    }

    #[test]
    fn interim_can_change_after_session_reset() {
        let (publisher, dir) = publisher();
        let interim_path = dir.path().join("voxd.interim");

        publisher.publish_interim("first session text").unwrap();
        publisher.clear_interim().unwrap();
        publisher.publish_interim("first").unwrap();

        assert_eq!(fs::read_to_string(&interim_path).unwrap(), "first");
    }

    #[test]
    fn clear_interim_is_idempotent() {
        let (publisher, _dir) = publisher();
        publisher.clear_interim().unwrap();
        publisher.clear_interim().unwrap();
    }

    #[test]
    fn remove_artifacts_cleans_up() {
        let (publisher, dir) = publisher();

        publisher.publish_state(DaemonState::Idle).unwrap();
        publisher.publish_interim("partial").unwrap();
        publisher.remove_artifacts();

        assert!(!dir.path().join("voxd.state").exists());
        assert!(!dir.path().join("voxd.interim").exists());
    }
}
