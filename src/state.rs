//! Handles carried between sub-commands, persisted as JSON in the data dir.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::Result, sampler::StagedCorpus, summarize::EndpointHandle, topics::JobHandle,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    #[serde(default)]
    pub staged: Option<StagedCorpus>,
    #[serde(default)]
    pub job: Option<JobHandle>,
    #[serde(default)]
    pub endpoint: Option<EndpointHandle>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RunState {
    /// Load the state file, or an empty state when none exists yet.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.updated_at = Some(Utc::now());
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        debug!(path = %path.display(), "saved run state");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageLocation;

    #[test]
    fn missing_file_is_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let state = RunState::load(&dir.path().join("state.json")).unwrap();
        assert_eq!(state, RunState::default());
    }

    #[test]
    fn save_then_load_keeps_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/state.json");
        let mut state = RunState {
            job: Some(JobHandle {
                job_id: "abc".into(),
                job_name: "digest".into(),
                submitted_at: Utc::now(),
            }),
            staged: Some(StagedCorpus {
                location: StorageLocation::new("work", "staged/"),
                keys: vec!["staged/a.txt".into()],
                local_dir: dir.path().join("staged"),
                local_files: vec![dir.path().join("staged/a.txt")],
            }),
            ..RunState::default()
        };
        state.save(&path).unwrap();
        let loaded = RunState::load(&path).unwrap();
        assert_eq!(loaded, state);
    }
}
