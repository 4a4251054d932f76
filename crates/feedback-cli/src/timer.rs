//! A [`ReviewTimerCache`] persisted as a small TOML file, so the review
//! countdown survives between `feedback prize` invocations.

use std::{
  collections::BTreeMap,
  path::{Path, PathBuf},
};

use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use feedback_core::{IdentityKey, gate::ReviewTimerCache};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize)]
struct TimerFile {
  #[serde(default)]
  reviewed_at: BTreeMap<String, DateTime<Utc>>,
}

#[derive(Debug)]
pub struct FileTimerCache {
  path: PathBuf,
  file: TimerFile,
}

impl FileTimerCache {
  /// Load the cache at `path`. A missing file is an empty cache.
  pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
    let path = path.into();
    let file = match std::fs::read_to_string(&path) {
      Ok(raw) => toml::from_str(&raw)
        .with_context(|| format!("parsing timer cache {}", path.display()))?,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => TimerFile::default(),
      Err(e) => {
        return Err(e).with_context(|| format!("reading timer cache {}", path.display()));
      }
    };
    Ok(Self { path, file })
  }

  pub fn path(&self) -> &Path { &self.path }

  pub fn save(&self) -> Result<()> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)
        .with_context(|| format!("creating {}", parent.display()))?;
    }
    let raw = toml::to_string_pretty(&self.file).context("encoding timer cache")?;
    std::fs::write(&self.path, raw)
      .with_context(|| format!("writing timer cache {}", self.path.display()))
  }
}

impl ReviewTimerCache for FileTimerCache {
  fn reviewed_at(&self, key: &IdentityKey) -> Option<DateTime<Utc>> {
    self.file.reviewed_at.get(key.as_str()).copied()
  }

  fn set_reviewed_at(&mut self, key: &IdentityKey, at: DateTime<Utc>) {
    self.file.reviewed_at.insert(key.as_str().to_owned(), at);
  }
}
