//! Flat-file channel store.
//!
//! The whole list is rewritten on every save. There is no cross-process
//! locking; in-process writers go through [`super::ChannelRegistry`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs;
use tracing::{debug, warn};

use super::model::{Channel, ChannelsFile};
use crate::error::StoreError;

/// Reads and writes `{"channels": [...]}` at a fixed path.
#[derive(Debug, Clone)]
pub struct ChannelStore {
    path: PathBuf,
}

impl ChannelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the channel list. A missing file is an empty list; any other
    /// failure is logged and also yields an empty list.
    pub async fn load(&self) -> Vec<Channel> {
        match self.try_load().await {
            Ok(channels) => channels,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to load channels, starting empty");
                Vec::new()
            }
        }
    }

    /// Strict load: missing file is `Ok(vec![])`, everything else is an error.
    pub async fn try_load(&self) -> Result<Vec<Channel>, StoreError> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Channel file absent");
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let file: ChannelsFile = serde_json::from_str(&raw).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })?;
        ensure_unique_ids(&file.channels)?;
        Ok(file.channels)
    }

    /// Overwrite the file with `channels`.
    pub async fn save(&self, channels: &[Channel]) -> Result<(), StoreError> {
        ensure_unique_ids(channels)?;

        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let body = to_pretty_json(&ChannelsFile {
            channels: channels.to_vec(),
        })
        .map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, body).await.map_err(io_err)?;

        debug!(path = %self.path.display(), count = channels.len(), "Channels saved");
        Ok(())
    }
}

/// Reject a list with a repeated `id`.
pub fn ensure_unique_ids(channels: &[Channel]) -> Result<(), StoreError> {
    let mut seen = HashSet::new();
    for channel in channels {
        if !seen.insert(channel.id.as_str()) {
            return Err(StoreError::DuplicateId(channel.id.clone()));
        }
    }
    Ok(())
}

/// JSON with 4-space indentation.
fn to_pretty_json<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::channels::model::ChannelProfile;

    fn sample() -> Vec<Channel> {
        vec![
            Channel::slack("1", "Customer Support", "C123").with_profile(ChannelProfile {
                audience: "Customer Success Team".into(),
                data_sources: vec!["Support Tickets".into(), "Usage Analytics".into()],
            }),
            Channel::outlook("2", "sales@company.com", "inbox"),
            Channel {
                enabled: Some(false),
                slack_channel_id: None,
                ..Channel::slack("3", "Engineering Updates", "unused")
            },
        ]
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let tmp = TempDir::new().unwrap();
        let store = ChannelStore::new(tmp.path().join("configs/channels.json"));

        let channels = sample();
        store.save(&channels).await.unwrap();
        let loaded = store.try_load().await.unwrap();

        assert_eq!(loaded, channels);
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let store = ChannelStore::new(tmp.path().join("nope.json"));
        assert!(store.try_load().await.unwrap().is_empty());
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn malformed_file_loads_empty_but_strict_load_errors() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("channels.json");
        tokio::fs::write(&path, "{not json").await.unwrap();
        let store = ChannelStore::new(&path);

        assert!(store.load().await.is_empty());
        assert!(matches!(
            store.try_load().await,
            Err(StoreError::Parse { .. })
        ));
    }

    #[tokio::test]
    async fn saved_file_uses_channels_wrapper_and_four_space_indent() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("channels.json");
        let store = ChannelStore::new(&path);
        store.save(&sample()).await.unwrap();

        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(raw.starts_with("{\n    \"channels\": ["));
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["channels"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let store = ChannelStore::new(tmp.path().join("channels.json"));
        let dupes = vec![
            Channel::slack("a", "one", "C1"),
            Channel::slack("a", "two", "C2"),
        ];
        assert!(matches!(
            store.save(&dupes).await,
            Err(StoreError::DuplicateId(id)) if id == "a"
        ));
    }
}
