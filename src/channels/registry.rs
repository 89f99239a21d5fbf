//! Shared in-memory channel list, flushed to the store on change.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use super::model::{Channel, ChannelProfile};
use super::store::ChannelStore;
use crate::error::StoreError;

/// The one channel list request handlers share.
///
/// Mutations hold the write lock across mutate-and-flush, so updates within
/// this process are serialized and the file always matches memory.
pub struct ChannelRegistry {
    store: ChannelStore,
    channels: RwLock<Vec<Channel>>,
}

impl ChannelRegistry {
    /// Load channels from `store` (empty on failure).
    pub async fn open(store: ChannelStore) -> Arc<Self> {
        let channels = store.load().await;
        info!(path = %store.path().display(), count = channels.len(), "Channels loaded");
        Self::with_channels(store, channels)
    }

    /// Build a registry around an existing list without touching disk.
    pub fn with_channels(store: ChannelStore, channels: Vec<Channel>) -> Arc<Self> {
        Arc::new(Self {
            store,
            channels: RwLock::new(channels),
        })
    }

    /// Snapshot of all channels in insertion order.
    pub async fn list(&self) -> Vec<Channel> {
        self.channels.read().await.clone()
    }

    /// Look up a channel by id.
    pub async fn get(&self, id: &str) -> Option<Channel> {
        self.channels.read().await.iter().find(|c| c.id == id).cloned()
    }

    /// Replace one channel's profile and persist the full list.
    ///
    /// Only the `profile` field of the matching channel changes. If the flush
    /// fails the in-memory profile is rolled back.
    pub async fn update_profile(
        &self,
        id: &str,
        profile: ChannelProfile,
    ) -> Result<Channel, StoreError> {
        let mut channels = self.channels.write().await;

        let idx = channels
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let previous = channels[idx].profile.replace(profile);

        if let Err(e) = self.store.save(&channels).await {
            channels[idx].profile = previous;
            return Err(e);
        }

        info!(channel_id = %id, "Channel profile updated");
        Ok(channels[idx].clone())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn profile(audience: &str) -> ChannelProfile {
        ChannelProfile {
            audience: audience.into(),
            data_sources: vec!["CRM Data".into()],
        }
    }

    async fn registry(tmp: &TempDir) -> Arc<ChannelRegistry> {
        let store = ChannelStore::new(tmp.path().join("channels.json"));
        let channels = vec![
            Channel::slack("1", "Support", "C1").with_profile(profile("Support Team")),
            Channel::outlook("2", "sales@company.com", "inbox"),
            Channel::slack("3", "Engineering", "C3"),
        ];
        store.save(&channels).await.unwrap();
        ChannelRegistry::open(store).await
    }

    #[tokio::test]
    async fn update_profile_changes_only_target_profile() {
        let tmp = TempDir::new().unwrap();
        let registry = registry(&tmp).await;
        let before = registry.list().await;

        let updated = registry
            .update_profile("2", profile("Sales Team"))
            .await
            .unwrap();
        assert_eq!(updated.profile, Some(profile("Sales Team")));

        let after = registry.list().await;
        assert_eq!(after.len(), before.len());
        for (old, new) in before.iter().zip(after.iter()) {
            if old.id == "2" {
                let mut expected = old.clone();
                expected.profile = Some(profile("Sales Team"));
                assert_eq!(new, &expected);
            } else {
                assert_eq!(new, old);
            }
        }
    }

    #[tokio::test]
    async fn update_profile_is_persisted() {
        let tmp = TempDir::new().unwrap();
        let registry = registry(&tmp).await;
        registry
            .update_profile("3", profile("Engineers"))
            .await
            .unwrap();

        let reloaded = ChannelStore::new(tmp.path().join("channels.json"))
            .try_load()
            .await
            .unwrap();
        assert_eq!(reloaded, registry.list().await);
    }

    #[tokio::test]
    async fn other_records_are_written_back_as_stored() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("channels.json");
        let untouched = serde_json::json!({"id": "t", "type": "teams", "webhook": "https://hooks.invalid/t"});
        let file = serde_json::json!({
            "channels": [
                {"id": "a", "name": "Support", "type": "slack", "slack_channel_id": "C1"},
                untouched.clone(),
            ]
        });
        tokio::fs::write(&path, serde_json::to_vec(&file).unwrap()).await.unwrap();

        let registry = ChannelRegistry::open(ChannelStore::new(&path)).await;
        registry.update_profile("a", profile("Support Team")).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&tokio::fs::read(&path).await.unwrap()).unwrap();
        assert_eq!(raw["channels"][1], untouched);
        assert_eq!(
            raw["channels"][0],
            serde_json::json!({
                "id": "a",
                "name": "Support",
                "type": "slack",
                "slack_channel_id": "C1",
                "profile": {"audience": "Support Team", "dataSources": ["CRM Data"]}
            })
        );
    }

    #[tokio::test]
    async fn update_profile_unknown_id_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let registry = registry(&tmp).await;
        let err = registry
            .update_profile("missing", profile("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == "missing"));
    }

    #[tokio::test]
    async fn get_finds_by_id() {
        let tmp = TempDir::new().unwrap();
        let registry = registry(&tmp).await;
        assert_eq!(registry.get("1").await.unwrap().display_name(), "Support");
        assert!(registry.get("9").await.is_none());
    }
}
