//! Character asset lifecycle: preload and delete

use crate::engine::AvatarEngine;
use crate::sdk::AvatarSdk;
use std::sync::Arc;

/// Forwards asset operations to the SDK and normalizes their outcomes
pub struct ResourceManager<E: AvatarEngine> {
    sdk: Arc<AvatarSdk<E>>,
}

impl<E: AvatarEngine> Clone for ResourceManager<E> {
    fn clone(&self) -> Self {
        Self {
            sdk: Arc::clone(&self.sdk),
        }
    }
}

impl<E: AvatarEngine> ResourceManager<E> {
    pub fn new(sdk: Arc<AvatarSdk<E>>) -> Self {
        Self { sdk }
    }

    /// Warm the cache for a character. Any failure reports `false`.
    pub async fn preload(&self, character_id: &str) -> bool {
        match self.sdk.preload(character_id).await {
            Ok(preloaded) => {
                tracing::info!(character_id, preloaded, "Character preload finished");
                preloaded
            }
            Err(e) => {
                tracing::warn!(character_id, error = %e, "Character preload failed");
                false
            }
        }
    }

    /// Best-effort removal of one character's cached assets
    pub async fn delete(&self, character_id: &str) {
        match self.sdk.delete(character_id).await {
            Ok(()) => tracing::info!(character_id, "Character assets deleted"),
            Err(e) => tracing::warn!(character_id, error = %e, "Deleting character assets failed"),
        }
    }

    /// Best-effort removal of every cached character
    pub async fn delete_all(&self) {
        match self.sdk.delete_all().await {
            Ok(()) => tracing::info!("All character assets deleted"),
            Err(e) => tracing::warn!(error = %e, "Deleting all character assets failed"),
        }
    }
}
