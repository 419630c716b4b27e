//! Entity → store scope resolution

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::{AnalyticsError, Result};

/// Maps an entity ID to the store scope key its data lives under
#[async_trait]
pub trait ScopeResolver: Send + Sync {
    /// Resolve one entity
    async fn resolve(&self, entity_id: &str) -> Result<String>;
}

/// The entity ID is the scope key
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityResolver;

#[async_trait]
impl ScopeResolver for IdentityResolver {
    async fn resolve(&self, entity_id: &str) -> Result<String> {
        Ok(entity_id.to_string())
    }
}

/// Explicit entity → scope table; unknown entities fail to resolve
#[derive(Debug, Clone, Default)]
pub struct MapResolver {
    scopes: HashMap<String, String>,
}

impl MapResolver {
    /// Create an empty resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mapping
    pub fn with(mut self, entity_id: impl Into<String>, scope: impl Into<String>) -> Self {
        self.scopes.insert(entity_id.into(), scope.into());
        self
    }

    /// Number of known entities
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapResolver {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            scopes: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[async_trait]
impl ScopeResolver for MapResolver {
    async fn resolve(&self, entity_id: &str) -> Result<String> {
        self.scopes
            .get(entity_id)
            .cloned()
            .ok_or_else(|| AnalyticsError::ScopeResolution {
                entity: entity_id.to_string(),
                reason: "unknown entity".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_identity() {
        assert_eq!(IdentityResolver.resolve("game-a").await.unwrap(), "game-a");
    }

    #[tokio::test]
    async fn test_map_resolver() {
        let resolver: MapResolver = [("space-miner", "gm_0017"), ("tower-rush", "gm_0042")]
            .into_iter()
            .collect();

        assert_eq!(resolver.len(), 2);
        assert_eq!(resolver.resolve("tower-rush").await.unwrap(), "gm_0042");
        assert!(matches!(
            resolver.resolve("missing").await,
            Err(AnalyticsError::ScopeResolution { entity, .. }) if entity == "missing"
        ));
    }
}
