//! Adapter registry
//!
//! Maps a [`Platform`] to its adapter. Adapters are built lazily on first
//! use and cached; a factory that fails once has its failure cached too,
//! so repeat lookups report the same reason without re-running the
//! factory.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::adapters::{
    cloudflare, custom, ftp, github_pages, netlify, ssh, surge, vercel, DeployAdapter,
    PlatformInfo,
};
use crate::errors::DeployError;
use crate::models::Platform;

pub type AdapterFactory =
    Arc<dyn Fn() -> Result<Arc<dyn DeployAdapter>, DeployError> + Send + Sync>;

pub struct AdapterRegistry {
    factories: RwLock<HashMap<Platform, AdapterFactory>>,
    metadata: RwLock<HashMap<Platform, PlatformInfo>>,
    /// Instantiated adapters, or the reason instantiation failed
    adapters: RwLock<HashMap<Platform, Result<Arc<dyn DeployAdapter>, String>>>,
}

impl AdapterRegistry {
    /// Registry with every built-in platform registered
    pub fn new() -> Self {
        let mut factories: HashMap<Platform, AdapterFactory> = HashMap::new();
        let mut metadata = HashMap::new();

        macro_rules! builtin {
            ($platform:expr, $info:expr, $adapter:ty) => {
                factories.insert(
                    $platform,
                    Arc::new(|| Ok(Arc::new(<$adapter>::new()) as Arc<dyn DeployAdapter>))
                        as AdapterFactory,
                );
                metadata.insert($platform, $info);
            };
        }

        builtin!(Platform::Netlify, netlify::INFO, netlify::NetlifyAdapter);
        builtin!(Platform::Vercel, vercel::INFO, vercel::VercelAdapter);
        builtin!(
            Platform::CloudflarePages,
            cloudflare::INFO,
            cloudflare::CloudflareAdapter
        );
        builtin!(
            Platform::GithubPages,
            github_pages::INFO,
            github_pages::GithubPagesAdapter
        );
        builtin!(Platform::Surge, surge::INFO, surge::SurgeAdapter);
        builtin!(Platform::Ssh, ssh::INFO, ssh::SshAdapter);
        builtin!(Platform::Ftp, ftp::INFO, ftp::FtpAdapter);
        builtin!(Platform::Custom, custom::INFO, custom::CustomAdapter);

        Self {
            factories: RwLock::new(factories),
            metadata: RwLock::new(metadata),
            adapters: RwLock::new(HashMap::new()),
        }
    }

    /// Register (or replace) a platform adapter.
    ///
    /// Any cached instance or cached failure for the platform is dropped.
    pub async fn register(&self, info: PlatformInfo, factory: AdapterFactory) {
        let platform = info.platform;
        debug!(platform = %platform, "Registering adapter");
        self.factories.write().await.insert(platform, factory);
        self.metadata.write().await.insert(platform, info);
        self.adapters.write().await.remove(&platform);
    }

    /// Adapter for a platform, instantiating it on first use
    pub async fn adapter(
        &self,
        platform: Platform,
    ) -> Result<Arc<dyn DeployAdapter>, DeployError> {
        if let Some(cached) = self.adapters.read().await.get(&platform) {
            return cached.clone().map_err(|reason| {
                DeployError::UnsupportedPlatform {
                    platform: platform.to_string(),
                    reason,
                }
            });
        }

        let factory = {
            let factories = self.factories.read().await;
            factories.get(&platform).cloned()
        };
        let factory = factory.ok_or_else(|| DeployError::UnsupportedPlatform {
            platform: platform.to_string(),
            reason: "no adapter registered".to_string(),
        })?;

        let outcome = factory();
        let cached = match &outcome {
            Ok(adapter) => Ok(adapter.clone()),
            Err(e) => {
                warn!(platform = %platform, error = %e, "Adapter initialization failed");
                Err(e.to_string())
            }
        };
        self.adapters.write().await.insert(platform, cached);

        outcome.map_err(|e| DeployError::UnsupportedPlatform {
            platform: platform.to_string(),
            reason: e.to_string(),
        })
    }

    /// Instantiate every registered adapter up front
    pub async fn preload_all(&self) {
        let platforms = self.platforms().await;
        for platform in platforms {
            if let Err(e) = self.adapter(platform).await {
                warn!(platform = %platform, error = %e, "Preload failed");
            }
        }
    }

    /// Registered platforms, in a stable order
    pub async fn platforms(&self) -> Vec<Platform> {
        let factories = self.factories.read().await;
        let mut platforms: Vec<Platform> = Platform::all()
            .iter()
            .filter(|p| factories.contains_key(p))
            .copied()
            .collect();
        // Platforms registered beyond the built-in set go last
        let mut extra: Vec<Platform> = factories
            .keys()
            .filter(|p| !platforms.contains(p))
            .copied()
            .collect();
        extra.sort_by_key(|p| p.to_string());
        platforms.extend(extra);
        platforms
    }

    /// Field schema and display metadata for one platform
    pub async fn platform_info(&self, platform: Platform) -> Option<PlatformInfo> {
        self.metadata.read().await.get(&platform).copied()
    }

    /// Metadata for every registered platform
    pub async fn all_platform_info(&self) -> Vec<PlatformInfo> {
        let metadata = self.metadata.read().await;
        self.platforms()
            .await
            .iter()
            .filter_map(|p| metadata.get(p).copied())
            .collect()
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_builtins_registered() {
        let registry = AdapterRegistry::new();
        let platforms = registry.platforms().await;
        assert_eq!(platforms.len(), Platform::all().len());
        for platform in Platform::all() {
            assert!(platforms.contains(platform));
            assert!(registry.platform_info(*platform).await.is_some());
        }
    }

    #[tokio::test]
    async fn test_adapter_is_cached() {
        let registry = AdapterRegistry::new();
        let a = registry.adapter(Platform::Netlify).await.unwrap();
        let b = registry.adapter(Platform::Netlify).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_failed_factory_is_cached() {
        let registry = AdapterRegistry::new();
        registry
            .register(
                netlify::INFO,
                Arc::new(|| Err(DeployError::ConfigError("boom".to_string()))),
            )
            .await;

        for _ in 0..2 {
            let err = registry.adapter(Platform::Netlify).await.unwrap_err();
            match err {
                DeployError::UnsupportedPlatform { reason, .. } => {
                    assert!(reason.contains("boom"))
                }
                other => panic!("unexpected error: {}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_register_clears_cached_failure() {
        let registry = AdapterRegistry::new();
        registry
            .register(
                netlify::INFO,
                Arc::new(|| Err(DeployError::ConfigError("boom".to_string()))),
            )
            .await;
        assert!(registry.adapter(Platform::Netlify).await.is_err());

        registry
            .register(
                netlify::INFO,
                Arc::new(|| Ok(Arc::new(netlify::NetlifyAdapter::new()) as Arc<dyn DeployAdapter>)),
            )
            .await;
        assert!(registry.adapter(Platform::Netlify).await.is_ok());
    }
}
