//! Configuration provider.
//!
//! The decision point reads its variables and its top-level combining
//! algorithm as streams, so a configuration change re-evaluates every open
//! subscription.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use serde_json::Value;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::info;
use vigil_core::{BoxStream, ReactiveExt};
use vigil_policy::CombiningAlgorithm;

use crate::config::PdpConfig;

/// Variables shared by all evaluations.
pub type Variables = Arc<HashMap<String, Value>>;

/// Trait for configuration sources.
///
/// Both streams emit the current value first and then every change. They
/// must not end while the provider is alive.
pub trait ConfigurationProvider: Send + Sync {
    /// Stream of the variables visible to every document.
    fn variables(&self) -> BoxStream<Variables>;

    /// Stream of the algorithm combining the top-level documents.
    fn algorithm(&self) -> BoxStream<CombiningAlgorithm>;
}

/// Configuration provider backed by a watch channel.
#[derive(Debug)]
pub struct WatchConfigurationProvider {
    config: watch::Sender<Arc<PdpConfig>>,
}

impl WatchConfigurationProvider {
    pub fn new(config: PdpConfig) -> Self {
        let (config, _) = watch::channel(Arc::new(config));
        Self { config }
    }

    /// Publish a new configuration to every open subscription.
    pub fn update(&self, config: PdpConfig) {
        info!(
            "configuration updated: algorithm {}, {} variables",
            config.algorithm,
            config.variables.len()
        );
        self.config.send_replace(Arc::new(config));
    }

    /// The configuration currently in effect.
    pub fn current(&self) -> Arc<PdpConfig> {
        Arc::clone(&self.config.borrow())
    }

    fn configs(&self) -> WatchStream<Arc<PdpConfig>> {
        WatchStream::new(self.config.subscribe())
    }
}

impl Default for WatchConfigurationProvider {
    fn default() -> Self {
        Self::new(PdpConfig::default())
    }
}

impl ConfigurationProvider for WatchConfigurationProvider {
    fn variables(&self) -> BoxStream<Variables> {
        self.configs()
            .map(|config| Arc::new(config.variables.clone()))
            .distinct_until_changed()
            .boxed()
    }

    fn algorithm(&self) -> BoxStream<CombiningAlgorithm> {
        self.configs()
            .map(|config| config.algorithm)
            .distinct_until_changed()
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_streams_follow_updates() {
        let provider = WatchConfigurationProvider::new(
            PdpConfig::default().with_algorithm(CombiningAlgorithm::DenyOverrides),
        );
        let mut algorithms = provider.algorithm();
        let mut variables = provider.variables();

        assert_eq!(algorithms.next().await, Some(CombiningAlgorithm::DenyOverrides));
        assert!(variables.next().await.unwrap().is_empty());

        provider.update(
            PdpConfig::default()
                .with_algorithm(CombiningAlgorithm::PermitOverrides)
                .with_variable("limit", json!(3)),
        );
        assert_eq!(algorithms.next().await, Some(CombiningAlgorithm::PermitOverrides));
        assert_eq!(variables.next().await.unwrap().get("limit"), Some(&json!(3)));
        assert_eq!(provider.current().algorithm, CombiningAlgorithm::PermitOverrides);
    }

    #[tokio::test]
    async fn test_unchanged_parts_are_not_repeated() {
        let provider = WatchConfigurationProvider::default();
        let mut algorithms = provider.algorithm();
        assert_eq!(algorithms.next().await, Some(CombiningAlgorithm::FirstApplicable));

        // Only the variables change.
        provider.update(PdpConfig::default().with_variable("limit", json!(3)));
        provider.update(PdpConfig::default().with_algorithm(CombiningAlgorithm::OnlyOneApplicable));
        assert_eq!(algorithms.next().await, Some(CombiningAlgorithm::OnlyOneApplicable));
    }
}
