use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde_json::Value;

use super::traits::{StreamInlet, StreamResolver};
use super::types::{Selector, StreamInfo};
use crate::error::InletError;

/// Delay between discovery rounds while resolving.
const RESOLVE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Builds a resolver from its settings table.
pub type ResolverBuilder = fn(&Value) -> Result<Box<dyn StreamResolver>>;

/// Built-in resolver kind, collected at link time.
pub struct ResolverFactory {
    pub kind: &'static str,
    pub build: ResolverBuilder,
}

inventory::collect!(ResolverFactory);

/// Kinds usable in the `sources` settings table.
pub fn available_kinds() -> Vec<&'static str> {
    let mut kinds: Vec<&'static str> = inventory::iter::<ResolverFactory>
        .into_iter()
        .map(|f| f.kind)
        .collect();
    kinds.sort_unstable();
    kinds
}

/// Ordered set of stream resolvers.
///
/// Resolution walks resolvers in registration order and each resolver's
/// streams in discovery order; the first match wins.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    resolvers: Vec<Arc<dyn StreamResolver>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantiate built-in resolvers by kind.
    pub fn from_settings(sources: &BTreeMap<String, Value>) -> Result<Self> {
        let mut registry = Self::new();
        for (kind, options) in sources {
            let factory = inventory::iter::<ResolverFactory>
                .into_iter()
                .find(|f| f.kind == kind.as_str())
                .ok_or_else(|| {
                    anyhow!(
                        "Unknown stream source kind: {} (available: {})",
                        kind,
                        available_kinds().join(", ")
                    )
                })?;
            let resolver = (factory.build)(options)
                .map_err(|e| anyhow!("Invalid options for source '{}': {}", kind, e))?;
            registry.register_boxed(resolver);
        }
        Ok(registry)
    }

    pub fn register<R: StreamResolver + 'static>(&mut self, resolver: R) {
        self.resolvers.push(Arc::new(resolver));
    }

    pub fn register_boxed(&mut self, resolver: Box<dyn StreamResolver>) {
        self.resolvers.push(Arc::from(resolver));
    }

    pub fn list_resolvers(&self) -> Vec<String> {
        self.resolvers
            .iter()
            .map(|r| r.resolver_id().to_string())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// One discovery round across every resolver.
    ///
    /// A failing resolver is logged and skipped.
    pub async fn discover_all(&self) -> Vec<StreamInfo> {
        let mut streams = Vec::new();
        for resolver in &self.resolvers {
            match resolver.discover().await {
                Ok(found) => streams.extend(found),
                Err(e) => tracing::warn!(
                    resolver = resolver.resolver_id(),
                    error = %e,
                    "stream discovery failed"
                ),
            }
        }
        streams
    }

    /// Poll discovery until a stream matches `selector` or `timeout` elapses.
    pub async fn resolve(&self, selector: &Selector, timeout: Duration) -> Result<StreamInfo, InletError> {
        let search = async {
            loop {
                if let Some(info) = self
                    .discover_all()
                    .await
                    .into_iter()
                    .find(|info| selector.matches(info))
                {
                    return info;
                }
                tokio::time::sleep(RESOLVE_POLL_INTERVAL).await;
            }
        };

        tokio::time::timeout(timeout, search)
            .await
            .map_err(|_| InletError::StreamNotFound {
                key: selector.key.clone(),
                value: selector.value.clone(),
                timeout,
            })
    }

    /// Open an inlet through the resolver that discovered `info`.
    pub fn open(&self, info: &StreamInfo) -> Result<Box<dyn StreamInlet>> {
        self.resolvers
            .iter()
            .find(|r| r.resolver_id() == info.resolver_id)
            .ok_or_else(|| anyhow!("Unknown resolver: {}", info.resolver_id))?
            .open(info)
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("resolvers", &self.list_resolvers())
            .finish()
    }
}
