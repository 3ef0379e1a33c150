//! Provider registry and selection
//!
//! The registry is an owned value, usually shared behind an `Arc`. Scores
//! live in a concurrent map so health updates and selections can interleave
//! freely; a selection racing an update sees either the old or the new score,
//! both of them valid.

use crate::{Capability, HealthMetrics, Observation, ProviderError, ProviderResult};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Score below which a provider is reported as unhealthy
pub const DEFAULT_MIN_HEALTHY_SCORE: f64 = 0.8;

/// Static description of a provider, read from configuration
#[derive(Debug, Clone)]
pub struct ProviderDescriptor {
    /// Unique provider name
    pub name: String,
    /// Supported capabilities, in configuration order
    pub capabilities: Vec<Capability>,
    /// Whether the provider may be selected
    pub enabled: bool,
    /// Initial health
    pub metrics: HealthMetrics,
}

impl ProviderDescriptor {
    /// Describe an enabled provider with perfect initial health
    pub fn new(name: impl Into<String>, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            name: name.into(),
            capabilities: capabilities.into_iter().collect(),
            enabled: true,
            metrics: HealthMetrics::default(),
        }
    }

    /// Set initial health
    pub fn with_metrics(mut self, metrics: HealthMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Set whether the provider starts enabled
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

#[derive(Debug, Clone)]
struct ProviderEntry {
    capabilities: Vec<Capability>,
    enabled: bool,
    metrics: HealthMetrics,
    score: f64,
    updated_at: DateTime<Utc>,
}

impl ProviderEntry {
    fn selectable_for(&self, capability: Capability) -> bool {
        self.enabled && self.capabilities.contains(&capability)
    }

    fn refresh(&mut self) -> f64 {
        self.score = self.metrics.score();
        self.updated_at = Utc::now();
        self.score
    }
}

/// Read view of one provider
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderStatus {
    /// Provider name
    pub name: String,
    /// Supported capabilities
    pub capabilities: Vec<Capability>,
    /// Whether the provider may be selected
    pub enabled: bool,
    /// Current health inputs
    pub metrics: HealthMetrics,
    /// Composite score
    pub score: f64,
    /// Last health update
    pub updated_at: DateTime<Utc>,
}

/// Scores providers and answers selection queries
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: DashMap<String, ProviderEntry>,
    // Configuration order, used to break score ties
    order: Vec<String>,
}

impl ProviderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from descriptors, keeping their order
    pub fn from_descriptors(
        descriptors: impl IntoIterator<Item = ProviderDescriptor>,
    ) -> ProviderResult<Self> {
        let mut registry = Self::new();
        for descriptor in descriptors {
            registry.register(descriptor)?;
        }
        Ok(registry)
    }

    /// Register a provider. Names are case-insensitive and stored lowercase.
    pub fn register(&mut self, descriptor: ProviderDescriptor) -> ProviderResult<()> {
        let name = normalize(&descriptor.name);
        if name.is_empty() {
            return Err(ProviderError::config("provider name cannot be empty"));
        }
        if self.providers.contains_key(&name) {
            return Err(ProviderError::config(format!(
                "provider {} registered twice",
                name
            )));
        }
        if !descriptor.metrics.is_finite() {
            return Err(ProviderError::config(format!(
                "provider {} has non-finite health metrics",
                name
            )));
        }

        let mut entry = ProviderEntry {
            capabilities: descriptor.capabilities,
            enabled: descriptor.enabled,
            metrics: descriptor.metrics,
            score: 0.0,
            updated_at: Utc::now(),
        };
        let score = entry.refresh();
        info!(
            provider = %name,
            capabilities = ?entry.capabilities,
            enabled = entry.enabled,
            score,
            "Registered provider"
        );

        self.providers.insert(name.clone(), entry);
        self.order.push(name);
        Ok(())
    }

    /// Replace a provider's metrics and recompute its score
    pub fn record_health(&self, name: &str, metrics: HealthMetrics) -> ProviderResult<f64> {
        let name = normalize(name);
        if !metrics.is_finite() {
            return Err(ProviderError::InvalidRequest(format!(
                "health metrics for {} must be finite",
                name
            )));
        }
        let mut entry = self
            .providers
            .get_mut(&name)
            .ok_or_else(|| ProviderError::UnknownProvider(name.clone()))?;

        let previous = entry.score;
        entry.metrics = metrics;
        let score = entry.refresh();
        debug!(provider = %name, previous, score, "Recorded provider health");
        Ok(score)
    }

    /// Nudge a provider's metrics from an observed outcome
    pub fn record_outcome(
        &self,
        name: &str,
        observation: impl Into<Observation>,
    ) -> ProviderResult<f64> {
        let observation = observation.into();
        let name = normalize(name);
        let mut entry = self
            .providers
            .get_mut(&name)
            .ok_or_else(|| ProviderError::UnknownProvider(name.clone()))?;

        let previous = entry.score;
        entry.metrics.observe(&observation);
        let score = entry.refresh();

        if previous >= DEFAULT_MIN_HEALTHY_SCORE && score < DEFAULT_MIN_HEALTHY_SCORE {
            warn!(provider = %name, previous, score, "Provider score fell below healthy threshold");
        } else {
            debug!(
                provider = %name,
                outcome = ?observation.outcome,
                previous,
                score,
                "Recorded provider outcome"
            );
        }
        Ok(score)
    }

    /// Highest scoring enabled provider for the capability
    pub fn best_provider(&self, capability: Capability) -> ProviderResult<String> {
        self.rank(capability, None)
            .ok_or(ProviderError::NoProviderAvailable(capability))
    }

    /// Highest scoring enabled provider other than `exclude`
    ///
    /// `None` is the ordinary "no alternative" answer.
    pub fn failover_provider(&self, capability: Capability, exclude: &str) -> Option<String> {
        let exclude = normalize(exclude);
        self.rank(capability, Some(&exclude))
    }

    /// Every enabled provider for the capability, best first
    pub fn ranked(&self, capability: Capability) -> Vec<(String, f64)> {
        let mut ranked: Vec<(String, f64)> = self
            .order
            .iter()
            .filter_map(|name| {
                let entry = self.providers.get(name)?;
                entry
                    .selectable_for(capability)
                    .then(|| (name.clone(), entry.score))
            })
            .collect();
        // Stable sort keeps configuration order among equal scores
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }

    /// Whether the provider's score is at least [`DEFAULT_MIN_HEALTHY_SCORE`]
    pub fn is_healthy(&self, name: &str) -> bool {
        self.is_healthy_with(name, DEFAULT_MIN_HEALTHY_SCORE)
    }

    /// Whether the provider's score is at least `min_score`. Unknown providers are unhealthy.
    pub fn is_healthy_with(&self, name: &str, min_score: f64) -> bool {
        self.score(name).is_some_and(|score| score >= min_score)
    }

    /// Current score of a provider
    pub fn score(&self, name: &str) -> Option<f64> {
        self.providers.get(&normalize(name)).map(|entry| entry.score)
    }

    /// Enable or disable a provider for selection
    pub fn set_enabled(&self, name: &str, enabled: bool) -> ProviderResult<()> {
        let name = normalize(name);
        let mut entry = self
            .providers
            .get_mut(&name)
            .ok_or_else(|| ProviderError::UnknownProvider(name.clone()))?;
        if entry.enabled != enabled {
            entry.enabled = enabled;
            info!(provider = %name, enabled, "Provider selection state changed");
        }
        Ok(())
    }

    /// Whether a provider is registered
    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(&normalize(name))
    }

    /// Provider names in configuration order
    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// Status of every provider, in configuration order
    pub fn snapshot(&self) -> Vec<ProviderStatus> {
        self.order
            .iter()
            .filter_map(|name| {
                self.providers.get(name).map(|entry| ProviderStatus {
                    name: name.clone(),
                    capabilities: entry.capabilities.clone(),
                    enabled: entry.enabled,
                    metrics: entry.metrics,
                    score: entry.score,
                    updated_at: entry.updated_at,
                })
            })
            .collect()
    }

    /// Number of registered providers
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no providers are registered
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn rank(&self, capability: Capability, exclude: Option<&str>) -> Option<String> {
        let mut best: Option<(&String, f64)> = None;
        for name in &self.order {
            if exclude == Some(name.as_str()) {
                continue;
            }
            let Some(entry) = self.providers.get(name) else {
                continue;
            };
            if !entry.selectable_for(capability) {
                continue;
            }
            // Strictly greater: the first listed provider wins a tie
            match best {
                Some((_, score)) if entry.score <= score => {}
                _ => best = Some((name, entry.score)),
            }
        }
        best.map(|(name, _)| name.clone())
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}
