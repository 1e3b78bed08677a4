// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Evaluator configuration
//!
//! Plain structs with defaults and builder-style setters. The process-wide
//! evaluator uses [`EvaluatorConfig::default`]. Both structs deserialize from
//! partial JSON; missing fields take their defaults.

use serde::{Deserialize, Serialize};

/// Compiled-expression cache settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache compiled expressions
    ///
    /// When disabled every call compiles afresh. Default: true
    pub enabled: bool,

    /// Number of recently used entries kept alive by the cache itself
    ///
    /// Entries outside this set survive only while a caller still holds
    /// them. `None` keeps every entry alive; `Some(0)` retains nothing.
    /// Default: `Some(1024)`
    pub retained_entries: Option<usize>,

    /// Index size that triggers a sweep of dropped entries. Default: 4096
    pub sweep_threshold: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retained_entries: Some(1024),
            sweep_threshold: 4096,
        }
    }
}

/// Configuration of an [`ExpressionEvaluator`](super::ExpressionEvaluator)
///
/// # Examples
///
/// ```rust
/// use expr_resolver::evaluator::EvaluatorConfig;
///
/// let config = EvaluatorConfig::default()
///     .with_retained_entries(Some(256))
///     .with_sweep_threshold(1024);
/// assert!(config.validate().is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    /// Compiled-expression cache settings
    pub cache: CacheConfig,
}

impl EvaluatorConfig {
    /// Create new configuration with all defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the compiled-expression cache
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache.enabled = enabled;
        self
    }

    /// Set the number of entries the cache keeps alive on its own
    ///
    /// # Arguments
    /// * `entries` - Retained entry count, `None` for unbounded
    pub fn with_retained_entries(mut self, entries: Option<usize>) -> Self {
        self.cache.retained_entries = entries;
        self
    }

    /// Set the index size that triggers a sweep of dropped entries
    pub fn with_sweep_threshold(mut self, threshold: usize) -> Self {
        self.cache.sweep_threshold = threshold;
        self
    }

    /// Configuration that never caches
    pub fn uncached() -> Self {
        Self::default().with_cache(false)
    }

    /// Configuration for unit tests: small, predictable cache
    pub fn for_testing() -> Self {
        Self::default()
            .with_retained_entries(Some(8))
            .with_sweep_threshold(16)
    }

    /// Validate configuration values
    ///
    /// # Returns
    /// * `Vec<String>` - List of validation warnings
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if !self.cache.enabled {
            return warnings;
        }

        match self.cache.retained_entries {
            Some(0) => warnings.push(
                "retained_entries is 0 - entries are recompiled as soon as callers drop them"
                    .to_string(),
            ),
            Some(n) if n > 100_000 => warnings.push(
                "retained_entries is very high (>100000) - may consume excessive memory"
                    .to_string(),
            ),
            None => warnings.push(
                "retained_entries is unbounded - every compiled expression stays in memory"
                    .to_string(),
            ),
            Some(_) => {}
        }

        if self.cache.sweep_threshold == 0 {
            warnings.push("sweep_threshold is 0 - the index is swept on every insert".to_string());
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = EvaluatorConfig::default();
        assert!(config.cache.enabled);
        assert_eq!(config.cache.retained_entries, Some(1024));
        assert_eq!(config.cache.sweep_threshold, 4096);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_builder() {
        let config = EvaluatorConfig::new()
            .with_retained_entries(None)
            .with_sweep_threshold(10);
        assert_eq!(config.cache.retained_entries, None);
        assert_eq!(config.cache.sweep_threshold, 10);
        assert!(EvaluatorConfig::for_testing().validate().is_empty());
    }

    #[test]
    fn test_validation_warnings() {
        let config = EvaluatorConfig::default()
            .with_retained_entries(Some(0))
            .with_sweep_threshold(0);
        assert_eq!(config.validate().len(), 2);

        assert_eq!(EvaluatorConfig::default().with_retained_entries(None).validate().len(), 1);

        // Nothing to warn about when caching is off
        assert!(EvaluatorConfig::uncached().with_sweep_threshold(0).validate().is_empty());
    }

    #[test]
    fn test_partial_json() {
        let config: EvaluatorConfig =
            serde_json::from_str(r#"{"cache": {"retained_entries": null}}"#).unwrap();
        assert_eq!(config.cache.retained_entries, None);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.sweep_threshold, 4096);

        let config: EvaluatorConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EvaluatorConfig::default());
    }
}
