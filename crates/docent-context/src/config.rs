//! Context window configuration

use serde::{Deserialize, Serialize};

use crate::error::{ContextError, ContextResult};

/// Fraction of `max_tokens` at which compaction starts, used by
/// [`ContextWindowConfig::for_budget`].
const THRESHOLD_PERCENT: usize = 89;

/// Context window configuration, fixed at deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextWindowConfig {
    /// Hard ceiling for the assembled prompt. Informational upper bound;
    /// the manager acts at `summarization_threshold`, below this.
    pub max_tokens: usize,
    /// Crossing this count triggers compaction of older turns.
    pub summarization_threshold: usize,
    /// Number of most-recent messages always sent verbatim, never
    /// summarized, regardless of budget pressure.
    pub preserve_recent: usize,
}

impl Default for ContextWindowConfig {
    fn default() -> Self {
        Self::for_budget(8192)
    }
}

impl ContextWindowConfig {
    /// Derive a configuration from a model's token budget, placing the
    /// threshold at ~89% of the ceiling.
    pub fn for_budget(max_tokens: usize) -> Self {
        Self {
            max_tokens,
            summarization_threshold: max_tokens * THRESHOLD_PERCENT / 100,
            preserve_recent: 10,
        }
    }

    pub fn with_summarization_threshold(mut self, threshold: usize) -> Self {
        self.summarization_threshold = threshold;
        self
    }

    pub fn with_preserve_recent(mut self, preserve_recent: usize) -> Self {
        self.preserve_recent = preserve_recent;
        self
    }

    /// Startup validation. Called by the manager constructor so that a
    /// malformed deployment fails before the first turn is handled.
    pub fn validate(&self) -> ContextResult<()> {
        if self.max_tokens == 0 {
            return Err(ContextError::InvalidConfig(
                "max_tokens must be positive".to_string(),
            ));
        }
        if self.summarization_threshold == 0 || self.summarization_threshold >= self.max_tokens {
            return Err(ContextError::InvalidConfig(format!(
                "summarization_threshold must be in 1..{} (got {})",
                self.max_tokens, self.summarization_threshold
            )));
        }
        if self.preserve_recent == 0 {
            return Err(ContextError::InvalidConfig(
                "preserve_recent must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ContextWindowConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.summarization_threshold < config.max_tokens);
    }

    #[test]
    fn for_budget_places_threshold_below_ceiling() {
        let config = ContextWindowConfig::for_budget(200_000);
        assert_eq!(config.max_tokens, 200_000);
        assert_eq!(config.summarization_threshold, 178_000);
    }

    #[test]
    fn zero_max_tokens_rejected() {
        let config = ContextWindowConfig {
            max_tokens: 0,
            summarization_threshold: 0,
            preserve_recent: 10,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn threshold_at_or_above_ceiling_rejected() {
        let config = ContextWindowConfig::for_budget(1000).with_summarization_threshold(1000);
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_preserve_window_rejected() {
        let config = ContextWindowConfig::for_budget(1000).with_preserve_recent(0);
        assert!(config.validate().is_err());
    }
}
