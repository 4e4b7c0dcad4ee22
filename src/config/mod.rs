//! Engine configuration (defaults, `with_*` overrides, env overrides).

use std::str::FromStr;
use std::time::Duration;

use crate::provider::ProviderId;
use crate::router::breaker::BreakerConfig;
use crate::router::retry::RetryPolicy;

/// Tunables for the orchestration engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Providers tried in order for every call (primary first).
    pub provider_order: Vec<ProviderId>,
    pub retry: RetryPolicy,
    pub breaker: BreakerConfig,
    /// Budget for free-form replies.
    pub reply_timeout: Duration,
    /// Budget for extraction calls (shorter: they are small and deterministic).
    pub extraction_timeout: Duration,
    /// Budget for history summarization.
    pub summary_timeout: Duration,
    /// Raw history messages sent verbatim; older ones get summarized.
    pub window_size: usize,
    /// Handoff chain limit within one inbound message.
    pub max_handoffs: u32,
    /// Inbound user messages are truncated to this many characters.
    pub max_message_chars: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            provider_order: Vec::new(),
            retry: RetryPolicy::default(),
            breaker: BreakerConfig::default(),
            reply_timeout: Duration::from_secs(12),
            extraction_timeout: Duration::from_secs(6),
            summary_timeout: Duration::from_secs(8),
            window_size: 10,
            max_handoffs: 3,
            max_message_chars: 1000,
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with `PROSPECTO_*` environment variables.
    /// Loads `.env` first if present.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();

        if let Ok(order) = std::env::var("PROSPECTO_PROVIDER_ORDER") {
            config.provider_order = order
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ProviderId::new)
                .collect();
        }
        if let Some(v) = env_parse("PROSPECTO_RETRY_ATTEMPTS") {
            config.retry.max_attempts = v;
        }
        if let Some(v) = env_parse("PROSPECTO_BREAKER_THRESHOLD") {
            config.breaker.failure_threshold = v;
        }
        if let Some(secs) = env_parse::<u64>("PROSPECTO_BREAKER_OPEN_SECS") {
            config.breaker.open_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("PROSPECTO_REPLY_TIMEOUT_SECS") {
            config.reply_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("PROSPECTO_EXTRACTION_TIMEOUT_SECS") {
            config.extraction_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("PROSPECTO_SUMMARY_TIMEOUT_SECS") {
            config.summary_timeout = Duration::from_secs(secs);
        }
        if let Some(v) = env_parse("PROSPECTO_WINDOW_SIZE") {
            config.window_size = v;
        }
        if let Some(v) = env_parse("PROSPECTO_MAX_HANDOFFS") {
            config.max_handoffs = v;
        }
        if let Some(v) = env_parse("PROSPECTO_MAX_MESSAGE_CHARS") {
            config.max_message_chars = v;
        }

        config
    }

    pub fn with_provider_order(mut self, order: Vec<ProviderId>) -> Self {
        self.provider_order = order;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_breaker(mut self, breaker: BreakerConfig) -> Self {
        self.breaker = breaker;
        self
    }

    pub fn with_window_size(mut self, size: usize) -> Self {
        self.window_size = size;
        self
    }

    pub fn with_max_handoffs(mut self, max: u32) -> Self {
        self.max_handoffs = max;
        self
    }

    pub fn with_max_message_chars(mut self, max: usize) -> Self {
        self.max_message_chars = max;
        self
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.breaker.failure_threshold, 5);
        assert_eq!(config.breaker.open_interval, Duration::from_secs(60));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.window_size, 10);
        assert_eq!(config.max_handoffs, 3);
        assert_eq!(config.max_message_chars, 1000);
        assert!(config.extraction_timeout < config.reply_timeout);
    }

    #[test]
    fn with_setters_override_defaults() {
        let config = EngineConfig::default()
            .with_provider_order(vec![ProviderId::new("primary"), ProviderId::new("backup")])
            .with_window_size(4)
            .with_max_handoffs(1);

        assert_eq!(config.provider_order.len(), 2);
        assert_eq!(config.provider_order[0].as_str(), "primary");
        assert_eq!(config.window_size, 4);
        assert_eq!(config.max_handoffs, 1);
    }
}
