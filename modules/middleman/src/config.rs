use std::time::Duration;

use anyhow::{Context, Result};
use typed_builder::TypedBuilder;

/// Middleman configuration.
///
/// Build it in code with `MiddlemanConfig::builder()` or load it from the
/// environment with `from_env`.
#[derive(Debug, Clone, TypedBuilder)]
pub struct MiddlemanConfig {
    /// Label attached to every handling-cycle span.
    #[builder(default = String::from("middleman"), setter(into))]
    pub name: String,

    /// Upper bound for a single async observer invocation. Elapsing counts as
    /// that observer's failure. `None` waits forever.
    #[builder(default, setter(strip_option))]
    pub async_observer_timeout: Option<Duration>,
}

impl Default for MiddlemanConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl MiddlemanConfig {
    /// Reads `MIDDLEMAN_NAME` and `MIDDLEMAN_ASYNC_OBSERVER_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let name = lookup("MIDDLEMAN_NAME")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "middleman".to_string());

        let async_observer_timeout = match lookup("MIDDLEMAN_ASYNC_OBSERVER_TIMEOUT_MS") {
            Some(raw) if !raw.trim().is_empty() => {
                let ms: u64 = raw.trim().parse().with_context(|| {
                    format!("Invalid MIDDLEMAN_ASYNC_OBSERVER_TIMEOUT_MS: {raw}")
                })?;
                Some(Duration::from_millis(ms))
            }
            _ => None,
        };

        let config = Self {
            name,
            async_observer_timeout,
        };
        tracing::debug!(
            name = %config.name,
            timeout = ?config.async_observer_timeout,
            "Middleman config loaded"
        );
        Ok(config)
    }
}
