//! LLM API interaction with exponential backoff retry logic.
//!
//! Both LLM-backed collaborators (the crawler that asks a model for the
//! latest journal articles and the enricher that asks for translations) talk
//! to an OpenAI-compatible endpoint through `awful_aj`.
//!
//! # Architecture
//!
//! - [`AskAsync`]: Core trait defining async LLM interaction
//! - [`AskFnWrapper`]: Wraps the `awful_aj` library's `ask` function
//! - [`RetryAsk`]: Decorator that adds retry logic to any `AskAsync` implementation
//!
//! # Retry Strategy
//!
//! - Bounded retry attempts (configurable, 5 by default)
//! - Exponential backoff starting at 1 second
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd

use crate::error::BoxError;
use awful_aj::api::ask;
use awful_aj::{config, config::AwfulJadeConfig, config_dir, template, template::ChatTemplate};
use rand::{Rng, rng};
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// Trait for async LLM interaction.
pub trait AskAsync {
    /// The type of response returned by the LLM.
    type Response;

    /// Send text to the LLM and receive a response.
    async fn ask(&self, text: &str) -> Result<Self::Response, BoxError>;
}

/// Wrapper that adds exponential backoff retry logic to any [`AskAsync`] implementation.
///
/// The delay between retries follows this formula:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryAsk<T> {
    inner: T,
    /// Retries after the first attempt; `0` means a single try.
    max_retries: usize,
    base_delay: StdDuration,
    max_delay: StdDuration,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }

    fn backoff(&self, attempt: usize) -> StdDuration {
        let shift = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX).min(16);
        self.base_delay.saturating_mul(1 << shift).min(self.max_delay)
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync + fmt::Debug,
{
    type Response = T::Response;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, BoxError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.ask(text).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis(),
                            elapsed_ms_total = total_dt.as_millis(),
                            error = %e,
                            "ask() exhausted retries"
                        );
                        return Err(e);
                    }

                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = self.backoff(attempt) + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis(),
                        elapsed_ms_total = total_dt.as_millis(),
                        ?delay,
                        error = %e,
                        "ask() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Adapts `awful_aj::api::ask` to [`AskAsync`].
#[derive(Debug)]
pub struct AskFnWrapper<'a> {
    pub config: &'a AwfulJadeConfig,
    pub template: &'a ChatTemplate,
}

impl<'a> AskAsync for AskFnWrapper<'a> {
    type Response = String;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, BoxError> {
        let t0 = Instant::now();
        let res = ask(self.config, text.to_string(), self.template, None, None).await;
        let dt = t0.elapsed();

        res.map_err(|e| {
            warn!(elapsed_ms = dt.as_millis(), error = %e, "API call failed");
            BoxError::from(e.to_string())
        })
    }
}

/// Send a prompt to the model, retrying transient failures with backoff.
///
/// Shared entry point for the LLM crawler and the LLM enricher. Wraps
/// [`AskFnWrapper`] in [`RetryAsk`] with a one second base delay.
///
/// # Arguments
///
/// * `config` - `awful_aj` connection settings (endpoint, model, key)
/// * `prompt` - The full user prompt
/// * `template` - Chat template providing the system prompt
/// * `max_retries` - Retries after the first attempt; `0` means a single try
///
/// # Returns
///
/// The raw model reply, or the last error once every attempt failed.
///
/// # Retry Behavior
///
/// - Exponential backoff: 1s, 2s, 4s, 8s, 16s (capped at 30s)
/// - Random jitter of up to 250ms per wait
#[instrument(level = "info", skip(config, prompt, template))]
pub async fn ask_with_backoff(
    config: &AwfulJadeConfig,
    prompt: &str,
    template: &ChatTemplate,
    max_retries: usize,
) -> Result<String, BoxError> {
    let t0 = Instant::now();
    let client = AskFnWrapper { config, template };
    let api = RetryAsk::new(client, max_retries, StdDuration::from_secs(1));
    let res = api.ask(prompt).await;
    let dt = t0.elapsed();

    match &res {
        Ok(_) => info!(elapsed_ms_total = dt.as_millis(), "ask_with_backoff succeeded"),
        Err(e) => error!(elapsed_ms_total = dt.as_millis(), error = %e, "ask_with_backoff failed"),
    }
    res
}

/// Everything needed to talk to the model: connection settings and a chat template.
pub struct LlmContext {
    pub config: AwfulJadeConfig,
    pub template: ChatTemplate,
}

impl fmt::Debug for LlmContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmContext").finish_non_exhaustive()
    }
}

/// Load the `awful_aj` configuration and a named chat template.
///
/// # Arguments
///
/// * `template_name` - Template file name in the `awful_aj` templates
///   directory, without extension (e.g. `jctc_translator`)
/// * `config_path` - Explicit config file; `None` uses `config.yaml` in the
///   `awful_aj` config directory
///
/// # Errors
///
/// Fails when the template or the config file cannot be found or parsed,
/// or when the default config path is not valid UTF-8.
#[instrument(level = "info", skip_all, fields(%template_name))]
pub async fn load_llm_context(
    template_name: &str,
    config_path: Option<&str>,
) -> Result<LlmContext, BoxError> {
    let template = template::load_template(template_name)
        .await
        .map_err(|e| format!("failed to load template {template_name}: {e}"))?;

    let config_path = match config_path {
        Some(path) => path.to_string(),
        None => {
            let conf_file = config_dir().map_err(|e| e.to_string())?.join("config.yaml");
            conf_file
                .to_str()
                .ok_or("awful_aj config path is not valid UTF-8")?
                .to_string()
        }
    };
    let config = config::load_config(&config_path)
        .map_err(|e| format!("failed to load LLM config {config_path}: {e}"))?;
    info!(%config_path, "Loaded LLM configuration");

    Ok(LlmContext { config, template })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct Flaky {
        failures_left: AtomicUsize,
        calls: AtomicUsize,
    }

    impl AskAsync for Flaky {
        type Response = String;

        async fn ask(&self, text: &str) -> Result<String, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                Err("503 Service Unavailable".into())
            } else {
                Ok(format!("echo: {text}"))
            }
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_after_transient_failures() {
        let flaky = Flaky {
            failures_left: AtomicUsize::new(2),
            ..Default::default()
        };
        let api = RetryAsk::new(flaky, 3, StdDuration::ZERO);
        assert_eq!(api.ask("hi").await.unwrap(), "echo: hi");
        assert_eq!(api.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_retries() {
        let flaky = Flaky {
            failures_left: AtomicUsize::new(10),
            ..Default::default()
        };
        let api = RetryAsk::new(flaky, 1, StdDuration::ZERO);
        assert!(api.ask("hi").await.is_err());
        assert_eq!(api.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let api = RetryAsk::new(Flaky::default(), 10, StdDuration::from_secs(1));
        assert_eq!(api.backoff(1), StdDuration::from_secs(1));
        assert_eq!(api.backoff(2), StdDuration::from_secs(2));
        assert_eq!(api.backoff(4), StdDuration::from_secs(8));
        assert_eq!(api.backoff(6), StdDuration::from_secs(30));
        assert_eq!(api.backoff(60), StdDuration::from_secs(30));
    }
}
