//! Bootstrap utilities for sluice binaries.

use std::future::Future;
use std::time::Duration;

use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LOG_ENV_VAR;

/// Initialize tracing with the SLUICE_LOG environment variable.
///
/// Defaults to "info" level if SLUICE_LOG is not set.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

const MAX_RETRIES: u32 = 5;
const INITIAL_DELAY: Duration = Duration::from_millis(100);
const MAX_DELAY: Duration = Duration::from_secs(5);

/// Connect to a broker resource with exponential backoff retry.
///
/// # Arguments
/// * `resource` - Human-readable name for logging (e.g., "queue-b")
/// * `address` - Where the resource lives
/// * `connect` - Async function that attempts to establish a connection
///
/// # Returns
/// The connected handle on success, or the last error after max retries.
pub async fn connect_with_retry<T, E, F, Fut>(
    resource: &str,
    address: &str,
    connect: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut delay = INITIAL_DELAY;
    let mut attempt = 0;

    loop {
        attempt += 1;
        match connect().await {
            Ok(handle) => {
                tracing::info!(resource, address, "Connected");
                return Ok(handle);
            }
            Err(e) if attempt < MAX_RETRIES => {
                warn!(
                    resource,
                    address,
                    attempt,
                    error = %e,
                    retry_in = ?delay,
                    "Connection failed, retrying"
                );
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, MAX_DELAY);
            }
            Err(e) => {
                tracing::error!(resource, address, attempts = MAX_RETRIES, error = %e, "Giving up");
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_connect_retries_until_success() {
        let attempts = AtomicU32::new(0);

        let result: Result<&str, String> = connect_with_retry("queue-b", "memory", || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("not yet".to_string())
                } else {
                    Ok("connected")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "connected");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_gives_up_after_max_retries() {
        let attempts = AtomicU32::new(0);

        let result: Result<(), String> = connect_with_retry("queue-b", "memory", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err("down".to_string()) }
        })
        .await;

        assert_eq!(result.unwrap_err(), "down");
        assert_eq!(attempts.load(Ordering::SeqCst), MAX_RETRIES);
    }
}
