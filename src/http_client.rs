use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use once_cell::sync::OnceCell;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{RETRY_AFTER, USER_AGENT};
use serde_json::Value;
use tracing::warn;

const REQUEST_TIMEOUT_SECS: u64 = 30;

static CLIENT: OnceCell<Client> = OnceCell::new();

pub fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build http client")
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub factor: f64,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            initial_backoff: Duration::from_millis(750),
            factor: 1.8,
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// How long to wait before the next attempt. A server hint wins over the
    /// running backoff; both are capped.
    pub fn delay(&self, retry_after: Option<&str>, backoff: Duration) -> Duration {
        let hinted = retry_after
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|secs| *secs >= 0.0)
            .map(|secs| secs.min(self.max_backoff.as_secs_f64()))
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok());
        hinted.unwrap_or(backoff).min(self.max_backoff)
    }

    pub fn next_backoff(&self, backoff: Duration) -> Duration {
        backoff.mul_f64(self.factor).min(self.max_backoff)
    }
}

/// GET `url` as JSON. 429s, 5xx and connection errors are retried; other
/// statuses fail at once.
pub fn get_json_with_retry(
    client: &Client,
    url: &str,
    query: &[(&str, &str)],
    policy: &RetryPolicy,
) -> Result<Value> {
    let mut backoff = policy.initial_backoff;
    let mut last_err = None;

    for attempt in 1..=policy.max_attempts {
        let sent = client
            .get(url)
            .query(query)
            .header(USER_AGENT, "rink_picks/0.1")
            .send();
        let resp = match sent {
            Ok(resp) => resp,
            Err(err) => {
                warn!(url, attempt, %err, "request failed, retrying");
                last_err = Some(anyhow!(err));
                if attempt < policy.max_attempts {
                    thread::sleep(policy.delay(None, backoff));
                    backoff = policy.next_backoff(backoff);
                }
                continue;
            }
        };

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            let hint = resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let wait = policy.delay(hint.as_deref(), backoff);
            warn!(url, attempt, %status, wait_ms = wait.as_millis() as u64, "throttled, backing off");
            last_err = Some(anyhow!("http {status}"));
            if attempt < policy.max_attempts {
                thread::sleep(wait);
                backoff = policy.next_backoff(backoff);
            }
            continue;
        }

        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(anyhow!("http {status} for {url}: {body}"));
        }
        return resp
            .json::<Value>()
            .with_context(|| format!("invalid json from {url}"));
    }

    let cause = last_err.unwrap_or_else(|| anyhow!("no attempts made"));
    Err(cause.context(format!(
        "too many retries for {url} ({} attempts)",
        policy.max_attempts
    )))
}
