use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, COOKIE, HeaderMap, HeaderValue, REFERER, USER_AGENT};

use crate::config::Config;
use crate::error::{FetchError, Result};

/// Blocking text GET. The pipeline only ever needs response bodies.
pub trait Transport {
    fn get_text(&self, url: &str) -> Result<String>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get_text(&self, url: &str) -> Result<String> {
        (**self).get_text(url)
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            initial_delay: config.retry_delay(),
        }
    }
}

/// Runs `operation` until it succeeds, fails permanently, or exhausts
/// `policy.max_attempts`. The delay doubles after every retryable failure.
pub fn with_retry<T>(policy: &RetryPolicy, mut operation: impl FnMut() -> Result<T>) -> Result<T> {
    let mut attempt = 1;
    let mut delay = policy.initial_delay;

    loop {
        match operation() {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(attempts = attempt, "request succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                tracing::warn!(
                    error = %err,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "request failed, retrying"
                );
                std::thread::sleep(delay);
                delay = delay.saturating_mul(2);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

pub struct HttpTransport {
    client: reqwest::blocking::Client,
    retry: RetryPolicy,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            header_value(&config.user_agent, "user_agent")?,
        );
        headers.insert(
            REFERER,
            header_value(&format!("{}/", config.base_url.trim_end_matches('/')), "base_url")?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json,text/html;q=0.9,*/*;q=0.8"),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("zh-CN,zh;q=0.9,ja;q=0.8,en;q=0.7"),
        );

        let cookie = cookie_header(&config.cookie)?;
        if cookie.is_empty() {
            tracing::warn!("no cookie configured; most items will require a logged-in session");
        } else {
            let mut value = header_value(&cookie, "cookie")?;
            value.set_sensitive(true);
            headers.insert(COOKIE, value);
        }

        let mut builder = reqwest::blocking::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout());
        if let Some(proxy) = config.proxy.as_deref() {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|err| FetchError::Config(format!("invalid proxy `{proxy}`: {err}")))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|err| FetchError::Config(format!("build http client: {err}")))?;

        Ok(Self {
            client,
            retry: RetryPolicy::from_config(config),
        })
    }

    fn get_once(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| FetchError::Transport {
                url: url.to_owned(),
                message: err.to_string(),
                retryable: err.is_timeout() || err.is_connect() || err.is_request(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Transport {
                url: url.to_owned(),
                message: format!("HTTP {status}"),
                retryable: status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS,
            });
        }

        response.text().map_err(|err| FetchError::Transport {
            url: url.to_owned(),
            message: format!("read body: {err}"),
            retryable: err.is_timeout(),
        })
    }
}

impl Transport for HttpTransport {
    fn get_text(&self, url: &str) -> Result<String> {
        tracing::debug!(%url, "GET");
        with_retry(&self.retry, || self.get_once(url))
    }
}

fn header_value(value: &str, setting: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|err| FetchError::Config(format!("`{setting}` is not a valid header value: {err}")))
}

/// Splits a browser cookie string into `(name, value)` pairs. Empty segments are
/// skipped; a segment without `=` is an error.
pub fn parse_cookie(raw: &str) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    for segment in raw.split(';') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let Some((name, value)) = segment.split_once('=') else {
            return Err(FetchError::Config(format!(
                "cookie segment `{segment}` is not a name=value pair"
            )));
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(FetchError::Config(format!(
                "cookie segment `{segment}` has an empty name"
            )));
        }
        pairs.push((name.to_owned(), value.trim().to_owned()));
    }
    Ok(pairs)
}

fn cookie_header(raw: &str) -> Result<String> {
    let pairs = parse_cookie(raw)?;
    Ok(pairs
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("; "))
}
