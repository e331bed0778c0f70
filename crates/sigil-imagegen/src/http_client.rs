use std::time::Duration;

use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use reqwest::{
    Client, RequestBuilder, Response,
    header::{CONNECTION, HeaderMap, HeaderValue},
};
use sigil_config::ProviderConfig;

use crate::{error::ProviderError, provider::ProviderKind};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(250);
const RETRY_BACKOFF_FACTOR: f64 = 2.0;

/// Build the HTTP client an adapter uses for every call to its backend
pub(crate) fn build_http_client(provider: ProviderKind, config: &ProviderConfig) -> Result<Client, ProviderError> {
    let timeout = config
        .request_timeout()
        .map_err(|e| invalid_setting(provider, &e))?
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT);
    let connect_timeout = config
        .connect_timeout()
        .map_err(|e| invalid_setting(provider, &e))?
        .unwrap_or(DEFAULT_CONNECT_TIMEOUT);

    let mut headers = HeaderMap::new();
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

    Client::builder()
        .timeout(timeout)
        .connect_timeout(connect_timeout)
        .pool_idle_timeout(Some(Duration::from_secs(5)))
        .tcp_nodelay(true)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .default_headers(headers)
        .build()
        .map_err(|e| ProviderError::Client {
            provider,
            message: e.to_string(),
        })
}

fn invalid_setting(provider: ProviderKind, error: &sigil_config::ConfigError) -> ProviderError {
    ProviderError::Client {
        provider,
        message: error.to_string(),
    }
}

/// Resends a request that failed with a timeout or connection error
///
/// Waits `interval` before the first resend and doubles it for each one after.
/// Any other failure, and the last transient one, is returned as is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HttpRetry {
    provider: ProviderKind,
    max_retries: u32,
    interval: Duration,
}

impl HttpRetry {
    pub(crate) fn from_config(provider: ProviderKind, config: &ProviderConfig) -> Result<Self, ProviderError> {
        let interval = config
            .retry_interval()
            .map_err(|e| invalid_setting(provider, &e))?
            .unwrap_or(DEFAULT_RETRY_INTERVAL);

        Ok(Self {
            provider,
            max_retries: config.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            interval,
        })
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.interval)
            .with_multiplier(RETRY_BACKOFF_FACTOR)
            .with_randomization_factor(0.0)
            .with_max_interval(Duration::from_secs(30))
            .with_max_elapsed_time(None)
            .build()
    }

    /// Send the request produced by `build`, calling it again for every resend
    ///
    /// An error from `build` ends the call before anything is sent.
    pub(crate) async fn send<F>(&self, mut build: F) -> Result<Response, ProviderError>
    where
        F: FnMut() -> Result<RequestBuilder, ProviderError>,
    {
        let provider = self.provider;
        let max_retries = self.max_retries;
        let mut attempts = 0;

        backoff::future::retry_notify(
            self.backoff(),
            || {
                attempts += 1;
                let can_resend = attempts <= max_retries;
                let request = build();

                async move {
                    match request {
                        Ok(request) => request.send().await.map_err(|e| {
                            let error = ProviderError::from_transport(provider, e);
                            if can_resend && error.is_transient() {
                                backoff::Error::transient(error)
                            } else {
                                backoff::Error::permanent(error)
                            }
                        }),
                        Err(error) => Err(backoff::Error::permanent(error)),
                    }
                }
            },
            |error: ProviderError, delay: Duration| {
                tracing::warn!(provider = %provider, error = %error, delay = ?delay, "resending image generation request");
            },
        )
        .await
    }
}
