use std::time::Duration;

use async_trait::async_trait;
use log::{error, info};
use reqwest::Url;

use super::headers::HeaderRules;
use super::ImageProxyError;
use crate::config::{AppConfig, ConfigError};

/// Raw bytes from an origin and the content type it claimed, if any.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub data: Vec<u8>,
    pub content_type: Option<String>,
}

/// Performs one fetch of a remote resource. No retries.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchedImage, ImageProxyError>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
    headers: HeaderRules,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(
        timeout: Duration,
        headers: HeaderRules,
        proxy_url: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let client_builder = reqwest::Client::builder().timeout(timeout);

        // Add proxy if provided
        let client_builder = match proxy_url {
            Some(proxy) => {
                let proxy = reqwest::Proxy::all(proxy)
                    .map_err(|e| ConfigError::InvalidProxy(proxy.to_string(), e.to_string()))?;
                client_builder.proxy(proxy)
            }
            None => client_builder,
        };

        Ok(Self {
            client: client_builder.build()?,
            headers,
            timeout,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let headers = HeaderRules::from_config(config)?;
        let proxy = config.outbound_proxy.as_deref().filter(|p| !p.is_empty());
        Self::new(config.fetch_timeout(), headers, proxy)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedImage, ImageProxyError> {
        let headers = self.headers.headers_for(url.host_str().unwrap_or_default());

        let response = self
            .client
            .get(url.clone())
            .headers(headers)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            error!("Image request for {} failed with status: {}", url, status);
            return Err(ImageProxyError::UpstreamStatus(
                status.as_u16(),
                status.canonical_reason().unwrap_or_default().to_string(),
            ));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|h| h.to_str().ok())
            .map(|h| h.to_string());

        let data = response.bytes().await.map_err(|e| self.classify(e))?.to_vec();
        info!("Fetched {} ({} bytes)", url, data.len());

        Ok(FetchedImage { data, content_type })
    }
}

impl HttpFetcher {
    fn classify(&self, err: reqwest::Error) -> ImageProxyError {
        if err.is_timeout() {
            ImageProxyError::Timeout(self.timeout.as_secs())
        } else {
            ImageProxyError::NetworkError(err)
        }
    }
}
