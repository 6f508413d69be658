use std::sync::Arc;

use log::{info, warn};
use reqwest::Url;

use super::fetcher::Fetcher;
use super::probe::{DimensionProbe, Dimensions};
use super::tools::{convert_image, ImageConversionParams, ImageProxyError};
use crate::config::AppConfig;

/// Image bytes ready to be cached and served.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub data: Vec<u8>,
    pub content_type: String,
    pub dimensions: Option<Dimensions>,
}

pub struct ImageProxy {
    fetcher: Arc<dyn Fetcher>,
    probe: DimensionProbe,
    require_https: bool,
    default_quality: u8,
    max_dimension: u32,
}

impl ImageProxy {
    pub fn new(fetcher: Arc<dyn Fetcher>, config: &AppConfig) -> Self {
        Self {
            fetcher,
            probe: config.dimension_probe,
            require_https: config.require_https,
            default_quality: config.default_quality,
            max_dimension: config.max_dimension,
        }
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    /// Parses `raw` and checks the scheme. Nothing is fetched.
    pub fn validate_url(&self, raw: &str) -> Result<Url, ImageProxyError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ImageProxyError::InvalidUrl("url parameter is required".to_string()));
        }

        let url = Url::parse(raw)
            .map_err(|e| ImageProxyError::InvalidUrl(format!("'{}' is not a valid URL: {}", raw, e)))?;

        match url.scheme() {
            "https" => {}
            "http" if !self.require_https => {}
            "http" => {
                return Err(ImageProxyError::InvalidUrl(
                    "Only HTTPS URLs are supported".to_string(),
                ))
            }
            other => {
                return Err(ImageProxyError::InvalidUrl(format!(
                    "Unsupported URL scheme: {}",
                    other
                )))
            }
        }

        if url.host_str().map_or(true, str::is_empty) {
            return Err(ImageProxyError::InvalidUrl(format!("'{}' has no host", raw)));
        }

        Ok(url)
    }

    /// Cache key for a source URL and rendition. The URL is used verbatim.
    pub fn cache_key(url: &str, params: &ImageConversionParams) -> String {
        if params.needs_conversion() {
            format!("{}#{}", url, params.to_cache_key())
        } else {
            url.to_string()
        }
    }

    // Fetch and optionally convert an image
    pub async fn fetch_and_convert_image(
        &self,
        url: &Url,
        params: &ImageConversionParams,
    ) -> Result<ProcessedImage, ImageProxyError> {
        info!("Fetching: {}", url);
        let fetched = self.fetcher.fetch(url).await?;
        let content_type = resolve_content_type(fetched.content_type.as_deref(), &fetched.data)?;

        if !params.needs_conversion() {
            let dimensions = self.probe.probe(&fetched.data);
            return Ok(ProcessedImage {
                data: fetched.data,
                content_type,
                dimensions,
            });
        }

        // decode, resize and encode are CPU-bound
        let params = *params;
        let default_quality = self.default_quality;
        let data = fetched.data;
        let converted = tokio::task::spawn_blocking(move || {
            convert_image(&data, &params, default_quality)
        })
        .await
        .map_err(|e| ImageProxyError::ConversionError(format!("Conversion task failed: {}", e)))??;
        info!(
            "Converted {} to {}x{} {}",
            url, converted.dimensions.width, converted.dimensions.height, converted.content_type
        );

        Ok(ProcessedImage {
            data: converted.data,
            content_type: converted.content_type,
            dimensions: Some(converted.dimensions),
        })
    }
}

/// Accepts the origin's `image/*` content type, sniffs the bytes when the
/// origin was vague, and rejects anything else.
pub fn resolve_content_type(claimed: Option<&str>, data: &[u8]) -> Result<String, ImageProxyError> {
    let claimed = claimed.map(str::trim).filter(|c| !c.is_empty());
    let media_type = claimed
        .map(|c| c.split(';').next().unwrap_or_default().trim().to_ascii_lowercase());

    match media_type.as_deref() {
        Some(m) if m.starts_with("image/") => Ok(claimed.unwrap_or(m).to_string()),
        None | Some("application/octet-stream") | Some("binary/octet-stream") => {
            detect_image_type(data).map(str::to_string).ok_or_else(|| {
                warn!("Could not recognise {} bytes of untyped content", data.len());
                ImageProxyError::NotAnImage(
                    claimed.unwrap_or("unknown (unrecognised bytes)").to_string(),
                )
            })
        }
        Some(_) => Err(ImageProxyError::NotAnImage(claimed.unwrap_or_default().to_string())),
    }
}

// Function to detect image type from the image data
pub fn detect_image_type(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if data.starts_with(b"GIF8") {
        Some("image/gif")
    } else if data.starts_with(b"RIFF") && data.get(8..12) == Some(b"WEBP".as_slice()) {
        Some("image/webp")
    } else if data.get(4..12) == Some(b"ftypavif".as_slice()) {
        Some("image/avif")
    } else if data.starts_with(b"BM") {
        Some("image/bmp")
    } else if data.starts_with(&[0x49, 0x49, 0x2A, 0x00]) || data.starts_with(&[0x4D, 0x4D, 0x00, 0x2A]) {
        Some("image/tiff")
    } else if data.starts_with(&[0x00, 0x00, 0x01, 0x00]) {
        Some("image/x-icon")
    } else {
        None
    }
}
