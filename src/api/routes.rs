use std::path::PathBuf;

use chrono::Utc;
use log::{debug, info};
use rocket::http::{Accept, Status};
use rocket::response::content::RawHtml;
use rocket::{Request, State};

use super::responses::{
    human_size, CacheStatus, ClearResponse, HealthResponse, ImageResponse, InfoPage,
    NoCacheJson, NotFoundResponse, ProxyOrInfo, ServiceInfo, SourceInfo, SourcesResponse,
    StatsResponse,
};
use super::{ApiError, ENDPOINTS};
use crate::cache::{CacheEntry, ImageCache};
use crate::images::sources::{self, DEFAULT_HEIGHT, DEFAULT_WIDTH};
use crate::images::{
    ImageConversionParams, ImageProxy, ImageProxyError, PlaceholderSource, RawConversionParams,
    SourceOptions,
};

const SERVICE_NAME: &str = "imgcache";
const INDEX_HTML: &str = include_str!("index.html");

#[derive(FromForm, Debug, Default)]
pub struct ImageQuery {
    pub url: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
    pub quality: Option<String>,
    pub format: Option<String>,
    pub fit: Option<String>,
}

impl ImageQuery {
    fn conversion_params(&self, max_dimension: u32) -> Result<ImageConversionParams, ImageProxyError> {
        ImageConversionParams::parse(
            RawConversionParams {
                width: self.width.as_deref(),
                height: self.height.as_deref(),
                quality: self.quality.as_deref(),
                format: self.format.as_deref(),
                fit: self.fit.as_deref(),
            },
            max_dimension,
        )
    }
}

/// Cache lookup, then fetch-convert-store on a miss.
async fn serve_image(
    raw_url: &str,
    params: &ImageConversionParams,
    cache: &ImageCache,
    proxy: &ImageProxy,
) -> Result<ImageResponse, ApiError> {
    let raw_url = raw_url.trim();
    let url = proxy
        .validate_url(raw_url)
        .map_err(|e| ApiError::from(e).with_url(raw_url))?;

    let key = ImageProxy::cache_key(raw_url, params);
    let max_age = cache.ttl().as_secs();

    if let Some(entry) = cache.get(&key) {
        info!("Image found in cache: {}", key);
        return Ok(ImageResponse::from_entry(entry, CacheStatus::Hit, max_age));
    }

    info!("Image not found in cache: {}", key);

    let processed = proxy
        .fetch_and_convert_image(&url, params)
        .await
        .map_err(|e| ApiError::from(e).with_url(raw_url))?;

    let entry = CacheEntry::new(
        key,
        processed.data,
        processed.content_type,
        cache.clock().now(),
        processed.dimensions,
    );
    cache.put(entry.clone());

    Ok(ImageResponse::from_entry(entry, CacheStatus::Miss, max_age))
}

async fn proxy_or_info(
    query: ImageQuery,
    accept: Option<&Accept>,
    cache: &ImageCache,
    proxy: &ImageProxy,
) -> Result<ProxyOrInfo, ApiError> {
    let Some(url) = query.url.as_deref().filter(|u| !u.trim().is_empty()) else {
        let wants_json = accept.map_or(false, |a| a.preferred().media_type().is_json());
        let page = if wants_json {
            InfoPage::Json(NoCacheJson(service_info()))
        } else {
            InfoPage::Html(RawHtml(INDEX_HTML))
        };
        return Ok(ProxyOrInfo::Info(page));
    };

    let params = query
        .conversion_params(proxy.max_dimension())
        .map_err(|e| ApiError::from(e).with_url(url))?;

    serve_image(url, &params, cache, proxy)
        .await
        .map(ProxyOrInfo::Image)
}

fn service_info() -> ServiceInfo {
    ServiceInfo {
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        usage: "GET /?url=YOUR_IMAGE_URL",
        endpoints: ENDPOINTS.to_vec(),
    }
}

#[get("/?<query..>")]
pub async fn index(
    query: ImageQuery,
    accept: Option<&Accept>,
    cache: &State<ImageCache>,
    proxy: &State<ImageProxy>,
) -> Result<ProxyOrInfo, ApiError> {
    proxy_or_info(query, accept, cache, proxy).await
}

#[get("/view?<query..>")]
pub async fn view(
    query: ImageQuery,
    accept: Option<&Accept>,
    cache: &State<ImageCache>,
    proxy: &State<ImageProxy>,
) -> Result<ProxyOrInfo, ApiError> {
    proxy_or_info(query, accept, cache, proxy).await
}

/// Cached proxy; transforms only when conversion parameters are present.
#[get("/cache?<query..>")]
pub async fn cached_image(
    query: ImageQuery,
    cache: &State<ImageCache>,
    proxy: &State<ImageProxy>,
) -> Result<ImageResponse, ApiError> {
    let url = query.url.as_deref().unwrap_or_default();
    let params = query
        .conversion_params(proxy.max_dimension())
        .map_err(|e| ApiError::from(e).with_url(url))?;

    serve_image(url, &params, cache, proxy).await
}

/// Like `/cache`, but at least one of width/height is mandatory.
#[get("/resize?<query..>")]
pub async fn resize_image(
    query: ImageQuery,
    cache: &State<ImageCache>,
    proxy: &State<ImageProxy>,
) -> Result<ImageResponse, ApiError> {
    let url = query.url.as_deref().unwrap_or_default();
    let params = query
        .conversion_params(proxy.max_dimension())
        .map_err(|e| ApiError::from(e).with_url(url))?;

    if !params.has_dimensions() {
        return Err(ApiError::from(ImageProxyError::InvalidParams(
            "Either width or height is required".to_string(),
        ))
        .with_url(url));
    }

    serve_image(url, &params, cache, proxy).await
}

#[get("/<source>/<width>/<height>?<id>&<category>", rank = 10)]
pub async fn placeholder(
    source: &str,
    width: &str,
    height: &str,
    id: Option<u32>,
    category: Option<&str>,
    cache: &State<ImageCache>,
    proxy: &State<ImageProxy>,
) -> Result<ImageResponse, ApiError> {
    let source: PlaceholderSource = source
        .parse()
        .map_err(|_| ApiError::UnknownSource(source.to_string()))?;

    let max = proxy.max_dimension();
    let width = sources::dimension_or(width, DEFAULT_WIDTH, max);
    let height = sources::dimension_or(height, DEFAULT_HEIGHT, max);
    let url = source.url(width, height, SourceOptions { id, category });
    debug!("Placeholder {} resolved to {}", source.name(), url);

    serve_image(&url, &ImageConversionParams::default(), cache, proxy).await
}

#[get("/health")]
pub fn health(cache: &State<ImageCache>) -> NoCacheJson<HealthResponse> {
    NoCacheJson(HealthResponse {
        status: "ok",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        cache_size: cache.len(),
        timestamp: cache.clock().now().to_rfc3339(),
    })
}

#[get("/stats")]
pub fn stats(cache: &State<ImageCache>) -> NoCacheJson<StatsResponse> {
    let stats = cache.stats();
    NoCacheJson(StatsResponse {
        cache_entries: stats.entries,
        approximate_bytes: stats.approximate_bytes,
        approximate_size: human_size(stats.approximate_bytes),
        hits: stats.hits,
        misses: stats.misses,
        ttl_seconds: stats.ttl_seconds,
    })
}

fn clear(cache: &ImageCache) -> NoCacheJson<ClearResponse> {
    NoCacheJson(ClearResponse {
        cleared_entries: cache.clear(),
        timestamp: cache.clock().now().to_rfc3339(),
    })
}

#[get("/clear")]
pub fn clear_get(cache: &State<ImageCache>) -> NoCacheJson<ClearResponse> {
    clear(cache)
}

#[post("/clear")]
pub fn clear_post(cache: &State<ImageCache>) -> NoCacheJson<ClearResponse> {
    clear(cache)
}

#[get("/clear-cache")]
pub fn clear_cache_get(cache: &State<ImageCache>) -> NoCacheJson<ClearResponse> {
    clear(cache)
}

#[post("/clear-cache")]
pub fn clear_cache_post(cache: &State<ImageCache>) -> NoCacheJson<ClearResponse> {
    clear(cache)
}

#[get("/sources")]
pub fn list_sources() -> NoCacheJson<SourcesResponse> {
    let available_sources = PlaceholderSource::ALL
        .into_iter()
        .map(|source| SourceInfo {
            name: source.name(),
            example: source.url(DEFAULT_WIDTH, DEFAULT_HEIGHT, SourceOptions::default()),
            usage: source.usage(),
        })
        .collect();

    NoCacheJson(SourcesResponse {
        available_sources,
        custom_url: "GET /?url=YOUR_IMAGE_URL",
    })
}

/// CORS preflight for any path; the headers come from the CORS fairing.
#[options("/<_path..>")]
pub fn preflight(_path: PathBuf) -> Status {
    Status::NoContent
}

#[catch(404)]
pub fn not_found(req: &Request<'_>) -> (Status, NoCacheJson<NotFoundResponse>) {
    (
        Status::NotFound,
        NoCacheJson(NotFoundResponse {
            error: "Endpoint not found",
            path: req.uri().path().to_string(),
            available_endpoints: ENDPOINTS.to_vec(),
        }),
    )
}

#[catch(default)]
pub fn default_catcher(status: Status, req: &Request<'_>) -> (Status, NoCacheJson<serde_json::Value>) {
    (
        status,
        NoCacheJson(serde_json::json!({
            "error": status.reason().unwrap_or("Error"),
            "message": format!("{} {} failed with status {}", req.method(), req.uri(), status.code),
            "timestamp": Utc::now().to_rfc3339(),
        })),
    )
}
