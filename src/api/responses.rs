use std::io::Cursor;
use std::sync::Arc;

use rocket::http::{Header, Status};
use rocket::response::content::RawHtml;
use rocket::serde::json::Json;
use rocket::{request::Request, response::{self, Responder, Response}};
use serde::Serialize;

use crate::cache::CacheEntry;
use crate::images::Dimensions;

const CONTENT_SECURITY_POLICY: &str =
    "default-src 'none'; img-src 'self' data:; style-src 'self' 'unsafe-inline'";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

// Responder for image data
pub struct ImageResponse {
    pub data: Arc<[u8]>,
    pub content_type: String,
    pub cache_status: CacheStatus,
    pub dimensions: Option<Dimensions>,
    pub max_age: u64,
}

impl ImageResponse {
    pub fn from_entry(entry: CacheEntry, cache_status: CacheStatus, max_age: u64) -> Self {
        Self {
            data: entry.data,
            content_type: entry.content_type,
            cache_status,
            dimensions: entry.dimensions,
            max_age,
        }
    }
}

impl<'r> Responder<'r, 'static> for ImageResponse {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let etag = format!("\"{:x}\"", md5::compute(&self.data));
        let cache_control = format!("public, max-age={0}, s-maxage={0}", self.max_age);

        let mut response = Response::build();
        response
            .header(Header::new("Cache-Control", cache_control))
            .header(Header::new("ETag", etag.clone()))
            .header(Header::new("X-Cache", self.cache_status.as_str()))
            .header(Header::new("Vary", "Accept-Encoding"))
            .header(Header::new("X-Content-Type-Options", "nosniff"))
            .header(Header::new("X-Frame-Options", "DENY"))
            .header(Header::new("X-XSS-Protection", "1; mode=block"))
            .header(Header::new("Referrer-Policy", "strict-origin-when-cross-origin"))
            .header(Header::new("Content-Security-Policy", CONTENT_SECURITY_POLICY));

        if let Some(dimensions) = self.dimensions {
            response
                .header(Header::new("X-Image-Width", dimensions.width.to_string()))
                .header(Header::new("X-Image-Height", dimensions.height.to_string()));
        }

        if req.headers().get("If-None-Match").any(|value| etag_matches(value, &etag)) {
            return response.status(Status::NotModified).ok();
        }

        response
            .header(Header::new("Content-Type", self.content_type))
            .sized_body(self.data.len(), Cursor::new(self.data))
            .ok()
    }
}

/// Weak comparison of an `If-None-Match` value (a list of tags, or `*`)
/// against our strong `etag`.
fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    if_none_match
        .split(',')
        .map(str::trim)
        .any(|tag| tag == "*" || tag.strip_prefix("W/").unwrap_or(tag) == etag)
}

/// JSON that intermediaries must not cache.
pub struct NoCacheJson<T>(pub T);

impl<'r, T: Serialize> Responder<'r, 'static> for NoCacheJson<T> {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let mut response = Json(self.0).respond_to(req)?;
        response.set_header(Header::new("Cache-Control", "no-cache"));
        Ok(response)
    }
}

/// What `/` returns when no `url` is given.
#[derive(Responder)]
pub enum InfoPage {
    Html(RawHtml<&'static str>),
    Json(NoCacheJson<ServiceInfo>),
}

/// Either the proxied image or the info page.
#[derive(Responder)]
pub enum ProxyOrInfo {
    Image(ImageResponse),
    Info(InfoPage),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    pub service: &'static str,
    pub version: &'static str,
    pub usage: &'static str,
    pub endpoints: Vec<&'static str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub cache_size: usize,
    pub timestamp: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub cache_entries: usize,
    pub approximate_bytes: u64,
    pub approximate_size: String,
    pub hits: u64,
    pub misses: u64,
    pub ttl_seconds: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearResponse {
    pub cleared_entries: usize,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct SourceInfo {
    pub name: &'static str,
    pub example: String,
    pub usage: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcesResponse {
    pub available_sources: Vec<SourceInfo>,
    pub custom_url: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotFoundResponse {
    pub error: &'static str,
    pub path: String,
    pub available_endpoints: Vec<&'static str>,
}

/// `1536` -> `"1.5 KB"`.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
