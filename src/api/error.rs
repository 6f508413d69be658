use std::io::Cursor;

use chrono::Utc;
use log::warn;
use rocket::http::{ContentType, Header, Status};
use serde::Serialize;

use super::ENDPOINTS;
use crate::config::{AppConfig, ErrorFormat};
use crate::images::sources::{DEFAULT_HEIGHT, DEFAULT_WIDTH};
use crate::images::{svg, ImageProxyError};

#[derive(Debug)]
pub enum ApiError {
    /// Failure before a source URL was known (or irrelevant to one).
    ImageError(ImageProxyError),
    /// Failure while serving a specific source URL.
    Proxy { url: String, error: ImageProxyError },
    /// A `/<source>/<w>/<h>` path naming no known source.
    UnknownSource(String),
}

impl From<ImageProxyError> for ApiError {
    fn from(error: ImageProxyError) -> Self {
        ApiError::ImageError(error)
    }
}

impl ApiError {
    pub fn with_url(self, url: &str) -> Self {
        if url.trim().is_empty() {
            return self;
        }
        match self {
            ApiError::ImageError(error) => ApiError::Proxy {
                url: url.to_string(),
                error,
            },
            other => other,
        }
    }

    pub fn status(&self) -> Status {
        match self {
            ApiError::ImageError(error) | ApiError::Proxy { error, .. } => image_error_status(error),
            ApiError::UnknownSource(_) => Status::NotFound,
        }
    }

    fn title(&self) -> &'static str {
        match self {
            ApiError::ImageError(error) | ApiError::Proxy { error, .. } => match error {
                ImageProxyError::InvalidUrl(_) => "Invalid URL",
                ImageProxyError::InvalidParams(_) => "Invalid parameters",
                ImageProxyError::NetworkError(_)
                | ImageProxyError::Timeout(_)
                | ImageProxyError::UpstreamStatus(..)
                | ImageProxyError::NotAnImage(_) => "Failed to fetch image",
                ImageProxyError::ConversionError(_) => "Image processing error",
            },
            ApiError::UnknownSource(_) => "Endpoint not found",
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::ImageError(error) | ApiError::Proxy { error, .. } => error.to_string(),
            ApiError::UnknownSource(source) => format!("Unknown source: {}", source),
        }
    }
}

/// Validation and upstream failures are the caller's problem (400);
/// anything that broke while processing is ours (500).
fn image_error_status(error: &ImageProxyError) -> Status {
    match error {
        ImageProxyError::InvalidUrl(_)
        | ImageProxyError::InvalidParams(_)
        | ImageProxyError::NetworkError(_)
        | ImageProxyError::Timeout(_)
        | ImageProxyError::UpstreamStatus(..)
        | ImageProxyError::NotAnImage(_) => Status::BadRequest,
        ImageProxyError::ConversionError(_) => Status::InternalServerError,
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_endpoints: Option<Vec<&'static str>>,
    pub timestamp: String,
}

impl<'r> rocket::response::Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r rocket::Request<'_>) -> rocket::response::Result<'static> {
        let status = self.status();
        let title = self.title();
        let message = self.message();

        if status.code >= 500 {
            log::error!("{} {}: {}", req.method(), req.uri(), message);
        } else {
            warn!("{} {}: {}", req.method(), req.uri(), message);
        }

        let svg_errors = req
            .rocket()
            .state::<AppConfig>()
            .map_or(false, |config| config.error_format == ErrorFormat::Svg);

        if svg_errors && !matches!(self, ApiError::UnknownSource(_)) {
            let body = svg::error_placeholder(DEFAULT_WIDTH, DEFAULT_HEIGHT, title, &message);
            return rocket::Response::build()
                .status(status)
                .header(ContentType::SVG)
                .header(Header::new("Cache-Control", "no-cache"))
                .sized_body(None, Cursor::new(body))
                .ok();
        }

        let (url, available_endpoints) = match self {
            ApiError::Proxy { url, .. } => (Some(url), None),
            ApiError::UnknownSource(_) => (None, Some(ENDPOINTS.to_vec())),
            ApiError::ImageError(_) => (None, None),
        };

        let body = ErrorBody {
            error: title.to_string(),
            message,
            url,
            available_endpoints,
            timestamp: Utc::now().to_rfc3339(),
        };
        let body = serde_json::to_string(&body).map_err(|_| Status::InternalServerError)?;

        rocket::Response::build()
            .status(status)
            .header(ContentType::JSON)
            .header(Header::new("Cache-Control", "no-cache"))
            .sized_body(None, Cursor::new(body))
            .ok()
    }
}
