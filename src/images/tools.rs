use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageEncoder};
use serde::Serialize;
use thiserror::Error;

use super::probe::Dimensions;

#[derive(Error, Debug)]
pub enum ImageProxyError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid parameter: {0}")]
    InvalidParams(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Upstream request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Upstream responded with HTTP {0} {1}")]
    UpstreamStatus(u16, String),

    #[error("Upstream returned non-image content type: {0}")]
    NotAnImage(String),

    #[error("Image conversion error: {0}")]
    ConversionError(String),
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImageConversionFormat {
    Jpeg,
    Png,
    Webp,
    Gif,
    Avif,
}

impl ImageConversionFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Gif => "image/gif",
            Self::Avif => "image/avif",
        }
    }
}

impl FromStr for ImageConversionFormat {
    type Err = ImageProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "webp" => Ok(Self::Webp),
            "gif" => Ok(Self::Gif),
            "avif" => Ok(Self::Avif),
            other => Err(ImageProxyError::InvalidParams(format!(
                "Unsupported format: {} (expected jpeg, png, webp, gif or avif)",
                other
            ))),
        }
    }
}

impl fmt::Display for ImageConversionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Gif => "gif",
            Self::Avif => "avif",
        };
        f.write_str(name)
    }
}

/// How an image is fitted into a box when both width and height are given.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageFit {
    /// Stretch to exactly the requested box.
    #[default]
    Scale,
    /// Shrink or grow until it fits inside the box, keeping aspect ratio.
    Contain,
    /// Fill the box and crop the overflow around the centre.
    Cover,
}

impl FromStr for ImageFit {
    type Err = ImageProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scale" | "fill" => Ok(Self::Scale),
            "contain" | "inside" => Ok(Self::Contain),
            "cover" | "crop" => Ok(Self::Cover),
            other => Err(ImageProxyError::InvalidParams(format!(
                "Unsupported fit: {} (expected scale, contain or cover)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageConversionParams {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: Option<ImageConversionFormat>,
    pub quality: Option<u8>,
    pub fit: Option<ImageFit>,
}

/// Raw, unvalidated conversion parameters as they arrive in a query string.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawConversionParams<'a> {
    pub width: Option<&'a str>,
    pub height: Option<&'a str>,
    pub quality: Option<&'a str>,
    pub format: Option<&'a str>,
    pub fit: Option<&'a str>,
}

impl ImageConversionParams {
    /// Validates raw query values. Empty values and a zero dimension count
    /// as absent.
    pub fn parse(raw: RawConversionParams<'_>, max_dimension: u32) -> Result<Self, ImageProxyError> {
        let width = parse_dimension("width", raw.width, max_dimension)?;
        let height = parse_dimension("height", raw.height, max_dimension)?;

        let quality = match non_empty(raw.quality) {
            Some(q) => {
                let quality = q.parse::<u8>().ok().filter(|q| (1..=100).contains(q));
                match quality {
                    Some(q) => Some(q),
                    None => {
                        return Err(ImageProxyError::InvalidParams(format!(
                            "quality must be an integer between 1 and 100, got '{}'",
                            q
                        )))
                    }
                }
            }
            None => None,
        };

        let format = non_empty(raw.format).map(str::parse).transpose()?;
        let fit = non_empty(raw.fit).map(str::parse).transpose()?;

        Ok(Self {
            width,
            height,
            format,
            quality,
            fit,
        })
    }

    pub fn has_dimensions(&self) -> bool {
        self.width.is_some() || self.height.is_some()
    }

    /// Check if any conversion parameters are set (i.e., if conversion is needed)
    pub fn needs_conversion(&self) -> bool {
        self.has_dimensions() || self.format.is_some() || self.quality.is_some() || self.fit.is_some()
    }

    pub fn to_cache_key(&self) -> String {
        let mut parts = Vec::new();

        if let Some(width) = self.width {
            parts.push(format!("w{}", width));
        }
        if let Some(height) = self.height {
            parts.push(format!("h{}", height));
        }
        if let Some(format) = self.format {
            parts.push(format!("f{}", format));
        }
        if let Some(quality) = self.quality {
            parts.push(format!("q{}", quality));
        }
        if let Some(fit) = self.fit {
            parts.push(format!("fit{:?}", fit).to_lowercase());
        }

        if parts.is_empty() {
            "original".to_string()
        } else {
            parts.join("_")
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_dimension(name: &str, value: Option<&str>, max: u32) -> Result<Option<u32>, ImageProxyError> {
    let Some(value) = non_empty(value) else {
        return Ok(None);
    };

    match value.parse::<u32>() {
        Ok(0) => Ok(None),
        Ok(v) if v <= max => Ok(Some(v)),
        Ok(v) => Err(ImageProxyError::InvalidParams(format!(
            "{} must not exceed {}, got {}",
            name, max, v
        ))),
        Err(_) => Err(ImageProxyError::InvalidParams(format!(
            "{} must be a positive integer, got '{}'",
            name, value
        ))),
    }
}

/// Output of a conversion.
#[derive(Debug, Clone)]
pub struct ConvertedImage {
    pub data: Vec<u8>,
    pub content_type: String,
    pub dimensions: Dimensions,
}

/// Target size for `original` given the requested width and/or height.
///
/// With a single side given, the other follows the original aspect ratio:
/// `other = round(given / original_given * original_other)`, at least 1.
pub fn target_dimensions(original: Dimensions, width: Option<u32>, height: Option<u32>) -> Dimensions {
    let scaled = |given: u32, on_axis: u32, other_axis: u32| -> u32 {
        if on_axis == 0 {
            return other_axis.max(1);
        }
        let value = (given as f64 / on_axis as f64 * other_axis as f64).round();
        (value as u32).max(1)
    };

    match (width, height) {
        (Some(w), Some(h)) => Dimensions::new(w, h),
        (Some(w), None) => Dimensions::new(w, scaled(w, original.width, original.height)),
        (None, Some(h)) => Dimensions::new(scaled(h, original.height, original.width), h),
        (None, None) => original,
    }
}

// Convert image according to parameters
pub fn convert_image(
    image_data: &[u8],
    params: &ImageConversionParams,
    default_quality: u8,
) -> Result<ConvertedImage, ImageProxyError> {
    let img = image::load_from_memory(image_data)
        .map_err(|e| ImageProxyError::ConversionError(format!("Failed to load image: {}", e)))?;

    let processed = resize_image(img, params);
    let (width, height) = processed.dimensions();
    let (data, content_type) = encode_image(processed, params, default_quality)?;

    Ok(ConvertedImage {
        data,
        content_type,
        dimensions: Dimensions::new(width, height),
    })
}

fn resize_image(img: DynamicImage, params: &ImageConversionParams) -> DynamicImage {
    if !params.has_dimensions() {
        return img;
    }

    let (current_width, current_height) = img.dimensions();
    let target = target_dimensions(
        Dimensions::new(current_width, current_height),
        params.width,
        params.height,
    );

    // a single given side already preserves the aspect ratio
    let fit = if params.width.is_some() && params.height.is_some() {
        params.fit.unwrap_or_default()
    } else {
        ImageFit::Scale
    };

    match fit {
        ImageFit::Scale => img.resize_exact(target.width, target.height, FilterType::Lanczos3),
        ImageFit::Contain => img.resize(target.width, target.height, FilterType::Lanczos3),
        ImageFit::Cover => img.resize_to_fill(target.width, target.height, FilterType::Lanczos3),
    }
}

fn encode_image(
    img: DynamicImage,
    params: &ImageConversionParams,
    default_quality: u8,
) -> Result<(Vec<u8>, String), ImageProxyError> {
    let mut output = Vec::new();
    let format = params.format.unwrap_or(ImageConversionFormat::Jpeg);
    let quality = params.quality.unwrap_or(default_quality).clamp(1, 100);

    match format {
        ImageConversionFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb = img.to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut output, quality);
            encoder
                .encode_image(&rgb)
                .map_err(|e| ImageProxyError::ConversionError(format!("JPEG encoding failed: {}", e)))?;
        }
        ImageConversionFormat::Avif => {
            let rgba = img.to_rgba8();
            let encoder = AvifEncoder::new_with_speed_quality(&mut output, 8, quality);
            encoder
                .write_image(rgba.as_raw(), rgba.width(), rgba.height(), image::ColorType::Rgba8)
                .map_err(|e| ImageProxyError::ConversionError(format!("AVIF encoding failed: {}", e)))?;
        }
        ImageConversionFormat::Png | ImageConversionFormat::Webp | ImageConversionFormat::Gif => {
            let target = match format {
                ImageConversionFormat::Png => image::ImageFormat::Png,
                ImageConversionFormat::Webp => image::ImageFormat::WebP,
                _ => image::ImageFormat::Gif,
            };
            img.write_to(&mut Cursor::new(&mut output), target)
                .map_err(|e| {
                    ImageProxyError::ConversionError(format!("{} encoding failed: {}", format, e))
                })?;
        }
    }

    Ok((output, format.content_type().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(image::RgbImage::new(width, height));
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    fn raw<'a>(width: Option<&'a str>, height: Option<&'a str>) -> RawConversionParams<'a> {
        RawConversionParams {
            width,
            height,
            ..Default::default()
        }
    }

    #[test]
    fn single_width_preserves_aspect_ratio() {
        let target = target_dimensions(Dimensions::new(200, 400), Some(100), None);
        assert_eq!(target, Dimensions::new(100, 200));
    }

    #[test]
    fn single_height_preserves_aspect_ratio() {
        let target = target_dimensions(Dimensions::new(300, 200), None, Some(50));
        assert_eq!(target, Dimensions::new(75, 50));
    }

    #[test]
    fn computed_side_is_rounded_not_truncated() {
        // 100 / 3 * 2 = 66.67
        let target = target_dimensions(Dimensions::new(3, 2), Some(100), None);
        assert_eq!(target.height, 67);
    }

    #[test]
    fn computed_side_never_collapses_to_zero() {
        let target = target_dimensions(Dimensions::new(1000, 1), Some(10), None);
        assert_eq!(target.height, 1);
    }

    #[test]
    fn zero_dimension_is_treated_as_absent() {
        let params = ImageConversionParams::parse(raw(Some("100"), Some("0")), 4096).unwrap();
        assert_eq!(params.width, Some(100));
        assert_eq!(params.height, None);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(ImageConversionParams::parse(raw(Some("-5"), None), 4096).is_err());
        assert!(ImageConversionParams::parse(raw(Some("wide"), None), 4096).is_err());
        assert!(ImageConversionParams::parse(raw(None, Some("5000")), 4096).is_err());

        let quality = RawConversionParams {
            quality: Some("101"),
            ..Default::default()
        };
        assert!(ImageConversionParams::parse(quality, 4096).is_err());

        let format = RawConversionParams {
            format: Some("bmp"),
            ..Default::default()
        };
        assert!(ImageConversionParams::parse(format, 4096).is_err());
    }

    #[test]
    fn cache_key_describes_rendition() {
        let params = ImageConversionParams {
            width: Some(100),
            height: None,
            format: Some(ImageConversionFormat::Webp),
            quality: Some(70),
            fit: Some(ImageFit::Cover),
        };
        assert_eq!(params.to_cache_key(), "w100_fwebp_q70_fitcover");
        assert_eq!(ImageConversionParams::default().to_cache_key(), "original");
    }

    #[test]
    fn convert_resizes_and_reencodes() {
        let params = ImageConversionParams {
            width: Some(100),
            ..Default::default()
        };

        let converted = convert_image(&png(200, 400), &params, 85).unwrap();

        assert_eq!(converted.content_type, "image/jpeg");
        assert_eq!(converted.dimensions, Dimensions::new(100, 200));
        let decoded = image::load_from_memory(&converted.data).unwrap();
        assert_eq!(decoded.dimensions(), (100, 200));
    }

    #[test]
    fn cover_fills_the_exact_box() {
        let params = ImageConversionParams {
            width: Some(50),
            height: Some(50),
            format: Some(ImageConversionFormat::Png),
            fit: Some(ImageFit::Cover),
            ..Default::default()
        };

        let converted = convert_image(&png(200, 100), &params, 85).unwrap();
        assert_eq!(converted.dimensions, Dimensions::new(50, 50));
    }

    #[test]
    fn contain_keeps_aspect_inside_box() {
        let params = ImageConversionParams {
            width: Some(50),
            height: Some(50),
            format: Some(ImageConversionFormat::Png),
            fit: Some(ImageFit::Contain),
            ..Default::default()
        };

        let converted = convert_image(&png(200, 100), &params, 85).unwrap();
        assert_eq!(converted.dimensions, Dimensions::new(50, 25));
    }

    #[test]
    fn garbage_input_is_a_conversion_error() {
        let params = ImageConversionParams {
            width: Some(10),
            ..Default::default()
        };
        let err = convert_image(b"not an image", &params, 85).unwrap_err();
        assert!(matches!(err, ImageProxyError::ConversionError(_)));
    }
}
