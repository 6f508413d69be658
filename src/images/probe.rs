//! Best-effort image dimension detection.
//!
//! A failed probe means "dimensions unknown" and is never an error.

use std::io::Cursor;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionProbe {
    /// Never look.
    None,
    /// Scan JPEG markers for a start-of-frame segment.
    #[default]
    JpegSof,
    /// Let the `image` crate read just enough of the header for any format it knows.
    Decode,
}

impl DimensionProbe {
    pub fn probe(self, data: &[u8]) -> Option<Dimensions> {
        match self {
            Self::None => None,
            Self::JpegSof => jpeg_sof_dimensions(data),
            Self::Decode => decoded_dimensions(data),
        }
    }
}

fn decoded_dimensions(data: &[u8]) -> Option<Dimensions> {
    let (width, height) = image::io::Reader::new(Cursor::new(data))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()?;
    Some(Dimensions::new(width, height))
}

/// Walks the marker segments of a JPEG until it finds a SOFn frame header.
pub fn jpeg_sof_dimensions(data: &[u8]) -> Option<Dimensions> {
    if data.len() < 4 || data[0] != 0xFF || data[1] != 0xD8 {
        return None;
    }

    let mut pos = 2;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            return None;
        }
        // fill bytes
        while pos < data.len() && data[pos] == 0xFF {
            pos += 1;
        }
        let marker = *data.get(pos)?;
        pos += 1;

        match marker {
            // standalone markers carry no length
            0x01 | 0xD0..=0xD8 => continue,
            // end of image or start of scan before any frame header
            0xD9 | 0xDA => return None,
            _ => {}
        }

        let length = u16::from_be_bytes([*data.get(pos)?, *data.get(pos + 1)?]) as usize;
        if length < 2 {
            return None;
        }

        let is_sof = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            // length(2) precision(1) height(2) width(2)
            let height = u16::from_be_bytes([*data.get(pos + 3)?, *data.get(pos + 4)?]);
            let width = u16::from_be_bytes([*data.get(pos + 5)?, *data.get(pos + 6)?]);
            if width == 0 || height == 0 {
                return None;
            }
            return Some(Dimensions::new(width as u32, height as u32));
        }

        pos += length;
    }

    None
}
