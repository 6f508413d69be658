use std::str::FromStr;

pub const DEFAULT_WIDTH: u32 = 400;
pub const DEFAULT_HEIGHT: u32 = 300;

/// Named generators of well-known demo image URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderSource {
    Picsum,
    Placeholder,
    DummyImage,
    PlaceKitten,
    PlaceDog,
    PlaceBear,
    Unsplash,
}

/// Source-specific extras taken from the query string.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceOptions<'a> {
    /// Fixed picsum photo instead of a random one.
    pub id: Option<u32>,
    /// Unsplash search category.
    pub category: Option<&'a str>,
}

impl PlaceholderSource {
    pub const ALL: [PlaceholderSource; 7] = [
        Self::Picsum,
        Self::Placeholder,
        Self::DummyImage,
        Self::PlaceKitten,
        Self::PlaceDog,
        Self::PlaceBear,
        Self::Unsplash,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Picsum => "picsum",
            Self::Placeholder => "placeholder",
            Self::DummyImage => "dummyimage",
            Self::PlaceKitten => "placekitten",
            Self::PlaceDog => "placedog",
            Self::PlaceBear => "placebear",
            Self::Unsplash => "unsplash",
        }
    }

    pub fn url(self, width: u32, height: u32, options: SourceOptions<'_>) -> String {
        match self {
            Self::Picsum => match options.id {
                Some(id) => format!("https://picsum.photos/id/{}/{}/{}", id, width, height),
                None => format!("https://picsum.photos/{}/{}", width, height),
            },
            Self::Placeholder => format!(
                "https://via.placeholder.com/{}x{}/0088ff/ffffff.png",
                width, height
            ),
            Self::DummyImage => format!(
                "https://dummyimage.com/{}x{}/007acc/ffffff.png",
                width, height
            ),
            Self::PlaceKitten => format!("https://placekitten.com/{}/{}", width, height),
            Self::PlaceDog => format!("https://place.dog/{}/{}", width, height),
            Self::PlaceBear => format!("https://placebear.com/{}/{}", width, height),
            Self::Unsplash => match options.category.map(str::trim).filter(|c| !c.is_empty()) {
                Some(category) => format!(
                    "https://source.unsplash.com/featured/{}x{}/?{}",
                    width,
                    height,
                    urlencoding::encode(category)
                ),
                None => format!("https://source.unsplash.com/random/{}x{}", width, height),
            },
        }
    }

    pub fn usage(self) -> String {
        format!("/{}/{{width}}/{{height}}", self.name())
    }
}

impl FromStr for PlaceholderSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|source| source.name() == s)
            .ok_or_else(|| format!("Unknown source: {}", s))
    }
}

/// Parses a width/height path segment, falling back to `default` for
/// anything that is not a positive integer.
pub fn dimension_or(segment: &str, default: u32, max: u32) -> u32 {
    match segment.trim().parse::<u32>() {
        Ok(0) | Err(_) => default,
        Ok(v) => v.min(max),
    }
}
