pub mod fetcher;
pub mod headers;
pub mod probe;
pub mod proxy;
pub mod sources;
pub mod svg;
pub mod tools;

pub use fetcher::{FetchedImage, Fetcher, HttpFetcher};
pub use headers::HeaderRules;
pub use probe::{DimensionProbe, Dimensions};
pub use proxy::{ImageProxy, ProcessedImage};
pub use sources::{PlaceholderSource, SourceOptions};
pub use tools::{ImageConversionFormat, ImageConversionParams, ImageFit, ImageProxyError, RawConversionParams};
