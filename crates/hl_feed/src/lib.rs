pub mod image;
pub mod manager;
pub mod parser;
pub mod rss;
pub mod source;

pub use image::{HttpImageFetcher, ImageFetcher, DEFAULT_IMAGE_MAX_BYTES};
pub use manager::{CycleReport, IngestManager};
pub use parser::{FeedParser, Field, ParseError, ParseErrorKind};
pub use source::{FeedSource, HttpFeedSource};

pub mod prelude {
    pub use super::image::ImageFetcher;
    pub use super::source::FeedSource;
    pub use super::manager::{CycleReport, IngestManager};
    pub use hl_core::{CanonicalRecord, RawEntry, Result, Error};
}
