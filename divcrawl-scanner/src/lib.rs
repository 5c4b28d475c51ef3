pub mod crawler;
pub mod error;
pub mod fetch;
pub mod parser;
pub mod result;

pub use crawler::Crawler;
pub use error::{FailureKind, ScanError};
pub use fetch::{HttpFetcher, PageSource};
pub use parser::PageParser;
pub use result::{CrawlOutcome, DivisionNode, DivisionType, RetryEntry};
