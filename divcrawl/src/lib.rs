// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{crawl_options_from_args, resolve_output_path};

// Re-export crawl functionality from divcrawl-core
pub use divcrawl_core::crawl::{CrawlOptions, execute_crawl, execute_retry, generate_crawl_report};
