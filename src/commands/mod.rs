pub mod crawl;
pub mod jobs;
pub mod url;

// Re-export command functions for convenience
pub use crawl::{crawl, CrawlParams};
pub use jobs::jobs;
pub use url::url;
