//! HTML fetcher implementations.
//!
//! - [`HttpHtmlFetcher`]: plain reqwest GET with browser-like headers
//! - [`MockHtmlFetcher`]: canned pages for tests

pub mod http;
pub mod mock;

pub use http::HttpHtmlFetcher;
pub use mock::MockHtmlFetcher;
