//! pagebound: find the boundary page of a paginated listing
//!
//! Core:
//! - page_url: `p=<n>` page number codec
//! - fetch / browser: fetch backends (HTTP, headless Chrome)
//! - marker: listing header detection
//! - locator: linear and bisectional boundary search
//!
//! Commands:
//! - lookup: run searches and report the resolved URLs
//! - page: inspect or rewrite a URL's page number
//! - init: write a settings template

pub mod browser;
pub mod fetch;
pub mod init;
pub mod locator;
pub mod lookup;
pub mod marker;
pub mod page;
pub mod page_url;
pub mod progress;
pub mod session;
pub mod settings;

pub use fetch::{FetchError, FetchResult, HttpFetcher, PageFetcher};
pub use locator::{LocateError, Located, Locator, SearchBounds, Strategy};
pub use marker::{HeaderMarker, MarkerPredicate};
pub use page_url::{decode_page_number, encode_page_number, increment_page};
