//! Fetch planetary catalogs from remote services.
//!
//! - [stac]: paginated STAC item searches, walked link by link
//! - [ogc::WfsClient]: OGC Web Feature Service layers, fetched in chunks
//! - [ogc::WmsClient]: OGC Web Map Service layer capabilities
//!
//! Everything is blocking. Requests go through a [Transport], which is a
//! [reqwest::blocking::Client] unless you bring your own.
//!
//! # Examples
//!
//! ```no_run
//! let dataset = pdssp_io::load("https://pdssp.test/search?collections=hirise", Some(500)).unwrap();
//! println!("{} observations of {}", dataset.table().len(), dataset.body().name());
//! ```

#![warn(missing_docs, unused_qualifications)]

mod error;
pub mod ogc;
mod options;
mod retry;
pub mod stac;
mod transport;

pub use {
    error::Error,
    options::{
        DEFAULT_CHUNK_SIZE, DEFAULT_TIMEOUT, DEFAULT_WFS_VERSION, DEFAULT_WMS_VERSION,
        HttpOptions, WfsOptions, WmsOptions,
    },
    retry::{DEFAULT_FACTOR, DEFAULT_MAX_DELAY, DEFAULT_MAX_RETRIES, DEFAULT_MIN_DELAY, RetryPolicy},
    transport::Transport,
};

use pdssp::Dataset;

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Collects a STAC search and binds it to the body it observes.
///
/// See [stac::Collector::collect] and [Dataset::classify].
pub fn load(url: &str, max_records: Option<usize>) -> Result<Dataset> {
    let table = stac::load(url, max_records)?;
    let dataset = Dataset::classify(table)?;
    Ok(dataset)
}

/// Returns a string suitable for use as a HTTP user agent.
pub fn user_agent() -> &'static str {
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"))
}
