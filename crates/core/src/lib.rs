//! Work with catalogs of planetary surface observations.
//!
//! Catalogs come from remote services, one page or chunk at a time (see the
//! `pdssp-io` crate for the fetching). This crate holds what they are
//! assembled into:
//!
//! - [Feature]: one observation, a geometry plus attributes
//! - [CatalogTable]: the merged, indexed table of features
//! - [Dataset]: a table bound to the planetary [Body] it observes, with
//!   querying and visualization helpers
//!
//! # Examples
//!
//! ```
//! use pdssp::{CatalogTable, Dataset, Feature};
//! use serde_json::json;
//!
//! let mut feature = Feature::new()
//!     .attribute("datetime", "2009-01-10T00:00:00Z")
//!     .attribute("hashtags", json!(["mission:MRO", "instrument:HiRISE"]));
//! pdssp::normalize::flatten(&mut feature);
//!
//! let dataset = Dataset::classify(CatalogTable::from_features(vec![feature])).unwrap();
//! let result = dataset.filter("instrument = 'HiRISE'").unwrap();
//! assert_eq!(result.len(), 1);
//! ```
//!
//! # Visualization
//!
//! Rendering is left to a backend implementing [surface::Surface].
//! [surface::Scene] is an in-memory one:
//!
//! ```
//! use pdssp::{CatalogTable, Dataset, surface::{Color, Scene}};
//!
//! let dataset = Dataset::classify(CatalogTable::new()).unwrap();
//! let mut scene = dataset.derive_visualization_surface(Scene::new()).unwrap();
//! dataset.show_dataset(&mut scene, Color::GREEN);
//! assert_eq!(scene.layers().len(), 2);
//! ```

#![warn(missing_docs, unused_qualifications)]

pub mod body;
pub mod crs;
mod dataset;
mod error;
pub mod feature;
mod filter;
pub mod normalize;
pub mod surface;
mod table;

pub use {
    body::Body,
    dataset::{ColumnSummary, DATA_LAYER, Dataset, Selection},
    error::{Error, ErrorKind},
    feature::Feature,
    filter::Filter,
    table::{CatalogTable, DATETIME},
};

/// Custom [Result](std::result::Result) type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Return this crate's version.
///
/// # Examples
///
/// ```
/// println!("{}", pdssp::version());
/// ```
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
