//! Planetary bodies and the layers drawn beneath their observations.

use crate::{CatalogTable, Error, Result, surface::RasterLayer};
use serde_json::Value;
use url::Url;

/// The column that lists the bodies an observation targets.
pub const TARGETS: &str = "ssys:targets";

/// The column that holds the heatmap link of a catalog page.
pub const HEATMAP: &str = "heatmap";

const LAYERS: &str = "layers";

// Query parameters that belong to a single WMS request, not to the endpoint.
const WMS_REQUEST_PARAMETERS: [&str; 16] = [
    "bbox",
    "bgcolor",
    "crs",
    "elevation",
    "exceptions",
    "format",
    "height",
    "layers",
    "request",
    "service",
    "srs",
    "styles",
    "time",
    "transparent",
    "version",
    "width",
];

/// A planetary body, with the raster layer shown beneath its observations.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    name: String,
    background: RasterLayer,
}

impl Body {
    /// Creates a body with a background layer.
    pub fn new(name: impl ToString, background: RasterLayer) -> Body {
        Body {
            name: name.to_string(),
            background,
        }
    }

    /// Mars, over the Viking mosaic.
    pub fn mars() -> Body {
        Body::new(
            "MARS",
            RasterLayer::wms(
                "wms_mars",
                "https://idoc-wmsmars.ias.u-psud.fr/cgi-bin/mapserv?map=/home/cnes/mars/mars.map",
                "viking",
            ),
        )
    }

    /// The Earth, over Blue Marble.
    pub fn earth() -> Body {
        Body::new(
            "EARTH",
            RasterLayer::wms(
                "wms_earth",
                "https://regards-pp.cnes.fr/api/v1/hysope/?map=/etc/mapserver/bluemarble.map",
                "BlueMarble",
            ),
        )
    }

    /// Returns a supported body by name, ignoring case.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdssp::Body;
    ///
    /// assert_eq!(Body::from_name("Mars").unwrap(), Body::mars());
    /// Body::from_name("Venus").unwrap_err();
    /// ```
    pub fn from_name(name: &str) -> Result<Body> {
        match name.to_uppercase().as_str() {
            "MARS" => Ok(Body::mars()),
            "EARTH" => Ok(Body::earth()),
            _ => Err(Error::UnsupportedBody(name.to_string())),
        }
    }

    /// Returns the body a catalog observes.
    ///
    /// The body is read from the first row's `ssys:targets`: the first name
    /// if it is a list, the whole value if it is a string. A catalog without
    /// targets observes Mars.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdssp::{Body, CatalogTable, Feature};
    /// use serde_json::json;
    ///
    /// let table = CatalogTable::from_features(vec![
    ///     Feature::new().attribute("ssys:targets", json!(["Earth"])),
    /// ]);
    /// assert_eq!(Body::classify(&table).unwrap(), Body::earth());
    /// assert_eq!(Body::classify(&CatalogTable::new()).unwrap(), Body::mars());
    /// ```
    pub fn classify(table: &CatalogTable) -> Result<Body> {
        let name = match table.first_value(TARGETS) {
            Some(Value::Array(targets)) => targets.first().and_then(Value::as_str),
            Some(Value::String(target)) => Some(target.as_str()),
            _ => None,
        };
        match name {
            Some(name) => Body::from_name(name),
            None => {
                tracing::debug!("no {TARGETS} in the first row, defaulting to Mars");
                Ok(Body::mars())
            }
        }
    }

    /// Returns this body's name, in upper case for the built-in bodies.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the layer shown beneath this body's observations.
    pub fn background(&self) -> &RasterLayer {
        &self.background
    }

    /// Builds the transparent overlay for a heatmap link.
    ///
    /// The layer is served by the link's endpoint (without the parameters of
    /// the original request) and named after its `layers` parameter.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdssp::Body;
    ///
    /// let layer = Body::mars()
    ///     .heatmap_layer("http://heatmap.test/wms?service=WMS&layers=hirise_heat&bbox=0,0,1,1")
    ///     .unwrap();
    /// assert_eq!(layer.name, "hirise_heat");
    /// assert_eq!(layer.url, "http://heatmap.test/wms");
    /// assert!(!layer.background);
    /// ```
    pub fn heatmap_layer(&self, href: &str) -> Result<RasterLayer> {
        let mut url = Url::parse(href)?;
        let mut layers = None;
        let mut kept = Vec::new();
        for (key, value) in url.query_pairs() {
            let lowercase = key.to_lowercase();
            if lowercase == LAYERS {
                if layers.is_none() {
                    layers = Some(value.into_owned());
                }
            } else if !WMS_REQUEST_PARAMETERS.contains(&lowercase.as_str()) {
                kept.push((key.into_owned(), value.into_owned()));
            }
        }
        let layers = layers.ok_or(Error::MissingField(LAYERS))?;
        url.set_query(None);
        url.set_fragment(None);
        if !kept.is_empty() {
            let _ = url.query_pairs_mut().extend_pairs(kept);
        }
        Ok(RasterLayer::wms(&layers, url, &layers).overlay())
    }
}

impl Default for Body {
    fn default() -> Self {
        Body::mars()
    }
}
