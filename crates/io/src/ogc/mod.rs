//! OGC web services: WFS for features, WMS for maps.
//!
//! Both clients read the service's capabilities when they are created, then
//! answer layer questions from them. Only [WfsClient::data] and
//! [WfsClient::feature_count] (and [WfsClient::schema]) go back to the
//! network.

mod wfs;
mod wms;
mod xml;

pub use {wfs::LayerSchema, wfs::WfsClient, wms::WmsClient};

use crate::{Error, Result, Transport};
use geojson::{Geometry, Value as Coordinates};
use indexmap::IndexMap;
use serde::Serialize;
use url::Url;

/// The sides of a rectangle, in some coordinate reference system.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundingBox {
    /// Western edge.
    pub minx: f64,

    /// Southern edge.
    pub miny: f64,

    /// Eastern edge.
    pub maxx: f64,

    /// Northern edge.
    pub maxy: f64,

    /// The coordinate reference system, if stated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crs: Option<String>,
}

/// A layer, as its service describes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LayerDescriptor {
    /// The layer name, used in requests.
    pub name: String,

    /// A human-readable title.
    pub title: Option<String>,

    /// A description.
    #[serde(rename = "abstract")]
    pub abstract_: Option<String>,

    /// Keywords.
    pub keywords: Vec<String>,

    /// The coordinate reference systems the layer can be served in.
    pub crs_options: Vec<String>,

    /// The extent, in the layer's native coordinate reference system.
    pub bounding_box: Option<BoundingBox>,

    /// The extent, in longitude and latitude.
    pub bounding_box_wgs84: Option<BoundingBox>,
}

/// Identification of the service and its provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServiceIdentification {
    /// The service type, e.g. `WFS` or `OGC:WMS`.
    pub service_type: Option<String>,

    /// The version of the capabilities document.
    pub service_version: Option<String>,

    /// A human-readable title.
    pub title: Option<String>,

    /// A description.
    #[serde(rename = "abstract")]
    pub abstract_: Option<String>,

    /// Keywords.
    pub keywords: Vec<String>,

    /// Fees.
    pub fees: Option<String>,

    /// Access constraints.
    pub access_constraints: Option<String>,

    /// Every version the service supports.
    pub versions: Vec<String>,

    /// The organization that runs the service.
    pub provider_name: Option<String>,
}

/// The layers a service advertises, minus the ones we ignore.
#[derive(Debug, Clone, Default, PartialEq)]
struct Contents {
    layers: IndexMap<String, LayerDescriptor>,
    ignore: Vec<String>,
}

impl BoundingBox {
    /// Returns the rectangle as a closed polygon.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdssp_io::ogc::BoundingBox;
    ///
    /// let bbox = BoundingBox { minx: 0.0, miny: 0.0, maxx: 1.0, maxy: 2.0, crs: None };
    /// let geometry = bbox.to_geometry();
    /// ```
    pub fn to_geometry(&self) -> Geometry {
        let ring = vec![
            vec![self.maxx, self.miny],
            vec![self.maxx, self.maxy],
            vec![self.minx, self.maxy],
            vec![self.minx, self.miny],
            vec![self.maxx, self.miny],
        ];
        Geometry::new(Coordinates::Polygon(vec![ring]))
    }
}

impl Contents {
    fn new(layers: impl IntoIterator<Item = LayerDescriptor>, ignore: Vec<String>) -> Contents {
        let mut map = IndexMap::new();
        for layer in layers {
            if !map.contains_key(&layer.name) {
                let _ = map.insert(layer.name.clone(), layer);
            }
        }
        Contents { layers: map, ignore }
    }

    fn names(&self) -> Vec<String> {
        self.layers
            .keys()
            .filter(|name| !self.ignore.contains(name))
            .cloned()
            .collect()
    }

    fn get(&self, name: &str) -> Result<&LayerDescriptor> {
        if self.ignore.iter().any(|ignored| ignored == name) {
            return Err(Error::LayerNotFound(name.to_string()));
        }
        self.layers
            .get(name)
            .ok_or_else(|| Error::LayerNotFound(name.to_string()))
    }
}

/// Appends request parameters to a service endpoint, keeping the endpoint's
/// own (e.g. a mapserver `map`).
fn request_url(base: &Url, params: &[(&str, &str)]) -> Url {
    let mut url = base.clone();
    let _ = url.query_pairs_mut().extend_pairs(params);
    url
}

fn get_capabilities<T: Transport>(
    transport: &T,
    url: &Url,
    service: &str,
    version: &str,
) -> Result<String> {
    let url = request_url(
        url,
        &[
            ("service", service),
            ("request", "GetCapabilities"),
            ("version", version),
        ],
    );
    tracing::debug!("getting capabilities from {url}");
    transport.get(&url)
}

#[cfg(test)]
mod tests {
    use super::{BoundingBox, Contents, LayerDescriptor, request_url};
    use crate::Error;
    use url::Url;

    fn layer(name: &str) -> LayerDescriptor {
        LayerDescriptor {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn contents_ignore_layers() {
        let contents = Contents::new(
            vec![layer("b"), layer("a"), layer("c")],
            vec!["a".to_string()],
        );
        assert_eq!(contents.names(), vec!["b", "c"]);
        assert!(matches!(contents.get("a").unwrap_err(), Error::LayerNotFound(_)));
        assert!(matches!(contents.get("z").unwrap_err(), Error::LayerNotFound(_)));
        assert_eq!(contents.get("c").unwrap().name, "c");
    }

    #[test]
    fn request_url_keeps_vendor_parameters() {
        let base = Url::parse("http://maps.test/mapserv?map=/data/mars.map").unwrap();
        let url = request_url(&base, &[("service", "WMS")]);
        assert_eq!(url.as_str(), "http://maps.test/mapserv?map=/data/mars.map&service=WMS");
    }

    #[test]
    fn bbox_polygon_is_closed() {
        let bbox = BoundingBox {
            minx: -10.0,
            miny: -5.0,
            maxx: 10.0,
            maxy: 5.0,
            crs: None,
        };
        let geojson::Value::Polygon(rings) = bbox.to_geometry().value else {
            panic!("expected a polygon");
        };
        assert_eq!(rings[0].len(), 5);
        assert_eq!(rings[0].first(), rings[0].last());
    }
}
