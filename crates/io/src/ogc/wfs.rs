use super::{
    BoundingBox, Contents, LayerDescriptor, ServiceIdentification, get_capabilities, request_url,
    xml,
};
use crate::{Error, Result, Transport, WfsOptions, transport::parse_url};
use geojson::{FeatureCollection, GeoJson};
use indexmap::IndexMap;
use pdssp::{CatalogTable, Feature, crs::MARS_2000};
use regex::Regex;
use roxmltree::Node;
use serde::Serialize;
use std::sync::LazyLock;
use url::Url;

static NUMBER_MATCHED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"numberMatched="([0-9]+)""#).expect("regex pattern is valid")
});

/// The attributes of a WFS feature type, from `DescribeFeatureType`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LayerSchema {
    /// Attribute name to XML schema type, e.g. `string` or `double`.
    pub properties: IndexMap<String, String>,

    /// The name of the geometry attribute.
    pub geometry_column: Option<String>,

    /// The GeoJSON type of the geometries, e.g. `Polygon`.
    pub geometry: Option<String>,
}

/// A client for an OGC Web Feature Service.
///
/// Creating a client reads the service's capabilities.
///
/// # Examples
///
/// ```no_run
/// use pdssp_io::ogc::WfsClient;
///
/// let client = WfsClient::new("https://wfs.pdssp.test/mapserv").unwrap();
/// for layer in client.layers() {
///     println!("{layer}: {} features", client.feature_count(&layer).unwrap());
/// }
/// ```
#[derive(Debug)]
pub struct WfsClient<T = reqwest::blocking::Client> {
    transport: T,
    url: Url,
    options: WfsOptions,
    identification: ServiceIdentification,
    contents: Contents,
}

impl WfsClient {
    /// Connects to a service with the default options.
    pub fn new(url: &str) -> Result<WfsClient> {
        WfsClient::with_options(url, WfsOptions::default())
    }

    /// Connects to a service.
    pub fn with_options(url: &str, options: WfsOptions) -> Result<WfsClient> {
        let client = options.http.client()?;
        WfsClient::with_transport(client, url, options)
    }
}

impl<T: Transport> WfsClient<T> {
    /// Connects to a service through a transport.
    pub fn with_transport(transport: T, url: &str, options: WfsOptions) -> Result<WfsClient<T>> {
        let url = parse_url(url)?;
        let text = get_capabilities(&transport, &url, "WFS", &options.version)?;
        let (identification, layers) = parse_capabilities(&text)?;
        let contents = Contents::new(layers, options.ignore_layers.clone());
        Ok(WfsClient {
            transport,
            url,
            options,
            identification,
            contents,
        })
    }

    /// Returns the service endpoint.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the requested WFS version.
    pub fn version(&self) -> &str {
        &self.options.version
    }

    /// Returns this client's options.
    pub fn options(&self) -> &WfsOptions {
        &self.options
    }

    /// Returns the service identification.
    pub fn identification(&self) -> &ServiceIdentification {
        &self.identification
    }

    /// Returns the names of the advertised layers, in capabilities order,
    /// minus the ignored ones.
    pub fn layers(&self) -> Vec<String> {
        self.contents.names()
    }

    /// Returns true if there is at least one layer.
    pub fn has_layers(&self) -> bool {
        !self.layers().is_empty()
    }

    /// Returns a layer's description.
    pub fn layer(&self, name: &str) -> Result<&LayerDescriptor> {
        self.contents.get(name)
    }

    /// Returns the coordinate reference systems a layer can be served in.
    pub fn crs(&self, name: &str) -> Result<&[String]> {
        Ok(&self.contents.get(name)?.crs_options)
    }

    /// Describes a layer's attributes.
    pub fn schema(&self, name: &str) -> Result<LayerSchema> {
        let _ = self.contents.get(name)?;
        let url = request_url(
            &self.url,
            &[
                ("service", "WFS"),
                ("version", &self.options.version),
                ("request", "DescribeFeatureType"),
                ("typeNames", name),
            ],
        );
        let text = self.transport.get(&url)?;
        parse_schema(&text, name)
    }

    /// Returns the number of features in a layer, as the service counts them.
    ///
    /// A response without a count is zero features.
    pub fn feature_count(&self, name: &str) -> Result<usize> {
        let _ = self.contents.get(name)?;
        let url = request_url(
            &self.url,
            &[
                ("service", "wfs"),
                ("version", &self.options.version),
                ("request", "GetFeature"),
                ("typeNames", name),
                ("resultType", "hits"),
            ],
        );
        let text = self.transport.get(&url)?;
        Ok(number_matched(&text))
    }

    /// Fetches every feature of a layer.
    ///
    /// Features are requested in chunks of
    /// [chunk_size](WfsOptions::chunk_size), each retried according to
    /// [retry](WfsOptions::retry), and appended in order.
    pub fn data(&self, name: &str) -> Result<CatalogTable> {
        let _ = self.contents.get(name)?;
        let count = self.feature_count(name)?;
        let chunk_size = self.options.chunk_size.max(1);
        let mut table = CatalogTable::new().with_crs(MARS_2000);
        let mut chunks = 0;
        for start in (0..count).step_by(chunk_size) {
            tracing::info!("retrieving from {start} to {} on {count}", start + chunk_size);
            let url = request_url(
                &self.url,
                &[
                    ("service", "WFS"),
                    ("version", &self.options.version),
                    ("request", "GetFeature"),
                    ("typeNames", name),
                    ("outputFormat", "application/json"),
                    ("startindex", &start.to_string()),
                    ("maxfeatures", &chunk_size.to_string()),
                ],
            );
            let text = self.options.retry.retry(|| self.transport.get(&url))?;
            let feature_collection = FeatureCollection::try_from(text.parse::<GeoJson>()?)?;
            table.extend(feature_collection.features.into_iter().map(Feature::from));
            chunks += 1;
        }
        if chunks == 0 {
            tracing::warn!("cannot retrieve data from {name}");
        }
        tracing::debug!("{} records have been retrieved in {name}", table.len());
        Ok(table)
    }
}

fn number_matched(text: &str) -> usize {
    NUMBER_MATCHED
        .captures(text)
        .and_then(|captures| captures.get(1))
        .and_then(|count| count.as_str().parse().ok())
        .unwrap_or(0)
}

fn parse_capabilities(text: &str) -> Result<(ServiceIdentification, Vec<LayerDescriptor>)> {
    let document = xml::parse(text)?;
    let root = document.root_element();
    let mut identification = ServiceIdentification {
        service_version: root.attribute("version").map(String::from),
        ..Default::default()
    };
    if let Some(service) = xml::child(root, "ServiceIdentification") {
        identification.service_type = xml::text(service, "ServiceType");
        identification.versions = xml::texts(service, "ServiceTypeVersion");
        read_service(service, &mut identification);
    } else if let Some(service) = xml::child(root, "Service") {
        identification.service_type = xml::text(service, "Name");
        read_service(service, &mut identification);
    }
    if identification.versions.is_empty() {
        identification.versions = identification.service_version.iter().cloned().collect();
    }
    identification.provider_name =
        xml::child(root, "ServiceProvider").and_then(|provider| xml::text(provider, "ProviderName"));

    let layers = xml::child(root, "FeatureTypeList")
        .map(|list| {
            xml::children(list, "FeatureType")
                .filter_map(feature_type)
                .collect()
        })
        .unwrap_or_default();
    Ok((identification, layers))
}

fn read_service(service: Node<'_, '_>, identification: &mut ServiceIdentification) {
    identification.title = xml::text(service, "Title");
    identification.abstract_ = xml::text(service, "Abstract");
    identification.keywords = xml::keywords(service);
    identification.fees = xml::text(service, "Fees");
    identification.access_constraints = xml::text(service, "AccessConstraints");
}

fn feature_type(node: Node<'_, '_>) -> Option<LayerDescriptor> {
    let name = xml::text(node, "Name")?;
    let crs_options = node
        .children()
        .filter(|child| {
            child.is_element()
                && matches!(
                    child.tag_name().name(),
                    "DefaultCRS" | "OtherCRS" | "DefaultSRS" | "OtherSRS" | "SRS"
                )
        })
        .filter_map(xml::own_text)
        .collect();
    Some(LayerDescriptor {
        name,
        title: xml::text(node, "Title"),
        abstract_: xml::text(node, "Abstract"),
        keywords: xml::keywords(node),
        crs_options,
        bounding_box: None,
        bounding_box_wgs84: wgs84_bounding_box(node),
    })
}

fn wgs84_bounding_box(node: Node<'_, '_>) -> Option<BoundingBox> {
    if let Some(bbox) = xml::child(node, "WGS84BoundingBox") {
        let lower = corner(bbox, "LowerCorner")?;
        let upper = corner(bbox, "UpperCorner")?;
        return Some(BoundingBox {
            minx: lower[0],
            miny: lower[1],
            maxx: upper[0],
            maxy: upper[1],
            crs: Some("urn:ogc:def:crs:OGC:1.3:CRS84".to_string()),
        });
    }
    // WFS 1.0.0
    let bbox = xml::child(node, "LatLongBoundingBox")?;
    Some(BoundingBox {
        minx: xml::attribute_f64(bbox, "minx")?,
        miny: xml::attribute_f64(bbox, "miny")?,
        maxx: xml::attribute_f64(bbox, "maxx")?,
        maxy: xml::attribute_f64(bbox, "maxy")?,
        crs: Some("EPSG:4326".to_string()),
    })
}

fn corner(node: Node<'_, '_>, name: &str) -> Option<[f64; 2]> {
    let text = xml::text(node, name)?;
    let mut values = text.split_whitespace().map(|value| value.parse::<f64>().ok());
    Some([values.next()??, values.next()??])
}

fn parse_schema(text: &str, name: &str) -> Result<LayerSchema> {
    let document = xml::parse(text)?;
    let root = document.root_element();
    let type_name = xml::children(root, "element")
        .find(|element| element.attribute("name") == Some(local(name)))
        .and_then(|element| element.attribute("type"))
        .map(local);
    let complex_type = xml::children(root, "complexType")
        .find(|complex_type| match type_name {
            Some(type_name) => complex_type.attribute("name") == Some(type_name),
            None => true,
        })
        .ok_or(Error::MissingField("complexType"))?;

    let mut schema = LayerSchema::default();
    for element in complex_type
        .descendants()
        .filter(|node| node.is_element() && node.tag_name().name() == "element")
    {
        let Some(property) = element.attribute("name") else {
            continue;
        };
        let Some(xsd_type) = element.attribute("type").or_else(|| {
            xml::descendant(element, "restriction").and_then(|restriction| restriction.attribute("base"))
        }) else {
            continue;
        };
        if let Some(geometry) = geometry_type(xsd_type) {
            schema.geometry_column = Some(property.to_string());
            schema.geometry = Some(geometry.to_string());
        } else {
            let _ = schema
                .properties
                .insert(property.to_string(), local(xsd_type).to_string());
        }
    }
    Ok(schema)
}

fn local(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}

fn geometry_type(xsd_type: &str) -> Option<&'static str> {
    let (prefix, name) = xsd_type.split_once(':')?;
    if prefix != "gml" {
        return None;
    }
    let geometry = match name.strip_suffix("PropertyType")? {
        "Point" => "Point",
        "MultiPoint" => "MultiPoint",
        "LineString" | "Curve" => "LineString",
        "MultiLineString" | "MultiCurve" => "MultiLineString",
        "Polygon" | "Surface" => "Polygon",
        "MultiPolygon" | "MultiSurface" => "MultiPolygon",
        "MultiGeometry" => "GeometryCollection",
        _ => "Geometry",
    };
    Some(geometry)
}

#[cfg(test)]
mod tests {
    use super::{LayerSchema, WfsClient, number_matched};
    use crate::{
        Error, Result, WfsOptions,
        retry::tests::{connection_error, fast},
        transport::fake::{FakeTransport, param},
    };
    use serde_json::json;
    use std::cell::Cell;
    use url::Url;

    const CAPABILITIES: &str = include_str!("../../data/wfs-capabilities.xml");
    const SCHEMA: &str = include_str!("../../data/describe-feature-type.xsd");

    fn features(start: usize, len: usize) -> String {
        let features: Vec<_> = (start..start + len)
            .map(|i| {
                json!({
                    "type": "Feature",
                    "id": format!("hirise.{i}"),
                    "geometry": {"type": "Point", "coordinates": [i as f64, 0.0]},
                    "properties": {"orbit": i}
                })
            })
            .collect();
        json!({"type": "FeatureCollection", "features": features}).to_string()
    }

    fn service(count: usize) -> impl Fn(&Url) -> Result<String> {
        move |url| match param(url, "request").as_deref() {
            Some("GetCapabilities") => Ok(CAPABILITIES.to_string()),
            Some("DescribeFeatureType") => Ok(SCHEMA.to_string()),
            Some("GetFeature") if param(url, "resultType").is_some() => Ok(format!(
                r#"<wfs:FeatureCollection numberMatched="{count}" numberReturned="0"/>"#
            )),
            Some("GetFeature") => {
                let start: usize = param(url, "startindex").unwrap().parse().unwrap();
                let max: usize = param(url, "maxfeatures").unwrap().parse().unwrap();
                Ok(features(start, max.min(count - start)))
            }
            _ => panic!("unexpected request: {url}"),
        }
    }

    fn client<T: crate::Transport>(transport: T, options: WfsOptions) -> WfsClient<T> {
        WfsClient::with_transport(transport, "http://wfs.test/mapserv?map=/data/mars.map", options)
            .unwrap()
    }

    #[test]
    fn capabilities() {
        let transport = FakeTransport::new(service(0));
        let client = client(&transport, WfsOptions::default());
        let url = &transport.calls()[0];
        assert_eq!(param(url, "service").unwrap(), "WFS");
        assert_eq!(param(url, "version").unwrap(), "2.0.0");
        assert_eq!(param(url, "map").unwrap(), "/data/mars.map");

        assert_eq!(client.layers(), vec!["ms:hirise", "ms:ctx", "ms:footprints"]);
        assert!(client.has_layers());
        let identification = client.identification();
        assert_eq!(identification.service_type.as_deref(), Some("WFS"));
        assert_eq!(identification.versions, vec!["2.0.0", "1.1.0", "1.0.0"]);
        assert_eq!(identification.provider_name.as_deref(), Some("IDOC"));
        assert_eq!(
            client.crs("ms:hirise").unwrap(),
            ["urn:ogc:def:crs:EPSG::4326", "urn:ogc:def:crs:EPSG::3857"]
        );
        let bbox = client
            .layer("ms:hirise")
            .unwrap()
            .bounding_box_wgs84
            .clone()
            .unwrap();
        assert_eq!((bbox.minx, bbox.maxy), (-180.0, 90.0));
    }

    #[test]
    fn ignore_layers() {
        let transport = FakeTransport::new(service(0));
        let client = client(
            &transport,
            WfsOptions::default().ignore_layers(["ms:footprints"]),
        );
        assert_eq!(client.layers(), vec!["ms:hirise", "ms:ctx"]);
        transport.reset();
        assert!(matches!(
            client.data("ms:footprints").unwrap_err(),
            Error::LayerNotFound(_)
        ));
        assert!(transport.calls().is_empty());
    }

    #[test]
    fn invalid_url_makes_no_request() {
        let transport = FakeTransport::new(service(0));
        let error = WfsClient::with_transport(&transport, "mapserv?map=/data/mars.map", WfsOptions::default())
            .err()
            .unwrap();
        assert!(matches!(error, Error::InvalidUrl { .. }));
        assert_eq!(error.kind(), pdssp::ErrorKind::InvalidInput);
        assert!(transport.calls().is_empty());
    }

    #[test]
    fn unknown_layer_makes_no_request() {
        let transport = FakeTransport::new(service(10));
        let client = client(&transport, WfsOptions::default());
        transport.reset();
        assert!(matches!(client.data("nope").unwrap_err(), Error::LayerNotFound(_)));
        assert!(matches!(client.feature_count("nope").unwrap_err(), Error::LayerNotFound(_)));
        assert!(matches!(client.schema("nope").unwrap_err(), Error::LayerNotFound(_)));
        assert!(matches!(client.crs("nope").unwrap_err(), Error::LayerNotFound(_)));
        assert!(transport.calls().is_empty());
    }

    #[test]
    fn count() {
        assert_eq!(number_matched(r#"<wfs:FeatureCollection numberMatched="42"/>"#), 42);
        assert_eq!(number_matched("<ExceptionReport/>"), 0);
        let transport = FakeTransport::new(service(42));
        let client = client(&transport, WfsOptions::default());
        assert_eq!(client.feature_count("ms:hirise").unwrap(), 42);
        let url = transport.calls().pop().unwrap();
        assert_eq!(param(&url, "service").unwrap(), "wfs");
        assert_eq!(param(&url, "typeNames").unwrap(), "ms:hirise");
        assert_eq!(param(&url, "resultType").unwrap(), "hits");
    }

    #[test]
    fn data_in_chunks() {
        let transport = FakeTransport::new(service(25));
        let client = client(&transport, WfsOptions::default().chunk_size(10));
        transport.reset();
        let table = client.data("ms:hirise").unwrap();
        assert_eq!(table.len(), 25);
        assert_eq!(table.crs(), Some(pdssp::crs::MARS_2000));
        let orbits: Vec<_> = table.iter().map(|f| f.attributes["orbit"].as_u64().unwrap()).collect();
        assert_eq!(orbits, (0..25).collect::<Vec<_>>());
        assert_eq!(table.first_value("id").unwrap(), "hirise.0");

        let starts: Vec<_> = transport
            .calls()
            .iter()
            .filter(|url| param(url, "outputFormat").is_some())
            .map(|url| param(url, "startindex").unwrap())
            .collect();
        assert_eq!(starts, vec!["0", "10", "20"]);
    }

    #[test]
    fn data_with_one_feature() {
        let transport = FakeTransport::new(service(1));
        let client = client(&transport, WfsOptions::default());
        assert_eq!(client.data("ms:ctx").unwrap().len(), 1);
    }

    #[test]
    fn data_of_an_empty_layer() {
        let transport = FakeTransport::new(service(0));
        let client = client(&transport, WfsOptions::default());
        let table = client.data("ms:ctx").unwrap();
        assert!(table.is_empty());
        assert_eq!(table.crs(), Some(pdssp::crs::MARS_2000));
    }

    #[test]
    fn data_retries_a_failed_chunk() {
        let failures = Cell::new(0);
        let inner = service(100);
        let transport = FakeTransport::new(|url: &Url| {
            if param(url, "outputFormat").is_some() && failures.get() == 0 {
                failures.set(1);
                return Err(connection_error());
            }
            inner(url)
        });
        let client = client(&transport, WfsOptions::default().retry(fast()));
        transport.reset();
        let table = client.data("ms:hirise").unwrap();
        assert_eq!(table.len(), 100);
        let chunk_requests = transport
            .calls()
            .iter()
            .filter(|url| param(url, "outputFormat").is_some())
            .count();
        assert_eq!(chunk_requests, 2);
    }

    #[test]
    fn data_gives_up() {
        let inner = service(100);
        let transport = FakeTransport::new(|url: &Url| {
            if param(url, "outputFormat").is_some() {
                Err(connection_error())
            } else {
                inner(url)
            }
        });
        let client = client(&transport, WfsOptions::default().retry(fast()));
        let error = client.data("ms:hirise").unwrap_err();
        assert!(matches!(error, Error::RetriesExhausted { attempts: 4, .. }));
        assert_eq!(error.kind(), pdssp::ErrorKind::Network);
    }

    #[test]
    fn schema() {
        let transport = FakeTransport::new(service(0));
        let client = client(&transport, WfsOptions::default());
        let schema: LayerSchema = client.schema("ms:hirise").unwrap();
        assert_eq!(schema.geometry_column.as_deref(), Some("msGeometry"));
        assert_eq!(schema.geometry.as_deref(), Some("MultiPolygon"));
        assert_eq!(schema.properties["product_id"], "string");
        assert_eq!(schema.properties["orbit"], "int");
        assert_eq!(schema.properties["incidence"], "double");
        assert_eq!(schema.properties["mission"], "string");
        assert!(!schema.properties.contains_key("msGeometry"));
    }
}
