use super::{
    BoundingBox, Contents, LayerDescriptor, ServiceIdentification, get_capabilities, xml,
};
use crate::{Error, Result, Transport, WmsOptions, transport::parse_url};
use pdssp::{CatalogTable, Feature, crs::MARS_2000};
use roxmltree::Node;
use serde_json::Value;
use url::Url;

/// A client for an OGC Web Map Service.
///
/// Everything is answered from the capabilities read when the client is
/// created.
///
/// # Examples
///
/// ```no_run
/// use pdssp_io::ogc::WmsClient;
///
/// let client = WmsClient::new("https://wms.pdssp.test/mapserv").unwrap();
/// let table = client.data("viking").unwrap();
/// assert_eq!(table.len(), 1);
/// ```
#[derive(Debug)]
pub struct WmsClient<T = reqwest::blocking::Client> {
    transport: T,
    url: Url,
    options: WmsOptions,
    identification: ServiceIdentification,
    contents: Contents,
}

/// What a `<Layer>` passes down to the layers it holds.
#[derive(Debug, Clone, Default)]
struct Inherited {
    crs_options: Vec<String>,
    bounding_box: Option<BoundingBox>,
    bounding_box_wgs84: Option<BoundingBox>,
}

impl WmsClient {
    /// Connects to a service with the default options.
    pub fn new(url: &str) -> Result<WmsClient> {
        WmsClient::with_options(url, WmsOptions::default())
    }

    /// Connects to a service.
    pub fn with_options(url: &str, options: WmsOptions) -> Result<WmsClient> {
        let client = options.http.client()?;
        WmsClient::with_transport(client, url, options)
    }
}

impl<T: Transport> WmsClient<T> {
    /// Connects to a service through a transport.
    pub fn with_transport(transport: T, url: &str, options: WmsOptions) -> Result<WmsClient<T>> {
        let url = parse_url(url)?;
        let text = get_capabilities(&transport, &url, "WMS", &options.version)?;
        let (identification, layers) = parse_capabilities(&text)?;
        let contents = Contents::new(layers, options.ignore_layers.clone());
        Ok(WmsClient {
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

    /// Returns the requested WMS version.
    pub fn version(&self) -> &str {
        &self.options.version
    }

    /// Returns the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the service identification.
    pub fn identification(&self) -> &ServiceIdentification {
        &self.identification
    }

    /// Returns the names of the named layers, in capabilities order, minus
    /// the ignored ones.
    pub fn layers(&self) -> Vec<String> {
        self.contents.names()
    }

    /// Returns true if there is at least one layer.
    pub fn has_layers(&self) -> bool {
        !self.layers().is_empty()
    }

    /// Returns a layer's capabilities.
    pub fn layer(&self, name: &str) -> Result<&LayerDescriptor> {
        self.contents.get(name)
    }

    /// Returns the coordinate reference systems a layer can be drawn in.
    pub fn crs(&self, name: &str) -> Result<&[String]> {
        Ok(&self.contents.get(name)?.crs_options)
    }

    /// Returns a layer's capabilities as a one-row table.
    ///
    /// The row's geometry is the layer's bounding box, native if there is
    /// one, else in longitude and latitude.
    pub fn data(&self, name: &str) -> Result<CatalogTable> {
        let layer = self.contents.get(name)?;
        let bbox = layer
            .bounding_box
            .as_ref()
            .or(layer.bounding_box_wgs84.as_ref())
            .ok_or(Error::MissingField("BoundingBox"))?;
        let Value::Object(attributes) = serde_json::to_value(layer)? else {
            return Err(Error::MissingField("name"));
        };
        let feature = Feature {
            geometry: Some(bbox.to_geometry()),
            attributes,
        };
        Ok(CatalogTable::from_features(vec![feature]).with_crs(MARS_2000))
    }
}

fn parse_capabilities(text: &str) -> Result<(ServiceIdentification, Vec<LayerDescriptor>)> {
    let document = xml::parse(text)?;
    let root = document.root_element();
    let mut identification = ServiceIdentification {
        service_version: root.attribute("version").map(String::from),
        ..Default::default()
    };
    identification.versions = identification.service_version.iter().cloned().collect();
    if let Some(service) = xml::child(root, "Service") {
        identification.service_type = xml::text(service, "Name");
        identification.title = xml::text(service, "Title");
        identification.abstract_ = xml::text(service, "Abstract");
        identification.keywords = xml::keywords(service);
        identification.fees = xml::text(service, "Fees");
        identification.access_constraints = xml::text(service, "AccessConstraints");
        identification.provider_name = xml::descendant(service, "ContactOrganization")
            .and_then(xml::own_text);
    }
    let mut layers = Vec::new();
    if let Some(capability) = xml::child(root, "Capability") {
        for layer in xml::children(capability, "Layer") {
            walk(layer, &Inherited::default(), &mut layers);
        }
    }
    Ok((identification, layers))
}

fn walk(node: Node<'_, '_>, parent: &Inherited, layers: &mut Vec<LayerDescriptor>) {
    let mut inherited = parent.clone();
    for crs in xml::texts(node, "SRS")
        .into_iter()
        .chain(xml::texts(node, "CRS"))
    {
        for crs in crs.split_whitespace() {
            if !inherited.crs_options.iter().any(|known| known == crs) {
                inherited.crs_options.push(crs.to_string());
            }
        }
    }
    if let Some(bbox) = xml::child(node, "BoundingBox").and_then(bounding_box) {
        inherited.bounding_box = Some(bbox);
    }
    if let Some(bbox) = wgs84_bounding_box(node) {
        inherited.bounding_box_wgs84 = Some(bbox);
    }
    if let Some(name) = xml::text(node, "Name") {
        layers.push(LayerDescriptor {
            name,
            title: xml::text(node, "Title"),
            abstract_: xml::text(node, "Abstract"),
            keywords: xml::keywords(node),
            crs_options: inherited.crs_options.clone(),
            bounding_box: inherited.bounding_box.clone(),
            bounding_box_wgs84: inherited.bounding_box_wgs84.clone(),
        });
    }
    for child in xml::children(node, "Layer") {
        walk(child, &inherited, layers);
    }
}

fn bounding_box(node: Node<'_, '_>) -> Option<BoundingBox> {
    Some(BoundingBox {
        minx: xml::attribute_f64(node, "minx")?,
        miny: xml::attribute_f64(node, "miny")?,
        maxx: xml::attribute_f64(node, "maxx")?,
        maxy: xml::attribute_f64(node, "maxy")?,
        crs: node
            .attribute("SRS")
            .or_else(|| node.attribute("CRS"))
            .map(String::from),
    })
}

fn wgs84_bounding_box(node: Node<'_, '_>) -> Option<BoundingBox> {
    if let Some(bbox) = xml::child(node, "LatLonBoundingBox") {
        let mut bbox = bounding_box(bbox)?;
        bbox.crs = Some("EPSG:4326".to_string());
        return Some(bbox);
    }
    // WMS 1.3.0
    let bbox = xml::child(node, "EX_GeographicBoundingBox")?;
    let side = |name: &str| -> Option<f64> { xml::text(bbox, name)?.parse().ok() };
    Some(BoundingBox {
        minx: side("westBoundLongitude")?,
        miny: side("southBoundLatitude")?,
        maxx: side("eastBoundLongitude")?,
        maxy: side("northBoundLatitude")?,
        crs: Some("CRS:84".to_string()),
    })
}
