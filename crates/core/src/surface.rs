//! The boundary to visualization backends.
//!
//! A backend (a 3D globe widget, a web map, ...) implements [Surface]. The
//! rest of this crate only talks to backends through that trait, handing them
//! [Layer]s.
//!
//! [Scene] is an in-memory backend that records what it was given. It can be
//! serialized and handed to a front end.

use geojson::{FeatureCollection, Value as Coordinates};
use serde::{Deserialize, Serialize};

/// The name of the layer used by [Surface::highlight].
pub const HIGHLIGHT: &str = "highlight";

/// An RGBA color, as the rendering widgets expect it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color(pub [f64; 4]);

impl Color {
    /// The default color for observation footprints.
    pub const GREEN: Color = Color([0.0, 190.0, 100.0, 1.0]);

    /// The default highlight color.
    pub const RED: Color = Color([1.0, 0.0, 0.0, 1.0]);
}

impl Default for Color {
    fn default() -> Self {
        Color::GREEN
    }
}

/// A longitude/latitude pair, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Center {
    /// Longitude, in degrees.
    pub longitude: f64,

    /// Latitude, in degrees.
    pub latitude: f64,
}

/// A layer handed to a [Surface].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Layer {
    /// A raster tile layer served by a WMS or WMTS endpoint.
    Raster(RasterLayer),

    /// A vector layer of GeoJSON features.
    Vector(VectorLayer),
}

/// The protocol a raster layer is served with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RasterProtocol {
    /// OGC Web Map Service.
    Wms,

    /// OGC Web Map Tile Service.
    Wmts,
}

/// A raster tile layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterLayer {
    /// The layer name on the surface.
    pub name: String,

    /// The service endpoint.
    pub url: String,

    /// The service's layer identifier(s).
    pub layers: String,

    /// The image format, e.g. `png`.
    pub format: String,

    /// The protocol.
    pub protocol: RasterProtocol,

    /// Whether this is a base layer.
    pub background: bool,

    /// Whether the layer is shown.
    pub visible: bool,

    /// Layer opacity, from 0 to 1.
    pub opacity: f64,

    /// Whether the tiles are requested with transparency.
    pub transparent: bool,
}

/// Where a vector layer's features come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorSource {
    /// Features held in memory.
    Data(FeatureCollection),

    /// Features the backend fetches itself.
    Url(String),
}

/// Vector styling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Style {
    /// The stroke color.
    pub stroke_color: Color,

    /// Opacity, from 0 to 1.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,

    /// Stroke width, in pixels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,

    /// Drawing order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i32>,
}

/// A vector layer of GeoJSON features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorLayer {
    /// The layer name on the surface.
    pub name: String,

    /// The features.
    pub source: VectorSource,

    /// The style.
    pub style: Style,

    /// Whether this is a base layer.
    pub background: bool,

    /// Whether the layer is shown.
    pub visible: bool,

    /// Layer opacity, from 0 to 1.
    pub opacity: f64,
}

/// A visualization backend.
pub trait Surface {
    /// Whatever the backend hands back to be displayed.
    type Widget;

    /// Adds a layer.
    fn add_layer(&mut self, layer: Layer);

    /// Removes the first layer with this name, returning false if there was
    /// none.
    fn remove_layer(&mut self, name: &str) -> bool;

    /// Removes every layer.
    fn clear_layers(&mut self);

    /// Moves the camera.
    fn zoom_to(&mut self, center: Center);

    /// Returns the widget to display.
    fn show(&self) -> &Self::Widget;

    /// Adds a layer, then moves the camera to the center of its features, if
    /// it is an inline vector layer.
    fn add_layer_centered(&mut self, layer: Layer) {
        let center = layer.center();
        self.add_layer(layer);
        if let Some(center) = center {
            self.zoom_to(center);
        }
    }

    /// Replaces the highlight layer, or clears it if `geojson` is `None`.
    fn highlight(&mut self, geojson: Option<FeatureCollection>, color: Color) {
        let _ = self.remove_layer(HIGHLIGHT);
        if let Some(geojson) = geojson {
            let style = Style {
                stroke_color: color,
                opacity: None,
                stroke_width: Some(5.0),
                z_index: Some(31),
            };
            self.add_layer(Layer::Vector(
                VectorLayer::new(HIGHLIGHT, VectorSource::Data(geojson)).style(style),
            ));
        }
    }
}

impl Layer {
    /// Returns this layer's name.
    pub fn name(&self) -> &str {
        match self {
            Layer::Raster(layer) => &layer.name,
            Layer::Vector(layer) => &layer.name,
        }
    }

    /// Returns the center of this layer's features, if it holds them inline.
    ///
    /// When the features span more than 180° of longitude they are assumed to
    /// wrap around the antimeridian.
    ///
    /// # Examples
    ///
    /// ```
    /// use geojson::{Feature, FeatureCollection, Geometry, Value};
    /// use pdssp::surface::{Layer, VectorLayer, VectorSource};
    ///
    /// let features = FeatureCollection {
    ///     bbox: None,
    ///     features: vec![Feature::from(Geometry::new(Value::Point(vec![10.0, 20.0])))],
    ///     foreign_members: None,
    /// };
    /// let layer = Layer::Vector(VectorLayer::new("data", VectorSource::Data(features)));
    /// let center = layer.center().unwrap();
    /// assert_eq!(center.longitude, 10.0);
    /// assert_eq!(center.latitude, 20.0);
    /// ```
    pub fn center(&self) -> Option<Center> {
        let Layer::Vector(VectorLayer {
            source: VectorSource::Data(features),
            ..
        }) = self
        else {
            return None;
        };
        let mut bounds = Bounds::default();
        for geometry in features.features.iter().filter_map(|f| f.geometry.as_ref()) {
            bounds.add(&geometry.value);
        }
        bounds.center()
    }
}

impl From<RasterLayer> for Layer {
    fn from(layer: RasterLayer) -> Layer {
        Layer::Raster(layer)
    }
}

impl From<VectorLayer> for Layer {
    fn from(layer: VectorLayer) -> Layer {
        Layer::Vector(layer)
    }
}

impl RasterLayer {
    /// Creates a new WMS layer, as an opaque, visible png base layer.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdssp::surface::RasterLayer;
    ///
    /// let layer = RasterLayer::wms("wms_mars", "http://wms.test", "viking");
    /// assert!(layer.background);
    /// ```
    pub fn wms(name: impl ToString, url: impl ToString, layers: impl ToString) -> RasterLayer {
        RasterLayer {
            name: name.to_string(),
            url: url.to_string(),
            layers: layers.to_string(),
            format: "png".to_string(),
            protocol: RasterProtocol::Wms,
            background: true,
            visible: true,
            opacity: 1.0,
            transparent: false,
        }
    }

    /// Creates a new WMTS layer, as an opaque, visible png base layer.
    pub fn wmts(name: impl ToString, url: impl ToString, layers: impl ToString) -> RasterLayer {
        RasterLayer {
            protocol: RasterProtocol::Wmts,
            ..RasterLayer::wms(name, url, layers)
        }
    }

    /// Turns this layer into a transparent overlay.
    pub fn overlay(mut self) -> RasterLayer {
        self.background = false;
        self.transparent = true;
        self
    }
}

impl VectorLayer {
    /// Creates a new vector layer with the default style.
    pub fn new(name: impl ToString, source: VectorSource) -> VectorLayer {
        VectorLayer {
            name: name.to_string(),
            source,
            style: Style::default(),
            background: true,
            visible: true,
            opacity: 1.0,
        }
    }

    /// Sets this layer's style.
    pub fn style(mut self, style: Style) -> VectorLayer {
        self.style = style;
        self
    }
}

impl Style {
    /// Creates a style with this stroke color, fully opaque.
    pub fn stroke(color: Color) -> Style {
        Style {
            stroke_color: color,
            opacity: Some(1.0),
            stroke_width: None,
            z_index: None,
        }
    }
}

impl Default for Style {
    fn default() -> Self {
        Style::stroke(Color::GREEN)
    }
}

#[derive(Debug, Default)]
struct Bounds {
    min: Option<[f64; 2]>,
    max: Option<[f64; 2]>,
}

impl Bounds {
    fn add(&mut self, coordinates: &Coordinates) {
        match coordinates {
            Coordinates::Point(position) => self.add_position(position),
            Coordinates::MultiPoint(positions) | Coordinates::LineString(positions) => {
                positions.iter().for_each(|p| self.add_position(p))
            }
            Coordinates::MultiLineString(lines) | Coordinates::Polygon(lines) => lines
                .iter()
                .flatten()
                .for_each(|p| self.add_position(p)),
            Coordinates::MultiPolygon(polygons) => polygons
                .iter()
                .flatten()
                .flatten()
                .for_each(|p| self.add_position(p)),
            Coordinates::GeometryCollection(geometries) => {
                geometries.iter().for_each(|g| self.add(&g.value))
            }
        }
    }

    fn add_position(&mut self, position: &[f64]) {
        let [x, y] = match position {
            [x, y, ..] => [*x, *y],
            _ => return,
        };
        self.min = Some(match self.min {
            Some([min_x, min_y]) => [min_x.min(x), min_y.min(y)],
            None => [x, y],
        });
        self.max = Some(match self.max {
            Some([max_x, max_y]) => [max_x.max(x), max_y.max(y)],
            None => [x, y],
        });
    }

    fn center(&self) -> Option<Center> {
        let ([min_lon, min_lat], [max_lon, max_lat]) = (self.min?, self.max?);
        let longitude = if max_lon - min_lon > 180.0 {
            0.5 * (min_lon + 360.0 - max_lon) + max_lon
        } else {
            0.5 * (min_lon + max_lon)
        };
        Some(Center {
            longitude,
            latitude: 0.5 * (min_lat + max_lat),
        })
    }
}

/// An in-memory [Surface] that records its layers and camera.
///
/// # Examples
///
/// ```
/// use pdssp::surface::{RasterLayer, Scene, Surface};
///
/// let mut scene = Scene::new();
/// scene.add_layer(RasterLayer::wms("wms_mars", "http://wms.test", "viking").into());
/// assert!(scene.layer("wms_mars").is_some());
/// assert!(scene.remove_layer("wms_mars"));
/// assert!(!scene.remove_layer("wms_mars"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    layers: Vec<Layer>,
    center: Option<Center>,
}

impl Scene {
    /// Creates an empty scene.
    pub fn new() -> Scene {
        Scene::default()
    }

    /// Returns the layers, in the order they were added.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Returns the first layer with this name.
    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.name() == name)
    }

    /// Returns where the camera was last moved to.
    pub fn center(&self) -> Option<Center> {
        self.center
    }
}

impl Surface for Scene {
    type Widget = Scene;

    fn add_layer(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    fn remove_layer(&mut self, name: &str) -> bool {
        match self.layers.iter().position(|layer| layer.name() == name) {
            Some(i) => {
                let _ = self.layers.remove(i);
                true
            }
            None => {
                tracing::debug!("cannot find layer {name}");
                false
            }
        }
    }

    fn clear_layers(&mut self) {
        self.layers.clear();
    }

    fn zoom_to(&mut self, center: Center) {
        self.center = Some(center);
    }

    fn show(&self) -> &Scene {
        self
    }
}
