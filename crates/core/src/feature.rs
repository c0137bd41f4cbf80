//! Observation records.

use crate::{Error, Result};
use geojson::{Geometry, feature::Id};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The attribute that holds a feature's id, when the source feature had one.
pub const ID: &str = "id";

/// The attribute that holds a feature's assets before they are flattened.
pub const ASSETS: &str = "assets";

/// One observation record: a geometry plus its attributes.
///
/// Attributes are kept in the order they were first seen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// The footprint of the observation, in the catalog's coordinate reference
    /// system.
    pub geometry: Option<Geometry>,

    /// Attribute name to value.
    pub attributes: Map<String, Value>,
}

impl Feature {
    /// Creates a new feature without a geometry or attributes.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdssp::Feature;
    ///
    /// let feature = Feature::new();
    /// assert!(feature.attributes.is_empty());
    /// ```
    pub fn new() -> Feature {
        Feature::default()
    }

    /// Creates a feature from a raw GeoJSON feature value.
    ///
    /// The `properties` become the attributes. A top-level `id` becomes the
    /// `id` attribute, and a top-level `assets` object (where STAC items keep
    /// them) becomes the `assets` attribute, unless the properties already
    /// have those keys.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdssp::Feature;
    /// use serde_json::json;
    ///
    /// let feature = Feature::from_value(json!({
    ///     "type": "Feature",
    ///     "id": "ESP_011261_1960",
    ///     "geometry": null,
    ///     "properties": {"datetime": "2009-01-10T00:00:00Z"}
    /// })).unwrap();
    /// assert_eq!(feature.attributes["id"], "ESP_011261_1960");
    /// ```
    pub fn from_value(value: Value) -> Result<Feature> {
        match value {
            Value::Object(_) => {
                let feature = geojson::Feature::from_json_value(value)?;
                Ok(feature.into())
            }
            value => Err(Error::NotAnObject(value)),
        }
    }

    /// Sets the geometry of this feature.
    pub fn geometry(mut self, geometry: impl Into<Geometry>) -> Feature {
        self.geometry = Some(geometry.into());
        self
    }

    /// Sets one attribute of this feature.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdssp::Feature;
    ///
    /// let feature = Feature::new().attribute("mission", "MRO");
    /// assert_eq!(feature.attributes["mission"], "MRO");
    /// ```
    pub fn attribute(mut self, key: impl ToString, value: impl Into<Value>) -> Feature {
        let _ = self.attributes.insert(key.to_string(), value.into());
        self
    }

    /// Returns the value of an attribute, treating null as absent.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key).filter(|value| !value.is_null())
    }
}

impl From<geojson::Feature> for Feature {
    fn from(feature: geojson::Feature) -> Feature {
        let mut attributes = feature.properties.unwrap_or_default();
        if let Some(id) = feature.id
            && !attributes.contains_key(ID)
        {
            let id = match id {
                Id::String(s) => Value::String(s),
                Id::Number(n) => Value::Number(n),
            };
            let _ = attributes.insert(ID.to_string(), id);
        }
        if let Some(mut foreign_members) = feature.foreign_members
            && let Some(assets) = foreign_members.remove(ASSETS)
            && !attributes.contains_key(ASSETS)
        {
            let _ = attributes.insert(ASSETS.to_string(), assets);
        }
        Feature {
            geometry: feature.geometry,
            attributes,
        }
    }
}

impl From<Feature> for geojson::Feature {
    fn from(feature: Feature) -> geojson::Feature {
        let id = match feature.attributes.get(ID) {
            Some(Value::String(s)) => Some(Id::String(s.clone())),
            Some(Value::Number(n)) => Some(Id::Number(n.clone())),
            _ => None,
        };
        geojson::Feature {
            bbox: None,
            geometry: feature.geometry,
            id,
            properties: Some(feature.attributes),
            foreign_members: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Feature;
    use serde_json::json;

    #[test]
    fn from_stac_item() {
        let feature = Feature::from_value(json!({
            "type": "Feature",
            "id": "an-id",
            "geometry": {"type": "Point", "coordinates": [137.4, -4.6]},
            "properties": {"datetime": "2012-08-06T05:17:57Z"},
            "assets": {"thumbnail": {"href": "http://x/y.png"}}
        }))
        .unwrap();
        assert!(feature.geometry.is_some());
        assert_eq!(feature.attributes["id"], "an-id");
        assert_eq!(feature.attributes["assets"]["thumbnail"]["href"], "http://x/y.png");
    }

    #[test]
    fn properties_win_over_top_level() {
        let feature = Feature::from_value(json!({
            "type": "Feature",
            "id": "top-level",
            "geometry": null,
            "properties": {"id": "from-properties"}
        }))
        .unwrap();
        assert_eq!(feature.attributes["id"], "from-properties");
    }

    #[test]
    fn not_an_object() {
        let _ = Feature::from_value(json!([1, 2])).unwrap_err();
    }

    #[test]
    fn into_geojson() {
        let feature = Feature::new().attribute("id", "an-id").attribute("a", 1);
        let feature: geojson::Feature = feature.into();
        assert_eq!(feature.id, Some(geojson::feature::Id::String("an-id".to_string())));
        assert_eq!(feature.properties.unwrap()["a"], 1);
    }
}
