use crate::{
    Body, CatalogTable, Result,
    body::HEATMAP,
    surface::{Color, Layer, Style, Surface, VectorLayer, VectorSource},
};
use geojson::FeatureCollection;
use indexmap::IndexSet;
use serde::Serialize;
use serde_json::Value;

/// The name of the vector layer that shows a dataset's observations.
pub const DATA_LAYER: &str = "data";

/// Rows of a table, by position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// One row.
    Single(usize),

    /// Several rows, in this order.
    Many(Vec<usize>),
}

/// Summary statistics for one column.
///
/// `min`, `max`, and `mean` are only set when every non-null value is a
/// number.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    /// The column name.
    pub column: String,

    /// The number of non-null values.
    pub count: usize,

    /// The number of distinct non-null values.
    pub unique: usize,

    /// The smallest value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    /// The largest value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    /// The mean value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
}

/// A catalog of observations of one planetary body.
///
/// The dataset owns its table. Queries return new tables and never change
/// it, though the table can be replaced as a whole.
///
/// # Examples
///
/// ```
/// use pdssp::{CatalogTable, Dataset, Feature};
///
/// let table = CatalogTable::from_features((0..3).map(|i| Feature::new().attribute("orbit", i)));
/// let dataset = Dataset::classify(table).unwrap();
/// assert_eq!(dataset.body().name(), "MARS");
/// assert_eq!(dataset.filter("orbit > 0").unwrap().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    body: Body,
    table: CatalogTable,
}

impl Dataset {
    /// Creates a dataset of a body.
    pub fn new(body: Body, table: CatalogTable) -> Dataset {
        Dataset { body, table }
    }

    /// Creates a dataset, reading the body from the table.
    ///
    /// See [Body::classify].
    pub fn classify(table: CatalogTable) -> Result<Dataset> {
        let body = Body::classify(&table)?;
        Ok(Dataset::new(body, table))
    }

    /// Returns the body.
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Returns the table.
    pub fn table(&self) -> &CatalogTable {
        &self.table
    }

    /// Returns the table, consuming the dataset.
    pub fn into_table(self) -> CatalogTable {
        self.table
    }

    /// Replaces the table, returning the old one.
    pub fn replace_table(&mut self, table: CatalogTable) -> CatalogTable {
        std::mem::replace(&mut self.table, table)
    }

    /// Returns the column names.
    pub fn columns(&self) -> Vec<&str> {
        self.table.columns()
    }

    /// Summarizes every column.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdssp::{CatalogTable, Dataset, Feature};
    ///
    /// let table = CatalogTable::from_features((1..4).map(|i| Feature::new().attribute("orbit", i)));
    /// let summary = Dataset::classify(table).unwrap().describe();
    /// assert_eq!(summary[0].count, 3);
    /// assert_eq!(summary[0].mean, Some(2.0));
    /// ```
    pub fn describe(&self) -> Vec<ColumnSummary> {
        self.table
            .columns()
            .into_iter()
            .map(|column| self.summarize(column))
            .collect()
    }

    /// Returns the rows that match a CQL2 text expression.
    pub fn filter(&self, expr: &str) -> Result<CatalogTable> {
        self.table.filter(expr)
    }

    /// Returns the rows that match a CQL2 text expression, and shows them on
    /// the surface if one is given.
    pub fn query<S: Surface>(
        &self,
        expr: &str,
        surface: Option<&mut S>,
        color: Color,
    ) -> Result<CatalogTable> {
        let table = self.filter(expr)?;
        if let Some(surface) = surface {
            show(surface, &table, color);
        }
        Ok(table)
    }

    /// Returns some rows.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdssp::{CatalogTable, Dataset, Feature, Selection};
    ///
    /// let table = CatalogTable::from_features((0..3).map(|i| Feature::new().attribute("i", i)));
    /// let dataset = Dataset::classify(table).unwrap();
    /// assert_eq!(dataset.select_rows(Selection::Single(1)).unwrap().len(), 1);
    /// assert_eq!(dataset.select_rows(Selection::Many(vec![2, 0])).unwrap().len(), 2);
    /// dataset.select_rows(3usize.into()).unwrap_err();
    /// ```
    pub fn select_rows(&self, selection: Selection) -> Result<CatalogTable> {
        match selection {
            Selection::Single(position) => self.table.select(&[position]),
            Selection::Many(positions) => self.table.select(&positions),
        }
    }

    /// Converts a table to the GeoJSON a surface displays.
    pub fn to_visualization_payload(table: &CatalogTable) -> FeatureCollection {
        table.to_feature_collection()
    }

    /// Sets up a surface for this dataset.
    ///
    /// Adds the body's background, then the heatmap overlay if the first row
    /// has a heatmap link.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdssp::{CatalogTable, Dataset, surface::Scene};
    ///
    /// let dataset = Dataset::classify(CatalogTable::new()).unwrap();
    /// let scene = dataset.derive_visualization_surface(Scene::new()).unwrap();
    /// assert!(scene.layer("wms_mars").is_some());
    /// ```
    pub fn derive_visualization_surface<S: Surface>(&self, mut surface: S) -> Result<S> {
        surface.add_layer(self.body.background().clone().into());
        if let Some(href) = self.table.first_value(HEATMAP).and_then(Value::as_str) {
            let layer = self.body.heatmap_layer(href)?;
            tracing::debug!("adding heatmap layer {} from {}", layer.name, layer.url);
            surface.add_layer(layer.into());
        }
        Ok(surface)
    }

    /// Shows every observation on a surface, as the `data` layer.
    pub fn show_dataset<S: Surface>(&self, surface: &mut S, color: Color) {
        show(surface, &self.table, color);
    }

    /// Removes the `data` layer from a surface.
    pub fn remove_dataset<S: Surface>(&self, surface: &mut S) -> bool {
        surface.remove_layer(DATA_LAYER)
    }

    /// Highlights some rows on a surface.
    pub fn highlight<S: Surface>(
        &self,
        surface: &mut S,
        selection: Selection,
        color: Color,
    ) -> Result<()> {
        let table = self.select_rows(selection)?;
        surface.highlight(Some(table.to_feature_collection()), color);
        Ok(())
    }

    /// Highlights the rows whose index value is one of `keys`.
    pub fn highlight_by_key<S: Surface>(
        &self,
        surface: &mut S,
        keys: &[Value],
        color: Color,
    ) -> Result<()> {
        let table = self.table.select_by_index(keys)?;
        surface.highlight(Some(table.to_feature_collection()), color);
        Ok(())
    }

    /// Removes the highlight from a surface.
    pub fn remove_highlight<S: Surface>(&self, surface: &mut S) {
        surface.highlight(None, Color::RED);
    }

    fn summarize(&self, column: &str) -> ColumnSummary {
        let values: Vec<&Value> = self
            .table
            .iter()
            .filter_map(|feature| feature.get(column))
            .collect();
        let unique = values
            .iter()
            .map(|value| value.to_string())
            .collect::<IndexSet<_>>()
            .len();
        let numbers: Option<Vec<f64>> = values.iter().map(|value| value.as_f64()).collect();
        let (min, max, mean) = match numbers {
            Some(numbers) if !numbers.is_empty() => {
                let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
                let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let mean = numbers.iter().sum::<f64>() / numbers.len() as f64;
                (Some(min), Some(max), Some(mean))
            }
            _ => (None, None, None),
        };
        ColumnSummary {
            column: column.to_string(),
            count: values.len(),
            unique,
            min,
            max,
            mean,
        }
    }
}

impl From<usize> for Selection {
    fn from(position: usize) -> Selection {
        Selection::Single(position)
    }
}

impl From<Vec<usize>> for Selection {
    fn from(positions: Vec<usize>) -> Selection {
        Selection::Many(positions)
    }
}

impl From<&[usize]> for Selection {
    fn from(positions: &[usize]) -> Selection {
        Selection::Many(positions.to_vec())
    }
}

fn show<S: Surface>(surface: &mut S, table: &CatalogTable, color: Color) {
    let layer = VectorLayer::new(
        DATA_LAYER,
        VectorSource::Data(table.to_feature_collection()),
    )
    .style(Style::stroke(color));
    surface.add_layer_centered(Layer::Vector(layer));
}
