use crate::{Error, Feature, Filter, Result};
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use geojson::FeatureCollection;
use indexmap::IndexSet;
use serde_json::Value;
use std::cmp::Ordering;

/// The attribute catalogs are indexed and sorted by.
pub const DATETIME: &str = "datetime";

/// A merged, de-paginated catalog: an ordered sequence of features.
///
/// The columns are the union of every attribute seen in any row, in first-seen
/// order. A row that lacks a column reads as null for it. Rows are never
/// deduplicated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogTable {
    columns: IndexSet<String>,
    features: Vec<Feature>,
    index: Option<String>,
    crs: Option<String>,
}

impl CatalogTable {
    /// Creates a new, empty table.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdssp::CatalogTable;
    ///
    /// let table = CatalogTable::new();
    /// assert!(table.is_empty());
    /// ```
    pub fn new() -> CatalogTable {
        CatalogTable::default()
    }

    /// Creates a table from features.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdssp::{CatalogTable, Feature};
    ///
    /// let table = CatalogTable::from_features(vec![
    ///     Feature::new().attribute("a", 1),
    ///     Feature::new().attribute("b", 2),
    /// ]);
    /// assert_eq!(table.columns(), vec!["a", "b"]);
    /// ```
    pub fn from_features(features: impl IntoIterator<Item = Feature>) -> CatalogTable {
        let mut table = CatalogTable::new();
        table.extend(features);
        table
    }

    /// Adds a row to the end of this table.
    pub fn push(&mut self, feature: Feature) {
        for key in feature.attributes.keys() {
            if !self.columns.contains(key) {
                let _ = self.columns.insert(key.clone());
            }
        }
        self.features.push(feature);
    }

    /// Appends another table's rows to the end of this one.
    ///
    /// Columns are merged. This table's crs wins, if it has one.
    pub fn append(&mut self, other: CatalogTable) {
        self.columns.extend(other.columns);
        self.features.extend(other.features);
        if self.crs.is_none() {
            self.crs = other.crs;
        }
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Returns true if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Returns the column names, in first-seen order.
    pub fn columns(&self) -> Vec<&str> {
        self.columns.iter().map(String::as_str).collect()
    }

    /// Returns true if any row has this column.
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains(column)
    }

    /// Returns the rows.
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Returns an iterator over the rows.
    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }

    /// Returns one row.
    pub fn get(&self, position: usize) -> Option<&Feature> {
        self.features.get(position)
    }

    /// Returns the value of a cell, or `None` if it is absent or null.
    pub fn value(&self, position: usize, column: &str) -> Option<&Value> {
        self.features
            .get(position)
            .and_then(|feature| feature.get(column))
    }

    /// Returns the first row's value for a column, or `None` if it is absent or
    /// null.
    pub fn first_value(&self, column: &str) -> Option<&Value> {
        self.value(0, column)
    }

    /// Keeps the first `len` rows and drops the rest.
    pub fn truncate(&mut self, len: usize) {
        self.features.truncate(len);
    }

    /// Sets a column to the same value on every row.
    ///
    /// The column is added even if the table has no rows.
    pub fn broadcast(&mut self, column: &str, value: Value) {
        let _ = self.columns.insert(column.to_string());
        for feature in &mut self.features {
            let _ = feature.attributes.insert(column.to_string(), value.clone());
        }
    }

    /// Returns the index column, if one is set.
    pub fn index(&self) -> Option<&str> {
        self.index.as_deref()
    }

    /// Makes a column the index and sorts the rows by it, ascending.
    ///
    /// The sort is stable. RFC 3339 timestamps compare as instants, numbers
    /// numerically, other strings lexicographically. Rows without a value sort
    /// last.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdssp::{CatalogTable, Feature};
    ///
    /// let mut table = CatalogTable::from_features(vec![
    ///     Feature::new().attribute("datetime", "2020-01-02T00:00:00Z"),
    ///     Feature::new().attribute("datetime", "2020-01-01T00:00:00Z"),
    /// ]);
    /// table.set_index("datetime");
    /// assert_eq!(table.first_value("datetime").unwrap(), "2020-01-01T00:00:00Z");
    /// ```
    pub fn set_index(&mut self, column: &str) {
        self.index = Some(column.to_string());
        self.sort_by_index();
    }

    /// Sorts the rows by the index column, if there is one.
    pub fn sort_by_index(&mut self) {
        let Some(index) = self.index.as_deref() else {
            return;
        };
        self.features
            .sort_by_cached_key(|feature| SortKey::new(feature.get(index)));
    }

    /// Returns the coordinate reference system of the geometries, if known.
    pub fn crs(&self) -> Option<&str> {
        self.crs.as_deref()
    }

    /// Sets the coordinate reference system of the geometries.
    pub fn with_crs(mut self, crs: impl ToString) -> CatalogTable {
        self.crs = Some(crs.to_string());
        self
    }

    /// Returns a new table with the rows at these positions, in this order.
    ///
    /// The new table keeps every column, the index, and the crs.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdssp::{CatalogTable, Feature};
    ///
    /// let table = CatalogTable::from_features((0..3).map(|i| Feature::new().attribute("i", i)));
    /// let selection = table.select(&[2, 0]).unwrap();
    /// assert_eq!(selection.first_value("i").unwrap(), 2);
    /// table.select(&[3]).unwrap_err();
    /// ```
    pub fn select(&self, positions: &[usize]) -> Result<CatalogTable> {
        let features = positions
            .iter()
            .map(|&position| {
                self.features
                    .get(position)
                    .cloned()
                    .ok_or(Error::RowOutOfBounds {
                        position,
                        len: self.len(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(self.with_features(features))
    }

    /// Returns a new table with the rows that match a CQL2 text expression.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdssp::{CatalogTable, Feature};
    ///
    /// let table = CatalogTable::from_features((0..5).map(|i| Feature::new().attribute("orbit", i)));
    /// let table = table.filter("orbit >= 3").unwrap();
    /// assert_eq!(table.len(), 2);
    /// ```
    pub fn filter(&self, expr: &str) -> Result<CatalogTable> {
        let filter: Filter = expr.parse()?;
        Ok(self.filter_with(&filter))
    }

    /// Returns a new table with the rows that match a parsed filter.
    pub fn filter_with(&self, filter: &Filter) -> CatalogTable {
        let features = self
            .features
            .iter()
            .filter(|feature| filter.matches(feature))
            .cloned()
            .collect();
        self.with_features(features)
    }

    /// Returns the rows whose index value is one of `keys`.
    pub fn select_by_index(&self, keys: &[Value]) -> Result<CatalogTable> {
        let index = self.index.as_deref().ok_or(Error::NoIndex)?;
        let features = self
            .features
            .iter()
            .filter(|feature| feature.get(index).is_some_and(|value| keys.contains(value)))
            .cloned()
            .collect();
        Ok(self.with_features(features))
    }

    /// Converts this table's rows to a GeoJSON feature collection.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdssp::{CatalogTable, Feature};
    ///
    /// let table = CatalogTable::from_features(vec![Feature::new().attribute("a", 1)]);
    /// let feature_collection = table.to_feature_collection();
    /// assert_eq!(feature_collection.features.len(), 1);
    /// ```
    pub fn to_feature_collection(&self) -> FeatureCollection {
        FeatureCollection {
            bbox: None,
            features: self.features.iter().cloned().map(Into::into).collect(),
            foreign_members: None,
        }
    }

    /// Returns the rows, consuming the table.
    pub fn into_features(self) -> Vec<Feature> {
        self.features
    }

    fn with_features(&self, features: Vec<Feature>) -> CatalogTable {
        CatalogTable {
            columns: self.columns.clone(),
            features,
            index: self.index.clone(),
            crs: self.crs.clone(),
        }
    }
}

impl Extend<Feature> for CatalogTable {
    fn extend<T: IntoIterator<Item = Feature>>(&mut self, iter: T) {
        for feature in iter {
            self.push(feature);
        }
    }
}

impl FromIterator<Feature> for CatalogTable {
    fn from_iter<T: IntoIterator<Item = Feature>>(iter: T) -> Self {
        CatalogTable::from_features(iter)
    }
}

impl IntoIterator for CatalogTable {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

impl<'a> IntoIterator for &'a CatalogTable {
    type Item = &'a Feature;
    type IntoIter = std::slice::Iter<'a, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}

#[derive(Debug, Clone)]
enum SortKey {
    Number(f64),
    Instant(DateTime<FixedOffset>),
    Text(String),
    Other(String),
    Missing,
}

impl SortKey {
    fn new(value: Option<&Value>) -> SortKey {
        match value {
            None => SortKey::Missing,
            Some(Value::Number(n)) => n.as_f64().map(SortKey::Number).unwrap_or(SortKey::Missing),
            Some(Value::String(s)) => parse_instant(s)
                .map(SortKey::Instant)
                .unwrap_or_else(|| SortKey::Text(s.clone())),
            Some(other) => SortKey::Other(other.to_string()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            SortKey::Number(_) => 0,
            SortKey::Instant(_) => 1,
            SortKey::Text(_) => 2,
            SortKey::Other(_) => 3,
            SortKey::Missing => 4,
        }
    }
}

impl PartialEq for SortKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortKey {}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(b),
            (SortKey::Instant(a), SortKey::Instant(b)) => a.cmp(b),
            (SortKey::Text(a), SortKey::Text(b)) | (SortKey::Other(a), SortKey::Other(b)) => {
                a.cmp(b)
            }
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

fn parse_instant(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s).ok().or_else(|| {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|datetime| datetime.and_utc().fixed_offset())
    })
}

#[cfg(test)]
mod tests {
    use super::{CatalogTable, DATETIME};
    use crate::Feature;
    use rstest::rstest;
    use serde_json::{Value, json};

    fn dated(id: &str, datetime: impl Into<Value>) -> Feature {
        Feature::new()
            .attribute("id", id)
            .attribute(DATETIME, datetime)
    }

    fn ids(table: &CatalogTable) -> Vec<&str> {
        table
            .iter()
            .map(|feature| feature.attributes["id"].as_str().unwrap())
            .collect()
    }

    #[test]
    fn schema_union() {
        let mut table = CatalogTable::from_features(vec![Feature::new().attribute("a", 1)]);
        table.append(CatalogTable::from_features(vec![
            Feature::new().attribute("b", 2).attribute("a", 3),
        ]));
        assert_eq!(table.columns(), vec!["a", "b"]);
        assert_eq!(table.value(0, "b"), None);
        assert_eq!(table.value(1, "b").unwrap(), 2);
    }

    #[test]
    fn sort_by_datetime() {
        let mut table = CatalogTable::from_features(vec![
            dated("c", "2021-03-01T00:00:00Z"),
            dated("missing", Value::Null),
            dated("a", "2019-01-01T12:00:00+02:00"),
            dated("b", "2019-01-01T11:00:00Z"),
        ]);
        table.set_index(DATETIME);
        assert_eq!(table.index(), Some(DATETIME));
        assert_eq!(ids(&table), vec!["a", "b", "c", "missing"]);
    }

    #[test]
    fn sort_is_stable() {
        let mut table = CatalogTable::from_features(vec![
            dated("first", "2020-01-01T00:00:00Z"),
            dated("second", "2020-01-01T00:00:00Z"),
        ]);
        table.set_index(DATETIME);
        assert_eq!(ids(&table), vec!["first", "second"]);
    }

    #[test]
    fn sort_without_the_column() {
        let mut table = CatalogTable::from_features(vec![
            Feature::new().attribute("id", "b"),
            Feature::new().attribute("id", "a"),
        ]);
        table.set_index(DATETIME);
        assert_eq!(ids(&table), vec!["b", "a"]);
    }

    #[test]
    fn broadcast_on_empty_table() {
        let mut table = CatalogTable::new();
        table.broadcast("heatmap", Value::Null);
        assert!(table.has_column("heatmap"));
        assert!(table.is_empty());
    }

    #[test]
    fn broadcast() {
        let mut table = CatalogTable::from_features(vec![Feature::new(), Feature::new()]);
        table.broadcast("heatmap", json!("http://heatmap.test"));
        assert!(table.iter().all(|f| f.attributes["heatmap"] == "http://heatmap.test"));
    }

    #[rstest]
    #[case(0, 0)]
    #[case(2, 2)]
    #[case(10, 3)]
    fn truncate(#[case] len: usize, #[case] expected: usize) {
        let mut table = CatalogTable::from_features((0..3).map(|i| Feature::new().attribute("i", i)));
        table.truncate(len);
        assert_eq!(table.len(), expected);
    }

    #[test]
    fn select_keeps_metadata() {
        let mut table = CatalogTable::from_features(vec![
            dated("a", "2020-01-01T00:00:00Z"),
            Feature::new().attribute("other", true),
        ])
        .with_crs("a crs");
        table.set_index(DATETIME);
        let selection = table.select(&[0]).unwrap();
        assert_eq!(selection.len(), 1);
        assert_eq!(selection.columns(), table.columns());
        assert_eq!(selection.index(), Some(DATETIME));
        assert_eq!(selection.crs(), Some("a crs"));
    }

    #[test]
    fn select_by_index() {
        let mut table = CatalogTable::from_features(vec![
            dated("a", "2020-01-01T00:00:00Z"),
            dated("b", "2020-01-02T00:00:00Z"),
        ]);
        table.select_by_index(&[]).unwrap_err();
        table.set_index(DATETIME);
        let selection = table
            .select_by_index(&[json!("2020-01-02T00:00:00Z")])
            .unwrap();
        assert_eq!(ids(&selection), vec!["b"]);
    }

    #[test]
    fn filter_does_not_mutate() {
        let table = CatalogTable::from_features((0..4).map(|i| Feature::new().attribute("orbit", i)));
        let filtered = table.filter("orbit < 2").unwrap();
        assert_eq!(filtered.len(), 2);
        assert_eq!(table.len(), 4);
    }
}
