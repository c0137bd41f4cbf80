//! Paginated STAC item searches.
//!
//! A search answers with a page of features and a `next` link to the rest.
//! [Collector] walks the links and merges the pages into one table.

use crate::{Error, HttpOptions, Result, Transport, transport::parse_url};
use pdssp::{CatalogTable, DATETIME, Feature, body::HEATMAP, normalize};
use serde::Deserialize;
use serde_json::{Map, Value};
use url::Url;

const FEATURES: &str = "features";
const LINKS: &str = "links";
const NEXT: &str = "next";

/// A link from a page.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Link {
    /// The relation, e.g. `next`.
    pub rel: String,

    /// The target.
    pub href: String,
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// The raw GeoJSON features.
    pub features: Vec<Value>,

    /// Where the next page is, if there is one.
    pub next: Option<String>,

    /// The heatmap of this search, if the service provides one.
    pub heatmap: Option<String>,
}

impl Page {
    /// Parses a page from a JSON response body.
    ///
    /// Both `features` and `links` are required. The `next` link is the first
    /// one with that relation, the `heatmap` link the last.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdssp_io::stac::Page;
    /// use serde_json::json;
    ///
    /// let page = Page::from_value(json!({
    ///     "features": [],
    ///     "links": [{"rel": "next", "href": "http://pdssp.test/search?page=2"}]
    /// })).unwrap();
    /// assert_eq!(page.next.unwrap(), "http://pdssp.test/search?page=2");
    /// ```
    pub fn from_value(value: Value) -> Result<Page> {
        let mut object = match value {
            Value::Object(object) => object,
            value => return Err(pdssp::Error::NotAnObject(value).into()),
        };
        let features: Vec<Value> = serde_json::from_value(take(&mut object, FEATURES)?)?;
        let links: Vec<Link> = serde_json::from_value(take(&mut object, LINKS)?)?;
        let next = links
            .iter()
            .find(|link| link.rel == NEXT)
            .map(|link| link.href.clone());
        let heatmap = links
            .iter()
            .rev()
            .find(|link| link.rel == HEATMAP)
            .map(|link| link.href.clone());
        Ok(Page {
            features,
            next,
            heatmap,
        })
    }

    /// Builds this page's features into a table.
    ///
    /// Features are flattened (see [pdssp::normalize]) and every row gets the
    /// page's heatmap link, or null, in the `heatmap` column.
    pub fn into_table(self) -> Result<CatalogTable> {
        let mut features = self
            .features
            .into_iter()
            .map(Feature::from_value)
            .collect::<pdssp::Result<Vec<_>>>()?;
        normalize::flatten_all(&mut features);
        let mut table = CatalogTable::from_features(features);
        table.broadcast(HEATMAP, Value::from(self.heatmap));
        Ok(table)
    }
}

fn take(object: &mut Map<String, Value>, key: &'static str) -> Result<Value> {
    object.remove(key).ok_or(Error::MissingField(key))
}

/// Fetches one page at a time.
#[derive(Debug, Clone)]
pub struct PageFetcher<T = reqwest::blocking::Client> {
    transport: T,
}

impl PageFetcher {
    /// Creates a fetcher with a default HTTP client.
    pub fn new() -> Result<PageFetcher> {
        let client = HttpOptions::default().client()?;
        Ok(PageFetcher::with_transport(client))
    }
}

impl<T: Transport> PageFetcher<T> {
    /// Creates a fetcher that uses a transport.
    pub fn with_transport(transport: T) -> PageFetcher<T> {
        PageFetcher { transport }
    }

    /// Fetches and parses one page.
    pub fn fetch(&self, url: &str) -> Result<Page> {
        let url = parse_url(url)?;
        self.fetch_url(&url)
    }

    /// Fetches and parses the page at a url that is already parsed.
    pub fn fetch_url(&self, url: &Url) -> Result<Page> {
        let text = self.transport.get(url)?;
        let value: Value = serde_json::from_str(&text)?;
        Page::from_value(value)
    }
}

/// Walks a search's pages and merges them into one table.
///
/// # Examples
///
/// ```no_run
/// use pdssp_io::stac::Collector;
///
/// let collector = Collector::new().unwrap();
/// let table = collector.collect("https://pdssp.test/search?collections=hirise", Some(100)).unwrap();
/// assert!(table.len() <= 100);
/// ```
#[derive(Debug, Clone)]
pub struct Collector<T = reqwest::blocking::Client> {
    fetcher: PageFetcher<T>,
}

impl Collector {
    /// Creates a collector with a default HTTP client.
    pub fn new() -> Result<Collector> {
        Ok(Collector {
            fetcher: PageFetcher::new()?,
        })
    }
}

impl<T: Transport> Collector<T> {
    /// Creates a collector that uses a transport.
    pub fn with_transport(transport: T) -> Collector<T> {
        Collector {
            fetcher: PageFetcher::with_transport(transport),
        }
    }

    /// Returns an iterator over the pages of a search.
    ///
    /// The next page is only requested while the pages so far hold fewer than
    /// `max_records` features. Iteration stops after the first error.
    pub fn pages(&self, url: &str, max_records: Option<usize>) -> Pages<'_, T> {
        Pages {
            fetcher: &self.fetcher,
            next: Some(parse_url(url)),
            total: 0,
            max_records,
        }
    }

    /// Fetches every page of a search, up to `max_records` features.
    ///
    /// The table has at most `max_records` rows, though the last page may
    /// have held more. It is indexed and sorted by `datetime`.
    pub fn collect(&self, url: &str, max_records: Option<usize>) -> Result<CatalogTable> {
        let mut table = CatalogTable::new();
        for page in self.pages(url, max_records) {
            table.append(page?.into_table()?);
        }
        if let Some(max_records) = max_records {
            table.truncate(max_records);
        }
        table.set_index(DATETIME);
        tracing::debug!("collected {} records from {url}", table.len());
        Ok(table)
    }
}

/// An iterator over the pages of a search.
///
/// Created by [Collector::pages].
#[derive(Debug)]
pub struct Pages<'a, T> {
    fetcher: &'a PageFetcher<T>,
    next: Option<Result<Url>>,
    total: usize,
    max_records: Option<usize>,
}

impl<T: Transport> Iterator for Pages<'_, T> {
    type Item = Result<Page>;

    fn next(&mut self) -> Option<Result<Page>> {
        let url = match self.next.take()? {
            Ok(url) => url,
            Err(err) => return Some(Err(err)),
        };
        match self.fetcher.fetch_url(&url) {
            Ok(page) => {
                self.total += page.features.len();
                let below_max = self.max_records.is_none_or(|max| self.total < max);
                if let Some(next) = page.next.as_ref()
                    && below_max
                {
                    tracing::debug!("next page: {next}");
                    self.next = Some(Url::parse(next).map_err(Error::from));
                }
                Some(Ok(page))
            }
            Err(err) => Some(Err(err)),
        }
    }
}

/// Collects a search with a default HTTP client.
///
/// # Examples
///
/// ```no_run
/// let table = pdssp_io::stac::load("https://pdssp.test/search?collections=hirise", None).unwrap();
/// ```
pub fn load(url: &str, max_records: Option<usize>) -> Result<CatalogTable> {
    Collector::new()?.collect(url, max_records)
}

#[cfg(test)]
mod tests {
    use super::{Collector, Page, PageFetcher};
    use crate::{Error, transport::fake::FakeTransport};
    use serde_json::{Value, json};
    use url::Url;

    fn feature(id: &str, datetime: &str) -> Value {
        json!({
            "type": "Feature",
            "id": id,
            "geometry": {"type": "Point", "coordinates": [137.4, -4.6]},
            "properties": {
                "datetime": datetime,
                "hashtags": ["mission:MRO", "instrument:HiRISE"]
            },
            "assets": {"thumbnail": {"href": format!("http://pdssp.test/{id}.png")}}
        })
    }

    fn page(features: Vec<Value>, next: Option<&str>) -> String {
        let mut links = vec![json!({"rel": "heatmap", "href": "http://heatmap.test/first?layers=a"})];
        links.push(json!({"rel": "heatmap", "href": "http://heatmap.test/wms?layers=heat"}));
        if let Some(next) = next {
            links.push(json!({"rel": "next", "href": next}));
        }
        json!({"type": "FeatureCollection", "features": features, "links": links}).to_string()
    }

    // Three features on the first page, two on the second.
    fn two_pages(url: &Url) -> crate::Result<String> {
        if url.query() == Some("page=2") {
            Ok(page(
                vec![
                    feature("d", "2020-01-01T00:00:00Z"),
                    feature("e", "2019-01-01T00:00:00Z"),
                ],
                None,
            ))
        } else {
            Ok(page(
                vec![
                    feature("a", "2021-01-01T00:00:00Z"),
                    feature("b", "2022-01-01T00:00:00Z"),
                    feature("c", "2018-01-01T00:00:00Z"),
                ],
                Some("http://pdssp.test/search?page=2"),
            ))
        }
    }

    fn ids(table: &pdssp::CatalogTable) -> Vec<&str> {
        table
            .iter()
            .map(|f| f.attributes["id"].as_str().unwrap())
            .collect()
    }

    #[test]
    fn first_next_last_heatmap() {
        let page: Value = serde_json::from_str(&page(vec![], Some("http://next.test"))).unwrap();
        let page = Page::from_value(page).unwrap();
        assert_eq!(page.next.as_deref(), Some("http://next.test"));
        assert_eq!(page.heatmap.as_deref(), Some("http://heatmap.test/wms?layers=heat"));
    }

    #[test]
    fn missing_links() {
        let error = Page::from_value(json!({"features": []})).unwrap_err();
        assert!(matches!(error, Error::MissingField("links")));
        let error = Page::from_value(json!({"links": []})).unwrap_err();
        assert!(matches!(error, Error::MissingField("features")));
    }

    #[test]
    fn into_table_flattens() {
        let page = Page {
            features: vec![feature("a", "2021-01-01T00:00:00Z")],
            next: None,
            heatmap: None,
        };
        let table = page.into_table().unwrap();
        assert_eq!(table.first_value("mission").unwrap(), "MRO");
        assert_eq!(table.first_value("thumbnail").unwrap(), "http://pdssp.test/a.png");
        assert!(table.has_column("heatmap"));
        assert_eq!(table.first_value("heatmap"), None);
    }

    #[test]
    fn fetch_malformed_json() {
        let transport = FakeTransport::new(|_| Ok("not json".to_string()));
        let error = PageFetcher::with_transport(&transport)
            .fetch("http://pdssp.test/search")
            .unwrap_err();
        assert!(matches!(error, Error::SerdeJson(_)));
    }

    #[test]
    fn collect_everything() {
        let transport = FakeTransport::new(two_pages);
        let table = Collector::with_transport(&transport)
            .collect("http://pdssp.test/search", None)
            .unwrap();
        assert_eq!(table.len(), 5);
        assert_eq!(ids(&table), vec!["c", "e", "d", "a", "b"]);
        assert_eq!(table.index(), Some("datetime"));
        assert_eq!(transport.calls().len(), 2);
    }

    #[test]
    fn collect_truncates_the_last_page() {
        let transport = FakeTransport::new(two_pages);
        let table = Collector::with_transport(&transport)
            .collect("http://pdssp.test/search", Some(4))
            .unwrap();
        assert_eq!(transport.calls().len(), 2);
        assert_eq!(table.len(), 4);
        assert_eq!(ids(&table), vec!["c", "d", "a", "b"]);
    }

    #[test]
    fn collect_stops_at_max_records() {
        let transport = FakeTransport::new(two_pages);
        let table = Collector::with_transport(&transport)
            .collect("http://pdssp.test/search", Some(3))
            .unwrap();
        assert_eq!(transport.calls().len(), 1);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn empty_first_page() {
        let transport = FakeTransport::new(|_| Ok(page(vec![], None)));
        let table = Collector::with_transport(&transport)
            .collect("http://pdssp.test/search", None)
            .unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn empty_page_still_links() {
        let transport = FakeTransport::new(|url: &Url| {
            if url.query() == Some("page=2") {
                Ok(page(vec![feature("a", "2021-01-01T00:00:00Z")], None))
            } else {
                Ok(page(vec![], Some("http://pdssp.test/search?page=2")))
            }
        });
        let collector = Collector::with_transport(&transport);
        let pages: Vec<_> = collector
            .pages("http://pdssp.test/search", Some(1))
            .collect::<crate::Result<_>>()
            .unwrap();
        assert_eq!(pages.len(), 2);
        assert!(pages[0].features.is_empty());
    }

    #[test]
    fn collect_keeps_each_page_heatmap_and_columns() {
        fn observation(id: &str, datetime: &str, hashtag: &str) -> Value {
            json!({
                "type": "Feature",
                "id": id,
                "geometry": null,
                "properties": {"datetime": datetime, "hashtags": [hashtag]}
            })
        }
        let transport = FakeTransport::new(|url: &Url| {
            let body = if url.query() == Some("page=2") {
                json!({
                    "features": [observation("b", "2021-01-01T00:00:00Z", "instrument:HiRISE")],
                    "links": [
                        {"rel": "heatmap", "href": "http://heatmap.test/wms?layers=stale"},
                        {"rel": "heatmap", "href": "http://heatmap.test/wms?layers=second"}
                    ]
                })
            } else {
                json!({
                    "features": [observation("a", "2020-01-01T00:00:00Z", "mission:MRO")],
                    "links": [
                        {"rel": "heatmap", "href": "http://heatmap.test/wms?layers=first"},
                        {"rel": "next", "href": "http://pdssp.test/search?page=2"}
                    ]
                })
            };
            Ok(body.to_string())
        });
        let table = Collector::with_transport(&transport)
            .collect("http://pdssp.test/search", None)
            .unwrap();
        assert_eq!(ids(&table), vec!["a", "b"]);
        assert_eq!(
            table.value(0, "heatmap").unwrap(),
            "http://heatmap.test/wms?layers=first"
        );
        assert_eq!(
            table.value(1, "heatmap").unwrap(),
            "http://heatmap.test/wms?layers=second"
        );
        for column in ["id", "datetime", "mission", "instrument", "heatmap"] {
            assert!(table.has_column(column), "missing column {column}");
        }
        assert!(!table.has_column("hashtags"));
        assert_eq!(table.value(0, "mission").unwrap(), "MRO");
        assert_eq!(table.value(0, "instrument"), None);
        assert_eq!(table.value(1, "instrument").unwrap(), "HiRISE");
        assert_eq!(table.value(1, "mission"), None);
    }

    #[test]
    fn invalid_seed_url() {
        let transport = FakeTransport::new(two_pages);
        let error = Collector::with_transport(&transport)
            .collect("not a url", None)
            .unwrap_err();
        assert!(matches!(error, Error::InvalidUrl { ref url, .. } if url == "not a url"));
        assert_eq!(error.kind(), pdssp::ErrorKind::InvalidInput);
        assert!(transport.calls().is_empty());
    }

    #[test]
    fn malformed_next_link() {
        let transport = FakeTransport::new(|_| Ok(page(vec![], Some("not a url"))));
        let error = Collector::with_transport(&transport)
            .collect("http://pdssp.test/search", None)
            .unwrap_err();
        assert!(matches!(error, Error::UrlParse(_)));
        assert_eq!(error.kind(), pdssp::ErrorKind::MalformedResponse);
        assert_eq!(transport.calls().len(), 1);
    }

    #[test]
    fn pages_stop_after_an_error() {
        let transport = FakeTransport::new(|_| Err(Error::MissingField("features")));
        let collector = Collector::with_transport(&transport);
        let mut pages = collector.pages("http://pdssp.test/search", None);
        assert!(pages.next().unwrap().is_err());
        assert!(pages.next().is_none());
    }
}
