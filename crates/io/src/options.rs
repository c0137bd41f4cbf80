use crate::{Result, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The default timeout of one HTTP request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// The WFS version requested by default.
pub const DEFAULT_WFS_VERSION: &str = "2.0.0";

/// The WMS version requested by default.
pub const DEFAULT_WMS_VERSION: &str = "1.1.1";

/// The number of features requested per WFS `GetFeature` chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 10000;

/// Options for the HTTP client.
///
/// # Examples
///
/// ```
/// use pdssp_io::HttpOptions;
///
/// let options: HttpOptions = serde_json::from_str(r#"{"timeout": "30s"}"#).unwrap();
/// assert_eq!(options.timeout.unwrap().as_secs(), 30);
/// let client = options.client().unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpOptions {
    /// The timeout of one request, or none for no timeout.
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,

    /// The user agent.
    pub user_agent: String,
}

/// Options for [WfsClient](crate::ogc::WfsClient).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WfsOptions {
    /// The WFS version to request.
    pub version: String,

    /// Layers to hide, even though the service advertises them.
    pub ignore_layers: Vec<String>,

    /// The number of features per `GetFeature` request.
    pub chunk_size: usize,

    /// How `GetFeature` requests are retried.
    pub retry: RetryPolicy,

    /// The HTTP client options.
    pub http: HttpOptions,
}

/// Options for [WmsClient](crate::ogc::WmsClient).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WmsOptions {
    /// The WMS version to request.
    pub version: String,

    /// Layers to hide, even though the service advertises them.
    pub ignore_layers: Vec<String>,

    /// The HTTP client options.
    pub http: HttpOptions,
}

impl HttpOptions {
    /// Builds a blocking HTTP client.
    pub fn client(&self) -> Result<reqwest::blocking::Client> {
        let mut builder = reqwest::blocking::Client::builder().user_agent(&self.user_agent);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;
        Ok(client)
    }
}

impl Default for HttpOptions {
    fn default() -> Self {
        HttpOptions {
            timeout: Some(DEFAULT_TIMEOUT),
            user_agent: crate::user_agent().to_string(),
        }
    }
}

impl WfsOptions {
    /// Ignores these layers.
    pub fn ignore_layers(mut self, layers: impl IntoIterator<Item = impl ToString>) -> WfsOptions {
        self.ignore_layers = layers.into_iter().map(|layer| layer.to_string()).collect();
        self
    }

    /// Sets the number of features per request.
    pub fn chunk_size(mut self, chunk_size: usize) -> WfsOptions {
        self.chunk_size = chunk_size;
        self
    }

    /// Sets the retry policy.
    pub fn retry(mut self, retry: RetryPolicy) -> WfsOptions {
        self.retry = retry;
        self
    }
}

impl Default for WfsOptions {
    fn default() -> Self {
        WfsOptions {
            version: DEFAULT_WFS_VERSION.to_string(),
            ignore_layers: Vec::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            retry: RetryPolicy::default(),
            http: HttpOptions::default(),
        }
    }
}

impl WmsOptions {
    /// Ignores these layers.
    pub fn ignore_layers(mut self, layers: impl IntoIterator<Item = impl ToString>) -> WmsOptions {
        self.ignore_layers = layers.into_iter().map(|layer| layer.to_string()).collect();
        self
    }
}

impl Default for WmsOptions {
    fn default() -> Self {
        WmsOptions {
            version: DEFAULT_WMS_VERSION.to_string(),
            ignore_layers: Vec::new(),
            http: HttpOptions::default(),
        }
    }
}
