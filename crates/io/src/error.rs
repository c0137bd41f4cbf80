use pdssp::ErrorKind;
use reqwest::StatusCode;
use thiserror::Error;

/// Crate-specific error enum
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// [geojson::Error]
    #[error(transparent)]
    Geojson(#[from] Box<geojson::Error>),

    /// A url passed in by the caller does not parse.
    #[error("invalid url {url}: {source}")]
    InvalidUrl {
        /// The url as given.
        url: String,

        /// The parse error.
        #[source]
        source: url::ParseError,
    },

    /// The service does not advertise this layer, or it is ignored.
    #[error("layer {0} does not exist")]
    LayerNotFound(String),

    /// A response lacks a field we need.
    #[error("no \"{0}\" field in the response")]
    MissingField(&'static str),

    /// [pdssp::Error]
    #[error(transparent)]
    Pdssp(#[from] pdssp::Error),

    /// [reqwest::Error]
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    /// A request kept failing after every retry.
    #[error("request failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// The number of attempts made.
        attempts: usize,

        /// The last error.
        #[source]
        source: Box<Error>,
    },

    /// [serde_json::Error]
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    /// The service answered with an error status.
    #[error("{url} returned {status}")]
    Status {
        /// The requested url.
        url: String,

        /// The status code.
        status: StatusCode,
    },

    /// [url::ParseError], for urls read from a response (e.g. a `next` link)
    #[error(transparent)]
    UrlParse(#[from] url::ParseError),

    /// [roxmltree::Error]
    #[error(transparent)]
    Xml(#[from] roxmltree::Error),
}

impl Error {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Reqwest(err) if err.is_decode() => ErrorKind::MalformedResponse,
            Error::Reqwest(_) | Error::RetriesExhausted { .. } | Error::Status { .. } => {
                ErrorKind::Network
            }
            Error::Geojson(_)
            | Error::MissingField(_)
            | Error::SerdeJson(_)
            | Error::UrlParse(_)
            | Error::Xml(_) => ErrorKind::MalformedResponse,
            Error::InvalidUrl { .. } => ErrorKind::InvalidInput,
            Error::LayerNotFound(_) => ErrorKind::UnknownResource,
            Error::Pdssp(err) => err.kind(),
        }
    }

    /// Returns true if retrying the request might succeed, i.e. the request
    /// timed out or could not connect.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Reqwest(err) => err.is_timeout() || err.is_connect(),
            _ => false,
        }
    }
}

impl From<geojson::Error> for Error {
    fn from(error: geojson::Error) -> Error {
        Error::Geojson(Box::new(error))
    }
}
