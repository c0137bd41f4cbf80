use thiserror::Error;

/// Error enum for crate-specific errors.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// [cql2::Error]
    #[error(transparent)]
    Cql2(#[from] cql2::Error),

    /// [geojson::Error]
    #[error(transparent)]
    Geojson(#[from] Box<geojson::Error>),

    /// The filter parsed, but is not a boolean predicate (e.g. a bare
    /// property, or a property used as an operand of `AND`).
    #[error("not a boolean filter expression: {0}")]
    InvalidFilter(String),

    /// Returned when a required field is missing, e.g. the `layers` query
    /// parameter of a heatmap link.
    #[error("no \"{0}\" field")]
    MissingField(&'static str),

    /// The table has no index column, but the operation needs one.
    #[error("the table has no index column")]
    NoIndex,

    /// This is not a JSON object.
    #[error("json value is not an object")]
    NotAnObject(serde_json::Value),

    /// A row position is past the end of the table.
    #[error("row {position} is out of bounds for a table of {len} rows")]
    RowOutOfBounds {
        /// The requested position.
        position: usize,

        /// The number of rows in the table.
        len: usize,
    },

    /// [serde_json::Error]
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    /// The planetary body is not supported.
    #[error("unsupported body: {0}")]
    UnsupportedBody(String),

    /// [url::ParseError]
    #[error(transparent)]
    UrlParse(#[from] url::ParseError),
}

/// The broad class of an error, so callers can decide whether to retry, abort,
/// or report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The network failed, or the service answered with an error status.
    Network,

    /// The service answered, but the response is not what we expected.
    MalformedResponse,

    /// A named resource (e.g. a layer) does not exist.
    UnknownResource,

    /// The request asked for something that is not implemented.
    Unsupported,

    /// The caller handed us something invalid (a bad filter, a bad row).
    InvalidInput,
}

impl Error {
    /// Returns the kind of this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdssp::{Error, ErrorKind};
    ///
    /// let error = Error::UnsupportedBody("VENUS".to_string());
    /// assert_eq!(error.kind(), ErrorKind::Unsupported);
    /// ```
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Cql2(_)
            | Error::InvalidFilter(_)
            | Error::NoIndex
            | Error::RowOutOfBounds { .. } => ErrorKind::InvalidInput,
            Error::Geojson(_)
            | Error::MissingField(_)
            | Error::NotAnObject(_)
            | Error::SerdeJson(_)
            | Error::UrlParse(_) => ErrorKind::MalformedResponse,
            Error::UnsupportedBody(_) => ErrorKind::Unsupported,
        }
    }
}

impl From<geojson::Error> for Error {
    fn from(error: geojson::Error) -> Error {
        Error::Geojson(Box::new(error))
    }
}
