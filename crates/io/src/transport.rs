use crate::{Error, Result};
use url::Url;

/// Something that can GET a url and return the body.
///
/// The services in this crate only ever read text (JSON or XML).
pub trait Transport {
    /// Gets a url, returning the body of a successful response.
    fn get(&self, url: &Url) -> Result<String>;
}

impl Transport for reqwest::blocking::Client {
    fn get(&self, url: &Url) -> Result<String> {
        tracing::trace!("GET {url}");
        let response = reqwest::blocking::Client::get(self, url.clone()).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                url: url.to_string(),
                status,
            });
        }
        let text = response.text()?;
        Ok(text)
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(&self, url: &Url) -> Result<String> {
        (**self).get(url)
    }
}

/// Parses a url handed to us by the caller.
pub(crate) fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|source| Error::InvalidUrl {
        url: url.to_string(),
        source,
    })
}
