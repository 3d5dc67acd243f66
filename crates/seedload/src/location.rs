//! Source locations and content fetching
//!
//! A location is written as a string in the sources file and manifests:
//!
//! - `classpath:db/reference` is resolved against the resource root
//! - `file:///srv/data` and plain paths are read from the filesystem
//! - `http://` and `https://` URLs are fetched with a shared HTTP client

use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::{LoaderError, LoaderResult};

pub const CLASSPATH_PREFIX: &str = "classpath:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Bundled resource under the resource root
    Resource(PathBuf),
    File(PathBuf),
    Remote(Url),
}

impl Location {
    pub fn parse(raw: &str, resource_root: &Path) -> LoaderResult<Self> {
        if let Some(rest) = raw.strip_prefix(CLASSPATH_PREFIX) {
            return Ok(Self::Resource(resource_root.join(rest.trim_start_matches('/'))));
        }
        if raw.starts_with("http://") || raw.starts_with("https://") {
            let url = Url::parse(raw)
                .map_err(|e| LoaderError::config(format!("Invalid URL '{}': {}", raw, e)))?;
            return Ok(Self::Remote(url));
        }
        if raw.starts_with("file:") {
            let path = Url::parse(raw)
                .ok()
                .and_then(|url| url.to_file_path().ok())
                .ok_or_else(|| LoaderError::config(format!("Invalid file URL '{}'", raw)))?;
            return Ok(Self::File(path));
        }
        Ok(Self::File(PathBuf::from(raw)))
    }

    pub fn is_resource(&self) -> bool {
        matches!(self, Self::Resource(_))
    }
}

/// Join a file name onto a configured location string
pub fn join(base: &str, file: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), file.trim_start_matches('/'))
}

/// Reads content from any supported location
#[derive(Debug, Clone)]
pub struct Fetcher {
    resource_root: PathBuf,
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new(resource_root: impl Into<PathBuf>, timeout: Duration) -> LoaderResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("seedload/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LoaderError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            resource_root: resource_root.into(),
            client,
        })
    }

    pub fn resource_root(&self) -> &Path {
        &self.resource_root
    }

    pub fn locate(&self, raw: &str) -> LoaderResult<Location> {
        Location::parse(raw, &self.resource_root)
    }

    /// Fetch the full content at a location string
    pub async fn fetch(&self, raw: &str) -> LoaderResult<Vec<u8>> {
        match self.locate(raw)? {
            Location::Resource(path) | Location::File(path) => {
                debug!(location = raw, path = %path.display(), "Reading file");
                tokio::fs::read(&path).await.map_err(|cause| LoaderError::Read {
                    location: raw.to_string(),
                    cause,
                })
            }
            Location::Remote(url) => {
                debug!(%url, "Fetching remote content");
                let http_err = |cause| LoaderError::Http {
                    url: raw.to_string(),
                    cause,
                };
                let response = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .and_then(reqwest::Response::error_for_status)
                    .map_err(http_err)?;
                let bytes = response.bytes().await.map_err(http_err)?;
                Ok(bytes.to_vec())
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_classpath_resolves_against_root() {
        let loc = Location::parse("classpath:db/reference", Path::new("/app/resources")).unwrap();
        assert_eq!(loc, Location::Resource(PathBuf::from("/app/resources/db/reference")));
        assert!(loc.is_resource());

        let leading_slash = Location::parse("classpath:/db/x", Path::new("res")).unwrap();
        assert_eq!(leading_slash, Location::Resource(PathBuf::from("res/db/x")));
    }

    #[test]
    fn test_file_and_remote_locations() {
        let root = Path::new("res");
        assert_eq!(
            Location::parse("file:///srv/data", root).unwrap(),
            Location::File(PathBuf::from("/srv/data"))
        );
        assert_eq!(
            Location::parse("data/seed", root).unwrap(),
            Location::File(PathBuf::from("data/seed"))
        );
        assert!(matches!(
            Location::parse("https://example.org/seed", root).unwrap(),
            Location::Remote(url) if url.host_str() == Some("example.org")
        ));
        assert!(!Location::parse("data/seed", root).unwrap().is_resource());
    }

    #[test]
    fn test_join() {
        assert_eq!(join("classpath:db/ref", "carriers.csv"), "classpath:db/ref/carriers.csv");
        assert_eq!(join("classpath:db/ref/", "/carriers.csv"), "classpath:db/ref/carriers.csv");
    }

    #[tokio::test]
    async fn test_fetch_missing_file_names_location() {
        let fetcher = Fetcher::new("does-not-exist", Duration::from_secs(1)).unwrap();
        let err = fetcher.fetch("classpath:db/none.csv").await.unwrap_err();
        assert!(err.to_string().contains("classpath:db/none.csv"));
        assert!(!err.is_configuration());
    }
}
