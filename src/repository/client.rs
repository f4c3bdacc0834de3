// src/repository/client.rs

//! HTTP client for repository operations
//!
//! Wraps a blocking reqwest client for fetching manifests, downloading
//! database artifacts and querying the branch catalog. Retrying is left to
//! the synchronizer, which retries whole sources rather than single requests.

use crate::error::{Error, Result};
use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// What the synchronizer needs from the network
pub trait Fetch: Send + Sync {
    /// Body of `url` as text
    fn fetch_text(&self, url: &str) -> Result<String>;

    /// Stream `url` into `dest`, returning the number of bytes written
    fn download(&self, url: &str, dest: &Path) -> Result<u64>;
}

/// HTTP client wrapper
pub struct RepositoryClient {
    client: Client,
}

impl RepositoryClient {
    /// Create a new repository client
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("mdapi/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Download(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }

    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<Response> {
        let response = self.client.get(url).query(query).send()?;
        if !response.status().is_success() {
            return Err(Error::Http {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }

    /// GET `url` with query parameters and decode the JSON body
    pub fn fetch_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T> {
        debug!("Fetching {} {:?}", url, query);
        let body = self.get(url, query)?.text()?;
        Ok(serde_json::from_str(&body)?)
    }
}

impl Fetch for RepositoryClient {
    fn fetch_text(&self, url: &str) -> Result<String> {
        debug!("Fetching {}", url);
        Ok(self.get(url, &[])?.text()?)
    }

    fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        info!("Downloading {} to {}", url, dest.display());

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut response = self.get(url, &[])?;
        let mut file = BufWriter::new(File::create(dest)?);
        let written = io::copy(&mut response, &mut file)
            .map_err(|e| Error::Download(format!("Failed to read response from {url}: {e}")))?;
        file.flush()?;

        debug!("Downloaded {} bytes", written);
        Ok(written)
    }
}
