//! Remote archive data service
//!
//! Files are addressed by name directly below the data URL, e.g.
//! `<base>/s4d20130401_00001_0002`. Names carry no path and no suffix.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::{Client, Response};
use reqwest::header::HeaderMap;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{ClientError, Result};
use crate::{check_status, client_with_certificate, join_url};

/// Public JCMT data endpoint
pub const JCMT_DATA_URL: &str = "https://www.cadc-ccda.hia-iha.nrc-cnrc.gc.ca/data/pub/JCMT/";

/// Suffix given to downloaded raw data files
pub const DEFAULT_SUFFIX: &str = ".sdf";

/// Download interface used by the data acquisition pipeline
#[async_trait]
pub trait RemoteArchive: Send + Sync {
    /// Download `filename` into `directory`, returning the local path
    async fn fetch(&self, filename: &str, directory: &Path) -> jsaproc_core::Result<PathBuf>;
}

/// HTTP client for the archive data service
#[derive(Debug, Clone)]
pub struct ArchiveClient {
    base_url: String,
    client: Client,
}

impl ArchiveClient {
    /// Create a client without a client certificate
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a client which authenticates with a PEM certificate
    pub fn with_certificate(base_url: impl Into<String>, cert: &Path) -> Result<Self> {
        Ok(Self::with_client(base_url, client_with_certificate(cert)?))
    }

    /// Create a client with a custom HTTP client
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn file_url(&self, filename: &str) -> String {
        join_url(&self.base_url, filename)
    }

    /// Download a file, streaming the body to `directory/<filename><suffix>`
    ///
    /// The archive decompresses on the fly, so the suffix never includes a
    /// compression extension.
    pub async fn fetch_file(
        &self,
        filename: &str,
        directory: &Path,
        suffix: &str,
    ) -> Result<PathBuf> {
        let path = directory.join(format!("{}{}", filename, suffix));
        debug!("Fetching {} to {}", filename, path.display());

        let response = self.client.get(self.file_url(filename)).send().await?;
        let response = check_status(response).await?;

        // A partial download must not be mistaken for a cached input file.
        if let Err(err) = write_body(response, &path).await {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(err);
        }

        Ok(path)
    }

    /// Headers describing a file, or `None` if the archive does not have it
    pub async fn file_info(&self, filename: &str) -> Result<Option<HeaderMap>> {
        let response = self.client.head(self.file_url(filename)).send().await?;

        if response.status().as_u16() == 404 {
            return Ok(None);
        }

        let response = check_status(response).await?;
        Ok(Some(response.headers().clone()))
    }

    /// Check each file individually with a HEAD request
    ///
    /// Returns one flag per input name, in order.
    pub async fn check_files(&self, filenames: &[String]) -> Result<Vec<bool>> {
        let mut present = Vec::with_capacity(filenames.len());

        for filename in filenames {
            present.push(self.file_info(filename).await?.is_some());
        }

        Ok(present)
    }

    /// Upload `directory/<filename>` into the given archive stream
    ///
    /// Only 200 and 201 count as success.
    pub async fn put_file(&self, filename: &str, directory: &Path, stream: &str) -> Result<()> {
        let body = tokio::fs::read(directory.join(filename)).await?;

        let response = self
            .client
            .put(self.file_url(filename))
            .header("X-CADC-Stream", stream)
            .body(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let response = check_status(response).await?;

        match status {
            200 | 201 => Ok(()),
            _ => {
                let text = response.text().await.unwrap_or_default();
                Err(ClientError::api_error(
                    status,
                    format!("Putting file gave bad status: {}", text),
                ))
            }
        }
    }
}

async fn write_body(mut response: Response, path: &Path) -> Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(())
}

#[async_trait]
impl RemoteArchive for ArchiveClient {
    async fn fetch(&self, filename: &str, directory: &Path) -> jsaproc_core::Result<PathBuf> {
        Ok(self.fetch_file(filename, directory, DEFAULT_SUFFIX).await?)
    }
}
