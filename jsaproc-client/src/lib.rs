//! JSA Archive Clients
//!
//! HTTP clients for the remote data archive and its file catalog, plus the
//! caching availability checker built on top of the catalog.
//!
//! # Example
//!
//! ```no_run
//! use jsaproc_client::{ArchiveClient, AvailabilityCache, CatalogClient};
//!
//! #[tokio::main]
//! async fn main() -> jsaproc_core::Result<()> {
//!     let archive = ArchiveClient::new(jsaproc_client::archive::JCMT_DATA_URL);
//!     let path = archive
//!         .fetch_file("s4a20200101_00001_0001", std::path::Path::new("/tmp"), ".sdf")
//!         .await?;
//!     println!("Downloaded {}", path.display());
//!
//!     let mut cache = AvailabilityCache::new(CatalogClient::new(
//!         jsaproc_client::catalog::JCMT_INFO_URL,
//!     ));
//!     let present = cache.check_files(&["s4a20200101_00001_0001".to_string()]).await?;
//!     println!("At archive: {:?}", present);
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod availability;
pub mod catalog;
pub mod error;

// Re-export commonly used types
pub use archive::{ArchiveClient, RemoteArchive};
pub use availability::{AvailabilityCache, CatalogSource, derive_pattern};
pub use catalog::CatalogClient;
pub use error::{ClientError, Result};

use std::path::Path;

use reqwest::{Client, Identity, Response};

/// Build an HTTP client presenting the given PEM client certificate
///
/// The file must hold both the certificate and its private key.
pub fn client_with_certificate(cert: &Path) -> Result<Client> {
    let pem = std::fs::read(cert)?;
    let identity = Identity::from_pem(&pem)?;

    Ok(Client::builder()
        .use_rustls_tls()
        .identity(identity)
        .build()?)
}

// =============================================================================
// Response Handlers
// =============================================================================

/// Return the response if its status is a success, otherwise an `ApiError`
///
/// The error message carries the reason phrase, the URL and the response
/// body, if any.
pub(crate) async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let reason = status.canonical_reason().unwrap_or("Unknown error");
    let text = response.text().await.unwrap_or_default();

    let message = if text.trim().is_empty() {
        format!("{} for url: {}", reason, url)
    } else {
        format!("{} for url: {}: {}", reason, url, text.trim())
    };

    Err(ClientError::api_error(status.as_u16(), message))
}

/// Join a base URL and a path segment with exactly one slash
pub(crate) fn join_url(base: &str, segment: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        segment.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://a/b/", "c"), "http://a/b/c");
        assert_eq!(join_url("http://a/b", "/c"), "http://a/b/c");
    }

    #[test]
    fn test_missing_certificate_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = client_with_certificate(&dir.path().join("absent.pem")).unwrap_err();
        assert!(matches!(err, ClientError::Io(_)));
    }
}
