//! Remote file catalog

use reqwest::Client;
use tracing::debug;

use crate::error::Result;
use crate::{check_status, client_with_certificate};

/// JCMT file information service
pub const JCMT_INFO_URL: &str = "http://www.cadc-ccda.hia-iha.nrc-cnrc.gc.ca/cadcbin/jcmtInfo";

/// HTTP client for the catalog's wildcard file query
#[derive(Debug, Clone)]
pub struct CatalogClient {
    url: String,
    client: Client,
}

impl CatalogClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(url, Client::new())
    }

    pub fn with_certificate(url: impl Into<String>, cert: &std::path::Path) -> Result<Self> {
        Ok(Self::with_client(url, client_with_certificate(cert)?))
    }

    pub fn with_client(url: impl Into<String>, client: Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// List the archive filenames matching a `%` wildcard pattern
    ///
    /// Names are returned without their extension.
    pub async fn files_by_pattern(&self, pattern: &str) -> Result<Vec<String>> {
        debug!("Querying catalog for {}", pattern);

        let response = self
            .client
            .get(&self.url)
            .query(&[("file", pattern)])
            .send()
            .await?;
        let response = check_status(response).await?;

        let body = response.bytes().await?;
        Ok(parse_file_list(&decode_latin1(&body)))
    }
}

/// Decode ISO-8859-1 bytes, which map one-to-one onto the first 256 code points
fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

fn parse_file_list(text: &str) -> Vec<String> {
    text.trim()
        .split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file_list() {
        let files = parse_file_list("\ns4a20200101_00001_0001\ns4a20200101_00001_0002\n\n");
        assert_eq!(
            files,
            vec!["s4a20200101_00001_0001", "s4a20200101_00001_0002"]
        );
        assert!(parse_file_list("  \n").is_empty());
    }

    #[test]
    fn test_decode_latin1() {
        assert_eq!(decode_latin1(b"abc"), "abc");
        assert_eq!(decode_latin1(&[0x63, 0x61, 0x66, 0xe9]), "caf\u{e9}");
    }

    #[test]
    fn test_client_url() {
        let client = CatalogClient::new(JCMT_INFO_URL);
        assert_eq!(client.url(), JCMT_INFO_URL);
    }
}
