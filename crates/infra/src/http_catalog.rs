//! HTTP implementation of the catalog lookup port.

use async_trait::async_trait;

use crate::catalog::{CatalogLookup, LookupError};

/// Catalog lookup over the catalog service's REST API.
///
/// `GET {base_url}/products/barcode/{barcode}`: a 2xx answer means the
/// barcode exists, 404 means it does not (a successful negative), anything
/// else is a lookup failure.
pub struct HttpCatalog {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpCatalog {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            client: reqwest::Client::new(),
        }
    }

    /// Attach a bearer token for authenticated catalog endpoints.
    pub fn with_token(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: Some(token.into()),
            client: reqwest::Client::new(),
        }
    }

    fn barcode_url(&self, barcode: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        format!("{base}/products/barcode/{barcode}")
    }
}

#[async_trait]
impl CatalogLookup for HttpCatalog {
    async fn check_exists(&self, barcode: &str) -> Result<bool, LookupError> {
        let mut req = self.client.get(self.barcode_url(barcode));
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| LookupError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(true);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }

        tracing::warn!(%status, barcode, "catalog lookup failed");
        Err(LookupError::Status(status.as_u16()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn barcode_url_joins_base_and_path() {
        let catalog = HttpCatalog::new("http://localhost:8080");
        assert_eq!(
            catalog.barcode_url("SKU1"),
            "http://localhost:8080/products/barcode/SKU1"
        );
    }

    #[test]
    fn trailing_slash_in_base_url_is_tolerated() {
        let catalog = HttpCatalog::new("http://localhost:8080/");
        assert_eq!(
            catalog.barcode_url("SKU1"),
            "http://localhost:8080/products/barcode/SKU1"
        );
    }
}
