/*
 * zotero.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Fetches CSL-JSON records from the Zotero web API.
 */

use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::records::{Credentials, Library, RecordSource};

pub const DEFAULT_API_URL: &str = "https://api.zotero.org";

/// Number of item keys the API accepts per request.
pub const DEFAULT_PAGE_SIZE: usize = 50;

#[derive(Debug, Deserialize)]
struct ItemsPage {
    #[serde(default)]
    items: Vec<Value>,
}

/// Record source backed by the Zotero web API.
///
/// For every page of item keys, one request is sent to every user and group
/// library in the credentials. Responses are flattened in request order.
#[derive(Debug, Clone)]
pub struct ZoteroClient {
    http: reqwest::Client,
    base_url: String,
    page_size: usize,
}

impl Default for ZoteroClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ZoteroClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_API_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// URL of one request: a library and a page of item keys.
    ///
    /// Path segments and query values are percent-encoded.
    pub fn items_url(&self, library: &Library, api_key: &str, ids: &[String]) -> Result<Url> {
        let invalid =
            |reason: &str| Error::Network(format!("invalid API URL {}: {}", self.base_url, reason));
        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(&e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| invalid("cannot be a base"))?
            .pop_if_empty()
            .extend(library.segments())
            .push("items");
        url.query_pairs_mut()
            .append_pair("v", "3")
            .append_pair("format", "csljson")
            .append_pair("key", api_key)
            .append_pair("itemKey", &ids.join(","));
        Ok(url)
    }

    async fn fetch_page(&self, url: Url) -> Result<Vec<Value>> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Network(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Network(format!(
                "bibliographic API returned {}",
                status
            )));
        }

        let page: ItemsPage = response
            .json()
            .await
            .map_err(|e| Error::Network(e.without_url().to_string()))?;
        Ok(page.items)
    }
}

#[async_trait]
impl RecordSource for ZoteroClient {
    async fn fetch(&self, credentials: &Credentials, ids: &[String]) -> Result<Vec<Value>> {
        let libraries = credentials.libraries();
        let urls = ids
            .chunks(self.page_size)
            .flat_map(|page| {
                libraries
                    .iter()
                    .map(move |library| self.items_url(library, &credentials.api_key, page))
            })
            .collect::<Result<Vec<Url>>>()?;

        debug!(requests = urls.len(), ids = ids.len(), "Requesting records");
        let pages = try_join_all(urls.into_iter().map(|url| self.fetch_page(url))).await?;
        Ok(pages.into_iter().flatten().collect())
    }
}
