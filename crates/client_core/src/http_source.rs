use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use shared::protocol::{ItemDetailResponse, PageResponse, SpeciesResponse};
use tracing::debug;
use url::Url;

use crate::{config::parse_base_url, error::ConfigError, DetailSource, PageSource};

const LIST_COLLECTION: &str = "pokemon";
const SPECIES_COLLECTION: &str = "pokemon-species";

#[derive(Serialize)]
struct PageQuery {
    limit: u32,
    offset: u32,
}

/// Catalog source backed by the public REST API.
pub struct HttpCatalogSource {
    http: Client,
    api_base: Url,
}

impl HttpCatalogSource {
    pub fn new(api_base_url: &str) -> Result<Self, ConfigError> {
        Self::with_client(Client::new(), api_base_url)
    }

    pub fn with_client(http: Client, api_base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            http,
            api_base: parse_base_url(api_base_url)?,
        })
    }

    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("api base url '{}' cannot be a base", self.api_base))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T, Q>(&self, url: Url, query: Option<&Q>, what: &str) -> Result<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let mut request = self.http.get(url.clone());
        if let Some(query) = query {
            request = request.query(query);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("failed to request {what} from {url}"))?
            .error_for_status()
            .with_context(|| format!("{what} request to {url} was rejected"))?;

        response
            .json()
            .await
            .with_context(|| format!("failed to decode {what} from {url}"))
    }
}

#[async_trait]
impl PageSource for HttpCatalogSource {
    async fn fetch_page(&self, limit: u32, offset: u32) -> Result<PageResponse> {
        let url = self.endpoint(&[LIST_COLLECTION])?;
        let page: PageResponse = self
            .get_json(url, Some(&PageQuery { limit, offset }), "catalog page")
            .await?;
        debug!(
            limit,
            offset,
            count = page.count,
            entries = page.results.len(),
            "fetched catalog page"
        );
        Ok(page)
    }
}

#[async_trait]
impl DetailSource for HttpCatalogSource {
    async fn fetch_item_detail(&self, name: &str) -> Result<ItemDetailResponse> {
        let url = self.endpoint(&[LIST_COLLECTION, name])?;
        self.get_json::<_, PageQuery>(url, None, "item detail").await
    }

    async fn fetch_species(&self, name: &str) -> Result<SpeciesResponse> {
        let url = self.endpoint(&[SPECIES_COLLECTION, name])?;
        self.get_json::<_, PageQuery>(url, None, "species info").await
    }
}

#[cfg(test)]
#[path = "tests/http_source_tests.rs"]
mod tests;
