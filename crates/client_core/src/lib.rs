use anyhow::Result;
use async_trait::async_trait;
use shared::protocol::{ItemDetailResponse, PageResponse, SpeciesResponse};

pub mod config;
pub mod detail;
pub mod error;
pub mod http_source;
pub mod list_controller;
pub mod mapping;
pub mod state;

pub use config::{load_settings, ClientSettings};
pub use detail::{DetailLoader, ItemProfile};
pub use error::{ConfigError, DetailError, ListError, MappingError};
pub use http_source::HttpCatalogSource;
pub use list_controller::{ListController, PageLoad};
pub use state::ListSnapshot;

/// Paged listing of the catalog.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, limit: u32, offset: u32) -> Result<PageResponse>;
}

/// Per-item lookups backing the detail view.
#[async_trait]
pub trait DetailSource: Send + Sync {
    async fn fetch_item_detail(&self, name: &str) -> Result<ItemDetailResponse>;
    async fn fetch_species(&self, name: &str) -> Result<SpeciesResponse>;
}
