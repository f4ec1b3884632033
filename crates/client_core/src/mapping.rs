use shared::{
    domain::{CatalogItem, ItemId},
    protocol::NamedResource,
};
use tracing::warn;

use crate::error::MappingError;

/// Items mapped from one page, plus the entries that had to be dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappedPage {
    pub items: Vec<CatalogItem>,
    pub malformed: Vec<MappingError>,
}

/// Parses the last non-empty path segment of `reference` as a positive id.
pub fn parse_item_id(reference: &str) -> Option<ItemId> {
    let segment = reference.split('/').rev().find(|s| !s.is_empty())?;
    match segment.parse::<u32>() {
        Ok(0) | Err(_) => None,
        Ok(id) => Some(ItemId(id)),
    }
}

pub fn capitalize_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn image_url(image_url_base: &str, id: ItemId) -> String {
    format!("{image_url_base}{}.png", id.0)
}

pub fn map_entry(entry: &NamedResource, image_url_base: &str) -> Result<CatalogItem, MappingError> {
    let id = parse_item_id(&entry.url).ok_or_else(|| MappingError::MalformedEntry {
        name: entry.name.clone(),
        reference: entry.url.clone(),
    })?;

    Ok(CatalogItem::new(
        id,
        capitalize_first(&entry.name),
        image_url(image_url_base, id),
    ))
}

/// Malformed entries are skipped; the rest of the page keeps server order.
pub fn map_page(entries: &[NamedResource], image_url_base: &str) -> MappedPage {
    let mut page = MappedPage::default();
    for entry in entries {
        match map_entry(entry, image_url_base) {
            Ok(item) => page.items.push(item),
            Err(err) => {
                warn!(error = %err, "skipping malformed catalog entry");
                page.malformed.push(err);
            }
        }
    }
    page
}
