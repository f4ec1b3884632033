use std::sync::Arc;

use shared::{
    domain::ItemId,
    protocol::{ItemDetailResponse, SpeciesResponse},
};
use tracing::{info, warn};

use crate::{
    config::ClientSettings,
    error::DetailError,
    mapping::{capitalize_first, image_url},
    DetailSource,
};

const FLAVOR_TEXT_LANGUAGE: &str = "en";
const MISSING_FLAVOR_TEXT: &str = "No description";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbilitySummary {
    pub name: String,
    pub is_hidden: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatLine {
    pub name: String,
    pub abbreviation: &'static str,
    pub base_value: u32,
    /// `base_value` relative to the item's highest stat, in `0.0..=1.0`.
    pub fill_ratio: f32,
}

/// Everything the detail screen shows for one item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemProfile {
    pub id: ItemId,
    pub display_name: String,
    pub display_number: String,
    pub image_url: String,
    pub types: Vec<String>,
    pub abilities: Vec<AbilitySummary>,
    pub height_m: f32,
    pub weight_kg: f32,
    pub base_experience: Option<u32>,
    pub stats: Vec<StatLine>,
    pub flavor_text: String,
}

impl ItemProfile {
    pub fn build(
        detail: &ItemDetailResponse,
        species: &SpeciesResponse,
        image_url_base: &str,
    ) -> Self {
        let id = ItemId(detail.id);

        let mut types: Vec<_> = detail.types.iter().collect();
        types.sort_by_key(|t| t.slot);
        let mut abilities: Vec<_> = detail.abilities.iter().collect();
        abilities.sort_by_key(|a| a.slot);

        let max_stat = detail.stats.iter().map(|s| s.base_stat).max().unwrap_or(0);
        let stats = detail
            .stats
            .iter()
            .map(|s| StatLine {
                name: s.stat.name.clone(),
                abbreviation: stat_abbreviation(&s.stat.name),
                base_value: s.base_stat,
                fill_ratio: fill_ratio(s.base_stat, max_stat),
            })
            .collect();

        Self {
            id,
            display_name: capitalize_first(&detail.name),
            display_number: format!("#{:03}", id.0),
            image_url: image_url(image_url_base, id),
            types: types.into_iter().map(|t| t.kind.name.clone()).collect(),
            abilities: abilities
                .into_iter()
                .map(|a| AbilitySummary {
                    name: a.ability.name.clone(),
                    is_hidden: a.is_hidden,
                })
                .collect(),
            // The API reports decimetres and hectograms.
            height_m: detail.height as f32 / 10.0,
            weight_kg: detail.weight as f32 / 10.0,
            base_experience: detail.base_experience,
            stats,
            flavor_text: flavor_text(species),
        }
    }
}

pub fn stat_abbreviation(stat_name: &str) -> &'static str {
    match stat_name.to_ascii_lowercase().as_str() {
        "hp" => "HP",
        "attack" => "Atk",
        "defense" => "Def",
        "special-attack" => "SpAtk",
        "special-defense" => "SpDef",
        "speed" => "Spd",
        _ => "",
    }
}

fn fill_ratio(value: u32, max: u32) -> f32 {
    if max == 0 {
        return 0.0;
    }
    (value as f32 / max as f32).clamp(0.0, 1.0)
}

/// First English entry with its hard line breaks flattened.
pub fn flavor_text(species: &SpeciesResponse) -> String {
    species
        .flavor_text_entries
        .iter()
        .find(|entry| entry.language.name == FLAVOR_TEXT_LANGUAGE)
        .map(|entry| entry.flavor_text.replace(['\n', '\u{c}'], " "))
        .unwrap_or_else(|| MISSING_FLAVOR_TEXT.to_string())
}

pub struct DetailLoader {
    source: Arc<dyn DetailSource>,
    image_url_base: String,
}

impl DetailLoader {
    pub fn new(source: Arc<dyn DetailSource>, settings: &ClientSettings) -> Self {
        Self {
            source,
            image_url_base: settings.image_url_base.clone(),
        }
    }

    /// Fetches detail and species concurrently; both must succeed.
    pub async fn load(&self, name: &str) -> Result<ItemProfile, DetailError> {
        let key = name.trim().to_lowercase();
        let (detail, species) = futures::join!(
            self.source.fetch_item_detail(&key),
            self.source.fetch_species(&key)
        );

        let detail = detail.map_err(|err| fetch_failed("item detail", &key, err))?;
        let species = species.map_err(|err| fetch_failed("species info", &key, err))?;

        let profile = ItemProfile::build(&detail, &species, &self.image_url_base);
        info!(name = %key, id = profile.id.0, "item profile loaded");
        Ok(profile)
    }
}

fn fetch_failed(resource: &'static str, name: &str, err: anyhow::Error) -> DetailError {
    let error = DetailError::FetchFailed {
        resource,
        name: name.to_string(),
        message: format!("{err:#}"),
    };
    warn!(%error, "detail fetch failed");
    error
}

#[cfg(test)]
#[path = "tests/detail_tests.rs"]
mod tests;
