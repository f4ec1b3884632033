use std::{fs, io, path::Path};

use serde::Deserialize;
use tracing::warn;
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_API_BASE_URL: &str = "https://pokeapi.co/api/v2/";
pub const DEFAULT_IMAGE_URL_BASE: &str =
    "https://raw.githubusercontent.com/PokeAPI/sprites/master/sprites/pokemon/other/home/";
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const DEFAULT_SETTINGS_FILE: &str = "catalog.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub image_url_base: String,
    pub page_size: u32,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            image_url_base: DEFAULT_IMAGE_URL_BASE.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ClientSettings {
    /// Validates the API base URL and clamps the page size into `1..=MAX_PAGE_SIZE`.
    pub fn normalized(mut self) -> Result<Self, ConfigError> {
        self.api_base_url = parse_base_url(&self.api_base_url)?.to_string();
        self.page_size = self.page_size.clamp(1, MAX_PAGE_SIZE);
        Ok(self)
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_base_url: Option<String>,
    image_url_base: Option<String>,
    page_size: Option<u32>,
}

pub fn load_settings(path: &Path) -> Result<ClientSettings, ConfigError> {
    load_settings_with_env(path, |key| std::env::var(key).ok())
}

/// Reads `path` (a missing file means defaults) and then applies environment
/// overrides resolved through `lookup`.
pub fn load_settings_with_env(
    path: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ClientSettings, ConfigError> {
    let mut settings = ClientSettings::default();

    match fs::read_to_string(path) {
        Ok(raw) => apply_file_settings(&mut settings, &raw, path)?,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.display().to_string(),
                source,
            })
        }
    }

    apply_env_overrides(&mut settings, lookup);
    settings.normalized()
}

fn apply_file_settings(
    settings: &mut ClientSettings,
    raw: &str,
    path: &Path,
) -> Result<(), ConfigError> {
    let file_cfg: FileSettings = toml::from_str(raw).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })?;

    if let Some(v) = file_cfg.api_base_url {
        settings.api_base_url = v;
    }
    if let Some(v) = file_cfg.image_url_base {
        settings.image_url_base = v;
    }
    if let Some(v) = file_cfg.page_size {
        settings.page_size = v;
    }
    Ok(())
}

fn apply_env_overrides(settings: &mut ClientSettings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = last_env(&lookup, &["CATALOG_API_BASE_URL", "APP__API_BASE_URL"]) {
        settings.api_base_url = v;
    }
    if let Some(v) = last_env(&lookup, &["CATALOG_IMAGE_URL_BASE", "APP__IMAGE_URL_BASE"]) {
        settings.image_url_base = v;
    }
    if let Some(v) = last_env(&lookup, &["CATALOG_PAGE_SIZE", "APP__PAGE_SIZE"]) {
        match v.trim().parse::<u32>() {
            Ok(parsed) => settings.page_size = parsed,
            Err(error) => warn!(value = %v, %error, "ignoring unparseable page size override"),
        }
    }
}

// `APP__*` keys are checked last so they win over the plain names.
fn last_env(lookup: &impl Fn(&str) -> Option<String>, keys: &[&str]) -> Option<String> {
    keys.iter().filter_map(|key| lookup(key)).last()
}

/// Parses an absolute base URL, adding the trailing `/` that relative joins need.
pub fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let raw = raw.trim();
    let with_slash = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };

    let url = Url::parse(&with_slash).map_err(|err| ConfigError::InvalidValue {
        key: "api_base_url",
        message: format!("'{raw}': {err}"),
    })?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidValue {
            key: "api_base_url",
            message: format!("'{raw}' cannot be used as a base URL"),
        });
    }

    Ok(url)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
