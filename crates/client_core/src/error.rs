use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListError {
    #[error("Failed to fetch catalog page {page_index}: {message}")]
    FetchFailed { page_index: u32, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("entry '{name}' has no numeric identifier in reference '{reference}'")]
    MalformedEntry { name: String, reference: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DetailError {
    #[error("Failed to fetch {resource} for '{name}': {message}")]
    FetchFailed {
        resource: &'static str,
        name: String,
        message: String,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid settings file '{path}': {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
}
