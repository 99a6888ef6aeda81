use std::path::PathBuf;

/// Configuration loading failures. These are the only errors the engine's
/// public surface lets escape; everything network-related is folded into
/// probe outcomes instead.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },
    #[error("failed to parse {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("no usable configuration directory (set XDG_CONFIG_HOME or HOME)")]
    ConfigPathUnavailable,
}

/// Cache persistence failures
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("failed to read cache {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to write cache {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },
    #[error("cache {path} is not valid JSON: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
    #[error("no usable configuration directory (set XDG_CONFIG_HOME or HOME)")]
    CachePathUnavailable,
}
