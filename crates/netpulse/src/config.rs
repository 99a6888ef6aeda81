use std::time::Duration;
use std::{env, fmt, fs, path};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Engine tunables, loaded from a TOML file once at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub probes: Probes,
    pub retry: Retry,
    pub http: Http,
    pub dns: Dns,
    pub whois: Whois,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Probes {
    /// Upper bound on in-flight probes across all families
    pub concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Retry {
    pub delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Http {
    /// Some CDN edges answer bot user agents differently, so requests
    /// present a browser one.
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Dns {
    /// Domain whose A record is queried through each resolver under test
    pub reference_domain: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Whois {
    pub binary: String,
}

impl Default for Probes {
    fn default() -> Self {
        Self { concurrency: 8 }
    }
}

impl Default for Retry {
    fn default() -> Self {
        Self { delay_secs: 5 }
    }
}

impl Default for Http {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/100.0.4896.127 Safari/537.36"
                .to_string(),
        }
    }
}

impl Default for Dns {
    fn default() -> Self {
        Self { reference_domain: "example.com".to_string() }
    }
}

impl Default for Whois {
    fn default() -> Self {
        Self { binary: "whois".to_string() }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            probes: Probes::default(),
            retry: Retry::default(),
            http: Http::default(),
            dns: Dns::default(),
            whois: Whois::default(),
        }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/netpulse/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::ConfigPathUnavailable);
    };

    Ok(path.join("netpulse/config.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Current Internal Configuration State:")?;
        writeln!(f, "  Probes")?;
        writeln!(f, "    Concurrency: {}", self.probes.concurrency)?;
        writeln!(f, "  Retry")?;
        writeln!(f, "    Delay (s): {}", self.retry.delay_secs)?;
        writeln!(f, "  HTTP")?;
        writeln!(f, "    User Agent: {}", self.http.user_agent)?;
        writeln!(f, "  DNS")?;
        writeln!(f, "    Reference Domain: {}", self.dns.reference_domain)?;
        writeln!(f, "  WHOIS")?;
        writeln!(f, "    Binary: {}", self.whois.binary)?;
        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/netpulse/config.toml or the
    /// specified path, with the name config.toml, if one does not exist
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| ConfigError::Read { path: config_path.clone(), source })?;
            toml::from_str(raw_string.as_str())
                .map_err(|source| ConfigError::Parse { path: config_path, source })
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), ConfigError> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| ConfigError::Write { path: path.to_path_buf(), source })?;
        }

        fs::write(path, config_str)
            .map_err(|source| ConfigError::Write { path: path.to_path_buf(), source })
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry.delay_secs)
    }
}
