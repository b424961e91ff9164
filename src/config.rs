//! Service endpoints and transfer settings, read from a TOML file.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

/// Largest page CMR accepts for umm_json searches.
pub const MAX_PAGE_SIZE: usize = 2000;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cmr_url: String,
    pub urs_url: String,
    pub s3_credentials_url: String,
    pub provider: String,
    pub download_dir: PathBuf,
    pub chunk_size: usize,
    pub page_size: usize,
    pub user_agent: String,
    /// Domains whose hosts, and their subdomains, receive the Earthdata token.
    pub trusted_domains: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cmr_url: "https://cmr.earthdata.nasa.gov".to_string(),
            urs_url: "https://urs.earthdata.nasa.gov".to_string(),
            s3_credentials_url: "https://data.lpdaac.earthdatacloud.nasa.gov/s3credentials"
                .to_string(),
            provider: "LPCLOUD".to_string(),
            download_dir: default_download_dir(),
            chunk_size: 1024 * 1024,
            page_size: 200,
            user_agent: format!("emit-access/{}", env!("CARGO_PKG_VERSION")),
            trusted_domains: vec![
                "earthdata.nasa.gov".to_string(),
                "earthdatacloud.nasa.gov".to_string(),
            ],
        }
    }
}

impl Config {
    /// Loads the config from `path`, or from the default location if none is given.
    ///
    /// A missing file at the default location is not an error, an explicitly
    /// requested one is.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Config::default(),
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file `{}`", path.display()))?;
        Self::from_toml(&text)
            .with_context(|| format!("Failed to parse config file `{}`", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(anyhow!("chunk_size must be greater than zero"));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(anyhow!(
                "page_size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE,
                self.page_size
            ));
        }

        Ok(())
    }

    /// Host name used to look up Earthdata Login entries in a netrc file.
    pub fn urs_host(&self) -> &str {
        let without_scheme = self
            .urs_url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.urs_url);

        without_scheme
            .split(['/', ':'])
            .next()
            .unwrap_or(without_scheme)
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("emit-access").join("config.toml"))
}

fn default_download_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join("emit"))
        .unwrap_or_else(|| PathBuf::from("emit"))
}

// -- Tests -------------------------------------------------------------------
