use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};

use self::likes::LikesConfig;

pub mod likes;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub likes: LikesConfig,
}

impl Config {
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conf_contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&conf_contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }
}

fn deserialize_directory<'de, D>(deserializer: D) -> Result<PathBuf, D::Error>
where
    D: Deserializer<'de>,
{
    let s: PathBuf = Deserialize::deserialize(deserializer)?;
    expand_home(s).map_err(serde::de::Error::custom)
}

fn deserialize_optional_directory<'de, D>(deserializer: D) -> Result<Option<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<PathBuf> = Deserialize::deserialize(deserializer)?;
    s.map(expand_home)
        .transpose()
        .map_err(serde::de::Error::custom)
}

#[cfg(unix)]
fn expand_home(path: PathBuf) -> Result<PathBuf, String> {
    use home_dir::HomeDirExt;
    path.expand_home().map_err(|e| e.to_string())
}

#[cfg(not(unix))]
fn expand_home(path: PathBuf) -> Result<PathBuf, String> {
    Ok(path)
}
