use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use libnearby::dedup::DEFAULT_TOLERANCE_METERS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::{
    fs::{File, create_dir_all, read_to_string},
    io::AsyncWriteExt,
};
use tracing::debug;

/// The database used when neither the command line nor the config file name one
pub const DEFAULT_DATABASE: &str = "nearby.sqlite";

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE_METERS
}

#[derive(Deserialize, Serialize, Debug, PartialEq)]
pub struct Config {
    pub database: PathBuf,
    #[serde(default = "default_tolerance")]
    pub dedup_tolerance: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self::new(PathBuf::from(DEFAULT_DATABASE), DEFAULT_TOLERANCE_METERS)
    }
}

impl Config {
    fn parse(contents: String) -> Result<Self> {
        serde_json::from_str(&contents).with_context(|| "Couldn't parse json string")
    }

    fn format(&self) -> Result<String> {
        serde_json::to_string_pretty(self).with_context(|| "Couldn't convert config to json")
    }

    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let p = path.as_ref();
        debug!(?p, "Trying to load config");
        let contents = read_to_string(path).await?;
        Self::parse(contents)
    }

    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        debug!(?path, "Saving config");
        if let Some(dir) = path.parent() {
            create_dir_all(dir).await?;
        }
        let mut file = File::create(path).await?;
        let serialized = self.format()?;
        file.write_all(serialized.as_bytes())
            .await
            .with_context(|| "Failed to write config file")?;
        file.flush().await?;
        Ok(())
    }

    pub fn new(database: PathBuf, dedup_tolerance: f64) -> Self {
        Config {
            database,
            dedup_tolerance,
        }
    }
}

/// The location of the config file in the platform's config directory
pub fn config_file() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("org", "nearby", "nearbyctl")
        .ok_or_else(|| anyhow!("Unable to determine the configuration directory"))?;
    Ok(dirs.config_dir().join("config.json"))
}
