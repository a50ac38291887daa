use crate::error::{BuildError, Result};
use crate::resolver::SearchPaths;
use crate::types::BuildMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Project file given with `--config`.
///
/// ```toml
/// scripts = ["lib", "vendor/js"]
/// styles = ["css"]
/// output = "dist/index.html"
/// mode = "copy"
/// server = "localhost:10000"
/// ```
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(flatten)]
    pub search_paths: SearchPaths,
    pub output: Option<PathBuf>,
    pub mode: Option<String>,
    pub server: Option<String>,
}

impl ConfigFile {
    pub fn build_mode(&self) -> Result<Option<BuildMode>> {
        self.mode
            .as_deref()
            .map(|name| name.parse::<BuildMode>().map_err(BuildError::config))
            .transpose()
    }

    /// Make every relative path in the file relative to `base` instead
    fn resolve_against(&mut self, base: &Path) {
        for category in crate::types::Category::ALL {
            for dir in self.search_paths.list_mut(category).iter_mut() {
                if dir.is_relative() {
                    *dir = base.join(&*dir);
                }
            }
        }
        if let Some(output) = self.output.as_mut() {
            if output.is_relative() {
                *output = base.join(&*output);
            }
        }
    }
}

pub fn load(config_path: &str) -> Result<ConfigFile> {
    let config_content = fs::read_to_string(config_path).map_err(|e| BuildError::FileNotFound {
        path: format!("Config file {}: {}", config_path, e),
    })?;

    let mut config: ConfigFile = if config_path.ends_with(".json") {
        serde_json::from_str(&config_content)
            .map_err(|e| BuildError::invalid_format(format!("Invalid JSON config: {}", e)))?
    } else if config_path.ends_with(".toml") {
        toml::from_str(&config_content)
            .map_err(|e| BuildError::invalid_format(format!("Invalid TOML config: {}", e)))?
    } else {
        return Err(BuildError::invalid_format(
            "Config file must be .json or .toml format",
        ));
    };

    let base = Path::new(config_path)
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    config.resolve_against(&base);
    log::info!("Loaded configuration from {}", config_path);
    Ok(config)
}
