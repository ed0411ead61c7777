use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable consulted when the config file carries no API key.
pub const API_KEY_ENV: &str = "TUBEDECK_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// OpenAI-compatible chat completions base URL.
    pub api_base_url: String,
    /// Model name sent with every completion request.
    pub model: String,
    /// API key; falls back to $TUBEDECK_API_KEY when absent.
    pub api_key: Option<String>,
    /// Helper command that prints a transcript JSON object for a video id.
    pub transcript_command: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.z.ai/api/paas/v4".to_string(),
            model: "GLM-4.7-Flash".to_string(),
            api_key: None,
            transcript_command: "tubedeck-transcript".to_string(),
        }
    }
}

impl Config {
    /// The key from the config file, or the environment fallback.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "tubedeck") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("tubedeck_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            if let Ok(cfg) = serde_json::from_slice::<Config>(&bytes) {
                return cfg;
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}
