use anyhow::Result;
use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub appearance: AppearanceConfig,
    pub keybindings: KeybindingsConfig,
    pub git: GitConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GeneralConfig {
    pub project_dir: Option<PathBuf>,
    /// Rebuild the tree when files under the working copy change.
    pub auto_refresh: bool,
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AppearanceConfig {
    pub theme: String,
    pub show_markers: bool,
    pub colors: StatusColors,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StatusColors {
    pub deleted: String,
    pub modified: String,
    pub untracked: String,
    pub directory: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct KeybindingsConfig {
    pub refresh: char,
    pub swap_range: char,
    pub commit: char,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GitConfig {
    pub default_left: String,
    pub default_right: String,
    pub commit_template: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig {
                project_dir: None,
                auto_refresh: true,
                log_file: None,
            },
            appearance: AppearanceConfig {
                theme: "dark".to_string(),
                show_markers: true,
                colors: StatusColors {
                    deleted: "red".to_string(),
                    modified: "yellow".to_string(),
                    untracked: "green".to_string(),
                    directory: "blue".to_string(),
                },
            },
            keybindings: KeybindingsConfig {
                refresh: 'r',
                swap_range: 's',
                commit: 'c',
            },
            git: GitConfig {
                default_left: "head".to_string(),
                default_right: "workspace".to_string(),
                commit_template: "{message}".to_string(),
            },
        }
    }
}

impl GitConfig {
    pub fn render_commit_message(&self, message: &str) -> String {
        self.commit_template.replace("{message}", message)
    }
}

impl GeneralConfig {
    /// Where interactive sessions write their log.
    pub fn log_path(&self) -> PathBuf {
        self.log_file.clone().unwrap_or_else(|| {
            ProjectDirs::from("com", "changeview", "changeview")
                .map(|dirs| dirs.data_local_dir().join("changeview.log"))
                .unwrap_or_else(|| std::env::temp_dir().join("changeview.log"))
        })
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".config").join("changeview").join("config.toml"))
}

pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig> {
    let mut builder = Config::builder();

    // Start with defaults
    builder = builder.add_source(Config::try_from(&AppConfig::default())?);

    if let Some(proj_dirs) = ProjectDirs::from("com", "changeview", "changeview") {
        let system_config = proj_dirs.config_dir().join("config.toml");
        if system_config.exists() {
            builder = builder.add_source(File::from(system_config));
        }
    }

    if let Some(user_config) = user_config_path() {
        if user_config.exists() {
            builder = builder.add_source(File::from(user_config));
        }
    }

    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path));
    }

    // CHANGEVIEW_GIT__DEFAULT_LEFT=main
    builder = builder.add_source(
        Environment::with_prefix("CHANGEVIEW")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    Ok(config.try_deserialize()?)
}

pub fn save_config(config: &AppConfig, path: Option<PathBuf>) -> Result<PathBuf> {
    let config_path = path
        .or_else(user_config_path)
        .ok_or_else(|| anyhow::anyhow!("Cannot determine a config location"))?;

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let toml_string = toml::to_string_pretty(config)?;
    std::fs::write(&config_path, toml_string)?;

    Ok(config_path)
}
