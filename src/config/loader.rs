//! Finding and parsing task configuration files

use std::path::{Path, PathBuf};
use thiserror::Error;

use super::command::CommandMap;
use super::groups::LoadedConfig;
use super::options::Options;
use crate::error::ErrorCode;
use crate::git::parsers::split_nul;
use crate::git::GitClient;

/// Recognized configuration file names, in lookup order
pub const CONFIG_FILE_NAMES: [&str; 6] = [
    ".stagegaterc",
    ".stagegaterc.json",
    ".stagegaterc.yaml",
    ".stagegaterc.yml",
    ".stagegaterc.toml",
    "stagegate.toml",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No valid configuration found")]
    NotFound,

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid YAML in {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid TOML in {}: {source}", path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {message}")]
    Invalid {
        path: Option<PathBuf>,
        message: String,
    },
}

impl ConfigError {
    pub fn code(&self) -> u16 {
        match self {
            ConfigError::NotFound => ErrorCode::CONFIG_NOT_FOUND,
            ConfigError::Read { .. } => ErrorCode::CONFIG_READ_FAILED,
            ConfigError::Json { .. } => ErrorCode::CONFIG_INVALID_JSON,
            ConfigError::Yaml { .. } => ErrorCode::CONFIG_INVALID_YAML,
            ConfigError::Toml { .. } => ErrorCode::CONFIG_INVALID_TOML,
            ConfigError::Invalid { .. } => ErrorCode::CONFIG_INVALID_VALUE,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigError::NotFound => None,
            ConfigError::Read { path, .. }
            | ConfigError::Json { path, .. }
            | ConfigError::Yaml { path, .. }
            | ConfigError::Toml { path, .. } => Some(path),
            ConfigError::Invalid { path, .. } => path.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Json,
    Yaml,
    Toml,
    /// Extensionless rc file: JSON or YAML
    Any,
}

fn detect_format(path: &Path) -> ConfigFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => ConfigFormat::Json,
        Some("yaml") | Some("yml") => ConfigFormat::Yaml,
        Some("toml") => ConfigFormat::Toml,
        _ => ConfigFormat::Any,
    }
}

/// Parse configuration text according to the file's extension
pub fn parse_config(path: &Path, content: &str) -> Result<CommandMap, ConfigError> {
    match detect_format(path) {
        ConfigFormat::Json => serde_json::from_str(content).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        }),
        ConfigFormat::Toml => toml::from_str(content).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        }),
        ConfigFormat::Yaml => serde_yaml::from_str(content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        }),
        ConfigFormat::Any => serde_json::from_str(content).or_else(|json_err| {
            tracing::trace!("{} is not JSON ({}), trying YAML", path.display(), json_err);
            serde_yaml::from_str(content).map_err(|source| ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            })
        }),
    }
}

/// Read and parse one configuration file
pub async fn load_config_file(path: &Path, explicit: bool) -> Result<LoadedConfig, ConfigError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    let commands = parse_config(path, &content)?;
    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    tracing::debug!(
        "Loaded {} pattern(s) from {}",
        commands.len(),
        path.display()
    );

    Ok(LoadedConfig {
        path: Some(path.to_path_buf()),
        dir,
        commands,
        explicit,
    })
}

fn is_config_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| CONFIG_FILE_NAMES.contains(&name))
}

fn in_node_modules(path: &str) -> bool {
    path.split('/').any(|component| component == "node_modules")
}

/// Config files known to git, tracked or untracked but not ignored
pub async fn discover_config_files(
    git: &GitClient,
    top_level: &Path,
) -> Result<Vec<PathBuf>, ConfigError> {
    let stdout = git
        .in_dir(top_level)
        .run([
            "ls-files",
            "-z",
            "--full-name",
            "--cached",
            "--others",
            "--exclude-standard",
        ])
        .await
        .map_err(|e| ConfigError::Invalid {
            path: None,
            message: format!("Failed to list configuration files: {e}"),
        })?;

    let mut files: Vec<PathBuf> = split_nul(&stdout)
        .into_iter()
        .filter(|path| !in_node_modules(path))
        .map(|path| top_level.join(path))
        .filter(|path| is_config_file(path) && path.is_file())
        .collect();
    files.sort();
    files.dedup();
    Ok(files)
}

/// First config file found in `start` or one of its ancestors
pub fn search_ancestors(start: &Path) -> Option<PathBuf> {
    start.ancestors().find_map(|dir| {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    })
}

/// Resolve every configuration that applies to this run.
///
/// An inline configuration or `--config` wins outright. Otherwise all config
/// files in the repository are loaded; when there are none the working
/// directory and its ancestors are searched.
pub async fn search_configs(
    options: &Options,
    git: &GitClient,
    top_level: &Path,
    cwd: &Path,
) -> Result<Vec<LoadedConfig>, ConfigError> {
    if let Some(commands) = &options.config {
        tracing::debug!("Using inline configuration");
        return Ok(vec![LoadedConfig {
            path: None,
            dir: cwd.to_path_buf(),
            commands: commands.clone(),
            explicit: true,
        }]);
    }

    if let Some(path) = &options.config_path {
        let path = if path.is_absolute() {
            path.clone()
        } else {
            cwd.join(path)
        };
        let mut config = load_config_file(&path, true).await?;
        config.dir = cwd.to_path_buf();
        return Ok(vec![config]);
    }

    let mut paths = discover_config_files(git, top_level).await?;
    if paths.is_empty() {
        paths.extend(search_ancestors(cwd));
    }

    let mut configs = Vec::with_capacity(paths.len());
    for path in paths {
        configs.push(load_config_file(&path, false).await?);
    }

    if configs.is_empty() {
        return Err(ConfigError::NotFound);
    }
    Ok(configs)
}
