//! Assigning staged files to the configuration that governs them

use std::path::{Path, PathBuf};

use super::command::CommandMap;
use crate::git::StagedFile;

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// File the configuration came from; `None` for inline configuration
    pub path: Option<PathBuf>,
    /// Directory patterns are evaluated against
    pub dir: PathBuf,
    pub commands: CommandMap,
    /// Given with `--config` or inline, so it applies to every file
    pub explicit: bool,
}

impl LoadedConfig {
    pub fn display_name(&self) -> String {
        match &self.path {
            Some(path) => path.display().to_string(),
            None => "inline configuration".to_string(),
        }
    }
}

/// A configuration plus the staged files it applies to
#[derive(Debug, Clone)]
pub struct ConfigGroup {
    pub config: LoadedConfig,
    pub files: Vec<StagedFile>,
}

fn depth(dir: &Path) -> usize {
    dir.components().count()
}

/// Group files under the configuration whose directory is their nearest ancestor.
///
/// An explicit configuration takes every file. Files without any applicable
/// configuration are left out, as are configurations without files. File
/// order is preserved within each group.
pub fn group_files(configs: Vec<LoadedConfig>, files: &[StagedFile]) -> Vec<ConfigGroup> {
    if let Some(explicit) = configs.iter().find(|c| c.explicit) {
        if files.is_empty() {
            return Vec::new();
        }
        return vec![ConfigGroup {
            config: explicit.clone(),
            files: files.to_vec(),
        }];
    }

    let mut groups: Vec<ConfigGroup> = configs
        .into_iter()
        .map(|config| ConfigGroup {
            config,
            files: Vec::new(),
        })
        .collect();

    for file in files {
        let path = Path::new(&file.path);
        let nearest = groups
            .iter_mut()
            .filter(|group| path.starts_with(&group.config.dir))
            .max_by_key(|group| depth(&group.config.dir));

        match nearest {
            Some(group) => group.files.push(file.clone()),
            None => tracing::debug!("No configuration applies to {}", file.path),
        }
    }

    groups.retain(|group| !group.files.is_empty());
    groups
}
