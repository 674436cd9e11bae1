//! Resolution of the files a run operates on

use super::parsers::{parse_name_status, split_nul};
use super::{GitClient, GitError};
use std::path::Path;

/// Default `--diff-filter`: added, copied, modified, renamed
pub const DEFAULT_DIFF_FILTER: &str = "ACMR";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Added,
    Copied,
    Modified,
    Renamed,
    Deleted,
    TypeChanged,
    Unmerged,
    Unknown,
}

impl FileStatus {
    /// Map a `--name-status` code (`M`, `R087`, ...) to a status
    pub fn from_code(code: &str) -> Self {
        match code.chars().next() {
            Some('A') => FileStatus::Added,
            Some('C') => FileStatus::Copied,
            Some('M') => FileStatus::Modified,
            Some('R') => FileStatus::Renamed,
            Some('D') => FileStatus::Deleted,
            Some('T') => FileStatus::TypeChanged,
            Some('U') => FileStatus::Unmerged,
            _ => FileStatus::Unknown,
        }
    }
}

/// A file taking part in the run.
///
/// `path` is absolute and always uses forward slashes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub path: String,
    pub status: FileStatus,
}

/// Which files to list
#[derive(Debug, Clone, Default)]
pub struct StagedFilesQuery {
    /// Compare against this revision range instead of the index
    pub diff: Option<String>,
    pub diff_filter: Option<String>,
    /// List every tracked file
    pub all: bool,
}

impl StagedFilesQuery {
    /// Arguments selecting the diff, shared by file listing and the empty-commit check
    pub fn diff_args(&self) -> Vec<String> {
        let filter = self
            .diff_filter
            .as_deref()
            .map(str::trim)
            .unwrap_or(DEFAULT_DIFF_FILTER);

        let mut args = vec![format!("--diff-filter={filter}")];
        match self.diff.as_deref().map(str::trim) {
            Some(range) if !range.is_empty() => {
                args.extend(range.split_whitespace().map(str::to_string))
            }
            _ => args.push("--staged".to_string()),
        }
        args
    }
}

/// Normalize a path to forward-slash form
pub fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// List the files of this run, relative paths resolved against `top_level`
pub async fn get_staged_files(
    git: &GitClient,
    top_level: &Path,
    query: &StagedFilesQuery,
) -> Result<Vec<StagedFile>, GitError> {
    let git = git.in_dir(top_level);

    if query.all {
        let stdout = git.run(["ls-files", "-z", "--full-name"]).await?;
        return Ok(split_nul(&stdout)
            .into_iter()
            .map(|path| StagedFile {
                path: normalize_path(&top_level.join(path)),
                status: FileStatus::Unknown,
            })
            .collect());
    }

    let mut args = vec!["diff".to_string(), "--name-status".to_string(), "-z".to_string()];
    args.extend(query.diff_args());
    let stdout = git.run(&args).await?;

    let files: Vec<StagedFile> = parse_name_status(&stdout)
        .into_iter()
        .map(|(status, path)| StagedFile {
            path: normalize_path(&top_level.join(path)),
            status,
        })
        .collect();

    tracing::debug!("Found {} staged file(s)", files.len());
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subprocess::{MockProcessRunner, ProcessRunner};
    use std::sync::Arc;

    #[test]
    fn test_diff_args_defaults_to_staged() {
        let query = StagedFilesQuery::default();
        assert_eq!(query.diff_args(), vec!["--diff-filter=ACMR", "--staged"]);
    }

    #[test]
    fn test_diff_args_with_range_and_filter() {
        let query = StagedFilesQuery {
            diff: Some("main...feature ".to_string()),
            diff_filter: Some(" AM".to_string()),
            all: false,
        };
        assert_eq!(query.diff_args(), vec!["--diff-filter=AM", "main...feature"]);
    }

    #[tokio::test]
    async fn test_get_staged_files_absolute_paths() {
        let mock = MockProcessRunner::new();
        mock.expect_command("git")
            .with_args(|args| args.contains(&"--name-status".to_string()))
            .returns_stdout("M\0src/a.js\0A\0b c.js\0")
            .finish();
        let git = GitClient::new(
            Arc::new(mock.clone()) as Arc<dyn ProcessRunner>,
            Path::new("/repo/sub"),
        );

        let files = get_staged_files(&git, Path::new("/repo"), &StagedFilesQuery::default())
            .await
            .unwrap();

        assert_eq!(
            files,
            vec![
                StagedFile {
                    path: "/repo/src/a.js".to_string(),
                    status: FileStatus::Modified
                },
                StagedFile {
                    path: "/repo/b c.js".to_string(),
                    status: FileStatus::Added
                },
            ]
        );
        let call = &mock.get_call_history()[0];
        assert_eq!(call.working_dir.as_deref(), Some(Path::new("/repo")));
    }

    #[tokio::test]
    async fn test_get_all_files() {
        let mock = MockProcessRunner::new();
        mock.expect_command("git")
            .with_args(|args| args.contains(&"ls-files".to_string()))
            .returns_stdout("a.js\0lib/b.js\0")
            .finish();
        let git = GitClient::new(
            Arc::new(mock.clone()) as Arc<dyn ProcessRunner>,
            Path::new("/repo"),
        );
        let query = StagedFilesQuery {
            all: true,
            ..Default::default()
        };

        let files = get_staged_files(&git, Path::new("/repo"), &query).await.unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["/repo/a.js", "/repo/lib/b.js"]);
    }
}
