//! Git output parsers
//!
//! All parsers expect NUL-separated (`-z`) output so paths with spaces,
//! quotes or newlines survive untouched.

use super::staged::FileStatus;

/// Split `-z` output into its non-empty fields
pub fn split_nul(output: &str) -> Vec<&str> {
    output.split('\0').filter(|field| !field.is_empty()).collect()
}

/// Parse `git status -z` and return files with both staged and unstaged changes.
///
/// Untracked entries are ignored. Renamed and copied entries carry their
/// original path in the following field; only the new path is returned.
pub fn parse_partially_staged(output: &str) -> Vec<String> {
    let mut files = Vec::new();
    let mut fields = output.split('\0');

    while let Some(entry) = fields.next() {
        if entry.len() < 4 {
            continue;
        }

        let mut codes = entry.chars();
        let index = codes.next().unwrap_or(' ');
        let worktree = codes.next().unwrap_or(' ');
        let Some(path) = entry.get(3..) else {
            continue;
        };

        if matches!(index, 'R' | 'C') {
            // Skip the origin path of the rename
            fields.next();
        }

        let both_changed = index != ' ' && worktree != ' ';
        let untracked = index == '?' || worktree == '?' || index == '!';
        if both_changed && !untracked {
            files.push(path.to_string());
        }
    }

    files
}

/// Parse `git diff --name-status -z` into status and path pairs.
///
/// Rename and copy records contain a score and two paths; the destination
/// path is kept.
pub fn parse_name_status(output: &str) -> Vec<(FileStatus, String)> {
    let mut entries = Vec::new();
    let mut fields = split_nul(output).into_iter();

    while let Some(code) = fields.next() {
        let status = FileStatus::from_code(code);
        let path = match status {
            FileStatus::Renamed | FileStatus::Copied => {
                fields.next();
                fields.next()
            }
            _ => fields.next(),
        };

        if let Some(path) = path {
            entries.push((status, path.to_string()));
        }
    }

    entries
}

/// Find the position of the stash whose message contains `message`
pub fn find_stash_index(stash_list: &str, message: &str) -> Option<usize> {
    stash_list.lines().position(|line| line.contains(message))
}

/// Reference to the `index`-th stash entry
pub fn stash_ref(index: usize) -> String {
    format!("refs/stash@{{{index}}}")
}
