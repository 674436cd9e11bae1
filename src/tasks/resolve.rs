//! Preferring project-local binaries over `PATH`

use std::path::{Path, PathBuf};

const LOCAL_BIN_DIR: &str = "node_modules/.bin";

fn candidates(dir: &Path, program: &str) -> Vec<PathBuf> {
    let bin = dir.join(LOCAL_BIN_DIR);
    if cfg!(windows) {
        vec![
            bin.join(format!("{program}.cmd")),
            bin.join(format!("{program}.exe")),
            bin.join(program),
        ]
    } else {
        vec![bin.join(program)]
    }
}

/// Resolve `program` against the local bin directories between `cwd` and
/// `top_level`, nearest first.
///
/// Programs given as a path are returned unchanged, as is any program
/// without a local binary; the OS then looks it up on `PATH`.
pub fn resolve_program(program: &str, cwd: &Path, top_level: &Path) -> String {
    if program.contains('/') || program.contains('\\') {
        return program.to_string();
    }

    let search_root = if cwd.starts_with(top_level) {
        top_level
    } else {
        cwd
    };

    for dir in cwd.ancestors() {
        if let Some(found) = candidates(dir, program).into_iter().find(|c| c.is_file()) {
            tracing::trace!("Resolved {} to {}", program, found.display());
            return found.to_string_lossy().into_owned();
        }
        if dir == search_root {
            break;
        }
    }

    program.to_string()
}
