//! Splitting file lists to stay under the OS argument-length limit

/// Half of the platform's command-line length limit
pub fn default_max_arg_length() -> usize {
    if cfg!(target_os = "windows") {
        // cmd.exe accepts at most 8191 characters
        4095
    } else if cfg!(target_os = "macos") {
        262_144 / 2
    } else {
        131_072 / 2
    }
}

/// Length a file adds to a command line, including its separating space
fn arg_length(file: &str) -> usize {
    file.len() + 1
}

/// Split `files` into ordered chunks so that `base_length` plus the files of
/// each chunk never exceeds `max_length`.
///
/// Packing is greedy and keeps the original order, so concatenating the
/// chunks yields `files` again. A single file that alone exceeds the limit
/// gets a chunk of its own.
pub fn chunk_files(files: &[String], max_length: usize, base_length: usize) -> Vec<Vec<String>> {
    let mut chunks: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_length = base_length;

    for file in files {
        let length = arg_length(file);
        if !current.is_empty() && current_length + length > max_length {
            chunks.push(std::mem::take(&mut current));
            current_length = base_length;
        }
        current_length += length;
        current.push(file.clone());
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    if chunks.len() > 1 {
        tracing::debug!(
            "Split {} file(s) into {} chunks (max argument length {})",
            files.len(),
            chunks.len(),
            max_length
        );
    }
    chunks
}
